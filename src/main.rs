use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use lsp_mux::{config, log, mux};

#[derive(Parser)]
#[command(name = "lsp-mux", version, about = "Multiplex LSP backends behind one server")]
struct Cli {
    /// Config file path (default: $XDG_CONFIG_HOME/lsp-mux/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run only the named servers from the config
    #[arg(long, value_delimiter = ',')]
    servers: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let path = cli.config.unwrap_or_else(config::default_config_path);
    let config = config::Config::load_file(&path, &cli.servers)
        .with_context(|| format!("loading {}", path.display()))?;

    log::init(&config.log_level);

    mux::run(config).await
}
