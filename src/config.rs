use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("servers[{0}]: command is required")]
    MissingCommand(usize),
    #[error("server not found in config: {0}")]
    UnknownServer(String),
}

/// Multiplexer configuration, usually loaded from
/// `$XDG_CONFIG_HOME/lsp-mux/config.yaml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
    /// Name of the backend whose `tsserver/request` notifications should be
    /// bridged through `workspace/executeCommand` (Vue language tooling).
    #[serde(default)]
    pub tsserver_bridge: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServerConfig {
    /// Display name; defaults to the command.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// When set, replaces the client's `initializationOptions` for this
    /// backend during `initialize`.
    #[serde(default)]
    pub initialization_options: Option<Map<String, Value>>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Parse a YAML config document. When `server_names` is non-empty only
    /// the named servers are kept, in the requested order; an unknown name
    /// is an error.
    pub fn load(text: &str, server_names: &[String]) -> Result<Self, ConfigError> {
        let mut config: Config = serde_yaml::from_str(text)?;

        for (i, server) in config.servers.iter_mut().enumerate() {
            if server.command.is_empty() {
                return Err(ConfigError::MissingCommand(i));
            }
            if server.name.is_empty() {
                server.name = server.command.clone();
            }
        }

        if !server_names.is_empty() {
            // requested order decides registration order downstream
            let mut selected = Vec::with_capacity(server_names.len());
            for name in server_names {
                let Some(server) = config.servers.iter().find(|s| &s.name == name) else {
                    return Err(ConfigError::UnknownServer(name.clone()));
                };
                selected.push(server.clone());
            }
            config.servers = selected;
        }

        Ok(config)
    }

    pub fn load_file(path: &Path, server_names: &[String]) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::load(&text, server_names)
    }
}

/// Returns the default config file path.
/// Uses $XDG_CONFIG_HOME/lsp-mux if XDG_CONFIG_HOME is set,
/// otherwise falls back to ~/.config/lsp-mux,
/// or ./lsp-mux if neither is available.
pub fn default_config_path() -> PathBuf {
    config_path_with_env(std::env::var("XDG_CONFIG_HOME").ok(), dirs::home_dir())
}

fn config_path_with_env(xdg_config_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let config_dir = xdg_config_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));

    config_dir.join("lsp-mux").join("config.yaml")
}
