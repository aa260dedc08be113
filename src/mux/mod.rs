// Multiplexer layer
// - router.rs: client-side handler (capability routing, fan-out, merging)
// - relay.rs: per-backend reverse path
// - backend.rs: backend handles and the readiness-gated registry
// - diagnostics.rs: per-document, per-origin diagnostics aggregation
// - middleware.rs: handler layers (trace context, access log)
// - interceptor.rs: tsserver/request bridge notification hijack

pub mod backend;
pub mod diagnostics;
pub mod interceptor;
pub mod middleware;
pub mod relay;
pub mod router;

use std::process::Stdio;
use std::sync::Arc;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::capability::CapabilityTable;
use crate::config::{Config, ServerConfig};
use crate::mux::backend::BackendRegistry;
use crate::mux::diagnostics::DiagnosticsRegistry;
use crate::mux::interceptor::TsserverRequestInterceptor;
use crate::mux::middleware::{AccessLog, Layer, RequestTrace};
use crate::mux::relay::Relay;
use crate::mux::router::Router;
use crate::rpc::{Connection, Error};

/// Decode optional request params into a typed value; absent params decode
/// from null.
pub(crate) fn decode_params<T>(params: &Option<Value>) -> Result<T, Error>
where
    T: DeserializeOwned,
{
    Ok(serde_json::from_value(
        params.clone().unwrap_or(Value::Null),
    )?)
}

/// Run the multiplexer: the client on stdio, one spawned process per
/// configured backend, until the client sends `exit`.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let diagnostics = Arc::new(DiagnosticsRegistry::new());
    let registry = Arc::new(BackendRegistry::new(config.servers.len())?);
    let table = Arc::new(CapabilityTable::default());
    let router = Arc::new(Router::new(Arc::clone(&registry), table));

    let mut layers: Vec<Layer> = vec![RequestTrace::layer("client"), AccessLog::layer()];
    if let Some(vue_server) = config.tsserver_bridge.clone() {
        layers.push(TsserverRequestInterceptor::layer(
            vue_server,
            Arc::clone(&registry),
        ));
    }
    let client = Connection::spawn(
        tokio::io::stdin(),
        tokio::io::stdout(),
        middleware::compose(router.clone(), layers),
    );

    let mut children = Vec::new();
    for server in &config.servers {
        let (child, conn) = spawn_backend(server, client.clone(), Arc::clone(&diagnostics))?;
        registry.add(server.name.clone(), conn, server.initialization_options.clone());
        children.push(child);
    }

    info!("lsp-mux started with {} backend(s)", children.len());
    router.wait_exit().await;
    info!("exit received, terminating");

    client.close();
    for mut child in children {
        // shutdown already asked each backend to exit; reap what remains
        if let Err(e) = child.kill().await {
            debug!("backend already gone: {e}");
        }
    }
    Ok(())
}

fn spawn_backend(
    config: &ServerConfig,
    client: Connection,
    diagnostics: Arc<DiagnosticsRegistry>,
) -> anyhow::Result<(Child, Connection)> {
    info!(server = %config.name, command = %config.command, "spawning backend");

    let mut child = Command::new(&config.command)
        .args(&config.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to spawn backend {}", config.name))?;

    let stdout = child
        .stdout
        .take()
        .with_context(|| format!("backend {} stdout not piped", config.name))?;
    let stdin = child
        .stdin
        .take()
        .with_context(|| format!("backend {} stdin not piped", config.name))?;

    let relay = Arc::new(Relay::new(config.name.clone(), client, diagnostics));
    let handler = middleware::compose(
        relay,
        vec![RequestTrace::layer(config.name.clone()), AccessLog::layer()],
    );
    Ok((child, Connection::spawn(stdout, stdin, handler)))
}
