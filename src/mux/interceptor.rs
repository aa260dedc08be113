//! Intercepts `tsserver/request` bridge notifications before they reach the
//! router, for Vue language tooling that tunnels tsserver commands through
//! its language server.
//! see https://github.com/vuejs/language-tools/discussions/5456

use std::sync::Arc;

use async_trait::async_trait;
use lsp_types::ExecuteCommandParams;
use lsp_types::request::{ExecuteCommand, Request as _};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::mux::backend::{self, BackendRegistry};
use crate::mux::decode_params;
use crate::mux::middleware::Layer;
use crate::rpc::{ArcHandler, Connection, Error, Handler, Outcome, Request};

pub const TSSERVER_REQUEST_METHOD: &str = "tsserver/request";
const TSSERVER_RESPONSE_METHOD: &str = "tsserver/response";
const TSSERVER_EXEC_COMMAND: &str = "typescript.tsserverRequest";

/// Middleware that hijacks `tsserver/request` notifications from the client:
/// the tunneled command runs as `workspace/executeCommand` against the
/// backend declaring it, and the response is notified back to the Vue
/// backend. Everything else delegates onward.
pub struct TsserverRequestInterceptor {
    vue_server: String,
    registry: Arc<BackendRegistry>,
    next: ArcHandler,
}

impl TsserverRequestInterceptor {
    pub fn layer(vue_server: String, registry: Arc<BackendRegistry>) -> Layer {
        Box::new(move |next| {
            Arc::new(Self {
                vue_server: vue_server.clone(),
                registry: registry.clone(),
                next,
            })
        })
    }
}

#[async_trait]
impl Handler for TsserverRequestInterceptor {
    async fn handle(&self, conn: &Connection, req: Request) -> Result<Outcome, Error> {
        if req.is_call() || req.method != TSSERVER_REQUEST_METHOD {
            return self.next.handle(conn, req).await;
        }

        info!("intercept tsserver/request notification");
        let registry = Arc::clone(&self.registry);
        let vue_server = self.vue_server.clone();
        // the bridge calls a backend, so it runs off the client's pump
        tokio::spawn(async move {
            if let Err(e) = bridge_request(registry, vue_server, req.params).await {
                warn!("tsserver/request bridge failed: {e}");
            }
        });
        Ok(Outcome::None)
    }
}

async fn bridge_request(
    registry: Arc<BackendRegistry>,
    vue_server: String,
    params: Option<Value>,
) -> Result<(), Error> {
    let servers = registry.servers().await;

    // see https://github.com/vuejs/language-tools/wiki/Neovim
    let batches: Vec<Vec<Value>> = decode_params(&params)?;
    let [triple] = batches.as_slice() else {
        return Err(Error::invalid_params("expected a single tsserver request"));
    };
    let [id, command, args] = triple.as_slice() else {
        return Err(Error::invalid_params(
            "expected an [id, command, args] triple",
        ));
    };

    let Some(ts_server) = backend::find_by_command(&servers, TSSERVER_EXEC_COMMAND) else {
        return Err(Error::internal(format!(
            "no backend declares {TSSERVER_EXEC_COMMAND}"
        )));
    };
    let Some(origin) = backend::find_by_name(&servers, &vue_server) else {
        return Err(Error::internal(format!(
            "backend not registered: {vue_server}"
        )));
    };

    let exec_params = ExecuteCommandParams {
        command: TSSERVER_EXEC_COMMAND.to_string(),
        arguments: vec![command.clone(), args.clone()],
        work_done_progress_params: Default::default(),
    };
    let result = ts_server
        .call(ExecuteCommand::METHOD, Some(serde_json::to_value(exec_params)?))
        .await?;
    let body = result.get("body").cloned().unwrap_or(Value::Null);

    origin
        .notify(TSSERVER_RESPONSE_METHOD, Some(json!([[id, body]])))
        .await
}
