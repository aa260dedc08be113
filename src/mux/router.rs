//! Client-side handler: capability-aware routing, fan-out, and merging.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::future::try_join_all;
use lsp_types::notification::{Exit, Notification as _};
use lsp_types::request::{
    CodeActionRequest, CodeActionResolveRequest, Completion, ExecuteCommand, Initialize,
    Request as _, Shutdown,
};
use lsp_types::{
    CodeAction, CodeActionOrCommand, CompletionItem, CompletionList, ExecuteCommandParams,
    InitializeResult,
};
use serde_json::{Map, Value, json};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::capability::{self, CapabilityTable};
use crate::mux::backend::{self, BackendRegistry, BackendServer};
use crate::mux::decode_params;
use crate::rpc::{Connection, Error, Handler, Outcome, Request, respond_async};

/// Server name reported to the client from `initialize`.
pub const SERVER_NAME: &str = "lsp-mux";

// Keys wrapped around code action data so a later resolve can be routed back
// to the backend that produced the action.
const DATA_SERVER_KEY: &str = "server";
const DATA_ORIGINAL_KEY: &str = "originalData";

/// The client-facing handler. Every inbound client message is capability
/// filtered and dispatched to a per-method strategy; all request strategies
/// except `initialize` and `shutdown` complete as background work so the
/// client's message pump is never blocked behind a backend call.
pub struct Router {
    registry: Arc<BackendRegistry>,
    table: Arc<CapabilityTable>,
    shutdown: AtomicBool,
    exit: watch::Sender<bool>,
}

impl Router {
    pub fn new(registry: Arc<BackendRegistry>, table: Arc<CapabilityTable>) -> Self {
        let (exit, _) = watch::channel(false);
        Self {
            registry,
            table,
            shutdown: AtomicBool::new(false),
            exit,
        }
    }

    /// Resolves once the client has sent `exit`.
    pub async fn wait_exit(&self) {
        let mut exit = self.exit.subscribe();
        let _ = exit.wait_for(|exit| *exit).await;
    }
}

#[async_trait]
impl Handler for Router {
    async fn handle(&self, conn: &Connection, req: Request) -> Result<Outcome, Error> {
        // exit is honored even after shutdown
        if req.method == Exit::METHOD {
            info!("exit notification received");
            self.exit.send_replace(true);
            return Ok(Outcome::None);
        }

        if self.shutdown.load(Ordering::SeqCst) {
            return Err(Error::invalid_request());
        }

        let servers = self.registry.servers().await;
        let matching = backend::filter_by_method(&servers, &self.table, &req.method);
        if matching.is_empty() {
            return Err(Error::method_not_found());
        }

        if !req.is_call() {
            // sequential broadcast; the first forwarding error aborts
            for server in &matching {
                server.notify(&req.method, req.params.clone()).await?;
            }
            return Ok(Outcome::None);
        }

        let Request {
            id, method, params, ..
        } = req;
        let Some(id) = id else {
            return Ok(Outcome::None);
        };

        match method.as_str() {
            Initialize::METHOD => {
                let result = self.handle_initialize(params, &matching).await?;
                Ok(Outcome::Reply(result))
            }
            Shutdown::METHOD => {
                let result = self.handle_shutdown(&servers).await?;
                Ok(Outcome::Reply(result))
            }
            ExecuteCommand::METHOD => {
                respond_async(conn, id, execute_command(matching, params));
                Ok(Outcome::Pending)
            }
            Completion::METHOD => {
                respond_async(conn, id, completion(matching, params));
                Ok(Outcome::Pending)
            }
            CodeActionRequest::METHOD => {
                respond_async(conn, id, code_action(matching, params));
                Ok(Outcome::Pending)
            }
            CodeActionResolveRequest::METHOD => {
                respond_async(conn, id, code_action_resolve(matching, params));
                Ok(Outcome::Pending)
            }
            _ => {
                // pass-through: first capability-matching backend, raw result
                let server = Arc::clone(&matching[0]);
                let method = method.clone();
                respond_async(conn, id, async move { server.call(&method, params).await });
                Ok(Outcome::Pending)
            }
        }
    }
}

impl Router {
    /// Send `initialize` to every backend sequentially in registration
    /// order, merging capability documents as they arrive; the earliest
    /// registration wins conflicts. Replies with the fixed multiplexer name
    /// and the merged document.
    async fn handle_initialize(
        &self,
        params: Option<Value>,
        servers: &[Arc<BackendServer>],
    ) -> Result<Value, Error> {
        let mut merged = Map::new();

        for server in servers {
            // decode per backend so initializationOptions overrides don't leak
            let mut kv_params: Map<String, Value> = match &params {
                Some(value) => serde_json::from_value(value.clone())?,
                None => Map::new(),
            };
            if let Some(options) = server.init_options() {
                debug!(server = %server.name, "override initializationOptions");
                kv_params.insert(
                    "initializationOptions".to_string(),
                    Value::Object(options.clone()),
                );
            }

            let raw = server
                .call(Initialize::METHOD, Some(Value::Object(kv_params)))
                .await?;
            let typed: InitializeResult = serde_json::from_value(raw.clone())?;
            let kv_caps = raw
                .get("capabilities")
                .and_then(Value::as_object)
                .ok_or_else(|| {
                    Error::internal(format!(
                        "no capabilities in initialize response from {}",
                        server.name
                    ))
                })?;

            capability::merge(&mut merged, kv_caps);
            let supported = capability::collect_supported(kv_caps);
            debug!(server = %server.name, supported = ?supported, "server capabilities");
            server.record_capabilities(typed.capabilities, supported);
        }

        Ok(json!({
            "serverInfo": { "name": SERVER_NAME },
            "capabilities": merged,
        }))
    }

    /// Broadcast shutdown + exit + close to every known backend. Per-backend
    /// errors are logged, never surfaced: shutdown always succeeds
    /// client-side.
    async fn handle_shutdown(&self, servers: &[Arc<BackendServer>]) -> Result<Value, Error> {
        for server in servers {
            if let Err(e) = server.call(Shutdown::METHOD, None).await {
                warn!(server = %server.name, "shutdown error: {e}");
            }
            if let Err(e) = server.notify(Exit::METHOD, None).await {
                warn!(server = %server.name, "exit notification error: {e}");
            }
            server.close();
            info!(server = %server.name, "server shutdown completed");
        }
        self.shutdown.store(true, Ordering::SeqCst);
        Ok(Value::Null)
    }
}

/// Route to the first backend declaring the requested command, falling back
/// to the first capability-matching backend.
async fn execute_command(
    servers: Vec<Arc<BackendServer>>,
    params: Option<Value>,
) -> Result<Value, Error> {
    let typed: ExecuteCommandParams = decode_params(&params)?;
    let server = backend::find_by_command(&servers, &typed.command)
        .unwrap_or_else(|| Arc::clone(&servers[0]));
    server.call(ExecuteCommand::METHOD, params).await
}

/// Parallel fan-out; the first error cancels the remaining calls and becomes
/// the sole reply. Envelope fields come from the first non-array-shaped
/// result; items concatenate in backend registration order, no dedup.
async fn completion(
    servers: Vec<Arc<BackendServer>>,
    params: Option<Value>,
) -> Result<Value, Error> {
    let results = fan_out(&servers, Completion::METHOD, params).await?;

    let mut list = CompletionList::default();
    for value in &results {
        if value.is_object() {
            list = serde_json::from_value(value.clone())?;
            break;
        }
    }

    let mut items = Vec::new();
    for value in results {
        match value {
            Value::Null => {}
            Value::Array(_) => items.extend(serde_json::from_value::<Vec<CompletionItem>>(value)?),
            Value::Object(_) => {
                items.extend(serde_json::from_value::<CompletionList>(value)?.items);
            }
            other => {
                return Err(Error::invalid_params(format!(
                    "invalid completion result: {other}"
                )));
            }
        }
    }
    list.items = items;

    Ok(serde_json::to_value(list)?)
}

/// Parallel fan-out; actions concatenate in backend registration order, each
/// code action's data wrapped with the originating backend's name so a later
/// resolve can be routed back without client awareness of multiple backends.
async fn code_action(
    servers: Vec<Arc<BackendServer>>,
    params: Option<Value>,
) -> Result<Value, Error> {
    let results = fan_out(&servers, CodeActionRequest::METHOD, params).await?;

    let mut actions: Vec<CodeActionOrCommand> = Vec::new();
    for (server, value) in servers.iter().zip(results) {
        let entries: Option<Vec<CodeActionOrCommand>> = serde_json::from_value(value)?;
        for mut entry in entries.unwrap_or_default() {
            if let CodeActionOrCommand::CodeAction(action) = &mut entry {
                let mut data = Map::new();
                data.insert(
                    DATA_SERVER_KEY.to_string(),
                    Value::String(server.name.clone()),
                );
                data.insert(
                    DATA_ORIGINAL_KEY.to_string(),
                    action.data.take().unwrap_or(Value::Null),
                );
                action.data = Some(Value::Object(data));
            }
            actions.push(entry);
        }
    }

    Ok(serde_json::to_value(actions)?)
}

/// Unwrap the provenance wrapper and route strictly to the origin backend
/// with the original data restored.
async fn code_action_resolve(
    servers: Vec<Arc<BackendServer>>,
    params: Option<Value>,
) -> Result<Value, Error> {
    let mut action: CodeAction = decode_params(&params)?;

    let mut data = match action.data.take() {
        Some(Value::Object(data)) => data,
        _ => return Err(Error::invalid_request()),
    };
    let origin = match data.remove(DATA_SERVER_KEY) {
        Some(Value::String(origin)) => origin,
        _ => return Err(Error::invalid_request()),
    };
    action.data = match data.remove(DATA_ORIGINAL_KEY) {
        None | Some(Value::Null) => None,
        Some(original) => Some(original),
    };

    let Some(server) = backend::find_by_name(&servers, &origin) else {
        return Err(Error::method_not_found());
    };
    server
        .call(
            CodeActionResolveRequest::METHOD,
            Some(serde_json::to_value(action)?),
        )
        .await
}

/// Call every backend in parallel. Results come back keyed by registration
/// order regardless of completion order; the first error drops the
/// remaining in-flight calls and partial results are discarded.
async fn fan_out(
    servers: &[Arc<BackendServer>],
    method: &'static str,
    params: Option<Value>,
) -> Result<Vec<Value>, Error> {
    try_join_all(servers.iter().map(|server| {
        let server = Arc::clone(server);
        let params = params.clone();
        async move { server.call(method, params).await }
    }))
    .await
}
