//! Shared test fixtures: scripted fake backends, a raw framed client, and
//! wiring helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{BufReader, DuplexStream, ReadHalf, WriteHalf};

use lsp_mux::capability::CapabilityTable;
use lsp_mux::mux::backend::BackendRegistry;
use lsp_mux::mux::router::Router;
use lsp_mux::rpc::{
    ArcHandler, Connection, Error, Handler, Message, Outcome, Request, RequestId, Response,
    ResponseError, transport,
};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Handler that swallows everything. Stands in for a peer whose inbound
/// traffic the test does not care about.
pub struct NullHandler;

#[async_trait]
impl Handler for NullHandler {
    async fn handle(&self, _conn: &Connection, _req: Request) -> Result<Outcome, Error> {
        Ok(Outcome::None)
    }
}

/// A scripted backend language server. Replies to `initialize` with the
/// configured capabilities, to `shutdown` with null, and to anything else
/// with a canned reply if one was scripted, otherwise an echo of the method
/// and params. Notifications and request methods are recorded for later
/// inspection.
pub struct FakeBackend {
    capabilities: Value,
    replies: HashMap<String, Result<Value, (i64, String)>>,
    notifications: Mutex<Vec<Request>>,
    requests: Mutex<Vec<Request>>,
}

impl FakeBackend {
    pub fn new(capabilities: Value) -> Self {
        Self {
            capabilities,
            replies: HashMap::new(),
            notifications: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_reply(mut self, method: &str, result: Value) -> Self {
        self.replies.insert(method.to_string(), Ok(result));
        self
    }

    pub fn with_error(mut self, method: &str, code: i64, message: &str) -> Self {
        self.replies
            .insert(method.to_string(), Err((code, message.to_string())));
        self
    }

    pub fn notifications(&self) -> Vec<Request> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_methods(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.method.clone())
            .collect()
    }
}

#[async_trait]
impl Handler for FakeBackend {
    async fn handle(&self, _conn: &Connection, req: Request) -> Result<Outcome, Error> {
        if !req.is_call() {
            self.notifications.lock().unwrap().push(req);
            return Ok(Outcome::None);
        }
        self.requests.lock().unwrap().push(req.clone());

        if let Some(scripted) = self.replies.get(&req.method) {
            return match scripted {
                Ok(result) => Ok(Outcome::Reply(result.clone())),
                Err((code, message)) => Err(ResponseError::new(*code, message.clone()).into()),
            };
        }
        match req.method.as_str() {
            "initialize" => Ok(Outcome::Reply(json!({"capabilities": self.capabilities}))),
            "shutdown" => Ok(Outcome::Reply(Value::Null)),
            _ => Ok(Outcome::Reply(json!({
                "method": req.method,
                "params": req.params,
            }))),
        }
    }
}

/// Spawn two connections over an in-memory pipe and return both handles, in
/// the order their handlers were given.
pub fn connect_pair(left: ArcHandler, right: ArcHandler) -> (Connection, Connection) {
    let (left_stream, right_stream) = tokio::io::duplex(64 * 1024);
    let (lr, lw) = tokio::io::split(left_stream);
    let (rr, rw) = tokio::io::split(right_stream);
    (
        Connection::spawn(lr, lw, left),
        Connection::spawn(rr, rw, right),
    )
}

/// Register a fake backend with the registry over an in-memory pipe. Returns
/// the backend for inspecting what it received.
pub fn register_backend(
    registry: &BackendRegistry,
    name: &str,
    backend: FakeBackend,
) -> Arc<FakeBackend> {
    let backend = Arc::new(backend);
    let (mux_conn, _backend_conn) = connect_pair(Arc::new(NullHandler), backend.clone());
    registry.add(name, mux_conn, None);
    backend
}

/// A router over a fresh registry expecting `expected` backends.
pub fn router_stack(expected: usize) -> (Arc<Router>, Arc<BackendRegistry>) {
    let registry = Arc::new(BackendRegistry::new(expected).unwrap());
    let router = Arc::new(Router::new(
        Arc::clone(&registry),
        Arc::new(CapabilityTable::default()),
    ));
    (router, registry)
}

/// An editor-side test client speaking raw framed JSON-RPC, so tests observe
/// exactly what goes over the wire.
pub struct TestClient {
    writer: WriteHalf<DuplexStream>,
    reader: BufReader<ReadHalf<DuplexStream>>,
}

impl TestClient {
    /// Connect a raw client to a server-side connection running `handler`.
    /// The returned [`Connection`] is the server's handle to this client.
    pub fn connect(handler: ArcHandler) -> (Self, Connection) {
        let (client_stream, server_stream) = tokio::io::duplex(64 * 1024);
        let (sr, sw) = tokio::io::split(server_stream);
        let conn = Connection::spawn(sr, sw, handler);
        let (cr, cw) = tokio::io::split(client_stream);
        (
            Self {
                writer: cw,
                reader: BufReader::new(cr),
            },
            conn,
        )
    }

    pub async fn request(&mut self, id: i64, method: &str, params: Option<Value>) {
        let request = Request::call(RequestId::Number(id), method, params);
        transport::write_message(&mut self.writer, &Message::Request(request))
            .await
            .unwrap();
    }

    pub async fn notify(&mut self, method: &str, params: Option<Value>) {
        let request = Request::notification(method, params);
        transport::write_message(&mut self.writer, &Message::Request(request))
            .await
            .unwrap();
    }

    pub async fn respond(&mut self, id: RequestId, result: Value) {
        let response = Response::success(id, result);
        transport::write_message(&mut self.writer, &Message::Response(response))
            .await
            .unwrap();
    }

    async fn read_message(&mut self) -> Message {
        tokio::time::timeout(TIMEOUT, transport::read_message(&mut self.reader))
            .await
            .expect("timed out waiting for a message")
            .expect("read error")
            .expect("connection closed")
    }

    /// Read messages until the response to `id` arrives; anything else in
    /// between is discarded.
    pub async fn read_response(&mut self, id: i64) -> Response {
        loop {
            if let Message::Response(response) = self.read_message().await {
                if response.id == Some(RequestId::Number(id)) {
                    return response;
                }
            }
        }
    }

    /// Read messages until a notification with `method` arrives.
    pub async fn read_notification(&mut self, method: &str) -> Request {
        loop {
            if let Message::Request(request) = self.read_message().await {
                if !request.is_call() && request.method == method {
                    return request;
                }
            }
        }
    }

    /// Read messages until a server-initiated call with `method` arrives.
    pub async fn read_request(&mut self, method: &str) -> Request {
        loop {
            if let Message::Request(request) = self.read_message().await {
                if request.is_call() && request.method == method {
                    return request;
                }
            }
        }
    }
}

/// Poll `condition` until it holds or the timeout elapses.
pub async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
