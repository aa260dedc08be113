//! A full-duplex JSON-RPC connection: one reader task, one writer task,
//! outbound call correlation, inbound handler dispatch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicI64, Ordering};

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, warn};

use super::error::{Error, ResponseError};
use super::handler::{ArcHandler, Outcome};
use super::message::{Message, Request, RequestId, Response};
use super::transport;

type PendingMap = Mutex<HashMap<RequestId, oneshot::Sender<Result<Value, ResponseError>>>>;

/// Cheap-to-clone handle to one connection. Calls issued here suspend the
/// issuing task until the peer responds; the connection's own reader task is
/// never suspended on anyone's behalf.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    outgoing: mpsc::Sender<Message>,
    pending: PendingMap,
    next_id: AtomicI64,
    closed: watch::Sender<bool>,
}

impl Connection {
    /// Spawn the reader and writer tasks for a byte-stream pair and return
    /// the connection handle. Inbound requests dispatch to `handler`.
    pub fn spawn<R, W>(reader: R, writer: W, handler: ArcHandler) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (outgoing, outgoing_rx) = mpsc::channel(64);
        let (closed, _) = watch::channel(false);
        let conn = Self {
            inner: Arc::new(Inner {
                outgoing,
                pending: Mutex::new(HashMap::new()),
                next_id: AtomicI64::new(1),
                closed,
            }),
        };
        tokio::spawn(write_loop(writer, outgoing_rx, conn.inner.closed.subscribe()));
        tokio::spawn(read_loop(reader, conn.clone(), handler));
        conn
    }

    /// Issue a call and await its response.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, Error> {
        let id = RequestId::Number(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().unwrap().insert(id.clone(), tx);

        let request = Request::call(id.clone(), method, params);
        if let Err(e) = self.send(Message::Request(request)).await {
            self.inner.pending.lock().unwrap().remove(&id);
            return Err(e);
        }

        match rx.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(error)) => Err(Error::Response(error)),
            Err(_) => Err(Error::Closed),
        }
    }

    /// Send a notification; no response is expected.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), Error> {
        self.send(Message::Request(Request::notification(method, params)))
            .await
    }

    /// Respond to a previously received call by its original id.
    pub async fn respond(&self, id: RequestId, result: Result<Value, Error>) -> Result<(), Error> {
        let response = match result {
            Ok(value) => Response::success(id, value),
            Err(error) => Response::failure(id, error.into_response_error()),
        };
        self.send(Message::Response(response)).await
    }

    /// Close the connection: both pump tasks stop and in-flight calls fail
    /// with [`Error::Closed`].
    pub fn close(&self) {
        self.inner.closed.send_replace(true);
        // dropping the parked senders wakes every waiter
        self.inner.pending.lock().unwrap().clear();
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    async fn send(&self, message: Message) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.inner
            .outgoing
            .send(message)
            .await
            .map_err(|_| Error::Closed)
    }

    /// Complete the pending call matching an inbound response.
    fn complete(&self, response: Response) {
        let Some(id) = response.id else {
            warn!("discarding response without an id");
            return;
        };
        let Some(tx) = self.inner.pending.lock().unwrap().remove(&id) else {
            warn!(%id, "response for unknown request");
            return;
        };
        let result = match response.error {
            Some(error) => Err(error),
            None => Ok(response.result.unwrap_or(Value::Null)),
        };
        let _ = tx.send(result);
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut outgoing: mpsc::Receiver<Message>,
    mut closed: watch::Receiver<bool>,
) where
    W: AsyncWrite + Send + Unpin,
{
    loop {
        tokio::select! {
            // the watch guard must drop inside the arm or the loop is !Send
            _ = async { let _ = closed.wait_for(|closed| *closed).await; } => {
                // flush anything queued before the close was requested
                while let Ok(message) = outgoing.try_recv() {
                    if let Err(e) = transport::write_message(&mut writer, &message).await {
                        error!("write error during close: {e}");
                        break;
                    }
                }
                break;
            }
            message = outgoing.recv() => {
                let Some(message) = message else { break };
                if let Err(e) = transport::write_message(&mut writer, &message).await {
                    error!("write error: {e}");
                    break;
                }
            }
        }
    }
    let _ = writer.shutdown().await;
}

async fn read_loop<R>(reader: R, conn: Connection, handler: ArcHandler)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut closed = conn.inner.closed.subscribe();
    loop {
        tokio::select! {
            _ = async { let _ = closed.wait_for(|closed| *closed).await; } => break,
            message = transport::read_message(&mut reader) => match message {
                Ok(Some(Message::Response(response))) => conn.complete(response),
                Ok(Some(Message::Request(request))) => dispatch(&conn, &handler, request).await,
                Ok(None) => {
                    debug!("connection eof");
                    break;
                }
                Err(e) => {
                    error!("read error: {e}");
                    break;
                }
            }
        }
    }
    conn.close();
}

async fn dispatch(conn: &Connection, handler: &ArcHandler, request: Request) {
    let id = request.id.clone();
    let method = request.method.clone();
    match handler.handle(conn, request).await {
        Ok(Outcome::Reply(value)) => {
            if let Some(id) = id {
                if let Err(e) = conn.respond(id, Ok(value)).await {
                    error!(%method, "failed to respond: {e}");
                }
            }
        }
        Ok(Outcome::Pending | Outcome::None) => {}
        Err(error) => match id {
            Some(id) => {
                if let Err(e) = conn.respond(id, Err(error)).await {
                    error!(%method, "failed to respond: {e}");
                }
            }
            None => warn!(%method, "notification handler error: {error}"),
        },
    }
}
