//! Inbound message handling and the async respond-by-id pattern.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use tracing::error;

use super::connection::Connection;
use super::error::Error;
use super::message::{Request, RequestId};

/// What a handler did with an inbound message.
#[derive(Debug)]
pub enum Outcome {
    /// Final result of a call; the engine sends the response.
    Reply(Value),
    /// The handler completes the call later via [`Connection::respond`].
    /// The engine must not treat the return as the final result.
    Pending,
    /// Nothing to send (notifications).
    None,
}

/// One handler per connection, dispatching every inbound request and
/// notification. `conn` is the connection the message arrived on, which is
/// also where a [`Outcome::Pending`] handler must eventually respond.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, conn: &Connection, req: Request) -> Result<Outcome, Error>;
}

pub type ArcHandler = Arc<dyn Handler>;

/// Complete a call off the reader path: run `fut` as an independent task and
/// respond with the original request id exactly once, whether the body
/// succeeds, fails, or panics. The connection's message pump is never
/// blocked behind the body.
pub fn respond_async<F>(conn: &Connection, id: RequestId, fut: F)
where
    F: Future<Output = Result<Value, Error>> + Send + 'static,
{
    let conn = conn.clone();
    tokio::spawn(async move {
        let result = match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(result) => result,
            Err(_) => Err(Error::internal("request handler panicked")),
        };
        if let Err(e) = conn.respond(id, result).await {
            error!("failed to respond: {e}");
        }
    });
}
