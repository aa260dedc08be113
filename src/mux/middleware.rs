//! Handler middleware. Layers wrap the terminal handler outer-to-inner in
//! registration order; each may short-circuit or delegate onward.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{Instrument, debug, error, info_span};
use uuid::Uuid;

use crate::rpc::{ArcHandler, Connection, Error, Handler, Outcome, Request};

pub type Layer = Box<dyn Fn(ArcHandler) -> ArcHandler + Send + Sync>;

/// Wrap `terminal` with `layers`; the first registered layer is outermost,
/// so later-wrapped middleware observes context set up by earlier ones.
pub fn compose(terminal: ArcHandler, layers: Vec<Layer>) -> ArcHandler {
    layers
        .into_iter()
        .rev()
        .fold(terminal, |next, layer| layer(next))
}

/// Attaches a tracing span carrying the connection name, method, request id,
/// and a fresh trace id to everything the inner handler does.
pub struct RequestTrace {
    name: String,
    next: ArcHandler,
}

impl RequestTrace {
    pub fn layer(name: impl Into<String>) -> Layer {
        let name = name.into();
        Box::new(move |next| {
            Arc::new(Self {
                name: name.clone(),
                next,
            })
        })
    }
}

#[async_trait]
impl Handler for RequestTrace {
    async fn handle(&self, conn: &Connection, req: Request) -> Result<Outcome, Error> {
        let kind = if req.is_call() { "request" } else { "notification" };
        let span = info_span!(
            "rpc",
            connection = %self.name,
            method = %req.method,
            kind,
            id = ?req.id,
            trace_id = %Uuid::new_v4().simple(),
        );
        self.next.handle(conn, req).instrument(span).await
    }
}

/// Access log: one line per handled message with its duration and outcome.
pub struct AccessLog {
    next: ArcHandler,
}

impl AccessLog {
    pub fn layer() -> Layer {
        Box::new(|next| Arc::new(Self { next }))
    }
}

#[async_trait]
impl Handler for AccessLog {
    async fn handle(&self, conn: &Connection, req: Request) -> Result<Outcome, Error> {
        let start = Instant::now();
        let result = self.next.handle(conn, req).await;
        let elapsed = start.elapsed();
        match &result {
            Ok(Outcome::Pending) => debug!(?elapsed, "handled (async)"),
            Ok(_) => debug!(?elapsed, "handled"),
            Err(error) => error!(?elapsed, "handler error: {error}"),
        }
        result
    }
}
