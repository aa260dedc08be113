//! Per-backend reverse path: backend traffic re-aggregated and relayed to
//! the client.

use std::sync::Arc;

use async_trait::async_trait;
use lsp_types::PublishDiagnosticsParams;
use lsp_types::notification::{Notification as _, PublishDiagnostics};
use serde_json::Value;
use tracing::debug;

use crate::mux::decode_params;
use crate::mux::diagnostics::DiagnosticsRegistry;
use crate::rpc::{Connection, Error, Handler, Outcome, Request, respond_async};

/// Handler for one backend's connection. Diagnostics notifications are
/// rewritten to carry the union across all backends before relay; everything
/// else passes through. Backend-initiated calls relay to the client without
/// blocking the backend's own message pump.
pub struct Relay {
    name: String,
    client: Connection,
    diagnostics: Arc<DiagnosticsRegistry>,
}

impl Relay {
    pub fn new(name: String, client: Connection, diagnostics: Arc<DiagnosticsRegistry>) -> Self {
        Self {
            name,
            client,
            diagnostics,
        }
    }

    async fn publish_diagnostics(&self, params: Option<Value>) -> Result<(), Error> {
        let mut typed: PublishDiagnosticsParams = decode_params(&params)?;

        self.diagnostics
            .update(typed.uri.clone(), &self.name, typed.diagnostics);
        typed.diagnostics = self.diagnostics.combined(&typed.uri);
        debug!(
            server = %self.name,
            uri = %typed.uri.as_str(),
            count = typed.diagnostics.len(),
            "relay combined diagnostics"
        );

        self.client
            .notify(PublishDiagnostics::METHOD, Some(serde_json::to_value(typed)?))
            .await
    }
}

#[async_trait]
impl Handler for Relay {
    async fn handle(&self, conn: &Connection, req: Request) -> Result<Outcome, Error> {
        let Request {
            id, method, params, ..
        } = req;

        let Some(id) = id else {
            if method == PublishDiagnostics::METHOD {
                self.publish_diagnostics(params).await?;
            } else {
                self.client.notify(&method, params).await?;
            }
            return Ok(Outcome::None);
        };

        // backend-initiated call: relay to the client off the reader path so
        // a slow client round-trip never blocks this backend's pump
        let client = self.client.clone();
        respond_async(conn, id, async move { client.call(&method, params).await });
        Ok(Outcome::Pending)
    }
}
