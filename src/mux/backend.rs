//! Backend server handles and the readiness-gated registry.

use std::sync::{Arc, Mutex, OnceLock};

use lsp_types::ServerCapabilities;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::capability::{CapabilitySet, CapabilityTable};
use crate::rpc::{Connection, Error as RpcError};

/// One configured backend language server. Created at startup registration;
/// capabilities are recorded exactly once when its initialize response
/// arrives and are immutable afterward.
pub struct BackendServer {
    pub name: String,
    conn: Connection,
    init_options: Option<Map<String, Value>>,
    capabilities: OnceLock<ServerCapabilities>,
    supported: OnceLock<CapabilitySet>,
}

impl BackendServer {
    fn new(name: String, conn: Connection, init_options: Option<Map<String, Value>>) -> Self {
        Self {
            name,
            conn,
            init_options,
            capabilities: OnceLock::new(),
            supported: OnceLock::new(),
        }
    }

    /// Per-backend initializationOptions override, applied only at startup.
    pub fn init_options(&self) -> Option<&Map<String, Value>> {
        self.init_options.as_ref()
    }

    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, RpcError> {
        debug!(server = %self.name, method, "send request");
        self.conn.call(method, params).await
    }

    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), RpcError> {
        debug!(server = %self.name, method, "send notification");
        self.conn.notify(method, params).await
    }

    pub fn close(&self) {
        self.conn.close();
    }

    /// Record the typed and flattened capabilities from the initialize
    /// response. Later attempts are ignored.
    pub fn record_capabilities(&self, capabilities: ServerCapabilities, supported: CapabilitySet) {
        let _ = self.capabilities.set(capabilities);
        let _ = self.supported.set(supported);
    }

    pub fn capabilities(&self) -> Option<&ServerCapabilities> {
        self.capabilities.get()
    }

    /// Whether this backend's declared capabilities support `method`. Before
    /// initialize, only methods outside the capability table match.
    pub fn supports_method(&self, table: &CapabilityTable, method: &str) -> bool {
        static EMPTY: OnceLock<CapabilitySet> = OnceLock::new();
        let supported = self
            .supported
            .get()
            .unwrap_or_else(|| EMPTY.get_or_init(CapabilitySet::new));
        table.is_supported(method, supported)
    }

    /// Whether the backend's executeCommandProvider declares `command`.
    pub fn declares_command(&self, command: &str) -> bool {
        self.capabilities
            .get()
            .and_then(|caps| caps.execute_command_provider.as_ref())
            .is_some_and(|provider| provider.commands.iter().any(|c| c == command))
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("at least one backend server is required")]
    NoBackends,
}

/// Ordered collection of backend servers with a one-shot readiness gate:
/// nobody reads capabilities or routes a request before every expected
/// backend has registered.
pub struct BackendRegistry {
    servers: Mutex<Vec<Arc<BackendServer>>>,
    expected: usize,
    ready: watch::Sender<bool>,
}

impl BackendRegistry {
    pub fn new(expected: usize) -> Result<Self, RegistryError> {
        if expected == 0 {
            return Err(RegistryError::NoBackends);
        }
        let (ready, _) = watch::channel(false);
        Ok(Self {
            servers: Mutex::new(Vec::with_capacity(expected)),
            expected,
            ready,
        })
    }

    /// Register a backend. The gate opens on the Nth registration;
    /// registrations beyond the expected count are dropped.
    pub fn add(&self, name: impl Into<String>, conn: Connection, init_options: Option<Map<String, Value>>) {
        let name = name.into();
        let mut servers = self.servers.lock().unwrap();
        if servers.len() < self.expected {
            servers.push(Arc::new(BackendServer::new(name, conn, init_options)));
        } else {
            warn!(server = %name, "backend registry already full, dropping registration");
            return;
        }
        if servers.len() == self.expected {
            self.ready.send_replace(true);
            info!("all backend connections established");
        }
    }

    /// Suspend until the readiness gate opens, then return the live ordered
    /// list.
    pub async fn servers(&self) -> Vec<Arc<BackendServer>> {
        self.wait_ready().await;
        self.servers.lock().unwrap().clone()
    }

    pub async fn wait_ready(&self) {
        let mut ready = self.ready.subscribe();
        // the registry owns the sender, so the channel cannot close under us
        let _ = ready.wait_for(|ready| *ready).await;
    }
}

/// Backends whose declared capabilities support `method`, in registration
/// order.
pub fn filter_by_method(
    servers: &[Arc<BackendServer>],
    table: &CapabilityTable,
    method: &str,
) -> Vec<Arc<BackendServer>> {
    servers
        .iter()
        .filter(|server| server.supports_method(table, method))
        .cloned()
        .collect()
}

pub fn find_by_name(servers: &[Arc<BackendServer>], name: &str) -> Option<Arc<BackendServer>> {
    servers.iter().find(|server| server.name == name).cloned()
}

pub fn find_by_command(
    servers: &[Arc<BackendServer>],
    command: &str,
) -> Option<Arc<BackendServer>> {
    servers
        .iter()
        .find(|server| server.declares_command(command))
        .cloned()
}
