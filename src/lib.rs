//! lsp-mux: a protocol-level multiplexer between one LSP client and many
//! language servers. Backends are spawned as child processes; their
//! capabilities are merged into a single `initialize` response and every
//! later message is routed by the capability each backend declared.

pub mod capability;
pub mod config;
pub mod log;
pub mod mux;
pub mod rpc;
