// JSON-RPC engine
// - message.rs: wire types (requests, responses, ids)
// - transport.rs: Content-Length header framing
// - connection.rs: reader/writer tasks, outbound call correlation
// - handler.rs: handler trait, async respond-by-id helper
// - error.rs: error taxonomy and LSP error codes

pub mod connection;
pub mod error;
pub mod handler;
pub mod message;
pub mod transport;

pub use connection::Connection;
pub use error::{Error, ResponseError};
pub use handler::{ArcHandler, Handler, Outcome, respond_async};
pub use message::{Message, Request, RequestId, Response};
