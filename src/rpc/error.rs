//! Error taxonomy for the JSON-RPC engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// https://microsoft.github.io/language-server-protocol/specifications/lsp/3.17/specification/#errorCodes
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// The wire-level error object carried in a response.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("jsonrpc error {code}: {message}")]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ResponseError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// An error response received from a peer, or one to be sent verbatim.
    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error("connection closed")]
    Closed,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid_request() -> Self {
        ResponseError::new(INVALID_REQUEST, "invalid request").into()
    }

    pub fn method_not_found() -> Self {
        ResponseError::new(METHOD_NOT_FOUND, "method not found").into()
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        ResponseError::new(INVALID_PARAMS, message).into()
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ResponseError::new(INTERNAL_ERROR, message).into()
    }

    pub fn parse(message: impl Into<String>) -> Self {
        ResponseError::new(PARSE_ERROR, message).into()
    }

    /// Collapse into the wire error object sent back to a peer. Peer errors
    /// propagate verbatim; decode failures become invalid-params; everything
    /// else is an internal error.
    pub fn into_response_error(self) -> ResponseError {
        match self {
            Self::Response(error) => error,
            Self::Decode(error) => ResponseError::new(INVALID_PARAMS, error.to_string()),
            other => ResponseError::new(INTERNAL_ERROR, other.to_string()),
        }
    }
}
