//! JSON-RPC 2.0 message model.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ResponseError;

pub const JSONRPC_VERSION: &str = "2.0";

/// Request id. The protocol allows both numbers and strings; the id a peer
/// sent must come back verbatim in the response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// An inbound or outbound request. A request without an id is a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: Cow<'static, str>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    pub fn call(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            id: None,
            method: method.into(),
            params,
        }
    }

    /// A call expects a response; a notification does not.
    pub fn is_call(&self) -> bool {
        self.id.is_some()
    }
}

/// A response to a previously issued call. The id is nullable on the wire
/// for protocol-level failures where no request id could be recovered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: Cow<'static, str>,
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl Response {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: RequestId, error: ResponseError) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            id: Some(id),
            result: None,
            error: Some(error),
        }
    }
}

/// Any framed message. Requests carry a `method`; responses do not, which is
/// what the untagged deserialization keys off.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Request(Request),
    Response(Response),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn call_with_numeric_id_parses_as_request() {
        let raw = r#"{"jsonrpc":"2.0","id":3,"method":"textDocument/hover","params":{"x":1}}"#;
        let message: Message = serde_json::from_str(raw).unwrap();
        let Message::Request(request) = message else {
            panic!("expected request");
        };
        assert!(request.is_call());
        assert_eq!(request.id, Some(RequestId::Number(3)));
        assert_eq!(request.method, "textDocument/hover");
        assert_eq!(request.params, Some(json!({"x": 1})));
    }

    #[test]
    fn request_without_id_is_a_notification() {
        let raw = r#"{"jsonrpc":"2.0","method":"initialized","params":{}}"#;
        let message: Message = serde_json::from_str(raw).unwrap();
        let Message::Request(request) = message else {
            panic!("expected request");
        };
        assert!(!request.is_call());
    }

    #[test]
    fn string_ids_survive_a_round_trip() {
        let request = Request::call(RequestId::String("abc-1".into()), "shutdown", None);
        let raw = serde_json::to_string(&Message::Request(request)).unwrap();
        let message: Message = serde_json::from_str(&raw).unwrap();
        let Message::Request(request) = message else {
            panic!("expected request");
        };
        assert_eq!(request.id, Some(RequestId::String("abc-1".into())));
    }

    #[test]
    fn message_with_result_parses_as_response() {
        let raw = r#"{"jsonrpc":"2.0","id":3,"result":null}"#;
        let message: Message = serde_json::from_str(raw).unwrap();
        let Message::Response(response) = message else {
            panic!("expected response");
        };
        assert_eq!(response.id, Some(RequestId::Number(3)));
        // a null result deserializes as absent; the connection layer maps
        // a missing result back to null when completing the call
        assert!(response.result.is_none());
        assert!(response.error.is_none());
    }

    #[test]
    fn error_response_carries_code_and_message() {
        let raw = r#"{"jsonrpc":"2.0","id":"x","error":{"code":-32601,"message":"method not found"}}"#;
        let message: Message = serde_json::from_str(raw).unwrap();
        let Message::Response(response) = message else {
            panic!("expected response");
        };
        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "method not found");
    }

    #[test]
    fn notification_serializes_without_id_or_params_keys() {
        let raw = serde_json::to_string(&Message::Request(Request::notification("exit", None))).unwrap();
        assert_eq!(raw, r#"{"jsonrpc":"2.0","method":"exit"}"#);
    }
}
