//! MCP wire protocol (JSON-RPC 2.0).
//!
//! Every transport exchanges the same three frame shapes: requests from the
//! client, responses to those requests, and server-initiated notifications
//! (progress and log messages).

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision implemented by this server.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;

/// Client -> server frame. A missing (or null) `id` marks a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

fn default_version() -> String {
    JSONRPC_VERSION.to_string()
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// The `_meta.progressToken` the client attached, if any.
    pub fn progress_token(&self) -> Option<Value> {
        self.params
            .as_ref()
            .and_then(|p| p.get("_meta"))
            .and_then(|m| m.get("progressToken"))
            .filter(|t| !t.is_null())
            .cloned()
    }
}

/// Server -> client response frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(PARSE_ERROR, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }
}

/// Server -> client notification frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: &str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params: Some(params),
        }
    }

    /// `notifications/progress` for the request that carried `token`.
    pub fn progress(token: &Value, progress: u64) -> Self {
        Self::new(
            "notifications/progress",
            json!({ "progressToken": token, "progress": progress }),
        )
    }

    /// `notifications/message` log line.
    pub fn log(level: LogLevel, logger: &str, message: &str) -> Self {
        Self::new(
            "notifications/message",
            json!({ "level": level, "logger": logger, "data": message }),
        )
    }
}

/// Severity of a `notifications/message` log line, least severe first.
///
/// The variants follow the syslog levels MCP uses, so a level sent with
/// `logging/setLevel` compares directly against the level of a message.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

/// Tool advertised in `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Parameterised resource advertised in `resources/templates/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplate {
    pub uri_template: String,
    pub name: String,
    pub description: String,
    pub mime_type: String,
}

/// Render a JSON-RPC id as the request identifier used to key results.
///
/// Strings are used verbatim and numbers in their decimal form; any other
/// shape cannot identify a request.
pub fn request_key(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_without_id_is_notification() {
        let req: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
                .unwrap();
        assert!(req.is_notification());
        assert!(req.params.is_none());
    }

    #[test]
    fn test_progress_token_extraction() {
        let req: JsonRpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {"name": "x", "_meta": {"progressToken": "tok-1"}}
        }))
        .unwrap();
        assert_eq!(req.progress_token(), Some(json!("tok-1")));

        let bare: JsonRpcRequest =
            serde_json::from_value(json!({"id": 4, "method": "tools/call", "params": {}})).unwrap();
        assert_eq!(bare.jsonrpc, "2.0");
        assert!(bare.progress_token().is_none());
    }

    #[test]
    fn test_response_serialization_omits_empty_fields() {
        let ok = serde_json::to_value(JsonRpcResponse::ok(json!(1), json!({}))).unwrap();
        assert!(ok.get("error").is_none());
        assert_eq!(ok["jsonrpc"], "2.0");

        let err = serde_json::to_value(JsonRpcResponse::error(
            Value::Null,
            JsonRpcError::method_not_found("nope"),
        ))
        .unwrap();
        assert!(err.get("result").is_none());
        assert_eq!(err["error"]["code"], METHOD_NOT_FOUND);
        assert_eq!(err["id"], Value::Null);
    }

    #[test]
    fn test_log_notification_shape() {
        let note = serde_json::to_value(JsonRpcNotification::log(
            LogLevel::Error,
            "uber_eats",
            "boom",
        ))
        .unwrap();
        assert_eq!(note["method"], "notifications/message");
        assert_eq!(note["params"]["level"], "error");
        assert_eq!(note["params"]["data"], "boom");
        assert!(note.get("id").is_none());
    }

    #[test]
    fn test_log_level_order_and_names() {
        let level: LogLevel = serde_json::from_value(json!("warning")).unwrap();
        assert_eq!(level, LogLevel::Warning);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Error > LogLevel::Warning);
        assert_eq!(LogLevel::default(), LogLevel::Debug);
        assert!(serde_json::from_value::<LogLevel>(json!("verbose")).is_err());
    }

    #[test]
    fn test_request_key() {
        assert_eq!(request_key(&json!(7)), Some("7".to_string()));
        assert_eq!(request_key(&json!("abc")), Some("abc".to_string()));
        assert_eq!(request_key(&Value::Null), None);
        assert_eq!(request_key(&json!({"a": 1})), None);
    }

    #[test]
    fn test_resource_template_camel_case() {
        let tpl = serde_json::to_value(ResourceTemplate {
            uri_template: "resource://search_results/{request_id}".into(),
            name: "search_results".into(),
            description: "d".into(),
            mime_type: "text/plain".into(),
        })
        .unwrap();
        assert!(tpl.get("uriTemplate").is_some());
        assert!(tpl.get("mimeType").is_some());
    }
}
