//! MCP method handlers.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use rusty_eats_core::protocol::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, LogLevel, MCP_PROTOCOL_VERSION,
};

use crate::catalog;
use crate::reporter::McpReporter;
use crate::session::Session;
use crate::state::GatewayState;

/// Handle one raw frame from a transport and return the serialized reply,
/// if the frame warrants one.
///
/// Background tasks started by this frame report on the session's outbound
/// channel.
pub fn handle_frame(state: &Arc<GatewayState>, session: &Session, text: &str) -> Option<String> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            warn!(%e, "Invalid JSON received");
            return serialize(&JsonRpcResponse::error(
                Value::Null,
                JsonRpcError::parse_error(format!("Parse error: {e}")),
            ));
        }
    };

    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => {
            warn!(%e, "Invalid request frame");
            return serialize(&JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_request(format!("Invalid request: {e}")),
            ));
        }
    };

    dispatch(state, session, request).and_then(|r| serialize(&r))
}

fn serialize(response: &JsonRpcResponse) -> Option<String> {
    match serde_json::to_string(response) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::error!(%e, "Failed to serialize response");
            None
        }
    }
}

/// Dispatch a parsed request. Notifications never produce a response.
pub fn dispatch(
    state: &Arc<GatewayState>,
    session: &Session,
    request: JsonRpcRequest,
) -> Option<JsonRpcResponse> {
    debug!(session = session.id(), method = %request.method, "Dispatching method");

    let Some(id) = request.id.clone().filter(|id| !id.is_null()) else {
        handle_notification(state, session, &request);
        return None;
    };

    let result = match request.method.as_str() {
        "initialize" => Ok(handle_initialize(state, request.params.as_ref())),
        "ping" => Ok(json!({})),
        "logging/setLevel" => handle_set_level(session, request.params.as_ref()),
        "tools/list" => Ok(json!({ "tools": catalog::tool_definitions() })),
        "tools/call" => handle_tools_call(state, session, &request, Some(&id)),
        "resources/list" => Ok(handle_resources_list(state, session)),
        "resources/templates/list" => {
            Ok(json!({ "resourceTemplates": catalog::resource_templates() }))
        }
        "resources/read" => handle_resources_read(state, request.params.as_ref()),
        method => Err(JsonRpcError::method_not_found(method)),
    };

    Some(match result {
        Ok(value) => JsonRpcResponse::ok(id, value),
        Err(error) => JsonRpcResponse::error(id, error),
    })
}

fn handle_notification(state: &Arc<GatewayState>, session: &Session, request: &JsonRpcRequest) {
    match request.method.as_str() {
        "notifications/initialized" => info!(session = session.id(), "Client initialized"),
        // Only runs started on this connection can be cancelled from it.
        "notifications/cancelled" => {
            let target = request
                .params
                .as_ref()
                .and_then(|p| p.get("requestId"))
                .and_then(|id| session.request_key(id));
            if let Some(target) = target {
                let cancelled = state.launcher.cancel(&target);
                debug!(request_id = %target, cancelled, "Client cancelled request");
            }
        }
        // A tool call sent without an id still runs; nobody gets the ack.
        "tools/call" => {
            if let Err(e) = handle_tools_call(state, session, request, None) {
                warn!(error = %e.message, "Tool call notification rejected");
            }
        }
        method => debug!(method, "Ignoring notification"),
    }
}

fn handle_initialize(state: &Arc<GatewayState>, params: Option<&Value>) -> Value {
    let client = params
        .and_then(|p| p.get("clientInfo"))
        .and_then(|c| c.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    info!(client, "MCP initialize");

    json!({
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "capabilities": {
            "tools": { "listChanged": false },
            "resources": { "subscribe": false, "listChanged": false },
            "logging": {},
        },
        "serverInfo": {
            "name": state.server_name(),
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

fn handle_set_level(session: &Session, params: Option<&Value>) -> Result<Value, JsonRpcError> {
    let raw = params
        .and_then(|p| p.get("level"))
        .ok_or_else(|| JsonRpcError::invalid_params("Missing required argument: level"))?;
    let level: LogLevel = serde_json::from_value(raw.clone())
        .map_err(|_| JsonRpcError::invalid_params(format!("Unknown log level: {raw}")))?;
    session.set_log_level(level);
    debug!(session = session.id(), ?level, "Client log level set");
    Ok(json!({}))
}

fn handle_tools_call(
    state: &Arc<GatewayState>,
    session: &Session,
    request: &JsonRpcRequest,
    id: Option<&Value>,
) -> Result<Value, JsonRpcError> {
    let params = request
        .params
        .as_ref()
        .ok_or_else(|| JsonRpcError::invalid_params("Missing params"))?;
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| JsonRpcError::invalid_params("Missing tool name"))?;
    let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

    let intent = catalog::parse_tool_call(name, &arguments)?;

    let fallback = Value::String(uuid::Uuid::new_v4().to_string());
    let request_id = session
        .request_key(id.unwrap_or(&fallback))
        .ok_or_else(|| JsonRpcError::invalid_request("Request id must be a string or a number"))?;

    let reporter = Arc::new(
        McpReporter::new(
            session.outbound().clone(),
            request.progress_token(),
            state.server_name(),
        )
        .with_min_level(session.log_level()),
    );
    if !state.launcher.launch(&request_id, intent.clone(), reporter) {
        return Err(JsonRpcError::invalid_request(format!(
            "Request id already used on this connection: {request_id}"
        )));
    }

    let ack = catalog::acknowledgement(&intent, &request_id, state.config.poll_wait_secs());
    Ok(json!({
        "content": [{ "type": "text", "text": ack }],
        "isError": false,
    }))
}

/// Requests started on this connection.
fn handle_resources_list(state: &Arc<GatewayState>, session: &Session) -> Value {
    let prefix = format!("{}:", session.id());
    let resources: Vec<Value> = state
        .store
        .snapshot()
        .into_iter()
        .filter(|(id, _)| id.starts_with(&prefix))
        .map(|(id, status)| {
            json!({
                "uri": catalog::results_uri(&id),
                "name": format!("search_results/{id}"),
                "description": format!("Request {id} ({status})"),
                "mimeType": "text/plain",
            })
        })
        .collect();
    json!({ "resources": resources })
}

fn handle_resources_read(
    state: &Arc<GatewayState>,
    params: Option<&Value>,
) -> Result<Value, JsonRpcError> {
    let uri = params
        .and_then(|p| p.get("uri"))
        .and_then(Value::as_str)
        .ok_or_else(|| JsonRpcError::invalid_params("Missing resource uri"))?;
    let request_id = catalog::parse_results_uri(uri)
        .ok_or_else(|| JsonRpcError::invalid_params(format!("Unknown resource: {uri}")))?;

    let text = get_search_results(state, request_id);
    Ok(json!({
        "contents": [{
            "uri": uri,
            "mimeType": "text/plain",
            "text": text,
        }]
    }))
}

/// Current text for `request_id`, or the not-found message.
pub fn get_search_results(state: &GatewayState, request_id: &str) -> String {
    match state.store.get(request_id) {
        Some(entry) => entry.text(),
        None => catalog::not_found_text(request_id),
    }
}
