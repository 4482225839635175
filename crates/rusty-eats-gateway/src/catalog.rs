//! Tools and resources advertised to MCP clients, and the texts they return.

use serde_json::{Value, json};

use rusty_eats_agent::Intent;
use rusty_eats_core::protocol::{JsonRpcError, ResourceTemplate, ToolDefinition};

pub const FIND_MENU_OPTIONS: &str = "find_menu_options";
pub const ORDER_FOOD: &str = "order_food";

/// Prefix of every result resource URI; the request id follows it.
pub const RESULTS_URI_PREFIX: &str = "resource://search_results/";

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: FIND_MENU_OPTIONS.into(),
            description: "Search Uber Eats for restaurants or food items. Returns immediately; \
                          read the result resource named in the reply once the search finishes."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "search_term": {
                        "type": "string",
                        "description": "Food or restaurant to search for"
                    }
                },
                "required": ["search_term"]
            }),
        },
        ToolDefinition {
            name: ORDER_FOOD.into(),
            description: "Order food from a restaurant. Returns immediately; the order is \
                          placed in the background."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "item_url": {
                        "type": "string",
                        "description": "URL of the menu item to order"
                    },
                    "item_name": {
                        "type": "string",
                        "description": "Name of the item to order"
                    }
                },
                "required": ["item_url", "item_name"]
            }),
        },
    ]
}

pub fn resource_templates() -> Vec<ResourceTemplate> {
    vec![ResourceTemplate {
        uri_template: format!("{RESULTS_URI_PREFIX}{{request_id}}"),
        name: "search_results".into(),
        description: "Get the search results for a given request ID.".into(),
        mime_type: "text/plain".into(),
    }]
}

pub fn results_uri(request_id: &str) -> String {
    format!("{RESULTS_URI_PREFIX}{request_id}")
}

/// Request id addressed by a result resource URI.
pub fn parse_results_uri(uri: &str) -> Option<&str> {
    uri.strip_prefix(RESULTS_URI_PREFIX)
        .filter(|id| !id.is_empty())
}

/// Turn `tools/call` arguments into an intent. Inputs are not validated
/// beyond being present strings.
pub fn parse_tool_call(name: &str, arguments: &Value) -> Result<Intent, JsonRpcError> {
    match name {
        FIND_MENU_OPTIONS => Ok(Intent::Search {
            search_term: string_arg(arguments, "search_term")?,
        }),
        ORDER_FOOD => Ok(Intent::Order {
            item_url: string_arg(arguments, "item_url")?,
            item_name: string_arg(arguments, "item_name")?,
        }),
        other => Err(JsonRpcError::invalid_params(format!("Unknown tool: {other}"))),
    }
}

fn string_arg(arguments: &Value, key: &str) -> Result<String, JsonRpcError> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| JsonRpcError::invalid_params(format!("Missing required argument: {key}")))
}

/// Acknowledgement returned by a tool call, naming the resource to poll.
pub fn acknowledgement(intent: &Intent, request_id: &str, poll_wait_secs: u64) -> String {
    let uri = results_uri(request_id);
    match intent {
        Intent::Search { search_term } => {
            let wait = describe_wait(poll_wait_secs);
            format!(
                "Search for '{search_term}' started. Please wait for {wait}, then you can retrieve results using the resource URI: {uri}. Use a terminal sleep statement to wait for {wait}."
            )
        }
        Intent::Order { item_name, .. } => format!(
            "Order for '{item_name}' started. Your order is being processed. You can check its status using the resource URI: {uri}."
        ),
    }
}

pub fn not_found_text(request_id: &str) -> String {
    format!("No search results found for request ID: {request_id}")
}

fn describe_wait(secs: u64) -> String {
    match secs {
        60 => "1 minute".to_string(),
        s if s >= 60 && s % 60 == 0 => format!("{} minutes", s / 60),
        1 => "1 second".to_string(),
        s => format!("{s} seconds"),
    }
}
