//! Gateway integration tests: start a real MCP server and drive it over WS + HTTP
//! with stub agent runners.
//!
//! Run with: `cargo test -p rusty-eats-gateway --test integration`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::Notify;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use rusty_eats_agent::{AgentRunner, AgentStep, StepObserver};
use rusty_eats_core::config::Config;
use rusty_eats_gateway::GatewayState;

type Ws = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Never returns and never fails.
struct NeverRunner;

#[async_trait]
impl AgentRunner for NeverRunner {
    async fn run(&self, _task: &str, _observer: &dyn StepObserver) -> anyhow::Result<String> {
        std::future::pending().await
    }
}

/// Waits for the gate, reports two steps plus completion, then returns or fails.
struct GatedRunner {
    gate: Arc<Notify>,
    outcome: Result<&'static str, &'static str>,
}

#[async_trait]
impl AgentRunner for GatedRunner {
    async fn run(&self, _task: &str, observer: &dyn StepObserver) -> anyhow::Result<String> {
        self.gate.notified().await;
        for (number, is_done) in [(1, false), (2, false), (2, true)] {
            observer
                .on_step(&AgentStep {
                    number,
                    is_done,
                    summary: "step".into(),
                })
                .await;
        }
        match self.outcome {
            Ok(text) => Ok(text.to_string()),
            Err(msg) => Err(anyhow::anyhow!(msg)),
        }
    }
}

/// Answers with the task text it was given.
struct EchoRunner;

#[async_trait]
impl AgentRunner for EchoRunner {
    async fn run(&self, task: &str, _observer: &dyn StepObserver) -> anyhow::Result<String> {
        Ok(task.to_string())
    }
}

/// Start a server on an ephemeral port and return its state + port.
async fn start_test_server(runner: Arc<dyn AgentRunner>) -> (Arc<GatewayState>, u16) {
    let state = Arc::new(GatewayState::new(Config::default(), runner));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server_state = state.clone();
    tokio::spawn(async move {
        let _ = rusty_eats_gateway::serve_listener(
            server_state,
            listener,
            std::future::pending(),
        )
        .await;
    });

    (state, port)
}

async fn connect(port: u16) -> Ws {
    let url = format!("ws://127.0.0.1:{port}/mcp");
    let (ws, _) = connect_async(&url).await.expect("WS connect failed");
    ws
}

async fn next_frame(ws: &mut Ws) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Send a request and wait for its response, collecting notifications seen on the way.
async fn request(ws: &mut Ws, frame: Value, notifications: &mut Vec<Value>) -> Value {
    let id = frame["id"].clone();
    ws.send(Message::Text(frame.to_string().into())).await.unwrap();
    loop {
        let frame = next_frame(ws).await;
        if frame.get("method").is_some() {
            notifications.push(frame);
        } else if frame["id"] == id {
            return frame;
        }
    }
}

fn call_tool(id: Value, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {
            "name": name,
            "arguments": arguments,
            "_meta": { "progressToken": "progress-1" }
        }
    })
}

fn read_results(id: u64, request_id: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "resources/read",
        "params": { "uri": format!("resource://search_results/{request_id}") }
    })
}

fn ack_text(response: &Value) -> &str {
    response["result"]["content"][0]["text"].as_str().unwrap()
}

/// Request id named by the resource URI in an acknowledgement.
fn ack_request_id(response: &Value) -> String {
    let text = ack_text(response);
    let start = text.find("resource://search_results/").expect("ack names no resource")
        + "resource://search_results/".len();
    text[start..]
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '.')
        .collect()
}

async fn wait_terminal(state: &GatewayState, request_id: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !state.store.get(request_id).is_some_and(|e| e.is_terminal()) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("request did not resolve");
}

fn resource_text(response: &Value) -> &str {
    response["result"]["contents"][0]["text"].as_str().unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (_state, port) = start_test_server(Arc::new(NeverRunner)).await;

    let resp = reqwest::get(format!("http://127.0.0.1:{port}/health"))
        .await
        .expect("Health request failed");

    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
    assert_eq!(body["requests"], 0);
    assert_eq!(body["active_tasks"], 0);
}

#[tokio::test]
async fn test_initialize_and_list() {
    let (_state, port) = start_test_server(Arc::new(NeverRunner)).await;
    let mut ws = connect(port).await;
    let mut notes = Vec::new();

    let init = request(
        &mut ws,
        json!({"jsonrpc": "2.0", "id": 0, "method": "initialize",
               "params": {"protocolVersion": "2024-11-05", "capabilities": {},
                          "clientInfo": {"name": "it", "version": "0"}}}),
        &mut notes,
    )
    .await;
    assert_eq!(init["result"]["serverInfo"]["name"], "uber_eats");
    ws.send(Message::Text(
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"})
            .to_string()
            .into(),
    ))
    .await
    .unwrap();

    let tools = request(
        &mut ws,
        json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
        &mut notes,
    )
    .await;
    let names: Vec<&str> = tools["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["find_menu_options", "order_food"]);
}

#[tokio::test]
async fn test_unknown_request_id_is_not_found() {
    let (_state, port) = start_test_server(Arc::new(NeverRunner)).await;
    let mut ws = connect(port).await;
    let resp = request(&mut ws, read_results(1, "never-seeded"), &mut Vec::new()).await;
    assert_eq!(
        resource_text(&resp),
        "No search results found for request ID: never-seeded"
    );
}

#[tokio::test]
async fn test_ack_returns_while_runner_never_finishes() {
    let (state, port) = start_test_server(Arc::new(NeverRunner)).await;
    let mut ws = connect(port).await;
    let mut notes = Vec::new();

    let resp = tokio::time::timeout(
        Duration::from_secs(2),
        request(
            &mut ws,
            call_tool(json!(11), "find_menu_options", json!({"search_term": "pizza"})),
            &mut notes,
        ),
    )
    .await
    .expect("tool call blocked on the agent runner");
    let request_id = ack_request_id(&resp);
    assert!(request_id.ends_with(":11"));

    let read = request(&mut ws, read_results(12, &request_id), &mut notes).await;
    assert_eq!(
        resource_text(&read),
        "Search for 'pizza' in progress. Check back in 30 seconds"
    );
    assert_eq!(state.launcher.active().len(), 1);
}

#[tokio::test]
async fn test_search_scenario_completes() {
    let gate = Arc::new(Notify::new());
    let runner = Arc::new(GatedRunner {
        gate: gate.clone(),
        outcome: Ok("Found: Margherita, $12"),
    });
    let (state, port) = start_test_server(runner).await;
    let mut ws = connect(port).await;
    let mut notes = Vec::new();

    let ack = request(
        &mut ws,
        call_tool(json!(7), "find_menu_options", json!({"search_term": "pizza"})),
        &mut notes,
    )
    .await;
    let request_id = ack_request_id(&ack);
    assert!(request_id.ends_with(":7"));

    let pending = request(&mut ws, read_results(8, &request_id), &mut notes).await;
    assert_eq!(
        resource_text(&pending),
        "Search for 'pizza' in progress. Check back in 30 seconds"
    );

    gate.notify_one();

    // Three progress notifications: two steps and the completion step.
    while notes
        .iter()
        .filter(|n| n["method"] == "notifications/progress")
        .count()
        < 3
    {
        notes.push(next_frame(&mut ws).await);
    }
    let progress: Vec<u64> = notes
        .iter()
        .filter(|n| n["method"] == "notifications/progress")
        .map(|n| n["params"]["progress"].as_u64().unwrap())
        .collect();
    assert_eq!(progress, vec![1, 2, 3]);
    assert!(notes.iter().any(|n| n["params"]["data"] == "Step 3 completed"));

    wait_terminal(&state, &request_id).await;

    let done = request(&mut ws, read_results(9, &request_id), &mut notes).await;
    assert_eq!(resource_text(&done), "Found: Margherita, $12");

    // Completed entries never revert.
    let again = request(&mut ws, read_results(10, &request_id), &mut notes).await;
    assert_eq!(resource_text(&again), "Found: Margherita, $12");
}

#[tokio::test]
async fn test_order_scenario_failure() {
    let gate = Arc::new(Notify::new());
    gate.notify_one();
    let runner = Arc::new(GatedRunner {
        gate,
        outcome: Err("checkout failed"),
    });
    let (_state, port) = start_test_server(runner).await;
    let mut ws = connect(port).await;
    let mut notes = Vec::new();

    let ack = request(
        &mut ws,
        call_tool(
            json!("order-1"),
            "order_food",
            json!({"item_url": "http://x/item", "item_name": "Burger"}),
        ),
        &mut notes,
    )
    .await;
    assert!(ack_text(&ack).starts_with("Order for 'Burger' started."));
    let request_id = ack_request_id(&ack);

    // The error notification is the last thing the run emits.
    while !notes.iter().any(|n| n["params"]["level"] == "error") {
        notes.push(next_frame(&mut ws).await);
    }
    let error = notes
        .iter()
        .find(|n| n["params"]["level"] == "error")
        .unwrap();
    assert_eq!(
        error["params"]["data"],
        "Error ordering 'Burger': checkout failed"
    );
    assert!(notes.iter().any(|n| n["params"]["data"] == "Order step 1 completed"));

    let read = request(&mut ws, read_results(2, &request_id), &mut notes).await;
    let text = resource_text(&read);
    assert!(text.contains("checkout failed"));
    assert!(text.starts_with("Error: "));
}

#[tokio::test]
async fn test_missing_argument_is_invalid_params() {
    let (state, port) = start_test_server(Arc::new(NeverRunner)).await;
    let mut ws = connect(port).await;
    let resp = request(
        &mut ws,
        call_tool(json!(1), "order_food", json!({"item_name": "Burger"})),
        &mut Vec::new(),
    )
    .await;
    assert_eq!(resp["error"]["code"], -32602);
    assert!(state.store.is_empty());
}

#[tokio::test]
async fn test_connections_reusing_an_rpc_id_keep_their_own_results() {
    let (state, port) = start_test_server(Arc::new(EchoRunner)).await;
    let mut a = connect(port).await;
    let mut b = connect(port).await;
    let mut notes = Vec::new();

    let ack_a = request(
        &mut a,
        call_tool(json!(1), "find_menu_options", json!({"search_term": "pizza"})),
        &mut notes,
    )
    .await;
    let ack_b = request(
        &mut b,
        call_tool(json!(1), "find_menu_options", json!({"search_term": "sushi"})),
        &mut notes,
    )
    .await;
    let id_a = ack_request_id(&ack_a);
    let id_b = ack_request_id(&ack_b);
    assert_ne!(id_a, id_b);

    wait_terminal(&state, &id_a).await;
    wait_terminal(&state, &id_b).await;

    let read_a = request(&mut a, read_results(2, &id_a), &mut notes).await;
    assert!(resource_text(&read_a).contains("pizza"));
    assert!(!resource_text(&read_a).contains("sushi"));
    let read_b = request(&mut b, read_results(2, &id_b), &mut notes).await;
    assert!(resource_text(&read_b).contains("sushi"));
    assert!(!resource_text(&read_b).contains("pizza"));
}
