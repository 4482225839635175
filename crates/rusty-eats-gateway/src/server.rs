//! Axum-based WebSocket transport.
//!
//! Each text message on `/mcp` is one JSON-RPC frame; replies and
//! notifications for the connection go back on the same socket.

use std::future::Future;
use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::methods::handle_frame;
use crate::session::Session;
use crate::state::GatewayState;

pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/mcp", get(ws_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the WebSocket server on `bind:port` and run until Ctrl-C.
pub async fn start_server(state: Arc<GatewayState>, bind: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{bind}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("MCP server listening on ws://{addr}/mcp");
    serve_listener(state, listener, shutdown_signal()).await
}

/// Serve on an already-bound listener until `shutdown` resolves, then drain
/// background tasks.
pub async fn serve_listener<S>(
    state: Arc<GatewayState>,
    listener: tokio::net::TcpListener,
    shutdown: S,
) -> anyhow::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown)
        .await?;

    state.launcher.shutdown().await;
    info!("MCP server stopped");
    Ok(())
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(state, socket))
}

async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    axum::Json(json!({
        "status": "ok",
        "server": state.server_name(),
        "version": env!("CARGO_PKG_VERSION"),
        "connections": state.connections(),
        "requests": state.store.len(),
        "pending": state.store.pending_count(),
        "active_tasks": state.launcher.active().len(),
    }))
}

async fn handle_ws_connection(state: Arc<GatewayState>, ws: WebSocket) {
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    let session = Session::open(outbound_tx);
    let conn_id = session.id().to_string();
    let open = state.connection_opened();
    info!(conn_id = %conn_id, open, "New MCP connection");

    let (mut ws_tx, mut ws_rx) = ws.split();

    let send_task = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if ws_tx.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg_result) = ws_rx.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                if let Some(reply) = handle_frame(&state, &session, text.as_str()) {
                    let _ = session.outbound().send(reply);
                }
            }
            Ok(Message::Close(_)) => {
                debug!(conn_id = %conn_id, "Client requested close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    // Runs started on this connection keep going; their results stay readable
    // from any other connection through the URI handed out in the ack.
    send_task.abort();
    state.connection_closed();
    info!(conn_id = %conn_id, "MCP connection closed");
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(%e, "Failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
