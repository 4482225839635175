//! MCP tool host for Rusty Eats.
//!
//! The gateway speaks MCP (JSON-RPC 2.0) over stdio or WebSocket, exposes the
//! `find_menu_options` and `order_food` tools plus the
//! `resource://search_results/{request_id}` resource, and hands every tool
//! call to the [`TaskLauncher`], which runs the browser agent in the
//! background and records the outcome in the result store.

pub mod catalog;
pub mod launcher;
pub mod methods;
pub mod reporter;
pub mod server;
pub mod session;
pub mod state;
pub mod stdio;

pub use launcher::TaskLauncher;
pub use reporter::{McpReporter, Reporter};
pub use server::{serve_listener, start_server};
pub use session::Session;
pub use state::GatewayState;
pub use stdio::{serve_io, serve_stdio};
