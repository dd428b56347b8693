//! HTTP API for one agent service.
//!
//! ## Endpoints
//!
//! - `GET /.well-known/agent.json` (and `agent-card.json`) - Agent card
//! - `POST /` - JSON-RPC task methods (`message/send`, `message/stream`, `tasks/get`, `tasks/cancel`)
//! - `GET /health` - Health check

mod routes;
mod rpc;

pub use routes::{router, serve, serve_on, AppState, SHUTDOWN_GRACE};
