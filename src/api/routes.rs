//! HTTP route definitions.

use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, routing::get, routing::post, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::rpc;
use crate::a2a::types::AgentCard;
use crate::a2a::RequestHandler;

/// Shared application state.
pub struct AppState {
    pub card: AgentCard,
    pub handler: RequestHandler,
}

/// Build the router for one agent service.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", post(rpc::handle))
        .route("/.well-known/agent.json", get(agent_card))
        .route("/.well-known/agent-card.json", get(agent_card))
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// How long in-flight requests may run after a shutdown signal.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Serve `state` on `host:port` until `shutdown` is cancelled.
///
/// See [`serve_on`] for how in-flight requests are drained.
pub async fn serve<F>(
    state: Arc<AppState>,
    host: &str,
    port: u16,
    shutdown: CancellationToken,
    drain_deadline: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send,
{
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Starting server on {}", listener.local_addr()?);
    serve_on(listener, state, shutdown, drain_deadline).await
}

/// Serve on an already bound listener.
///
/// Once `shutdown` is cancelled the listener stops accepting and in-flight
/// requests are drained until `drain_deadline` resolves. It is only polled
/// after the signal. Requests still running at the deadline are abandoned.
pub async fn serve_on<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: CancellationToken,
    drain_deadline: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send,
{
    let signal = shutdown.clone();
    let server = axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { signal.cancelled().await })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return result,
        _ = shutdown.cancelled() => {}
    }

    tokio::select! {
        result = &mut server => result,
        _ = drain_deadline => {
            tracing::warn!("In-flight requests did not finish before the shutdown deadline");
            Ok(())
        }
    }
}

async fn agent_card(State(state): State<Arc<AppState>>) -> Json<AgentCard> {
    Json(state.card.clone())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "agent": state.card.name,
    }))
}
