//! `POST /` JSON-RPC dispatch.
//!
//! Errors are returned as JSON-RPC error objects with HTTP 200; `message/stream`
//! answers with an SSE stream of JSON-RPC responses.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::routes::AppState;
use crate::a2a::jsonrpc::JSONRPC_VERSION;
use crate::a2a::types::{MessageSendParams, Task, TaskEvent, TaskIdParams, TaskQueryParams};
use crate::a2a::{JsonRpcRequest, JsonRpcResponse, RpcError};

// ─────────────────────────────────────────────────────────────────────────────
// Dispatch
// ─────────────────────────────────────────────────────────────────────────────

pub async fn handle(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let raw: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => return error(Value::Null, RpcError::Parse(e.to_string())),
    };
    let id = raw.get("id").cloned().unwrap_or(Value::Null);

    let request: JsonRpcRequest = match serde_json::from_value(raw) {
        Ok(r) => r,
        Err(e) => return error(id, RpcError::InvalidRequest(e.to_string())),
    };
    if request.jsonrpc != JSONRPC_VERSION {
        return error(
            id,
            RpcError::InvalidRequest(format!("unsupported jsonrpc version {}", request.jsonrpc)),
        );
    }

    tracing::debug!(method = %request.method, "JSON-RPC request");
    let handler = &state.handler;

    match request.method.as_str() {
        "message/send" => {
            let result = match params::<MessageSendParams>(request.params) {
                Ok(p) => handler.on_message_send(p).await,
                Err(e) => Err(e),
            };
            respond(id, result.and_then(task_value))
        }
        "message/stream" => match params::<MessageSendParams>(request.params) {
            Ok(p) => match handler.on_message_stream(p).await {
                Ok(events) => stream_response(id, events).into_response(),
                Err(e) => error(id, e),
            },
            Err(e) => error(id, e),
        },
        "tasks/get" => {
            let result = match params::<TaskQueryParams>(request.params) {
                Ok(p) => handler.on_get_task(p).await,
                Err(e) => Err(e),
            };
            respond(id, result.and_then(task_value))
        }
        "tasks/cancel" => {
            let result = match params::<TaskIdParams>(request.params) {
                Ok(p) => handler.on_cancel_task(p).await,
                Err(e) => Err(e),
            };
            respond(id, result.and_then(task_value))
        }
        "tasks/pushNotificationConfig/set"
        | "tasks/pushNotificationConfig/get"
        | "tasks/pushNotificationConfig/list"
        | "tasks/pushNotificationConfig/delete" => error(id, RpcError::PushNotificationNotSupported),
        "tasks/resubscribe" => error(id, RpcError::UnsupportedOperation(request.method)),
        _ => error(id, RpcError::MethodNotFound(request.method)),
    }
}

fn params<T: DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    serde_json::from_value(params).map_err(|e| RpcError::InvalidParams(e.to_string()))
}

fn task_value(task: Task) -> Result<Value, RpcError> {
    serde_json::to_value(TaskEvent::Task(task)).map_err(|e| RpcError::Internal(e.to_string()))
}

fn respond(id: Value, result: Result<Value, RpcError>) -> Response {
    match result {
        Ok(value) => Json(JsonRpcResponse::success(id, value)).into_response(),
        Err(e) => error(id, e),
    }
}

fn error(id: Value, error: RpcError) -> Response {
    tracing::debug!(code = error.code(), "JSON-RPC error: {}", error);
    Json(JsonRpcResponse::error(id, &error)).into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// Streaming
// ─────────────────────────────────────────────────────────────────────────────

fn stream_response(
    id: Value,
    mut events: crate::a2a::EventStream,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        while let Some(event) = events.next().await {
            let is_final = event.is_final();
            let response = match serde_json::to_value(&event) {
                Ok(value) => JsonRpcResponse::success(id.clone(), value),
                Err(e) => JsonRpcResponse::error(id.clone(), &RpcError::Internal(e.to_string())),
            };
            match Event::default().json_data(&response) {
                Ok(sse) => yield Ok(sse),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize SSE event; dropping");
                }
            }
            if is_final {
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("keepalive"),
    )
}
