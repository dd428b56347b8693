//! JSON-RPC 2.0 envelope and A2A error codes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorBody {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorBody>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, error: &RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error.to_body()),
        }
    }
}

/// Request-level failures, mapped to JSON-RPC error objects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    #[error("Invalid JSON payload")]
    Parse(String),

    #[error("Request payload validation error")]
    InvalidRequest(String),

    #[error("Method not found")]
    MethodNotFound(String),

    #[error("Invalid parameters")]
    InvalidParams(String),

    #[error("Internal error")]
    Internal(String),

    #[error("Task not found")]
    TaskNotFound(String),

    #[error("Task cannot be canceled")]
    TaskNotCancelable(String),

    #[error("Push Notification is not supported")]
    PushNotificationNotSupported,

    #[error("This operation is not supported")]
    UnsupportedOperation(String),
}

impl RpcError {
    pub fn code(&self) -> i64 {
        match self {
            RpcError::Parse(_) => -32700,
            RpcError::InvalidRequest(_) => -32600,
            RpcError::MethodNotFound(_) => -32601,
            RpcError::InvalidParams(_) => -32602,
            RpcError::Internal(_) => -32603,
            RpcError::TaskNotFound(_) => -32001,
            RpcError::TaskNotCancelable(_) => -32002,
            RpcError::PushNotificationNotSupported => -32003,
            RpcError::UnsupportedOperation(_) => -32004,
        }
    }

    fn detail(&self) -> Option<&str> {
        match self {
            RpcError::Parse(d)
            | RpcError::InvalidRequest(d)
            | RpcError::MethodNotFound(d)
            | RpcError::InvalidParams(d)
            | RpcError::Internal(d)
            | RpcError::TaskNotFound(d)
            | RpcError::TaskNotCancelable(d)
            | RpcError::UnsupportedOperation(d) => Some(d.as_str()),
            RpcError::PushNotificationNotSupported => None,
        }
    }

    pub fn to_body(&self) -> JsonRpcErrorBody {
        JsonRpcErrorBody {
            code: self.code(),
            message: self.to_string(),
            data: self
                .detail()
                .filter(|d| !d.is_empty())
                .map(|d| Value::String(d.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_response_carries_code_and_detail() {
        let response = JsonRpcResponse::error(json!(7), &RpcError::TaskNotFound("t-9".into()));
        let json = serde_json::to_value(&response).expect("serialize");
        assert_eq!(
            json,
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "error": {"code": -32001, "message": "Task not found", "data": "t-9"}
            })
        );
    }

    #[test]
    fn codes_match_the_protocol() {
        assert_eq!(RpcError::Parse(String::new()).code(), -32700);
        assert_eq!(RpcError::TaskNotCancelable(String::new()).code(), -32002);
        assert_eq!(RpcError::PushNotificationNotSupported.code(), -32003);
        assert_eq!(RpcError::UnsupportedOperation(String::new()).code(), -32004);
        assert!(RpcError::PushNotificationNotSupported.to_body().data.is_none());
    }
}
