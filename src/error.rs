use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid JSON-RPC version: {0}")]
    InvalidJsonRpcVersion(String),
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    #[error("Missing parameters")]
    MissingParameters,
    #[error("Missing tool name")]
    MissingToolName,
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error(transparent)]
    Tracking(#[from] tracking_sdk::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<tracking_sdk::PollError> for ServerError {
    fn from(err: tracking_sdk::PollError) -> Self {
        ServerError::Tracking(err.into())
    }
}

impl From<tracking_sdk::ParseError> for ServerError {
    fn from(err: tracking_sdk::ParseError) -> Self {
        ServerError::Tracking(err.into())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn parse_error() -> Self {
        JsonRpcError {
            code: -32700,
            message: "Parse error".into(),
            data: None,
        }
    }

    pub fn too_large() -> Self {
        JsonRpcError {
            code: -32700,
            message: "Request too large".into(),
            data: None,
        }
    }
}

impl ServerError {
    pub fn to_json_rpc_error(&self) -> JsonRpcError {
        let code = match self {
            ServerError::InvalidJsonRpcVersion(_) => -32600,
            ServerError::MethodNotFound(_) => -32601,
            ServerError::MissingParameters
            | ServerError::MissingToolName
            | ServerError::InvalidParameter { .. }
            | ServerError::UnknownTool(_) => -32602,
            _ => -32603,
        };
        JsonRpcError {
            code,
            message: self.to_string(),
            data: None,
        }
    }

    /// Errors raised by the tracking API itself are reported as failed tool results
    /// rather than protocol errors, so the caller sees the API's message.
    pub fn is_tool_failure(&self) -> bool {
        matches!(self, ServerError::Tracking(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracking_sdk::{ApiError, PollError};

    #[test]
    fn maps_protocol_errors_to_codes() {
        assert_eq!(ServerError::MethodNotFound("x".into()).to_json_rpc_error().code, -32601);
        assert_eq!(ServerError::UnknownTool("x".into()).to_json_rpc_error().code, -32602);
        assert_eq!(
            ServerError::InvalidParameter {
                name: "format",
                reason: "bad".into()
            }
            .to_json_rpc_error()
            .code,
            -32602
        );
        let api: ServerError =
            tracking_sdk::Error::from(ApiError::Transport("reset".into())).into();
        assert_eq!(api.to_json_rpc_error().code, -32603);
    }

    #[test]
    fn tracking_errors_are_tool_failures() {
        let poll: ServerError = PollError::Timeout { attempts: 3 }.into();
        assert!(poll.is_tool_failure());
        assert_eq!(poll.to_string(), "Condition not met within 3 attempts");
        assert!(!ServerError::MissingParameters.is_tool_failure());
    }
}
