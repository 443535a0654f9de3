use serde_json::Value;
use thiserror::Error;

/// A wire document could not be turned into a resource graph.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("Invalid JSON:API document: {0}")]
    InvalidDocument(String),
    #[error("Resource at {position} is missing `{field}`")]
    MissingField {
        position: String,
        field: &'static str,
    },
    #[error("Cannot convert {kind} `{id}` into the requested model: {source}")]
    Deserialize {
        kind: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Terminal failures of [`crate::polling::poll_until`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PollError {
    #[error("Condition not met within {attempts} attempts")]
    Timeout { attempts: u32 },
    #[error("Polling cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown response format: {0} (expected raw, mapped or both)")]
    UnknownFormat(String),
    #[error("Invalid condition `{0}` (expected path=value)")]
    InvalidCondition(String),
    #[error("Unknown tracking request type: {0}")]
    UnknownRequestType(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("API token is required (set T49_API_TOKEN)")]
    MissingToken,
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Failures reported by the tracking API or the transport underneath it.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation failed: {message}")]
    Validation {
        status: u16,
        message: String,
        details: Option<Value>,
    },
    #[error("Authentication failed: {message}")]
    Authentication {
        status: Option<u16>,
        message: String,
    },
    #[error("Access forbidden: {message}")]
    Authorization {
        message: String,
        details: Option<Value>,
    },
    #[error("Feature not enabled: {message}")]
    FeatureNotEnabled {
        message: String,
        details: Option<Value>,
    },
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        details: Option<Value>,
    },
    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        message: String,
        details: Option<Value>,
    },
    #[error("Upstream error: {message}")]
    Upstream {
        status: u16,
        message: String,
        details: Option<Value>,
    },
    #[error("Unexpected response status: {status} - {message}")]
    UnexpectedStatus {
        status: u16,
        message: String,
        details: Option<Value>,
    },
    #[error("Transport error: {0}")]
    Transport(String),
}

impl ApiError {
    /// Classifies a failed response by its HTTP status.
    pub fn from_status(status: u16, message: String, details: Option<Value>) -> Self {
        let or = |fallback: String| if message.is_empty() { fallback } else { message.clone() };
        match status {
            400 | 422 => ApiError::Validation { status, message, details },
            401 => ApiError::Authentication {
                status: Some(status),
                message: "Invalid or missing API token".into(),
            },
            403 => {
                let message = or("Access forbidden".into());
                let lowered = message.to_lowercase();
                if lowered.contains("not enabled") || lowered.contains("feature") {
                    ApiError::FeatureNotEnabled { message, details }
                } else {
                    ApiError::Authorization { message, details }
                }
            }
            404 => ApiError::NotFound {
                message: or("Resource not found".into()),
                details,
            },
            429 => ApiError::RateLimited {
                message: or("Rate limit exceeded".into()),
                details,
            },
            500 | 502 | 503 | 504 => ApiError::Upstream {
                status,
                message: or(format!("Upstream server error ({status})")),
                details,
            },
            _ => ApiError::UnexpectedStatus { status, message, details },
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Validation { status, .. }
            | ApiError::Upstream { status, .. }
            | ApiError::UnexpectedStatus { status, .. } => Some(*status),
            ApiError::Authentication { status, .. } => *status,
            ApiError::Authorization { .. } | ApiError::FeatureNotEnabled { .. } => Some(403),
            ApiError::NotFound { .. } => Some(404),
            ApiError::RateLimited { .. } => Some(429),
            ApiError::Transport(_) => None,
        }
    }
}

/// Pulls a human readable message out of an error response body.
pub fn extract_error_message(body: Option<&Value>) -> String {
    let Some(body) = body else {
        return "Unknown error".into();
    };

    if let Value::String(text) = body {
        return text.clone();
    }
    if let Some(error) = body.get("error").and_then(Value::as_str) {
        return error.to_string();
    }
    match body.get("errors") {
        Some(Value::String(errors)) => return errors.clone(),
        Some(Value::Array(errors)) if !errors.is_empty() => {
            return errors
                .iter()
                .map(|error| {
                    let mut message = ["detail", "title", "code"]
                        .iter()
                        .find_map(|key| error.get(*key).and_then(Value::as_str))
                        .filter(|text| !text.is_empty())
                        .unwrap_or("Unknown error")
                        .to_string();
                    let pointer = error.pointer("/source/pointer").and_then(Value::as_str);
                    if let Some(pointer) = pointer {
                        message.push_str(&format!(" ({pointer})"));
                    }
                    message
                })
                .collect::<Vec<_>>()
                .join("; ");
        }
        _ => {}
    }
    if let Some(message) = body.get("message").and_then(Value::as_str) {
        return message.to_string();
    }
    if let Some(detail) = body.get("detail").and_then(Value::as_str) {
        return detail.to_string();
    }

    "Unknown error".into()
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error(transparent)]
    Poll(#[from] PollError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn joins_json_api_errors_with_pointers() {
        let body = json!({
            "errors": [
                { "detail": "is invalid", "source": { "pointer": "/data/attributes/scac" } },
                { "title": "Missing number" },
                {}
            ]
        });
        assert_eq!(
            extract_error_message(Some(&body)),
            "is invalid (/data/attributes/scac); Missing number; Unknown error"
        );
    }

    #[test]
    fn falls_back_through_message_fields() {
        assert_eq!(extract_error_message(Some(&json!("plain"))), "plain");
        assert_eq!(extract_error_message(Some(&json!({ "error": "boom" }))), "boom");
        assert_eq!(extract_error_message(Some(&json!({ "message": "m" }))), "m");
        assert_eq!(extract_error_message(Some(&json!({ "detail": "d" }))), "d");
        assert_eq!(extract_error_message(Some(&json!({}))), "Unknown error");
        assert_eq!(extract_error_message(None), "Unknown error");
    }

    #[test]
    fn classifies_statuses() {
        assert!(matches!(
            ApiError::from_status(422, "bad".into(), None),
            ApiError::Validation { status: 422, .. }
        ));
        assert!(matches!(
            ApiError::from_status(403, "Feature not enabled for account".into(), None),
            ApiError::FeatureNotEnabled { .. }
        ));
        assert!(matches!(
            ApiError::from_status(403, String::new(), None),
            ApiError::Authorization { ref message, .. } if message == "Access forbidden"
        ));
        assert!(matches!(
            ApiError::from_status(503, String::new(), None),
            ApiError::Upstream { status: 503, ref message, .. }
                if message == "Upstream server error (503)"
        ));
        assert_eq!(ApiError::from_status(418, "teapot".into(), None).status(), Some(418));
    }
}
