/// Extracts a required argument from a tool call's JSON arguments, returning
/// `ServerError::InvalidParameter` from the enclosing function when it is absent or mistyped.
macro_rules! extract_required {
    ($args:expr, $key:expr, String) => {
        $args
            .get($key)
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .ok_or($crate::error::ServerError::InvalidParameter {
                name: $key,
                reason: "a non-empty string is required".into(),
            })?
    };
}

/// Extracts an optional argument, falling back to `$default` when it is absent.
/// Present values of the wrong type are rejected rather than silently defaulted.
macro_rules! extract_optional {
    ($args:expr, $key:expr, String) => {
        match $args.get($key) {
            None | Some(::serde_json::Value::Null) => None,
            Some(v) => Some(
                v.as_str()
                    .map(|s| s.trim().to_owned())
                    .ok_or($crate::error::ServerError::InvalidParameter {
                        name: $key,
                        reason: "expected a string".into(),
                    })?,
            ),
        }
    };
    ($args:expr, $key:expr, u64) => {
        match $args.get($key) {
            None | Some(::serde_json::Value::Null) => None,
            Some(v) => Some(v.as_u64().ok_or($crate::error::ServerError::InvalidParameter {
                name: $key,
                reason: "expected a non-negative integer".into(),
            })?),
        }
    };
    ($args:expr, $key:expr, u64, $default:expr) => {
        match $args.get($key) {
            None | Some(::serde_json::Value::Null) => $default,
            Some(v) => v.as_u64().ok_or($crate::error::ServerError::InvalidParameter {
                name: $key,
                reason: "expected a non-negative integer".into(),
            })?,
        }
    };
    ($args:expr, $key:expr, bool, $default:expr) => {
        match $args.get($key) {
            None | Some(::serde_json::Value::Null) => $default,
            Some(v) => v.as_bool().ok_or($crate::error::ServerError::InvalidParameter {
                name: $key,
                reason: "expected a boolean".into(),
            })?,
        }
    };
}
