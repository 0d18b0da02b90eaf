//! Evaluation reply, as sent over the wire

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result of one request.
///
/// Failures carry an empty `value` and a diagnostic in `error`; they never
/// surface as a Rust error past the engine boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    /// Textual result, empty on failure
    pub value: String,
    /// Diagnostic for a failed request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reply {
    /// Successful reply
    pub fn ok(value: impl Into<String>) -> Self {
        Reply {
            value: value.into(),
            error: None,
        }
    }

    /// Failed reply carrying `err` as its diagnostic
    pub fn failure(err: impl fmt::Display) -> Self {
        Reply {
            value: String::new(),
            error: Some(err.to_string()),
        }
    }

    /// Whether the request succeeded
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_omits_error_field() {
        let json = serde_json::to_string(&Reply::ok("Alice")).unwrap();
        assert_eq!(json, r#"{"value":"Alice"}"#);
    }

    #[test]
    fn test_failure_has_empty_value() {
        let reply = Reply::failure("Member not found: a.B.c");
        assert!(!reply.is_ok());
        assert_eq!(reply.value, "");
        let json = serde_json::to_string(&reply).unwrap();
        assert_eq!(json, r#"{"value":"","error":"Member not found: a.B.c"}"#);
    }

    #[test]
    fn test_parse_without_error_field() {
        let reply: Reply = serde_json::from_str(r#"{"value":"42"}"#).unwrap();
        assert_eq!(reply, Reply::ok("42"));
    }
}
