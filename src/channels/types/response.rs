use serde::Serialize;
use serde_json::Value;

pub const ERROR_CODE_SEND_TEXT: &str = "01";
pub const ERROR_MESSAGE_SEND_TEXT: &str = "Unable to send text message!";
pub const ERROR_CODE_SEND_BYTES: &str = "02";
pub const ERROR_MESSAGE_SEND_BYTES: &str = "Unable to send binary message!";
pub const ERROR_CODE_INVALID_ARGUMENTS: &str = "03";
pub const ERROR_MESSAGE_INVALID_ARGUMENTS: &str = "Invalid arguments!";
pub const ERROR_CODE_TERMINATED: &str = "04";
pub const ERROR_MESSAGE_TERMINATED: &str = "WebSocket client was terminated!";

/// Reply to a [`MethodCall`](super::MethodCall).
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum MethodResponse {
    Success {
        result: Value,
    },
    Error {
        code: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
    NotImplemented,
}

impl MethodResponse {
    #[must_use]
    pub fn success() -> Self {
        Self::Success {
            result: Value::Null,
        }
    }

    pub fn error<C: Into<String>, M: Into<String>>(code: C, message: M) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(self, details: Value) -> Self {
        match self {
            Self::Error { code, message, .. } => Self::Error {
                code,
                message,
                details: Some(details),
            },
            other => other,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Error code, if this is an error response.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Error { code, .. } => Some(code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn error_serializes_without_absent_details() {
        let response = MethodResponse::error(ERROR_CODE_SEND_TEXT, ERROR_MESSAGE_SEND_TEXT);

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "status": "error",
                "code": "01",
                "message": "Unable to send text message!"
            })
        );
    }

    #[test]
    fn success_carries_null_result() {
        let response = MethodResponse::success();

        assert!(response.is_success());
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "status": "success", "result": null })
        );
    }

    #[test]
    fn details_only_attach_to_errors() {
        let response = MethodResponse::NotImplemented.with_details(json!("x"));
        assert_eq!(response, MethodResponse::NotImplemented);

        let response = MethodResponse::error("03", "bad").with_details(json!("x"));
        assert_eq!(response.error_code(), Some("03"));
    }
}
