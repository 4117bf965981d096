//! Structured problem details (RFC 7807 style bodies used on the SBI)

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub problem_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    /// Application error cause, e.g. `SYSTEM_FAILURE`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ProblemDetails {
    fn with(status: u16, title: &str, cause: &str, detail: impl Into<String>) -> Self {
        Self {
            problem_type: None,
            title: Some(title.to_string()),
            status,
            detail: Some(detail.into()),
            instance: None,
            cause: Some(cause.to_string()),
        }
    }

    /// Generic failure used when no structured body was received
    pub fn system_failure(detail: impl Into<String>) -> Self {
        Self::with(500, "System failure", "SYSTEM_FAILURE", detail)
    }

    pub fn data_not_found(detail: impl Into<String>) -> Self {
        Self::with(404, "Data not found", "DATA_NOT_FOUND", detail)
    }

    pub fn malformed_request_syntax(detail: impl Into<String>) -> Self {
        Self::with(400, "Malformed request syntax", "MALFORMED_REQUEST_SYNTAX", detail)
    }

    pub fn payload_too_large(detail: impl Into<String>) -> Self {
        Self::with(413, "Payload too large", "PAYLOAD_TOO_LARGE", detail)
    }

    /// Problem synthesised from a response whose body could not be decoded
    pub fn undecodable(status: u16, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: Some(detail.into()),
            ..Default::default()
        }
    }
}

impl fmt::Display for ProblemDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}", self.status)?;
        if let Some(cause) = &self.cause {
            write!(f, " ({})", cause)?;
        }
        if let Some(detail) = &self.detail {
            write!(f, ": {}", detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProblemDetails {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_failure_carries_raw_text() {
        let pd = ProblemDetails::system_failure("connection refused");
        assert_eq!(pd.status, 500);
        assert_eq!(pd.cause.as_deref(), Some("SYSTEM_FAILURE"));
        assert_eq!(pd.detail.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_display() {
        let pd = ProblemDetails::data_not_found("subscription not found");
        assert_eq!(pd.to_string(), "status 404 (DATA_NOT_FOUND): subscription not found");
    }

    #[test]
    fn test_type_field_name() {
        let pd: ProblemDetails =
            serde_json::from_str(r#"{"type":"about:blank","status":403,"cause":"FORBIDDEN"}"#)
                .unwrap();
        assert_eq!(pd.problem_type.as_deref(), Some("about:blank"));
        assert_eq!(pd.status, 403);
    }
}
