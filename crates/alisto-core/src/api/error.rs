use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// The server answered but reported `success: false`.
    #[error("{0}")]
    Rejected(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Prefer the envelope's `message` when the error body is one.
    fn body_message(body: &str) -> String {
        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or_else(|| Self::truncate_body(body))
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = Self::body_message(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(message),
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(message),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, message)),
        }
    }

    /// Build the error for a `success: false` envelope.
    pub fn rejected(message: Option<String>, errors: &[String]) -> Self {
        let text = match message {
            Some(m) if !m.is_empty() => m,
            _ if !errors.is_empty() => errors.join("; "),
            _ => "Request failed".to_string(),
        };
        ApiError::Rejected(text)
    }

    /// Whether the request never got an answer (offline, DNS, timeout).
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }

    /// Whether `err` (possibly wrapped in context) is a transport failure.
    pub fn is_network_error(err: &anyhow::Error) -> bool {
        err.chain().any(|cause| {
            cause
                .downcast_ref::<ApiError>()
                .map(ApiError::is_network)
                .unwrap_or(false)
                || cause.downcast_ref::<reqwest::Error>().is_some()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_uses_envelope_message() {
        let err = ApiError::from_status(
            StatusCode::NOT_FOUND,
            r#"{"success":false,"message":"Appointment not found"}"#,
        );
        assert_eq!(err.to_string(), "Resource not found: Appointment not found");

        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, "");
        assert!(matches!(err, ApiError::Unauthorized));

        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(err.to_string(), "Server error: upstream down");
    }

    #[test]
    fn test_long_bodies_are_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 100);
        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body);
        let text = err.to_string();
        assert!(text.contains("(truncated, 600 total bytes)"));
        assert!(text.len() < body.len());
    }

    #[test]
    fn test_rejected_message() {
        let err = ApiError::rejected(Some("Slot already taken".to_string()), &[]);
        assert_eq!(err.to_string(), "Slot already taken");

        let errors = vec!["Email is required".to_string(), "Password too short".to_string()];
        let err = ApiError::rejected(None, &errors);
        assert_eq!(err.to_string(), "Email is required; Password too short");

        assert_eq!(ApiError::rejected(None, &[]).to_string(), "Request failed");
    }

    #[test]
    fn test_is_network_error_through_context() {
        let err = anyhow::Error::from(ApiError::RateLimited).context("Loading hotlines");
        assert!(!ApiError::is_network_error(&err));
    }
}
