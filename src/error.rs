use thiserror::Error;

/// Failure talking to an upstream AI provider (OpenAI or ElevenLabs).
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{provider} API key not configured")]
    MissingApiKey { provider: &'static str },

    #[error("{provider} API error ({status}): {body}")]
    Api {
        provider: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl UpstreamError {
    /// Retry 429 (rate limit), 5xx and transport errors.
    /// Other 4xx errors and local failures are not retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Api { status, .. } => {
                status.as_u16() == 429 || status.is_server_error()
            }
            UpstreamError::Network(_) | UpstreamError::EmptyResponse { .. } => true,
            UpstreamError::MissingApiKey { .. } | UpstreamError::InvalidInput(_) => false,
        }
    }

    /// Whether the provider rejected the call for quota, billing or rate reasons.
    pub fn is_quota_exceeded(&self) -> bool {
        match self {
            UpstreamError::Api { status, body, .. } => {
                let body = body.to_lowercase();
                status.as_u16() == 429
                    || body.contains("quota")
                    || body.contains("billing")
                    || body.contains("rate limit")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn api_error(status: u16, body: &str) -> UpstreamError {
        UpstreamError::Api {
            provider: "OpenAI",
            status: StatusCode::from_u16(status).unwrap(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(api_error(429, "slow down").is_retryable());
        assert!(api_error(500, "oops").is_retryable());
        assert!(api_error(503, "unavailable").is_retryable());
    }

    #[test]
    fn test_client_errors_not_retryable() {
        assert!(!api_error(400, "bad request").is_retryable());
        assert!(!api_error(401, "unauthorized").is_retryable());
        assert!(!UpstreamError::MissingApiKey { provider: "OpenAI" }.is_retryable());
    }

    #[test]
    fn test_empty_response_is_retryable() {
        assert!(UpstreamError::EmptyResponse { provider: "OpenAI" }.is_retryable());
    }

    #[test]
    fn test_quota_detection() {
        assert!(api_error(429, "").is_quota_exceeded());
        assert!(api_error(403, "You exceeded your current quota").is_quota_exceeded());
        assert!(api_error(402, "billing hard limit reached").is_quota_exceeded());
        assert!(!api_error(500, "internal").is_quota_exceeded());
    }

    #[test]
    fn test_display_includes_status() {
        let message = api_error(500, "Internal Server Error").to_string();
        assert!(message.contains("500"));
        assert!(message.contains("OpenAI"));
    }
}
