use thiserror::Error;

/// Failures talking to the inventory API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Response decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("No access token found. Hint: set GOOGLE_OAUTH_ACCESS_TOKEN or pass a token explicitly")]
    MissingCredential,

    #[error("Access token contains characters that cannot be sent in a header")]
    InvalidCredential,
}

impl ApiError {
    /// Create an HTTP status error.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status { status, body: body.into() }
    }

    /// Create an invalid base URL error.
    pub fn invalid_base_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidBaseUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }
}
