//! Error types for mirror-review

/// Result type for mirror-review operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the review platform
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request never produced a response (DNS, TLS, connection, timeout).
    #[error("Review platform transport error: {0}")]
    Transport(String),

    /// The platform answered with a non-success status.
    #[error("Review platform API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response body did not have the expected shape.
    #[error("Could not decode review platform response: {0}")]
    Decode(String),

    #[error("Repository '{name}' not found on the review platform")]
    RepositoryNotFound { name: String },

    #[error("Invalid review platform configuration: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Decode(value.to_string())
        } else {
            Self::Transport(value.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}
