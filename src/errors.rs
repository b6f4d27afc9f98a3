use thiserror::Error;

/// Errors surfaced by the session layer. Messages are user-facing and must
/// never carry token or password material.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Request failed ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("{0}")]
    Credentials(String),
    #[error("Response error: {0}")]
    Parse(String),
    #[error("Request error: {0}")]
    Serialization(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("No refresh token available")]
    NoRefreshToken,
}

impl AppError {
    /// Message suitable for a form error or CLI output, without the variant prefix.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(message)
            | Self::Network(message)
            | Self::Timeout(message)
            | Self::Unauthorized(message)
            | Self::Credentials(message)
            | Self::Parse(message)
            | Self::Serialization(message)
            | Self::Storage(message) => message.clone(),
            Self::Http { message, .. } => message.clone(),
            Self::NoRefreshToken => self.to_string(),
        }
    }

    /// Transport failures are soft during bootstrap and trigger the refresh fallback.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}
