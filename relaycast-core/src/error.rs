use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing request fields.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid or revoked stream key, missing credential.
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The operating system could not supply random bytes.
    #[error("Entropy source failure: {0}")]
    Entropy(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the error was caused by the caller rather than by the system.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::Authentication(_) | Self::NotFound(_) | Self::AlreadyExists(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
