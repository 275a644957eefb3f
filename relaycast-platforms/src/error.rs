//! Platform integration error types
//!
//! One error value per platform attempt; fanout attaches it to the platform
//! that produced it.

use std::fmt;
use thiserror::Error;

/// Maximum response body size accepted from a platform API (4 MB).
pub const MAX_RESPONSE_SIZE: usize = 4 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum PlatformError {
    /// The platform is known but no integration was configured for it.
    #[error("Platform not initialized: {0}")]
    NotInitialized(String),

    #[error("Unsupported platform: {0}")]
    Unsupported(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error {status} for {url}")]
    Http { status: reqwest::StatusCode, url: String },

    #[error("API error: {0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The per-platform task panicked or was cancelled.
    #[error("Task failed: {0}")]
    Join(String),

    #[error("Response too large ({size} bytes, max {MAX_RESPONSE_SIZE})")]
    ResponseTooLarge { size: u64 },
}

impl From<reqwest::Error> for PlatformError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for PlatformError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<reqwest::header::InvalidHeaderValue> for PlatformError {
    fn from(err: reqwest::header::InvalidHeaderValue) -> Self {
        Self::Credential(format!("credential is not a valid header value: {err}"))
    }
}

/// Every requested platform failed; nothing was provisioned.
#[derive(Debug, Error)]
pub enum FanoutError {
    #[error("all {} platform(s) failed: {}", .0.len(), FailureList(.0))]
    AllFailed(Vec<(String, PlatformError)>),
}

impl FanoutError {
    #[must_use]
    pub fn failures(&self) -> &[(String, PlatformError)] {
        match self {
            Self::AllFailed(failures) => failures,
        }
    }
}

struct FailureList<'a>(&'a [(String, PlatformError)]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (platform, err)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{platform}: {err}")?;
        }
        Ok(())
    }
}

/// Read a response body with size limit and deserialize as JSON.
pub async fn json_with_limit<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, PlatformError> {
    if let Some(cl) = response.content_length() {
        if cl > MAX_RESPONSE_SIZE as u64 {
            return Err(PlatformError::ResponseTooLarge { size: cl });
        }
    }
    let bytes = response.bytes().await?;
    if bytes.len() > MAX_RESPONSE_SIZE {
        return Err(PlatformError::ResponseTooLarge {
            size: bytes.len() as u64,
        });
    }
    serde_json::from_slice(&bytes).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_http() {
        let err = PlatformError::Http {
            status: reqwest::StatusCode::FORBIDDEN,
            url: "https://example.com/live".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 403 Forbidden for https://example.com/live");
    }

    #[test]
    fn test_all_failed_names_every_platform() {
        let err = FanoutError::AllFailed(vec![
            ("youtube".to_string(), PlatformError::Api("quota exceeded".to_string())),
            ("facebook".to_string(), PlatformError::NotInitialized("facebook".to_string())),
        ]);
        assert_eq!(
            err.to_string(),
            "all 2 platform(s) failed: youtube: API error: quota exceeded; facebook: Platform not initialized: facebook"
        );
        assert_eq!(err.failures().len(), 2);
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: PlatformError = json_err.into();
        assert!(matches!(err, PlatformError::Parse(_)));
    }
}
