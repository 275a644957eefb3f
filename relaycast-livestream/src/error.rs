use std::time::Duration;
use thiserror::Error;

use relaycast_platforms::FanoutError;

/// Failure talking to the external relay engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("relay engine call timed out after {0:?}")]
    Timeout(Duration),

    /// The reload command ran but exited unsuccessfully.
    #[error("reload command exited with {status}: {output}")]
    CommandFailed { status: String, output: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("relay engine unreachable: {0}")]
    Unreachable(String),

    /// The stream key or base URL cannot form a control API address.
    #[error("invalid relay engine address: {0}")]
    InvalidAddress(String),

    #[error("relay engine rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to render relay configuration: {0}")]
    Render(#[from] serde_json::Error),
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Unreachable(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum StreamError {
    /// The registry was updated but the engine did not accept the change.
    #[error("relay engine reconciliation failed: {0}")]
    Engine(#[from] EngineError),

    #[error("worker {0} is already running")]
    AlreadyExists(String),

    #[error("failed to start worker {unit}: {reason}")]
    WorkerSpawn { unit: String, reason: String },

    #[error("worker {unit} exited abnormally: {reason}")]
    WorkerExit { unit: String, reason: String },

    /// The worker ignored the stop signal for the whole grace period and was killed.
    #[error("worker {unit} did not stop within {grace:?} and was killed")]
    TerminationTimeout { unit: String, grace: Duration },

    #[error(transparent)]
    Core(#[from] relaycast_core::Error),

    #[error(transparent)]
    Fanout(#[from] FanoutError),
}

pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::CommandFailed {
            status: "exit status: 1".to_string(),
            output: "config parse error".to_string(),
        };
        assert_eq!(err.to_string(), "reload command exited with exit status: 1: config parse error");

        let err = StreamError::from(EngineError::Timeout(Duration::from_secs(5)));
        assert_eq!(
            err.to_string(),
            "relay engine reconciliation failed: relay engine call timed out after 5s"
        );
    }

    #[test]
    fn test_core_error_is_transparent() {
        let err = StreamError::from(relaycast_core::Error::Authentication("no stream key".to_string()));
        assert_eq!(err.to_string(), "Authentication error: no stream key");
    }
}
