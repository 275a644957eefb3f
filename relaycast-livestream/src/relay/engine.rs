// Relay engine adapter
//
// The registry talks to the external relay engine only through this trait,
// so the two driving strategies are interchangeable at construction time.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use relaycast_core::config::{EngineConfig, EngineStrategy};
use relaycast_core::StreamRecord;

use super::declarative::DeclarativeEngine;
use super::imperative::ImperativeEngine;
use crate::error::{EngineError, EngineResult};

/// Full registry state at one point in time.
///
/// `generation` increases with every registry mutation, so an adapter can
/// tell a stale snapshot from a fresh one when calls overlap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelaySnapshot {
    pub generation: u64,
    /// Sorted by stream key.
    pub streams: Vec<StreamRecord>,
}

impl RelaySnapshot {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&StreamRecord> {
        self.streams
            .binary_search_by(|record| record.key.as_str().cmp(key))
            .ok()
            .map(|idx| &self.streams[idx])
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Capability set every relay engine strategy provides.
#[async_trait]
pub trait RelayEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Apply a newly added (or replaced) stream. `snapshot` already contains it.
    async fn add_stream(&self, record: &StreamRecord, snapshot: &RelaySnapshot) -> EngineResult<()>;

    /// Drop a stream. `snapshot` no longer contains it.
    async fn remove_stream(&self, key: &str, snapshot: &RelaySnapshot) -> EngineResult<()>;

    /// Bring the engine in line with `snapshot`.
    async fn reconcile(&self, snapshot: &RelaySnapshot) -> EngineResult<()>;

    /// Whether the engine is up and answering.
    async fn health_check(&self) -> EngineResult<()>;
}

/// Build the configured strategy.
pub fn build_engine(config: &EngineConfig) -> EngineResult<Arc<dyn RelayEngine>> {
    let engine: Arc<dyn RelayEngine> = match config.strategy {
        EngineStrategy::Declarative => Arc::new(DeclarativeEngine::from_config(config)?),
        EngineStrategy::Imperative => Arc::new(ImperativeEngine::from_config(config)?),
    };
    Ok(engine)
}

/// GET probe against the engine's status endpoint.
pub(crate) struct StatusProbe {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl StatusProbe {
    pub(crate) fn new(url: impl Into<String>, timeout: Duration) -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            url: url.into(),
            client,
            timeout,
        })
    }

    pub(crate) async fn probe(&self) -> EngineResult<()> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| map_request_error(e, self.timeout))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(EngineError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

/// Request timeouts become `Timeout` with the configured bound.
pub(crate) fn map_request_error(err: reqwest::Error, timeout: Duration) -> EngineError {
    if err.is_timeout() {
        EngineError::Timeout(timeout)
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaycast_core::Destination;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(key: &str) -> StreamRecord {
        StreamRecord::new(key, vec![Destination::new("youtube", "rtmp://a.rtmp.youtube.com/live2/", "k")])
    }

    #[test]
    fn test_snapshot_lookup() {
        let snapshot = RelaySnapshot {
            generation: 3,
            streams: vec![record("a"), record("c"), record("e")],
        };
        assert!(snapshot.contains("c"));
        assert!(!snapshot.contains("d"));
        assert_eq!(snapshot.get("e").unwrap().key, "e");
    }

    #[test]
    fn test_build_engine_selects_strategy() {
        let mut config = EngineConfig::default();
        assert_eq!(build_engine(&config).unwrap().name(), "declarative");

        config.strategy = EngineStrategy::Imperative;
        assert_eq!(build_engine(&config).unwrap().name(), "imperative");
    }

    #[tokio::test]
    async fn test_status_probe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/versions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"code\":0}"))
            .mount(&server)
            .await;

        let probe = StatusProbe::new(format!("{}/api/v1/versions", server.uri()), Duration::from_secs(2)).unwrap();
        probe.probe().await.unwrap();

        let missing = StatusProbe::new(format!("{}/nope", server.uri()), Duration::from_secs(2)).unwrap();
        assert!(matches!(missing.probe().await, Err(EngineError::Rejected { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_status_probe_unreachable() {
        // Port 9 (discard) is not expected to be listening.
        let probe = StatusProbe::new("http://127.0.0.1:9/status", Duration::from_secs(2)).unwrap();
        assert!(matches!(probe.probe().await, Err(EngineError::Unreachable(_))));
    }
}
