// Stream relay registry
//
// Authoritative map from ingest stream key to its ordered egress
// destinations. Each mutation is applied to the map first and then pushed
// to the relay engine; an engine failure does not undo the map change; the
// error is returned so the caller knows the change only partially happened.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use relaycast_core::config::RtmpConfig;
use relaycast_core::{redact, Destination, StreamRecord};

use super::engine::{RelayEngine, RelaySnapshot};
use crate::error::{EngineResult, Result};

#[derive(Default)]
struct RegistryState {
    generation: u64,
    streams: BTreeMap<String, StreamRecord>,
}

impl RegistryState {
    fn snapshot(&self) -> RelaySnapshot {
        RelaySnapshot {
            generation: self.generation,
            streams: self.streams.values().cloned().collect(),
        }
    }
}

pub struct StreamRelayRegistry {
    state: RwLock<RegistryState>,
    engine: Arc<dyn RelayEngine>,
    rtmp: RtmpConfig,
}

impl StreamRelayRegistry {
    pub fn new(engine: Arc<dyn RelayEngine>, rtmp: RtmpConfig) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            engine,
            rtmp,
        }
    }

    /// Record `key` → `destinations` (replacing any previous record) and
    /// apply it to the relay engine.
    ///
    /// On `Err` the record is still in place.
    pub async fn add_stream(&self, key: &str, destinations: Vec<Destination>) -> Result<()> {
        let record = StreamRecord::new(key, destinations);
        let snapshot = {
            let mut state = self.state.write();
            state.generation += 1;
            if state.streams.insert(key.to_string(), record.clone()).is_some() {
                debug!(stream_key = %redact(key), "Replacing existing relay record");
            }
            state.snapshot()
        };

        info!(
            stream_key = %redact(key),
            destinations = record.destinations.len(),
            "Relay stream added"
        );

        self.engine
            .add_stream(&record, &snapshot)
            .await
            .inspect_err(|e| warn!(stream_key = %redact(key), error = %e, "Relay engine rejected new stream"))?;
        Ok(())
    }

    /// Drop `key` and apply the removal. Removing an absent key leaves the
    /// map untouched and still succeeds unless the engine call fails.
    pub async fn remove_stream(&self, key: &str) -> Result<()> {
        let (removed, snapshot) = {
            let mut state = self.state.write();
            let removed = state.streams.remove(key);
            if removed.is_some() {
                state.generation += 1;
            }
            (removed, state.snapshot())
        };

        if removed.is_some() {
            info!(stream_key = %redact(key), "Relay stream removed");
        } else {
            debug!(stream_key = %redact(key), "Remove of idle stream key");
        }

        self.engine
            .remove_stream(key, &snapshot)
            .await
            .inspect_err(|e| warn!(stream_key = %redact(key), error = %e, "Relay engine rejected stream removal"))?;
        Ok(())
    }

    /// Push the full current state to the engine.
    pub async fn reconcile(&self) -> Result<()> {
        let snapshot = self.snapshot();
        self.engine.reconcile(&snapshot).await?;
        Ok(())
    }

    pub async fn health_check(&self) -> EngineResult<()> {
        self.engine.health_check().await
    }

    #[must_use]
    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<StreamRecord> {
        self.state.read().streams.get(key).cloned()
    }

    /// Destinations of `key` in the order they were added.
    #[must_use]
    pub fn destinations(&self, key: &str) -> Option<Vec<Destination>> {
        self.state.read().streams.get(key).map(|r| r.destinations.clone())
    }

    #[must_use]
    pub fn is_active(&self, key: &str) -> bool {
        self.state.read().streams.contains_key(key)
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.state.read().streams.keys().cloned().collect()
    }

    #[must_use]
    pub fn snapshot(&self) -> RelaySnapshot {
        self.state.read().snapshot()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().streams.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn ingest_url(&self, key: &str) -> String {
        self.rtmp.ingest_url(key)
    }

    #[must_use]
    pub fn hls_url(&self, key: &str) -> String {
        self.rtmp.hls_url(key)
    }

    /// Loopback pull URL for local relay workers.
    #[must_use]
    pub fn local_input_url(&self, key: &str) -> String {
        self.rtmp.local_input_url(key)
    }
}
