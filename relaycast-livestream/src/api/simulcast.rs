// Simulcast orchestration
//
// Composes the stream key registry, platform fanout, relay registry and
// worker supervisor. The registries are independent, so a request that
// fails halfway leaves the earlier steps in place; the periodic consistency
// sweep brings them back in line.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use relaycast_core::config::WorkersConfig;
use relaycast_core::service::is_well_formed_key;
use relaycast_core::{redact, Destination, StreamKeyRegistry, StreamOptions, StreamRecord};
use relaycast_platforms::{PlatformFanout, PlatformResult};

use crate::error::{Result, StreamError};
use crate::livestream::{stream_key_of, unit_id, RelayWorkerSupervisor};
use crate::relay::StreamRelayRegistry;

#[derive(Debug, Clone)]
pub struct CreateStreamRequest {
    pub owner_id: String,
    pub options: StreamOptions,
    /// Requested platform names, in the order results are reported.
    pub destinations: Vec<String>,
}

/// Outcome of a create that got past fanout. Fields other than the key and
/// URLs describe what only partially happened.
#[derive(Debug)]
pub struct CreateStreamReport {
    pub stream_key: String,
    pub ingest_url: String,
    pub hls_url: String,
    pub platforms: Vec<PlatformResult>,
    /// The relay record is in place but the engine did not accept it.
    pub reconcile_error: Option<StreamError>,
    pub worker_errors: Vec<(String, StreamError)>,
}

impl CreateStreamReport {
    #[must_use]
    pub fn destinations(&self) -> Vec<Destination> {
        self.platforms
            .iter()
            .filter_map(|r| r.outcome.as_ref().ok())
            .map(|p| p.destination.clone())
            .collect()
    }

    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.reconcile_error.is_some()
            || !self.worker_errors.is_empty()
            || self.platforms.iter().any(|r| r.outcome.is_err())
    }
}

#[derive(Debug)]
pub struct DeleteStreamReport {
    pub stream_key: String,
    pub key_revoked: bool,
    pub was_active: bool,
    pub reconcile_error: Option<StreamError>,
    pub stop_failures: Vec<(String, StreamError)>,
}

/// What one consistency sweep changed.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub removed_streams: Vec<String>,
    pub stopped_workers: Vec<String>,
    pub reconcile_error: Option<StreamError>,
}

pub struct SimulcastService {
    keys: Arc<StreamKeyRegistry>,
    relay: Arc<StreamRelayRegistry>,
    fanout: Arc<PlatformFanout>,
    supervisor: Arc<RelayWorkerSupervisor>,
    workers: WorkersConfig,
}

impl SimulcastService {
    pub fn new(
        keys: Arc<StreamKeyRegistry>,
        relay: Arc<StreamRelayRegistry>,
        fanout: Arc<PlatformFanout>,
        supervisor: Arc<RelayWorkerSupervisor>,
        workers: WorkersConfig,
    ) -> Self {
        Self {
            keys,
            relay,
            fanout,
            supervisor,
            workers,
        }
    }

    #[must_use]
    pub fn keys(&self) -> &Arc<StreamKeyRegistry> {
        &self.keys
    }

    #[must_use]
    pub fn relay(&self) -> &Arc<StreamRelayRegistry> {
        &self.relay
    }

    #[must_use]
    pub fn supervisor(&self) -> &Arc<RelayWorkerSupervisor> {
        &self.supervisor
    }

    /// Issue a new stream key for `owner_id`.
    pub fn generate_stream_key(&self, owner_id: &str) -> Result<String> {
        let owner_id = require_owner(owner_id)?;
        Ok(self.keys.issue(owner_id)?)
    }

    /// Provision broadcasts on every requested platform and relay the
    /// owner's ingest to the ones that succeeded.
    ///
    /// `Err` means nothing changed. A returned report may still carry a
    /// reconcile error or per-item failures.
    pub async fn create_stream(&self, request: CreateStreamRequest) -> Result<CreateStreamReport> {
        let owner_id = require_owner(&request.owner_id)?;
        let stream_key = self.keys.lookup_key_for_owner(owner_id).ok_or_else(|| {
            relaycast_core::Error::Authentication(format!("no stream key issued for owner {owner_id}"))
        })?;

        info!(
            owner_id = %owner_id,
            stream_key = %redact(&stream_key),
            platforms = ?request.destinations,
            "Creating simulcast"
        );

        let outcome = self
            .fanout
            .create_multi_stream(&request.destinations, &request.options)
            .await?;
        let destinations = outcome.destinations();

        let reconcile_error = self.relay.add_stream(&stream_key, destinations.clone()).await.err();

        let mut worker_errors = self.supervisor.stop_stream(&stream_key).await;
        worker_errors.extend(self.start_workers(&stream_key, &destinations));

        let report = CreateStreamReport {
            ingest_url: self.relay.ingest_url(&stream_key),
            hls_url: self.relay.hls_url(&stream_key),
            stream_key,
            platforms: outcome.results,
            reconcile_error,
            worker_errors,
        };

        if report.is_partial() {
            warn!(
                stream_key = %redact(&report.stream_key),
                relayed = destinations.len(),
                "Simulcast created with failures"
            );
        } else {
            info!(
                stream_key = %redact(&report.stream_key),
                relayed = destinations.len(),
                "Simulcast created"
            );
        }
        Ok(report)
    }

    fn start_workers(&self, stream_key: &str, destinations: &[Destination]) -> Vec<(String, StreamError)> {
        let input_url = self.relay.local_input_url(stream_key);
        destinations
            .iter()
            .filter(|d| self.workers.wants(&d.platform))
            .filter_map(|d| {
                let unit = unit_id(stream_key, &d.platform);
                self.supervisor
                    .start_process(&unit, &input_url, &d.output_url())
                    .err()
                    .map(|e| (unit, e))
            })
            .collect()
    }

    /// Revoke `stream_key`, drop its relay record and stop its workers.
    /// Every step runs even when an earlier one fails.
    ///
    /// Only a key that could have been issued is accepted; anything else is
    /// `InvalidInput` and never reaches the relay engine.
    pub async fn delete_stream(&self, stream_key: &str) -> Result<DeleteStreamReport> {
        if !is_well_formed_key(stream_key) {
            return Err(relaycast_core::Error::InvalidInput("malformed stream key".to_string()).into());
        }

        let key_revoked = self.keys.revoke(stream_key).is_some();
        let was_active = self.relay.is_active(stream_key);
        let reconcile_error = self.relay.remove_stream(stream_key).await.err();
        let stop_failures = self.supervisor.stop_stream(stream_key).await;

        info!(
            stream_key = %redact(stream_key),
            key_revoked,
            was_active,
            "Simulcast deleted"
        );

        Ok(DeleteStreamReport {
            stream_key: stream_key.to_string(),
            key_revoked,
            was_active,
            reconcile_error,
            stop_failures,
        })
    }

    /// Relay record of `stream_key`, if active.
    #[must_use]
    pub fn stream(&self, stream_key: &str) -> Option<StreamRecord> {
        self.relay.get(stream_key)
    }

    /// Drop records whose key was revoked, stop workers whose record is gone
    /// and push the current snapshot to the engine again.
    pub async fn sweep_once(&self) -> SweepReport {
        let mut report = SweepReport::default();

        for key in self.relay.keys() {
            if self.keys.validate(&key) {
                continue;
            }
            if let Err(e) = self.relay.remove_stream(&key).await {
                // the record is gone; the reconcile below retries the engine
                debug!(stream_key = %redact(&key), error = %e, "Engine rejected orphan removal");
            }
            report.removed_streams.push(key);
        }

        for worker in self.supervisor.list() {
            if self.relay.is_active(stream_key_of(&worker.unit_id)) {
                continue;
            }
            if let Err(e) = self.supervisor.stop_process(&worker.unit_id).await {
                warn!(unit_id = %worker.unit_id, error = %e, "Orphan worker did not stop cleanly");
            }
            report.stopped_workers.push(worker.unit_id);
        }

        report.reconcile_error = self.relay.reconcile().await.err();

        if let Some(e) = &report.reconcile_error {
            warn!(error = %e, "Consistency sweep could not reconcile relay engine");
        }
        if !report.removed_streams.is_empty() || !report.stopped_workers.is_empty() {
            info!(
                removed_streams = report.removed_streams.len(),
                stopped_workers = report.stopped_workers.len(),
                "Consistency sweep repaired state"
            );
        }
        report
    }

    /// Run `sweep_once` every `interval` until `cancel` fires.
    pub fn spawn_consistency_sweep(self: &Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!("Consistency sweep stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        service.sweep_once().await;
                    }
                }
            }
        })
    }

    /// Stop every relay worker.
    pub async fn shutdown(&self) -> Vec<(String, StreamError)> {
        info!(workers = self.supervisor.len(), "Stopping relay workers");
        let failures = self.supervisor.stop_all().await;
        for (unit, e) in &failures {
            warn!(unit_id = %unit, error = %e, "Relay worker failed to stop");
        }
        failures
    }
}

fn require_owner(owner_id: &str) -> Result<&str> {
    let owner_id = owner_id.trim();
    if owner_id.is_empty() {
        return Err(relaycast_core::Error::InvalidInput("userID is required".to_string()).into());
    }
    Ok(owner_id)
}
