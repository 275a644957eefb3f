// Relay worker supervisor
//
// One supervised worker per (stream, destination) unit. Each worker is an
// owned task with a cancellation token and a join handle; stopping signals
// the token, then waits up to the grace period before aborting the task.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{join_all, BoxFuture};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Result, StreamError};

/// What a worker relays, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    pub unit_id: String,
    pub input_url: String,
    pub output_url: String,
}

/// Starts worker processes. The returned future drives the worker until it
/// exits on its own or `cancel` fires.
pub trait WorkerLauncher: Send + Sync {
    fn launch(&self, spec: &WorkerSpec, cancel: CancellationToken) -> Result<BoxFuture<'static, Result<()>>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Running,
    Stopped,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerInfo {
    pub unit_id: String,
    pub state: WorkerState,
    pub started_at: DateTime<Utc>,
}

struct WorkerHandle {
    cancel: CancellationToken,
    join: JoinHandle<Result<()>>,
    running: Arc<AtomicBool>,
    started_at: DateTime<Utc>,
}

impl WorkerHandle {
    fn state(&self) -> WorkerState {
        if self.running.load(Ordering::SeqCst) {
            WorkerState::Running
        } else {
            WorkerState::Stopped
        }
    }
}

/// Unit identifier for the worker relaying `stream_key` to `platform`.
#[must_use]
pub fn unit_id(stream_key: &str, platform: &str) -> String {
    format!("{stream_key}:{platform}")
}

/// Stream key part of a unit identifier.
#[must_use]
pub fn stream_key_of(unit_id: &str) -> &str {
    unit_id.rsplit_once(':').map_or(unit_id, |(key, _)| key)
}

pub struct RelayWorkerSupervisor {
    workers: DashMap<String, WorkerHandle>,
    launcher: Arc<dyn WorkerLauncher>,
    grace_period: Duration,
}

impl RelayWorkerSupervisor {
    pub fn new(launcher: Arc<dyn WorkerLauncher>, grace_period: Duration) -> Self {
        Self {
            workers: DashMap::new(),
            launcher,
            grace_period,
        }
    }

    /// Start and register a worker for `unit_id`.
    ///
    /// An already registered unit yields `AlreadyExists` and its worker is
    /// left untouched.
    pub fn start_process(&self, unit_id: &str, input_url: &str, output_url: &str) -> Result<()> {
        let slot = match self.workers.entry(unit_id.to_string()) {
            Entry::Occupied(_) => return Err(StreamError::AlreadyExists(unit_id.to_string())),
            Entry::Vacant(slot) => slot,
        };

        let spec = WorkerSpec {
            unit_id: unit_id.to_string(),
            input_url: input_url.to_string(),
            output_url: output_url.to_string(),
        };
        let cancel = CancellationToken::new();
        let worker = self.launcher.launch(&spec, cancel.clone())?;

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let unit = spec.unit_id.clone();
        let join = tokio::spawn(async move {
            let result = worker.await;
            flag.store(false, Ordering::SeqCst);
            match &result {
                Ok(()) => debug!(unit_id = %unit, "Relay worker exited"),
                Err(e) => warn!(unit_id = %unit, error = %e, "Relay worker exited with error"),
            }
            result
        });

        slot.insert(WorkerHandle {
            cancel,
            join,
            running,
            started_at: Utc::now(),
        });
        info!(unit_id = %unit_id, "Relay worker started");
        Ok(())
    }

    /// Stop and deregister `unit_id`. Unknown units succeed.
    ///
    /// The unit is removed even when termination reports an error.
    pub async fn stop_process(&self, unit_id: &str) -> Result<()> {
        let Some((unit, handle)) = self.workers.remove(unit_id) else {
            debug!(unit_id = %unit_id, "Stop of unknown relay worker ignored");
            return Ok(());
        };
        handle.cancel.cancel();
        terminate(&unit, handle, self.grace_period).await
    }

    /// Stop every worker. All workers are signalled before any is awaited;
    /// per-unit failures are collected and never cut the sweep short.
    pub async fn stop_all(&self) -> Vec<(String, StreamError)> {
        let units: Vec<String> = self.workers.iter().map(|entry| entry.key().clone()).collect();
        let failures = self.stop_units(units).await;
        if failures.is_empty() {
            info!("All relay workers stopped");
        } else {
            error!(failed = failures.len(), "Some relay workers did not stop cleanly");
        }
        failures
    }

    /// Stop every worker belonging to `stream_key`.
    pub async fn stop_stream(&self, stream_key: &str) -> Vec<(String, StreamError)> {
        self.stop_units(self.units_for_stream(stream_key)).await
    }

    async fn stop_units(&self, units: Vec<String>) -> Vec<(String, StreamError)> {
        let handles: Vec<(String, WorkerHandle)> = units
            .iter()
            .filter_map(|unit| self.workers.remove(unit))
            .collect();

        for (_, handle) in &handles {
            handle.cancel.cancel();
        }

        let grace = self.grace_period;
        join_all(handles.into_iter().map(|(unit, handle)| async move {
            let result = terminate(&unit, handle, grace).await;
            (unit, result)
        }))
        .await
        .into_iter()
        .filter_map(|(unit, result)| result.err().map(|e| (unit, e)))
        .collect()
    }

    #[must_use]
    pub fn state(&self, unit_id: &str) -> Option<WorkerState> {
        self.workers.get(unit_id).map(|handle| handle.state())
    }

    #[must_use]
    pub fn units_for_stream(&self, stream_key: &str) -> Vec<String> {
        self.workers
            .iter()
            .filter(|entry| stream_key_of(entry.key()) == stream_key)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Every registered worker, sorted by unit id.
    #[must_use]
    pub fn list(&self) -> Vec<WorkerInfo> {
        let mut workers: Vec<WorkerInfo> = self
            .workers
            .iter()
            .map(|entry| WorkerInfo {
                unit_id: entry.key().clone(),
                state: entry.value().state(),
                started_at: entry.value().started_at,
            })
            .collect();
        workers.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));
        workers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

/// Wait for an already-signalled worker; abort it once the grace period runs out.
async fn terminate(unit: &str, handle: WorkerHandle, grace: Duration) -> Result<()> {
    let mut join = handle.join;
    match tokio::time::timeout(grace, &mut join).await {
        Ok(Ok(result)) => {
            if result.is_ok() {
                info!(unit_id = %unit, "Relay worker stopped");
            }
            result
        }
        Ok(Err(join_err)) => Err(StreamError::WorkerExit {
            unit: unit.to_string(),
            reason: join_err.to_string(),
        }),
        Err(_) => {
            join.abort();
            warn!(unit_id = %unit, grace = ?grace, "Relay worker ignored stop signal; killed");
            Err(StreamError::TerminationTimeout {
                unit: unit.to_string(),
                grace,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// In-process launcher whose behaviour is picked by the unit id.
    #[derive(Default)]
    struct TestLauncher {
        launches: AtomicUsize,
    }

    impl WorkerLauncher for TestLauncher {
        fn launch(&self, spec: &WorkerSpec, cancel: CancellationToken) -> Result<BoxFuture<'static, Result<()>>> {
            let unit = spec.unit_id.clone();
            if unit.contains("broken") {
                return Err(StreamError::WorkerSpawn {
                    unit,
                    reason: "no such file".to_string(),
                });
            }
            self.launches.fetch_add(1, Ordering::SeqCst);

            if unit.contains("stubborn") {
                Ok(Box::pin(async move {
                    std::future::pending::<()>().await;
                    Ok(())
                }))
            } else if unit.contains("crash") {
                Ok(Box::pin(async move {
                    Err(StreamError::WorkerExit {
                        unit,
                        reason: "exit status: 1".to_string(),
                    })
                }))
            } else {
                Ok(Box::pin(async move {
                    cancel.cancelled().await;
                    Ok(())
                }))
            }
        }
    }

    fn supervisor() -> (RelayWorkerSupervisor, Arc<TestLauncher>) {
        let launcher = Arc::new(TestLauncher::default());
        let supervisor = RelayWorkerSupervisor::new(launcher.clone(), Duration::from_secs(5));
        (supervisor, launcher)
    }

    #[test]
    fn test_unit_ids() {
        let unit = unit_id("Zk3_-abc", "youtube");
        assert_eq!(unit, "Zk3_-abc:youtube");
        assert_eq!(stream_key_of(&unit), "Zk3_-abc");
        assert_eq!(stream_key_of("bare"), "bare");
    }

    #[tokio::test]
    async fn test_duplicate_start_leaves_first_handle() {
        let (supervisor, launcher) = supervisor();
        supervisor.start_process("k:youtube", "in", "out").unwrap();

        let err = supervisor.start_process("k:youtube", "in2", "out2").unwrap_err();
        assert!(matches!(err, StreamError::AlreadyExists(ref unit) if unit == "k:youtube"));
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
        assert_eq!(supervisor.state("k:youtube"), Some(WorkerState::Running));

        supervisor.stop_process("k:youtube").await.unwrap();
        assert!(supervisor.is_empty());
    }

    #[tokio::test]
    async fn test_stop_unknown_unit_succeeds() {
        let (supervisor, _) = supervisor();
        supervisor.stop_process("nope:youtube").await.unwrap();
    }

    #[tokio::test]
    async fn test_spawn_failure_registers_nothing() {
        let (supervisor, _) = supervisor();
        let err = supervisor.start_process("broken:youtube", "in", "out").unwrap_err();
        assert!(matches!(err, StreamError::WorkerSpawn { .. }));
        assert!(supervisor.state("broken:youtube").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stubborn_worker_is_killed_after_grace() {
        let (supervisor, _) = supervisor();
        supervisor.start_process("stubborn:twitch", "in", "out").unwrap();

        let err = supervisor.stop_process("stubborn:twitch").await.unwrap_err();
        assert!(matches!(
            err,
            StreamError::TerminationTimeout { grace, .. } if grace == Duration::from_secs(5)
        ));
        assert!(supervisor.is_empty());
    }

    #[tokio::test]
    async fn test_crashed_worker_reports_on_stop() {
        let (supervisor, _) = supervisor();
        supervisor.start_process("crash:youtube", "in", "out").unwrap();

        while supervisor.state("crash:youtube") == Some(WorkerState::Running) {
            tokio::task::yield_now().await;
        }
        assert_eq!(supervisor.state("crash:youtube"), Some(WorkerState::Stopped));

        let err = supervisor.stop_process("crash:youtube").await.unwrap_err();
        assert!(matches!(err, StreamError::WorkerExit { .. }));
        assert!(supervisor.state("crash:youtube").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all_collects_failures() {
        let (supervisor, _) = supervisor();
        supervisor.start_process("a:youtube", "in", "out").unwrap();
        supervisor.start_process("a:twitch", "in", "out").unwrap();
        supervisor.start_process("stubborn:facebook", "in", "out").unwrap();

        let failures = supervisor.stop_all().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "stubborn:facebook");
        assert!(supervisor.is_empty());
    }

    #[tokio::test]
    async fn test_stop_stream_only_touches_its_units() {
        let (supervisor, _) = supervisor();
        supervisor.start_process("a:youtube", "in", "out").unwrap();
        supervisor.start_process("a:twitch", "in", "out").unwrap();
        supervisor.start_process("b:youtube", "in", "out").unwrap();

        let mut units = supervisor.units_for_stream("a");
        units.sort();
        assert_eq!(units, vec!["a:twitch", "a:youtube"]);

        assert!(supervisor.stop_stream("a").await.is_empty());
        let remaining: Vec<_> = supervisor.list().into_iter().map(|w| w.unit_id).collect();
        assert_eq!(remaining, vec!["b:youtube"]);
    }
}
