// Mock RelayEngine for testing without an external relay engine

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use relaycast_core::StreamRecord;

use super::engine::{RelayEngine, RelaySnapshot};
use crate::error::{EngineError, EngineResult};

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    AddStream(StreamRecord),
    RemoveStream(String),
    Reconcile(RelaySnapshot),
}

/// Records every call and fails on demand.
#[derive(Debug, Clone, Default)]
pub struct MockRelayEngine {
    calls: Arc<tokio::sync::Mutex<Vec<EngineCall>>>,
    fail: Arc<AtomicBool>,
    unhealthy: Arc<AtomicBool>,
}

impl MockRelayEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent mutating call fail with a rejection.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.unhealthy.store(unhealthy, Ordering::SeqCst);
    }

    pub async fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().await.clone()
    }

    pub async fn add_calls(&self) -> Vec<StreamRecord> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                EngineCall::AddStream(record) => Some(record.clone()),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, call: EngineCall) -> EngineResult<()> {
        self.calls.lock().await.push(call);
        if self.fail.load(Ordering::SeqCst) {
            Err(EngineError::Rejected {
                status: 503,
                body: "mock engine failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RelayEngine for MockRelayEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn add_stream(&self, record: &StreamRecord, _snapshot: &RelaySnapshot) -> EngineResult<()> {
        self.record(EngineCall::AddStream(record.clone())).await
    }

    async fn remove_stream(&self, key: &str, _snapshot: &RelaySnapshot) -> EngineResult<()> {
        self.record(EngineCall::RemoveStream(key.to_string())).await
    }

    async fn reconcile(&self, snapshot: &RelaySnapshot) -> EngineResult<()> {
        self.record(EngineCall::Reconcile(snapshot.clone())).await
    }

    async fn health_check(&self) -> EngineResult<()> {
        if self.unhealthy.load(Ordering::SeqCst) {
            Err(EngineError::Unreachable("mock engine is down".to_string()))
        } else {
            Ok(())
        }
    }
}
