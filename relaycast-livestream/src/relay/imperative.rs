// Imperative relay engine strategy
//
// Per-stream create/delete calls against the engine's HTTP control API.
// The engine must already be running. What was applied is tracked locally;
// streams lost by an engine restart are not recreated.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use relaycast_core::config::EngineConfig;
use relaycast_core::{redact, StreamRecord};

use super::engine::{map_request_error, RelayEngine, RelaySnapshot, StatusProbe};
use crate::error::{EngineError, EngineResult};

#[derive(Debug, Serialize)]
struct CreateStreamBody<'a> {
    key: &'a str,
    destinations: Vec<TargetBody<'a>>,
}

#[derive(Debug, Serialize)]
struct TargetBody<'a> {
    platform: &'a str,
    url: String,
}

pub struct ImperativeEngine {
    /// `{api_url}/api/v1/streams`
    streams_url: reqwest::Url,
    client: reqwest::Client,
    timeout: Duration,
    status: Option<StatusProbe>,
    /// Records the engine has acknowledged, by key.
    applied: Mutex<HashMap<String, StreamRecord>>,
}

impl ImperativeEngine {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        let api_url = api_url.into();
        let streams_url = format!("{}/api/v1/streams", api_url.trim_end_matches('/'));
        let streams_url = reqwest::Url::parse(&streams_url)
            .map_err(|e| EngineError::InvalidAddress(format!("{api_url}: {e}")))?;
        if streams_url.cannot_be_a_base() {
            return Err(EngineError::InvalidAddress(api_url));
        }

        Ok(Self {
            streams_url,
            client,
            timeout,
            status: None,
            applied: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_config(config: &EngineConfig) -> EngineResult<Self> {
        let mut engine = Self::new(&config.imperative.api_url, config.timeout())?;
        if let Some(url) = &config.status_url {
            engine.status = Some(StatusProbe::new(url, config.timeout())?);
        }
        Ok(engine)
    }

    /// Address of one stream; the key is escaped into a single path segment.
    fn stream_url(&self, key: &str) -> EngineResult<reqwest::Url> {
        if key.is_empty() || key == "." || key == ".." {
            return Err(EngineError::InvalidAddress(format!("stream key {key:?}")));
        }
        let mut url = self.streams_url.clone();
        url.path_segments_mut()
            .map_err(|()| EngineError::InvalidAddress(self.streams_url.to_string()))?
            .push(key);
        Ok(url)
    }

    async fn create(&self, record: &StreamRecord) -> EngineResult<()> {
        let body = CreateStreamBody {
            key: &record.key,
            destinations: record
                .destinations
                .iter()
                .map(|d| TargetBody {
                    platform: &d.platform,
                    url: d.output_url(),
                })
                .collect(),
        };

        let response = self
            .client
            .post(self.streams_url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| map_request_error(e, self.timeout))?;
        ensure_success(response).await?;

        self.applied.lock().insert(record.key.clone(), record.clone());
        debug!(stream_key = %redact(&record.key), "Relay engine stream created");
        Ok(())
    }

    async fn delete(&self, key: &str) -> EngineResult<()> {
        let response = self
            .client
            .delete(self.stream_url(key)?)
            .send()
            .await
            .map_err(|e| map_request_error(e, self.timeout))?;

        // Already gone on the engine side.
        if response.status() != reqwest::StatusCode::NOT_FOUND {
            ensure_success(response).await?;
        }

        self.applied.lock().remove(key);
        debug!(stream_key = %redact(key), "Relay engine stream deleted");
        Ok(())
    }
}

async fn ensure_success(response: reqwest::Response) -> EngineResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    Err(EngineError::Rejected {
        status: status.as_u16(),
        body: response.text().await.unwrap_or_default(),
    })
}

#[async_trait]
impl RelayEngine for ImperativeEngine {
    fn name(&self) -> &'static str {
        "imperative"
    }

    async fn add_stream(&self, record: &StreamRecord, _snapshot: &RelaySnapshot) -> EngineResult<()> {
        let replaced = self.applied.lock().contains_key(&record.key);
        if replaced {
            self.delete(&record.key).await?;
        }
        self.create(record).await
    }

    async fn remove_stream(&self, key: &str, _snapshot: &RelaySnapshot) -> EngineResult<()> {
        self.delete(key).await
    }

    /// Diff against what was last applied: delete extras, create missing or
    /// changed streams. Every step is attempted; the first failure is returned.
    async fn reconcile(&self, snapshot: &RelaySnapshot) -> EngineResult<()> {
        let (stale, missing): (Vec<String>, Vec<StreamRecord>) = {
            let applied = self.applied.lock();
            let stale = applied
                .iter()
                .filter(|(key, record)| snapshot.get(key).map_or(true, |wanted| wanted != *record))
                .map(|(key, _)| key.clone())
                .collect();
            let missing = snapshot
                .streams
                .iter()
                .filter(|record| applied.get(&record.key) != Some(*record))
                .cloned()
                .collect();
            (stale, missing)
        };

        if stale.is_empty() && missing.is_empty() {
            return Ok(());
        }

        let mut first_error = None;
        for key in &stale {
            if let Err(e) = self.delete(key).await {
                warn!(stream_key = %redact(key), error = %e, "Reconcile delete failed");
                first_error.get_or_insert(e);
            }
        }
        for record in &missing {
            if let Err(e) = self.create(record).await {
                warn!(stream_key = %redact(&record.key), error = %e, "Reconcile create failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!(
                    generation = snapshot.generation,
                    deleted = stale.len(),
                    created = missing.len(),
                    "Relay engine reconciled"
                );
                Ok(())
            }
        }
    }

    async fn health_check(&self) -> EngineResult<()> {
        if let Some(probe) = &self.status {
            return probe.probe().await;
        }
        let response = self
            .client
            .get(self.streams_url.clone())
            .send()
            .await
            .map_err(|e| map_request_error(e, self.timeout))?;
        ensure_success(response).await
    }
}
