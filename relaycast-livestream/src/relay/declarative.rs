// Declarative relay engine strategy
//
// Every change regenerates the complete relay configuration from the
// registry snapshot, swaps it into place atomically, then asks the engine
// to reload. Incremental edits are never made, so any successful reconcile
// repairs earlier failures.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use relaycast_core::config::EngineConfig;
use relaycast_core::StreamRecord;

use super::engine::{RelayEngine, RelaySnapshot, StatusProbe};
use crate::error::{EngineError, EngineResult};

const DOCUMENT_VERSION: u32 = 1;
/// Reload output kept in error messages.
const MAX_OUTPUT_CHARS: usize = 2048;

#[derive(Debug, Serialize)]
struct RelayDocument<'a> {
    version: u32,
    generation: u64,
    generated_at: DateTime<Utc>,
    streams: Vec<RelayStream<'a>>,
}

#[derive(Debug, Serialize)]
struct RelayStream<'a> {
    key: &'a str,
    destinations: Vec<RelayTarget<'a>>,
}

#[derive(Debug, Serialize)]
struct RelayTarget<'a> {
    platform: &'a str,
    url: String,
}

impl<'a> RelayDocument<'a> {
    fn from_snapshot(snapshot: &'a RelaySnapshot) -> Self {
        Self {
            version: DOCUMENT_VERSION,
            generation: snapshot.generation,
            generated_at: Utc::now(),
            streams: snapshot.streams.iter().map(RelayStream::from_record).collect(),
        }
    }
}

impl<'a> RelayStream<'a> {
    fn from_record(record: &'a StreamRecord) -> Self {
        Self {
            key: &record.key,
            destinations: record
                .destinations
                .iter()
                .map(|d| RelayTarget {
                    platform: &d.platform,
                    url: d.output_url(),
                })
                .collect(),
        }
    }
}

/// Generations of the document on disk. Equal fields mean the engine has
/// loaded what is on disk.
#[derive(Debug, Default)]
struct Applied {
    written: Option<u64>,
    reloaded: Option<u64>,
}

impl Applied {
    fn is_current(&self) -> bool {
        self.written.is_some() && self.written == self.reloaded
    }
}

pub struct DeclarativeEngine {
    config_path: PathBuf,
    reload_program: String,
    reload_args: Vec<String>,
    timeout: Duration,
    status: Option<StatusProbe>,
    /// Serializes writers and reloads.
    applied: Mutex<Applied>,
}

impl DeclarativeEngine {
    pub fn new(
        config_path: impl Into<PathBuf>,
        reload_program: impl Into<String>,
        reload_args: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            config_path: config_path.into(),
            reload_program: reload_program.into(),
            reload_args,
            timeout,
            status: None,
            applied: Mutex::new(Applied::default()),
        }
    }

    pub fn from_config(config: &EngineConfig) -> EngineResult<Self> {
        let mut engine = Self::new(
            &config.declarative.config_path,
            &config.declarative.reload_program,
            config.declarative.reload_args.clone(),
            config.timeout(),
        );
        if let Some(url) = &config.status_url {
            engine.status = Some(StatusProbe::new(url, config.timeout())?);
        }
        Ok(engine)
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    async fn write_document(&self, snapshot: &RelaySnapshot) -> EngineResult<()> {
        let rendered = serde_json::to_string_pretty(&RelayDocument::from_snapshot(snapshot))?;

        if let Some(parent) = self.config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp = self.config_path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, rendered.as_bytes()).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.config_path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn reload(&self) -> EngineResult<()> {
        let mut command = Command::new(&self.reload_program);
        command.args(&self.reload_args).kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| EngineError::Timeout(self.timeout))??;

        if output.status.success() {
            return Ok(());
        }

        let mut combined = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(stdout.trim());
        }
        Err(EngineError::CommandFailed {
            status: output.status.to_string(),
            output: combined.chars().take(MAX_OUTPUT_CHARS).collect(),
        })
    }

    async fn reload_written(&self, applied: &mut Applied, generation: u64) -> EngineResult<()> {
        match self.reload().await {
            Ok(()) => {
                applied.reloaded = Some(generation);
                info!(
                    generation,
                    path = %self.config_path.display(),
                    "Relay configuration reloaded"
                );
                Ok(())
            }
            Err(e) => {
                warn!(generation, error = %e, "Relay engine reload failed");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl RelayEngine for DeclarativeEngine {
    fn name(&self) -> &'static str {
        "declarative"
    }

    async fn add_stream(&self, _record: &StreamRecord, snapshot: &RelaySnapshot) -> EngineResult<()> {
        self.reconcile(snapshot).await
    }

    async fn remove_stream(&self, _key: &str, snapshot: &RelaySnapshot) -> EngineResult<()> {
        self.reconcile(snapshot).await
    }

    async fn reconcile(&self, snapshot: &RelaySnapshot) -> EngineResult<()> {
        let mut applied = self.applied.lock().await;

        // A newer document is already on disk. It supersedes this snapshot,
        // but the caller only succeeds once the engine has loaded it.
        if let Some(written) = applied.written.filter(|&generation| generation > snapshot.generation) {
            if applied.is_current() {
                debug!(
                    generation = snapshot.generation,
                    current = written,
                    "Skipping stale relay snapshot"
                );
                return Ok(());
            }
            debug!(
                generation = snapshot.generation,
                current = written,
                "Stale relay snapshot; retrying reload of the newer document"
            );
            return self.reload_written(&mut applied, written).await;
        }

        self.write_document(snapshot).await?;
        applied.written = Some(snapshot.generation);
        self.reload_written(&mut applied, snapshot.generation).await
    }

    async fn health_check(&self) -> EngineResult<()> {
        match &self.status {
            Some(probe) => probe.probe().await,
            None => Ok(()),
        }
    }
}
