// FFmpeg relay worker
//
// Pulls the local ingest and pushes it unchanged to one destination. On
// stop, `q` is written to the process's stdin so it can flush and close the
// output; the supervisor aborts the task (killing the child) if that takes
// longer than the grace period.

use futures::future::BoxFuture;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::supervisor::{WorkerLauncher, WorkerSpec};
use crate::error::{Result, StreamError};

/// Arguments for copying video and transcoding audio to AAC into an FLV egress.
#[must_use]
pub fn ffmpeg_args(input_url: &str, output_url: &str) -> Vec<String> {
    [
        "-loglevel", "warning", "-i", input_url, "-c:v", "copy", "-c:a", "aac", "-f", "flv", output_url,
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

pub struct FfmpegLauncher {
    ffmpeg_path: String,
}

impl FfmpegLauncher {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

impl WorkerLauncher for FfmpegLauncher {
    fn launch(&self, spec: &WorkerSpec, cancel: CancellationToken) -> Result<BoxFuture<'static, Result<()>>> {
        let mut child = Command::new(&self.ffmpeg_path)
            .args(ffmpeg_args(&spec.input_url, &spec.output_url))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| StreamError::WorkerSpawn {
                unit: spec.unit_id.clone(),
                reason: e.to_string(),
            })?;

        debug!(unit_id = %spec.unit_id, pid = ?child.id(), "ffmpeg spawned");

        let stdin = child.stdin.take();
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(spec.unit_id.clone(), stderr));
        }

        Ok(Box::pin(run_worker(spec.unit_id.clone(), child, stdin, cancel)))
    }
}

/// Drive a spawned worker process until it exits or `cancel` fires.
pub(crate) async fn run_worker(
    unit: String,
    mut child: Child,
    stdin: Option<ChildStdin>,
    cancel: CancellationToken,
) -> Result<()> {
    tokio::select! {
        status = child.wait() => exit_result(&unit, status),
        () = cancel.cancelled() => {
            if let Some(mut stdin) = stdin {
                if let Err(e) = stdin.write_all(b"q").await {
                    debug!(unit_id = %unit, error = %e, "Could not send quit to worker");
                }
                drop(stdin);
            }
            match child.wait().await {
                Ok(status) => {
                    debug!(unit_id = %unit, %status, "Worker quit on request");
                    Ok(())
                }
                Err(e) => Err(StreamError::WorkerExit { unit, reason: e.to_string() }),
            }
        }
    }
}

fn exit_result(unit: &str, status: std::io::Result<ExitStatus>) -> Result<()> {
    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(StreamError::WorkerExit {
            unit: unit.to_string(),
            reason: status.to_string(),
        }),
        Err(e) => Err(StreamError::WorkerExit {
            unit: unit.to_string(),
            reason: e.to_string(),
        }),
    }
}

async fn forward_stderr(unit: String, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => debug!(unit_id = %unit, "ffmpeg: {line}"),
            Ok(None) => break,
            Err(e) => {
                warn!(unit_id = %unit, error = %e, "Lost worker stderr");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn spawn_sh(script: &str) -> (Child, Option<ChildStdin>) {
        let mut child = Command::new("sh")
            .args(["-c", script])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let stdin = child.stdin.take();
        (child, stdin)
    }

    #[test]
    fn test_ffmpeg_args() {
        let args = ffmpeg_args("rtmp://127.0.0.1:1935/live/k", "rtmp://a.rtmp.youtube.com/live2/abc");
        assert_eq!(args[3], "rtmp://127.0.0.1:1935/live/k");
        assert_eq!(args.last().unwrap(), "rtmp://a.rtmp.youtube.com/live2/abc");
        assert!(args.windows(2).any(|w| w[0] == "-c:v" && w[1] == "copy"));
        assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == "flv"));
    }

    #[tokio::test]
    async fn test_quit_request_is_graceful() {
        // exits as soon as it reads the quit byte
        let (child, stdin) = spawn_sh("head -c 1 >/dev/null");
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run_worker("k:youtube".into(), child, stdin, cancel.clone()));

        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(5), worker).await.unwrap().unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_unexpected_exit_is_an_error() {
        let (child, stdin) = spawn_sh("exit 7");
        let err = run_worker("k:twitch".into(), child, stdin, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::WorkerExit { ref unit, .. } if unit == "k:twitch"));
    }

    #[tokio::test]
    async fn test_missing_binary_fails_to_launch() {
        let launcher = FfmpegLauncher::new("/nonexistent/ffmpeg");
        let spec = WorkerSpec {
            unit_id: "k:youtube".to_string(),
            input_url: "rtmp://127.0.0.1/live/k".to_string(),
            output_url: "rtmp://a.rtmp.youtube.com/live2/abc".to_string(),
        };
        let err = launcher.launch(&spec, CancellationToken::new()).err().unwrap();
        assert!(matches!(err, StreamError::WorkerSpawn { .. }));
    }
}
