//! Capture stage
//!
//! Runs the external capture tool for one fixed-duration window per
//! iteration, forever. A successful window is pushed downstream as a
//! [`CaptureArtifact`]; any failure is logged and retried after a fixed
//! backoff. Capture failures delay throughput, they never stop the pipeline.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::channel::StageSender;
use super::stats::SharedStats;
use crate::config::CaptureConfig;
use crate::models::CaptureArtifact;

/// Dedicated capture worker.
pub struct CaptureWorker {
    config: CaptureConfig,
    tx: StageSender<CaptureArtifact>,
    stats: SharedStats,
}

impl CaptureWorker {
    pub fn new(config: CaptureConfig, tx: StageSender<CaptureArtifact>, stats: SharedStats) -> Self {
        Self { config, tx, stats }
    }

    /// Capture loop. Runs until the conversion stage disappears.
    pub async fn run(self) {
        info!(
            interface = %self.config.interface,
            duration = self.config.duration_secs,
            "capture worker started"
        );

        let backoff = Duration::from_secs(self.config.retry_backoff_secs);
        loop {
            let filename = format!("captured_{}.pcap", Utc::now().format("%Y%m%d_%H%M%S"));
            let path = self.config.output_dir.join(filename);

            match self.capture_once(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "capture window complete");
                    let artifact = CaptureArtifact {
                        path,
                        created_at: Utc::now(),
                    };
                    if self.tx.push(artifact).await.is_err() {
                        warn!("conversion stage gone, stopping capture worker");
                        break;
                    }
                    self.stats.incr_captures();
                }
                Err(e) => {
                    warn!("capture failed: {:#}", e);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// Run one capture window. Success requires exit status 0 and an output
    /// file on disk.
    async fn capture_once(&self, path: &Path) -> Result<()> {
        let output = Command::new(&self.config.command)
            .arg("-i")
            .arg(&self.config.interface)
            .arg("-a")
            .arg(format!("duration:{}", self.config.duration_secs))
            .arg("-w")
            .arg(path)
            .output()
            .await
            .with_context(|| format!("failed to run capture command '{}'", self.config.command))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "capture command exited with {}: {}",
                output.status,
                stderr.trim()
            );
        }
        if !path.exists() {
            anyhow::bail!("capture command produced no file at {}", path.display());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::channel::bounded;
    use std::os::unix::fs::PermissionsExt;

    /// A dumpcap stand-in: writes a byte to whatever follows `-w`.
    fn fake_capture_tool(dir: &Path) -> String {
        let script = dir.join("fake-dumpcap.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\nwhile [ \"$1\" != \"-w\" ]; do shift; done\nshift\necho pcap > \"$1\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script.to_string_lossy().into_owned()
    }

    fn worker_config(dir: &Path, command: String) -> CaptureConfig {
        CaptureConfig {
            interface: "lo".to_string(),
            command,
            duration_secs: 1,
            output_dir: dir.to_path_buf(),
            retry_backoff_secs: 1,
        }
    }

    #[tokio::test]
    async fn test_capture_once_success() {
        let dir = tempfile::tempdir().unwrap();
        let command = fake_capture_tool(dir.path());
        let (tx, _rx, _) = bounded("capture", 5);
        let worker = CaptureWorker::new(
            worker_config(dir.path(), command),
            tx,
            SharedStats::new(),
        );

        let path = dir.path().join("captured_test.pcap");
        worker.capture_once(&path).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_capture_once_nonzero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx, _) = bounded("capture", 5);
        let worker = CaptureWorker::new(
            worker_config(dir.path(), "false".to_string()),
            tx,
            SharedStats::new(),
        );

        let path = dir.path().join("captured_test.pcap");
        assert!(worker.capture_once(&path).await.is_err());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_capture_once_missing_output_file() {
        let dir = tempfile::tempdir().unwrap();
        // Exits 0 but writes nothing.
        let (tx, _rx, _) = bounded("capture", 5);
        let worker = CaptureWorker::new(
            worker_config(dir.path(), "true".to_string()),
            tx,
            SharedStats::new(),
        );

        let path = dir.path().join("captured_test.pcap");
        assert!(worker.capture_once(&path).await.is_err());
    }
}
