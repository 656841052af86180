//! Conversion stage
//!
//! Turns each capture artifact into a flow file by running the external
//! flow-extraction tool under a hard timeout, then strips the header line the
//! tool writes. A failed or timed-out conversion drops that capture window
//! with a log line; there is no retry. The source capture is deleted
//! afterwards regardless of outcome.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::channel::{StageReceiver, StageSender};
use crate::config::ConversionConfig;
use crate::models::{CaptureArtifact, FlowFileArtifact};

/// Dedicated conversion worker.
pub struct ConversionWorker {
    config: ConversionConfig,
    rx: StageReceiver<CaptureArtifact>,
    tx: StageSender<FlowFileArtifact>,
}

impl ConversionWorker {
    pub fn new(
        config: ConversionConfig,
        rx: StageReceiver<CaptureArtifact>,
        tx: StageSender<FlowFileArtifact>,
    ) -> Self {
        Self { config, rx, tx }
    }

    /// Conversion loop. Runs until the capture stage disappears.
    pub async fn run(mut self) {
        info!(command = %self.config.command, "conversion worker started");

        while let Some(artifact) = self.rx.pop().await {
            match self.convert(&artifact.path).await {
                Ok(flow_path) => {
                    debug!(flow = %flow_path.display(), "conversion complete");
                    if self
                        .tx
                        .push(FlowFileArtifact { path: flow_path })
                        .await
                        .is_err()
                    {
                        warn!("normalization stage gone, stopping conversion worker");
                        remove_best_effort(&artifact.path);
                        break;
                    }
                }
                Err(e) => warn!(
                    capture = %artifact.path.display(),
                    "conversion failed, dropping capture window: {:#}",
                    e
                ),
            }

            remove_best_effort(&artifact.path);
        }
    }

    /// Run one extraction: tool under timeout, newest produced file, header
    /// stripped in place.
    async fn convert(&self, input: &Path) -> Result<PathBuf> {
        let run = Command::new(&self.config.command)
            .arg(input)
            .arg(&self.config.flow_dir)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(Duration::from_secs(self.config.timeout_secs), run)
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "flow extraction timed out after {}s",
                    self.config.timeout_secs
                )
            })?
            .with_context(|| {
                format!("failed to run flow extraction command '{}'", self.config.command)
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "flow extraction exited with {}: {}",
                output.status,
                stderr.trim()
            );
        }

        let flow_path = newest_file(&self.config.flow_dir)?
            .ok_or_else(|| anyhow::anyhow!("flow extraction produced no file"))?;
        strip_header(&flow_path)?;
        Ok(flow_path)
    }
}

/// Most recently modified regular file in a directory.
fn newest_file(dir: &Path) -> Result<Option<PathBuf>> {
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read flow directory: {}", dir.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, entry.path()));
        }
    }
    Ok(newest.map(|(_, p)| p))
}

/// Drop the first line of the file in place.
fn strip_header(path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read flow file: {}", path.display()))?;
    let rest = match content.split_once('\n') {
        Some((_, rest)) => rest,
        None => "",
    };
    std::fs::write(path, rest)
        .with_context(|| format!("failed to rewrite flow file: {}", path.display()))?;
    Ok(())
}

fn remove_best_effort(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        debug!(path = %path.display(), "failed to delete capture artifact: {}", e);
    }
}
