//! Anomalous-row report persistence
//!
//! Durable CSV dumps of the rows a classifier judged anomalous, written to
//! the reports directory with a timestamped name for later investigation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::flow::{schema, FlowRecordBatch};
use crate::models::attack_slug;

/// Write the anomalous rows as a headed CSV report. Returns the report path.
pub fn save_anomaly_report(
    attack_type: &str,
    rows: &FlowRecordBatch,
    reports_dir: &Path,
    timestamp: DateTime<Utc>,
) -> Result<PathBuf> {
    let filename = format!(
        "anomaly_{}_{}.csv",
        attack_slug(attack_type),
        timestamp.format("%Y_%m_%d-%H_%M_%S")
    );
    let path = reports_dir.join(filename);

    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("failed to create report: {}", path.display()))?;
    writer.write_record(schema::COLUMN_NAMES)?;
    for row in rows.rows() {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;

    Ok(path)
}
