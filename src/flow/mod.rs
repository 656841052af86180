//! Flow record batches
//!
//! An in-memory, column-canonical view of one converted capture window. The
//! conversion stage leaves a headerless CSV behind; [`read_flow_csv`] parses it
//! against [`schema::COLUMN_NAMES`], rounding numeric values to two decimals
//! and filling anything missing or unparseable with zero, so downstream stages
//! can assume every row carries every canonical column.

pub mod schema;

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};

use crate::models::Verdict;

/// A single cell in a flow row.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Numeric feature value, already rounded to two decimals.
    Num(f64),
    /// Identifying text value (IPs, flow id, timestamp, label).
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Num(n) => write!(f, "{}", n),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// An ordered batch of flow rows over the canonical schema.
///
/// Invariant: every row has exactly [`schema::NUM_COLUMNS`] values.
#[derive(Debug, Clone, Default)]
pub struct FlowRecordBatch {
    rows: Vec<Vec<FieldValue>>,
}

impl FlowRecordBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Append a row, padding short rows with zeros and truncating long ones
    /// to the schema arity.
    pub fn push_row(&mut self, mut row: Vec<FieldValue>) {
        row.truncate(schema::NUM_COLUMNS);
        while row.len() < schema::NUM_COLUMNS {
            let idx = row.len();
            row.push(if schema::is_text_column(idx) {
                FieldValue::Text(String::new())
            } else {
                FieldValue::Num(0.0)
            });
        }
        self.rows.push(row);
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the batch has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows, in stable order.
    pub fn rows(&self) -> &[Vec<FieldValue>] {
        &self.rows
    }

    /// Numeric value at (row, column); text cells read as zero.
    pub fn numeric(&self, row: usize, col: usize) -> f64 {
        match self.rows.get(row).and_then(|r| r.get(col)) {
            Some(FieldValue::Num(n)) => *n,
            _ => 0.0,
        }
    }

    /// Text value at (row, column); numeric cells read as empty.
    pub fn text(&self, row: usize, col: usize) -> &str {
        match self.rows.get(row).and_then(|r| r.get(col)) {
            Some(FieldValue::Text(s)) => s.as_str(),
            _ => "",
        }
    }

    /// Project the batch onto an ordered feature subset, one `Vec<f64>` per
    /// row. Fails on unknown or non-numeric feature columns; the caller
    /// records that as a per-classifier error.
    pub fn project(&self, features: &[String]) -> Result<Vec<Vec<f64>>> {
        let mut indices = Vec::with_capacity(features.len());
        for name in features {
            let idx = schema::column_index(name)
                .with_context(|| format!("unknown feature column: {}", name))?;
            if schema::is_text_column(idx) {
                anyhow::bail!("feature column is not numeric: {}", name);
            }
            indices.push(idx);
        }

        Ok(self
            .rows
            .iter()
            .map(|row| {
                indices
                    .iter()
                    .map(|&i| match &row[i] {
                        FieldValue::Num(n) => *n,
                        FieldValue::Text(_) => 0.0,
                    })
                    .collect()
            })
            .collect())
    }

    /// The subset of rows judged anomalous, in original order.
    ///
    /// `verdicts` must be row-aligned; extra verdicts are ignored.
    pub fn anomalous_subset(&self, verdicts: &[Verdict]) -> FlowRecordBatch {
        let rows = self
            .rows
            .iter()
            .zip(verdicts.iter())
            .filter(|(_, v)| v.is_anomaly())
            .map(|(row, _)| row.clone())
            .collect();
        Self { rows }
    }

    /// Most frequent source IP across the batch, ties broken by first
    /// appearance in row order. `None` when the batch is empty or no row
    /// carries a source IP.
    pub fn modal_source_ip(&self) -> Option<String> {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for (i, _) in self.rows.iter().enumerate() {
            let ip = self.text(i, schema::SOURCE_IP);
            if ip.is_empty() {
                continue;
            }
            match counts.iter_mut().find(|(seen, _)| *seen == ip) {
                Some((_, n)) => *n += 1,
                None => counts.push((ip, 1)),
            }
        }
        // max_by_key would keep the last maximum; scan manually so the first wins.
        let mut best: Option<(&str, usize)> = None;
        for (ip, n) in counts {
            if best.map_or(true, |(_, bn)| n > bn) {
                best = Some((ip, n));
            }
        }
        best.map(|(ip, _)| ip.to_string())
    }
}

/// Parse one numeric CSV field: empty, unparseable, NaN and infinite values
/// all normalize to zero.
fn parse_numeric(field: &str) -> f64 {
    match field.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => round2(v),
        _ => 0.0,
    }
}

/// Read a headerless flow CSV into a batch against the canonical schema.
pub fn read_flow_csv<P: AsRef<Path>>(path: P) -> Result<FlowRecordBatch> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path.as_ref())
        .with_context(|| format!("failed to open flow file: {}", path.as_ref().display()))?;

    let mut batch = FlowRecordBatch::new();
    for record in reader.records() {
        let record = record
            .with_context(|| format!("malformed flow record in {}", path.as_ref().display()))?;

        let row = (0..schema::NUM_COLUMNS)
            .map(|i| {
                let field = record.get(i).unwrap_or("");
                if schema::is_text_column(i) {
                    FieldValue::Text(field.trim().to_string())
                } else {
                    FieldValue::Num(parse_numeric(field))
                }
            })
            .collect();
        batch.push_row(row);
    }

    Ok(batch)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    /// Build a minimal row with the given source IP and flow duration.
    pub(crate) fn test_row(source_ip: &str, duration: f64) -> Vec<FieldValue> {
        let mut row: Vec<FieldValue> = (0..schema::NUM_COLUMNS)
            .map(|i| {
                if schema::is_text_column(i) {
                    FieldValue::Text(String::new())
                } else {
                    FieldValue::Num(0.0)
                }
            })
            .collect();
        row[schema::SOURCE_IP] = FieldValue::Text(source_ip.to_string());
        row[schema::column_index("Flow Duration").unwrap()] = FieldValue::Num(duration);
        row
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(10.005), 10.01);
        assert_eq!(round2(41.0), 41.0);
        assert_eq!(round2(33.333333), 33.33);
    }

    #[test]
    fn test_push_row_pads_and_truncates() {
        let mut batch = FlowRecordBatch::new();
        batch.push_row(vec![FieldValue::Text("flow-1".into())]);
        assert_eq!(batch.rows()[0].len(), schema::NUM_COLUMNS);
        assert_eq!(batch.numeric(0, schema::LABEL - 1), 0.0);

        let long: Vec<FieldValue> = (0..schema::NUM_COLUMNS + 5)
            .map(|_| FieldValue::Num(1.0))
            .collect();
        batch.push_row(long);
        assert_eq!(batch.rows()[1].len(), schema::NUM_COLUMNS);
    }

    #[test]
    fn test_project() {
        let mut batch = FlowRecordBatch::new();
        batch.push_row(test_row("10.0.0.1", 1234.5));

        let rows = batch
            .project(&["Flow Duration".to_string(), "Flow IAT Max".to_string()])
            .unwrap();
        assert_eq!(rows, vec![vec![1234.5, 0.0]]);

        assert!(batch.project(&["Nope".to_string()]).is_err());
        assert!(batch.project(&["Source IP".to_string()]).is_err());
    }

    #[test]
    fn test_modal_source_ip_first_encounter_tie() {
        let mut batch = FlowRecordBatch::new();
        batch.push_row(test_row("10.0.0.1", 1.0));
        batch.push_row(test_row("10.0.0.2", 1.0));
        batch.push_row(test_row("10.0.0.2", 1.0));
        batch.push_row(test_row("10.0.0.1", 1.0));
        // Tied 2-2: the first-encountered IP wins.
        assert_eq!(batch.modal_source_ip().as_deref(), Some("10.0.0.1"));

        assert_eq!(FlowRecordBatch::new().modal_source_ip(), None);
    }

    #[test]
    fn test_anomalous_subset() {
        let mut batch = FlowRecordBatch::new();
        batch.push_row(test_row("10.0.0.1", 1.0));
        batch.push_row(test_row("10.0.0.2", 2.0));
        batch.push_row(test_row("10.0.0.3", 3.0));

        let verdicts = vec![Verdict::Normal, Verdict::Anomaly, Verdict::Anomaly];
        let subset = batch.anomalous_subset(&verdicts);
        assert_eq!(subset.len(), 2);
        assert_eq!(subset.text(0, schema::SOURCE_IP), "10.0.0.2");
        assert_eq!(subset.text(1, schema::SOURCE_IP), "10.0.0.3");
    }

    #[test]
    fn test_read_flow_csv_normalizes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        // Two rows: one complete-ish, one short with junk numerics.
        writeln!(
            file,
            "f1,192.168.1.5,443,10.0.0.9,80,6,2024-01-01 10:00:00,1000.456"
        )
        .unwrap();
        writeln!(file, "f2,192.168.1.6,22,10.0.0.9,80,6,2024-01-01 10:00:01,NaN").unwrap();
        file.flush().unwrap();

        let batch = read_flow_csv(file.path()).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.text(0, schema::SOURCE_IP), "192.168.1.5");
        // Rounded to two decimals.
        assert_eq!(
            batch.numeric(0, schema::column_index("Flow Duration").unwrap()),
            1000.46
        );
        // NaN filled with zero, missing trailing columns padded with zero.
        assert_eq!(
            batch.numeric(1, schema::column_index("Flow Duration").unwrap()),
            0.0
        );
        assert_eq!(
            batch.numeric(1, schema::column_index("Idle Min").unwrap()),
            0.0
        );
    }
}
