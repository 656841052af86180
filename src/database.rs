//! Metrics sink
//!
//! SQLite-backed persistence for alerts and periodic metrics, consumed by the
//! operator console. All writes are fire-and-forget from the pipeline's point
//! of view: callers log failures and move on.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::engine::stats::StatsSnapshot;
use crate::models::{Alert, PredictionResult};

/// Thread-safe database wrapper.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("failed to open database: {}", path.as_ref().display()))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                attack_type TEXT NOT NULL,
                source_ip TEXT,
                anomaly_percentage REAL NOT NULL,
                report_file TEXT,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_alerts_timestamp ON alerts(timestamp);
            CREATE INDEX IF NOT EXISTS idx_alerts_attack_type ON alerts(attack_type);

            CREATE TABLE IF NOT EXISTS attack_metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                attack_type TEXT NOT NULL,
                predictions_count INTEGER NOT NULL,
                normal_count INTEGER NOT NULL,
                anomaly_count INTEGER NOT NULL,
                anomaly_percentage REAL NOT NULL,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_attack_metrics_type ON attack_metrics(attack_type);

            CREATE TABLE IF NOT EXISTS system_metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                captures_total INTEGER NOT NULL,
                processed_total INTEGER NOT NULL,
                predictions_total INTEGER NOT NULL,
                alerts_total INTEGER NOT NULL,
                capture_queue_size INTEGER NOT NULL,
                processing_queue_size INTEGER NOT NULL,
                prediction_queue_size INTEGER NOT NULL,
                timestamp TEXT NOT NULL
            );
            "#,
        )?;

        Ok(())
    }

    /// Record an emitted alert.
    pub fn log_alert(&self, alert: &Alert, report_file: Option<&str>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO alerts (attack_type, source_ip, anomaly_percentage, report_file, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                alert.attack_type,
                alert.source_ip,
                alert.percentage,
                report_file,
                alert.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Record per-attack-type counters for one evaluated batch.
    pub fn log_attack_metrics(&self, result: &PredictionResult) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO attack_metrics
                 (attack_type, predictions_count, normal_count, anomaly_count,
                  anomaly_percentage, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                result.attack_type,
                result.total() as i64,
                result.normal_count as i64,
                result.anomaly_count as i64,
                result.anomaly_percentage,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Record one periodic pipeline snapshot.
    pub fn log_system_metrics(&self, snap: &StatsSnapshot) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO system_metrics
                 (captures_total, processed_total, predictions_total, alerts_total,
                  capture_queue_size, processing_queue_size, prediction_queue_size, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                snap.stats.captures as i64,
                snap.stats.processed as i64,
                snap.stats.predictions as i64,
                snap.stats.alerts as i64,
                snap.depth_of("capture") as i64,
                snap.depth_of("processing") as i64,
                snap.depth_of("prediction") as i64,
                snap.sampled_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Number of recorded alerts.
    pub fn alert_count(&self) -> Result<i64> {
        self.count("alerts")
    }

    /// Number of recorded per-attack metric rows.
    pub fn attack_metrics_count(&self) -> Result<i64> {
        self.count("attack_metrics")
    }

    /// Number of recorded system snapshots.
    pub fn system_metrics_count(&self) -> Result<i64> {
        self.count("system_metrics")
    }

    fn count(&self, table: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let n = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        Ok(n)
    }
}
