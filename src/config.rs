use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub conversion: ConversionConfig,

    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub alerts: AlertsConfig,

    #[serde(default)]
    pub channels: ChannelsConfig,

    #[serde(default)]
    pub stats: StatsConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load config from default locations or create default
    pub fn load_or_default() -> Result<Self> {
        let paths = [
            PathBuf::from("/etc/flowsentry/config.toml"),
            dirs_next::config_dir()
                .map(|p| p.join("flowsentry/config.toml"))
                .unwrap_or_default(),
            PathBuf::from("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.detection.report_threshold >= self.detection.alert_threshold {
            anyhow::bail!(
                "report threshold ({}) must be below alert threshold ({})",
                self.detection.report_threshold,
                self.detection.alert_threshold
            );
        }
        if self.capture.duration_secs == 0 {
            anyhow::bail!("capture duration must be non-zero");
        }
        if self.channels.capture == 0 || self.channels.processing == 0 || self.channels.prediction == 0
        {
            anyhow::bail!("channel capacities must be non-zero");
        }
        Ok(())
    }

    /// Create every directory the pipeline writes to.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.capture.output_dir,
            &self.conversion.flow_dir,
            &self.detection.models_dir,
            &self.alerts.reports_dir,
            &self.alerts.templates_dir,
            &self.alerts.static_dir,
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Capture stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Network interface to capture on
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Capture command (dumpcap-compatible argument shape)
    #[serde(default = "default_capture_command")]
    pub command: String,

    /// Capture window length in seconds
    #[serde(default = "default_capture_duration")]
    pub duration_secs: u64,

    /// Directory capture artifacts are written to
    #[serde(default = "default_capture_dir")]
    pub output_dir: PathBuf,

    /// Delay before retrying after a failed capture
    #[serde(default = "default_capture_backoff")]
    pub retry_backoff_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            command: default_capture_command(),
            duration_secs: default_capture_duration(),
            output_dir: default_capture_dir(),
            retry_backoff_secs: default_capture_backoff(),
        }
    }
}

/// Conversion stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Flow-extraction command, invoked as `<command> <input> <flow_dir>`
    #[serde(default = "default_convert_command")]
    pub command: String,

    /// Directory the extraction tool writes flow files into
    #[serde(default = "default_flow_dir")]
    pub flow_dir: PathBuf,

    /// Hard timeout for one extraction run
    #[serde(default = "default_convert_timeout")]
    pub timeout_secs: u64,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            command: default_convert_command(),
            flow_dir: default_flow_dir(),
            timeout_secs: default_convert_timeout(),
        }
    }
}

/// Detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Directory of per-attack-type model files
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Attack types to load, in registry (and tie-break) order
    #[serde(default = "default_attack_types")]
    pub attack_types: Vec<String>,

    /// Anomaly percentage above which a report is persisted
    #[serde(default = "default_report_threshold")]
    pub report_threshold: f64,

    /// Anomaly percentage above which an alert is emitted
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            attack_types: default_attack_types(),
            report_threshold: default_report_threshold(),
            alert_threshold: default_alert_threshold(),
        }
    }
}

/// Alert artifact directories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Anomaly report directory
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,

    /// Per-attack-type alert template directory
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,

    /// Externally-visible alert/chart directory
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            reports_dir: default_reports_dir(),
            templates_dir: default_templates_dir(),
            static_dir: default_static_dir(),
        }
    }
}

/// Stage channel capacities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default = "default_capture_queue")]
    pub capture: usize,

    #[serde(default = "default_processing_queue")]
    pub processing: usize,

    #[serde(default = "default_prediction_queue")]
    pub prediction: usize,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            capture: default_capture_queue(),
            processing: default_processing_queue(),
            prediction: default_prediction_queue(),
        }
    }
}

/// Stats reporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Sampling interval in seconds
    #[serde(default = "default_stats_interval")]
    pub interval_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_stats_interval(),
        }
    }
}

/// Metrics sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable the SQLite metrics sink
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path to the metrics database
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            db_path: default_db_path(),
        }
    }
}

fn default_interface() -> String {
    "eth0".to_string()
}

fn default_capture_command() -> String {
    "dumpcap".to_string()
}

fn default_capture_duration() -> u64 {
    60
}

fn default_capture_dir() -> PathBuf {
    PathBuf::from("/var/lib/flowsentry/captures")
}

fn default_capture_backoff() -> u64 {
    5
}

fn default_convert_command() -> String {
    "cfm".to_string()
}

fn default_flow_dir() -> PathBuf {
    PathBuf::from("/var/lib/flowsentry/flows")
}

fn default_convert_timeout() -> u64 {
    300
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("/var/lib/flowsentry/models")
}

fn default_attack_types() -> Vec<String> {
    [
        "Bot_Attack",
        "SSH-Patator",
        "FTP-Patator",
        "DoS GoldenEye",
        "DoS Hulk",
        "DoS slowloris",
        "DoS Slowhttptest",
        "Port_Scan",
        "Web Attack",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_report_threshold() -> f64 {
    10.0
}

fn default_alert_threshold() -> f64 {
    40.0
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("/var/lib/flowsentry/reports")
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("/var/lib/flowsentry/templates")
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("/var/lib/flowsentry/static")
}

fn default_capture_queue() -> usize {
    5
}

fn default_processing_queue() -> usize {
    5
}

fn default_prediction_queue() -> usize {
    10
}

fn default_stats_interval() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/var/lib/flowsentry/flowsentry.db")
}
