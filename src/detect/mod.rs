//! Attack classification
//!
//! A fixed registry of per-attack-type classifiers, loaded once at startup.
//! Each entry bundles the feature subset its model expects with an opaque
//! [`Classifier`]; evaluation projects the batch onto that subset and turns
//! the verdicts into a [`PredictionResult`]. A classifier that fails to load
//! is logged and skipped for the lifetime of the process; a classifier that
//! fails at inference time poisons only its own result.

pub mod model;

use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use crate::flow::{round2, FlowRecordBatch};
use crate::models::{attack_slug, PredictionResult, Verdict};

pub use model::{load_model_file, ModelFile, ModelSpec};

/// Opaque per-attack-type prediction capability.
///
/// Implementations return exactly one verdict per input row; failures surface
/// as error values, never panics.
pub trait Classifier: Send + Sync {
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<Verdict>>;
}

/// One registered attack type.
pub struct RegistryEntry {
    attack_type: String,
    features: Vec<String>,
    classifier: Box<dyn Classifier>,
}

impl RegistryEntry {
    pub fn new(attack_type: String, features: Vec<String>, classifier: Box<dyn Classifier>) -> Self {
        Self {
            attack_type,
            features,
            classifier,
        }
    }

    pub fn attack_type(&self) -> &str {
        &self.attack_type
    }
}

/// Fixed, ordered set of classifiers. Read-only after startup.
pub struct ClassifierRegistry {
    entries: Vec<RegistryEntry>,
}

impl ClassifierRegistry {
    /// Load classifiers for the configured attack types, in order. Each type
    /// maps to `<models_dir>/<slug>.json`; entries that fail to load are
    /// logged and left out permanently.
    pub fn load(models_dir: &Path, attack_types: &[String]) -> Self {
        let mut entries = Vec::new();

        for attack in attack_types {
            let path = models_dir.join(format!("{}.json", attack_slug(attack)));
            let loaded = load_model_file(&path).and_then(ModelFile::into_classifier);
            match loaded {
                Ok((attack_type, features, classifier)) => {
                    info!(attack = %attack_type, features = features.len(), "loaded classifier");
                    entries.push(RegistryEntry::new(attack_type, features, classifier));
                }
                Err(e) => {
                    warn!(attack = %attack, "classifier not loaded, skipping: {:#}", e);
                }
            }
        }

        if entries.is_empty() {
            warn!("no classifiers loaded; every batch will produce zero results");
        }

        Self { entries }
    }

    /// Build a registry from pre-constructed entries (test and embedding use).
    pub fn from_entries(entries: Vec<RegistryEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered attack types, in registry order.
    pub fn attack_types(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.attack_type.as_str()).collect()
    }

    /// Evaluate every registered attack type against the batch, in registry
    /// order. Per-entry failures are captured in that entry's result.
    pub fn evaluate(&self, batch: &FlowRecordBatch) -> Vec<PredictionResult> {
        self.entries
            .iter()
            .map(|entry| evaluate_entry(entry, batch))
            .collect()
    }
}

fn evaluate_entry(entry: &RegistryEntry, batch: &FlowRecordBatch) -> PredictionResult {
    let rows = match batch.project(&entry.features) {
        Ok(rows) => rows,
        Err(e) => return PredictionResult::failed(&entry.attack_type, format!("{:#}", e)),
    };

    let verdicts = match entry.classifier.predict(&rows) {
        Ok(v) => v,
        Err(e) => return PredictionResult::failed(&entry.attack_type, format!("{:#}", e)),
    };
    if verdicts.len() != rows.len() {
        return PredictionResult::failed(
            &entry.attack_type,
            format!("classifier returned {} verdicts for {} rows", verdicts.len(), rows.len()),
        );
    }

    let total = verdicts.len();
    let anomaly_count = verdicts.iter().filter(|v| v.is_anomaly()).count();
    let normal_count = total - anomaly_count;
    let anomaly_percentage = if total == 0 {
        0.0
    } else {
        round2(anomaly_count as f64 / total as f64 * 100.0)
    };

    let (anomalous_rows, source_ip) = if anomaly_count > 0 {
        let subset = batch.anomalous_subset(&verdicts);
        let ip = subset.modal_source_ip();
        (subset, ip)
    } else {
        (FlowRecordBatch::new(), None)
    };

    PredictionResult {
        attack_type: entry.attack_type.clone(),
        source_ip,
        anomaly_percentage,
        normal_count,
        anomaly_count,
        anomalous_rows,
        verdicts,
        error: None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::flow::tests::test_row;
    use std::io::Write;

    /// Classifier that replays a fixed verdict sequence, padding with Normal.
    pub(crate) struct StubClassifier {
        pub verdicts: Vec<Verdict>,
    }

    impl Classifier for StubClassifier {
        fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<Verdict>> {
            Ok((0..rows.len())
                .map(|i| self.verdicts.get(i).copied().unwrap_or(Verdict::Normal))
                .collect())
        }
    }

    /// Classifier that always fails.
    struct FailingClassifier;

    impl Classifier for FailingClassifier {
        fn predict(&self, _rows: &[Vec<f64>]) -> Result<Vec<Verdict>> {
            anyhow::bail!("inference backend unavailable")
        }
    }

    pub(crate) fn stub_entry(attack: &str, verdicts: Vec<Verdict>) -> RegistryEntry {
        RegistryEntry::new(
            attack.to_string(),
            vec!["Flow Duration".to_string()],
            Box::new(StubClassifier { verdicts }),
        )
    }

    fn batch_of(n: usize) -> FlowRecordBatch {
        let mut batch = FlowRecordBatch::new();
        for i in 0..n {
            batch.push_row(test_row(&format!("10.0.0.{}", i % 4), i as f64));
        }
        batch
    }

    #[test]
    fn test_counts_and_percentage() {
        // 100 rows, 10 anomalous: 10.0%.
        let mut verdicts = vec![Verdict::Normal; 90];
        verdicts.extend(vec![Verdict::Anomaly; 10]);
        let registry = ClassifierRegistry::from_entries(vec![stub_entry("Port_Scan", verdicts)]);

        let results = registry.evaluate(&batch_of(100));
        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert!(r.error.is_none());
        assert_eq!(r.normal_count + r.anomaly_count, 100);
        assert_eq!(r.anomaly_count, 10);
        assert_eq!(r.anomaly_percentage, 10.0);
        assert_eq!(r.anomalous_rows.len(), 10);
        assert!(r.source_ip.is_some());
    }

    #[test]
    fn test_empty_batch_is_zero_percent_no_error() {
        let registry =
            ClassifierRegistry::from_entries(vec![stub_entry("Bot_Attack", Vec::new())]);
        let results = registry.evaluate(&FlowRecordBatch::new());
        let r = &results[0];
        assert!(r.error.is_none());
        assert_eq!(r.total(), 0);
        assert_eq!(r.anomaly_percentage, 0.0);
        assert!(r.source_ip.is_none());
    }

    #[test]
    fn test_failing_classifier_does_not_block_others() {
        let registry = ClassifierRegistry::from_entries(vec![
            RegistryEntry::new(
                "Bot_Attack".to_string(),
                vec!["Flow Duration".to_string()],
                Box::new(FailingClassifier),
            ),
            stub_entry("Port_Scan", vec![Verdict::Anomaly; 4]),
        ]);

        let results = registry.evaluate(&batch_of(4));
        assert_eq!(results.len(), 2);
        assert!(results[0].error.is_some());
        assert!(results[1].error.is_none());
        assert_eq!(results[1].anomaly_percentage, 100.0);
    }

    #[test]
    fn test_results_follow_registry_order() {
        let registry = ClassifierRegistry::from_entries(vec![
            stub_entry("Bot_Attack", Vec::new()),
            stub_entry("Port_Scan", Vec::new()),
        ]);
        let results = registry.evaluate(&batch_of(2));
        assert_eq!(results[0].attack_type, "Bot_Attack");
        assert_eq!(results[1].attack_type, "Port_Scan");
    }

    #[test]
    fn test_load_skips_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();

        // One good model, one malformed file, one missing entirely.
        let good = ModelFile {
            attack_type: "Bot_Attack".to_string(),
            features: vec!["Flow IAT Max".to_string()],
            model: ModelSpec::Linear {
                weights: vec![1.0],
                bias: 0.0,
                threshold: 100.0,
            },
        };
        std::fs::write(
            dir.path().join("Bot_Attack.json"),
            serde_json::to_string(&good).unwrap(),
        )
        .unwrap();
        let mut bad = std::fs::File::create(dir.path().join("Port_Scan.json")).unwrap();
        writeln!(bad, "{{ not json").unwrap();

        let registry = ClassifierRegistry::load(
            dir.path(),
            &[
                "Bot_Attack".to_string(),
                "Port_Scan".to_string(),
                "Web Attack".to_string(),
            ],
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.attack_types(), vec!["Bot_Attack"]);
    }

    #[test]
    fn test_modal_source_ip_of_anomalous_rows() {
        let mut batch = FlowRecordBatch::new();
        batch.push_row(test_row("10.0.0.1", 1.0));
        batch.push_row(test_row("10.0.0.2", 2.0));
        batch.push_row(test_row("10.0.0.2", 3.0));
        batch.push_row(test_row("10.0.0.3", 4.0));

        // Anomalies at rows 1 and 2, both from 10.0.0.2.
        let verdicts = vec![
            Verdict::Normal,
            Verdict::Anomaly,
            Verdict::Anomaly,
            Verdict::Normal,
        ];
        let registry = ClassifierRegistry::from_entries(vec![stub_entry("Port_Scan", verdicts)]);
        let results = registry.evaluate(&batch);
        assert_eq!(results[0].source_ip.as_deref(), Some("10.0.0.2"));
        assert_eq!(results[0].anomaly_percentage, 50.0);
    }
}
