//! Classifier model files
//!
//! One JSON file per attack type, bundling the feature subset the classifier
//! was trained on with its parameters. Two model kinds are supported; both
//! score a projected feature row and call it anomalous past a threshold.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::Classifier;
use crate::models::Verdict;

/// On-disk model file contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    /// Attack type this model detects.
    pub attack_type: String,
    /// Ordered feature subset, by canonical column name.
    pub features: Vec<String>,
    /// Model parameters.
    pub model: ModelSpec,
}

/// Supported model parameterizations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    /// Per-feature baseline means/stds; anomalous when the mean absolute
    /// z-score across features exceeds the threshold.
    ZScore {
        means: Vec<f64>,
        stds: Vec<f64>,
        threshold: f64,
    },
    /// Linear score `w . x + bias`; anomalous above the threshold.
    Linear {
        weights: Vec<f64>,
        bias: f64,
        threshold: f64,
    },
}

impl ModelFile {
    /// Check internal consistency and build the runnable classifier.
    pub fn into_classifier(self) -> Result<(String, Vec<String>, Box<dyn Classifier>)> {
        let n = self.features.len();
        let classifier: Box<dyn Classifier> = match self.model {
            ModelSpec::ZScore {
                means,
                stds,
                threshold,
            } => {
                if means.len() != n || stds.len() != n {
                    anyhow::bail!(
                        "zscore model arity mismatch: {} features, {} means, {} stds",
                        n,
                        means.len(),
                        stds.len()
                    );
                }
                Box::new(ZScoreModel {
                    means,
                    stds,
                    threshold,
                })
            }
            ModelSpec::Linear {
                weights,
                bias,
                threshold,
            } => {
                if weights.len() != n {
                    anyhow::bail!(
                        "linear model arity mismatch: {} features, {} weights",
                        n,
                        weights.len()
                    );
                }
                Box::new(LinearModel {
                    weights,
                    bias,
                    threshold,
                })
            }
        };
        Ok((self.attack_type, self.features, classifier))
    }
}

/// Load one model file.
pub fn load_model_file<P: AsRef<Path>>(path: P) -> Result<ModelFile> {
    let file = File::open(path.as_ref())
        .with_context(|| format!("failed to open model file: {}", path.as_ref().display()))?;
    let model = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse model file: {}", path.as_ref().display()))?;
    Ok(model)
}

/// Z-score baseline model.
#[derive(Debug)]
struct ZScoreModel {
    means: Vec<f64>,
    stds: Vec<f64>,
    threshold: f64,
}

impl Classifier for ZScoreModel {
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<Verdict>> {
        rows.iter()
            .map(|row| {
                if row.len() != self.means.len() {
                    anyhow::bail!(
                        "expected {} features, got {}",
                        self.means.len(),
                        row.len()
                    );
                }
                let mut sum = 0.0;
                for (i, &x) in row.iter().enumerate() {
                    let std = self.stds[i];
                    if std > f64::EPSILON {
                        sum += ((x - self.means[i]) / std).abs();
                    }
                }
                let score = sum / row.len() as f64;
                Ok(if score > self.threshold {
                    Verdict::Anomaly
                } else {
                    Verdict::Normal
                })
            })
            .collect()
    }
}

/// Linear scoring model.
#[derive(Debug)]
struct LinearModel {
    weights: Vec<f64>,
    bias: f64,
    threshold: f64,
}

impl Classifier for LinearModel {
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<Verdict>> {
        rows.iter()
            .map(|row| {
                if row.len() != self.weights.len() {
                    anyhow::bail!(
                        "expected {} features, got {}",
                        self.weights.len(),
                        row.len()
                    );
                }
                let score: f64 = row
                    .iter()
                    .zip(self.weights.iter())
                    .map(|(x, w)| x * w)
                    .sum::<f64>()
                    + self.bias;
                Ok(if score > self.threshold {
                    Verdict::Anomaly
                } else {
                    Verdict::Normal
                })
            })
            .collect()
    }
}
