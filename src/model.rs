//! The trained classifier and the persisted artifact bundle.
//!
//! The bundle is three co-versioned TOML files (classifier, ordered feature
//! names, label encoder) that are only meaningful together. The load path
//! enforces the cross-artifact invariants (feature dimensionality, class
//! count) and treats any violation as fatal.

use crate::labels::{LabelEncoder, LabelError};
use ndarray::{Array1, Array2, ArrayView1, array};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fixed artifact file names inside the model directory.
pub const CLASSIFIER_FILE: &str = "classifier.toml";
pub const FEATURE_NAMES_FILE: &str = "feature_names.toml";
pub const LABEL_ENCODER_FILE: &str = "label_encoder.toml";

/// Custom error type for bundle loading, saving, and consistency checks.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read artifact file '{path}': {source}")]
    ArtifactUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write artifact file '{path}': {source}")]
    ArtifactWrite {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML artifact file '{path}': {source}")]
    ArtifactParse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize artifact to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error(
        "The classifier expects {classifier} features, but the feature-name list has {feature_names}. The artifact bundle is inconsistent."
    )]
    InconsistentFeatureCount {
        classifier: usize,
        feature_names: usize,
    },
    #[error(
        "The classifier was trained for {classifier} classes, but the label encoder has {encoder}. The artifact bundle is inconsistent."
    )]
    InconsistentClassCount { classifier: usize, encoder: usize },
    #[error(
        "The classifier stores {machines} decision machines but {expected} were expected for {n_classes} classes."
    )]
    InconsistentMachineCount {
        machines: usize,
        expected: usize,
        n_classes: usize,
    },
    #[error("A classifier needs at least two classes, found {0}.")]
    TooFewClasses(usize),
    #[error(transparent)]
    Label(#[from] LabelError),
}

/// A fitted one-vs-rest linear classifier.
///
/// For `n_classes > 2` there is one decision machine (weight row +
/// intercept) per class. For exactly two classes there is a single machine
/// whose signed score separates class 1 (positive) from class 0, matching
/// the one-dimensional decision output of a binary linear SVM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearClassifier {
    pub n_classes: usize,
    /// Weight rows, shape `[n_machines, n_features]`.
    pub weights: Array2<f64>,
    /// One intercept per machine.
    pub intercepts: Array1<f64>,
}

impl LinearClassifier {
    pub fn n_features(&self) -> usize {
        self.weights.ncols()
    }

    pub fn n_machines(&self) -> usize {
        self.weights.nrows()
    }

    /// Raw per-machine decision scores `w·x + b`: real-valued, unnormalized,
    /// not probabilities.
    pub fn decision_function(&self, x: ArrayView1<f64>) -> Array1<f64> {
        self.weights.dot(&x) + &self.intercepts
    }

    /// Per-class scores, always of length `n_classes`.
    ///
    /// The two-class case produces a single signed distance; softmax over a
    /// one-element vector is meaningless, so the scalar score `s` is
    /// expanded to `[-s, +s]` before any probability conversion.
    pub fn class_scores(&self, x: ArrayView1<f64>) -> Array1<f64> {
        let raw = self.decision_function(x);
        if self.n_classes == 2 && raw.len() == 1 {
            let s = raw[0];
            array![-s, s]
        } else {
            raw
        }
    }
}

/// Numerically stable softmax: normalized exponentiation of a score vector.
pub fn softmax(scores: ArrayView1<f64>) -> Array1<f64> {
    let max = scores.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let exp = scores.mapv(|s| (s - max).exp());
    let total = exp.sum();
    exp / total
}

/// The top-level trained artifact: classifier, canonical feature order, and
/// label encoder. Always loaded and used together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    pub classifier: LinearClassifier,
    pub feature_names: Vec<String>,
    pub encoder: LabelEncoder,
}

/// On-disk wrapper so the feature list serializes as a TOML table.
#[derive(Debug, Serialize, Deserialize)]
struct FeatureNamesFile {
    feature_names: Vec<String>,
}

impl ModelBundle {
    /// Checks the cross-artifact invariants. Any mismatch is a fatal
    /// configuration error, not a recoverable one.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.classifier.n_classes < 2 {
            return Err(ModelError::TooFewClasses(self.classifier.n_classes));
        }
        if self.classifier.n_features() != self.feature_names.len() {
            return Err(ModelError::InconsistentFeatureCount {
                classifier: self.classifier.n_features(),
                feature_names: self.feature_names.len(),
            });
        }
        if self.classifier.n_classes != self.encoder.len() {
            return Err(ModelError::InconsistentClassCount {
                classifier: self.classifier.n_classes,
                encoder: self.encoder.len(),
            });
        }
        let expected = if self.classifier.n_classes == 2 {
            1
        } else {
            self.classifier.n_classes
        };
        if self.classifier.n_machines() != expected
            || self.classifier.intercepts.len() != expected
        {
            return Err(ModelError::InconsistentMachineCount {
                machines: self.classifier.n_machines(),
                expected,
                n_classes: self.classifier.n_classes,
            });
        }
        Ok(())
    }

    /// Saves the three artifacts as a set.
    ///
    /// Every artifact is staged to a temporary file first and only renamed
    /// into place once all of them have serialized, so a failed run cannot
    /// leave a mixed bundle behind.
    pub fn save(&self, dir: &Path) -> Result<(), ModelError> {
        self.validate()?;
        fs::create_dir_all(dir).map_err(|e| ModelError::ArtifactWrite {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let artifacts = [
            (CLASSIFIER_FILE, toml::to_string_pretty(&self.classifier)?),
            (
                FEATURE_NAMES_FILE,
                toml::to_string_pretty(&FeatureNamesFile {
                    feature_names: self.feature_names.clone(),
                })?,
            ),
            (LABEL_ENCODER_FILE, toml::to_string_pretty(&self.encoder)?),
        ];

        let mut staged = Vec::with_capacity(artifacts.len());
        for (name, contents) in &artifacts {
            let tmp = dir.join(format!("{name}.tmp"));
            write_artifact(&tmp, contents)?;
            staged.push((tmp, dir.join(name)));
        }
        for (tmp, path) in staged {
            fs::rename(&tmp, &path).map_err(|e| ModelError::ArtifactWrite { path, source: e })?;
        }
        Ok(())
    }

    /// Loads and cross-validates the three artifacts from a model directory.
    pub fn load(dir: &Path) -> Result<Self, ModelError> {
        let classifier: LinearClassifier = read_artifact(&dir.join(CLASSIFIER_FILE))?;
        let names: FeatureNamesFile = read_artifact(&dir.join(FEATURE_NAMES_FILE))?;
        let encoder: LabelEncoder = read_artifact(&dir.join(LABEL_ENCODER_FILE))?;
        let bundle = Self {
            classifier,
            feature_names: names.feature_names,
            encoder,
        };
        bundle.validate()?;
        Ok(bundle)
    }
}

fn write_artifact(path: &Path, contents: &str) -> Result<(), ModelError> {
    let map_err = |e| ModelError::ArtifactWrite {
        path: path.to_path_buf(),
        source: e,
    };
    let mut file = BufWriter::new(fs::File::create(path).map_err(map_err)?);
    file.write_all(contents.as_bytes()).map_err(map_err)?;
    file.flush().map_err(map_err)
}

fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let contents = fs::read_to_string(path).map_err(|e| ModelError::ArtifactUnreadable {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&contents).map_err(|e| ModelError::ArtifactParse {
        path: path.to_path_buf(),
        source: e,
    })
}
