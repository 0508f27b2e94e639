//! Inference: feature alignment, probability conversion, and top-N ranking.
//!
//! The alignment step is the single most important correctness invariant in
//! the system: the request's sparse symptom map is projected onto the
//! canonical feature order recorded at fit time. Any deviation from that
//! order silently produces wrong predictions rather than an error, which is
//! why the row is built exclusively by walking the trained name list.

use crate::model::{ModelBundle, ModelError, softmax};
use ndarray::Array1;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashMap;

/// One ranked inference result. `probability` is in percent; the wire
/// format renders it as a two-decimal percentage string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub disease: String,
    #[serde(serialize_with = "serialize_percent")]
    pub probability: f64,
}

fn serialize_percent<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("{value:.2}%"))
}

/// Builds a single feature row in the canonical trained order.
///
/// Known symptoms missing from the request default to 0; unknown request
/// names are silently ignored.
pub fn align_features(
    symptoms: &HashMap<String, f64>,
    feature_names: &[String],
) -> Array1<f64> {
    Array1::from_iter(
        feature_names
            .iter()
            .map(|name| symptoms.get(name).copied().unwrap_or(0.0)),
    )
}

/// Ranks all classes by softmax probability and returns the top `n`.
pub fn predict_top_n(
    bundle: &ModelBundle,
    symptoms: &HashMap<String, f64>,
    n: usize,
) -> Result<Vec<Prediction>, ModelError> {
    let row = align_features(symptoms, &bundle.feature_names);
    let scores = bundle.classifier.class_scores(row.view());
    let probabilities = softmax(scores.view());

    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    order.sort_by(|&a, &b| {
        probabilities[b]
            .partial_cmp(&probabilities[a])
            .unwrap_or(Ordering::Equal)
    });
    order.truncate(n);

    order
        .into_iter()
        .map(|index| {
            Ok(Prediction {
                disease: bundle.encoder.inverse_transform(index)?.to_string(),
                probability: probabilities[index] * 100.0,
            })
        })
        .collect()
}
