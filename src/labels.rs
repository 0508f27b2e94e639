//! Bidirectional mapping between disease names and stable class indices.
//!
//! Index assignment is sorted-lexicographic over the distinct labels, so
//! repeated fits on the same label set always produce the same encoding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabelError {
    #[error("at least two distinct classes are required to fit an encoder, found {0}")]
    TooFewClasses(usize),
    #[error("unknown label '{0}' was not present when the encoder was fitted")]
    UnknownLabel(String),
    #[error("class index {index} is out of range for an encoder with {n_classes} classes")]
    IndexOutOfRange { index: usize, n_classes: usize },
}

/// A fitted encoder. The position of a name in `classes` is its index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fits the encoder on the full set of observed label values.
    pub fn fit(values: &[String]) -> Result<Self, LabelError> {
        let mut classes = values.to_vec();
        classes.sort_unstable();
        classes.dedup();
        if classes.len() < 2 {
            return Err(LabelError::TooFewClasses(classes.len()));
        }
        Ok(Self { classes })
    }

    /// Maps a label to its class index.
    pub fn transform(&self, value: &str) -> Result<usize, LabelError> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .map_err(|_| LabelError::UnknownLabel(value.to_string()))
    }

    /// Maps every label in a slice to its class index, in order.
    pub fn transform_all(&self, values: &[String]) -> Result<Vec<usize>, LabelError> {
        values.iter().map(|v| self.transform(v)).collect()
    }

    /// Maps a class index back to its label.
    pub fn inverse_transform(&self, index: usize) -> Result<&str, LabelError> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or(LabelError::IndexOutOfRange {
                index,
                n_classes: self.classes.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// The class names in index order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}
