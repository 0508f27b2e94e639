//! # Classifier Fitting and Cross-Validation
//!
//! Fits an L2-regularized hinge-loss linear SVM in the dual by coordinate
//! descent, one binary machine per class (one-vs-rest), with class-balanced
//! per-sample costs to correct for class-frequency skew. The solver runs
//! seeded per-epoch permutations under a hard iteration cap, so repeated
//! fits on the same data produce the same machine.
//!
//! Stratified k-fold cross-validation is provided as a diagnostic only: it
//! reports an accuracy estimate and never feeds back into hyperparameters.

use crate::model::LinearClassifier;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;

/// Fixed training hyperparameters. These mirror the reference training run
/// and are a settled external decision, not a tunable surface.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Regularization constant (inverse regularization strength).
    pub c: f64,
    /// Hard cap on coordinate-descent epochs per machine.
    pub max_iter: usize,
    /// Early-stop tolerance on the largest projected-gradient violation.
    pub tol: f64,
    /// Seed for every shuffle in fitting and fold assignment.
    pub seed: u64,
    /// Number of cross-validation folds.
    pub folds: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            c: 0.5,
            max_iter: 2000,
            tol: 1e-4,
            seed: 42,
            folds: 5,
        }
    }
}

#[derive(Error, Debug)]
pub enum TrainError {
    #[error("Training requires at least two classes, found {0}.")]
    TooFewClasses(usize),
    #[error("The training dataset has no rows.")]
    EmptyDataset,
    #[error("The feature matrix has {rows} rows but {labels} labels were provided.")]
    DimensionMismatch { rows: usize, labels: usize },
    #[error("Encoded label {label} is out of range for {n_classes} classes.")]
    LabelOutOfRange { label: usize, n_classes: usize },
}

/// Per-fold accuracy figures from stratified cross-validation.
#[derive(Debug, Clone)]
pub struct CvReport {
    pub fold_accuracies: Vec<f64>,
}

impl CvReport {
    pub fn mean(&self) -> f64 {
        if self.fold_accuracies.is_empty() {
            return 0.0;
        }
        self.fold_accuracies.iter().sum::<f64>() / self.fold_accuracies.len() as f64
    }

    pub fn std_dev(&self) -> f64 {
        if self.fold_accuracies.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .fold_accuracies
            .iter()
            .map(|a| (a - mean).powi(2))
            .sum::<f64>()
            / self.fold_accuracies.len() as f64;
        variance.sqrt()
    }
}

/// Fits the final classifier on the full dataset.
///
/// `y` holds encoded class indices in `0..n_classes`. For `n_classes > 2`
/// one machine is fitted per class; for exactly two classes a single
/// machine separates class 1 (positive) from class 0.
pub fn fit(
    x: ArrayView2<f64>,
    y: &[usize],
    n_classes: usize,
    config: &TrainConfig,
) -> Result<LinearClassifier, TrainError> {
    validate_inputs(x, y, n_classes)?;

    let n = x.nrows();
    let mut counts = vec![0usize; n_classes];
    for &label in y {
        counts[label] += 1;
    }

    // sklearn's class_weight="balanced" heuristic: each sample's cost is
    // C * n / (K * count(class_of_sample)), shared by every binary machine.
    let class_costs: Vec<f64> = counts
        .iter()
        .map(|&count| {
            if count == 0 {
                0.0
            } else {
                config.c * n as f64 / (n_classes as f64 * count as f64)
            }
        })
        .collect();
    let costs: Vec<f64> = y.iter().map(|&label| class_costs[label]).collect();

    let positives: Vec<usize> = if n_classes == 2 {
        vec![1]
    } else {
        (0..n_classes).collect()
    };

    let mut weights = Array2::<f64>::zeros((positives.len(), x.ncols()));
    let mut intercepts = Array1::<f64>::zeros(positives.len());
    for (machine, &positive) in positives.iter().enumerate() {
        let targets: Vec<f64> = y
            .iter()
            .map(|&label| if label == positive { 1.0 } else { -1.0 })
            .collect();
        let (w, b) = solve_binary(x, &targets, &costs, config);
        weights.row_mut(machine).assign(&w);
        intercepts[machine] = b;
    }

    log::info!(
        "Fitted {} decision machine(s) over {} samples, {} features, {} classes",
        positives.len(),
        n,
        x.ncols(),
        n_classes
    );

    Ok(LinearClassifier {
        n_classes,
        weights,
        intercepts,
    })
}

/// Stratified k-fold cross-validation accuracy, shuffled with the fixed
/// seed. Diagnostic output only; the deployed artifact is refit on all rows
/// afterwards, so these figures are the only accuracy estimate it gets.
pub fn cross_validate(
    x: ArrayView2<f64>,
    y: &[usize],
    n_classes: usize,
    config: &TrainConfig,
) -> Result<CvReport, TrainError> {
    validate_inputs(x, y, n_classes)?;

    // Deal each class's shuffled members round-robin across folds, so every
    // fold keeps roughly the full class mix even for rare classes.
    let mut assignment = vec![0usize; y.len()];
    let mut rng = StdRng::seed_from_u64(config.seed);
    for class in 0..n_classes {
        let mut members: Vec<usize> = (0..y.len()).filter(|&i| y[i] == class).collect();
        members.shuffle(&mut rng);
        for (position, &row) in members.iter().enumerate() {
            assignment[row] = position % config.folds;
        }
    }

    let mut fold_accuracies = Vec::with_capacity(config.folds);
    for fold in 0..config.folds {
        let test_rows: Vec<usize> = (0..y.len()).filter(|&i| assignment[i] == fold).collect();
        let train_rows: Vec<usize> = (0..y.len()).filter(|&i| assignment[i] != fold).collect();
        if test_rows.is_empty() || train_rows.is_empty() {
            log::warn!("Skipping fold {fold}: not enough rows to populate it");
            continue;
        }

        let x_train = x.select(Axis(0), &train_rows);
        let y_train: Vec<usize> = train_rows.iter().map(|&i| y[i]).collect();
        let machine = fit(x_train.view(), &y_train, n_classes, config)?;

        let correct = test_rows
            .iter()
            .filter(|&&i| argmax(machine.class_scores(x.row(i)).view()) == y[i])
            .count();
        fold_accuracies.push(correct as f64 / test_rows.len() as f64);
    }

    Ok(CvReport { fold_accuracies })
}

fn validate_inputs(x: ArrayView2<f64>, y: &[usize], n_classes: usize) -> Result<(), TrainError> {
    if x.nrows() != y.len() {
        return Err(TrainError::DimensionMismatch {
            rows: x.nrows(),
            labels: y.len(),
        });
    }
    if x.nrows() == 0 {
        return Err(TrainError::EmptyDataset);
    }
    if n_classes < 2 {
        return Err(TrainError::TooFewClasses(n_classes));
    }
    if let Some(&label) = y.iter().find(|&&label| label >= n_classes) {
        return Err(TrainError::LabelOutOfRange { label, n_classes });
    }
    Ok(())
}

/// Dual coordinate descent for one binary machine (liblinear-style,
/// L1-loss). `targets` are ±1; `costs` are the per-sample upper bounds on
/// the dual variables. The intercept is learned by augmenting each sample
/// with a constant 1 feature, which adds 1.0 to every diagonal entry.
fn solve_binary(
    x: ArrayView2<f64>,
    targets: &[f64],
    costs: &[f64],
    config: &TrainConfig,
) -> (Array1<f64>, f64) {
    let n = x.nrows();
    let mut w = Array1::<f64>::zeros(x.ncols());
    let mut b = 0.0f64;
    let mut alpha = vec![0.0f64; n];

    let diag: Vec<f64> = (0..n)
        .map(|i| {
            let row = x.row(i);
            row.dot(&row) + 1.0
        })
        .collect();

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(config.seed);
    for _epoch in 0..config.max_iter {
        order.shuffle(&mut rng);
        let mut max_violation = 0.0f64;
        for &i in &order {
            let row = x.row(i);
            let target = targets[i];
            let gradient = target * (w.dot(&row) + b) - 1.0;

            let projected = if alpha[i] <= 0.0 {
                gradient.min(0.0)
            } else if alpha[i] >= costs[i] {
                gradient.max(0.0)
            } else {
                gradient
            };
            if projected == 0.0 {
                continue;
            }
            max_violation = max_violation.max(projected.abs());

            let updated = (alpha[i] - gradient / diag[i]).clamp(0.0, costs[i]);
            let delta = (updated - alpha[i]) * target;
            if delta != 0.0 {
                w.scaled_add(delta, &row);
                b += delta;
            }
            alpha[i] = updated;
        }
        if max_violation < config.tol {
            break;
        }
    }

    (w, b)
}

fn argmax(scores: ArrayView1<f64>) -> usize {
    let mut best = 0;
    for (index, &score) in scores.iter().enumerate() {
        if score > scores[best] {
            best = index;
        }
    }
    best
}
