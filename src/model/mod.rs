use ndarray::{Array1, ArrayView2};
use thiserror::Error;

use crate::parsing::Dataset;

pub mod random_forest;
pub mod tree;

/// Reasons a model cannot be trained on the data it was given
#[derive(Debug, Error, PartialEq)]
pub enum FitError {
    #[error("no rows to fit on")]
    EmptyDataset,
    #[error("a forest needs at least one tree")]
    NoTrees,
    #[error("mtry {mtry} is outside 1..={features}")]
    InvalidMtry { mtry: usize, features: usize },
    #[error("need at least two label categories, found {0}")]
    TooFewCategories(usize),
    #[error("cross-validation needs at least two folds, got {0}")]
    InvalidFolds(usize),
    #[error("category `{category}` has {members} rows, fewer than the {folds} folds requested")]
    SparseCategory {
        category: String,
        members: usize,
        folds: usize,
    },
    #[error("column `{column}` row {row} is missing")]
    MissingValue { column: String, row: usize },
    #[error("column `{column}` row {row} holds non-numeric value `{value}`")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },
    #[error("feature {feature} of row {row} is not finite")]
    NonFinite { row: usize, feature: usize },
    #[error("row {row} has category {target}, expected fewer than {n_categories}")]
    LabelOutOfRange {
        row: usize,
        target: usize,
        n_categories: usize,
    },
    #[error("{records} records but {targets} targets")]
    ShapeMismatch { records: usize, targets: usize },
}

/// The capability the pipeline needs from a classifier
pub trait Classifier: Sized {
    type Params;

    /// Train a model. `n_categories` bounds every target index.
    fn fit(dataset: &Dataset, n_categories: usize, params: &Self::Params) -> Result<Self, FitError>;

    /// Predict a category index for every row
    fn predict(&self, records: &ArrayView2<f64>) -> Array1<usize>;

    /// One score per feature, larger is more important
    fn feature_importance(&self) -> Vec<f64>;
}

/// Check the preconditions every classifier shares
pub(crate) fn validate_dataset(dataset: &Dataset, n_categories: usize) -> Result<(), FitError> {
    if dataset.data.nrows() != dataset.target.len() {
        return Err(FitError::ShapeMismatch {
            records: dataset.data.nrows(),
            targets: dataset.target.len(),
        });
    }
    if dataset.nrows() == 0 {
        return Err(FitError::EmptyDataset);
    }
    if n_categories < 2 {
        return Err(FitError::TooFewCategories(n_categories));
    }
    if let Some((row, &target)) = dataset
        .target
        .iter()
        .enumerate()
        .find(|&(_, &t)| t >= n_categories)
    {
        return Err(FitError::LabelOutOfRange {
            row,
            target,
            n_categories,
        });
    }
    if let Some(((row, feature), _)) = dataset.data.indexed_iter().find(|(_, x)| !x.is_finite()) {
        return Err(FitError::NonFinite { row, feature });
    }

    Ok(())
}
