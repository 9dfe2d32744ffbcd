use ndarray::Array1;
use rayon::prelude::*;

use super::ConfusionMatrix;
use crate::cleaning::Categories;
use crate::config::CvConfig;
use crate::error::Result;
use crate::model::random_forest::{ForestParams, RandomForest};
use crate::model::{Classifier, FitError};
use crate::parsing::Dataset;
use crate::split::{sample_rows, stratified_folds};

/// Aggregated fold scores of one `mtry` candidate
#[derive(Clone, Debug, PartialEq)]
pub struct CvRow {
    pub mtry: usize,
    pub fold_accuracy: Vec<f64>,
    pub mean_accuracy: f64,
    pub sd_accuracy: f64,
    pub mean_kappa: f64,
}

#[derive(Clone, Debug)]
pub struct CvResult {
    pub rows: Vec<CvRow>,
    /// Index into `rows` of the highest mean accuracy
    pub best: usize,
    pub sample_size: usize,
    pub folds: usize,
}

impl CvResult {
    pub fn best_row(&self) -> &CvRow {
        &self.rows[self.best]
    }

    pub fn best_accuracy(&self) -> f64 {
        self.best_row().mean_accuracy
    }

    /// Estimated out-of-sample error of the best candidate
    pub fn out_of_sample_error(&self) -> f64 {
        1f64 - self.best_accuracy()
    }
}

/// `mtry` candidates: `len` values evenly spaced over `2..=p`, floored and deduplicated
pub fn tuning_grid(n_features: usize, len: usize) -> Vec<usize> {
    if n_features <= 1 || len <= 1 {
        let single = ((n_features as f64).sqrt().floor() as usize).max(1);
        return vec![single];
    }
    if n_features <= len {
        return (2..=n_features).collect();
    }

    let span = n_features - 2;
    let mut grid: Vec<usize> = (0..len)
        .map(|i| (2 * (len - 1) + span * i) / (len - 1))
        .collect();
    grid.dedup();

    grid
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation, 0 for fewer than two values
fn sd(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0f64;
    }

    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (values.len() - 1) as f64;

    var.sqrt()
}

/// Worker count for the evaluation pool: one core stays with the coordinator
pub fn worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

/// Sample the dataset, assign stratified folds and score every (mtry, fold) fit.
/// The models are discarded; only the scores are returned.
pub fn cross_validate(
    dataset: &Dataset,
    categories: &Categories,
    config: &CvConfig,
    seed: u64,
) -> Result<CvResult> {
    let sample = dataset.select(&sample_rows(dataset.nrows(), config.sample_size, seed));
    let labels = sample.target.to_vec();
    let folds = stratified_folds(&labels, categories, config.folds, seed)?;
    let grid = tuning_grid(sample.data.ncols(), config.grid_len);

    let jobs: Vec<(usize, usize)> = grid
        .iter()
        .flat_map(|&mtry| (0..config.folds).map(move |fold| (mtry, fold)))
        .collect();

    let workers = worker_count();
    tracing::info!(
        "Cross-validating {} rows, {} folds, mtry grid {:?} on {} workers",
        sample.nrows(),
        config.folds,
        grid,
        workers
    );

    let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;
    let scored: std::result::Result<Vec<(f64, f64)>, FitError> = pool.install(|| {
        jobs.par_iter()
            .map(|&(mtry, fold)| -> std::result::Result<(f64, f64), FitError> {
                let train_rows: Vec<usize> =
                    (0..folds.len()).filter(|&r| folds[r] != fold).collect();
                let held_rows: Vec<usize> =
                    (0..folds.len()).filter(|&r| folds[r] == fold).collect();
                let train = sample.select(&train_rows);
                let held = sample.select(&held_rows);

                let params = ForestParams::new(config.num_trees, seed).with_mtry(Some(mtry));
                let forest = RandomForest::fit(&train, categories.len(), &params)?;
                let predicted: Array1<usize> = forest.predict(&held.data.view());
                let confusion = ConfusionMatrix::from_predictions(
                    &held.target.view(),
                    &predicted.view(),
                    categories.len(),
                );

                tracing::debug!(
                    "mtry {} fold {}: accuracy {:.4}",
                    mtry,
                    fold,
                    confusion.accuracy()
                );

                Ok((confusion.accuracy(), confusion.kappa()))
            })
            .collect()
    });
    // The pool's workers are joined here, whether or not a fold failed
    drop(pool);
    let scored = scored?;

    let rows: Vec<CvRow> = grid
        .iter()
        .enumerate()
        .map(|(g, &mtry)| {
            let fold_scores = &scored[g * config.folds..(g + 1) * config.folds];
            let fold_accuracy: Vec<f64> = fold_scores.iter().map(|s| s.0).collect();
            let kappas: Vec<f64> = fold_scores.iter().map(|s| s.1).collect();

            CvRow {
                mtry,
                mean_accuracy: mean(&fold_accuracy),
                sd_accuracy: sd(&fold_accuracy),
                mean_kappa: mean(&kappas),
                fold_accuracy,
            }
        })
        .collect();

    let mut best = 0;
    for (i, row) in rows.iter().enumerate() {
        if row.mean_accuracy > rows[best].mean_accuracy {
            best = i;
        }
    }

    Ok(CvResult {
        rows,
        best,
        sample_size: sample.nrows(),
        folds: config.folds,
    })
}
