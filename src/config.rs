use crate::error::{PipelineError, Result};
use crate::model::random_forest::ForestParams;

/// Columns that identify the subject or the recording window rather than the movement
pub const EXCLUDED_COLUMNS: [&str; 7] = [
    "X",
    "user_name",
    "raw_timestamp_part_1",
    "raw_timestamp_part_2",
    "cvtd_timestamp",
    "new_window",
    "num_window",
];

pub const DEFAULT_SEED: u64 = 123;
pub const DEFAULT_SPLIT_FRACTION: f64 = 0.7;
pub const DEFAULT_NA_THRESHOLD: f64 = 0.5;
pub const DEFAULT_NUM_TREES: usize = 100;
pub const DEFAULT_CV_TREES: usize = 50;
pub const DEFAULT_FOLDS: usize = 5;
pub const DEFAULT_SAMPLE_SIZE: usize = 5000;

/// Settings of the cross-validated evaluation
#[derive(Clone, Debug)]
pub struct CvConfig {
    pub num_trees: usize,
    pub folds: usize,
    pub sample_size: usize,
    /// Number of `mtry` candidates tried per run
    pub grid_len: usize,
}

/// Every tunable of a run. Built once and handed to each stage.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub seed: u64,
    pub split_fraction: f64,
    pub na_threshold: f64,
    pub excluded_columns: Vec<String>,
    pub label_column: String,
    pub id_column: String,
    pub forest: ForestParams,
    /// `None` skips cross-validation entirely
    pub cv: Option<CvConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            seed: DEFAULT_SEED,
            split_fraction: DEFAULT_SPLIT_FRACTION,
            na_threshold: DEFAULT_NA_THRESHOLD,
            excluded_columns: EXCLUDED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            label_column: "classe".to_string(),
            id_column: "problem_id".to_string(),
            forest: ForestParams::new(DEFAULT_NUM_TREES, DEFAULT_SEED),
            cv: Some(CvConfig {
                num_trees: DEFAULT_CV_TREES,
                folds: DEFAULT_FOLDS,
                sample_size: DEFAULT_SAMPLE_SIZE,
                grid_len: 3,
            }),
        }
    }
}

impl PipelineConfig {
    /// Reject settings that would make a run meaningless before any data is touched
    pub fn validate(&self) -> Result<()> {
        if !(self.split_fraction > 0f64 && self.split_fraction < 1f64) {
            return Err(PipelineError::Config(format!(
                "split fraction must lie strictly between 0 and 1, got {}",
                self.split_fraction
            )));
        }
        if !(0f64..=1f64).contains(&self.na_threshold) {
            return Err(PipelineError::Config(format!(
                "missing value threshold must lie between 0 and 1, got {}",
                self.na_threshold
            )));
        }
        if let Some(cv) = &self.cv {
            if cv.folds < 2 {
                return Err(PipelineError::Config(format!(
                    "cross-validation needs at least two folds, got {}",
                    cv.folds
                )));
            }
        }

        Ok(())
    }
}
