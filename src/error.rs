use std::path::PathBuf;
use thiserror::Error;

use crate::model::FitError;

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The file could not be opened, read or written.
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The file is not valid delimited text.
    #[error("Malformed delimited text in {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
    /// A table does not carry the columns the pipeline expects.
    #[error("Schema mismatch: {0}")]
    Schema(String),
    /// A setting is out of its valid range.
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Model fit failed: {0}")]
    ModelFit(#[from] FitError),
    #[error("Failed to build cross-validation worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
