use clap::Parser;
use liftform::config::{
    CvConfig, PipelineConfig, DEFAULT_CV_TREES, DEFAULT_FOLDS, DEFAULT_NA_THRESHOLD,
    DEFAULT_NUM_TREES, DEFAULT_SAMPLE_SIZE, DEFAULT_SEED, DEFAULT_SPLIT_FRACTION,
};
use liftform::model::random_forest::ForestParams;
use liftform::{logging, pipeline, report};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The path of the labeled training dataset
    #[arg(short = 't', long)]
    train_path: PathBuf,

    /// The path of the unlabeled scoring dataset
    #[arg(short = 's', long)]
    test_path: PathBuf,

    /// Seed for the split, the sampling and the forests
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Share of each category used for fitting, the rest is held out
    #[arg(long, default_value_t = DEFAULT_SPLIT_FRACTION)]
    split_fraction: f64,

    /// Columns with a larger share of missing values are dropped
    #[arg(long, default_value_t = DEFAULT_NA_THRESHOLD)]
    na_threshold: f64,

    /// Number of trees in the primary forest
    #[arg(short = 'n', long, default_value_t = DEFAULT_NUM_TREES)]
    num_trees: usize,

    /// Variables tried at each split of the primary forest
    /// If this parameter is not provided, floor(sqrt(features)) is used
    #[arg(short, long, default_value = None)]
    mtry: Option<usize>,

    /// Number of trees per cross-validation fit
    #[arg(long, default_value_t = DEFAULT_CV_TREES)]
    cv_trees: usize,

    /// Number of cross-validation folds
    #[arg(short, long, default_value_t = DEFAULT_FOLDS)]
    folds: usize,

    /// Rows sampled for cross-validation
    #[arg(long, default_value_t = DEFAULT_SAMPLE_SIZE)]
    sample_size: usize,

    /// Skip the cross-validated evaluation
    #[arg(long, default_value_t = false)]
    skip_cv: bool,

    /// Write the predictions as CSV
    #[arg(short, long, default_value = None)]
    output_path: Option<PathBuf>,

    /// Write the headline numbers and predictions as JSON
    #[arg(short, long, default_value = None)]
    report_path: Option<PathBuf>,
}

impl Args {
    fn to_config(&self) -> PipelineConfig {
        let defaults = PipelineConfig::default();
        let cv = match self.skip_cv {
            true => None,
            false => Some(CvConfig {
                num_trees: self.cv_trees,
                folds: self.folds,
                sample_size: self.sample_size,
                grid_len: 3,
            }),
        };

        PipelineConfig {
            seed: self.seed,
            split_fraction: self.split_fraction,
            na_threshold: self.na_threshold,
            forest: ForestParams::new(self.num_trees, self.seed).with_mtry(self.mtry),
            cv,
            ..defaults
        }
    }
}

fn main() -> ExitCode {
    logging::init();
    let args = Args::parse();
    let config = args.to_config();

    let result = pipeline::run(&args.train_path, &args.test_path, &config).and_then(|outcome| {
        if let Some(path) = &args.output_path {
            report::write_predictions(path, &outcome.predictions.predictions)?;
        }
        if let Some(path) = &args.report_path {
            report::write_json_report(path, &outcome)?;
        }
        Ok(outcome)
    });

    match result {
        Ok(outcome) => {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = report::write_report(&mut stdout, &outcome) {
                tracing::error!("Failed to write the report: {}", e);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
