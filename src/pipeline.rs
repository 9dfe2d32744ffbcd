use std::path::Path;

use ndarray::{Array1, Array2};

use crate::cleaning::conversion::ConversionTable;
use crate::cleaning::{Categories, ClassDistribution, ColumnPlan};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::evaluation::cross_validation::{cross_validate, CvResult};
use crate::evaluation::ConfusionMatrix;
use crate::model::random_forest::RandomForest;
use crate::model::Classifier;
use crate::parsing::pml::load_table;
use crate::parsing::{Dataset, Table};
use crate::predict::{predict_table, PredictionSet};
use crate::report::correlation_matrix;
use crate::split::{stratified_split, Split};

/// Everything a run produces
#[derive(Debug)]
pub struct PipelineReport {
    pub training_shape: (usize, usize),
    pub scoring_shape: (usize, usize),
    pub plan: ColumnPlan,
    pub conversion: ConversionTable,
    pub categories: Categories,
    pub distribution: ClassDistribution,
    /// Pearson correlation of the features over the fit subset
    pub correlation: Array2<f64>,
    pub split: Split,
    pub model: RandomForest,
    pub validation: ConfusionMatrix,
    pub cv: Option<CvResult>,
    pub predictions: PredictionSet,
}

impl PipelineReport {
    /// Feature names with their importance, most important first
    pub fn importance_ranking(&self) -> Vec<(String, f64)> {
        let features = self.plan.schema().features();

        self.model
            .importance_ranking()
            .into_iter()
            .map(|(i, score)| (features[i].clone(), score))
            .collect()
    }
}

pub fn run(train_path: &Path, test_path: &Path, config: &PipelineConfig) -> Result<PipelineReport> {
    config.validate()?;
    let training = load_table(train_path)?;
    let scoring = load_table(test_path)?;

    run_tables(&training, &scoring, config)
}

pub fn run_tables(
    training: &Table,
    scoring: &Table,
    config: &PipelineConfig,
) -> Result<PipelineReport> {
    config.validate()?;
    if scoring.column(&config.label_column).is_some() {
        return Err(PipelineError::Schema(format!(
            "scoring table must not carry the label column `{}`",
            config.label_column
        )));
    }

    let plan = ColumnPlan::from_training(training, config)?;
    let cleaned = plan.apply(training);
    let (categories, target) = Categories::encode(&cleaned, &config.label_column)?;
    let distribution = ClassDistribution::new(&categories, &target);
    let conversion = ConversionTable::infer(&cleaned, plan.schema())?;

    let split = stratified_split(&target, categories.len(), config.split_fraction, config.seed);
    if split.validation.is_empty() {
        return Err(PipelineError::Config(format!(
            "split fraction {} leaves no validation rows out of {}",
            config.split_fraction,
            target.len()
        )));
    }
    let dataset = Dataset {
        data: conversion.to_matrix_strict(&cleaned)?,
        target: Array1::from(target),
    };
    let fit_set = dataset.select(&split.fit);
    let validation_set = dataset.select(&split.validation);
    tracing::info!(
        "Split {} rows into {} fit and {} validation rows",
        dataset.nrows(),
        fit_set.nrows(),
        validation_set.nrows()
    );

    let correlation = correlation_matrix(&fit_set.data.view());

    tracing::info!("Fitting a {}-tree forest", config.forest.n_trees);
    let model = RandomForest::fit(&fit_set, categories.len(), &config.forest)?;
    let validation_predicted = model.predict(&validation_set.data.view());
    let validation = ConfusionMatrix::from_predictions(
        &validation_set.target.view(),
        &validation_predicted.view(),
        categories.len(),
    );
    tracing::info!(
        "Validation accuracy {:.4}, OOB error {:.4}",
        validation.accuracy(),
        model.oob().error()
    );

    let cv = match &config.cv {
        Some(cv_config) => Some(cross_validate(&dataset, &categories, cv_config, config.seed)?),
        None => None,
    };

    let predictions = predict_table(
        &model,
        scoring,
        &plan,
        &conversion,
        &categories,
        &config.id_column,
    )?;
    tracing::info!("Predicted {} scoring rows", predictions.predictions.len());

    Ok(PipelineReport {
        training_shape: (training.n_rows(), training.n_cols()),
        scoring_shape: (scoring.n_rows(), scoring.n_cols()),
        plan,
        conversion,
        categories,
        distribution,
        correlation,
        split,
        model,
        validation,
        cv,
        predictions,
    })
}
