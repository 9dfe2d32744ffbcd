use serde::Serialize;

use crate::cleaning::conversion::{CoercionReport, ConversionTable};
use crate::cleaning::{Categories, ColumnPlan};
use crate::error::{PipelineError, Result};
use crate::model::Classifier;
use crate::parsing::Table;

/// One scored row
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Prediction {
    pub identifier: String,
    pub prediction: String,
}

#[derive(Clone, Debug)]
pub struct PredictionSet {
    pub predictions: Vec<Prediction>,
    /// Predicted rows per category, in category order
    pub tally: Vec<(String, usize)>,
    pub coercion: CoercionReport,
}

/// Score a raw table with a fitted model, reusing the training column plan
/// and conversion table so the feature layout matches training exactly.
pub fn predict_table<M: Classifier>(
    model: &M,
    scoring: &Table,
    plan: &ColumnPlan,
    conversion: &ConversionTable,
    categories: &Categories,
    id_column: &str,
) -> Result<PredictionSet> {
    let cleaned = plan.apply(scoring);
    let identifiers = cleaned.column(id_column).ok_or_else(|| {
        PipelineError::Schema(format!("scoring table has no identifier column `{}`", id_column))
    })?;

    let (records, coercion) = conversion.to_matrix_lenient(&cleaned)?;
    if coercion.total_filled() > 0 {
        tracing::warn!(
            "{} scoring values were missing or non-numeric and were replaced by 0",
            coercion.total_filled()
        );
        for (name, c) in coercion.affected() {
            tracing::warn!(
                "  {}: {} missing, {} unparsable, {} fractional in an integer column",
                name,
                c.missing,
                c.unparsable,
                c.kind_drift
            );
        }
    }

    let predicted = model.predict(&records.view());
    let mut tally: Vec<(String, usize)> = categories
        .names()
        .iter()
        .map(|n| (n.clone(), 0))
        .collect();
    let mut predictions = Vec::with_capacity(predicted.len());
    for (row, (&category, id)) in predicted.iter().zip(identifiers.cells.iter()).enumerate() {
        let identifier = id.clone().ok_or_else(|| {
            PipelineError::Schema(format!("scoring row {} has no `{}` value", row + 1, id_column))
        })?;
        tally[category].1 += 1;
        predictions.push(Prediction {
            identifier,
            prediction: categories.name(category).to_string(),
        });
    }

    Ok(PredictionSet {
        predictions,
        tally,
        coercion,
    })
}
