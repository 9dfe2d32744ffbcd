use std::collections::BTreeSet;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::parsing::Table;

pub mod conversion;

/// Ordered feature columns the model is trained on
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    features: Vec<String>,
}

impl Schema {
    pub fn new(features: Vec<String>) -> Schema {
        Schema { features }
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Columns removed from every table, derived from the training table only
#[derive(Clone, Debug)]
pub struct ColumnPlan {
    dropped: BTreeSet<String>,
    schema: Schema,
}

impl ColumnPlan {
    /// Drop every excluded column and every column whose missing ratio exceeds
    /// the threshold. The label and identifier columns are never dropped.
    pub fn from_training(training: &Table, config: &PipelineConfig) -> Result<ColumnPlan> {
        if training.column(&config.label_column).is_none() {
            return Err(PipelineError::Schema(format!(
                "training table has no label column `{}`",
                config.label_column
            )));
        }

        let protected = |name: &str| name == config.label_column || name == config.id_column;
        let dropped: BTreeSet<String> = training
            .columns
            .iter()
            .filter(|c| !protected(&c.name))
            .filter(|c| {
                config.excluded_columns.iter().any(|e| *e == c.name)
                    || c.missing_ratio() > config.na_threshold
            })
            .map(|c| c.name.clone())
            .collect();

        let features = training
            .columns
            .iter()
            .map(|c| c.name.clone())
            .filter(|name| !protected(name) && !dropped.contains(name))
            .collect();

        let plan = ColumnPlan {
            dropped,
            schema: Schema::new(features),
        };
        tracing::info!(
            "Cleaning drops {} of {} columns, {} features remain",
            plan.dropped.len(),
            training.n_cols(),
            plan.schema.len()
        );

        Ok(plan)
    }

    pub fn dropped(&self) -> impl Iterator<Item = &str> {
        self.dropped.iter().map(String::as_str)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Remove the planned columns from a table. Columns the table lacks are ignored.
    pub fn apply(&self, table: &Table) -> Table {
        let mut cleaned = table.clone();
        cleaned.retain_columns(|name| !self.dropped.contains(name));

        cleaned
    }
}

/// Label values in a fixed lexicographic order; a category's index is its position
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Categories {
    names: Vec<String>,
}

impl Categories {
    /// Collect the categories of the label column and encode every row.
    /// A missing label is a schema error.
    pub fn encode(table: &Table, label_column: &str) -> Result<(Categories, Vec<usize>)> {
        let column = table.column(label_column).ok_or_else(|| {
            PipelineError::Schema(format!("table has no label column `{}`", label_column))
        })?;

        let mut labels = Vec::with_capacity(column.cells.len());
        for (row, cell) in column.cells.iter().enumerate() {
            match cell {
                Some(label) => labels.push(label.as_str()),
                None => {
                    return Err(PipelineError::Schema(format!(
                        "row {} has no `{}` value",
                        row, label_column
                    )))
                }
            }
        }

        let names: Vec<String> = labels
            .iter()
            .copied()
            .collect::<BTreeSet<&str>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        let categories = Categories { names };
        let target = labels
            .iter()
            .map(|label| categories.index_of(label).unwrap_or_default())
            .collect();

        Ok((categories, target))
    }

    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Categories {
        let names = names
            .iter()
            .map(|n| n.as_ref().to_string())
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect();

        Categories { names }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.binary_search_by(|n| n.as_str().cmp(name)).ok()
    }

    pub fn name(&self, index: usize) -> &str {
        &self.names[index]
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Row count per category
#[derive(Clone, Debug, PartialEq)]
pub struct ClassDistribution {
    pub counts: Vec<(String, usize)>,
    pub total: usize,
}

impl ClassDistribution {
    pub fn new(categories: &Categories, target: &[usize]) -> ClassDistribution {
        let mut counts = vec![0usize; categories.len()];
        for &t in target {
            counts[t] += 1;
        }

        ClassDistribution {
            counts: categories.names().iter().cloned().zip(counts).collect(),
            total: target.len(),
        }
    }

    pub fn share(&self, index: usize) -> f64 {
        match self.total {
            0 => 0f64,
            total => self.counts[index].1 as f64 / total as f64,
        }
    }
}
