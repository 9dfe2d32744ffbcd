use ndarray::Array2;

use super::Schema;
use crate::error::{PipelineError, Result};
use crate::model::FitError;
use crate::parsing::{Column, Table};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Real,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnConverter {
    pub name: String,
    pub kind: ColumnKind,
}

/// Substitutions made while converting one column
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnCoercion {
    pub missing: usize,
    pub unparsable: usize,
    /// Fractional values in a column that only held integers during training
    pub kind_drift: usize,
}

impl ColumnCoercion {
    pub fn filled(&self) -> usize {
        self.missing + self.unparsable
    }
}

/// Per-column substitution counts of a lenient conversion
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CoercionReport {
    pub columns: Vec<(String, ColumnCoercion)>,
}

impl CoercionReport {
    /// Number of cells replaced by 0
    pub fn total_filled(&self) -> usize {
        self.columns.iter().map(|(_, c)| c.filled()).sum()
    }

    pub fn total_drift(&self) -> usize {
        self.columns.iter().map(|(_, c)| c.kind_drift).sum()
    }

    /// Columns with at least one substitution or drifted value
    pub fn affected(&self) -> impl Iterator<Item = &(String, ColumnCoercion)> {
        self.columns
            .iter()
            .filter(|(_, c)| c.filled() > 0 || c.kind_drift > 0)
    }
}

#[derive(Clone, Debug)]
pub struct ConversionTable {
    converters: Vec<ColumnConverter>,
}

fn find_column<'a>(table: &'a Table, name: &str) -> Result<&'a Column> {
    table.column(name).ok_or_else(|| {
        PipelineError::Schema(format!("column `{}` required by the model is absent", name))
    })
}

impl ConversionTable {
    /// Infer a converter for every schema column from the training table.
    /// Any missing or non-numeric training value is a fit error.
    pub fn infer(training: &Table, schema: &Schema) -> Result<ConversionTable> {
        let mut converters = Vec::with_capacity(schema.len());

        for name in schema.features() {
            let column = find_column(training, name)?;
            let mut kind = ColumnKind::Integer;

            for (row, cell) in column.cells.iter().enumerate() {
                let raw = cell.as_deref().ok_or_else(|| FitError::MissingValue {
                    column: name.clone(),
                    row,
                })?;
                if raw.parse::<i64>().is_ok() {
                    continue;
                }
                match raw.parse::<f64>() {
                    Ok(value) if value.is_finite() => kind = ColumnKind::Real,
                    _ => {
                        return Err(FitError::NonNumeric {
                            column: name.clone(),
                            row,
                            value: raw.to_string(),
                        }
                        .into())
                    }
                }
            }

            converters.push(ColumnConverter {
                name: name.clone(),
                kind,
            });
        }

        Ok(ConversionTable { converters })
    }

    pub fn converters(&self) -> &[ColumnConverter] {
        &self.converters
    }

    /// Convert a table that passed `infer`. Columns are taken in schema order.
    pub fn to_matrix_strict(&self, table: &Table) -> Result<Array2<f64>> {
        let (matrix, report) = self.to_matrix_lenient(table)?;

        if let Some((name, _)) = report.affected().find(|(_, c)| c.filled() > 0) {
            let column = find_column(table, name)?;
            let row = column
                .cells
                .iter()
                .position(|c| {
                    c.as_deref()
                        .map_or(true, |raw| raw.parse::<f64>().map_or(true, |v| !v.is_finite()))
                })
                .unwrap_or_default();

            return Err(match &column.cells[row] {
                None => FitError::MissingValue {
                    column: name.clone(),
                    row,
                },
                Some(raw) => FitError::NonNumeric {
                    column: name.clone(),
                    row,
                    value: raw.clone(),
                },
            }
            .into());
        }

        Ok(matrix)
    }

    /// Convert any table carrying the schema columns. Missing and unparsable
    /// cells become 0 and are counted. A schema column the table lacks is an error.
    pub fn to_matrix_lenient(&self, table: &Table) -> Result<(Array2<f64>, CoercionReport)> {
        let n_rows = table.n_rows();
        let mut matrix = Array2::zeros((n_rows, self.converters.len()));
        let mut report = CoercionReport::default();

        for (j, converter) in self.converters.iter().enumerate() {
            let column = find_column(table, &converter.name)?;
            let mut coercion = ColumnCoercion::default();

            for (i, cell) in column.cells.iter().enumerate() {
                matrix[[i, j]] = match cell.as_deref().map(str::parse::<f64>) {
                    None => {
                        coercion.missing += 1;
                        0f64
                    }
                    Some(Ok(value)) if value.is_finite() => {
                        if converter.kind == ColumnKind::Integer && value.fract() != 0f64 {
                            coercion.kind_drift += 1;
                        }
                        value
                    }
                    Some(_) => {
                        coercion.unparsable += 1;
                        0f64
                    }
                };
            }

            report.columns.push((converter.name.clone(), coercion));
        }

        Ok((matrix, report))
    }
}
