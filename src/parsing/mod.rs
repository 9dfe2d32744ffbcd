use ndarray::{Array1, Array2, Axis};

pub mod pml;

/// Values that mark a missing reading in the raw exports
const MISSING_MARKERS: [&str; 3] = ["", "NA", "#DIV/0!"];

pub fn is_missing(raw: &str) -> bool {
    MISSING_MARKERS.contains(&raw.trim())
}

/// A named column of raw cells. `None` is a missing cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Option<String>>,
}

impl Column {
    pub fn new(name: &str, cells: Vec<Option<String>>) -> Column {
        Column {
            name: name.to_string(),
            cells,
        }
    }

    /// Share of cells that are missing, 0 for an empty column
    pub fn missing_ratio(&self) -> f64 {
        if self.cells.is_empty() {
            return 0f64;
        }

        let missing = self.cells.iter().filter(|c| c.is_none()).count();

        missing as f64 / self.cells.len() as f64
    }
}

/// Column-major observation table
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Table {
        Table { columns }
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.cells.len())
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Keep only the columns for which `keep` returns true. Tables only ever shrink.
    pub fn retain_columns<F: FnMut(&str) -> bool>(&mut self, mut keep: F) {
        self.columns.retain(|c| keep(&c.name));
    }

    /// Build a new table from the given rows, in the given order
    pub fn select_rows(&self, rows: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                cells: rows.iter().map(|&r| c.cells[r].clone()).collect(),
            })
            .collect();

        Table { columns }
    }
}

/// Numeric view of a table: one row per observation, one column per feature
#[derive(Clone, Debug)]
pub struct Dataset {
    pub data: Array2<f64>,
    /// Category index of each row
    pub target: Array1<usize>,
}

impl Dataset {
    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn select(&self, rows: &[usize]) -> Dataset {
        Dataset {
            data: self.data.select(Axis(0), rows),
            target: self.target.select(Axis(0), rows),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_markers_are_recognised() {
        assert!(is_missing(""));
        assert!(is_missing("NA"));
        assert!(is_missing(" #DIV/0! "));
        assert!(!is_missing("0"));
        assert!(!is_missing("-12.5"));
    }

    #[test]
    fn missing_ratio_counts_none_cells() {
        let column = Column::new("a", vec![None, Some("1".into()), None, Some("2".into())]);

        assert_eq!(column.missing_ratio(), 0.5);
        assert_eq!(Column::new("empty", vec![]).missing_ratio(), 0f64);
    }

    #[test]
    fn select_rows_keeps_column_order() {
        let table = Table::new(vec![
            Column::new("a", vec![Some("1".into()), Some("2".into()), Some("3".into())]),
            Column::new("b", vec![Some("x".into()), None, Some("z".into())]),
        ]);
        let picked = table.select_rows(&[2, 0]);

        assert_eq!(picked.column_names(), vec!["a", "b"]);
        assert_eq!(picked.column("a").unwrap().cells, vec![Some("3".into()), Some("1".into())]);
        assert_eq!(picked.column("b").unwrap().cells, vec![Some("z".into()), Some("x".into())]);
    }
}
