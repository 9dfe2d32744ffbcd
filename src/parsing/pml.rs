use super::{is_missing, Column, Table};
use crate::error::{PipelineError, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Name given to the unnamed leading row-number column of the exports
const ROW_NUMBER_COLUMN: &str = "X";

/// Read a delimited text file with a header row into a table.
/// Missing markers (empty, `NA`, `#DIV/0!`) become missing cells.
pub fn load_table(path: &Path) -> Result<Table> {
    let file = File::open(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let table = read_table(file, path)?;
    tracing::info!(
        "Loaded {} rows x {} columns from {}",
        table.n_rows(),
        table.n_cols(),
        path.display()
    );

    Ok(table)
}

/// Parse a table from any reader. `path` is only used in error messages.
pub fn read_table<R: Read>(reader: R, path: &Path) -> Result<Table> {
    let csv_error = |source| PipelineError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let mut columns: Vec<Column> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(|name| match name.trim() {
            "" => Column::new(ROW_NUMBER_COLUMN, vec![]),
            name => Column::new(name, vec![]),
        })
        .collect();

    for record in reader.records() {
        let record = record.map_err(csv_error)?;

        for (column, field) in columns.iter_mut().zip(record.iter()) {
            let cell = match is_missing(field) {
                true => None,
                false => Some(field.trim().to_string()),
            };
            column.cells.push(cell);
        }
    }

    Ok(Table::new(columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(contents: &str) -> Result<Table> {
        read_table(contents.as_bytes(), Path::new("inline.csv"))
    }

    #[test]
    fn parses_header_and_missing_markers() {
        let table = parse(concat!(
            "\"\",user_name,roll_belt,kurtosis_roll_belt,classe\n",
            "1,carlitos,1.41,NA,A\n",
            "2,pedro,1.5,#DIV/0!,B\n",
            "3,adelmo,,0.3,A\n",
        ))
        .unwrap();

        assert_eq!(
            table.column_names(),
            vec!["X", "user_name", "roll_belt", "kurtosis_roll_belt", "classe"]
        );
        assert_eq!(table.n_rows(), 3);
        assert_eq!(
            table.column("roll_belt").unwrap().cells,
            vec![Some("1.41".into()), Some("1.5".into()), None]
        );
        assert_eq!(
            table.column("kurtosis_roll_belt").unwrap().cells,
            vec![None, None, Some("0.3".into())]
        );
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = parse("a,b\n1,2\n3\n").unwrap_err();

        assert!(matches!(err, PipelineError::Csv { .. }));
    }

    #[test]
    fn unreadable_path_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_table(&dir.path().join("absent.csv")).unwrap_err();

        assert!(matches!(err, PipelineError::Io { .. }));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"a,classe\n1,A\n2,B\n").unwrap();

        let table = load_table(&path).unwrap();

        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.n_cols(), 2);
    }
}
