// src/table/mod.rs

use crate::error::{Error, Result};
use csv::{ReaderBuilder, WriterBuilder};

/// Delimiter used by the forecast data files.
pub const DELIMITER: u8 = b';';

/// An in-memory semicolon-delimited table with a header row.
///
/// Column order is preserved exactly as parsed so a round-trip through
/// [`Table::parse`] and [`Table::to_csv`] reproduces the input byte for
/// byte (for values without embedded delimiters or newlines). All cells
/// are kept as strings; columns other than the join keys are opaque
/// pass-through data.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Parse semicolon-delimited text with a header row. Empty lines are
    /// skipped; a ragged row (wrong field count) is a parse error.
    pub fn parse(input: &str) -> Result<Table> {
        let mut reader = ReaderBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(true)
            .flexible(false)
            .from_reader(input.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| Error::Parse(format!("reading header row: {e}")))?
            .iter()
            .map(str::to_string)
            .collect();
        if headers.is_empty() || (headers.len() == 1 && headers[0].is_empty()) {
            return Err(Error::Parse("input has no header row".to_string()));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| Error::Parse(format!("reading data row: {e}")))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Table { headers, rows })
    }

    /// Serialize back to semicolon-delimited text, header first.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = WriterBuilder::new()
            .delimiter(DELIMITER)
            .from_writer(Vec::new());

        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| Error::Parse(format!("flushing csv writer: {e}")))?;
        String::from_utf8(bytes).map_err(|e| Error::Parse(format!("non-utf8 csv output: {e}")))
    }

    /// Index of the named column, if present.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Index of the named column, appending it (with empty cells on every
    /// row) when the stored file predates it.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column(name) {
            return idx;
        }
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.headers.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "Product Group;Year_Month;Quantity;correction_percent;explanation\n\
                          A;2024-01;120;;\n\
                          B;2024-01;75;;\n";

    #[test]
    fn parses_header_and_rows() {
        let table = Table::parse(SAMPLE).unwrap();
        assert_eq!(
            table.headers,
            vec![
                "Product Group",
                "Year_Month",
                "Quantity",
                "correction_percent",
                "explanation"
            ]
        );
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec!["A", "2024-01", "120", "", ""]);
    }

    #[test]
    fn round_trip_is_byte_identical() {
        let table = Table::parse(SAMPLE).unwrap();
        assert_eq!(table.to_csv().unwrap(), SAMPLE);
    }

    #[test]
    fn skips_empty_lines() {
        let input = "a;b\n1;2\n\n3;4\n";
        let table = Table::parse(input).unwrap();
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn ragged_row_is_parse_error() {
        let input = "a;b;c\n1;2;3\n4;5\n";
        let err = Table::parse(input).unwrap_err();
        assert!(matches!(err, Error::Parse(_)), "got {err:?}");
    }

    #[test]
    fn empty_input_is_parse_error() {
        let err = Table::parse("").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn ensure_column_appends_once() {
        let mut table = Table::parse("a;b\n1;2\n").unwrap();
        let idx = table.ensure_column("correction_percent");
        assert_eq!(idx, 2);
        assert_eq!(table.rows[0], vec!["1", "2", ""]);
        // Second call finds the existing column.
        assert_eq!(table.ensure_column("correction_percent"), 2);
        assert_eq!(table.headers.len(), 3);
    }
}
