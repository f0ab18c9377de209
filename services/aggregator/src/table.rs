//! Tokenization of uploaded sales CSV text into rows.
//!
//! Blank lines are dropped before anything else. Header names are trimmed,
//! stripped of `"` and lowercased; cell values are trimmed and stripped of `"`.
//! Each line is tokenized on its own; balanced quotes keep an embedded comma
//! inside its cell.

use crate::aggregate::AggregateError;
use tracing::warn;

/// Parsed sales table. Every row has exactly `headers.len()` cells.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// A single data row, borrowed from its table.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    cells: &'a [String],
}

impl<'a> Row<'a> {
    /// Cell at a resolved column index; an unresolved column reads as empty.
    pub fn cell(&self, column: Option<usize>) -> &'a str {
        column
            .and_then(|idx| self.cells.get(idx))
            .map(String::as_str)
            .unwrap_or("")
    }
}

impl SalesTable {
    /// Parse raw CSV text. Fails with `MalformedInput` unless there is a header
    /// line and at least one data row.
    ///
    /// Every non-blank line is exactly one record: a quote never spans a line
    /// break, so N data lines always give N rows.
    pub fn parse(text: &str) -> Result<Self, AggregateError> {
        // Remove UTF-8 BOM if present
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
        let Some((header_line, data_lines)) = lines
            .split_first()
            .filter(|(_, rest)| !rest.is_empty())
        else {
            return Err(AggregateError::MalformedInput(
                "CSV must have header row and at least one data row".to_string(),
            ));
        };

        let headers: Vec<String> = split_line(header_line)
            .iter()
            .map(|h| h.to_lowercase())
            .collect();
        let width = headers.len();

        let rows = data_lines
            .iter()
            .map(|line| {
                let mut cells = split_line(line);
                cells.truncate(width);
                cells.resize(width, String::new());
                cells
            })
            .collect();

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|cells| Row { cells })
    }
}

/// Split one line into cleaned cells.
///
/// Lines with balanced quotes go through the CSV reader so `"Widget, large"`
/// stays one cell. A line with an odd number of `"` is split on every comma.
fn split_line(line: &str) -> Vec<String> {
    if line.matches('"').count() % 2 == 0 {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(line.as_bytes());
        let mut record = csv::StringRecord::new();
        match reader.read_record(&mut record) {
            Ok(true) => return record.iter().map(clean_cell).collect(),
            Ok(false) => return vec![String::new()],
            Err(e) => warn!(error = %e, "falling back to plain comma split"),
        }
    }
    line.split(',').map(clean_cell).collect()
}

fn clean_cell(raw: &str) -> String {
    raw.trim().replace('"', "")
}
