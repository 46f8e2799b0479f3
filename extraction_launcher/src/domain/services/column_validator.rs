use common::helper::error_chain_fmt;

/// Line number of the header row when the file starts with it
pub const HEADER_LINE_NUMBER: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Header,
    Data,
}

/// Checks that a row has a column at `key_column_index` (0-based)
///
/// The message of the returned error shows the 1-based column position.
pub fn validate_columns<R: AsRef<str>>(
    line_number: usize,
    row: &[R],
    key_column_index: usize,
    kind: RowKind,
) -> Result<(), LineProcessingError> {
    if row.len() > key_column_index {
        return Ok(());
    }

    let prefix = match kind {
        RowKind::Header => "Data header line",
        RowKind::Data => "Line",
    };

    Err(LineProcessingError::new(
        line_number,
        row,
        format!(
            "{} has fewer columns ({}) than the series ID column index ({})",
            prefix,
            row.len(),
            key_column_index + 1
        ),
    ))
}

/// A header or data row which could not be processed
#[derive(thiserror::Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct LineProcessingError {
    line_number: usize,
    line: Vec<String>,
    message: String,
}

impl LineProcessingError {
    pub fn new<R: AsRef<str>>(line_number: usize, line: &[R], reason: String) -> Self {
        Self {
            line_number,
            line: line.iter().map(|cell| cell.as_ref().to_string()).collect(),
            message: format!("Error at line {}: {}", line_number, reason),
        }
    }

    /// 1-based line number of the row in its file
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Cells of the offending row
    pub fn line(&self) -> &[String] {
        &self.line
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Debug for LineProcessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
