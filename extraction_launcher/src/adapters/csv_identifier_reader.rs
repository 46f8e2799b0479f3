use std::io::Read;
use std::path::{Path, PathBuf};

use common::helper::error_chain_fmt;
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::info;

use crate::{
    domain::services::column_validator::HEADER_LINE_NUMBER,
    handlers::extract_messages_csv_handler::{
        ExtractMessagesCsvHandler, ExtractMessagesHandlerError,
    },
};

/// Feeds the rows of an identifier CSV file to the handler
///
/// The first record is the header, every following record a data row.
/// Rows may have different numbers of columns, the handler validates them.
#[tracing::instrument(name = "Reading identifier file", skip(handler))]
pub fn process_file(
    path: &Path,
    handler: &mut ExtractMessagesCsvHandler,
) -> Result<usize, CsvIdentifierReaderError> {
    let file = std::fs::File::open(path)
        .map_err(|e| CsvIdentifierReaderError::Open(path.to_path_buf(), e))?;

    let nb_rows = process_reader(file, handler).map_err(|error| match error {
        CsvIdentifierReaderError::EmptyInput => CsvIdentifierReaderError::Empty(path.to_path_buf()),
        other => other,
    })?;

    info!(nb_rows, "Identifier file processed");
    Ok(nb_rows)
}

/// Same as `process_file` on any reader
///
/// The input is read in memory so each record can be located on its file line.
///
/// # Returns
/// The number of data rows read
pub fn process_reader<R: Read>(
    mut reader: R,
    handler: &mut ExtractMessagesCsvHandler,
) -> Result<usize, CsvIdentifierReaderError> {
    let mut input = Vec::new();
    reader.read_to_end(&mut input)?;

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(input.as_slice());

    let mut records = reader.records();

    let header = match records.next() {
        Some(header) => header?,
        None => return Err(CsvIdentifierReaderError::EmptyInput),
    };
    let header_line = line_number(&input, &header, HEADER_LINE_NUMBER);
    handler.process_header_at(header_line, cells(&header).as_slice())?;

    let mut nb_rows = 0;
    for (index, record) in records.enumerate() {
        let record = record?;
        let row_line = line_number(&input, &record, header_line + index + 1);

        handler.process_line(row_line, cells(&record).as_slice())?;
        nb_rows += 1;
    }

    handler.finished()?;

    Ok(nb_rows)
}

/// 1-based line on which the content of the record starts
///
/// The position of a record is taken before the blank lines, and the `\n` of a `\r\n`
/// terminator, that the reader skips in front of it.
fn line_number(input: &[u8], record: &StringRecord, fallback: usize) -> usize {
    let Some(position) = record.position() else {
        return fallback;
    };

    let skipped_newlines = input
        .get(position.byte() as usize..)
        .unwrap_or_default()
        .iter()
        .take_while(|byte| matches!(byte, b'\r' | b'\n'))
        .filter(|byte| **byte == b'\n')
        .count();

    position.line() as usize + skipped_newlines
}

fn cells(record: &StringRecord) -> Vec<&str> {
    record.iter().collect()
}

#[derive(thiserror::Error)]
pub enum CsvIdentifierReaderError {
    #[error("Failed to open identifier file {}: {}", .0.display(), .1)]
    Open(PathBuf, #[source] std::io::Error),
    #[error("Identifier file {} is empty", .0.display())]
    Empty(PathBuf),
    #[error("No header found, the identifier input is empty")]
    EmptyInput,
    #[error("Failed to read identifier input: {0}")]
    Read(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Handler(#[from] ExtractMessagesHandlerError),
}

impl std::fmt::Debug for CsvIdentifierReaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
