use std::path::Path;

use extraction_launcher::{
    adapters::csv_identifier_reader::{process_file, process_reader, CsvIdentifierReaderError},
    domain::entities::extraction_job::ExtractionJobError,
    handlers::extract_messages_csv_handler::ExtractMessagesHandlerError,
};

use crate::helpers::{csv_file, handler};

fn line_processing_message(error: CsvIdentifierReaderError) -> String {
    match error {
        CsvIdentifierReaderError::Handler(ExtractMessagesHandlerError::ExtractionJob(
            ExtractionJobError::LineProcessing(error),
        )) => error.to_string(),
        other => panic!("Expected a line processing error, got {:?}", other),
    }
}

#[test]
fn every_data_row_is_collected_and_the_file_finished() {
    let mut handler = handler(0);
    let content = "SeriesInstanceUID\ns1\ns2\ns1\n";

    let nb_rows = process_reader(content.as_bytes(), &mut handler).unwrap();

    assert_eq!(nb_rows, 3);
    assert_eq!(handler.job().identifier_count(), 2);
    assert_eq!(handler.job().files_processed(), 1);
    assert_eq!(handler.job().key_tag(), Some("SeriesInstanceUID"));
}

#[test]
fn cells_are_trimmed() {
    let mut handler = handler(1);
    let content = "PatientID , SeriesInstanceUID \np1, s1\n";

    process_reader(content.as_bytes(), &mut handler).unwrap();

    assert_eq!(handler.job().key_tag(), Some("SeriesInstanceUID"));
    assert!(handler.job().identifiers().contains("s1"));
}

#[test]
fn a_short_row_is_reported_with_its_file_line_number() {
    let mut handler = handler(1);
    let content = "PatientID,SeriesInstanceUID\np1,s1\np2\np3,s3\n";

    let error = process_reader(content.as_bytes(), &mut handler).unwrap_err();

    assert_eq!(
        line_processing_message(error),
        "Error at line 3: Line has fewer columns (1) than the series ID column index (2)"
    );
    assert_eq!(handler.job().files_processed(), 0);
}

#[test]
fn a_short_header_is_reported_on_line_1() {
    let mut handler = handler(2);
    let content = "PatientID,SeriesInstanceUID\np1,s1,x\n";

    let error = process_reader(content.as_bytes(), &mut handler).unwrap_err();

    assert_eq!(
        line_processing_message(error),
        "Error at line 1: Data header line has fewer columns (2) than the series ID column index (3)"
    );
}

#[test]
fn a_short_header_after_blank_lines_is_reported_on_its_own_line() {
    let mut handler = handler(1);
    let content = "\n\nSeriesInstanceUID\ns1\n";

    let error = process_reader(content.as_bytes(), &mut handler).unwrap_err();

    assert_eq!(
        line_processing_message(error),
        "Error at line 3: Data header line has fewer columns (1) than the series ID column index (2)"
    );
}

#[test]
fn rows_after_blank_lines_keep_their_file_line_number() {
    let mut handler = handler(1);
    let content = "\nPatientID,SeriesInstanceUID\np1,s1\np2\n";

    let error = process_reader(content.as_bytes(), &mut handler).unwrap_err();

    assert_eq!(
        line_processing_message(error),
        "Error at line 4: Line has fewer columns (1) than the series ID column index (2)"
    );
}

#[test]
fn rows_of_a_crlf_file_keep_their_file_line_number() {
    let mut handler = handler(1);
    let content = "PatientID,SeriesInstanceUID\r\np1,s1\r\n\r\np2\r\n";

    let error = process_reader(content.as_bytes(), &mut handler).unwrap_err();

    assert_eq!(
        line_processing_message(error),
        "Error at line 4: Line has fewer columns (1) than the series ID column index (2)"
    );
}

#[tokio::test]
async fn a_file_failing_midway_is_left_out_of_the_job() {
    let mut handler = handler(1);
    let first = csv_file("PatientID,SeriesInstanceUID\np1,s1\np2,s2\n");
    let second = csv_file("Modality,StudyInstanceUID\nCT,study9\nMR\n");

    process_file(first.path(), &mut handler).unwrap();
    assert!(process_file(second.path(), &mut handler).is_err());

    let info = handler.send_messages(false, None).await.unwrap();

    assert_eq!(info.key_tag, "SeriesInstanceUID");
    assert_eq!(info.key_value_count, 2);
}

#[test]
fn an_empty_input_is_rejected() {
    let mut handler = handler(0);

    let error = process_reader("".as_bytes(), &mut handler).unwrap_err();

    assert!(matches!(error, CsvIdentifierReaderError::EmptyInput));
}

#[test]
fn an_empty_file_is_reported_with_its_path() {
    let mut handler = handler(0);
    let file = csv_file("");

    let error = process_file(file.path(), &mut handler).unwrap_err();

    match error {
        CsvIdentifierReaderError::Empty(path) => assert_eq!(path, file.path()),
        other => panic!("Expected an empty file error, got {:?}", other),
    }
}

#[test]
fn a_missing_file_is_reported() {
    let mut handler = handler(0);

    let error = process_file(Path::new("does/not/exist.csv"), &mut handler).unwrap_err();

    assert!(matches!(error, CsvIdentifierReaderError::Open(_, _)));
}

#[tokio::test]
async fn several_files_make_a_single_job() {
    let mut handler = handler(0);
    let first = csv_file("SeriesInstanceUID\ns1\ns2\ns3\ns4\n");
    let second = csv_file("SeriesInstanceUID\ns1\ns5\ns6\ns3\n");

    assert_eq!(process_file(first.path(), &mut handler).unwrap(), 4);
    assert_eq!(process_file(second.path(), &mut handler).unwrap(), 4);

    let info = handler.send_messages(false, None).await.unwrap();

    assert_eq!(handler.job().files_processed(), 2);
    assert_eq!(info.key_value_count, 6);
    assert_eq!(info.key_tag, "SeriesInstanceUID");
}
