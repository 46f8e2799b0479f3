use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use common::{
    core::message_sink::{MessageSink, MessageSinkError},
    dtos::{
        extraction_request::ExtractionRequestMessage,
        extraction_request_info::ExtractionRequestInfoMessage, message_header::MessageHeader,
    },
};
use extraction_launcher::{
    domain::entities::extraction_job::ExtractionJobDetails,
    handlers::extract_messages_csv_handler::ExtractMessagesCsvHandler,
};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Message sink dropping every message
pub struct DiscardingSink;

#[async_trait]
impl<M> MessageSink<M> for DiscardingSink
where
    M: Send + Sync,
{
    async fn send_message(
        &self,
        _message: &M,
        _routing_key: &str,
        is_in_response_to: Option<&MessageHeader>,
    ) -> Result<MessageHeader, MessageSinkError> {
        Ok(MessageHeader::new(is_in_response_to))
    }
}

pub fn handler(key_column_index: usize) -> ExtractMessagesCsvHandler {
    let details = ExtractionJobDetails::builder()
        .job_id(Uuid::new_v4())
        .project_number("1234-5678")
        .extraction_directory("1234-5678/extractions/csv")
        .build();

    let request_sink: Arc<dyn MessageSink<ExtractionRequestMessage>> = Arc::new(DiscardingSink);
    let request_info_sink: Arc<dyn MessageSink<ExtractionRequestInfoMessage>> =
        Arc::new(DiscardingSink);

    ExtractMessagesCsvHandler::try_new(details, key_column_index, request_sink, request_info_sink)
        .unwrap()
}

/// Writes `content` into a temporary CSV file, deleted when dropped
pub fn csv_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
