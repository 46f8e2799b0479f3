use std::num::NonZeroUsize;
use std::sync::Arc;

use common::{
    core::message_sink::{MessageSink, MessageSinkError},
    dtos::{
        extraction_request::ExtractionRequestMessage,
        extraction_request_info::ExtractionRequestInfoMessage,
    },
    helper::error_chain_fmt,
};
use tracing::{error, info};

use crate::domain::{
    entities::extraction_job::{ExtractionJob, ExtractionJobDetails, ExtractionJobError},
    services::{
        column_validator::HEADER_LINE_NUMBER,
        identifier_batches::{batch_count, split_into_batches},
    },
};

/// Routing key used for every message of a job, exchanges route on their own
const ROUTING_KEY: &str = "";

/// Turns the rows of one or more identifier files into extraction request messages
///
/// Request batches and the job summary go to 2 different sinks.
pub struct ExtractMessagesCsvHandler {
    job: ExtractionJob,
    extraction_request_sink: Arc<dyn MessageSink<ExtractionRequestMessage>>,
    extraction_request_info_sink: Arc<dyn MessageSink<ExtractionRequestInfoMessage>>,
    /// Batch capacity used when `send_messages` is not given one, `None` for a single batch
    max_identifiers_per_message: Option<NonZeroUsize>,
}

impl ExtractMessagesCsvHandler {
    pub fn try_new(
        details: ExtractionJobDetails,
        key_column_index: usize,
        extraction_request_sink: Arc<dyn MessageSink<ExtractionRequestMessage>>,
        extraction_request_info_sink: Arc<dyn MessageSink<ExtractionRequestInfoMessage>>,
    ) -> Result<Self, ExtractMessagesHandlerError> {
        let job = ExtractionJob::try_new(details, key_column_index)?;

        Ok(Self {
            job,
            extraction_request_sink,
            extraction_request_info_sink,
            max_identifiers_per_message: None,
        })
    }

    pub fn with_max_identifiers_per_message(mut self, max: Option<NonZeroUsize>) -> Self {
        self.max_identifiers_per_message = max;
        self
    }

    pub fn process_header<R: AsRef<str>>(
        &mut self,
        row: &[R],
    ) -> Result<(), ExtractMessagesHandlerError> {
        self.process_header_at(HEADER_LINE_NUMBER, row)
    }

    /// Starts a file whose header is not on its first line
    #[tracing::instrument(name = "Processing header", skip(self, row), fields(job_id = %self.job.details().job_id))]
    pub fn process_header_at<R: AsRef<str>>(
        &mut self,
        line_number: usize,
        row: &[R],
    ) -> Result<(), ExtractMessagesHandlerError> {
        self.job.process_header_at(line_number, row)?;

        info!(key_tag = ?self.job.key_tag(), "Header processed");
        Ok(())
    }

    pub fn process_line<R: AsRef<str>>(
        &mut self,
        line_number: usize,
        row: &[R],
    ) -> Result<(), ExtractMessagesHandlerError> {
        self.job.process_line(line_number, row)?;
        Ok(())
    }

    #[tracing::instrument(name = "Finishing file", skip(self), fields(job_id = %self.job.details().job_id))]
    pub fn finished(&mut self) -> Result<(), ExtractMessagesHandlerError> {
        self.job.finished()?;

        info!(
            files_processed = self.job.files_processed(),
            identifier_count = self.job.identifier_count(),
            "File processed"
        );
        Ok(())
    }

    /// Sends one extraction request per batch of identifiers, then the job summary
    ///
    /// Failed sends are not retried: some batches may already be sent when an error is returned.
    ///
    /// # Arguments
    /// * `confirm_required` - waits for the sinks to confirm the sent messages
    /// * `max_per_message` - batch capacity, overrides the handler one
    ///
    /// # Returns
    /// The sent job summary
    #[tracing::instrument(name = "Sending extraction messages", skip(self), fields(job_id = %self.job.details().job_id))]
    pub async fn send_messages(
        &mut self,
        confirm_required: bool,
        max_per_message: Option<NonZeroUsize>,
    ) -> Result<ExtractionRequestInfoMessage, ExtractMessagesHandlerError> {
        self.job.start_emission()?;

        let result = self
            .emit(confirm_required, max_per_message.or(self.max_identifiers_per_message))
            .await;

        match &result {
            Ok(info_message) => {
                info!(
                    key_value_count = info_message.key_value_count,
                    "Extraction messages sent"
                );
                self.job.mark_emitted();
            }
            Err(error) => error!(?error, "Failed to send extraction messages"),
        }

        result
    }

    async fn emit(
        &self,
        confirm_required: bool,
        max_per_message: Option<NonZeroUsize>,
    ) -> Result<ExtractionRequestInfoMessage, ExtractMessagesHandlerError> {
        let details = self.job.details();
        let key_tag = self.job.key_tag().unwrap_or_default().to_string();
        let identifiers = self.job.identifiers();

        let nb_messages = batch_count(identifiers.len(), max_per_message);
        info!(
            identifier_count = identifiers.len(),
            nb_messages, "Sending extraction requests"
        );

        for (index, batch) in split_into_batches(identifiers, max_per_message)
            .into_iter()
            .enumerate()
        {
            let batch_size = batch.len();
            let message = ExtractionRequestMessage {
                extraction_job_identifier: details.job_id,
                project_number: details.project_number.clone(),
                extraction_directory: details.extraction_directory.clone(),
                job_submitted_at: details.job_submitted_at,
                is_identifiable_extraction: details.is_identifiable_extraction,
                is_no_filter_extraction: details.is_no_filter_extraction,
                key_tag: key_tag.clone(),
                extraction_identifiers: batch,
                extraction_modality: details.extraction_modality.clone(),
            };

            let header = self
                .extraction_request_sink
                .send_message(&message, ROUTING_KEY, None)
                .await?;

            info!(
                message_guid = %header.message_guid,
                batch_size,
                "Sent extraction request {}/{}",
                index + 1,
                nb_messages
            );
        }

        if confirm_required {
            self.extraction_request_sink.wait_for_confirms().await?;
        }

        let info_message = ExtractionRequestInfoMessage {
            extraction_job_identifier: details.job_id,
            project_number: details.project_number.clone(),
            extraction_directory: details.extraction_directory.clone(),
            job_submitted_at: details.job_submitted_at,
            is_identifiable_extraction: details.is_identifiable_extraction,
            is_no_filter_extraction: details.is_no_filter_extraction,
            key_tag,
            key_value_count: identifiers.len(),
            extraction_modality: details.extraction_modality.clone(),
        };

        let header = self
            .extraction_request_info_sink
            .send_message(&info_message, ROUTING_KEY, None)
            .await?;
        info!(message_guid = %header.message_guid, "Sent extraction request info");

        if confirm_required {
            self.extraction_request_info_sink.wait_for_confirms().await?;
        }

        Ok(info_message)
    }

    pub fn job(&self) -> &ExtractionJob {
        &self.job
    }
}

#[derive(thiserror::Error)]
pub enum ExtractMessagesHandlerError {
    #[error(transparent)]
    ExtractionJob(#[from] ExtractionJobError),
    #[error("Failed to send extraction message: {0}")]
    Send(#[from] MessageSinkError),
}

impl std::fmt::Debug for ExtractMessagesHandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
