use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::helper::error_chain_fmt;
use tracing::debug;
use typed_builder::TypedBuilder;
use uuid::Uuid;

use crate::domain::services::column_validator::{
    validate_columns, LineProcessingError, RowKind, HEADER_LINE_NUMBER,
};

/// Identity of an extraction job, copied into every message of the job
#[derive(Debug, Clone, TypedBuilder)]
pub struct ExtractionJobDetails {
    pub job_id: Uuid,

    #[builder(setter(into))]
    pub project_number: String,

    /// Directory, relative to the extraction root, receiving the extracted files
    #[builder(setter(into))]
    pub extraction_directory: String,

    #[builder(default = Utc::now())]
    pub job_submitted_at: DateTime<Utc>,

    #[builder(default)]
    pub is_identifiable_extraction: bool,

    #[builder(default)]
    pub is_no_filter_extraction: bool,

    #[builder(default)]
    pub extraction_modality: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    HeaderProcessed,
    RowsProcessed,
    /// At least one file was completely processed
    Finished,
    /// A row of the current file was rejected, the rest of the file must be skipped
    Failed,
    Emitting,
    Emitted,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self {
            JobState::Created => "created",
            JobState::HeaderProcessed => "header processed",
            JobState::RowsProcessed => "rows processed",
            JobState::Finished => "finished",
            JobState::Failed => "failed",
            JobState::Emitting => "emitting",
            JobState::Emitted => "emitted",
        };
        write!(f, "{}", state)
    }
}

/// Identifiers collected from one or more files for a single extraction request
///
/// Each file goes through `process_header`, `process_line` for each data row, then `finished`.
/// Identifiers are deduplicated across every file of the job.
///
/// The header tag and the identifiers of the current file are staged, and only join the job
/// when the file is finished. A failed file leaves the job as it was before its header.
#[derive(Debug)]
pub struct ExtractionJob {
    details: ExtractionJobDetails,
    key_column_index: usize,
    /// Header of the key column of the last finished file
    key_tag: Option<String>,
    identifiers: BTreeSet<String>,
    /// Header of the key column of the file being processed
    pending_key_tag: Option<String>,
    /// New identifiers of the file being processed
    pending_identifiers: BTreeSet<String>,
    files_processed: usize,
    state: JobState,
}

impl ExtractionJob {
    /// Creates a job reading identifiers from the column at `key_column_index` (0-based)
    pub fn try_new(
        details: ExtractionJobDetails,
        key_column_index: usize,
    ) -> Result<Self, ExtractionJobError> {
        if details.project_number.trim().is_empty() {
            return Err(ExtractionJobError::InvalidJobDetails("ProjectNumber"));
        }
        if details.extraction_directory.trim().is_empty() {
            return Err(ExtractionJobError::InvalidJobDetails("ExtractionDirectory"));
        }

        Ok(Self {
            details,
            key_column_index,
            key_tag: None,
            identifiers: BTreeSet::new(),
            pending_key_tag: None,
            pending_identifiers: BTreeSet::new(),
            files_processed: 0,
            state: JobState::Created,
        })
    }

    /// Starts a new file, its header value in the key column becomes the key tag of the job
    pub fn process_header<R: AsRef<str>>(&mut self, row: &[R]) -> Result<(), ExtractionJobError> {
        self.process_header_at(HEADER_LINE_NUMBER, row)
    }

    /// Same as `process_header` for a header found on another line of its file
    pub fn process_header_at<R: AsRef<str>>(
        &mut self,
        line_number: usize,
        row: &[R],
    ) -> Result<(), ExtractionJobError> {
        self.ensure_state(
            "process a header",
            &[JobState::Created, JobState::Finished, JobState::Failed],
        )?;

        if let Err(error) =
            validate_columns(line_number, row, self.key_column_index, RowKind::Header)
        {
            self.fail_file();
            return Err(error.into());
        }

        self.pending_key_tag = Some(row[self.key_column_index].as_ref().to_string());
        self.pending_identifiers.clear();
        self.state = JobState::HeaderProcessed;

        Ok(())
    }

    /// Collects the key column value of a data row
    ///
    /// # Returns
    /// `false` if the identifier had already been collected
    pub fn process_line<R: AsRef<str>>(
        &mut self,
        line_number: usize,
        row: &[R],
    ) -> Result<bool, ExtractionJobError> {
        self.ensure_state(
            "process a line",
            &[JobState::HeaderProcessed, JobState::RowsProcessed],
        )?;

        if let Err(error) = validate_columns(line_number, row, self.key_column_index, RowKind::Data)
        {
            self.fail_file();
            return Err(error.into());
        }

        let identifier = row[self.key_column_index].as_ref();
        let inserted = !self.identifiers.contains(identifier)
            && self.pending_identifiers.insert(identifier.to_string());
        if !inserted {
            debug!(line_number, identifier, "Duplicate identifier ignored");
        }
        self.state = JobState::RowsProcessed;

        Ok(inserted)
    }

    /// Marks the current file as completely processed
    pub fn finished(&mut self) -> Result<(), ExtractionJobError> {
        self.ensure_state(
            "finish a file",
            &[JobState::HeaderProcessed, JobState::RowsProcessed],
        )?;

        self.key_tag = self.pending_key_tag.take();
        self.identifiers.append(&mut self.pending_identifiers);
        self.files_processed += 1;
        self.state = JobState::Finished;

        Ok(())
    }

    /// Drops what was staged for the current file
    fn fail_file(&mut self) {
        self.pending_key_tag = None;
        self.pending_identifiers.clear();
        self.state = JobState::Failed;
    }

    /// Freezes the job before its messages are sent
    ///
    /// Allowed once, after at least one file was finished. A job whose last file failed can
    /// still be emitted with the identifiers of its finished files.
    pub fn start_emission(&mut self) -> Result<(), ExtractionJobError> {
        self.ensure_state("send messages", &[JobState::Finished, JobState::Failed])?;

        if self.files_processed == 0 || self.key_tag.is_none() {
            return Err(ExtractionJobError::InvalidState {
                operation: "send messages",
                state: self.state,
            });
        }

        self.state = JobState::Emitting;
        Ok(())
    }

    pub fn mark_emitted(&mut self) {
        self.state = JobState::Emitted;
    }

    fn ensure_state(
        &self,
        operation: &'static str,
        allowed: &[JobState],
    ) -> Result<(), ExtractionJobError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ExtractionJobError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    pub fn details(&self) -> &ExtractionJobDetails {
        &self.details
    }

    pub fn key_column_index(&self) -> usize {
        self.key_column_index
    }

    /// Key tag of the file being processed, or else of the last finished file
    pub fn key_tag(&self) -> Option<&str> {
        self.pending_key_tag.as_deref().or(self.key_tag.as_deref())
    }

    /// Unique identifiers of the finished files, sorted
    pub fn identifiers(&self) -> &BTreeSet<String> {
        &self.identifiers
    }

    pub fn identifier_count(&self) -> usize {
        self.identifiers.len()
    }

    pub fn files_processed(&self) -> usize {
        self.files_processed
    }

    pub fn state(&self) -> JobState {
        self.state
    }
}

#[derive(thiserror::Error)]
pub enum ExtractionJobError {
    #[error(transparent)]
    LineProcessing(#[from] LineProcessingError),
    #[error("Invalid extraction job details: {0} must not be blank")]
    InvalidJobDetails(&'static str),
    #[error("Cannot {operation} while the extraction job is {state}")]
    InvalidState {
        operation: &'static str,
        state: JobState,
    },
}

impl std::fmt::Debug for ExtractionJobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
