use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::helper::error_chain_fmt;

/// Request to extract a batch of identifiers belonging to an extraction job
///
/// A job with more identifiers than the batch capacity is split into several of these
/// messages, all sharing the same `extraction_job_identifier`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExtractionRequestMessage {
    pub extraction_job_identifier: Uuid,

    /// Project reference, also the base of the extraction output
    pub project_number: String,

    /// Directory, relative to the extraction root, receiving the extracted files
    pub extraction_directory: String,

    pub job_submitted_at: DateTime<Utc>,

    /// Files of an identifiable extraction are not anonymised
    pub is_identifiable_extraction: bool,

    /// No file rejection filter is applied on a "no filters" extraction
    pub is_no_filter_extraction: bool,

    /// Header of the key column the identifiers were read from (ex: `SeriesInstanceUID`)
    pub key_tag: String,

    pub extraction_identifiers: Vec<String>,

    #[serde(default)]
    pub extraction_modality: Option<String>,
}

impl ExtractionRequestMessage {
    pub fn try_parsing(data: &[u8]) -> Result<Self, ExtractionMessageParsingError> {
        let data = std::str::from_utf8(data)?;
        let message = serde_json::from_str(data)
            .map_err(|e| ExtractionMessageParsingError::InvalidJsonData(e, data.to_string()))?;

        Ok(message)
    }
}

#[derive(thiserror::Error)]
pub enum ExtractionMessageParsingError {
    #[error("Data could not be converted from utf8 u8 vector to string")]
    InvalidStringData(#[from] std::str::Utf8Error),

    #[error("Data did not represent a valid JSON object: {0}. Data: {1}")]
    InvalidJsonData(serde_json::Error, String),
}

impl std::fmt::Debug for ExtractionMessageParsingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
