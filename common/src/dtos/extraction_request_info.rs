use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::extraction_request::ExtractionMessageParsingError;

/// Summary of an extraction job, published once after all its request batches
///
/// Consumers use `key_value_count` to know when every identifier of the job was handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExtractionRequestInfoMessage {
    pub extraction_job_identifier: Uuid,
    pub project_number: String,
    pub extraction_directory: String,
    pub job_submitted_at: DateTime<Utc>,
    pub is_identifiable_extraction: bool,
    pub is_no_filter_extraction: bool,
    pub key_tag: String,

    /// Number of unique identifiers across all the request batches of the job
    pub key_value_count: usize,

    #[serde(default)]
    pub extraction_modality: Option<String>,
}

impl ExtractionRequestInfoMessage {
    pub fn try_parsing(data: &[u8]) -> Result<Self, ExtractionMessageParsingError> {
        let data = std::str::from_utf8(data)?;
        let message = serde_json::from_str(data)
            .map_err(|e| ExtractionMessageParsingError::InvalidJsonData(e, data.to_string()))?;

        Ok(message)
    }
}
