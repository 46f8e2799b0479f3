use chrono::{DateTime, Utc};
use lapin::types::{AMQPValue, FieldArray, FieldTable, LongString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata published alongside every message
///
/// `parents` holds the guids of the messages this one was produced in response to,
/// oldest first, so a message can be traced back through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageHeader {
    pub message_guid: Uuid,
    pub producer_executable_name: String,
    pub producer_process_id: u32,
    pub original_publish_timestamp: DateTime<Utc>,
    pub parents: Vec<Uuid>,
}

impl MessageHeader {
    /// Builds the header of a new message published by the current process
    pub fn new(is_in_response_to: Option<&MessageHeader>) -> Self {
        let producer_executable_name = std::env::current_exe()
            .ok()
            .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
            .unwrap_or_else(|| String::from("unknown"));

        let parents = match is_in_response_to {
            Some(parent) => {
                let mut parents = parent.parents.clone();
                parents.push(parent.message_guid);
                parents
            }
            None => vec![],
        };

        Self {
            message_guid: Uuid::new_v4(),
            producer_executable_name,
            producer_process_id: std::process::id(),
            original_publish_timestamp: Utc::now(),
            parents,
        }
    }

    /// Converts the header into AMQP message headers
    pub fn to_field_table(&self) -> FieldTable {
        let mut table = FieldTable::default();

        table.insert(
            "MessageGuid".into(),
            AMQPValue::LongString(LongString::from(self.message_guid.to_string())),
        );
        table.insert(
            "ProducerExecutableName".into(),
            AMQPValue::LongString(LongString::from(self.producer_executable_name.clone())),
        );
        table.insert(
            "ProducerProcessID".into(),
            AMQPValue::LongLongInt(i64::from(self.producer_process_id)),
        );
        table.insert(
            "OriginalPublishTimestamp".into(),
            AMQPValue::LongLongInt(self.original_publish_timestamp.timestamp()),
        );

        let parents: Vec<AMQPValue> = self
            .parents
            .iter()
            .map(|guid| AMQPValue::LongString(LongString::from(guid.to_string())))
            .collect();
        table.insert("Parents".into(), AMQPValue::FieldArray(FieldArray::from(parents)));

        table
    }
}
