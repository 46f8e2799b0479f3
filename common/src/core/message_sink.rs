use async_trait::async_trait;

use crate::{
    core::rabbitmq_message_repository::RabbitMQMessageRepositoryError,
    dtos::message_header::MessageHeader, helper::error_chain_fmt,
};

/// Capability to send messages of type `M` to one destination
///
/// Services depend on this trait rather than on the RabbitMQ repository, so that tests can
/// capture the published messages.
#[async_trait]
pub trait MessageSink<M>: Send + Sync
where
    M: Send + Sync,
{
    /// Sends one message
    ///
    /// # Arguments
    /// * `message` - message to serialize and send
    /// * `routing_key` - routing key used by the destination exchange, `""` when unused
    /// * `is_in_response_to` - header of the message this one responds to, if any
    ///
    /// # Returns
    /// The header attached to the sent message
    async fn send_message(
        &self,
        message: &M,
        routing_key: &str,
        is_in_response_to: Option<&MessageHeader>,
    ) -> Result<MessageHeader, MessageSinkError>;

    /// Waits until every message sent so far has been confirmed by the destination
    async fn wait_for_confirms(&self) -> Result<(), MessageSinkError> {
        Ok(())
    }
}

#[derive(thiserror::Error)]
pub enum MessageSinkError {
    #[error("Failed to serialize the message: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    RabbitMQ(#[from] RabbitMQMessageRepositoryError),
    #[error("{0}")]
    Transport(String),
}

impl std::fmt::Debug for MessageSinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
