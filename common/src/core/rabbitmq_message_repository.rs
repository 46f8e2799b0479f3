use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use lapin::{
    options::{BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions},
    publisher_confirm::{Confirmation, PublisherConfirm},
    types::FieldTable,
    BasicProperties, Channel, Connection, ExchangeKind,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    core::message_sink::{MessageSink, MessageSinkError},
    dtos::message_header::MessageHeader,
    helper::error_chain_fmt,
};

/// Persistent delivery mode of AMQP 0.9.1
const PERSISTENT_DELIVERY_MODE: u8 = 2;

/// Message repository implemented with RabbitMQ
///
/// Publishes messages to one exchange. Each destination of a service gets its own repository.
///
/// The enum definition gatekeeps functionalities if the repository is not ready (not initialized).
pub enum RabbitMQMessageRepository {
    Ready {
        /// RabbitMQ connection shared with other repositories
        connection: Arc<Connection>,
        /// Created by `try_init`, owned by this repository only
        channel: Channel,
        exchange_name: String,
        publisher_confirms: bool,
        /// Confirmations of the messages published since the last `wait_for_publisher_confirms`
        pending_confirms: Mutex<Vec<PublisherConfirm>>,
    },
    Idle {
        connection: Arc<Connection>,
        exchange_name: String,
        publisher_confirms: bool,
    },
}

/// Clones only the connection and the properties, the clone is idle
impl Clone for RabbitMQMessageRepository {
    fn clone(&self) -> Self {
        match self {
            Self::Idle {
                connection,
                exchange_name,
                publisher_confirms,
            }
            | Self::Ready {
                connection,
                exchange_name,
                publisher_confirms,
                ..
            } => Self::Idle {
                connection: connection.clone(),
                exchange_name: exchange_name.clone(),
                publisher_confirms: *publisher_confirms,
            },
        }
    }
}

impl RabbitMQMessageRepository {
    /// Builds an idle repository from a RabbitMQ connection
    ///
    /// No channel is created and no exchange is declared: `try_init` must be called before publishing.
    ///
    /// # Arguments
    /// * `exchange_name` - exchange receiving every message published by this repository
    /// * `publisher_confirms` - puts the channel in confirm mode, so `wait_for_confirms` waits for the broker acks
    pub fn new(connection: Arc<Connection>, exchange_name: &str, publisher_confirms: bool) -> Self {
        Self::Idle {
            connection,
            exchange_name: exchange_name.to_string(),
            publisher_confirms,
        }
    }

    /// Initializes the repository
    ///
    /// Creates the channel, enables publisher confirms if requested,
    /// and declares the durable topic exchange (idempotent).
    #[tracing::instrument(name = "🏗️ Initializing RabbitMQMessageRepository", skip(self))]
    pub async fn try_init(self) -> Result<Self, RabbitMQMessageRepositoryError> {
        match self {
            Self::Ready { .. } => {
                info!("Already initialized");
                Ok(self)
            }

            Self::Idle {
                connection,
                exchange_name,
                publisher_confirms,
            } => {
                let channel = connection.create_channel().await?;

                if publisher_confirms {
                    channel
                        .confirm_select(ConfirmSelectOptions::default())
                        .await?;
                }

                let exchange_declare_options = ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                };

                channel
                    .exchange_declare(
                        exchange_name.as_str(),
                        ExchangeKind::Topic,
                        exchange_declare_options,
                        FieldTable::default(),
                    )
                    .await?;

                info!(
                    publisher_confirms,
                    "Successfully declared exchange {} with properties: {:?}",
                    exchange_name,
                    exchange_declare_options
                );

                Ok(Self::Ready {
                    connection,
                    channel,
                    exchange_name,
                    publisher_confirms,
                    pending_confirms: Mutex::new(Vec::new()),
                })
            }
        }
    }

    pub fn exchange_name(&self) -> &str {
        match self {
            Self::Idle { exchange_name, .. } | Self::Ready { exchange_name, .. } => exchange_name,
        }
    }

    /// Publishes raw data to the exchange with a given routing key
    ///
    /// Messages are mandatory: the broker returns the ones no queue is bound for.
    /// Does not wait for the broker confirmation, see `wait_for_publisher_confirms`.
    #[tracing::instrument(name = "Publishing message", skip(self, data, header), fields(message_guid = %header.message_guid))]
    pub async fn publish(
        &self,
        routing_key: &str,
        data: &[u8],
        header: &MessageHeader,
    ) -> Result<(), RabbitMQMessageRepositoryError> {
        match self {
            Self::Idle { .. } => Err(RabbitMQMessageRepositoryError::NotInitialized(
                "Cannot publish message, repository is not initialized".to_string(),
            )),

            Self::Ready {
                channel,
                exchange_name,
                publisher_confirms,
                pending_confirms,
                ..
            } => {
                let properties = BasicProperties::default()
                    .with_timestamp(header.original_publish_timestamp.timestamp_millis() as u64)
                    .with_message_id(header.message_guid.to_string().into())
                    .with_content_type("application/json".into())
                    .with_delivery_mode(PERSISTENT_DELIVERY_MODE)
                    .with_headers(header.to_field_table());

                let publish_options = BasicPublishOptions {
                    mandatory: true,
                    ..BasicPublishOptions::default()
                };

                let confirm = channel
                    .basic_publish(exchange_name, routing_key, publish_options, data, properties)
                    .await?;

                if *publisher_confirms {
                    pending_confirms
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(confirm);
                }

                Ok(())
            }
        }
    }

    /// Waits for the broker to confirm every message published since the last call
    ///
    /// Fails if any of them was rejected, or returned because it could not be routed.
    #[tracing::instrument(name = "Waiting for publisher confirms", skip(self), fields(exchange_name = self.exchange_name()))]
    pub async fn wait_for_publisher_confirms(&self) -> Result<(), RabbitMQMessageRepositoryError> {
        match self {
            Self::Idle { .. } => Err(RabbitMQMessageRepositoryError::NotInitialized(
                "Cannot wait for confirms, repository is not initialized".to_string(),
            )),

            Self::Ready {
                publisher_confirms: false,
                exchange_name,
                ..
            } => {
                warn!(
                    "Publisher confirms are not enabled on exchange {}, nothing to wait for",
                    exchange_name
                );
                Ok(())
            }

            Self::Ready {
                pending_confirms, ..
            } => {
                let confirms = std::mem::take(
                    &mut *pending_confirms
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner),
                );
                let nb_confirms = confirms.len();
                let (mut returned, mut nacked) = (0, 0);

                for confirm in confirms {
                    match confirm.await? {
                        Confirmation::Ack(None) | Confirmation::NotRequested => {}
                        Confirmation::Ack(Some(message)) => {
                            warn!(
                                reply_code = message.reply_code,
                                reply_text = message.reply_text.as_str(),
                                "Message returned by the broker"
                            );
                            returned += 1;
                        }
                        Confirmation::Nack(_) => nacked += 1,
                    }
                }

                if returned > 0 || nacked > 0 {
                    return Err(RabbitMQMessageRepositoryError::Unconfirmed { returned, nacked });
                }

                info!(nb_confirms, "Every published message was confirmed");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl<M> MessageSink<M> for RabbitMQMessageRepository
where
    M: Serialize + Send + Sync,
{
    async fn send_message(
        &self,
        message: &M,
        routing_key: &str,
        is_in_response_to: Option<&MessageHeader>,
    ) -> Result<MessageHeader, MessageSinkError> {
        let header = MessageHeader::new(is_in_response_to);
        let data = serde_json::to_vec(message)?;

        self.publish(routing_key, &data, &header).await?;

        Ok(header)
    }

    async fn wait_for_confirms(&self) -> Result<(), MessageSinkError> {
        self.wait_for_publisher_confirms().await?;
        Ok(())
    }
}

#[derive(thiserror::Error)]
pub enum RabbitMQMessageRepositoryError {
    #[error(transparent)]
    RabbitMQError(#[from] lapin::Error),
    #[error("{0}")]
    NotInitialized(String),
    #[error("{nacked} message(s) were rejected and {returned} returned by the broker")]
    Unconfirmed { returned: usize, nacked: usize },
}

impl std::fmt::Debug for RabbitMQMessageRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
