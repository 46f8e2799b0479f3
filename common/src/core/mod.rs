pub mod message_sink;
pub mod rabbitmq_message_repository;
