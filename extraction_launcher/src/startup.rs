use std::sync::Arc;

use common::{
    core::rabbitmq_message_repository::{RabbitMQMessageRepository, RabbitMQMessageRepositoryError},
    dtos::extraction_request_info::ExtractionRequestInfoMessage,
    helper::error_chain_fmt,
};
use lapin::Connection as RabbitMQConnection;
use tracing::info;
use uuid::Uuid;

use crate::{
    adapters::csv_identifier_reader::{self, CsvIdentifierReaderError},
    cli::CliArgs,
    configuration::{RabbitMQSettings, Settings},
    domain::entities::extraction_job::ExtractionJobDetails,
    handlers::extract_messages_csv_handler::{
        ExtractMessagesCsvHandler, ExtractMessagesHandlerError,
    },
};

/// Holds the RabbitMQ publishing repositories and the settings of the launcher
pub struct Application {
    settings: Settings,
    extraction_request_repository: Arc<RabbitMQMessageRepository>,
    extraction_request_info_repository: Arc<RabbitMQMessageRepository>,
}

impl Application {
    /// Connects to RabbitMQ and initializes one repository per destination exchange
    #[tracing::instrument(name = "Building extraction launcher application", skip(settings))]
    pub async fn build(settings: Settings) -> Result<Self, ApplicationError> {
        let connection = Arc::new(get_rabbitmq_connection(&settings.rabbitmq).await?);
        let publisher_confirms = settings.rabbitmq.publisher_confirms;

        let extraction_request_repository = RabbitMQMessageRepository::new(
            connection.clone(),
            &settings.extraction.request_exchange_name,
            publisher_confirms,
        )
        .try_init()
        .await?;

        let extraction_request_info_repository = RabbitMQMessageRepository::new(
            connection,
            &settings.extraction.request_info_exchange_name,
            publisher_confirms,
        )
        .try_init()
        .await?;

        Ok(Self {
            settings,
            extraction_request_repository: Arc::new(extraction_request_repository),
            extraction_request_info_repository: Arc::new(extraction_request_info_repository),
        })
    }

    /// Reads every identifier file of the job then publishes its messages
    ///
    /// The job is abandoned, and nothing is published, on the first invalid file.
    #[tracing::instrument(name = "Running extraction job", skip(self))]
    pub async fn run(self, args: CliArgs) -> Result<ExtractionRequestInfoMessage, ApplicationError> {
        let details = ExtractionJobDetails::builder()
            .job_id(args.job_id.unwrap_or_else(Uuid::new_v4))
            .project_number(args.project_number)
            .extraction_directory(args.extraction_directory)
            .is_identifiable_extraction(args.identifiable)
            .is_no_filter_extraction(args.no_filters)
            .extraction_modality(args.modality)
            .build();

        info!(job_id = %details.job_id, "📦 Starting extraction job");

        let key_column_index = args
            .key_column_index
            .unwrap_or(self.settings.extraction.default_key_column_index);

        let mut handler = ExtractMessagesCsvHandler::try_new(
            details,
            key_column_index,
            self.extraction_request_repository.clone(),
            self.extraction_request_info_repository.clone(),
        )?
        .with_max_identifiers_per_message(self.settings.extraction.max_identifiers_per_message());

        for csv_file in &args.csv_files {
            csv_identifier_reader::process_file(csv_file, &mut handler)?;
        }

        let info_message = handler
            .send_messages(self.settings.rabbitmq.publisher_confirms, args.max_per_message)
            .await?;

        info!("👋 Extraction job sent");
        Ok(info_message)
    }
}

/// Create a connection to RabbitMQ
pub async fn get_rabbitmq_connection(
    config: &RabbitMQSettings,
) -> Result<RabbitMQConnection, lapin::Error> {
    RabbitMQConnection::connect(&config.get_uri(), config.get_connection_properties()).await
}

#[derive(thiserror::Error)]
pub enum ApplicationError {
    #[error(transparent)]
    RabbitMQError(#[from] lapin::Error),
    #[error(transparent)]
    RabbitMQRepositoryError(#[from] RabbitMQMessageRepositoryError),
    #[error(transparent)]
    CsvIdentifierReaderError(#[from] CsvIdentifierReaderError),
    #[error(transparent)]
    ExtractMessagesHandlerError(#[from] ExtractMessagesHandlerError),
}

impl std::fmt::Debug for ApplicationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
