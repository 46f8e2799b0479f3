use std::num::NonZeroUsize;

use lapin::ConnectionProperties;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_aux::field_attributes::{
    deserialize_number_from_string, deserialize_option_number_from_string,
};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub rabbitmq: RabbitMQSettings,
    pub extraction: ExtractionSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RabbitMQSettings {
    pub username: String,
    pub password: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub virtual_host: String,
    /// Waits for the broker to confirm the published messages
    pub publisher_confirms: bool,
}

impl RabbitMQSettings {
    pub fn get_uri(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/{}",
            self.username,
            self.password.expose_secret(),
            self.host,
            self.port,
            self.virtual_host.replace('/', "%2f")
        )
    }

    pub fn get_connection_properties(&self) -> ConnectionProperties {
        ConnectionProperties::default()
            // At the moment the tokio reactor is only available for unix.
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_reactor(tokio_reactor_trait::Tokio)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionSettings {
    /// Exchange receiving the extraction request batches
    pub request_exchange_name: String,
    /// Exchange receiving the job summaries
    pub request_info_exchange_name: String,
    /// Batch capacity, all the identifiers of a job go into one message if unset
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub max_identifiers_per_message: Option<usize>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub default_key_column_index: usize,
}

impl ExtractionSettings {
    pub fn max_identifiers_per_message(&self) -> Option<NonZeroUsize> {
        self.max_identifiers_per_message.and_then(NonZeroUsize::new)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.max_identifiers_per_message == Some(0) {
            return Err(config::ConfigError::Message(
                "extraction.max_identifiers_per_message must be greater than 0".to_string(),
            ));
        }
        if self.request_exchange_name.trim().is_empty()
            || self.request_info_exchange_name.trim().is_empty()
        {
            return Err(config::ConfigError::Message(
                "extraction exchange names must not be blank".to_string(),
            ));
        }

        Ok(())
    }
}

/// Extracts app settings from configuration files and env variables
///
/// `base.yaml` should contain shared settings for all environments.
/// A specific env file should be created for each environment: `develop.yaml`,`local.yaml` and `production.yaml`
/// The environment is set with the env var `APP_ENVIRONMENT`.
/// If `APP_ENVIRONMENT` is not set, `develop.yaml` is the default.
///
/// Settings are also taken from environment variables: with a prefix of APP and '__' as separator
/// For ex: `APP_RABBITMQ__PORT=5673` would set `Settings.rabbitmq.port`
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().map_err(|e| {
        config::ConfigError::Message(format!("Failed to determine the current directory: {}", e))
    })?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "develop".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let settings = settings.try_deserialize::<Settings>()?;
    settings.extraction.validate()?;

    Ok(settings)
}

/// The possible runtime environment for our application.
pub enum Environment {
    Develop,
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Develop => "develop",
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "develop" => Ok(Self::Develop),
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `develop`, `local` or `production`.",
                other
            )),
        }
    }
}
