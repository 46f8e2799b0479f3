use clap::Parser;
use common::telemetry::{get_tracing_subscriber, init_tracing_subscriber};
use extraction_launcher::{cli::CliArgs, configuration::get_configuration, startup::Application};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let tracing_subscriber = get_tracing_subscriber(
        "extraction_launcher".into(),
        "info".into(),
        std::io::stdout,
    );
    init_tracing_subscriber(tracing_subscriber)?;

    let configuration = get_configuration()?;

    let application = Application::build(configuration).await.map_err(|error| {
        error!(?error, "Failed to build application");
        error
    })?;

    match application.run(args).await {
        Ok(info_message) => {
            info!(
                job_id = %info_message.extraction_job_identifier,
                key_value_count = info_message.key_value_count,
                "Extraction job submitted"
            );
            Ok(())
        }
        Err(error) => {
            error!(?error, "Extraction job failed");
            Err(error.into())
        }
    }
}
