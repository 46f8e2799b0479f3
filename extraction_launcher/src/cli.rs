use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::Parser;
use uuid::Uuid;

/// Inputs of one extraction job
#[derive(Parser, Debug, Clone)]
#[command(name = "extraction_launcher")]
#[command(
    about = "Reads identifier CSV files and publishes the extraction requests of a single job."
)]
#[command(version)]
pub struct CliArgs {
    #[arg(required = true, help = "CSV files listing the identifiers to extract, each with a header line")]
    pub csv_files: Vec<PathBuf>,

    #[arg(short, long, help = "Project number the extraction belongs to")]
    pub project_number: String,

    #[arg(short, long, help = "Directory, relative to the extraction root, receiving the extracted files")]
    pub extraction_directory: String,

    #[arg(short, long, help = "0-based index of the identifier column, defaults to the configured one")]
    pub key_column_index: Option<usize>,

    #[arg(short, long, help = "Modality to restrict the extraction to")]
    pub modality: Option<String>,

    #[arg(long, help = "Extracts identifiable files, which will not be anonymised")]
    pub identifiable: bool,

    #[arg(long, help = "Disables the file rejection filters")]
    pub no_filters: bool,

    #[arg(long, help = "Maximum number of identifiers per request message, overrides the configured one")]
    pub max_per_message: Option<NonZeroUsize>,

    #[arg(long, help = "Identifier of the extraction job, a new one is generated if unset")]
    pub job_id: Option<Uuid>,
}
