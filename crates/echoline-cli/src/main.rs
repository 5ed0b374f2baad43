//! Echoline CLI: operator commands against the Echoline API.
//!
//! Set ECHOLINE_API_URL (or API_URL) and, for `run`, SERVICE_API_KEY.

use anyhow::Result;
use clap::{Parser, Subcommand};
use echoline_cli::{init_tracing, PipelineClient};
use echoline_core::models::MediaType;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "echoline", about = "Echoline pipeline CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trigger one pipeline batch
    Run {
        /// audio or video
        #[arg(long, value_parser = parse_media_type)]
        media_type: MediaType,
        /// Batch size; defaults to the server's configured limit
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Show the media processing status of a survey response or feedback
    Status {
        owner_id: Uuid,
    },
}

fn parse_media_type(s: &str) -> Result<MediaType, String> {
    s.parse().map_err(|e: anyhow::Error| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let client = PipelineClient::from_env();

    let output = match cli.command {
        Commands::Run { media_type, limit } => client.run(media_type, limit).await?,
        Commands::Status { owner_id } => client.media_status(owner_id).await?,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
