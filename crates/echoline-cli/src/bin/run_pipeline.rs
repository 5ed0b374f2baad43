//! One-shot pipeline trigger for cron-style hosts.
//!
//! Runs a batch per requested media type (both by default), prints each batch
//! result as JSON and exits non-zero if any run could not be performed.

use anyhow::Result;
use clap::Parser;
use echoline_cli::{failed_count, init_tracing, PipelineClient};
use echoline_core::models::MediaType;

#[derive(Parser, Debug)]
#[command(name = "run_pipeline")]
#[command(about = "Trigger the feedback-media pipeline once")]
struct Args {
    /// Only run this media type (audio or video)
    #[arg(long, value_parser = parse_media_type)]
    media_type: Option<MediaType>,

    /// Batch size; defaults to the server's configured limit
    #[arg(long)]
    limit: Option<i64>,
}

fn parse_media_type(s: &str) -> Result<MediaType, String> {
    s.parse().map_err(|e: anyhow::Error| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let client = PipelineClient::from_env();

    let media_types = match args.media_type {
        Some(media_type) => vec![media_type],
        None => MediaType::ALL.to_vec(),
    };

    let mut run_errors = 0;
    for media_type in media_types {
        match client.run(media_type, args.limit).await {
            Ok(result) => {
                tracing::info!(
                    media_type = %media_type,
                    processed = %result["processed"],
                    failed = failed_count(&result),
                    "Pipeline batch finished"
                );
                println!("{}", serde_json::to_string(&result)?);
            }
            Err(e) => {
                tracing::error!(media_type = %media_type, error = %e, "Pipeline batch not run");
                run_errors += 1;
            }
        }
    }

    if run_errors > 0 {
        anyhow::bail!("{} pipeline run(s) failed", run_errors);
    }
    Ok(())
}
