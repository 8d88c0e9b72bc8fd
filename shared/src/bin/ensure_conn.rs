use anyhow::Result;
use clap::Parser;
use shared::cli::{CommonArgs, merged_config};
use shared::config::{build_sns_client, build_sqs_client};
use shared::{logging, sns, sqs};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "ensure_conn", about = "List SQS queues and SNS topics to verify connectivity")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Also print the attributes of every queue found
    #[arg(long)]
    attrs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let default_lab_cfg = format!("{}/config.toml", env!("CARGO_MANIFEST_DIR"));
    let cfg = merged_config(&args.common, &default_lab_cfg)?;
    info!(region = %cfg.runtime.region, mode = ?cfg.runtime.mode, "checking connectivity");

    let sqs_client = build_sqs_client(&cfg).await?;
    let queues = sqs::list_queues(&sqs_client).await?;

    println!("\nSQS Queues:");
    if queues.is_empty() {
        println!("  (no queues found)");
    }
    for url in &queues {
        println!("  - {url}");
        if args.attrs {
            match sqs::queue_attrs(&sqs_client, url).await {
                Ok(attrs) => {
                    for (k, v) in attrs {
                        println!("      {k} = {v}");
                    }
                }
                Err(e) => warn!("could not read attributes of {url}: {e:#}"),
            }
        }
    }

    let sns_client = build_sns_client(&cfg).await?;
    let topics = sns::list_topics(&sns_client).await?;

    println!("\nSNS Topics:");
    if topics.is_empty() {
        println!("  (no topics found)");
    }
    for arn in &topics {
        println!("  - {arn}");
    }
    Ok(())
}
