use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use fifo_groups::producer::Producer;
use fifo_groups::settings::{LabConfig, RunSettings};
use shared::cli::{CommonArgs, require_topic_arn};
use shared::config::build_sns_client;
use shared::sns::SnsTopic;
use shared::{logging, shutdown};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "producer", about = "Publish messages across FIFO groups to the SNS topic")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let default_lab_cfg = format!("{}/config.toml", env!("CARGO_MANIFEST_DIR"));
    let cfg = LabConfig::load(&args.common, &default_lab_cfg)?;
    let run = RunSettings::from_config(&cfg)?;

    let topic_arn = require_topic_arn(&cfg.app)?;
    let client = build_sns_client(&cfg.app).await?;

    println!(
        "[producer] region={} topic={} mode={:?} groups={}",
        cfg.app.runtime.region,
        topic_arn,
        run.producer.mode,
        run.registry.len(),
    );

    let cancel = CancellationToken::new();
    shutdown::cancel_on_signal(cancel.clone());

    let producer = Producer::new(
        Arc::new(SnsTopic::new(client, topic_arn)),
        Arc::new(run.registry),
        run.producer,
    );
    let messages = producer.plan(&mut rand::thread_rng());
    let report = producer.run(messages, &cancel).await;

    println!("{report}");
    Ok(())
}
