//! Publish a batch, then consume it, in one process.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use fifo_groups::pool::ConsumerPool;
use fifo_groups::producer::Producer;
use fifo_groups::settings::{LabConfig, RunSettings};
use fifo_groups::stats::ConsumerStats;
use shared::cli::{CommonArgs, require_topic_arn, resolve_queue_url};
use shared::config::{build_sns_client, build_sqs_client};
use shared::sns::SnsTopic;
use shared::sqs::SqsQueue;
use shared::{logging, shutdown};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "demo", about = "Produce then consume FIFO group messages in one run")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();
    let started = Instant::now();

    let default_lab_cfg = format!("{}/config.toml", env!("CARGO_MANIFEST_DIR"));
    let cfg = LabConfig::load(&args.common, &default_lab_cfg)?;
    let run = RunSettings::from_config(&cfg)?;

    let topic_arn = require_topic_arn(&cfg.app)?;
    let sns_client = build_sns_client(&cfg.app).await?;
    let sqs_client = build_sqs_client(&cfg.app).await?;
    let url = resolve_queue_url(&args.common, &cfg.app, &sqs_client).await?;

    let cancel = CancellationToken::new();
    shutdown::cancel_on_signal(cancel.clone());

    let registry = Arc::new(run.registry);

    let producer = Producer::new(
        Arc::new(SnsTopic::new(sns_client, topic_arn)),
        Arc::clone(&registry),
        run.producer,
    );
    let messages = producer.plan(&mut rand::thread_rng());
    let sent = producer.run(messages, &cancel).await;
    println!("{sent}");

    if cancel.is_cancelled() {
        return Ok(());
    }

    let stats = Arc::new(ConsumerStats::new());
    let pool = ConsumerPool::launch(
        run.fan_out,
        Arc::new(SqsQueue::new(sqs_client, url)),
        registry,
        Arc::clone(&stats),
        run.consumer,
        cancel,
    );
    info!(consumers = pool.len(), "consumers started");

    let summaries = pool.join().await;
    // more processed than sent means some message was redelivered and handled twice
    let processed: u64 = summaries.iter().map(|s| s.processed).sum();
    info!(sent = sent.sent.total, processed, "run finished");

    println!("{}", stats.report());
    println!(
        "Service was up for: {:?}",
        Duration::from_secs(started.elapsed().as_secs())
    );
    Ok(())
}
