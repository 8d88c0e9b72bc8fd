use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use fifo_groups::pool::ConsumerPool;
use fifo_groups::settings::{LabConfig, RunSettings};
use fifo_groups::stats::ConsumerStats;
use shared::cli::{CommonArgs, resolve_queue_url};
use shared::config::build_sqs_client;
use shared::sqs::SqsQueue;
use shared::{logging, shutdown};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "consumer", about = "Compete for FIFO queue messages with a pool of consumers")]
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

    let client = build_sqs_client(&cfg.app).await?;
    let url = resolve_queue_url(&args.common, &cfg.app, &client).await?;

    println!(
        "[consumer] region={} queue={} mode={:?} fan_out={:?} consumers={} wait={:?} drain={}",
        cfg.app.runtime.region,
        url,
        cfg.app.runtime.mode,
        run.fan_out,
        run.fan_out.total_consumers(&run.registry),
        run.consumer.wait,
        run.consumer.drain_on_empty,
    );
    println!("[consumer] waiting for messages... (Ctrl+C to stop)");

    let cancel = CancellationToken::new();
    shutdown::cancel_on_signal(cancel.clone());

    let stats = Arc::new(ConsumerStats::new());
    let pool = ConsumerPool::launch(
        run.fan_out,
        Arc::new(SqsQueue::new(client, url)),
        Arc::new(run.registry),
        Arc::clone(&stats),
        run.consumer,
        cancel,
    );

    for s in pool.join().await {
        info!(
            consumer = s.consumer_id,
            processed = s.processed,
            released = s.released,
            delete_failures = s.delete_failures,
            release_failures = s.release_failures,
            receive_errors = s.receive_errors,
            "consumer stopped"
        );
    }

    println!("{}", stats.report());
    println!(
        "Service was up for: {:?}",
        Duration::from_secs(started.elapsed().as_secs())
    );
    println!("All consumers have shut down. Exiting.");
    Ok(())
}
