use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::Context;
use clap::Parser;
use tokio::time::{Duration, sleep};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use txqueue_core::domain::{ExecutorError, TxHash};
use txqueue_core::impls::MemoryEventSink;
use txqueue_core::{QueueConfig, TxQueueBuilder};

/// Run the "like" demo against a single-flight transaction queue.
#[derive(Debug, Parser)]
#[command(name = "txqueue", version)]
struct Args {
    /// TOML file with queue settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override `max_retries` from the config.
    #[arg(long)]
    max_retries: Option<u32>,

    /// Override `base_backoff_ms` from the config.
    #[arg(long)]
    backoff_ms: Option<u64>,

    /// Print the final queue status and event log as JSON.
    #[arg(long)]
    json: bool,
}

/// Simulated chain write: fails `failures` times with `transient_error`, then
/// succeeds with `hash` after `latency`.
struct SimulatedWrite {
    remaining_failures: AtomicU32,
    transient_error: &'static str,
    hash: &'static str,
    latency: Duration,
}

impl SimulatedWrite {
    fn new(failures: u32, transient_error: &'static str, hash: &'static str) -> Arc<Self> {
        Arc::new(Self {
            remaining_failures: AtomicU32::new(failures),
            transient_error,
            hash,
            latency: Duration::from_millis(50),
        })
    }

    async fn send(self: Arc<Self>) -> Result<TxHash, ExecutorError> {
        sleep(self.latency).await;
        let left = self.remaining_failures.load(Ordering::SeqCst);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(self.transient_error.into());
        }
        Ok(self.hash.to_string())
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

fn load_config(args: &Args) -> anyhow::Result<QueueConfig> {
    let mut config = match &args.config {
        Some(path) => QueueConfig::load(path)
            .with_context(|| format!("loading queue config from {}", path.display()))?,
        None => QueueConfig {
            // the demo needs one retry to show the backoff path
            max_retries: 1,
            ..QueueConfig::default()
        },
    };
    if let Some(n) = args.max_retries {
        config.max_retries = n;
    }
    if let Some(ms) = args.backoff_ms {
        config.base_backoff_ms = ms;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = load_config(&args)?;
    info!(?config, "starting demo");

    let events = MemoryEventSink::new();
    let queue = TxQueueBuilder::from_config(config)
        .event_sink(events.clone())
        .build()
        .context("building queue")?;

    // (A) 3 件を await せずに連続投入（UI の連打を想定）
    let like1 = SimulatedWrite::new(0, "", "0xaaa");
    let like2 = SimulatedWrite::new(1, "timeout", "0xbbb");
    let like3 = SimulatedWrite::new(u32::MAX, "execution reverted: already liked", "");

    let handles = vec![
        queue.submit("like-1", move || Arc::clone(&like1).send()),
        queue.submit("like-2", move || Arc::clone(&like2).send()),
        queue.submit("like-3", move || Arc::clone(&like3).send()),
    ];
    info!(queue_size = queue.status().queue_size, "submitted");

    // (B) 投入順に結果を待つ
    for handle in handles {
        let label = handle.label().to_string();
        match handle.await {
            Ok(hash) => info!(%label, %hash, "confirmed"),
            Err(err) => warn!(%label, error = %err, "rejected"),
        }
    }

    let status = queue.status();
    if args.json {
        let out = serde_json::json!({
            "status": status,
            "events": events.events(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "succeeded={} failed={} retries={} cancelled={}",
            status.counts.succeeded,
            status.counts.failed,
            status.counts.retries,
            status.counts.cancelled
        );
    }
    Ok(())
}
