//! Congestion control demo - a producer outpaces a slow consumer
//!
//! Tasks are produced at a fixed rate and each one takes longer to process
//! than the production interval. With congestion control enabled, tasks that
//! arrive while the pool is saturated skip their work; without it the queue
//! keeps growing.
//!
//! ```text
//! cargo run --example congestion_control -- --workers 2 --max-workers 4 --congestion-control
//! ```

use clap::Parser;
use queue_dispatch::prelude::*;
use queue_dispatch::telemetry::{LogExporter, MetricsExporter};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "congestion_control")]
#[command(about = "Elastic queue dispatcher under sustained overload", long_about = None)]
struct Args {
    /// Initial number of workers
    #[arg(short, long, default_value_t = 5)]
    workers: usize,

    /// Maximum number of workers (defaults to --workers)
    #[arg(short, long)]
    max_workers: Option<usize>,

    /// Skip the work of tasks that arrive while the pool is saturated
    #[arg(short, long)]
    congestion_control: bool,

    /// Number of tasks to produce
    #[arg(short, long, default_value_t = 30)]
    iterations: u64,

    /// Tasks produced per second
    #[arg(long, default_value_t = 4.0)]
    production_rps: f64,

    /// Consumption speed relative to production (0.1 means ten times slower)
    #[arg(long, default_value_t = 0.1)]
    consumption_capacity: f64,
}

struct Stream {
    data: String,
    congestion_control: bool,
    work: Duration,
}

impl Task for Stream {
    fn process(&self, congested: bool, queue_len: usize) {
        tracing::info!(
            data = %self.data,
            congested,
            congestion_control = self.congestion_control,
            queue_len,
            "processing"
        );

        if congested && self.congestion_control {
            tracing::info!(data = %self.data, "ignoring context under congestion");
            return;
        }

        thread::sleep(self.work);
        tracing::info!(data = %self.data, "data processed");
    }

    fn process_lapse(&self, elapsed_ns: u64) {
        tracing::debug!(
            data = %self.data,
            elapsed_ms = elapsed_ns / 1_000_000,
            "process lapse"
        );
    }
}

fn main() -> queue_dispatch::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,queue_dispatch=debug".into()),
        )
        .init();

    let production_interval = Duration::from_secs_f64(1.0 / args.production_rps.max(0.001));
    let work = production_interval.div_f64(args.consumption_capacity.max(0.001));

    let config = Config::builder()
        .name("MyQueue")
        .initial_workers(args.workers)
        .max_workers(args.max_workers.unwrap_or(args.workers))
        .build()?;
    let mut dispatcher = Dispatcher::with_config(config)?;

    // the sequence belongs to the producer, not the dispatcher
    let mut sequence: u64 = 0;

    while sequence < args.iterations {
        tracing::info!(iteration = sequence, "{}", dispatcher.stats());

        dispatcher.dispatch(Arc::new(Stream {
            data: sequence.to_string(),
            congestion_control: args.congestion_control,
            work,
        }));
        sequence += 1;

        thread::sleep(production_interval);
    }

    let discarded = dispatcher.shutdown()?;
    tracing::info!(discarded, "producer finished");

    LogExporter::new(dispatcher.name()).export(&dispatcher.metrics())?;

    Ok(())
}
