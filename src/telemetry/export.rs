//! Metrics export functionality for various formats.

use super::metrics::MetricsSnapshot;
use crate::error::{Error, Result};

/// Trait for exporting metrics to different formats
pub trait MetricsExporter: Send + Sync {
    /// Export a metrics snapshot
    fn export(&self, snapshot: &MetricsSnapshot) -> Result<()>;
}

/// Export metrics to a JSON file
#[derive(Debug)]
pub struct JsonExporter {
    output_path: std::path::PathBuf,
}

impl JsonExporter {
    /// Create a new JSON exporter
    pub fn new(output_path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }
}

impl MetricsExporter for JsonExporter {
    fn export(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        let serializable = SerializableSnapshot::from(snapshot);
        let json = serde_json::to_string_pretty(&serializable)
            .map_err(|e| Error::telemetry(format!("JSON serialization failed: {}", e)))?;

        std::fs::write(&self.output_path, json)?;

        Ok(())
    }
}

/// Serializable version of MetricsSnapshot
#[derive(Debug, Clone, serde::Serialize)]
struct SerializableSnapshot {
    uptime_secs: f64,
    tasks_dispatched: u64,
    tasks_executed: u64,
    tasks_discarded: u64,
    tasks_panicked: u64,
    tasks_congested: u64,
    pool_growths: u64,
    busy_time_ms: u64,
    avg_queue_wait_us: f64,
    avg_latency_us: f64,
    p50_latency_us: f64,
    p95_latency_us: f64,
    p99_latency_us: f64,
    max_latency_us: f64,
    congestion_ratio: f64,
    tasks_per_second: f64,
}

impl From<&MetricsSnapshot> for SerializableSnapshot {
    fn from(snapshot: &MetricsSnapshot) -> Self {
        Self {
            uptime_secs: snapshot.uptime.as_secs_f64(),
            tasks_dispatched: snapshot.tasks_dispatched,
            tasks_executed: snapshot.tasks_executed,
            tasks_discarded: snapshot.tasks_discarded,
            tasks_panicked: snapshot.tasks_panicked,
            tasks_congested: snapshot.tasks_congested,
            pool_growths: snapshot.pool_growths,
            busy_time_ms: snapshot.busy_time_ns / 1_000_000,
            avg_queue_wait_us: snapshot.avg_queue_wait_ns as f64 / 1_000.0,
            avg_latency_us: snapshot.avg_latency_ns as f64 / 1_000.0,
            p50_latency_us: snapshot.p50_latency_ns as f64 / 1_000.0,
            p95_latency_us: snapshot.p95_latency_ns as f64 / 1_000.0,
            p99_latency_us: snapshot.p99_latency_ns as f64 / 1_000.0,
            max_latency_us: snapshot.max_latency_ns as f64 / 1_000.0,
            congestion_ratio: snapshot.congestion_ratio(),
            tasks_per_second: snapshot.tasks_per_second(),
        }
    }
}

/// Emit metrics as a single `tracing` event at info level
#[derive(Debug, Default)]
pub struct LogExporter {
    name: String,
}

impl LogExporter {
    /// Create an exporter that tags events with `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl MetricsExporter for LogExporter {
    fn export(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        tracing::info!(
            dispatcher = %self.name,
            uptime_secs = snapshot.uptime.as_secs_f64(),
            dispatched = snapshot.tasks_dispatched,
            executed = snapshot.tasks_executed,
            discarded = snapshot.tasks_discarded,
            panicked = snapshot.tasks_panicked,
            congested = snapshot.tasks_congested,
            pool_growths = snapshot.pool_growths,
            p50_latency_us = snapshot.p50_latency_ns as f64 / 1_000.0,
            p99_latency_us = snapshot.p99_latency_ns as f64 / 1_000.0,
            "dispatcher metrics"
        );
        Ok(())
    }
}
