//! Per-iteration metrics emission
//!
//! Metrics are a flat key to scalar mapping emitted once per training
//! iteration. The sink either logs them through `tracing`, additionally
//! appends them as JSON lines for offline inspection, or suppresses the
//! side effect entirely.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

/// Flat per-iteration metrics mapping.
pub type Metrics = BTreeMap<String, f64>;

/// Destination toggle for the metrics sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    /// Log every iteration through `tracing`
    Enabled,
    /// Log through `tracing` and append JSON lines to a file
    Offline,
    /// Suppress the logging side effect
    Disabled,
}

impl FromStr for LogMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "enabled" | "online" => Ok(LogMode::Enabled),
            "offline" => Ok(LogMode::Offline),
            "disabled" => Ok(LogMode::Disabled),
            other => Err(anyhow!("unknown log mode: {other}")),
        }
    }
}

/// Metrics sink honoring the configured [`LogMode`].
///
/// The experiment `group` label is carried through unmodified; it has no
/// effect on training.
pub struct MetricsSink {
    mode: LogMode,
    group: String,
    writer: Option<BufWriter<File>>,
    /// Last metrics handed to [`MetricsSink::emit`], kept regardless of mode
    pub last: Metrics,
}

impl MetricsSink {
    /// Create a sink. In offline mode, JSON lines go to `<dir>/metrics.jsonl`.
    pub fn new(mode: LogMode, group: &str, offline_dir: Option<&Path>) -> Result<Self> {
        let writer = match (mode, offline_dir) {
            (LogMode::Offline, Some(dir)) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("creating metrics dir {}", dir.display()))?;
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(dir.join("metrics.jsonl"))?;
                Some(BufWriter::new(file))
            }
            (LogMode::Offline, None) => {
                return Err(anyhow!("offline metrics mode requires a directory"));
            }
            _ => None,
        };

        Ok(Self { mode, group: group.to_string(), writer, last: Metrics::new() })
    }

    /// Emit one iteration's metrics.
    pub fn emit(&mut self, metrics: Metrics) -> Result<()> {
        if self.mode != LogMode::Disabled {
            let line: Vec<String> =
                metrics.iter().map(|(k, v)| format!("{k}={v:.4}")).collect();
            tracing::info!(group = %self.group, "{}", line.join(" "));
        }
        if let Some(writer) = self.writer.as_mut() {
            serde_json::to_writer(&mut *writer, &metrics)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        self.last = metrics;
        Ok(())
    }
}
