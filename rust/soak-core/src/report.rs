use crate::config::WriteMode;
use crate::metrics::RunCounters;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::time::Duration;

/// Label printed in every line, distinguishing this tool from its siblings in other languages.
pub const TOOL_LABEL: &str = "rust";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// A point-in-time view of a run, ready to print.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename = "progress")]
pub struct ProgressReport {
    pub at: DateTime<Utc>,
    pub tool: &'static str,
    pub mode: WriteMode,
    pub done: u64,
    pub total: u64,
    pub batch_size: u64,
    pub elapsed_ms: u64,
    pub throughput: f64,
    pub inserted: u64,
    pub modified: u64,
    pub upserted: u64,
}

impl ProgressReport {
    pub fn new(
        mode: WriteMode,
        done: u64,
        total: u64,
        batch_size: u64,
        elapsed: Duration,
        counters: RunCounters,
        at: DateTime<Utc>,
    ) -> Self {
        // Reports can fire faster than the clock ticks.
        let elapsed_ms = (elapsed.as_millis().min(u64::MAX as u128) as u64).max(1);
        Self {
            at,
            tool: TOOL_LABEL,
            mode,
            done,
            total,
            batch_size,
            elapsed_ms,
            throughput: done as f64 * 1000.0 / elapsed_ms as f64,
            inserted: counters.inserted,
            modified: counters.modified,
            upserted: counters.upserted,
        }
    }
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} / {} ({} per batch) in {} = {:.1}/s ins:{} mods:{} ups:{}",
            self.at.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.tool,
            self.mode,
            self.done,
            self.total,
            self.batch_size,
            format_elapsed(Duration::from_millis(self.elapsed_ms)),
            self.throughput,
            self.inserted,
            self.modified,
            self.upserted,
        )
    }
}

/// `1.234s`, `2m03.500s`, `1h02m03.000s`
pub fn format_elapsed(d: Duration) -> String {
    let total_ms = d.as_millis();
    let ms = total_ms % 1000;
    let secs = (total_ms / 1000) % 60;
    let mins = (total_ms / 60_000) % 60;
    let hours = total_ms / 3_600_000;
    if hours > 0 {
        format!("{hours}h{mins:02}m{secs:02}.{ms:03}s")
    } else if mins > 0 {
        format!("{mins}m{secs:02}.{ms:03}s")
    } else {
        format!("{secs}.{ms:03}s")
    }
}

/// Writes one line per report.
pub struct Reporter<W> {
    out: W,
    format: ReportFormat,
}

impl Reporter<std::io::Stdout> {
    pub fn stdout(format: ReportFormat) -> Self {
        Self::new(std::io::stdout(), format)
    }
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, format: ReportFormat) -> Self {
        Self { out, format }
    }

    pub fn emit(&mut self, report: &ProgressReport) -> std::io::Result<()> {
        match self.format {
            ReportFormat::Text => writeln!(self.out, "{report}")?,
            ReportFormat::Json => {
                serde_json::to_writer(&mut self.out, report)?;
                self.out.write_all(b"\n")?;
            }
        }
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
