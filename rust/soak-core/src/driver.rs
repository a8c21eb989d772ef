use crate::batch::PendingBatch;
use crate::config::WorkloadConfig;
use crate::error::{Result, SoakError};
use crate::metrics::{LatencyRecorder, LatencyStats, RunCounters};
use crate::record::{intent, WriteIntent};
use crate::report::{ProgressReport, Reporter};
use crate::sink::{BulkWriteSummary, DocumentSink};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Start of the run, captured once.
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    started: Instant,
    started_at: DateTime<Utc>,
}

impl RunClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// Tagged `"kind": "summary"` so it can share a JSON Lines stream with progress reports.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename = "summary")]
pub struct RunOutcome {
    pub config: WorkloadConfig,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub throughput: f64,
    pub counters: RunCounters,
    /// Sum of every flush result, including matches the counters leave out.
    pub bulk_totals: BulkWriteSummary,
    pub flushes: u64,
    pub single_writes: u64,
    pub write_latency: LatencyStats,
}

/// Walks the record indices, writing each one immediately or through
/// ordered batches, and reports progress along the way.
pub struct WorkloadDriver<'a, W> {
    sink: &'a dyn DocumentSink,
    config: WorkloadConfig,
    reporter: &'a mut Reporter<W>,
    pending: PendingBatch,
    counters: RunCounters,
    bulk_totals: BulkWriteSummary,
    flushes: u64,
    single_writes: u64,
    latency: LatencyRecorder,
}

impl<'a, W: Write> WorkloadDriver<'a, W> {
    pub fn new(
        sink: &'a dyn DocumentSink,
        config: WorkloadConfig,
        reporter: &'a mut Reporter<W>,
    ) -> Result<Self> {
        config.validate()?;
        let capacity = usize::try_from(config.batch_size).map_err(|_| {
            SoakError::InvalidConfig(format!("batch size {} too large", config.batch_size))
        })?;
        Ok(Self {
            sink,
            config,
            reporter,
            pending: PendingBatch::with_capacity(capacity),
            counters: RunCounters::default(),
            bulk_totals: BulkWriteSummary::default(),
            flushes: 0,
            single_writes: 0,
            latency: LatencyRecorder::new(),
        })
    }

    pub async fn run(mut self) -> Result<RunOutcome> {
        let cfg = self.config.clone();
        info!(
            mode = %cfg.mode,
            total = cfg.total_records,
            batch_size = cfg.batch_size,
            report_interval = cfg.report_interval,
            "starting soak run"
        );
        let clock = RunClock::start();
        self.report(&clock, 0)?;

        for index in 0..cfg.total_records {
            let intent = intent(cfg.mode, index, Utc::now());
            if cfg.is_batched() {
                if self.pending.push(intent) {
                    self.flush().await?;
                }
            } else {
                self.write_single(index, intent).await?;
            }

            if (index + 1) % cfg.report_interval == 0 {
                self.report(&clock, index + 1)?;
            }
        }

        if !self.pending.is_empty() {
            self.flush().await?;
        }
        self.report(&clock, cfg.total_records)?;

        let elapsed = clock.elapsed();
        let elapsed_ms = (elapsed.as_millis().min(u64::MAX as u128) as u64).max(1);
        let outcome = RunOutcome {
            config: cfg,
            started_at: clock.started_at(),
            elapsed_ms,
            throughput: self.config.total_records as f64 * 1000.0 / elapsed_ms as f64,
            counters: self.counters,
            bulk_totals: self.bulk_totals,
            flushes: self.flushes,
            single_writes: self.single_writes,
            write_latency: self.latency.to_stats(),
        };
        info!(
            flushes = outcome.flushes,
            single_writes = outcome.single_writes,
            inserted = outcome.counters.inserted,
            modified = outcome.counters.modified,
            upserted = outcome.counters.upserted,
            elapsed_ms = outcome.elapsed_ms,
            "soak run complete"
        );
        Ok(outcome)
    }

    async fn write_single(&mut self, index: u64, intent: WriteIntent) -> Result<()> {
        let t0 = Instant::now();
        let (op, res) = match intent {
            WriteIntent::Insert(record) => ("insert_one", self.sink.insert_one(record).await),
            WriteIntent::Upsert { filter, update } => {
                ("update_one", self.sink.update_one(filter, update, true).await)
            }
            WriteIntent::Replace { filter, document } => {
                ("replace_one", self.sink.replace_one(filter, document, false).await)
            }
        };
        self.latency.record(t0.elapsed());
        res.map_err(|source| SoakError::Write { op, index, source })?;
        self.single_writes += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        let batch = self.pending.drain();
        let len = batch.len();
        self.flushes += 1;
        let flush = self.flushes;

        let t0 = Instant::now();
        let summary = self
            .sink
            .bulk_write(batch)
            .await
            .map_err(|source| SoakError::BulkWrite { flush, len, source })?;
        let dt = t0.elapsed();
        self.latency.record(dt);

        self.counters.absorb(&summary);
        self.bulk_totals += summary;
        debug!(
            flush,
            len,
            inserted = summary.inserted,
            matched = summary.matched,
            modified = summary.modified,
            upserted = summary.upserted,
            latency_us = dt.as_micros() as u64,
            "flushed batch"
        );
        Ok(())
    }

    fn report(&mut self, clock: &RunClock, done: u64) -> Result<()> {
        let report = ProgressReport::new(
            self.config.mode,
            done,
            self.config.total_records,
            self.config.batch_size,
            clock.elapsed(),
            self.counters,
            Utc::now(),
        );
        self.reporter.emit(&report)?;
        Ok(())
    }
}

/// Runs `config` against `sink`, printing progress through `reporter`.
pub async fn run_workload<W: Write>(
    sink: &dyn DocumentSink,
    config: WorkloadConfig,
    reporter: &mut Reporter<W>,
) -> Result<RunOutcome> {
    WorkloadDriver::new(sink, config, reporter)?.run().await
}
