use crate::sink::BulkWriteSummary;
use hdrhistogram::Histogram;
use serde::Serialize;
use std::time::Duration;

/// Running totals fed from bulk write results. Counts only ever grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    pub inserted: u64,
    pub modified: u64,
    pub upserted: u64,
}

impl RunCounters {
    pub fn absorb(&mut self, flush: &BulkWriteSummary) {
        self.inserted += flush.inserted;
        self.modified += flush.modified;
        self.upserted += flush.upserted;
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LatencyStats {
    pub samples: u64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub p999_ms: f64,
    pub max_ms: f64,
}

/// Per-call sink latency in microseconds.
pub struct LatencyRecorder {
    hist: Histogram<u64>,
}

impl Default for LatencyRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyRecorder {
    pub fn new() -> Self {
        Self {
            // 3 significant figures, auto-resizing
            hist: Histogram::new(3).expect("3 sigfigs is a valid histogram precision"),
        }
    }

    pub fn record(&mut self, dur: Duration) {
        let us = dur.as_micros().min(u64::MAX as u128) as u64;
        let _ = self.hist.record(us.max(1));
    }

    pub fn len(&self) -> u64 {
        self.hist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hist.is_empty()
    }

    pub fn to_stats(&self) -> LatencyStats {
        if self.hist.is_empty() {
            return LatencyStats::default();
        }
        LatencyStats {
            samples: self.hist.len(),
            p50_ms: self.hist.value_at_quantile(0.50) as f64 / 1000.0,
            p95_ms: self.hist.value_at_quantile(0.95) as f64 / 1000.0,
            p99_ms: self.hist.value_at_quantile(0.99) as f64 / 1000.0,
            p999_ms: self.hist.value_at_quantile(0.999) as f64 / 1000.0,
            max_ms: self.hist.max() as f64 / 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_flush_results() {
        let mut counters = RunCounters::default();
        counters.absorb(&BulkWriteSummary {
            inserted: 5,
            matched: 0,
            modified: 0,
            upserted: 0,
        });
        counters.absorb(&BulkWriteSummary {
            inserted: 0,
            matched: 3,
            modified: 2,
            upserted: 4,
        });
        assert_eq!(
            counters,
            RunCounters {
                inserted: 5,
                modified: 2,
                upserted: 4
            }
        );
    }

    #[test]
    fn empty_recorder_reports_zeroes() {
        let rec = LatencyRecorder::new();
        assert!(rec.is_empty());
        let stats = rec.to_stats();
        assert_eq!(stats.samples, 0);
        assert_eq!(stats.p99_ms, 0.0);
    }

    #[test]
    fn sub_microsecond_calls_still_count() {
        let mut rec = LatencyRecorder::new();
        rec.record(Duration::ZERO);
        rec.record(Duration::from_millis(4));
        assert_eq!(rec.len(), 2);
        let stats = rec.to_stats();
        assert!(stats.max_ms >= 3.9);
        assert!(stats.p50_ms <= stats.p99_ms);
    }
}
