pub mod batch;
pub mod config;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod record;
pub mod report;
pub mod sink;

pub use config::{WorkloadConfig, WriteMode};
pub use driver::{run_workload, RunOutcome, WorkloadDriver};
pub use error::SoakError;
pub use metrics::{LatencyStats, RunCounters};
pub use record::{KeyFilter, Record, RecordUpdate, WriteIntent};
pub use report::{ProgressReport, ReportFormat, Reporter};
pub use sink::{BulkWriteSummary, ConnectionParams, DocumentSink, PrepareOptions, SinkFactory};
