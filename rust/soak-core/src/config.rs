use crate::error::{Result, SoakError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_TOTAL_RECORDS: u64 = 10;
pub const DEFAULT_BATCH_SIZE: u64 = 5;
/// Integer tokens up to this value are batch sizes, anything larger is a record count.
pub const BATCH_SIZE_LIMIT: u64 = 1000;
pub const MAX_REPORT_INTERVAL: u64 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WriteMode {
    #[default]
    #[serde(rename = "inserts")]
    Insert,
    #[serde(rename = "upserts")]
    Upsert,
    #[serde(rename = "replaces")]
    Replace,
}

impl WriteMode {
    pub const ALL: [WriteMode; 3] = [WriteMode::Insert, WriteMode::Upsert, WriteMode::Replace];

    pub fn label(self) -> &'static str {
        match self {
            WriteMode::Insert => "inserts",
            WriteMode::Upsert => "upserts",
            WriteMode::Replace => "replaces",
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for WriteMode {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        WriteMode::ALL
            .into_iter()
            .find(|mode| mode.label() == s)
            .ok_or(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadConfig {
    pub mode: WriteMode,
    pub total_records: u64,
    /// Zero disables batching: every record becomes its own write.
    pub batch_size: u64,
    pub report_interval: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self::new(WriteMode::default(), DEFAULT_TOTAL_RECORDS, DEFAULT_BATCH_SIZE)
    }
}

impl WorkloadConfig {
    pub fn new(mode: WriteMode, total_records: u64, batch_size: u64) -> Self {
        Self {
            mode,
            total_records,
            batch_size,
            report_interval: report_interval_for(total_records),
        }
    }

    /// Resolves positional tokens in any order.
    ///
    /// A mode label sets the mode, an integer above [`BATCH_SIZE_LIMIT`] sets the
    /// record count and any other integer sets the batch size. Later tokens win.
    pub fn from_tokens<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut mode = WriteMode::default();
        let mut total_records = DEFAULT_TOTAL_RECORDS;
        let mut batch_size = DEFAULT_BATCH_SIZE;

        for token in tokens {
            let token = token.as_ref();
            if let Ok(m) = token.parse::<WriteMode>() {
                mode = m;
                continue;
            }
            let n: u64 = token.parse().map_err(|source| SoakError::InvalidNumber {
                token: token.to_string(),
                source,
            })?;
            if n <= BATCH_SIZE_LIMIT {
                batch_size = n;
            } else {
                total_records = n;
            }
        }

        Ok(Self::new(mode, total_records, batch_size))
    }

    pub fn is_batched(&self) -> bool {
        self.batch_size > 0
    }

    pub fn validate(&self) -> Result<()> {
        let ceiling = (self.total_records / 10).max(1);
        if self.report_interval == 0 || self.report_interval > ceiling {
            return Err(SoakError::InvalidConfig(format!(
                "report interval {} outside 1..={} for {} records",
                self.report_interval, ceiling, self.total_records
            )));
        }
        Ok(())
    }
}

/// Reports fire at least ten times over a full run, and never less than every record.
pub fn report_interval_for(total_records: u64) -> u64 {
    (total_records / 10).min(MAX_REPORT_INTERVAL).max(1)
}
