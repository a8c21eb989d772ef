use std::num::ParseIntError;

/// Failures that end a soak run. Nothing in the core recovers from any of them.
#[derive(Debug, thiserror::Error)]
pub enum SoakError {
    #[error("bad number {token:?}")]
    InvalidNumber {
        token: String,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid workload config: {0}")]
    InvalidConfig(String),

    #[error("failed to connect to {store} sink")]
    Connection {
        store: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{op} failed for record {index}")]
    Write {
        op: &'static str,
        index: u64,
        #[source]
        source: anyhow::Error,
    },

    #[error("bulk write #{flush} of {len} operations failed")]
    BulkWrite {
        flush: u64,
        len: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to emit progress report")]
    Output(#[from] std::io::Error),
}

pub type Result<T, E = SoakError> = std::result::Result<T, E>;
