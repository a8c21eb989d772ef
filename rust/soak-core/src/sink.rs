use crate::record::{KeyFilter, Record, RecordUpdate, WriteIntent};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::AddAssign;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub uri: String,
    pub database: String,
    pub collection: String,
    #[serde(default)]
    pub options: HashMap<String, String>,
}

/// Work done on the target collection before the first write.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PrepareOptions {
    /// Drop the collection so the run starts empty.
    pub drop_collection: bool,
    /// Create a (non-unique) index on `myid`.
    pub index_ids: bool,
}

/// Outcome of one ordered bulk write, as reported by the sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkWriteSummary {
    pub inserted: u64,
    pub matched: u64,
    pub modified: u64,
    pub upserted: u64,
}

impl AddAssign for BulkWriteSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.inserted += rhs.inserted;
        self.matched += rhs.matched;
        self.modified += rhs.modified;
        self.upserted += rhs.upserted;
    }
}

/// A document collection the driver writes to.
///
/// One instance wraps one client connection. Every call is awaited to
/// completion before the next one is issued.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Start a server owned by this sink (e.g. a throwaway container) and connect
    /// to it. Only the database and collection of `params` are used.
    async fn setup(&self, _params: &ConnectionParams) -> anyhow::Result<()> {
        anyhow::bail!("this sink cannot manage its own server")
    }

    /// Disconnect and stop anything started by [`DocumentSink::setup`].
    async fn teardown(&self) -> anyhow::Result<()> {
        self.close().await
    }

    async fn connect(&self, params: &ConnectionParams) -> anyhow::Result<()>;

    async fn close(&self) -> anyhow::Result<()>;

    async fn prepare(&self, _opts: &PrepareOptions) -> anyhow::Result<()> {
        Ok(())
    }

    async fn insert_one(&self, record: Record) -> anyhow::Result<()>;

    async fn update_one(
        &self,
        filter: KeyFilter,
        update: RecordUpdate,
        upsert: bool,
    ) -> anyhow::Result<()>;

    async fn replace_one(
        &self,
        filter: KeyFilter,
        document: Record,
        upsert: bool,
    ) -> anyhow::Result<()>;

    /// Applies `batch` in order. Any failure fails the whole call.
    async fn bulk_write(&self, batch: Vec<WriteIntent>) -> anyhow::Result<BulkWriteSummary>;

    /// Round trip to the server. Sinks without one cannot be pinged.
    async fn ping(&self) -> anyhow::Result<Duration> {
        anyhow::bail!("this sink has no server to ping")
    }
}

/// Creates sink instances by name.
pub trait SinkFactory: Send + Sync {
    fn name(&self) -> &'static str;

    fn default_uri(&self) -> &'static str {
        ""
    }

    fn create(&self) -> Box<dyn DocumentSink>;
}
