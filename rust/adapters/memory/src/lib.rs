use anyhow::Result;
use async_trait::async_trait;
use soak_core::sink::{BulkWriteSummary, ConnectionParams, DocumentSink, PrepareOptions};
use soak_core::{KeyFilter, Record, RecordUpdate, SinkFactory, WriteIntent};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// A collection held in process memory. Documents are stored in insertion
/// order and matched on `myid`; duplicate ids are allowed, as in a
/// collection without a unique index.
#[derive(Debug, Default)]
struct Collection {
    name: String,
    docs: Vec<Record>,
    id_index: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    Inserted,
    Matched { modified: bool },
    Upserted,
    Missed,
}

impl Collection {
    fn position(&self, filter: KeyFilter) -> Option<usize> {
        self.docs.iter().position(|d| d.id == filter.id)
    }

    fn insert(&mut self, record: Record) -> Applied {
        self.docs.push(record);
        Applied::Inserted
    }

    fn update(&mut self, filter: KeyFilter, update: RecordUpdate, upsert: bool) -> Applied {
        match self.position(filter) {
            Some(pos) => {
                let doc = &mut self.docs[pos];
                let modified = doc.value != update.value || doc.timestamp != update.timestamp;
                doc.value = update.value;
                doc.timestamp = update.timestamp;
                Applied::Matched { modified }
            }
            None if upsert => {
                self.docs.push(Record {
                    id: filter.id,
                    value: update.value,
                    timestamp: update.timestamp,
                });
                Applied::Upserted
            }
            None => Applied::Missed,
        }
    }

    fn replace(&mut self, filter: KeyFilter, document: Record, upsert: bool) -> Applied {
        match self.position(filter) {
            Some(pos) => {
                let modified = self.docs[pos] != document;
                self.docs[pos] = document;
                Applied::Matched { modified }
            }
            None if upsert => {
                self.docs.push(document);
                Applied::Upserted
            }
            None => Applied::Missed,
        }
    }

    fn apply(&mut self, intent: WriteIntent) -> Applied {
        match intent {
            WriteIntent::Insert(record) => self.insert(record),
            WriteIntent::Upsert { filter, update } => self.update(filter, update, true),
            WriteIntent::Replace { filter, document } => self.replace(filter, document, true),
        }
    }
}

pub struct MemorySink {
    collection: Mutex<Option<Collection>>,
    latency: Mutex<Duration>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            collection: Mutex::new(None),
            latency: Mutex::new(Duration::ZERO),
        }
    }

    /// Copies out every stored document, in storage order.
    pub async fn documents(&self) -> Result<Vec<Record>> {
        self.with_collection(|c| c.docs.clone()).await
    }

    pub async fn has_id_index(&self) -> Result<bool> {
        self.with_collection(|c| c.id_index).await
    }

    async fn with_collection<T>(&self, f: impl FnOnce(&mut Collection) -> T) -> Result<T> {
        let mut guard = self.collection.lock().await;
        let collection = guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("memory sink not connected"))?;
        Ok(f(collection))
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl DocumentSink for MemorySink {
    async fn setup(&self, params: &ConnectionParams) -> Result<()> {
        self.connect(&ConnectionParams {
            uri: MemorySinkFactory.default_uri().to_string(),
            ..params.clone()
        })
        .await
    }

    async fn connect(&self, params: &ConnectionParams) -> Result<()> {
        // `latency_us` slows every call down to mimic a remote server
        if let Some(us) = params.options.get("latency_us") {
            let us: u64 = us
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid latency_us {us:?}: {e}"))?;
            *self.latency.lock().await = Duration::from_micros(us);
        }
        let name = format!("{}.{}", params.database, params.collection);
        tracing::debug!(namespace = %name, "memory sink connected");
        let mut guard = self.collection.lock().await;
        *guard = Some(Collection {
            name,
            ..Default::default()
        });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.collection.lock().await;
        if let Some(c) = guard.take() {
            tracing::debug!(
                namespace = %c.name,
                documents = c.docs.len(),
                "memory sink closed"
            );
        }
        Ok(())
    }

    async fn prepare(&self, opts: &PrepareOptions) -> Result<()> {
        self.with_collection(|c| {
            if opts.drop_collection {
                c.docs.clear();
                c.id_index = false;
            }
            if opts.index_ids {
                c.id_index = true;
            }
        })
        .await
    }

    async fn insert_one(&self, record: Record) -> Result<()> {
        self.simulate_latency().await;
        self.with_collection(|c| c.insert(record)).await?;
        Ok(())
    }

    async fn update_one(
        &self,
        filter: KeyFilter,
        update: RecordUpdate,
        upsert: bool,
    ) -> Result<()> {
        self.simulate_latency().await;
        self.with_collection(|c| c.update(filter, update, upsert)).await?;
        Ok(())
    }

    async fn replace_one(
        &self,
        filter: KeyFilter,
        document: Record,
        upsert: bool,
    ) -> Result<()> {
        self.simulate_latency().await;
        self.with_collection(|c| c.replace(filter, document, upsert)).await?;
        Ok(())
    }

    async fn bulk_write(&self, batch: Vec<WriteIntent>) -> Result<BulkWriteSummary> {
        self.simulate_latency().await;
        self.with_collection(|c| {
            let mut summary = BulkWriteSummary::default();
            for intent in batch {
                match c.apply(intent) {
                    Applied::Inserted => summary.inserted += 1,
                    Applied::Matched { modified } => {
                        summary.matched += 1;
                        if modified {
                            summary.modified += 1;
                        }
                    }
                    Applied::Upserted => summary.upserted += 1,
                    Applied::Missed => {}
                }
            }
            summary
        })
        .await
    }

    async fn ping(&self) -> Result<Duration> {
        let t0 = Instant::now();
        self.with_collection(|_| ()).await?;
        Ok(t0.elapsed())
    }
}

pub struct MemorySinkFactory;

impl SinkFactory for MemorySinkFactory {
    fn name(&self) -> &'static str {
        "memory"
    }
    fn default_uri(&self) -> &'static str {
        "memory://"
    }
    fn create(&self) -> Box<dyn DocumentSink> {
        Box::new(MemorySink::new())
    }
}
