use anyhow::{Context, Result};
use async_trait::async_trait;
use mongodb::bson::{doc, DateTime as BsonDateTime, Document};
use mongodb::options::{
    ClientOptions, InsertOneModel, ReplaceOneModel, UpdateOneModel, WriteModel,
};
use mongodb::{Client, Collection, IndexModel, Namespace};
use soak_core::sink::{BulkWriteSummary, ConnectionParams, DocumentSink, PrepareOptions};
use soak_core::{KeyFilter, Record, RecordUpdate, SinkFactory, WriteIntent};
use soak_testcontainers::mongodb::{MongoDb, MONGODB_PORT};
use std::sync::Arc;
use std::time::Instant;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_URI: &str = "mongodb://127.0.0.1:27017";
const APP_NAME: &str = "dbsoak";

#[derive(Clone)]
struct Connection {
    client: Client,
    collection: Collection<Document>,
}

pub struct MongoDbSink {
    conn: Arc<Mutex<Option<Connection>>>,
    container: Arc<Mutex<Option<ContainerAsync<MongoDb>>>>,
}

impl Default for MongoDbSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MongoDbSink {
    pub fn new() -> Self {
        Self {
            conn: Arc::new(Mutex::new(None)),
            container: Arc::new(Mutex::new(None)),
        }
    }

    async fn connection(&self) -> Result<Connection> {
        let guard = self.conn.lock().await;
        guard
            .clone()
            .ok_or_else(|| anyhow::anyhow!("MongoDB client not connected"))
    }
}

pub fn record_document(record: &Record) -> Result<Document> {
    let id = i32::try_from(record.id)?;
    let value = i64::try_from(record.value)?;
    let timestamp = BsonDateTime::from_millis(record.timestamp.timestamp_millis());
    Ok(doc! { "myid": id, "myval": value, "timestamp": timestamp })
}

pub fn filter_document(filter: KeyFilter) -> Result<Document> {
    let id = i32::try_from(filter.id)?;
    Ok(doc! { "myid": id })
}

/// `$set` of value and timestamp; the id stays the match key.
pub fn update_document(update: &RecordUpdate) -> Result<Document> {
    let value = i64::try_from(update.value)?;
    let timestamp = BsonDateTime::from_millis(update.timestamp.timestamp_millis());
    Ok(doc! { "$set": { "myval": value, "timestamp": timestamp } })
}

fn write_model(ns: &Namespace, intent: WriteIntent) -> Result<WriteModel> {
    let model = match intent {
        WriteIntent::Insert(record) => WriteModel::InsertOne(
            InsertOneModel::builder()
                .namespace(ns.clone())
                .document(record_document(&record)?)
                .build(),
        ),
        WriteIntent::Upsert { filter, update } => WriteModel::UpdateOne(
            UpdateOneModel::builder()
                .namespace(ns.clone())
                .filter(filter_document(filter)?)
                .update(update_document(&update)?)
                .upsert(true)
                .build(),
        ),
        WriteIntent::Replace { filter, document } => WriteModel::ReplaceOne(
            ReplaceOneModel::builder()
                .namespace(ns.clone())
                .filter(filter_document(filter)?)
                .replacement(record_document(&document)?)
                .upsert(true)
                .build(),
        ),
    };
    Ok(model)
}

fn count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

#[async_trait]
impl DocumentSink for MongoDbSink {
    async fn setup(&self, params: &ConnectionParams) -> Result<()> {
        let container = MongoDb::default().start().await?;
        let host_port = container.get_host_port_ipv4(MONGODB_PORT).await?;
        let uri = format!("mongodb://127.0.0.1:{host_port}/?directConnection=true");
        info!(%uri, "started MongoDB container");

        let mut container_guard = self.container.lock().await;
        *container_guard = Some(container);
        drop(container_guard);

        let mut params = ConnectionParams {
            uri,
            ..params.clone()
        };
        params
            .options
            .entry("server_selection_timeout_ms".to_string())
            .or_insert_with(|| "2000".to_string());
        for _ in 0..60 {
            // Fresh client per attempt so a refused connection isn't cached.
            if self.connect(&params).await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        anyhow::bail!("MongoDB container did not become ready within 60s")
    }

    async fn teardown(&self) -> Result<()> {
        self.close().await?;
        let container = {
            let mut guard = self.container.lock().await;
            guard.take()
        };
        if let Some(c) = container {
            c.stop().await?;
            drop(c);
        }
        Ok(())
    }

    async fn connect(&self, params: &ConnectionParams) -> Result<()> {
        let uri = if params.uri.is_empty() {
            DEFAULT_URI
        } else {
            params.uri.as_str()
        };
        let mut options = ClientOptions::parse(uri)
            .await
            .with_context(|| format!("invalid MongoDB uri {uri:?}"))?;
        if let Some(ms) = params.options.get("server_selection_timeout_ms") {
            options.server_selection_timeout = Some(Duration::from_millis(ms.parse()?));
        }
        options.app_name = Some(APP_NAME.to_string());

        let client = Client::with_options(options)?;
        // Fail here rather than on the first write.
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        let collection = client
            .database(&params.database)
            .collection::<Document>(&params.collection);
        debug!(namespace = %collection.namespace(), "connected to MongoDB");

        let mut guard = self.conn.lock().await;
        *guard = Some(Connection { client, collection });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let conn = {
            let mut guard = self.conn.lock().await;
            guard.take()
        };
        if let Some(conn) = conn {
            conn.client.shutdown().await;
        }
        Ok(())
    }

    async fn prepare(&self, opts: &PrepareOptions) -> Result<()> {
        let conn = self.connection().await?;
        if opts.drop_collection {
            conn.collection.drop().await?;
            info!(namespace = %conn.collection.namespace(), "dropped collection");
        }
        if opts.index_ids {
            let index = IndexModel::builder().keys(doc! { "myid": 1 }).build();
            conn.collection.create_index(index).await?;
            info!(namespace = %conn.collection.namespace(), "ensured index on myid");
        }
        Ok(())
    }

    async fn insert_one(&self, record: Record) -> Result<()> {
        let conn = self.connection().await?;
        conn.collection.insert_one(record_document(&record)?).await?;
        Ok(())
    }

    async fn update_one(
        &self,
        filter: KeyFilter,
        update: RecordUpdate,
        upsert: bool,
    ) -> Result<()> {
        let conn = self.connection().await?;
        conn.collection
            .update_one(filter_document(filter)?, update_document(&update)?)
            .upsert(upsert)
            .await?;
        Ok(())
    }

    async fn replace_one(
        &self,
        filter: KeyFilter,
        document: Record,
        upsert: bool,
    ) -> Result<()> {
        let conn = self.connection().await?;
        conn.collection
            .replace_one(filter_document(filter)?, record_document(&document)?)
            .upsert(upsert)
            .await?;
        Ok(())
    }

    async fn bulk_write(&self, batch: Vec<WriteIntent>) -> Result<BulkWriteSummary> {
        if batch.is_empty() {
            return Ok(BulkWriteSummary::default());
        }
        let conn = self.connection().await?;
        let ns = conn.collection.namespace();
        let models = batch
            .into_iter()
            .map(|intent| write_model(&ns, intent))
            .collect::<Result<Vec<_>>>()?;

        let res = conn.client.bulk_write(models).ordered(true).await?;
        Ok(BulkWriteSummary {
            inserted: count(res.inserted_count),
            matched: count(res.matched_count),
            modified: count(res.modified_count),
            upserted: count(res.upserted_count),
        })
    }

    async fn ping(&self) -> Result<Duration> {
        let conn = self.connection().await?;
        let t0 = Instant::now();
        conn.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(t0.elapsed())
    }
}

pub struct MongoDbFactory;

impl SinkFactory for MongoDbFactory {
    fn name(&self) -> &'static str {
        "mongodb"
    }
    fn default_uri(&self) -> &'static str {
        DEFAULT_URI
    }
    fn create(&self) -> Box<dyn DocumentSink> {
        Box::new(MongoDbSink::new())
    }
}
