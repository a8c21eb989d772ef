use mongodb_sink::MongoDbSink;
use soak_core::sink::{ConnectionParams, DocumentSink, PrepareOptions};
use soak_core::{run_workload, ReportFormat, Reporter, WorkloadConfig, WriteMode};

fn params(collection: &str) -> ConnectionParams {
    ConnectionParams {
        uri: String::new(),
        database: "dbsoak".to_string(),
        collection: collection.to_string(),
        options: Default::default(),
    }
}

async fn managed(collection: &str) -> MongoDbSink {
    let sink = MongoDbSink::new();
    sink.setup(&params(collection)).await.unwrap();
    sink.prepare(&PrepareOptions {
        drop_collection: true,
        index_ids: true,
    })
    .await
    .unwrap();
    sink
}

#[tokio::test]
#[ignore = "requires docker"]
async fn batched_inserts() {
    let sink = managed("inserts").await;
    let mut reporter = Reporter::new(Vec::new(), ReportFormat::Text);

    let outcome = run_workload(&sink, WorkloadConfig::new(WriteMode::Insert, 10, 5), &mut reporter)
        .await
        .unwrap();

    assert_eq!(outcome.flushes, 2);
    assert_eq!(outcome.counters.inserted, 10);
    assert_eq!(outcome.counters.modified, 0);
    sink.teardown().await.unwrap();
}

#[tokio::test]
#[ignore = "requires docker"]
async fn batched_upserts_contend_on_wrapped_ids() {
    let sink = managed("upserts").await;
    let mut reporter = Reporter::new(Vec::new(), ReportFormat::Text);

    let outcome = run_workload(&sink, WorkloadConfig::new(WriteMode::Upsert, 2000, 100), &mut reporter)
        .await
        .unwrap();

    assert_eq!(outcome.flushes, 20);
    assert_eq!(outcome.counters.inserted, 0);
    assert_eq!(outcome.counters.upserted, 1000);
    assert_eq!(outcome.counters.modified, 1000);
    sink.teardown().await.unwrap();
}

#[tokio::test]
#[ignore = "requires docker"]
async fn single_replaces_and_ping() {
    let sink = managed("replaces").await;
    let mut reporter = Reporter::new(Vec::new(), ReportFormat::Text);

    let outcome = run_workload(&sink, WorkloadConfig::new(WriteMode::Replace, 1500, 0), &mut reporter)
        .await
        .unwrap();

    assert_eq!(outcome.single_writes, 1500);
    assert_eq!(outcome.counters.modified, 0);

    let latency = sink.ping().await.unwrap();
    assert!(latency.as_millis() < 5000);
    sink.teardown().await.unwrap();
}

#[tokio::test]
async fn writes_without_connection_fail() {
    let sink = MongoDbSink::new();
    let mut reporter = Reporter::new(Vec::new(), ReportFormat::Text);

    let err = run_workload(&sink, WorkloadConfig::new(WriteMode::Insert, 10, 5), &mut reporter)
        .await
        .unwrap_err();
    assert!(format!("{:#}", anyhow::Error::from(err)).contains("not connected"));
}
