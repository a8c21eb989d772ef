use chrono::Utc;
use memory_sink::MemorySink;
use soak_core::sink::{ConnectionParams, DocumentSink, PrepareOptions};
use soak_core::{
    run_workload, KeyFilter, RecordUpdate, ReportFormat, Reporter, WorkloadConfig, WriteIntent,
    WriteMode,
};
use std::collections::HashMap;

fn params() -> ConnectionParams {
    ConnectionParams {
        uri: "memory://".to_string(),
        database: "dbsoak".to_string(),
        collection: "test".to_string(),
        options: Default::default(),
    }
}

async fn connected() -> MemorySink {
    let sink = MemorySink::new();
    sink.connect(&params()).await.unwrap();
    sink
}

fn quiet_reporter() -> Reporter<Vec<u8>> {
    Reporter::new(Vec::new(), ReportFormat::Text)
}

#[tokio::test]
async fn batched_inserts_count_every_document() {
    let sink = connected().await;
    let mut reporter = quiet_reporter();

    let outcome = run_workload(&sink, WorkloadConfig::new(WriteMode::Insert, 10, 5), &mut reporter)
        .await
        .unwrap();

    assert_eq!(outcome.counters.inserted, 10);
    assert_eq!(outcome.counters.modified, 0);
    assert_eq!(sink.documents().await.unwrap().len(), 10);
}

#[tokio::test]
async fn unbatched_upserts_overwrite_on_second_pass() {
    let sink = connected().await;
    let mut reporter = quiet_reporter();

    let outcome = run_workload(&sink, WorkloadConfig::new(WriteMode::Upsert, 2000, 0), &mut reporter)
        .await
        .unwrap();

    assert_eq!(outcome.counters.inserted, 0);
    assert_eq!(outcome.counters.modified, 0);
    assert_eq!(outcome.single_writes, 2000);

    let docs = sink.documents().await.unwrap();
    assert_eq!(docs.len(), 1000);
    for doc in docs {
        assert_eq!(doc.value, 1000 + doc.id as u64);
    }
}

#[tokio::test]
async fn batched_upserts_split_between_upserted_and_modified() {
    let sink = connected().await;
    let mut reporter = quiet_reporter();

    let outcome = run_workload(&sink, WorkloadConfig::new(WriteMode::Upsert, 2000, 100), &mut reporter)
        .await
        .unwrap();

    assert_eq!(outcome.flushes, 20);
    assert_eq!(outcome.counters.upserted, 1000);
    assert_eq!(outcome.counters.modified, 1000);
    assert_eq!(outcome.bulk_totals.matched, 1000);
    assert!(outcome.counters.inserted + outcome.counters.modified <= 2000);
}

#[tokio::test]
async fn unbatched_replaces_on_empty_collection_store_nothing() {
    let sink = connected().await;
    let mut reporter = quiet_reporter();

    run_workload(&sink, WorkloadConfig::new(WriteMode::Replace, 1500, 0), &mut reporter)
        .await
        .unwrap();

    assert!(sink.documents().await.unwrap().is_empty());
}

#[tokio::test]
async fn contended_ids_within_one_batch_apply_in_order() {
    let sink = connected().await;
    let now = Utc::now();
    let upsert = |value| WriteIntent::Upsert {
        filter: KeyFilter { id: 5 },
        update: RecordUpdate {
            value,
            timestamp: now,
        },
    };

    let summary = sink
        .bulk_write(vec![upsert(5), upsert(1005), upsert(2005)])
        .await
        .unwrap();

    assert_eq!(summary.upserted, 1);
    assert_eq!(summary.matched, 2);
    assert_eq!(summary.modified, 2);
    let docs = sink.documents().await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].value, 2005);
}

#[tokio::test]
async fn prepare_drops_and_indexes() {
    let sink = connected().await;
    let mut reporter = quiet_reporter();
    run_workload(&sink, WorkloadConfig::new(WriteMode::Insert, 10, 5), &mut reporter)
        .await
        .unwrap();

    sink.prepare(&PrepareOptions {
        drop_collection: true,
        index_ids: true,
    })
    .await
    .unwrap();

    assert!(sink.documents().await.unwrap().is_empty());
    assert!(sink.has_id_index().await.unwrap());
}

#[tokio::test]
async fn writes_fail_once_closed() {
    let sink = connected().await;
    sink.close().await.unwrap();

    let mut reporter = quiet_reporter();
    let err = run_workload(&sink, WorkloadConfig::new(WriteMode::Insert, 10, 0), &mut reporter)
        .await
        .unwrap_err();
    assert!(format!("{:#}", anyhow::Error::from(err)).contains("not connected"));
    assert!(sink.ping().await.is_err());
}

#[tokio::test]
async fn latency_option_must_be_numeric() {
    let sink = MemorySink::new();
    let mut params = params();
    params.options = HashMap::from([("latency_us".to_string(), "fast".to_string())]);
    assert!(sink.connect(&params).await.is_err());

    params.options = HashMap::from([("latency_us".to_string(), "50".to_string())]);
    sink.connect(&params).await.unwrap();
    assert!(sink.ping().await.is_ok());
}
