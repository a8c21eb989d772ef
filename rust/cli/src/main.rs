use anyhow::Result;
use clap::{Parser, ValueEnum};
use soak_core::sink::{ConnectionParams, DocumentSink, PrepareOptions, SinkFactory};
use soak_core::{run_workload, ReportFormat, Reporter, SoakError, WorkloadConfig};
use tokio::runtime::Builder;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "dbsoak",
    version,
    allow_negative_numbers = true,
    about = "Write-throughput soak test for a document database",
    after_help = "TOKENS (any order): inserts|upserts|replaces sets the mode, \
                  a number above 1000 sets the record count, any other number \
                  sets the batch size (0 writes one record at a time)."
)]
struct Cli {
    /// Mode and sizing tokens, e.g. `upserts 2000000 100`
    tokens: Vec<String>,
    /// Sink to write to
    #[arg(long, default_value = "mongodb")]
    store: String,
    /// Connection URI (defaults per sink)
    #[arg(long, env = "MONGODB")]
    uri: Option<String>,
    #[arg(long, default_value = "dbsoak")]
    database: String,
    #[arg(long, default_value = "rust")]
    collection: String,
    /// Optional sink-specific key=value options (repeatable)
    #[arg(long, value_parser = parse_key_val::<String, String>)]
    option: Vec<(String, String)>,
    /// Drop the collection before writing
    #[arg(long)]
    drop: bool,
    /// Create an index on `myid` before writing
    #[arg(long)]
    index: bool,
    /// Start a throwaway server for the run instead of connecting to --uri
    #[arg(long)]
    managed: bool,
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
    #[arg(long, default_value = "info")]
    log: String,
    /// List available sinks and exit
    #[arg(long)]
    list_stores: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Format {
    Text,
    Json,
}

impl From<Format> for ReportFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Text => ReportFormat::Text,
            Format::Json => ReportFormat::Json,
        }
    }
}

fn parse_key_val<K, V>(s: &str) -> std::result::Result<(K, V), String>
where
    K: std::str::FromStr,
    V: std::str::FromStr,
{
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` in `{s}`"))?;
    let key = key.parse().map_err(|_| format!("invalid key: {key}"))?;
    let value = value.parse().map_err(|_| format!("invalid value: {value}"))?;
    Ok((key, value))
}

fn sink_factories() -> Vec<Box<dyn SinkFactory>> {
    vec![
        Box::new(mongodb_sink::MongoDbFactory),
        Box::new(memory_sink::MemorySinkFactory),
    ]
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries the progress lines
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::new(&cli.log).add_directive("mongodb::connection=off".parse()?),
        )
        .init();

    let factories = sink_factories();
    if cli.list_stores {
        for f in &factories {
            println!("{}", f.name());
        }
        return Ok(());
    }

    let config = WorkloadConfig::from_tokens(&cli.tokens)?;
    let store = cli.store.to_lowercase();
    let factory = factories
        .iter()
        .find(|f| f.name() == store)
        .ok_or_else(|| anyhow::anyhow!("unknown store: {store}"))?;

    let params = ConnectionParams {
        uri: cli
            .uri
            .clone()
            .unwrap_or_else(|| factory.default_uri().to_string()),
        database: cli.database.clone(),
        collection: cli.collection.clone(),
        options: cli.option.iter().cloned().collect(),
    };
    let prepare = PrepareOptions {
        drop_collection: cli.drop,
        index_ids: cli.index,
    };
    let sink = factory.create();

    let rt = Builder::new_current_thread().enable_all().build()?;
    rt.block_on(soak(
        sink.as_ref(),
        &store,
        &params,
        prepare,
        config,
        cli.managed,
        cli.format.into(),
    ))
}

async fn soak(
    sink: &dyn DocumentSink,
    store: &str,
    params: &ConnectionParams,
    prepare: PrepareOptions,
    config: WorkloadConfig,
    managed: bool,
    format: ReportFormat,
) -> Result<()> {
    let connected = if managed {
        sink.setup(params).await
    } else {
        sink.connect(params).await
    };
    connected.map_err(|source| SoakError::Connection {
        store: store.to_string(),
        source,
    })?;
    info!(
        store,
        database = %params.database,
        collection = %params.collection,
        managed,
        "connected"
    );

    let mut reporter = Reporter::stdout(format);
    let outcome = match sink.prepare(&prepare).await {
        Ok(()) => run_workload(sink, config, &mut reporter)
            .await
            .map_err(anyhow::Error::from),
        Err(e) => Err(e),
    };

    // Release the connection whether or not the run succeeded.
    let closed = if managed {
        sink.teardown().await
    } else {
        sink.close().await
    };
    let outcome = outcome?;
    closed?;

    let latency = &outcome.write_latency;
    info!(
        calls = latency.samples,
        p50_ms = latency.p50_ms,
        p95_ms = latency.p95_ms,
        p99_ms = latency.p99_ms,
        p999_ms = latency.p999_ms,
        max_ms = latency.max_ms,
        "write latency"
    );
    if let ReportFormat::Json = format {
        println!("{}", serde_json::to_string(&outcome)?);
    }
    Ok(())
}
