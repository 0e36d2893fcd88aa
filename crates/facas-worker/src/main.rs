//! CLI entry point (`§` AMBIENT STACK): `analyze` for one-shot local runs
//! without a broker, `serve` for the long-running queue consumer.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use facas_core::config::{EngineConfig, StorageProvider};
use facas_worker::bus::{InMemoryBus, LapinBus};
use facas_worker::request::AnalysisRequest;
use facas_worker::storage::{FilesystemObjectStore, NullObjectStore, ObjectStore};
use facas_worker::worker::AnalysisWorker;
use tracing::info;

#[derive(Parser)]
#[command(name = "facas-worker", about = "Deterministic DXF die-cutting complexity engine")]
struct Cli {
    /// Path to a TOML configuration file, layered over the built-in defaults.
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a single DXF file locally, without a message broker.
    Analyze {
        file: String,
        #[arg(long)]
        op_id: Option<String>,
    },
    /// Run the long-lived queue consumer against the configured broker.
    Serve {
        #[arg(long, default_value = "amqp://127.0.0.1:5672/%2f")]
        amqp_addr: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Arc::new(facas_worker::config::load(cli.config.as_deref())?);
    facas_worker::telemetry::init(&config.telemetry);

    match cli.command {
        Command::Analyze { file, op_id } => run_analyze(config, file, op_id).await,
        Command::Serve { amqp_addr } => run_serve(config, amqp_addr).await,
    }
}

async fn run_analyze(config: Arc<EngineConfig>, file: String, op_id: Option<String>) -> anyhow::Result<()> {
    let object_store = object_store_for(&config);
    let bus = Arc::new(InMemoryBus::new());
    let worker = AnalysisWorker::new(config, object_store, bus.clone());

    let request = AnalysisRequest { op_id, file_path: file, file_hash: None, flags: None, meta: None };
    let result = worker.process(&request).await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn run_serve(config: Arc<EngineConfig>, amqp_addr: String) -> anyhow::Result<()> {
    let object_store = object_store_for(&config);
    let bus = Arc::new(LapinBus::connect(&amqp_addr, config.parallelism.max(1) as u16).await?);
    let consumer = bus.consume(&config.rabbit_queue_request).await?;

    let worker = Arc::new(AnalysisWorker::new(config, object_store, bus));
    info!("facas-worker serving requests");

    tokio::select! {
        _ = worker.run(consumer) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }
    Ok(())
}

fn object_store_for(config: &EngineConfig) -> Arc<dyn ObjectStore> {
    match config.image_storage.provider {
        StorageProvider::None => Arc::new(NullObjectStore),
        StorageProvider::S3 => Arc::new(FilesystemObjectStore::new(&config.image_storage)),
    }
}
