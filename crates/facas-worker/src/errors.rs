//! Worker-level error hierarchy (`§7`, AMBIENT STACK).
//!
//! [`facas_core::errors::EngineError`] covers the pure pipeline; everything
//! effectful (storage, cache, bus, rendering) gets its own leaf error here,
//! composed into [`WorkerError`]. `anyhow::Context` is reserved for the
//! message-handling boundary in `worker.rs`, never for these typed leaves.

use thiserror::Error;

use facas_core::errors::{EngineError, ErrorKind};
use facas_render::RenderError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object store upload failed: {0}")]
    Upload(String),
    #[error("object store probe failed: {0}")]
    Probe(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to read cache entry: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to deserialize cache entry: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to connect to message bus: {0}")]
    Connect(String),
    #[error("failed to publish message: {0}")]
    Publish(String),
    #[error("failed to consume message: {0}")]
    Consume(String),
}

/// Errors surfaced to the outer message-handling loop (`§7`).
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("message body is not valid json or lacks filePath")]
    InvalidPayload,
    #[error("file not found: {0}")]
    FileMissing(String),
    #[error("unsupported cad version: {0}")]
    UnsupportedCadVersion(String),
    #[error("stage timed out after {0}ms")]
    TimeoutExceeded(u64),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl ErrorKind for WorkerError {
    fn kind_name(&self) -> &'static str {
        match self {
            WorkerError::InvalidPayload => "invalid_payload",
            WorkerError::FileMissing(_) => "file_not_found",
            WorkerError::UnsupportedCadVersion(_) => "dxf_version_unsupported",
            WorkerError::TimeoutExceeded(_) => "parse_timeout",
            WorkerError::Engine(e) => e.kind_name(),
            WorkerError::Storage(_) => "upload_failed",
            WorkerError::Cache(_) => "cache_corruption",
            WorkerError::Bus(_) => "bus_error",
            WorkerError::Render(_) => "render_failed",
        }
    }
}
