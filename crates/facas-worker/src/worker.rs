//! Analysis worker state machine (`§4.11`, `§5`, `§7`).
//!
//! ```text
//!          ┌─► validate ──► hash ──► cache check ──► (hit) ──► republish ──► ack
//! new msg ─┤                             │
//!          │                             (miss)
//!          │                             ▼
//!          └─► load+preproc+analyze+score ─► render ─► upload ─► publish result ─► cache save ─► ack
//!                             │                      │
//!                             └─► timeout/error ─────┴─► publish failure ─► ack
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use facas_core::config::EngineConfig;
use facas_core::errors::ErrorKind;
use facas_core::hashing::{fingerprint_bytes, fingerprint_to_key_segment};
use facas_core::result::{AnalysisResult, ImageMetadata, UploadStatus};
use tokio::sync::{Mutex, Semaphore};
use tokio::time::timeout;
use tracing::{error, info, instrument, warn};

use crate::bus::{InboundMessage, Publisher};
use crate::cache::ResultCache;
use crate::errors::WorkerError;
use crate::load;
use crate::request::AnalysisRequest;
use crate::storage::{ObjectStore, UploadRequest};

/// Counters and the duration histogram named in `§4.11`.
#[derive(Default)]
pub struct WorkerCounters {
    pub analysis_ok: AtomicU64,
    pub analysis_failed: AtomicU64,
    pub render_failed: AtomicU64,
    pub cache_hit: AtomicU64,
    pub cache_miss: AtomicU64,
    pub serrilha_unknown_symbol: AtomicU64,
    durations_ms: Mutex<Vec<u64>>,
}

impl WorkerCounters {
    async fn record_duration(&self, duration_ms: u64) {
        self.durations_ms.lock().await.push(duration_ms);
    }
}

pub struct AnalysisWorker {
    config: Arc<EngineConfig>,
    cache: ResultCache,
    object_store: Arc<dyn ObjectStore>,
    publisher: Arc<dyn Publisher>,
    semaphore: Arc<Semaphore>,
    inflight: Mutex<HashSet<String>>,
    publish_lock: Mutex<()>,
    pub counters: Arc<WorkerCounters>,
}

impl AnalysisWorker {
    pub fn new(config: Arc<EngineConfig>, object_store: Arc<dyn ObjectStore>, publisher: Arc<dyn Publisher>) -> Self {
        let parallelism = config.parallelism.max(1);
        AnalysisWorker {
            cache: ResultCache::new(PathBuf::from(&config.cache_folder)),
            config,
            object_store,
            publisher,
            semaphore: Arc::new(Semaphore::new(parallelism)),
            inflight: Mutex::new(HashSet::new()),
            publish_lock: Mutex::new(()),
            counters: Arc::new(WorkerCounters::default()),
        }
    }

    /// Consume messages until the channel closes, each under one semaphore
    /// permit (`§5` Scheduling model).
    pub async fn run(self: &Arc<Self>, mut consumer: crate::bus::MessageConsumer) {
        while let Some(message) = consumer.recv().await {
            let worker = Arc::clone(self);
            let permit = match Arc::clone(&worker.semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            tokio::spawn(async move {
                let _permit = permit;
                worker.handle_message(message).await;
            });
        }
    }

    #[instrument(skip(self, message))]
    async fn handle_message(&self, message: InboundMessage) {
        let Some(request) = AnalysisRequest::parse(&message.payload) else {
            warn!("malformed request message");
            self.counters.analysis_failed.fetch_add(1, Ordering::Relaxed);
            let failure = failure_result(None, "unknown", "", WorkerError::InvalidPayload.kind_name(), &self.config.version);
            let _ = self.publish(&failure).await;
            let _ = message.nack_no_requeue().await;
            return;
        };

        if !self.claim_inflight(&request.file_path).await {
            info!(file_path = %request.file_path, "duplicate in-flight analysis suppressed");
            let _ = message.ack().await;
            return;
        }

        let result = self.process(&request).await;
        self.release_inflight(&request.file_path).await;

        let _ = self.publish(&result).await;
        let _ = message.ack().await;
    }

    async fn claim_inflight(&self, path: &str) -> bool {
        self.inflight.lock().await.insert(path.to_string())
    }

    async fn release_inflight(&self, path: &str) {
        self.inflight.lock().await.remove(path);
    }

    /// Run the full pipeline for one request, producing either a success or
    /// failure [`AnalysisResult`]. Never panics; every error path is caught
    /// and turned into a failure result (`§7`).
    #[instrument(skip(self, request), fields(file_path = %request.file_path))]
    pub async fn process(&self, request: &AnalysisRequest) -> AnalysisResult {
        let started = Instant::now();
        let outcome = self.process_inner(request).await;
        let duration_ms = started.elapsed().as_millis() as u64;
        self.counters.record_duration(duration_ms).await;

        match outcome {
            Ok(mut result) => {
                result.duration_ms = duration_ms;
                self.counters.analysis_ok.fetch_add(1, Ordering::Relaxed);
                result
            }
            Err(err) => {
                self.counters.analysis_failed.fetch_add(1, Ordering::Relaxed);
                error!(error = %err, "analysis failed");
                let file_name = Path::new(&request.file_path)
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| request.file_path.clone());
                let mut failure = failure_result(
                    request.op_id.clone(),
                    &file_name,
                    request.file_hash.as_deref().unwrap_or(""),
                    err.kind_name(),
                    &self.config.version,
                );
                failure.duration_ms = duration_ms;
                failure.flags = request.flags.clone();
                failure
            }
        }
    }

    async fn process_inner(&self, request: &AnalysisRequest) -> Result<AnalysisResult, WorkerError> {
        let path = PathBuf::from(&request.file_path);
        if !path.exists() {
            return Err(WorkerError::FileMissing(request.file_path.clone()));
        }

        let bytes = tokio::fs::read(&path).await.map_err(|e| WorkerError::FileMissing(e.to_string()))?;
        let fingerprint = request.file_hash.clone().unwrap_or_else(|| fingerprint_bytes(&bytes));
        let file_name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();

        if !self.config.reprocess_same_hash {
            if let Some(cached) = self.cache.lookup(&fingerprint, &self.config.version, self.object_store.as_ref()).await {
                self.counters.cache_hit.fetch_add(1, Ordering::Relaxed);
                return Ok(republish(cached, request.op_id.clone()));
            }
        }
        self.counters.cache_miss.fetch_add(1, Ordering::Relaxed);

        let parse_timeout = Duration::from_millis(self.config.parse_timeout_ms);
        let config = Arc::clone(&self.config);
        let path_for_load = path.clone();
        let analyzed = timeout(parse_timeout, async move {
            let document = load::load_document(&path_for_load)?;
            facas_core::analyze(&document, &config).map_err(WorkerError::from)
        })
        .await
        .map_err(|_| WorkerError::TimeoutExceeded(self.config.parse_timeout_ms))??;

        for unknown in &analyzed.serrilha.unknown_symbols {
            warn!(symbol = %unknown, "unrecognized serrilha symbol");
            self.counters.serrilha_unknown_symbol.fetch_add(1, Ordering::Relaxed);
        }

        let render_timeout = Duration::from_millis(self.config.render_timeout_ms);
        let image = match timeout(render_timeout, self.render_and_upload(&fingerprint, &file_name, &analyzed)).await {
            Ok(Ok(image)) => Some(image),
            Ok(Err(e)) => {
                warn!(error = %e, "render/upload failed, publishing without image");
                self.counters.render_failed.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(_) => {
                warn!("render/upload timed out, publishing without image");
                self.counters.render_failed.fetch_add(1, Ordering::Relaxed);
                None
            }
        };

        let result = AnalysisResult {
            analysis_id: uuid::Uuid::new_v4().to_string(),
            timestamp_utc: chrono::Utc::now().to_rfc3339(),
            op_id: request.op_id.clone(),
            file_name,
            file_fingerprint: fingerprint.clone(),
            metrics: Some(analyzed.metrics),
            serrilha: Some(analyzed.serrilha),
            corte_seco_pairs: analyzed.corte_seco.pairs,
            image,
            score: Some(analyzed.score.score),
            explanations: analyzed.score.explanations,
            engine_version: self.config.version.clone(),
            duration_ms: 0,
            shadow_mode: self.config.shadow_mode,
            flags: request.flags.clone(),
        };

        self.cache.save(&fingerprint, &result).await?;
        Ok(result)
    }

    async fn render_and_upload(
        &self,
        fingerprint: &str,
        file_name: &str,
        analyzed: &facas_core::AnalysisOutput,
    ) -> Result<ImageMetadata, WorkerError> {
        let rendered = facas_render::render(
            &analyzed.segments,
            &analyzed.semantic_by_layer,
            &analyzed.metrics.extents,
            file_name,
            Some(analyzed.score.score),
            self.config.image_dpi,
            self.config.image_padding,
        )?;

        let checksum = fingerprint_bytes(&rendered.png_bytes);
        let key = format!(
            "{}/{}.png",
            fingerprint_to_key_segment(fingerprint),
            sanitize(file_name)
        );
        let storage = &self.config.image_storage;

        if storage.skip_if_exists && self.object_store.exists(&storage.bucket, &key).await.unwrap_or(false) {
            return Ok(ImageMetadata {
                width: rendered.width,
                height: rendered.height,
                dpi: rendered.dpi,
                content_type: "image/png".into(),
                payload_size: rendered.png_bytes.len() as u64,
                payload_checksum: checksum,
                bucket: Some(storage.bucket.clone()),
                key: Some(key),
                uri: None,
                upload_status: UploadStatus::Exists,
                upload_timestamp: None,
                etag: None,
                message: None,
            });
        }

        let upload = self
            .object_store
            .upload(UploadRequest {
                bucket: storage.bucket.clone(),
                key: key.clone(),
                bytes: rendered.png_bytes.clone(),
                content_type: "image/png".into(),
            })
            .await;

        let (status, uri, etag, message) = match upload {
            Ok(result) => (UploadStatus::Uploaded, Some(result.uri), Some(result.etag), None),
            Err(e) => (UploadStatus::Failed, None, None, Some(e.to_string())),
        };

        Ok(ImageMetadata {
            width: rendered.width,
            height: rendered.height,
            dpi: rendered.dpi,
            content_type: "image/png".into(),
            payload_size: rendered.png_bytes.len() as u64,
            payload_checksum: checksum,
            bucket: Some(storage.bucket.clone()),
            key: Some(key),
            uri,
            upload_status: status,
            upload_timestamp: Some(chrono::Utc::now().to_rfc3339()),
            etag,
            message,
        })
    }

    /// Publishes under the shared lock (`§5` Shared resources): only the
    /// serialize+publish call is guarded, nothing else.
    async fn publish(&self, result: &AnalysisResult) -> Result<(), WorkerError> {
        let payload = serde_json::to_vec(result).map_err(|e| WorkerError::Cache(e.into()))?;
        let _guard = self.publish_lock.lock().await;
        self.publisher
            .publish(&self.config.rabbit_queue_result, payload)
            .await
            .map_err(WorkerError::from)
    }
}

fn sanitize(name: &str) -> String {
    name.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect()
}

fn republish(cached: AnalysisResult, op_id: Option<String>) -> AnalysisResult {
    AnalysisResult {
        analysis_id: uuid::Uuid::new_v4().to_string(),
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        op_id: op_id.or(cached.op_id),
        duration_ms: 0,
        ..cached
    }
}

fn failure_result(op_id: Option<String>, file_name: &str, fingerprint: &str, error_kind: &str, engine_version: &str) -> AnalysisResult {
    AnalysisResult::failure(
        uuid::Uuid::new_v4().to_string(),
        chrono::Utc::now().to_rfc3339(),
        op_id,
        file_name.to_string(),
        fingerprint.to_string(),
        error_kind,
        engine_version.to_string(),
        0,
        false,
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InMemoryBus;
    use crate::storage::NullObjectStore;

    #[tokio::test]
    async fn missing_file_publishes_file_not_found() {
        let config = Arc::new(EngineConfig::default());
        let bus = Arc::new(InMemoryBus::new());
        let worker = AnalysisWorker::new(config, Arc::new(NullObjectStore), bus.clone());

        let request = AnalysisRequest { op_id: None, file_path: "/nonexistent/part.dxf".into(), file_hash: None, flags: None, meta: None };
        let result = worker.process(&request).await;
        assert_eq!(result.explanations.first().map(String::as_str), Some("file_not_found"));
        assert!(result.score.is_none());
    }

    #[tokio::test]
    async fn duplicate_inflight_claim_is_rejected_then_released() {
        let config = Arc::new(EngineConfig::default());
        let bus = Arc::new(InMemoryBus::new());
        let worker = AnalysisWorker::new(config, Arc::new(NullObjectStore), bus);

        assert!(worker.claim_inflight("/a/b.dxf").await);
        assert!(!worker.claim_inflight("/a/b.dxf").await);
        worker.release_inflight("/a/b.dxf").await;
        assert!(worker.claim_inflight("/a/b.dxf").await);
    }
}
