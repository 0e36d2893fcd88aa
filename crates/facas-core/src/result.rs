//! The published analysis result (`§3`, `§6`).

use serde::{Deserialize, Serialize};

use crate::corteseco::CorteSecoPair;
use crate::metrics::Metrics;
use crate::serrilha::SerrilhaSummary;

/// Upload outcome for the rendered preview (`§3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Uploaded,
    Exists,
    Skipped,
    Disabled,
    Failed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub dpi: f64,
    pub content_type: String,
    pub payload_size: u64,
    pub payload_checksum: String,
    pub bucket: Option<String>,
    pub key: Option<String>,
    pub uri: Option<String>,
    pub upload_status: UploadStatus,
    pub upload_timestamp: Option<String>,
    pub etag: Option<String>,
    pub message: Option<String>,
}

/// The full per-analysis result entity (`§3`), serialized as the message
/// bus payload and the cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub analysis_id: String,
    pub timestamp_utc: String,
    pub op_id: Option<String>,
    pub file_name: String,
    pub file_fingerprint: String,
    pub metrics: Option<Metrics>,
    pub serrilha: Option<SerrilhaSummary>,
    pub corte_seco_pairs: Vec<CorteSecoPair>,
    pub image: Option<ImageMetadata>,
    pub score: Option<f64>,
    pub explanations: Vec<String>,
    pub engine_version: String,
    pub duration_ms: u64,
    pub shadow_mode: bool,
    pub flags: Option<serde_json::Value>,
}

impl AnalysisResult {
    /// Build a failure result carrying the error-kind token in
    /// `explanations[0]` (`§6`).
    pub fn failure(
        analysis_id: String,
        timestamp_utc: String,
        op_id: Option<String>,
        file_name: String,
        file_fingerprint: String,
        error_kind: &str,
        engine_version: String,
        duration_ms: u64,
        shadow_mode: bool,
        flags: Option<serde_json::Value>,
    ) -> Self {
        AnalysisResult {
            analysis_id,
            timestamp_utc,
            op_id,
            file_name,
            file_fingerprint,
            metrics: None,
            serrilha: None,
            corte_seco_pairs: vec![],
            image: None,
            score: None,
            explanations: vec![error_kind.to_string()],
            engine_version,
            duration_ms,
            shadow_mode,
            flags,
        }
    }
}
