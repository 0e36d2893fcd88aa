//! Content-addressed result cache (`§4.10`).
//!
//! One file per fingerprint under `cache_folder`, named
//! `{fingerprintWithColonReplaced}.analysis.json`. A deserialization
//! failure or a version mismatch is treated as a miss, never an error
//! (`§7`, `CacheCorruption`).

use std::path::{Path, PathBuf};

use facas_core::hashing::fingerprint_to_key_segment;
use facas_core::result::AnalysisResult;
use tracing::{debug, warn};

use crate::errors::CacheError;
use crate::storage::ObjectStore;

pub struct ResultCache {
    root: PathBuf,
}

impl ResultCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ResultCache { root: root.into() }
    }

    fn path_for(&self, fingerprint: &str) -> PathBuf {
        self.root.join(format!("{}.analysis.json", fingerprint_to_key_segment(fingerprint)))
    }

    /// Look up a cached result, validating it against `engine_version` and,
    /// for remotely-stored images, probing the object store (`§4.10`).
    /// Any validation failure is a miss, not an error.
    pub async fn lookup(
        &self,
        fingerprint: &str,
        engine_version: &str,
        object_store: &dyn ObjectStore,
    ) -> Option<AnalysisResult> {
        let path = self.path_for(fingerprint);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(error = %e, "cache read failed, treating as miss");
                return None;
            }
        };

        let cached: AnalysisResult = match serde_json::from_slice(&bytes) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "cache entry corrupt, treating as miss");
                return None;
            }
        };

        if cached.engine_version != engine_version {
            debug!(cached_version = %cached.engine_version, current_version = %engine_version, "cache entry stale, treating as miss");
            return None;
        }

        if let Some(image) = &cached.image {
            if image.payload_checksum.is_empty() || image.payload_size == 0 {
                return None;
            }
            if let (Some(bucket), Some(key)) = (&image.bucket, &image.key) {
                match object_store.exists(bucket, key).await {
                    Ok(true) => {}
                    _ => return None,
                }
            }
        }

        Some(cached)
    }

    /// Persist the last published result for `fingerprint`. Concurrent
    /// writers for the same fingerprint overwrite idempotently; readers
    /// tolerate a torn write by treating deserialization failure as a miss.
    pub async fn save(&self, fingerprint: &str, result: &AnalysisResult) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.path_for(fingerprint);
        let bytes = serde_json::to_vec_pretty(result)?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NullObjectStore;

    fn sample_result(engine_version: &str) -> AnalysisResult {
        AnalysisResult {
            analysis_id: "id-1".into(),
            timestamp_utc: "2026-01-01T00:00:00Z".into(),
            op_id: None,
            file_name: "part.dxf".into(),
            file_fingerprint: "sha256:abc".into(),
            metrics: None,
            serrilha: None,
            corte_seco_pairs: vec![],
            image: None,
            score: Some(1.0),
            explanations: vec![],
            engine_version: engine_version.into(),
            duration_ms: 10,
            shadow_mode: false,
            flags: None,
        }
    }

    #[tokio::test]
    async fn miss_when_nothing_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path());
        let store = NullObjectStore;
        assert!(cache.lookup("sha256:abc", "0.1.0", &store).await.is_none());
    }

    #[tokio::test]
    async fn hit_after_save_with_matching_version() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path());
        let store = NullObjectStore;
        let result = sample_result("0.1.0");
        cache.save("sha256:abc", &result).await.unwrap();

        let hit = cache.lookup("sha256:abc", "0.1.0", &store).await;
        assert!(hit.is_some());
    }

    #[tokio::test]
    async fn version_bump_invalidates_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path());
        let store = NullObjectStore;
        cache.save("sha256:abc", &sample_result("0.1.0")).await.unwrap();

        assert!(cache.lookup("sha256:abc", "0.2.0", &store).await.is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path());
        let store = NullObjectStore;
        tokio::fs::write(cache.path_for("sha256:abc"), b"not json").await.unwrap();
        assert!(cache.lookup("sha256:abc", "0.1.0", &store).await.is_none());
    }
}
