//! Request message shape (`§6`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    #[serde(default)]
    pub op_id: Option<String>,
    pub file_path: String,
    #[serde(default)]
    pub file_hash: Option<String>,
    #[serde(default)]
    pub flags: Option<serde_json::Value>,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

impl AnalysisRequest {
    pub fn parse(body: &[u8]) -> Option<Self> {
        let request: Self = serde_json::from_slice(body).ok()?;
        if request.file_path.trim().is_empty() {
            return None;
        }
        Some(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_file_path() {
        let body = br#"{"opId": "NR1"}"#;
        assert!(AnalysisRequest::parse(body).is_none());
    }

    #[test]
    fn parses_minimal_request() {
        let body = br#"{"filePath": "/tmp/part.dxf"}"#;
        let request = AnalysisRequest::parse(body).unwrap();
        assert_eq!(request.file_path, "/tmp/part.dxf");
        assert!(request.op_id.is_none());
    }
}
