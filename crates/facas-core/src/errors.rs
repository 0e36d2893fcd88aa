//! Typed errors for the deterministic DXF complexity engine.
//!
//! Each pipeline stage gets its own leaf error; [`EngineError`] composes them
//! so callers can match on stage without inspecting message text.

use thiserror::Error;

/// Errors raised by the unit resolver (`§4.1`).
#[derive(Debug, Error)]
pub enum UnitError {
    #[error("unrecognized default unit: {0}")]
    InvalidUnit(String),
}

/// Errors raised while parsing a CAD document into segments (`§4.3`).
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported cad version: {0}")]
    UnsupportedCadVersion(String),
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse dxf: {0}")]
    Dxf(String),
}

/// Errors raised by the serrilha recognizer (`§4.5`).
#[derive(Debug, Error)]
pub enum SerrilhaError {
    #[error("invalid matcher regex '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Top-level error for the pure `preprocess -> extract -> score` pipeline.
///
/// Rendering, upload and bus errors live in `facas-render`/`facas-worker`
/// since the engine itself never performs I/O beyond reading the document.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Unit(#[from] UnitError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Serrilha(#[from] SerrilhaError),
}

/// The exception-kind name published in `explanations[0]` on failure (`§6`).
///
/// Kept separate from `Display` because the published name is a stable
/// machine-readable token, not a human sentence.
pub trait ErrorKind {
    fn kind_name(&self) -> &'static str;
}

impl ErrorKind for EngineError {
    fn kind_name(&self) -> &'static str {
        match self {
            EngineError::Unit(_) => "invalid_unit",
            EngineError::Extract(ExtractError::UnsupportedCadVersion(_)) => {
                "dxf_version_unsupported"
            }
            EngineError::Extract(_) => "extract_error",
            EngineError::Serrilha(_) => "serrilha_error",
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
