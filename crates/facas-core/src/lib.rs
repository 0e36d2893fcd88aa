//! Deterministic DXF die-cutting complexity engine.
//!
//! `analyze` is a pure function of `(document, configuration)`: it never
//! performs I/O, so it is exercised directly in tests and wrapped by
//! `facas-worker` for the effectful parts (loading, rendering, publishing).

pub mod config;
pub mod corteseco;
pub mod document;
pub mod errors;
pub mod geometry;
pub mod hashing;
pub mod metrics;
pub mod preprocess;
pub mod result;
pub mod scoring;
pub mod serrilha;
pub mod units;

use std::collections::HashMap;

use regex::Regex;
use tracing::{debug, info};

use config::{EngineConfig, SemanticType};
use corteseco::CorteSecoResult;
use document::Document;
use errors::EngineResult;
use geometry::{extractor, intersections, loops, Segment};
use metrics::Metrics;
use scoring::ScoreOutput;
use serrilha::SerrilhaSummary;

/// Everything `analyze` produces for one document, before the worker adds
/// rendering, storage and message-bus fields to build a full
/// [`result::AnalysisResult`].
pub struct AnalysisOutput {
    pub metrics: Metrics,
    pub serrilha: SerrilhaSummary,
    pub corte_seco: CorteSecoResult,
    pub score: ScoreOutput,
    /// Segments and their resolved semantic types, kept around only so
    /// the worker can feed the renderer without re-extracting geometry.
    pub segments: Vec<Segment>,
    pub semantic_by_layer: HashMap<String, SemanticType>,
}

/// Run the full `preprocess -> extract -> detect -> score` pipeline
/// (`§2`, `§9` Control flow).
pub fn analyze(document: &Document, config: &EngineConfig) -> EngineResult<AnalysisOutput> {
    let resolved_unit = units::resolve_units(&document.declared_units(), &config.default_unit)?;
    debug!(unit = ?resolved_unit.label, "resolved drawing units");

    let quality_pass = preprocess::preprocess(document, &config.tolerances);

    let extraction = extractor::extract(
        document,
        resolved_unit.millimeters_per_unit,
        resolved_unit.label.as_str(),
        config,
    )?;
    let mut metrics = extraction.metrics;
    metrics.quality.tiny_gaps = quality_pass.tiny_gaps;
    metrics.quality.overlap_duplicates = quality_pass.overlap_duplicates;
    metrics.quality.dangling_ends = quality_pass.dangling_ends;
    metrics.quality.special_materials =
        detect_special_materials(document, &config.special_material_layer_mapping);

    let loop_result = loops::detect_loops(
        &extraction.segments,
        &extraction.semantic_by_layer,
        config.tolerances.gap_tolerance,
    );
    metrics.num_nodes = loop_result.num_nodes;
    let (merged_loops, note) = loops::merge_with_floor(&metrics.quality.closed_loops_by_type, loop_result);
    metrics.quality.closed_loops_by_type = merged_loops;
    metrics.quality.notes.push(note);

    metrics.num_intersections = intersections::count_intersections(
        &extraction.segments,
        &metrics.extents,
        config.tolerances.gap_tolerance,
    );

    let mut serrilha_summary =
        serrilha::recognize(document, &config.serrilha, resolved_unit.millimeters_per_unit)?;

    let corte_seco = corteseco::detect(
        &extraction.segments,
        &extraction.semantic_by_layer,
        &serrilha_summary.corte_seco_blade_codes,
        &config.corte_seco,
        config.tolerances.gap_tolerance,
    );
    serrilha_summary.is_corte_seco = corte_seco.is_corte_seco;

    let score = scoring::score(&metrics, &serrilha_summary, &corte_seco, &config.scoring);
    info!(score = score.score, explanations = score.explanations.len(), "analysis scored");

    Ok(AnalysisOutput {
        metrics,
        serrilha: serrilha_summary,
        corte_seco,
        score,
        segments: extraction.segments,
        semantic_by_layer: extraction.semantic_by_layer,
    })
}

fn detect_special_materials(document: &Document, mapping: &HashMap<String, Vec<String>>) -> Vec<String> {
    let mut raw_layers: Vec<&str> = document.entities.iter().map(|e| e.layer()).collect();
    raw_layers.sort_unstable();
    raw_layers.dedup();

    let mut found = Vec::new();
    for (material, patterns) in mapping {
        let compiled: Vec<Regex> = patterns.iter().filter_map(|p| Regex::new(p).ok()).collect();
        if raw_layers.iter().any(|layer| compiled.iter().any(|re| re.is_match(layer))) {
            found.push(material.clone());
        }
    }
    found.sort();
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use document::{Entity, Point2};

    #[test]
    fn simple_line_on_cut_layer_scores_zero() {
        let mut document = Document::default();
        document.entities.push(Entity::Line {
            layer: "corte".into(),
            start: Point2::new(0.0, 0.0),
            end: Point2::new(10.0, 0.0),
        });

        let output = analyze(&document, &EngineConfig::default()).unwrap();
        assert_eq!(output.metrics.total_cut_length, 10.0);
        assert_eq!(output.score.score, 0.0);
        assert!(output.score.explanations.is_empty());
    }

    #[test]
    fn adhesive_layer_is_detected_as_special_material() {
        let mut document = Document::default();
        document.entities.push(Entity::Line {
            layer: "ADESIVO_BASE".into(),
            start: Point2::new(0.0, 0.0),
            end: Point2::new(5.0, 0.0),
        });

        let output = analyze(&document, &EngineConfig::default()).unwrap();
        assert!(output.metrics.quality.special_materials.contains(&"adesivo".to_string()));
        assert!(output.score.score > 0.0);
    }
}
