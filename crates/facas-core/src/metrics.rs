//! Aggregate metrics emitted per analysis (`§3`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::SemanticType;
use crate::geometry::bounding_box::Extents;

/// Per-layer running totals, resolved once extraction finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerStats {
    pub layer: String,
    pub semantic_type: SemanticType,
    pub entity_count: u64,
    pub total_length: f64,
    pub closed_loop_count: u64,
}

/// Per-entity-kind counts (`§3`).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EntityKindCounts {
    pub lines: u64,
    pub arcs: u64,
    pub circles: u64,
    pub polylines_2d: u64,
    pub polylines_3d: u64,
    pub splines: u64,
    pub ellipses: u64,
    pub inserts: u64,
    pub texts: u64,
    pub mtexts: u64,
}

/// Preprocessor + extractor quality counters (`§4.2`, `§4.3`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityRecord {
    pub tiny_gaps: u64,
    pub overlap_duplicates: u64,
    pub dangling_ends: u64,
    pub closed_loops_by_type: HashMap<SemanticType, u64>,
    pub closed_loop_density: f64,
    pub delicate_arc_count: u64,
    pub delicate_arc_length: f64,
    pub delicate_arc_density: f64,
    pub notes: Vec<String>,
    pub special_materials: Vec<String>,
}

impl QualityRecord {
    pub fn total_closed_loops(&self) -> u64 {
        self.closed_loops_by_type.values().sum()
    }
}

/// The full metrics payload published in a [`crate::result::Result`] entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    pub unit_label: String,
    pub extents: Extents,
    pub bbox_area: f64,
    pub bbox_perimeter: f64,
    pub total_cut_length: f64,
    pub total_fold_length: f64,
    pub total_perf_length: f64,
    pub total_three_pt_length: f64,
    pub three_pt_segment_count: u64,
    pub three_pt_cut_ratio: f64,
    pub requires_manual_three_pt_handling: bool,
    pub num_curves: u64,
    pub num_nodes: u64,
    pub num_intersections: u64,
    pub min_arc_radius: Option<f64>,
    pub entity_kind_counts: EntityKindCounts,
    pub layer_stats: Vec<LayerStats>,
    pub quality: QualityRecord,
}

impl Metrics {
    /// Invariant (iii), `§3`.
    pub fn recompute_three_pt_ratio(&mut self) {
        self.three_pt_cut_ratio = if self.total_cut_length > 0.0 {
            self.total_three_pt_length / self.total_cut_length
        } else {
            0.0
        };
        self.requires_manual_three_pt_handling = self.total_three_pt_length > 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_pt_ratio_is_zero_with_no_cut_length() {
        let mut metrics = Metrics {
            unit_label: "mm".into(),
            extents: Extents::zero(),
            bbox_area: 0.0,
            bbox_perimeter: 0.0,
            total_cut_length: 0.0,
            total_fold_length: 0.0,
            total_perf_length: 0.0,
            total_three_pt_length: 12.0,
            three_pt_segment_count: 1,
            three_pt_cut_ratio: 0.0,
            requires_manual_three_pt_handling: false,
            num_curves: 0,
            num_nodes: 0,
            num_intersections: 0,
            min_arc_radius: None,
            entity_kind_counts: EntityKindCounts::default(),
            layer_stats: vec![],
            quality: QualityRecord::default(),
        };
        metrics.recompute_three_pt_ratio();
        assert_eq!(metrics.three_pt_cut_ratio, 0.0);
        assert!(metrics.requires_manual_three_pt_handling);
    }
}
