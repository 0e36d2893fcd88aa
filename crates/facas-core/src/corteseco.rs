//! Dry-cut ("corte seco") heuristic (`§4.6`): parallel, close, overlapping
//! segment pairs on target layers sharing duplicated blade codes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::{CorteSecoConfig, SemanticType};
use crate::document::Point2;
use crate::geometry::segment::Segment;

/// A representative corte-seco pair (`§3`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorteSecoPair {
    pub layer_a: String,
    pub layer_b: String,
    pub semantic_type_a: SemanticType,
    pub semantic_type_b: SemanticType,
    pub overlap_length: f64,
    pub average_offset: f64,
    pub angle_difference_degrees: f64,
}

pub struct CorteSecoResult {
    pub is_corte_seco: bool,
    pub pairs: Vec<CorteSecoPair>,
}

struct Grid {
    cell_size: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl Grid {
    fn cell_range(&self, lo: f64, hi: f64) -> (i64, i64) {
        ((lo / self.cell_size).floor() as i64, (hi / self.cell_size).floor() as i64)
    }

    fn insert(&mut self, idx: usize, seg: &Segment, inflate: f64) {
        let (x0, x1) = self.cell_range(seg.start.x.min(seg.end.x) - inflate, seg.start.x.max(seg.end.x) + inflate);
        let (y0, y1) = self.cell_range(seg.start.y.min(seg.end.y) - inflate, seg.start.y.max(seg.end.y) + inflate);
        for cx in x0..=x1 {
            for cy in y0..=y1 {
                self.cells.entry((cx, cy)).or_default().push(idx);
            }
        }
    }
}

/// Run the heuristic (`§4.6`). `duplicated_blade_codes` must be non-empty
/// or this returns a no-op result (precondition (a)).
pub fn detect(
    segments: &[Segment],
    semantic_by_layer: &HashMap<String, SemanticType>,
    duplicated_blade_codes: &[String],
    config: &CorteSecoConfig,
    gap_tolerance: f64,
) -> CorteSecoResult {
    if !config.enabled || duplicated_blade_codes.is_empty() {
        return CorteSecoResult { is_corte_seco: false, pairs: vec![] };
    }

    let candidates: Vec<&Segment> = segments
        .iter()
        .filter(|s| !s.is_curve)
        .filter(|s| s.length() >= config.min_length_millimeters)
        .filter(|s| {
            semantic_by_layer
                .get(&s.layer)
                .is_some_and(|t| config.target_semantic_types.contains(t))
        })
        .collect();

    if candidates.len() < 2 {
        return CorteSecoResult { is_corte_seco: false, pairs: vec![] };
    }

    let cell_size = config
        .min_length_millimeters
        .max(config.max_offset_millimeters * 6.0)
        .max(gap_tolerance * 4.0)
        .max(1e-6);
    let mut grid = Grid { cell_size, cells: HashMap::new() };
    for (idx, seg) in candidates.iter().enumerate() {
        grid.insert(idx, seg, config.max_offset_millimeters);
    }

    let max_angle_rad = config.max_parallel_angle_degrees.to_radians();
    let agreement_tolerance = (2.0 * gap_tolerance).max(0.1);

    let mut seen_pairs = std::collections::HashSet::new();
    let mut pairs = Vec::new();

    for bucket in grid.cells.values() {
        for i in 0..bucket.len() {
            for j in (i + 1)..bucket.len() {
                let (a_idx, b_idx) = (bucket[i].min(bucket[j]), bucket[i].max(bucket[j]));
                if a_idx == b_idx || !seen_pairs.insert((a_idx, b_idx)) {
                    continue;
                }
                let a = candidates[a_idx];
                let b = candidates[b_idx];
                if let Some(pair) =
                    evaluate_pair(a, b, config, max_angle_rad, agreement_tolerance, gap_tolerance, semantic_by_layer)
                {
                    pairs.push(pair);
                }
            }
        }
    }

    let is_corte_seco = pairs.len() >= config.min_pair_count;
    pairs.sort_by(|a, b| b.overlap_length.partial_cmp(&a.overlap_length).unwrap());
    pairs.truncate(10);

    CorteSecoResult { is_corte_seco, pairs }
}

fn evaluate_pair(
    a: &Segment,
    b: &Segment,
    config: &CorteSecoConfig,
    max_angle_rad: f64,
    agreement_tolerance: f64,
    gap_tolerance: f64,
    semantic_by_layer: &HashMap<String, SemanticType>,
) -> Option<CorteSecoPair> {
    let (adx, ady) = a.direction();
    let (bdx, bdy) = b.direction();
    let a_len = (adx * adx + ady * ady).sqrt();
    let b_len = (bdx * bdx + bdy * bdy).sqrt();
    if a_len < 1e-9 || b_len < 1e-9 {
        return None;
    }
    let (aux, auy) = (adx / a_len, ady / a_len);
    let (bux, buy) = (bdx / b_len, bdy / b_len);

    let cos_theta = aux * bux + auy * buy;
    if cos_theta.abs() < max_angle_rad.cos() {
        return None;
    }

    let project_a = |p: Point2| -> f64 { (p.x - a.start.x) * aux + (p.y - a.start.y) * auy };
    let (mut b0, mut b1) = (project_a(b.start), project_a(b.end));
    if b0 > b1 {
        std::mem::swap(&mut b0, &mut b1);
    }
    let overlap = a_len.min(b1) - 0f64.max(b0);
    if overlap < config.min_overlap_ratio * a_len.min(b_len) {
        return None;
    }

    let offset_on_a = signed_offsets(a, b);
    let offset_on_b = signed_offsets(b, a);
    let (Some(offset_a), Some(offset_b)) = (offset_on_a, offset_on_b) else {
        return None;
    };

    if offset_a.signum() != offset_b.signum() {
        return None;
    }
    if (offset_a.abs() - offset_b.abs()).abs() > agreement_tolerance {
        return None;
    }

    let representative_offset = offset_a.abs().max(offset_b.abs());
    if !(representative_offset > gap_tolerance && representative_offset < config.max_offset_millimeters) {
        return None;
    }

    let angle_difference_degrees = cos_theta.clamp(-1.0, 1.0).acos().to_degrees();
    let semantic_type_a = semantic_by_layer.get(&a.layer).copied().unwrap_or(SemanticType::Outro);
    let semantic_type_b = semantic_by_layer.get(&b.layer).copied().unwrap_or(SemanticType::Outro);

    Some(CorteSecoPair {
        layer_a: a.layer.clone(),
        layer_b: b.layer.clone(),
        semantic_type_a,
        semantic_type_b,
        overlap_length: overlap,
        average_offset: (offset_a.abs() + offset_b.abs()) / 2.0,
        angle_difference_degrees,
    })
}

/// Average signed perpendicular offset of `other`'s endpoints relative to
/// `base`'s line, or `None` if `base` is degenerate.
fn signed_offsets(base: &Segment, other: &Segment) -> Option<f64> {
    let (dx, dy) = base.direction();
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1e-9 {
        return None;
    }
    let (nx, ny) = (-dy / len, dx / len);
    let offset = |p: Point2| -> f64 { (p.x - base.start.x) * nx + (p.y - base.start.y) * ny };
    Some((offset(other.start) + offset(other.end)) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Point2;

    #[test]
    fn parallel_close_long_pair_is_detected() {
        let segments = vec![
            Segment::new(Point2::new(0.0, 0.0), Point2::new(60.0, 0.0), "serrilha_a", false),
            Segment::new(Point2::new(0.0, 0.3), Point2::new(60.0, 0.3), "serrilha_b", false),
        ];
        let mut semantic = HashMap::new();
        semantic.insert("serrilha_a".to_string(), SemanticType::Serrilha);
        semantic.insert("serrilha_b".to_string(), SemanticType::Serrilha);

        let config = CorteSecoConfig::default();
        let result = detect(&segments, &semantic, &["2x1".to_string()], &config, 0.05);
        assert!(result.is_corte_seco);
        assert_eq!(result.pairs.len(), 1);
    }

    #[test]
    fn no_duplicated_blade_codes_disables_heuristic() {
        let segments = vec![
            Segment::new(Point2::new(0.0, 0.0), Point2::new(60.0, 0.0), "serrilha_a", false),
            Segment::new(Point2::new(0.0, 0.3), Point2::new(60.0, 0.3), "serrilha_b", false),
        ];
        let semantic = HashMap::new();
        let config = CorteSecoConfig::default();
        let result = detect(&segments, &semantic, &[], &config, 0.05);
        assert!(!result.is_corte_seco);
    }
}
