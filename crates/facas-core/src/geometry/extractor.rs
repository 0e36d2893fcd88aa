//! Geometry extraction (`§4.3`): entity walk -> segment list + per-layer
//! accumulation + semantic classification.

use std::collections::HashMap;

use regex::Regex;

use crate::config::{EngineConfig, LayerMapping, SemanticType, Tolerances};
use crate::document::{Document, Entity};
use crate::errors::ExtractError;
use crate::geometry::bounding_box::{compute_extents, Extents};
use crate::geometry::segment::Segment;
use crate::geometry::tessellate;
use crate::metrics::{EntityKindCounts, LayerStats, Metrics, QualityRecord};

/// A layer mapping compiled into regexes, checked in semantic-type draw
/// order so cross-type priority is deterministic (`§4.3`).
pub struct CompiledLayerMapping {
    ordered: Vec<(SemanticType, Vec<Regex>)>,
}

impl CompiledLayerMapping {
    pub fn compile(mapping: &LayerMapping) -> Result<Self, ExtractError> {
        let mut ordered = Vec::new();
        for semantic_type in SemanticType::DRAW_ORDER {
            let Some(patterns) = mapping.get(&semantic_type) else {
                continue;
            };
            let mut compiled = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let regex = Regex::new(pattern)
                    .map_err(|e| ExtractError::Dxf(format!("bad layer regex {pattern}: {e}")))?;
                compiled.push(regex);
            }
            ordered.push((semantic_type, compiled));
        }
        Ok(CompiledLayerMapping { ordered })
    }

    /// Resolve a raw layer name to a semantic type (`§4.3`): first
    /// configured match wins; otherwise substring fallback, else `outro`.
    pub fn classify(&self, raw_layer: &str) -> SemanticType {
        for (semantic_type, regexes) in &self.ordered {
            if regexes.iter().any(|re| re.is_match(raw_layer)) {
                return *semantic_type;
            }
        }
        let upper = raw_layer.to_ascii_uppercase();
        if upper.contains("VINCO") {
            SemanticType::Vinco
        } else if upper.contains("SERR") {
            SemanticType::Serrilha
        } else {
            SemanticType::Outro
        }
    }
}

#[derive(Default)]
struct LayerWorking {
    entity_count: u64,
    total_length: f64,
    closed_loop_floor: u64,
}

/// Result of `§4.3`'s entity walk: the flattened segment list plus the
/// metrics fields it populates directly (extents, per-layer stats, entity
/// kind counts, curve/radius accounting). Loop and intersection counts are
/// filled in by later stages.
pub struct ExtractionOutput {
    pub segments: Vec<Segment>,
    pub metrics: Metrics,
    pub semantic_by_layer: HashMap<String, SemanticType>,
}

pub fn extract(
    document: &Document,
    mm_per_unit: f64,
    unit_label: &str,
    config: &EngineConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let mapping = CompiledLayerMapping::compile(&config.layer_mapping)?;
    let tol = &config.tolerances;

    let mut segments = Vec::new();
    let mut layers: HashMap<String, LayerWorking> = HashMap::new();
    let mut semantic_by_layer: HashMap<String, SemanticType> = HashMap::new();
    let mut kind_counts = EntityKindCounts::default();
    let mut min_arc_radius: Option<f64> = None;
    let mut delicate_arc_count: u64 = 0;
    let mut delicate_arc_length: f64 = 0.0;
    let mut num_curves: u64 = 0;

    for entity in &document.entities {
        let raw_layer = entity.layer().to_string();
        let semantic_type = *semantic_by_layer
            .entry(raw_layer.clone())
            .or_insert_with(|| mapping.classify(&raw_layer));
        let working = layers.entry(raw_layer.clone()).or_default();
        working.entity_count += 1;

        match entity {
            Entity::Line { start, end, .. } => {
                kind_counts.lines += 1;
                let seg = Segment::new(scale(*start, mm_per_unit), scale(*end, mm_per_unit), raw_layer.clone(), false);
                working.total_length += seg.length();
                segments.push(seg);
            }
            Entity::Arc { center, radius, start_angle_rad, end_angle_rad, .. } => {
                kind_counts.arcs += 1;
                num_curves += 1;
                let radius_mm = radius * mm_per_unit;
                account_radius(&mut min_arc_radius, radius_mm, tol);
                if is_delicate(radius_mm, tol) {
                    delicate_arc_count += 1;
                }
                let (points, length) = tessellate::tessellate_arc(
                    scale(*center, mm_per_unit),
                    radius_mm,
                    *start_angle_rad,
                    *end_angle_rad,
                );
                working.total_length += length;
                if is_delicate(radius_mm, tol) {
                    delicate_arc_length += length;
                }
                push_polyline_segments(&mut segments, &points, &raw_layer, true, Some(radius_mm));
            }
            Entity::Circle { center, radius, .. } => {
                kind_counts.circles += 1;
                num_curves += 1;
                let radius_mm = radius * mm_per_unit;
                account_radius(&mut min_arc_radius, radius_mm, tol);
                if is_delicate(radius_mm, tol) {
                    delicate_arc_count += 1;
                }
                let (points, length) = tessellate::tessellate_circle(scale(*center, mm_per_unit), radius_mm);
                working.total_length += length;
                if is_delicate(radius_mm, tol) {
                    delicate_arc_length += length;
                }
                push_polyline_segments(&mut segments, &points, &raw_layer, true, Some(radius_mm));
                working.closed_loop_floor += 1;
            }
            Entity::Polyline2D { vertices, closed, .. } => {
                kind_counts.polylines_2d += 1;
                extract_polyline_2d(
                    vertices,
                    *closed,
                    mm_per_unit,
                    tol,
                    &raw_layer,
                    &mut segments,
                    working,
                    &mut num_curves,
                    &mut min_arc_radius,
                    &mut delicate_arc_count,
                    &mut delicate_arc_length,
                );
            }
            Entity::Polyline3D { points, closed, .. } => {
                kind_counts.polylines_3d += 1;
                let scaled: Vec<_> = points.iter().map(|p| scale(*p, mm_per_unit)).collect();
                push_polyline_segments(&mut segments, &scaled, &raw_layer, false, None);
                working.total_length += chain_length(&scaled);
                if *closed {
                    working.closed_loop_floor += 1;
                }
            }
            Entity::Spline { control_points, .. } => {
                kind_counts.splines += 1;
                num_curves += 1;
                let scaled: Vec<_> = control_points.iter().map(|p| scale(*p, mm_per_unit)).collect();
                let (points, length) = tessellate::tessellate_spline(&scaled);
                working.total_length += length;
                push_polyline_segments(&mut segments, &points, &raw_layer, true, None);
            }
            Entity::Ellipse { center, major_axis_end, minor_to_major_ratio, start_param, end_param, .. } => {
                kind_counts.ellipses += 1;
                num_curves += 1;
                let (points, length) = tessellate::tessellate_ellipse(
                    scale(*center, mm_per_unit),
                    scale(*major_axis_end, mm_per_unit),
                    *minor_to_major_ratio,
                    *start_param,
                    *end_param,
                );
                working.total_length += length;
                push_polyline_segments(&mut segments, &points, &raw_layer, true, None);
            }
            Entity::Insert { .. } => {
                kind_counts.inserts += 1;
            }
            Entity::Text { .. } => {
                kind_counts.texts += 1;
            }
            Entity::MText { .. } => {
                kind_counts.mtexts += 1;
            }
        }
    }

    let mut closed_loops_by_type: HashMap<SemanticType, u64> = HashMap::new();
    let mut layer_stats = Vec::with_capacity(layers.len());
    for (layer, working) in layers {
        let semantic_type = *semantic_by_layer.get(&layer).unwrap();
        *closed_loops_by_type.entry(semantic_type).or_insert(0) += working.closed_loop_floor;
        layer_stats.push(LayerStats {
            layer,
            semantic_type,
            entity_count: working.entity_count,
            total_length: working.total_length,
            closed_loop_count: working.closed_loop_floor,
        });
    }
    layer_stats.sort_by(|a, b| a.layer.cmp(&b.layer));

    let total_cut_length = sum_by_type(&layer_stats, SemanticType::Corte);
    let total_fold_length = sum_by_type(&layer_stats, SemanticType::Vinco);
    let total_perf_length = sum_by_type(&layer_stats, SemanticType::Serrilha)
        + sum_by_type(&layer_stats, SemanticType::SerrilhaMista);
    let total_three_pt_length = sum_by_type(&layer_stats, SemanticType::Trespt);
    let three_pt_segment_count = segments
        .iter()
        .filter(|s| semantic_by_layer.get(&s.layer) == Some(&SemanticType::Trespt))
        .count() as u64;

    let extents = compute_extents(&segments);

    let mut metrics = Metrics {
        unit_label: unit_label.to_string(),
        extents,
        bbox_area: extents.area(),
        bbox_perimeter: extents.perimeter(),
        total_cut_length,
        total_fold_length,
        total_perf_length,
        total_three_pt_length,
        three_pt_segment_count,
        three_pt_cut_ratio: 0.0,
        requires_manual_three_pt_handling: false,
        num_curves,
        num_nodes: 0,
        num_intersections: 0,
        min_arc_radius,
        entity_kind_counts: kind_counts,
        layer_stats,
        quality: QualityRecord {
            delicate_arc_count,
            delicate_arc_length,
            closed_loops_by_type,
            ..QualityRecord::default()
        },
    };
    metrics.recompute_three_pt_ratio();

    Ok(ExtractionOutput { segments, metrics, semantic_by_layer })
}

fn sum_by_type(layer_stats: &[LayerStats], semantic_type: SemanticType) -> f64 {
    layer_stats
        .iter()
        .filter(|l| l.semantic_type == semantic_type)
        .map(|l| l.total_length)
        .sum()
}

fn scale(p: crate::document::Point2, mm_per_unit: f64) -> crate::document::Point2 {
    crate::document::Point2::new(p.x * mm_per_unit, p.y * mm_per_unit)
}

fn account_radius(min_arc_radius: &mut Option<f64>, radius_mm: f64, tol: &Tolerances) {
    if radius_mm <= tol.min_curve_radius_tolerance {
        return;
    }
    *min_arc_radius = Some(match *min_arc_radius {
        Some(current) => current.min(radius_mm),
        None => radius_mm,
    });
}

fn is_delicate(radius_mm: f64, tol: &Tolerances) -> bool {
    radius_mm <= tol.delicate_arc_radius_threshold + 1e-9
}

fn push_polyline_segments(
    segments: &mut Vec<Segment>,
    points: &[crate::document::Point2],
    layer: &str,
    is_curve: bool,
    radius_mm: Option<f64>,
) {
    for pair in points.windows(2) {
        let mut seg = Segment::new(pair[0], pair[1], layer.to_string(), is_curve);
        if let Some(r) = radius_mm {
            seg = seg.with_radius(r);
        }
        segments.push(seg);
    }
}

fn chain_length(points: &[crate::document::Point2]) -> f64 {
    points
        .windows(2)
        .map(|w| {
            let dx = w[1].x - w[0].x;
            let dy = w[1].y - w[0].y;
            (dx * dx + dy * dy).sqrt()
        })
        .sum()
}

#[allow(clippy::too_many_arguments)]
fn extract_polyline_2d(
    vertices: &[crate::document::Vertex],
    closed: bool,
    mm_per_unit: f64,
    tol: &Tolerances,
    raw_layer: &str,
    segments: &mut Vec<Segment>,
    working: &mut LayerWorking,
    num_curves: &mut u64,
    min_arc_radius: &mut Option<f64>,
    delicate_arc_count: &mut u64,
    delicate_arc_length: &mut f64,
) {
    let scaled: Vec<_> = vertices
        .iter()
        .map(|v| crate::document::Vertex { point: scale(v.point, mm_per_unit), bulge: v.bulge })
        .collect();

    let n = scaled.len();
    if n < 2 {
        return;
    }
    let pair_count = if closed { n } else { n - 1 };

    for i in 0..pair_count {
        let a = &scaled[i];
        let b = &scaled[(i + 1) % n];

        if a.bulge.abs() < 1e-9 {
            let seg = Segment::new(a.point, b.point, raw_layer.to_string(), false);
            working.total_length += seg.length();
            segments.push(seg);
        } else {
            *num_curves += 1;
            let (points, length) =
                tessellate::tessellate_bulge(a.point, b.point, a.bulge, tol.chord_tolerance);
            working.total_length += length;

            let chord = {
                let dx = b.point.x - a.point.x;
                let dy = b.point.y - a.point.y;
                (dx * dx + dy * dy).sqrt()
            };
            let angle = 4.0 * a.bulge.atan();
            if chord > 1e-12 && angle.abs() > 1e-12 {
                let radius = (chord / (2.0 * (angle / 2.0).sin())).abs();
                account_radius(min_arc_radius, radius, tol);
                if is_delicate(radius, tol) {
                    *delicate_arc_count += 1;
                    *delicate_arc_length += length;
                }
            }

            push_polyline_segments(segments, &points, raw_layer, true, None);
        }
    }

    if closed {
        working.closed_loop_floor += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, Entity, Point2};

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn single_line_on_cut_layer_has_expected_totals() {
        let mut document = Document::default();
        document.entities.push(Entity::Line {
            layer: "CORTE".into(),
            start: Point2::new(0.0, 0.0),
            end: Point2::new(10.0, 0.0),
        });

        let output = extract(&document, 1.0, "mm", &config()).unwrap();
        assert_eq!(output.metrics.total_cut_length, 10.0);
        assert_eq!(output.metrics.num_curves, 0);
        assert_eq!(output.metrics.entity_kind_counts.lines, 1);
        assert_eq!(output.metrics.extents.width(), 10.0);
    }

    #[test]
    fn circle_registers_one_closed_loop_and_min_radius() {
        let mut document = Document::default();
        document.entities.push(Entity::Circle {
            layer: "CORTE".into(),
            center: Point2::new(0.0, 0.0),
            radius: 5.0,
        });

        let output = extract(&document, 1.0, "mm", &config()).unwrap();
        assert_eq!(output.metrics.num_curves, 1);
        assert_eq!(output.metrics.min_arc_radius, Some(5.0));
        assert_eq!(output.metrics.quality.total_closed_loops(), 1);
    }

    #[test]
    fn unknown_layer_falls_back_to_outro() {
        let mapping = CompiledLayerMapping::compile(&config().layer_mapping).unwrap();
        assert_eq!(mapping.classify("layer_xyz"), SemanticType::Outro);
        assert_eq!(mapping.classify("VINCO_MANUAL"), SemanticType::Vinco);
    }
}
