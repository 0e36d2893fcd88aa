//! Block-insert serrilha detection (`§4.5`, insert sub-detector).

use std::collections::HashMap;

use regex::Regex;

use crate::config::{SemanticType, SerrilhaInsertMatcher};
use crate::document::{Document, Entity, Point2};
use crate::errors::SerrilhaError;
use crate::geometry::tessellate;

struct CompiledMatcher {
    semantic_type: SemanticType,
    name_pattern: Regex,
    attribute_pattern: Option<Regex>,
    default_blade_code: Option<String>,
}

pub struct InsertDetection {
    pub semantic_type: SemanticType,
    pub blade_code: String,
    pub symbol_name: String,
    pub estimated_length: f64,
}

pub fn compile_matchers(matchers: &[SerrilhaInsertMatcher]) -> Result<Vec<CompiledMatcher>, SerrilhaError> {
    matchers
        .iter()
        .map(|m| {
            let name_pattern = Regex::new(&m.name_pattern).map_err(|source| SerrilhaError::InvalidPattern {
                pattern: m.name_pattern.clone(),
                source,
            })?;
            let attribute_pattern = m
                .attribute_pattern
                .as_ref()
                .map(|p| {
                    Regex::new(p).map_err(|source| SerrilhaError::InvalidPattern {
                        pattern: p.clone(),
                        source,
                    })
                })
                .transpose()?;
            Ok(CompiledMatcher {
                semantic_type: m.semantic_type,
                name_pattern,
                attribute_pattern,
                default_blade_code: m.default_blade_code.clone(),
            })
        })
        .collect()
}

/// Detect serrilha blades from block inserts. Returns matches plus the
/// unknown (non-matching) block names, case-insensitive deduplicated.
pub fn detect(
    document: &Document,
    matchers: &[SerrilhaInsertMatcher],
    mm_per_unit: f64,
    depth_limit: u32,
) -> Result<(Vec<InsertDetection>, Vec<String>), SerrilhaError> {
    let compiled = compile_matchers(matchers)?;
    let mut detections = Vec::new();
    let mut unknown: HashMap<String, String> = HashMap::new();

    for entity in &document.entities {
        let Entity::Insert { block_name, attributes, .. } = entity else {
            continue;
        };

        let matched = compiled.iter().find(|m| {
            if !m.name_pattern.is_match(block_name) {
                return false;
            }
            match &m.attribute_pattern {
                None => true,
                Some(pattern) => attributes
                    .iter()
                    .any(|a| pattern.is_match(&a.value) || pattern.is_match(&a.tag)),
            }
        });

        match matched {
            Some(m) => {
                let blade_code = m
                    .default_blade_code
                    .clone()
                    .or_else(|| attributes.first().map(|a| a.value.clone()))
                    .unwrap_or_default();
                let estimated_length = estimate_block_length(document, block_name, mm_per_unit, depth_limit);
                detections.push(InsertDetection {
                    semantic_type: m.semantic_type,
                    blade_code,
                    symbol_name: block_name.clone(),
                    estimated_length,
                });
            }
            None => {
                unknown.entry(block_name.to_ascii_lowercase()).or_insert_with(|| block_name.clone());
            }
        }
    }

    let mut unknown_names: Vec<String> = unknown.into_values().collect();
    unknown_names.sort();
    Ok((detections, unknown_names))
}

/// Bounded-depth recursive explode summing child entity lengths (`§4.3`,
/// `§4.5`). Used only for serrilha length estimation, never for the
/// general segment list.
fn estimate_block_length(document: &Document, block_name: &str, mm_per_unit: f64, depth_limit: u32) -> f64 {
    estimate_block_length_inner(document, block_name, mm_per_unit, depth_limit)
}

fn estimate_block_length_inner(document: &Document, block_name: &str, mm_per_unit: f64, depth_remaining: u32) -> f64 {
    let Some(block) = document.blocks.get(block_name) else {
        return 0.0;
    };

    let mut total = 0.0;
    for entity in &block.entities {
        total += entity_length(entity, mm_per_unit);
    }

    if depth_remaining == 0 {
        return total;
    }

    for (child_name, _offset) in &block.inserts {
        total += estimate_block_length_inner(document, child_name, mm_per_unit, depth_remaining - 1);
    }

    total
}

fn entity_length(entity: &Entity, mm_per_unit: f64) -> f64 {
    match entity {
        Entity::Line { start, end, .. } => scaled_dist(*start, *end, mm_per_unit),
        Entity::Arc { radius, start_angle_rad, end_angle_rad, .. } => {
            let sweep = tessellate::normalize_sweep(*start_angle_rad, *end_angle_rad);
            radius * mm_per_unit * sweep
        }
        Entity::Circle { radius, .. } => radius * mm_per_unit * 2.0 * std::f64::consts::PI,
        Entity::Polyline2D { vertices, closed, .. } => {
            let n = vertices.len();
            if n < 2 {
                return 0.0;
            }
            let pairs = if *closed { n } else { n - 1 };
            (0..pairs)
                .map(|i| scaled_dist(vertices[i].point, vertices[(i + 1) % n].point, mm_per_unit))
                .sum()
        }
        Entity::Polyline3D { points, closed, .. } => {
            let n = points.len();
            if n < 2 {
                return 0.0;
            }
            let pairs = if *closed { n } else { n - 1 };
            (0..pairs).map(|i| scaled_dist(points[i], points[(i + 1) % n], mm_per_unit)).sum()
        }
        Entity::Spline { control_points, .. } => {
            let scaled: Vec<Point2> = control_points
                .iter()
                .map(|p| Point2::new(p.x * mm_per_unit, p.y * mm_per_unit))
                .collect();
            let (_, length) = tessellate::tessellate_spline(&scaled);
            length
        }
        Entity::Ellipse { center, major_axis_end, minor_to_major_ratio, start_param, end_param, .. } => {
            let (_, length) = tessellate::tessellate_ellipse(
                Point2::new(center.x * mm_per_unit, center.y * mm_per_unit),
                Point2::new(major_axis_end.x * mm_per_unit, major_axis_end.y * mm_per_unit),
                *minor_to_major_ratio,
                *start_param,
                *end_param,
            );
            length
        }
        Entity::Insert { .. } | Entity::Text { .. } | Entity::MText { .. } => 0.0,
    }
}

fn scaled_dist(a: Point2, b: Point2, mm_per_unit: f64) -> f64 {
    let dx = (b.x - a.x) * mm_per_unit;
    let dy = (b.y - a.y) * mm_per_unit;
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Attribute, BlockDef};
    use std::collections::HashMap as Map;

    #[test]
    fn matching_insert_is_detected_with_blade_code() {
        let mut document = Document::default();
        document.entities.push(Entity::Insert {
            layer: "serrilha".into(),
            block_name: "SERR_BLADE_X".into(),
            insertion_point: Point2::new(0.0, 0.0),
            attributes: vec![Attribute { tag: "CODE".into(), value: "2x1".into() }],
        });
        let mut blocks = Map::new();
        blocks.insert(
            "SERR_BLADE_X".to_string(),
            BlockDef {
                entities: vec![Entity::Line {
                    layer: "serrilha".into(),
                    start: Point2::new(0.0, 0.0),
                    end: Point2::new(5.0, 0.0),
                }],
                inserts: vec![],
            },
        );
        document.blocks = blocks;

        let matchers = vec![SerrilhaInsertMatcher {
            semantic_type: SemanticType::Serrilha,
            name_pattern: r"(?i)^serr.*blade".into(),
            attribute_pattern: Some(r"(?i)^[a-z]?\d+x[\d.]+$".into()),
            default_blade_code: None,
        }];

        let (detections, unknown) = detect(&document, &matchers, 1.0, 8).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].blade_code, "2x1");
        assert_eq!(detections[0].estimated_length, 5.0);
        assert!(unknown.is_empty());
    }

    #[test]
    fn non_matching_insert_is_unknown() {
        let mut document = Document::default();
        document.entities.push(Entity::Insert {
            layer: "outro".into(),
            block_name: "LOGO".into(),
            insertion_point: Point2::new(0.0, 0.0),
            attributes: vec![],
        });
        let matchers = vec![SerrilhaInsertMatcher {
            semantic_type: SemanticType::Serrilha,
            name_pattern: r"(?i)^serr.*blade".into(),
            attribute_pattern: None,
            default_blade_code: None,
        }];
        let (detections, unknown) = detect(&document, &matchers, 1.0, 8).unwrap();
        assert!(detections.is_empty());
        assert_eq!(unknown, vec!["LOGO".to_string()]);
    }
}
