//! End-to-end scenarios over `analyze()`: one document plus one
//! configuration, checked against the metrics/score the pipeline is
//! expected to produce for that input (`§8`).

use std::collections::HashMap;

use facas_core::config::EngineConfig;
use facas_core::document::{Attribute, BlockDef, Document, Entity, Point2};

fn rectangle(layer: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Entity> {
    vec![
        Entity::Line { layer: layer.into(), start: Point2::new(x0, y0), end: Point2::new(x1, y0) },
        Entity::Line { layer: layer.into(), start: Point2::new(x1, y0), end: Point2::new(x1, y1) },
        Entity::Line { layer: layer.into(), start: Point2::new(x1, y1), end: Point2::new(x0, y1) },
        Entity::Line { layer: layer.into(), start: Point2::new(x0, y1), end: Point2::new(x0, y0) },
    ]
}

#[test]
fn single_line_on_cut_layer_scores_zero() {
    let mut document = Document::default();
    document.entities.push(Entity::Line {
        layer: "corte".into(),
        start: Point2::new(0.0, 0.0),
        end: Point2::new(10.0, 0.0),
    });

    let output = facas_core::analyze(&document, &EngineConfig::default()).unwrap();
    assert_eq!(output.metrics.total_cut_length, 10.0);
    assert_eq!(output.metrics.num_curves, 0);
    assert_eq!(output.metrics.num_intersections, 0);
    assert_eq!(output.metrics.extents.width(), 10.0);
    assert_eq!(output.score.score, 0.0);
    assert!(output.score.explanations.is_empty());
}

#[test]
fn rectangle_with_circles_and_adhesive_sub_rectangle_is_flagged_as_special_material() {
    let mut document = Document::default();
    document.entities.extend(rectangle("corte", 0.0, 0.0, 200.0, 120.0));
    document.entities.push(Entity::Circle { layer: "corte".into(), center: Point2::new(30.0, 30.0), radius: 8.0 });
    document.entities.push(Entity::Circle { layer: "corte".into(), center: Point2::new(170.0, 30.0), radius: 8.0 });
    document.entities.extend(rectangle("ADESIVO_BASE", 60.0, 40.0, 140.0, 90.0));

    let output = facas_core::analyze(&document, &EngineConfig::default()).unwrap();
    assert!(output.metrics.quality.special_materials.contains(&"adesivo".to_string()));
    assert!(output.score.score > 0.0);
    assert!(output.score.explanations.iter().any(|e| e.to_ascii_lowercase().contains("adesivo")));
}

#[test]
fn text_only_serrilha_annotations_are_parsed_into_two_entries() {
    let mut document = Document::default();
    document.entities.push(Entity::Text {
        layer: "anotacoes".into(),
        value: "X=2x1 23,8 12d Y-10x0.4 11,5 24 dentes".into(),
    });

    let output = facas_core::analyze(&document, &EngineConfig::default()).unwrap();
    let serrilha = &output.serrilha;
    assert_eq!(serrilha.total_count, 2);
    assert_eq!(serrilha.entries.len(), 2);

    let by_code: HashMap<&str, &facas_core::serrilha::SerrilhaEntry> =
        serrilha.entries.iter().map(|e| (e.blade_code.as_str(), e)).collect();

    let x = by_code.get("2x1").expect("2x1 entry present");
    assert_eq!(x.semantic_type, "serrilha_X");
    assert!((x.estimated_length - 23.8).abs() < 1e-9);
    assert!((x.estimated_tooth_count - 12.0).abs() < 1e-9);

    let y = by_code.get("10x0.4").expect("10x0.4 entry present");
    assert_eq!(y.semantic_type, "serrilha_Y");
    assert!((y.estimated_length - 11.5).abs() < 1e-9);
    assert!((y.estimated_tooth_count - 24.0).abs() < 1e-9);
}

#[test]
fn parallel_serrilha_pair_with_duplicated_blade_code_is_corte_seco() {
    let mut document = Document::default();
    document.entities.push(Entity::Line {
        layer: "serrilha_a".into(),
        start: Point2::new(0.0, 0.0),
        end: Point2::new(60.0, 0.0),
    });
    document.entities.push(Entity::Line {
        layer: "serrilha_b".into(),
        start: Point2::new(0.0, 0.3),
        end: Point2::new(60.0, 0.3),
    });
    // Two text annotations sharing blade code "2x1" trip the duplicated
    // blade-code precondition the corte-seco heuristic requires.
    document.entities.push(Entity::Text { layer: "anotacoes".into(), value: "X=2x1 10,0 5d".into() });
    document.entities.push(Entity::Text { layer: "anotacoes".into(), value: "Y=2x1 10,0 5d".into() });
    // A tiny arc that would otherwise trip the danger-radius penalty.
    document.entities.push(Entity::Arc {
        layer: "serrilha_a".into(),
        center: Point2::new(30.0, 0.0),
        radius: 0.2,
        start_angle_rad: 0.0,
        end_angle_rad: std::f64::consts::PI,
    });

    let output = facas_core::analyze(&document, &EngineConfig::default()).unwrap();
    assert!(output.corte_seco.is_corte_seco);
    assert!(!output.corte_seco.pairs.is_empty());
    assert_eq!(output.metrics.min_arc_radius, Some(0.2));

    // Danger-radius penalty is suppressed in favor of the corte-seco
    // adjustment (`§8` boundary behavior).
    assert!(!output.score.explanations.iter().any(|e| e.contains("Raio minimo perigoso")));
    assert!(output.score.explanations.iter().any(|e| e.contains("Corte seco detectado")));
}

#[test]
fn three_point_segments_require_manual_handling_and_report_ratio() {
    let mut document = Document::default();
    document.entities.push(Entity::Line {
        layer: "corte".into(),
        start: Point2::new(0.0, 0.0),
        end: Point2::new(100.0, 0.0),
    });
    document.entities.push(Entity::Line {
        layer: "vinco3pt".into(),
        start: Point2::new(0.0, 10.0),
        end: Point2::new(50.0, 10.0),
    });

    let output = facas_core::analyze(&document, &EngineConfig::default()).unwrap();
    assert_eq!(output.metrics.total_three_pt_length, 50.0);
    assert!(output.metrics.requires_manual_three_pt_handling);
    assert!((output.metrics.three_pt_cut_ratio - 0.5).abs() < 1e-9);
    assert!(output.score.explanations.iter().any(|e| e.contains("Manuseio manual")));
}

#[test]
fn zipper_keyword_in_insert_block_name_is_classified_as_zipper() {
    let mut document = Document::default();
    document.entities.push(Entity::Insert {
        layer: "serrilha".into(),
        block_name: "SERR_BLADE_ZIP".into(),
        insertion_point: Point2::new(0.0, 0.0),
        attributes: vec![Attribute { tag: "CODE".into(), value: "2x1".into() }],
    });
    document.blocks.insert(
        "SERR_BLADE_ZIP".to_string(),
        BlockDef {
            entities: vec![Entity::Line {
                layer: "serrilha".into(),
                start: Point2::new(0.0, 0.0),
                end: Point2::new(5.0, 0.0),
            }],
            inserts: vec![],
        },
    );

    let output = facas_core::analyze(&document, &EngineConfig::default()).unwrap();
    assert_eq!(output.serrilha.classification.zipper, 1);
    assert_eq!(output.serrilha.classification.simple, 0);
}

#[test]
fn empty_document_has_zero_extents_and_zero_score() {
    let document = Document::default();
    let output = facas_core::analyze(&document, &EngineConfig::default()).unwrap();
    assert_eq!(output.metrics.extents.area(), 0.0);
    assert_eq!(output.metrics.bbox_area, 0.0);
    assert_eq!(output.score.score, 0.0);
    assert!(output.score.explanations.is_empty());
}

#[test]
fn metrics_rescale_linearly_with_unit_conversion() {
    let mut document_mm = Document::default();
    document_mm.entities.push(Entity::Line {
        layer: "corte".into(),
        start: Point2::new(0.0, 0.0),
        end: Point2::new(10.0, 0.0),
    });

    let mut document_cm = Document::default();
    document_cm.entities.push(Entity::Line {
        layer: "corte".into(),
        start: Point2::new(0.0, 0.0),
        end: Point2::new(1.0, 0.0),
    });
    document_cm.declared_units = Some(facas_core::units::DeclaredUnits::Named("cm".into()));

    let output_mm = facas_core::analyze(&document_mm, &EngineConfig::default()).unwrap();
    let output_cm = facas_core::analyze(&document_cm, &EngineConfig::default()).unwrap();

    assert!((output_mm.metrics.total_cut_length - output_cm.metrics.total_cut_length).abs() < 1e-9);
}
