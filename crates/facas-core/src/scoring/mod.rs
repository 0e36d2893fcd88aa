//! Weighted scoring engine (`§4.8`): a deterministic, additive ruleset over
//! metrics producing a clamped score plus ordered explanations.

pub mod rules;

use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::corteseco::CorteSecoResult;
use crate::metrics::Metrics;
use crate::serrilha::SerrilhaSummary;
use rules::{extra_thresholds, simple_threshold, step_contribution, Fired};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreOutput {
    pub score: f64,
    pub explanations: Vec<String>,
}

/// Score metrics against the configured ruleset (`§4.8`). Pure function of
/// its inputs; rule evaluation order is fixed so output is deterministic.
pub fn score(metrics: &Metrics, serrilha: &SerrilhaSummary, corte_seco: &CorteSecoResult, config: &ScoringConfig) -> ScoreOutput {
    let mut fired: Vec<Fired> = Vec::new();

    if let Some(f) = simple_threshold(
        "Comprimento total de corte",
        metrics.total_cut_length,
        config.total_cut_length_threshold,
        config.total_cut_length_weight,
    ) {
        fired.push(f);
    }

    let num_curves = metrics.num_curves as f64;
    if let Some(f) = simple_threshold("Quantidade de curvas", num_curves, config.num_curves_threshold, config.num_curves_weight) {
        fired.push(f);
    }
    fired.extend(extra_thresholds("Quantidade de curvas (extra)", num_curves, &config.num_curves_extra_thresholds));
    if let Some(f) = step_contribution(
        "Quantidade de curvas (incremento)",
        num_curves,
        config.num_curves_threshold,
        config.num_curves_step,
        config.num_curves_step_weight,
        config.num_curves_step_max_contribution,
    ) {
        fired.push(f);
    }

    score_min_radius(metrics, corte_seco, config, &mut fired);

    let num_intersections = metrics.num_intersections as f64;
    if let Some(f) = simple_threshold(
        "Quantidade de interseccoes",
        num_intersections,
        config.bonus_intersections_threshold,
        config.bonus_intersections_weight,
    ) {
        fired.push(f);
    }
    fired.extend(extra_thresholds("Interseccoes (extra)", num_intersections, &config.intersections_extra_thresholds));

    fired.extend(extra_thresholds(
        "Pontas soltas",
        metrics.quality.dangling_ends as f64,
        &config.dangling_ends_thresholds,
    ));

    score_serrilha(serrilha, config, &mut fired);
    score_closed_loops(metrics, config, &mut fired);
    score_three_pt(metrics, config, &mut fired);
    score_curve_density(metrics, config, &mut fired);
    score_materials(metrics, config, &mut fired);

    let raw_score: f64 = fired.iter().map(|f| f.contribution).sum();
    let score = raw_score.max(0.0).min(config.max_score);
    let explanations = fired.into_iter().map(|f| f.explanation).collect();

    ScoreOutput { score, explanations }
}

fn score_min_radius(metrics: &Metrics, corte_seco: &CorteSecoResult, config: &ScoringConfig, fired: &mut Vec<Fired>) {
    let Some(min_radius) = metrics.min_arc_radius else {
        return;
    };

    if corte_seco.is_corte_seco {
        fired.push(Fired {
            contribution: config.min_radius.corte_seco_adjustment,
            explanation: format!(
                "Corte seco detectado: ajuste de raio minimo (peso {:+.2})",
                config.min_radius.corte_seco_adjustment
            ),
        });
        fired.extend(extra_thresholds(
            "Pares de corte seco",
            corte_seco.pairs.len() as f64,
            &config.min_radius.corte_seco_pair_thresholds,
        ));
    } else if min_radius <= config.min_radius.danger_threshold {
        fired.push(Fired {
            contribution: config.min_radius.penalty_weight,
            explanation: format!(
                "Raio minimo perigoso: {:.2} <= {:.2} (peso {:+.2})",
                min_radius, config.min_radius.danger_threshold, config.min_radius.penalty_weight
            ),
        });
    }
}

fn score_serrilha(serrilha: &SerrilhaSummary, config: &ScoringConfig, fired: &mut Vec<Fired>) {
    let s = &config.serrilha;

    if serrilha.total_count > 0 {
        fired.push(Fired {
            contribution: s.presence_weight,
            explanation: format!("Serrilha presente: {} ocorrencias (peso {:+.2})", serrilha.total_count, s.presence_weight),
        });
    }

    fired.extend(extra_thresholds("Serrilha mista", serrilha.classification.mista as f64, &s.mista_thresholds));
    fired.extend(extra_thresholds("Serrilha travada", serrilha.classification.travada as f64, &s.travada_thresholds));
    fired.extend(extra_thresholds("Serrilha zipper", serrilha.classification.zipper as f64, &s.zipper_thresholds));

    for entry in &serrilha.entries {
        if s.manual_blade_codes.iter().any(|c| c.eq_ignore_ascii_case(&entry.blade_code)) {
            fired.push(Fired {
                contribution: s.manual_blade_weight,
                explanation: format!("Codigo de lamina manual {}: (peso {:+.2})", entry.blade_code, s.manual_blade_weight),
            });
        }
    }

    if let Some(f) = simple_threshold(
        "Diversidade de classificacao serrilha",
        serrilha.classification.distinct_categories() as f64,
        s.diversity_threshold as f64,
        s.diversity_weight,
    ) {
        fired.push(f);
    }

    if let Some(f) = simple_threshold(
        "Laminas distintas",
        serrilha.distinct_blade_codes as f64,
        s.distinct_blade_threshold as f64,
        s.distinct_blade_weight,
    ) {
        fired.push(f);
    }

    let cola_count = serrilha
        .entries
        .iter()
        .filter(|e| {
            s.cola_semantic_hints
                .iter()
                .any(|hint| e.semantic_type.to_ascii_lowercase().contains(&hint.to_ascii_lowercase()))
        })
        .count() as f64;
    if cola_count > 0.0 {
        fired.push(Fired {
            contribution: s.cola_weight,
            explanation: format!("Serrilha de cola/selagem detectada (peso {:+.2})", s.cola_weight),
        });
        fired.extend(extra_thresholds("Contagem serrilha de cola", cola_count, &s.cola_count_thresholds));
    }

    let total_count = serrilha.total_count;
    let total_length = serrilha.total_estimated_length.unwrap_or(0.0);
    if total_count > 0 && total_count <= s.small_piece_max_count && total_length <= s.small_piece_max_total_length {
        fired.push(Fired {
            contribution: s.small_piece_adjustment,
            explanation: format!("Ajuste de peca pequena: {total_count} serrilhas, {total_length:.2} mm (peso {:+.2})", s.small_piece_adjustment),
        });
    }
}

fn score_closed_loops(metrics: &Metrics, config: &ScoringConfig, fired: &mut Vec<Fired>) {
    let c = &config.closed_loops;
    let total_loops = metrics.quality.total_closed_loops() as f64;
    fired.extend(extra_thresholds("Contagem de bocas fechadas", total_loops, &c.count_thresholds));

    let distinct_types = metrics
        .quality
        .closed_loops_by_type
        .values()
        .filter(|&&count| count > 0)
        .count() as f64;
    if let Some(f) = simple_threshold("Variedade de bocas fechadas", distinct_types, c.variety_threshold as f64, c.variety_weight) {
        fired.push(f);
    }

    let density = if metrics.bbox_area > 0.0 { total_loops / metrics.bbox_area.sqrt() } else { 0.0 };
    fired.extend(extra_thresholds("Densidade de bocas fechadas", density, &c.density_thresholds));
}

fn score_three_pt(metrics: &Metrics, config: &ScoringConfig, fired: &mut Vec<Fired>) {
    let t = &config.three_pt;
    fired.extend(extra_thresholds("Comprimento vinco 3pt", metrics.total_three_pt_length, &t.length_thresholds));
    fired.extend(extra_thresholds(
        "Quantidade de segmentos 3pt",
        metrics.three_pt_segment_count as f64,
        &t.segment_thresholds,
    ));
    fired.extend(extra_thresholds("Razao 3pt/corte", metrics.three_pt_cut_ratio, &t.ratio_thresholds));

    if metrics.requires_manual_three_pt_handling {
        fired.push(Fired {
            contribution: t.manual_handling_weight,
            explanation: format!("Manuseio manual de vinco 3pt requerido (peso {:+.2})", t.manual_handling_weight),
        });
    }
}

fn score_curve_density(metrics: &Metrics, config: &ScoringConfig, fired: &mut Vec<Fired>) {
    let c = &config.curve_density;
    let perimeter = metrics.bbox_perimeter.max(1e-9);
    let density = metrics.num_curves as f64 / perimeter;
    fired.extend(extra_thresholds("Densidade de curvas", density, &c.density_thresholds));
    fired.extend(extra_thresholds(
        "Quantidade de arcos delicados",
        metrics.quality.delicate_arc_count as f64,
        &c.delicate_arc_count_thresholds,
    ));
}

fn score_materials(metrics: &Metrics, config: &ScoringConfig, fired: &mut Vec<Fired>) {
    for material in &metrics.quality.special_materials {
        let weight = config
            .special_material_weights
            .iter()
            .find(|(k, _)| material.to_ascii_lowercase().contains(&k.to_ascii_lowercase()))
            .map(|(_, w)| *w)
            .unwrap_or(config.special_material_default_weight);
        fired.push(Fired {
            contribution: weight,
            explanation: format!("Material especial detectado: {material} (peso {weight:+.2})"),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::bounding_box::Extents;
    use crate::metrics::{EntityKindCounts, LayerStats, QualityRecord};

    fn empty_metrics() -> Metrics {
        Metrics {
            unit_label: "mm".into(),
            extents: Extents::zero(),
            bbox_area: 0.0,
            bbox_perimeter: 0.0,
            total_cut_length: 0.0,
            total_fold_length: 0.0,
            total_perf_length: 0.0,
            total_three_pt_length: 0.0,
            three_pt_segment_count: 0,
            three_pt_cut_ratio: 0.0,
            requires_manual_three_pt_handling: false,
            num_curves: 0,
            num_nodes: 0,
            num_intersections: 0,
            min_arc_radius: None,
            entity_kind_counts: EntityKindCounts::default(),
            layer_stats: Vec::<LayerStats>::new(),
            quality: QualityRecord::default(),
        }
    }

    fn empty_serrilha() -> SerrilhaSummary {
        SerrilhaSummary {
            total_count: 0,
            unknown_count: 0,
            unknown_symbols: vec![],
            entries: vec![],
            distinct_semantic_types: 0,
            distinct_blade_codes: 0,
            classification: Default::default(),
            total_estimated_length: None,
            average_estimated_length: None,
            is_corte_seco: false,
            corte_seco_blade_codes: vec![],
        }
    }

    #[test]
    fn zero_segments_gives_zero_score_and_no_explanations() {
        let metrics = empty_metrics();
        let serrilha = empty_serrilha();
        let corte_seco = CorteSecoResult { is_corte_seco: false, pairs: vec![] };
        let output = score(&metrics, &serrilha, &corte_seco, &ScoringConfig::default());
        assert_eq!(output.score, 0.0);
        assert!(output.explanations.is_empty());
    }

    #[test]
    fn simple_cut_line_scores_zero() {
        let mut metrics = empty_metrics();
        metrics.total_cut_length = 10.0;
        let serrilha = empty_serrilha();
        let corte_seco = CorteSecoResult { is_corte_seco: false, pairs: vec![] };
        let output = score(&metrics, &serrilha, &corte_seco, &ScoringConfig::default());
        assert_eq!(output.score, 0.0);
    }

    #[test]
    fn score_is_clamped_to_max() {
        let mut metrics = empty_metrics();
        metrics.total_cut_length = 100_000.0;
        metrics.num_curves = 10_000;
        let serrilha = empty_serrilha();
        let corte_seco = CorteSecoResult { is_corte_seco: false, pairs: vec![] };
        let output = score(&metrics, &serrilha, &corte_seco, &ScoringConfig::default());
        assert!(output.score <= ScoringConfig::default().max_score);
    }
}
