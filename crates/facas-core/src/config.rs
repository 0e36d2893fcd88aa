//! Configuration surface (`§6`).
//!
//! Every tunable named in the specification is a field here with a
//! calibrated default. `facas-worker` loads overrides from a layered TOML +
//! environment source; the engine itself only ever sees these typed structs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Geometric tolerances shared by the preprocessor, extractor, loop
/// detector, intersection counter and corte-seco heuristic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    pub gap_tolerance: f64,
    pub overlap_tolerance: f64,
    pub chord_tolerance: f64,
    pub min_curve_radius_tolerance: f64,
    pub delicate_arc_radius_threshold: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Tolerances {
            gap_tolerance: 0.05,
            overlap_tolerance: 0.05,
            chord_tolerance: 0.1,
            min_curve_radius_tolerance: 0.01,
            delicate_arc_radius_threshold: 1.5,
        }
    }
}

/// An ordered regex table mapping raw layer names to a semantic type.
pub type LayerMapping = HashMap<SemanticType, Vec<String>>;

/// The six semantic layer types the scorer and renderer reason about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Corte,
    Vinco,
    Serrilha,
    SerrilhaMista,
    Trespt,
    Outro,
}

impl SemanticType {
    pub fn as_str(self) -> &'static str {
        match self {
            SemanticType::Corte => "corte",
            SemanticType::Vinco => "vinco",
            SemanticType::Serrilha => "serrilha",
            SemanticType::SerrilhaMista => "serrilha_mista",
            SemanticType::Trespt => "trespt",
            SemanticType::Outro => "outro",
        }
    }

    /// Draw order used by the renderer (`§4.9`).
    pub const DRAW_ORDER: [SemanticType; 6] = [
        SemanticType::Corte,
        SemanticType::Vinco,
        SemanticType::Serrilha,
        SemanticType::SerrilhaMista,
        SemanticType::Trespt,
        SemanticType::Outro,
    ];
}

fn default_layer_mapping() -> LayerMapping {
    let mut map = LayerMapping::new();
    map.insert(
        SemanticType::Corte,
        vec!["(?i)^corte".into(), "(?i)^cut".into(), "(?i)corte.?seco".into()],
    );
    map.insert(
        SemanticType::Vinco,
        vec!["(?i)^vinco".into(), "(?i)^fold".into(), "(?i)^crease".into()],
    );
    map.insert(
        SemanticType::Trespt,
        vec!["(?i)vinco.?3.?pt".into(), "(?i)^3pt".into(), "(?i)tres.?pont".into()],
    );
    map.insert(
        SemanticType::SerrilhaMista,
        vec!["(?i)serr.*mist".into(), "(?i)serr.*mixt".into()],
    );
    map.insert(
        SemanticType::Serrilha,
        vec!["(?i)^serr".into(), "(?i)perf".into()],
    );
    map
}

fn default_special_material_mapping() -> HashMap<String, Vec<String>> {
    let mut map = HashMap::new();
    map.insert("adesivo".into(), vec!["(?i)adesiv".into(), "(?i)adhesive".into()]);
    map.insert("espuma".into(), vec!["(?i)espuma".into(), "(?i)foam".into()]);
    map
}

/// A configured block-insert serrilha matcher (`§4.5`, insert detector).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerrilhaInsertMatcher {
    pub semantic_type: SemanticType,
    pub name_pattern: String,
    #[serde(default)]
    pub attribute_pattern: Option<String>,
    #[serde(default)]
    pub default_blade_code: Option<String>,
}

/// A configured text/mtext serrilha matcher (`§4.5`, text detector).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerrilhaTextMatcher {
    pub pattern: String,
    #[serde(default)]
    pub allow_multiple_matches: bool,
    /// Literal semantic type, used when `semantic_type_group` is absent.
    #[serde(default)]
    pub semantic_type: Option<SemanticType>,
    /// Named capture group substituted into `semantic_type_format`.
    #[serde(default)]
    pub semantic_type_group: Option<String>,
    #[serde(default)]
    pub semantic_type_format: Option<String>,
    #[serde(default)]
    pub uppercase_semantic_type: bool,
    /// Literal blade code fallback.
    #[serde(default)]
    pub blade_code_literal: Option<String>,
    #[serde(default)]
    pub blade_code_group: Option<String>,
    #[serde(default)]
    pub uppercase_blade_code: bool,
    #[serde(default)]
    pub length_group: Option<String>,
    #[serde(default)]
    pub length_scale: f64,
    #[serde(default)]
    pub tooth_count_group: Option<String>,
    #[serde(default)]
    pub default_length: Option<f64>,
    #[serde(default)]
    pub default_tooth_count: Option<f64>,
}

fn default_text_matchers() -> Vec<SerrilhaTextMatcher> {
    vec![SerrilhaTextMatcher {
        // "X=2x1 23,8 12d" / "Y-10x0.4 11,5 24d" style annotations:
        // semantic suffix, blade code, estimated length in mm, tooth count.
        pattern: r"(?i)(?P<sem>[XY])\s*[-=]?\s*(?P<code>\d+x[\d.]+)\s+(?P<len>[\d,.]+)\s+(?P<teeth>\d+)\s*d".into(),
        allow_multiple_matches: true,
        semantic_type: None,
        semantic_type_group: Some("sem".into()),
        semantic_type_format: Some("serrilha_{}".into()),
        uppercase_semantic_type: true,
        blade_code_literal: None,
        blade_code_group: Some("code".into()),
        uppercase_blade_code: false,
        length_group: Some("len".into()),
        length_scale: 1.0,
        tooth_count_group: Some("teeth".into()),
        default_length: None,
        default_tooth_count: None,
    }]
}

fn default_insert_matchers() -> Vec<SerrilhaInsertMatcher> {
    vec![SerrilhaInsertMatcher {
        semantic_type: SemanticType::Serrilha,
        name_pattern: r"(?i)^serr.*blade".into(),
        attribute_pattern: Some(r"(?i)^[a-z]?\d+x[\d.]+$".into()),
        default_blade_code: None,
    }]
}

/// Serrilha recognizer configuration (`§4.5`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerrilhaConfig {
    pub symbols: Vec<SerrilhaInsertMatcher>,
    pub text_symbols: Vec<SerrilhaTextMatcher>,
    pub default_length: f64,
    pub default_tooth_count: f64,
    pub insert_explode_depth_limit: u32,
}

impl Default for SerrilhaConfig {
    fn default() -> Self {
        SerrilhaConfig {
            symbols: default_insert_matchers(),
            text_symbols: default_text_matchers(),
            default_length: 0.0,
            default_tooth_count: 0.0,
            insert_explode_depth_limit: 8,
        }
    }
}

/// Corte-seco heuristic tunables (`§4.6`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorteSecoConfig {
    pub enabled: bool,
    pub target_semantic_types: Vec<SemanticType>,
    pub min_length_millimeters: f64,
    pub max_offset_millimeters: f64,
    pub max_parallel_angle_degrees: f64,
    pub min_overlap_ratio: f64,
    pub min_pair_count: usize,
}

impl Default for CorteSecoConfig {
    fn default() -> Self {
        CorteSecoConfig {
            enabled: true,
            target_semantic_types: vec![SemanticType::Serrilha, SemanticType::SerrilhaMista],
            min_length_millimeters: 5.0,
            max_offset_millimeters: 2.0,
            max_parallel_angle_degrees: 5.0,
            min_overlap_ratio: 0.5,
            min_pair_count: 1,
        }
    }
}

/// A single `value >= threshold -> weight` rule used throughout the scorer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Threshold {
    pub threshold: f64,
    pub weight: f64,
}

/// Min-arc-radius scoring knobs (`§4.8`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MinRadiusScoring {
    pub danger_threshold: f64,
    pub penalty_weight: f64,
    pub corte_seco_adjustment: f64,
    pub corte_seco_pair_thresholds: Vec<Threshold>,
}

impl Default for MinRadiusScoring {
    fn default() -> Self {
        MinRadiusScoring {
            danger_threshold: 1.0,
            penalty_weight: 0.6,
            corte_seco_adjustment: -0.3,
            corte_seco_pair_thresholds: vec![Threshold { threshold: 3.0, weight: 0.2 }],
        }
    }
}

/// Serrilha-related scoring knobs (`§4.8`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerrilhaScoring {
    pub presence_weight: f64,
    pub mista_thresholds: Vec<Threshold>,
    pub travada_thresholds: Vec<Threshold>,
    pub zipper_thresholds: Vec<Threshold>,
    pub manual_blade_codes: Vec<String>,
    pub manual_blade_weight: f64,
    pub diversity_threshold: u32,
    pub diversity_weight: f64,
    pub distinct_blade_threshold: u32,
    pub distinct_blade_weight: f64,
    pub cola_semantic_hints: Vec<String>,
    pub cola_weight: f64,
    pub cola_count_thresholds: Vec<Threshold>,
    pub small_piece_max_count: u32,
    pub small_piece_max_total_length: f64,
    pub small_piece_adjustment: f64,
}

impl Default for SerrilhaScoring {
    fn default() -> Self {
        SerrilhaScoring {
            presence_weight: 0.3,
            mista_thresholds: vec![Threshold { threshold: 1.0, weight: 0.4 }],
            travada_thresholds: vec![Threshold { threshold: 1.0, weight: 0.4 }],
            zipper_thresholds: vec![Threshold { threshold: 1.0, weight: 0.6 }],
            manual_blade_codes: vec![],
            manual_blade_weight: 0.5,
            diversity_threshold: 3,
            diversity_weight: 0.3,
            distinct_blade_threshold: 3,
            distinct_blade_weight: 0.2,
            cola_semantic_hints: vec!["cola".into(), "selagem".into()],
            cola_weight: 0.3,
            cola_count_thresholds: vec![Threshold { threshold: 2.0, weight: 0.2 }],
            small_piece_max_count: 2,
            small_piece_max_total_length: 20.0,
            small_piece_adjustment: -0.2,
        }
    }
}

/// Closed-loop scoring knobs (`§4.8`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClosedLoopScoring {
    pub count_thresholds: Vec<Threshold>,
    pub variety_threshold: u32,
    pub variety_weight: f64,
    pub density_thresholds: Vec<Threshold>,
}

impl Default for ClosedLoopScoring {
    fn default() -> Self {
        ClosedLoopScoring {
            count_thresholds: vec![
                Threshold { threshold: 5.0, weight: 0.2 },
                Threshold { threshold: 10.0, weight: 0.4 },
            ],
            variety_threshold: 2,
            variety_weight: 0.2,
            density_thresholds: vec![Threshold { threshold: 0.5, weight: 0.2 }],
        }
    }
}

/// Three-point crease scoring knobs (`§4.8`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreePtScoring {
    pub length_thresholds: Vec<Threshold>,
    pub segment_thresholds: Vec<Threshold>,
    pub ratio_thresholds: Vec<Threshold>,
    pub manual_handling_weight: f64,
}

impl Default for ThreePtScoring {
    fn default() -> Self {
        ThreePtScoring {
            length_thresholds: vec![Threshold { threshold: 100.0, weight: 0.5 }],
            segment_thresholds: vec![Threshold { threshold: 10.0, weight: 0.5 }],
            ratio_thresholds: vec![Threshold { threshold: 1.0, weight: 0.5 }],
            manual_handling_weight: 0.5,
        }
    }
}

/// Curve-density scoring knobs (`§4.8`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveDensityScoring {
    pub density_thresholds: Vec<Threshold>,
    pub delicate_arc_count_thresholds: Vec<Threshold>,
}

impl Default for CurveDensityScoring {
    fn default() -> Self {
        CurveDensityScoring {
            density_thresholds: vec![Threshold { threshold: 0.1, weight: 0.2 }],
            delicate_arc_count_thresholds: vec![Threshold { threshold: 5.0, weight: 0.2 }],
        }
    }
}

/// Top-level scoring configuration (`§4.8`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub total_cut_length_threshold: f64,
    pub total_cut_length_weight: f64,
    pub num_curves_threshold: f64,
    pub num_curves_weight: f64,
    pub num_curves_extra_thresholds: Vec<Threshold>,
    pub num_curves_step: f64,
    pub num_curves_step_weight: f64,
    pub num_curves_step_max_contribution: f64,
    pub min_radius: MinRadiusScoring,
    pub bonus_intersections_threshold: f64,
    pub bonus_intersections_weight: f64,
    pub intersections_extra_thresholds: Vec<Threshold>,
    pub dangling_ends_thresholds: Vec<Threshold>,
    pub serrilha: SerrilhaScoring,
    pub closed_loops: ClosedLoopScoring,
    pub three_pt: ThreePtScoring,
    pub curve_density: CurveDensityScoring,
    pub special_material_default_weight: f64,
    pub special_material_weights: HashMap<String, f64>,
    pub max_score: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            total_cut_length_threshold: 500.0,
            total_cut_length_weight: 0.3,
            num_curves_threshold: 10.0,
            num_curves_weight: 0.3,
            num_curves_extra_thresholds: vec![Threshold { threshold: 50.0, weight: 0.3 }],
            num_curves_step: 10.0,
            num_curves_step_weight: 0.05,
            num_curves_step_max_contribution: 0.5,
            min_radius: MinRadiusScoring::default(),
            bonus_intersections_threshold: 3.0,
            bonus_intersections_weight: 0.2,
            intersections_extra_thresholds: vec![Threshold { threshold: 10.0, weight: 0.2 }],
            dangling_ends_thresholds: vec![Threshold { threshold: 1.0, weight: 0.3 }],
            serrilha: SerrilhaScoring::default(),
            closed_loops: ClosedLoopScoring::default(),
            three_pt: ThreePtScoring::default(),
            curve_density: CurveDensityScoring::default(),
            special_material_default_weight: 0.2,
            special_material_weights: HashMap::new(),
            max_score: 5.0,
        }
    }
}

/// Object-store provider tunables (`§4.10`, `§6`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageStorageConfig {
    pub provider: StorageProvider,
    pub bucket: String,
    pub key_prefix: String,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub path_style: bool,
    pub public_base_url: Option<String>,
    pub skip_if_exists: bool,
    pub upload_timeout_ms: u64,
    pub upload_retries: u32,
}

impl Default for ImageStorageConfig {
    fn default() -> Self {
        ImageStorageConfig {
            provider: StorageProvider::None,
            bucket: String::new(),
            key_prefix: String::new(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            path_style: true,
            public_base_url: None,
            skip_if_exists: true,
            upload_timeout_ms: 10_000,
            upload_retries: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    None,
    S3,
}

/// Telemetry configuration (`§6`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub meter_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        TelemetryConfig {
            meter_name: "facas.analysis".into(),
        }
    }
}

/// The full configuration surface from `§6`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub watch_folder: String,
    pub output_image_folder: String,
    pub cache_folder: String,
    pub rabbit_queue_request: String,
    pub rabbit_queue_result: String,
    pub default_unit: String,
    pub image_dpi: f64,
    pub image_padding: f64,
    pub persist_local_image_copy: bool,
    pub parallelism: usize,
    pub reprocess_same_hash: bool,
    pub parse_timeout_ms: u64,
    pub render_timeout_ms: u64,
    pub tolerances: Tolerances,
    pub layer_mapping: LayerMapping,
    pub special_material_layer_mapping: HashMap<String, Vec<String>>,
    pub serrilha: SerrilhaConfig,
    pub scoring: ScoringConfig,
    pub corte_seco: CorteSecoConfig,
    pub image_storage: ImageStorageConfig,
    pub telemetry: TelemetryConfig,
    pub version: String,
    pub shadow_mode: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            watch_folder: "./watch".into(),
            output_image_folder: "./images".into(),
            cache_folder: "./cache".into(),
            rabbit_queue_request: "facas.analysis.request".into(),
            rabbit_queue_result: "facas.analysis.result".into(),
            default_unit: "mm".into(),
            image_dpi: 96.0,
            image_padding: 0.05,
            persist_local_image_copy: false,
            parallelism: std::cmp::max(1, num_cpus_heuristic() / 2),
            reprocess_same_hash: false,
            parse_timeout_ms: 15_000,
            render_timeout_ms: 10_000,
            tolerances: Tolerances::default(),
            layer_mapping: default_layer_mapping(),
            special_material_layer_mapping: default_special_material_mapping(),
            serrilha: SerrilhaConfig::default(),
            scoring: ScoringConfig::default(),
            corte_seco: CorteSecoConfig::default(),
            image_storage: ImageStorageConfig::default(),
            telemetry: TelemetryConfig::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            shadow_mode: false,
        }
    }
}

/// `std::thread::available_parallelism` without pulling in a dependency just
/// for the default-config heuristic.
fn num_cpus_heuristic() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_internally_consistent() {
        let cfg = EngineConfig::default();
        assert!(cfg.parallelism >= 1);
        assert!(cfg.scoring.max_score > 0.0);
        assert!(cfg.layer_mapping.contains_key(&SemanticType::Corte));
    }

    #[test]
    fn semantic_type_round_trips_through_serde() {
        let json = serde_json::to_string(&SemanticType::SerrilhaMista).unwrap();
        assert_eq!(json, "\"serrilha_mista\"");
        let back: SemanticType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SemanticType::SerrilhaMista);
    }
}
