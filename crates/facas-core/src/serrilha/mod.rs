//! Serrilha (perforation blade) recognition (`§4.5`).

pub mod classification;
pub mod insert_detector;
pub mod text_detector;

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::SerrilhaConfig;
use crate::document::Document;
use crate::errors::SerrilhaError;

use classification::{classify_entry, Classification};

/// One recognized blade, indexed by (semantic type, blade code).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerrilhaEntry {
    pub semantic_type: String,
    pub blade_code: String,
    pub count: u32,
    pub symbol_names: BTreeSet<String>,
    pub estimated_length: f64,
    pub estimated_tooth_count: f64,
}

/// The enriched recognizer output (`§3`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerrilhaSummary {
    pub total_count: u32,
    pub unknown_count: u32,
    pub unknown_symbols: Vec<String>,
    pub entries: Vec<SerrilhaEntry>,
    pub distinct_semantic_types: u32,
    pub distinct_blade_codes: u32,
    pub classification: Classification,
    pub total_estimated_length: Option<f64>,
    pub average_estimated_length: Option<f64>,
    pub is_corte_seco: bool,
    pub corte_seco_blade_codes: Vec<String>,
}

fn normalize_key(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

/// Run both sub-detectors and enrich the result (`§4.5`).
pub fn recognize(document: &Document, config: &SerrilhaConfig, mm_per_unit: f64) -> Result<SerrilhaSummary, SerrilhaError> {
    let (insert_hits, unknown_inserts) =
        insert_detector::detect(document, &config.symbols, mm_per_unit, config.insert_explode_depth_limit)?;
    let text_hits = text_detector::detect(document, &config.text_symbols)?;

    let mut entries: HashMap<(String, String), SerrilhaEntry> = HashMap::new();
    let mut total_count = 0u32;

    for hit in insert_hits {
        total_count += 1;
        let semantic_type = hit.semantic_type.as_str().to_string();
        let blade_code = hit.blade_code;
        let key = (normalize_key(&semantic_type), normalize_key(&blade_code));
        let entry = entries.entry(key).or_insert_with(|| SerrilhaEntry {
            semantic_type: semantic_type.clone(),
            blade_code: blade_code.clone(),
            count: 0,
            symbol_names: BTreeSet::new(),
            estimated_length: 0.0,
            estimated_tooth_count: 0.0,
        });
        entry.count += 1;
        entry.symbol_names.insert(hit.symbol_name);
        entry.estimated_length += if hit.estimated_length > 0.0 { hit.estimated_length } else { config.default_length };
        entry.estimated_tooth_count += config.default_tooth_count;
    }

    for hit in text_hits {
        total_count += 1;
        let key = (normalize_key(&hit.semantic_type), normalize_key(&hit.blade_code));
        let entry = entries.entry(key).or_insert_with(|| SerrilhaEntry {
            semantic_type: hit.semantic_type.clone(),
            blade_code: hit.blade_code.clone(),
            count: 0,
            symbol_names: BTreeSet::new(),
            estimated_length: 0.0,
            estimated_tooth_count: 0.0,
        });
        entry.count += 1;
        entry.symbol_names.insert(hit.symbol_name);
        entry.estimated_length += hit.length.unwrap_or(config.default_length);
        entry.estimated_tooth_count += hit.tooth_count.unwrap_or(config.default_tooth_count);
    }

    let mut entries: Vec<SerrilhaEntry> = entries.into_values().collect();
    entries.sort_by(|a, b| (a.semantic_type.clone(), a.blade_code.clone()).cmp(&(b.semantic_type.clone(), b.blade_code.clone())));

    let distinct_semantic_types = entries
        .iter()
        .map(|e| normalize_key(&e.semantic_type))
        .collect::<std::collections::HashSet<_>>()
        .len() as u32;
    let distinct_blade_codes = entries
        .iter()
        .map(|e| normalize_key(&e.blade_code))
        .collect::<std::collections::HashSet<_>>()
        .len() as u32;

    let mut classification = Classification::default();
    for entry in &entries {
        let symbol_names: Vec<String> = entry.symbol_names.iter().cloned().collect();
        let class = classify_entry(&entry.semantic_type, &entry.blade_code, &symbol_names);
        classification.simple += class.simple * entry.count;
        classification.mista += class.mista * entry.count;
        classification.zipper += class.zipper * entry.count;
        classification.travada += class.travada * entry.count;
    }

    let lengths: Vec<f64> = entries.iter().map(|e| e.estimated_length).filter(|&l| l > 0.0).collect();
    let total_estimated_length = if lengths.is_empty() { None } else { Some(lengths.iter().sum()) };
    let average_estimated_length = total_estimated_length.map(|t| t / lengths.len() as f64);

    let corte_seco_blade_codes = duplicated_blade_codes(&entries);

    Ok(SerrilhaSummary {
        total_count,
        unknown_count: unknown_inserts.len() as u32,
        unknown_symbols: unknown_inserts,
        entries,
        distinct_semantic_types,
        distinct_blade_codes,
        classification,
        total_estimated_length,
        average_estimated_length,
        is_corte_seco: false,
        corte_seco_blade_codes,
    })
}

/// Blade codes (normalized to alphanumerics) shared by two or more
/// entries — the corte-seco precondition (`§4.6`).
fn duplicated_blade_codes(entries: &[SerrilhaEntry]) -> Vec<String> {
    let mut counts: HashMap<String, Vec<String>> = HashMap::new();
    for entry in entries {
        let normalized: String = entry.blade_code.chars().filter(|c| c.is_alphanumeric()).collect::<String>().to_ascii_lowercase();
        if normalized.is_empty() {
            continue;
        }
        counts.entry(normalized).or_default().push(entry.blade_code.clone());
    }
    let mut duplicated: Vec<String> = counts
        .into_iter()
        .filter(|(_, codes)| codes.len() >= 2)
        .map(|(_, codes)| codes[0].clone())
        .collect();
    duplicated.sort();
    duplicated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, Entity};

    #[test]
    fn text_only_document_produces_two_entries() {
        let mut document = Document::default();
        document.entities.push(Entity::Text {
            layer: "serrilha".into(),
            value: "X=2x1 23,8 12d Y=10x0.4 11,5 24d".into(),
        });

        let config = SerrilhaConfig::default();
        let summary = recognize(&document, &config, 1.0).unwrap();
        assert_eq!(summary.total_count, 2);
        assert_eq!(summary.entries.len(), 2);
        assert_eq!(summary.distinct_semantic_types, 2);
    }

    #[test]
    fn no_entities_gives_empty_summary() {
        let document = Document::default();
        let config = SerrilhaConfig::default();
        let summary = recognize(&document, &config, 1.0).unwrap();
        assert_eq!(summary.total_count, 0);
        assert!(summary.entries.is_empty());
        assert_eq!(summary.total_estimated_length, None);
    }
}
