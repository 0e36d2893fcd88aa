//! Text/mtext serrilha detection (`§4.5`, text sub-detector).

use regex::Regex;

use crate::config::SerrilhaTextMatcher;
use crate::document::{Document, Entity};
use crate::errors::SerrilhaError;

struct CompiledTextMatcher<'a> {
    spec: &'a SerrilhaTextMatcher,
    regex: Regex,
}

pub struct TextDetection {
    pub semantic_type: String,
    pub blade_code: String,
    pub symbol_name: String,
    pub length: Option<f64>,
    pub tooth_count: Option<f64>,
}

fn compile<'a>(matchers: &'a [SerrilhaTextMatcher]) -> Result<Vec<CompiledTextMatcher<'a>>, SerrilhaError> {
    matchers
        .iter()
        .map(|spec| {
            let regex = Regex::new(&spec.pattern).map_err(|source| SerrilhaError::InvalidPattern {
                pattern: spec.pattern.clone(),
                source,
            })?;
            Ok(CompiledTextMatcher { spec, regex })
        })
        .collect()
}

/// Run every configured text matcher against every text/mtext value
/// (`§4.5`). `AllowMultipleMatches` iterates all non-overlapping matches in
/// one value; otherwise only the first.
pub fn detect(document: &Document, matchers: &[SerrilhaTextMatcher]) -> Result<Vec<TextDetection>, SerrilhaError> {
    let compiled = compile(matchers)?;
    let mut detections = Vec::new();

    for entity in &document.entities {
        let value = match entity {
            Entity::Text { value, .. } | Entity::MText { value, .. } => value,
            _ => continue,
        };

        for matcher in &compiled {
            if matcher.spec.allow_multiple_matches {
                for caps in matcher.regex.captures_iter(value) {
                    detections.push(build_detection(matcher.spec, &caps));
                }
            } else if let Some(caps) = matcher.regex.captures(value) {
                detections.push(build_detection(matcher.spec, &caps));
            }
        }
    }

    Ok(detections)
}

fn build_detection(spec: &SerrilhaTextMatcher, caps: &regex::Captures) -> TextDetection {
    let semantic_type = resolve_semantic_type(spec, caps);
    let blade_code = resolve_blade_code(spec, caps);
    let length = resolve_length(spec, caps);
    let tooth_count = resolve_tooth_count(spec, caps);
    let symbol_name = caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default();

    TextDetection { semantic_type, blade_code, symbol_name, length, tooth_count }
}

fn resolve_semantic_type(spec: &SerrilhaTextMatcher, caps: &regex::Captures) -> String {
    if let Some(group) = &spec.semantic_type_group {
        let raw = caps.name(group).map(|m| m.as_str().to_string()).unwrap_or_default();
        let raw = if spec.uppercase_semantic_type { raw.to_ascii_uppercase() } else { raw };
        match &spec.semantic_type_format {
            Some(format) => format.replacen("{}", &raw, 1),
            None => raw,
        }
    } else {
        spec.semantic_type.map(|s| s.as_str().to_string()).unwrap_or_default()
    }
}

fn resolve_blade_code(spec: &SerrilhaTextMatcher, caps: &regex::Captures) -> String {
    if let Some(group) = &spec.blade_code_group {
        if let Some(m) = caps.name(group) {
            let raw = m.as_str().to_string();
            return if spec.uppercase_blade_code { raw.to_ascii_uppercase() } else { raw };
        }
    }
    spec.blade_code_literal.clone().unwrap_or_default()
}

fn resolve_length(spec: &SerrilhaTextMatcher, caps: &regex::Captures) -> Option<f64> {
    if let Some(group) = &spec.length_group {
        if let Some(m) = caps.name(group) {
            let normalized = m.as_str().replace(',', ".");
            if let Ok(value) = normalized.parse::<f64>() {
                let scale = if spec.length_scale == 0.0 { 1.0 } else { spec.length_scale };
                return Some(value * scale);
            }
        }
    }
    spec.default_length
}

fn resolve_tooth_count(spec: &SerrilhaTextMatcher, caps: &regex::Captures) -> Option<f64> {
    if let Some(group) = &spec.tooth_count_group {
        if let Some(m) = caps.name(group) {
            let normalized = m.as_str().replace(',', ".");
            if let Ok(value) = normalized.parse::<f64>() {
                return Some(value);
            }
        }
    }
    spec.default_tooth_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn default_matchers() -> Vec<SerrilhaTextMatcher> {
        vec![SerrilhaTextMatcher {
            pattern: r"(?i)(?P<sem>[XY])\s*=?\s*(?P<code>\d+x[\d.]+)\s+(?P<len>[\d,.]+)\s+(?P<teeth>\d+)\s*d".into(),
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

    #[test]
    fn two_annotations_in_one_text_value_both_match() {
        let mut document = Document::default();
        document.entities.push(Entity::Text {
            layer: "serrilha".into(),
            value: "X=2x1 23,8 12d Y=10x0.4 11,5 24d".into(),
        });

        let matchers = default_matchers();
        let detections = detect(&document, &matchers).unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].semantic_type, "serrilha_X");
        assert_eq!(detections[0].blade_code, "2x1");
        assert!((detections[0].length.unwrap() - 23.8).abs() < 1e-9);
        assert_eq!(detections[0].tooth_count, Some(12.0));
        assert_eq!(detections[1].semantic_type, "serrilha_Y");
        assert_eq!(detections[1].blade_code, "10x0.4");
    }
}
