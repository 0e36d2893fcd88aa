//! Serrilha classification keywords (`§4.5`): diacritic- and
//! separator-insensitive keyword matching over semantic type, blade code
//! and symbol names.

/// Counts of entries matching each classification keyword group, plus the
/// number of distinct non-empty classes (`§3`, `§4.5`).
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Classification {
    pub simple: u32,
    pub mista: u32,
    pub zipper: u32,
    pub travada: u32,
}

impl Classification {
    pub fn distinct_categories(&self) -> u32 {
        [self.simple, self.mista, self.zipper, self.travada]
            .into_iter()
            .filter(|&c| c > 0)
            .count() as u32
    }
}

const MISTA_KEYWORDS: &[&str] = &["MISTA", "MIXTA"];
const ZIPPER_KEYWORDS: &[&str] = &["ZIP", "ZIPER", "ZIPPER"];
const TRAVADA_KEYWORDS: &[&str] = &[
    "TRAV", "TRAVA", "TRAVADA", "RANH", "RANHURA", "RANHURAS", "SELCOLA", "SEL COLA", "SELAGEM",
    "SELADO",
];

/// Strip diacritics and normalize separators the way the keyword table
/// expects (`§4.5`): uppercase, drop whitespace/underscore/hyphen/slash,
/// fold accented Latin letters to their base form.
pub fn normalize(input: &str) -> String {
    input
        .chars()
        .filter_map(strip_diacritic)
        .filter(|c| !matches!(c, ' ' | '_' | '-' | '/'))
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn strip_diacritic(c: char) -> Option<char> {
    let folded = match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => 'u',
        'ç' | 'Ç' => 'c',
        other => other,
    };
    Some(folded)
}

/// Classify one entry's semantic type + blade code + symbol names against
/// the keyword table. An entry may land in more than one class.
pub fn classify_entry(semantic_type: &str, blade_code: &str, symbol_names: &[String]) -> Classification {
    let mut haystack = String::new();
    haystack.push_str(semantic_type);
    haystack.push(' ');
    haystack.push_str(blade_code);
    for name in symbol_names {
        haystack.push(' ');
        haystack.push_str(name);
    }
    let normalized = normalize(&haystack);

    let mut class = Classification::default();
    if MISTA_KEYWORDS.iter().any(|kw| normalized.contains(kw)) {
        class.mista = 1;
    }
    if ZIPPER_KEYWORDS.iter().any(|kw| normalized.contains(&normalize(kw))) {
        class.zipper = 1;
    }
    if TRAVADA_KEYWORDS.iter().any(|kw| normalized.contains(&normalize(kw))) {
        class.travada = 1;
    }
    if class.distinct_categories() == 0 {
        class.simple = 1;
    }
    class
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_accented_text_matches_travada_keyword() {
        let class = classify_entry("serrilha", "2x1", &["Travada com ranhura".to_string()]);
        assert_eq!(class.travada, 1);
        assert_eq!(class.simple, 0);
    }

    #[test]
    fn unmatched_entry_is_simple() {
        let class = classify_entry("serrilha", "3x2", &["SERR_BLADE_01".to_string()]);
        assert_eq!(class.simple, 1);
        assert_eq!(class.distinct_categories(), 1);
    }

    #[test]
    fn mista_and_travada_can_coexist() {
        let class = classify_entry("serrilha_mista", "2x1", &["travada mista".to_string()]);
        assert_eq!(class.mista, 1);
        assert_eq!(class.travada, 1);
        assert_eq!(class.distinct_categories(), 2);
    }
}
