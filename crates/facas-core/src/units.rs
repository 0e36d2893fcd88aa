//! Unit resolver (`§4.1`): maps a document's declared drawing units to a
//! millimetre scale factor.

use crate::errors::UnitError;

/// A resolved unit: the multiplier needed to convert a document-unit length
/// into millimetres, plus the canonical label stored in metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedUnit {
    pub millimeters_per_unit: f64,
    pub label: UnitLabel,
}

/// Canonical unit labels recognized by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitLabel {
    Mm,
    Cm,
    M,
    In,
    Ft,
    Dm,
    Dam,
    Hm,
    Km,
    Um,
    Nm,
    Uin,
    Mil,
    Yd,
    Mi,
}

impl UnitLabel {
    fn millimeters_per_unit(self) -> f64 {
        match self {
            UnitLabel::Mm => 1.0,
            UnitLabel::Cm => 10.0,
            UnitLabel::M => 1000.0,
            UnitLabel::In => 25.4,
            UnitLabel::Ft => 304.8,
            UnitLabel::Dm => 100.0,
            UnitLabel::Dam => 10_000.0,
            UnitLabel::Hm => 100_000.0,
            UnitLabel::Km => 1_000_000.0,
            UnitLabel::Um => 0.001,
            UnitLabel::Nm => 0.000_001,
            UnitLabel::Uin => 0.0000254,
            UnitLabel::Mil => 0.0254,
            UnitLabel::Yd => 914.4,
            UnitLabel::Mi => 1_609_344.0,
        }
    }

    /// Canonical short label stored in metrics (`§3`).
    pub fn as_str(self) -> &'static str {
        match self {
            UnitLabel::Mm => "mm",
            UnitLabel::Cm => "cm",
            UnitLabel::M => "m",
            UnitLabel::In => "in",
            UnitLabel::Ft => "ft",
            UnitLabel::Dm => "dm",
            UnitLabel::Dam => "dam",
            UnitLabel::Hm => "hm",
            UnitLabel::Km => "km",
            UnitLabel::Um => "um",
            UnitLabel::Nm => "nm",
            UnitLabel::Uin => "uin",
            UnitLabel::Mil => "mil",
            UnitLabel::Yd => "yd",
            UnitLabel::Mi => "mi",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mm" | "millimeter" | "millimeters" | "millimetre" | "millimetres" => {
                Some(UnitLabel::Mm)
            }
            "cm" | "centimeter" | "centimeters" => Some(UnitLabel::Cm),
            "m" | "meter" | "meters" | "metre" | "metres" => Some(UnitLabel::M),
            "in" | "inch" | "inches" | "\"" => Some(UnitLabel::In),
            "ft" | "foot" | "feet" | "'" => Some(UnitLabel::Ft),
            "dm" | "decimeter" | "decimeters" => Some(UnitLabel::Dm),
            "dam" | "decameter" | "decameters" => Some(UnitLabel::Dam),
            "hm" | "hectometer" | "hectometers" => Some(UnitLabel::Hm),
            "km" | "kilometer" | "kilometers" => Some(UnitLabel::Km),
            "um" | "micrometer" | "micrometers" | "micron" | "microns" => Some(UnitLabel::Um),
            "nm" | "nanometer" | "nanometers" => Some(UnitLabel::Nm),
            "uin" | "microinch" | "microinches" => Some(UnitLabel::Uin),
            "mil" | "thou" => Some(UnitLabel::Mil),
            "yd" | "yard" | "yards" => Some(UnitLabel::Yd),
            "mi" | "mile" | "miles" => Some(UnitLabel::Mi),
            _ => None,
        }
    }
}

/// Declared drawing units as read off the document header.
///
/// `Unitless` is the dxf `$INSUNITS = 0` case — the resolver then falls
/// back to the configured default unit name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredUnits {
    Named(String),
    Unitless,
}

/// Resolve a document's declared units to a millimetre scale factor.
///
/// Only fails when the document is unitless and the configured default is
/// itself unrecognized.
pub fn resolve_units(declared: &DeclaredUnits, default_unit: &str) -> Result<ResolvedUnit, UnitError> {
    let name = match declared {
        DeclaredUnits::Named(name) => name.as_str(),
        DeclaredUnits::Unitless => default_unit,
    };

    let label = UnitLabel::parse(name)
        .ok_or_else(|| UnitError::InvalidUnit(name.to_string()))?;

    Ok(ResolvedUnit {
        millimeters_per_unit: label.millimeters_per_unit(),
        label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mm_is_identity() {
        let resolved = resolve_units(&DeclaredUnits::Named("mm".into()), "mm").unwrap();
        assert_eq!(resolved.millimeters_per_unit, 1.0);
        assert_eq!(resolved.label, UnitLabel::Mm);
    }

    #[test]
    fn inches_convert() {
        let resolved = resolve_units(&DeclaredUnits::Named("in".into()), "mm").unwrap();
        assert!((resolved.millimeters_per_unit - 25.4).abs() < 1e-9);
    }

    #[test]
    fn unitless_falls_back_to_default() {
        let resolved = resolve_units(&DeclaredUnits::Unitless, "cm").unwrap();
        assert_eq!(resolved.label, UnitLabel::Cm);
        assert_eq!(resolved.millimeters_per_unit, 10.0);
    }

    #[test]
    fn unitless_with_unknown_default_fails() {
        let err = resolve_units(&DeclaredUnits::Unitless, "furlong").unwrap_err();
        assert!(matches!(err, UnitError::InvalidUnit(_)));
    }

    #[test]
    fn mil_and_microinch_are_distinct() {
        let mil = resolve_units(&DeclaredUnits::Named("mil".into()), "mm").unwrap();
        let uin = resolve_units(&DeclaredUnits::Named("uin".into()), "mm").unwrap();
        assert!((mil.millimeters_per_unit - 0.0254).abs() < 1e-12);
        assert!((uin.millimeters_per_unit - 0.0000254).abs() < 1e-12);
    }
}
