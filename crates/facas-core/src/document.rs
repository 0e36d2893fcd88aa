//! The drawing document model (`§3`).
//!
//! Geometry extraction, serrilha recognition and scoring are pure functions
//! over this model, never over `dxf::Drawing` directly — that keeps the
//! hardest part of the engine testable with hand-built fixtures instead of
//! real DXF bytes.

use crate::units::DeclaredUnits;
use std::collections::HashMap;

/// A point in the document's native (unscaled) 2-D plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Point2 { x, y }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub point: Point2,
    /// Bulge factor to the *next* vertex (0 = straight segment).
    pub bulge: f64,
}

/// One CAD entity in its native representation, already stripped of
/// anything the engine does not need (colors, linetypes, block handles).
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Line {
        layer: String,
        start: Point2,
        end: Point2,
    },
    Arc {
        layer: String,
        center: Point2,
        radius: f64,
        start_angle_rad: f64,
        end_angle_rad: f64,
    },
    Circle {
        layer: String,
        center: Point2,
        radius: f64,
    },
    Polyline2D {
        layer: String,
        vertices: Vec<Vertex>,
        closed: bool,
    },
    Polyline3D {
        layer: String,
        points: Vec<Point2>,
        closed: bool,
    },
    Spline {
        layer: String,
        control_points: Vec<Point2>,
    },
    Ellipse {
        layer: String,
        center: Point2,
        major_axis_end: Point2,
        minor_to_major_ratio: f64,
        start_param: f64,
        end_param: f64,
    },
    Insert {
        layer: String,
        block_name: String,
        insertion_point: Point2,
        attributes: Vec<Attribute>,
    },
    Text {
        layer: String,
        value: String,
    },
    MText {
        layer: String,
        value: String,
    },
}

impl Entity {
    pub fn layer(&self) -> &str {
        match self {
            Entity::Line { layer, .. }
            | Entity::Arc { layer, .. }
            | Entity::Circle { layer, .. }
            | Entity::Polyline2D { layer, .. }
            | Entity::Polyline3D { layer, .. }
            | Entity::Spline { layer, .. }
            | Entity::Ellipse { layer, .. }
            | Entity::Insert { layer, .. }
            | Entity::Text { layer, .. }
            | Entity::MText { layer, .. } => layer,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub tag: String,
    pub value: String,
}

/// A block definition, needed to recursively explode inserts (`§4.3`).
#[derive(Debug, Clone, Default)]
pub struct BlockDef {
    pub entities: Vec<Entity>,
    /// Nested inserts referencing other blocks by name.
    pub inserts: Vec<(String, Point2)>,
}

/// An immutable, already-parsed CAD document.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub declared_units: Option<DeclaredUnits>,
    pub entities: Vec<Entity>,
    pub blocks: HashMap<String, BlockDef>,
    /// Raw `$ACADVER` style version code, kept for diagnostics only.
    pub version_code: String,
}

impl Document {
    pub fn declared_units(&self) -> DeclaredUnits {
        self.declared_units
            .clone()
            .unwrap_or(DeclaredUnits::Unitless)
    }
}
