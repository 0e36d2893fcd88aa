//! CAD document loading (`§3`): the only place that names `dxf` types.
//!
//! Everything downstream (`facas_core::geometry`, `serrilha`, `scoring`)
//! operates on [`facas_core::document::Document`], never on
//! `dxf::Drawing` directly, so the hardest parts of the engine stay
//! testable with hand-built fixtures instead of real DXF bytes.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use dxf::entities::EntityType;
use dxf::enums::Units;
use dxf::Drawing;
use tracing::warn;

use facas_core::document::{BlockDef, Document, Entity, Point2, Vertex};
use facas_core::units::DeclaredUnits;

use crate::errors::WorkerError;

pub fn load_document(path: &Path) -> Result<Document, WorkerError> {
    if !path.exists() {
        return Err(WorkerError::FileMissing(path.display().to_string()));
    }

    let bytes = std::fs::read(path).map_err(|e| WorkerError::FileMissing(e.to_string()))?;

    let drawing = match Drawing::load(&mut Cursor::new(&bytes)) {
        Ok(drawing) => drawing,
        Err(first_err) => {
            warn!(error = %first_err, "dxf parse failed, retrying once with an upgraded header version");
            let upgraded = upgrade_header_version(&bytes);
            Drawing::load(&mut Cursor::new(&upgraded))
                .map_err(|_| WorkerError::UnsupportedCadVersion(first_err.to_string()))?
        }
    };

    let declared_units = units_to_declared(drawing.header.default_drawing_units);
    let mut entities = Vec::new();
    for entity in drawing.entities() {
        if let Some(converted) = convert_entity(&entity.common.layer, &entity.specific) {
            entities.push(converted);
        }
    }

    let mut blocks = HashMap::new();
    for block in drawing.blocks() {
        let mut block_entities = Vec::new();
        let mut inserts = Vec::new();
        for entity in &block.entities {
            if let EntityType::Insert(insert) = &entity.specific {
                inserts.push((insert.name.clone(), Point2::new(insert.location.x, insert.location.y)));
            }
            if let Some(converted) = convert_entity(&entity.common.layer, &entity.specific) {
                block_entities.push(converted);
            }
        }
        blocks.insert(block.name.clone(), BlockDef { entities: block_entities, inserts });
    }

    Ok(Document {
        declared_units: Some(declared_units),
        entities,
        blocks,
        version_code: format!("{:?}", drawing.header.version),
    })
}

fn units_to_declared(units: Units) -> DeclaredUnits {
    let name = match units {
        Units::Unitless => return DeclaredUnits::Unitless,
        Units::Inches => "in",
        Units::Feet => "ft",
        Units::Miles => "mi",
        Units::Millimeters => "mm",
        Units::Centimeters => "cm",
        Units::Meters => "m",
        Units::Kilometers => "km",
        Units::Microinches => "uin",
        Units::Mils => "mil",
        Units::Yards => "yd",
        Units::Decimeters => "dm",
        Units::Decameters => "dam",
        Units::Hectometers => "hm",
        _ => return DeclaredUnits::Unitless,
    };
    DeclaredUnits::Named(name.to_string())
}

fn convert_entity(layer: &str, specific: &EntityType) -> Option<Entity> {
    let layer = layer.to_string();
    match specific {
        EntityType::Line(line) => Some(Entity::Line {
            layer,
            start: Point2::new(line.p1.x, line.p1.y),
            end: Point2::new(line.p2.x, line.p2.y),
        }),
        EntityType::Arc(arc) => Some(Entity::Arc {
            layer,
            center: Point2::new(arc.center.x, arc.center.y),
            radius: arc.radius,
            start_angle_rad: arc.start_angle.to_radians(),
            end_angle_rad: arc.end_angle.to_radians(),
        }),
        EntityType::Circle(circle) => Some(Entity::Circle {
            layer,
            center: Point2::new(circle.center.x, circle.center.y),
            radius: circle.radius,
        }),
        EntityType::LwPolyline(lwpolyline) => {
            let vertices = lwpolyline
                .vertices
                .iter()
                .map(|v| Vertex { point: Point2::new(v.x, v.y), bulge: v.bulge })
                .collect();
            Some(Entity::Polyline2D { layer, vertices, closed: lwpolyline.is_closed() })
        }
        EntityType::Polyline(polyline) => {
            let vertices: Vec<Vertex> = polyline
                .vertices()
                .map(|v| Vertex { point: Point2::new(v.location.x, v.location.y), bulge: v.bulge })
                .collect();
            if polyline.is_3d_polyline() {
                Some(Entity::Polyline3D {
                    layer,
                    points: vertices.into_iter().map(|v| v.point).collect(),
                    closed: polyline.is_closed(),
                })
            } else {
                Some(Entity::Polyline2D { layer, vertices, closed: polyline.is_closed() })
            }
        }
        EntityType::Spline(spline) => {
            let control_points = spline.control_points.iter().map(|p| Point2::new(p.x, p.y)).collect();
            Some(Entity::Spline { layer, control_points })
        }
        EntityType::Ellipse(ellipse) => Some(Entity::Ellipse {
            layer,
            center: Point2::new(ellipse.center.x, ellipse.center.y),
            major_axis_end: Point2::new(ellipse.major_axis.x, ellipse.major_axis.y),
            minor_to_major_ratio: ellipse.minor_axis_ratio,
            start_param: ellipse.start_parameter,
            end_param: ellipse.end_parameter,
        }),
        EntityType::Insert(insert) => Some(Entity::Insert {
            layer,
            block_name: insert.name.clone(),
            insertion_point: Point2::new(insert.location.x, insert.location.y),
            // Attribute text isn't geometry-bearing for any §4 metric, so
            // attached ATTRIBs are intentionally not walked here.
            attributes: Vec::new(),
        }),
        EntityType::Text(text) => Some(Entity::Text { layer, value: text.value.clone() }),
        EntityType::MText(mtext) => Some(Entity::MText { layer, value: mtext.text.clone() }),
        _ => None,
    }
}

/// Workaround for `UnsupportedCadVersion` (`§7`): a one-shot header-version
/// upgrade, byte-substituting `AC1014` (R14) for `AC1015` (R2000) before a
/// single retry, for drawings the parser otherwise rejects outright.
pub fn upgrade_header_version(bytes: &[u8]) -> Vec<u8> {
    const FROM: &[u8] = b"AC1014";
    const TO: &[u8] = b"AC1015";
    let mut out = bytes.to_vec();
    if let Some(pos) = out.windows(FROM.len()).position(|w| w == FROM) {
        out[pos..pos + FROM.len()].copy_from_slice(TO);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_reported_as_file_missing() {
        let err = load_document(Path::new("/nonexistent/part.dxf")).unwrap_err();
        assert!(matches!(err, WorkerError::FileMissing(_)));
    }

    #[test]
    fn header_upgrade_substitutes_version_token() {
        let upgraded = upgrade_header_version(b"  AC1014  ");
        assert_eq!(upgraded, b"  AC1015  ");
    }
}
