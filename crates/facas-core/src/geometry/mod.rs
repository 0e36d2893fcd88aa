//! Planar geometry: tessellation, segment graph, loop detection,
//! intersections and bounding box (`§4.3`, `§4.4`, `§4.7`).

pub mod bounding_box;
pub mod extractor;
pub mod intersections;
pub mod loops;
pub mod segment;
pub mod tessellate;

pub use bounding_box::Extents;
pub use segment::Segment;
