//! Indicative PNG rendering of a die-cutting drawing (`§4.9`).
//!
//! Built on the `image` crate's `RgbImage` canvas with a hand-rolled
//! Bresenham line rasterizer and a tiny embedded bitmap font for the
//! watermark, matching how the rest of the corpus reaches for `image`
//! rather than a full vector-graphics stack for previews that are
//! explicitly non-goals for exact visual fidelity.

mod font;

use std::collections::HashMap;
use std::io::Cursor;

use image::{Rgb, RgbImage};
use thiserror::Error;
use tracing::warn;

use facas_core::config::SemanticType;
use facas_core::document::Point2;
use facas_core::geometry::{Extents, Segment};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot render an image with non-positive dimensions")]
    DegenerateCanvas,
    #[error("png encoding failed: {0}")]
    Encode(String),
}

/// A rendered preview plus the metadata the worker attaches to the result
/// (`§3`, `ImageMetadata`).
pub struct RenderedImage {
    pub width: u32,
    pub height: u32,
    pub dpi: f64,
    pub png_bytes: Vec<u8>,
}

const MAX_CANVAS_SIDE: u32 = 4096;
const MIN_BORDER_PX: f64 = 48.0;

fn semantic_color(semantic_type: SemanticType) -> Rgb<u8> {
    match semantic_type {
        SemanticType::Corte => Rgb([20, 20, 20]),
        SemanticType::Vinco => Rgb([30, 110, 200]),
        SemanticType::Serrilha => Rgb([200, 60, 30]),
        SemanticType::SerrilhaMista => Rgb([200, 130, 20]),
        SemanticType::Trespt => Rgb([120, 30, 160]),
        SemanticType::Outro => Rgb([140, 140, 140]),
    }
}

/// Render the segment list to a white-background PNG (`§4.9`). Rendering
/// failures (degenerate geometry) are surfaced as [`RenderError`]; callers
/// treat this as non-fatal and publish the result without an image.
pub fn render(
    segments: &[Segment],
    semantic_by_layer: &HashMap<String, SemanticType>,
    extents: &Extents,
    file_name: &str,
    score: Option<f64>,
    dpi: f64,
    padding_ratio: f64,
) -> Result<RenderedImage, RenderError> {
    let width_mm = extents.width().max(1.0);
    let height_mm = extents.height().max(1.0);

    let px_per_mm = dpi / 25.4;
    let margin_px = (padding_ratio * (width_mm.max(height_mm) * px_per_mm)).max(MIN_BORDER_PX);

    let mut canvas_w = width_mm * px_per_mm + 2.0 * margin_px;
    let mut canvas_h = height_mm * px_per_mm + 2.0 * margin_px;
    let mut effective_px_per_mm = px_per_mm;

    let longest = canvas_w.max(canvas_h);
    if longest > MAX_CANVAS_SIDE as f64 {
        let scale = MAX_CANVAS_SIDE as f64 / longest;
        canvas_w *= scale;
        canvas_h *= scale;
        effective_px_per_mm *= scale;
    }

    let width = canvas_w.round().max(1.0) as u32;
    let height = canvas_h.round().max(1.0) as u32;
    if width == 0 || height == 0 {
        return Err(RenderError::DegenerateCanvas);
    }

    let mut image = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

    let stroke_width = (effective_px_per_mm * 0.3).clamp(2.0, 6.0) as i64;
    let to_px = |p: Point2| -> (i64, i64) {
        let x = margin_px + (p.x - extents.min_x) * effective_px_per_mm;
        let y = canvas_h - margin_px - (p.y - extents.min_y) * effective_px_per_mm;
        (x.round() as i64, y.round() as i64)
    };

    for semantic_type in SemanticType::DRAW_ORDER {
        let color = semantic_color(semantic_type);
        for seg in segments {
            if semantic_by_layer.get(&seg.layer).copied().unwrap_or(SemanticType::Outro) != semantic_type {
                continue;
            }
            let (x0, y0) = to_px(seg.start);
            let (x1, y1) = to_px(seg.end);
            draw_thick_line(&mut image, x0, y0, x1, y1, stroke_width, color);
        }
    }

    let safe_name = sanitize_filename(file_name);
    let watermark = match score {
        Some(s) => format!("{safe_name} | score={s:.2}"),
        None => format!("{safe_name} | score=n/a"),
    };
    let font_scale = (effective_px_per_mm * 0.4).clamp(1.0, 4.0) as u32;
    font::draw_text(&mut image, &watermark, 8, (height as i64 - 24).max(0), font_scale, Rgb([60, 60, 60]));

    let mut png_bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut png_bytes), image::ImageFormat::Png)
        .map_err(|e| {
            warn!(error = %e, "png encoding failed");
            RenderError::Encode(e.to_string())
        })?;

    Ok(RenderedImage { width, height, dpi: effective_px_per_mm * 25.4, png_bytes })
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

/// Bresenham's algorithm, repeated across `width` offset lines for a crude
/// stroke thickness.
fn draw_thick_line(image: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, width: i64, color: Rgb<u8>) {
    let half = width / 2;
    for offset in -half..=half {
        draw_line(image, x0, y0 + offset, x1, y1 + offset, color);
        if offset != 0 {
            draw_line(image, x0 + offset, y0, x1 + offset, y1, color);
        }
    }
}

fn draw_line(image: &mut RgbImage, mut x0: i64, mut y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if x0 >= 0 && y0 >= 0 && (x0 as u32) < image.width() && (y0 as u32) < image.height() {
            image.put_pixel(x0 as u32, y0 as u32, color);
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facas_core::geometry::bounding_box::compute_extents;

    #[test]
    fn renders_a_single_line_without_error() {
        let segments = vec![Segment::new(Point2::new(0.0, 0.0), Point2::new(50.0, 0.0), "corte", false)];
        let extents = compute_extents(&segments);
        let mut semantic = HashMap::new();
        semantic.insert("corte".to_string(), SemanticType::Corte);

        let rendered = render(&segments, &semantic, &extents, "part.dxf", Some(1.5), 96.0, 0.05).unwrap();
        assert!(rendered.width > 0 && rendered.height > 0);
        assert!(!rendered.png_bytes.is_empty());
    }

    #[test]
    fn huge_drawing_is_capped_at_max_canvas_side() {
        let segments = vec![Segment::new(Point2::new(0.0, 0.0), Point2::new(100_000.0, 0.0), "corte", false)];
        let extents = compute_extents(&segments);
        let semantic = HashMap::new();
        let rendered = render(&segments, &semantic, &extents, "big.dxf", None, 300.0, 0.05).unwrap();
        assert!(rendered.width <= MAX_CANVAS_SIDE && rendered.height <= MAX_CANVAS_SIDE);
    }
}
