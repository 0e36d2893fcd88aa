//! Curve tessellation policies (`§4.3`).
//!
//! Each function returns the straight segments a curve lowers to, plus the
//! millimetre length it contributes to the owning layer's totals. Lengths
//! are computed analytically (`radius * sweep`) rather than by summing
//! chord lengths, except where the spec calls for chord summation (spline).

use std::f64::consts::PI;

use crate::document::Point2;

/// Normalize an angle difference into `[0, 2*PI)`.
pub fn normalize_sweep(start_rad: f64, end_rad: f64) -> f64 {
    let mut sweep = end_rad - start_rad;
    while sweep < 0.0 {
        sweep += 2.0 * PI;
    }
    while sweep >= 2.0 * PI {
        sweep -= 2.0 * PI;
    }
    sweep
}

fn point_on_arc(center: Point2, radius: f64, angle: f64) -> Point2 {
    Point2::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
}

/// Tessellate an arc (`§4.3`, Arc policy). Returns (points along the arc,
/// analytic length).
pub fn tessellate_arc(center: Point2, radius: f64, start_rad: f64, end_rad: f64) -> (Vec<Point2>, f64) {
    let sweep = normalize_sweep(start_rad, end_rad);
    let segment_count = (4usize).max((sweep / (PI / 16.0)).ceil() as usize);
    let points = (0..=segment_count)
        .map(|i| {
            let t = start_rad + sweep * (i as f64) / (segment_count as f64);
            point_on_arc(center, radius, t)
        })
        .collect();
    (points, radius * sweep)
}

/// Tessellate a full circle (`§4.3`, Circle policy): 32 fixed segments.
pub fn tessellate_circle(center: Point2, radius: f64) -> (Vec<Point2>, f64) {
    const SEGMENTS: usize = 32;
    let points = (0..=SEGMENTS)
        .map(|i| {
            let t = 2.0 * PI * (i as f64) / (SEGMENTS as f64);
            point_on_arc(center, radius, t)
        })
        .collect();
    (points, radius * 2.0 * PI)
}

/// Tessellate one bulge arc between two 2-D polyline vertices (`§4.3`, 2-D
/// polyline policy). `bulge` near zero is treated by the caller as a
/// straight segment, never reaching here.
pub fn tessellate_bulge(
    start: Point2,
    end: Point2,
    bulge: f64,
    chord_tolerance: f64,
) -> (Vec<Point2>, f64) {
    let chord = ((end.x - start.x).powi(2) + (end.y - start.y).powi(2)).sqrt();
    let angle = 4.0 * bulge.atan();
    if chord < 1e-12 || angle.abs() < 1e-12 {
        return (vec![start, end], chord);
    }

    let radius = (chord / (2.0 * (angle / 2.0).sin())).abs();
    let segment_count = if radius > chord_tolerance {
        let cos_arg = (1.0 - chord_tolerance / radius).clamp(-1.0, 1.0);
        let step = cos_arg.acos().max(1e-6);
        ((angle.abs() / step).ceil() as usize).clamp(4, 64)
    } else {
        4
    };

    // Arc center lies on the perpendicular bisector of the chord, at a
    // distance determined by `radius` and the sign of `bulge`.
    let mid = Point2::new((start.x + end.x) / 2.0, (start.y + end.y) / 2.0);
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let half_chord = chord / 2.0;
    let sagitta_sign = if bulge >= 0.0 { 1.0 } else { -1.0 };
    let h = sagitta_sign * (radius.powi(2) - half_chord.powi(2)).max(0.0).sqrt();
    // Perpendicular direction to (dx, dy), normalized.
    let (perp_x, perp_y) = (-dy / chord, dx / chord);
    let center = Point2::new(mid.x + perp_x * h * -1.0, mid.y + perp_y * h * -1.0);

    let start_angle = (start.y - center.y).atan2(start.x - center.x);
    let sweep = if bulge >= 0.0 {
        angle.abs()
    } else {
        -angle.abs()
    };

    let points = (0..=segment_count)
        .map(|i| {
            let t = start_angle + sweep * (i as f64) / (segment_count as f64);
            point_on_arc(center, radius, t)
        })
        .collect();

    (points, radius * angle.abs())
}

/// Tessellate a spline to chord pieces (`§4.3`, Spline policy): length is
/// the sum of chord lengths between tessellated points, not an analytic arc
/// length.
pub fn tessellate_spline(control_points: &[Point2]) -> (Vec<Point2>, f64) {
    if control_points.len() < 2 {
        return (control_points.to_vec(), 0.0);
    }

    let segment_count = (16usize).max(4 * control_points.len());
    let points = sample_catmull_rom(control_points, segment_count);
    let length = chain_length(&points);
    (points, length)
}

/// Tessellate an ellipse arc to a fixed 64-segment polyline (`§4.3`,
/// Ellipse policy).
pub fn tessellate_ellipse(
    center: Point2,
    major_axis_end: Point2,
    minor_to_major_ratio: f64,
    start_param: f64,
    end_param: f64,
) -> (Vec<Point2>, f64) {
    const SEGMENTS: usize = 64;
    let major_x = major_axis_end.x - center.x;
    let major_y = major_axis_end.y - center.y;
    let major_len = (major_x * major_x + major_y * major_y).sqrt();
    let rotation = major_y.atan2(major_x);
    let minor_len = major_len * minor_to_major_ratio;

    let sweep = {
        let mut s = end_param - start_param;
        if s <= 0.0 {
            s += 2.0 * PI;
        }
        s
    };

    let points: Vec<Point2> = (0..=SEGMENTS)
        .map(|i| {
            let t = start_param + sweep * (i as f64) / (SEGMENTS as f64);
            let local_x = major_len * t.cos();
            let local_y = minor_len * t.sin();
            let (sin_r, cos_r) = rotation.sin_cos();
            Point2::new(
                center.x + local_x * cos_r - local_y * sin_r,
                center.y + local_x * sin_r + local_y * cos_r,
            )
        })
        .collect();

    let length = chain_length(&points);
    (points, length)
}

fn chain_length(points: &[Point2]) -> f64 {
    points
        .windows(2)
        .map(|w| ((w[1].x - w[0].x).powi(2) + (w[1].y - w[0].y).powi(2)).sqrt())
        .sum()
}

/// Catmull-Rom-ish piecewise linear sampling good enough for an indicative
/// preview; splines only feed length/segment metrics and the renderer, not
/// any exact-geometry downstream consumer.
fn sample_catmull_rom(control_points: &[Point2], segment_count: usize) -> Vec<Point2> {
    if control_points.len() == 2 {
        let a = control_points[0];
        let b = control_points[1];
        return (0..=segment_count)
            .map(|i| {
                let t = i as f64 / segment_count as f64;
                Point2::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
            })
            .collect();
    }

    let n = control_points.len();
    let get = |i: isize| -> Point2 {
        let idx = i.clamp(0, n as isize - 1) as usize;
        control_points[idx]
    };

    let mut out = Vec::with_capacity(segment_count + 1);
    let segments_per_span = (segment_count / (n - 1)).max(1);
    for span in 0..(n - 1) {
        let p0 = get(span as isize - 1);
        let p1 = get(span as isize);
        let p2 = get(span as isize + 1);
        let p3 = get(span as isize + 2);

        for step in 0..segments_per_span {
            let t = step as f64 / segments_per_span as f64;
            out.push(catmull_rom_point(p0, p1, p2, p3, t));
        }
    }
    out.push(*control_points.last().unwrap());
    out
}

fn catmull_rom_point(p0: Point2, p1: Point2, p2: Point2, p3: Point2, t: f64) -> Point2 {
    let t2 = t * t;
    let t3 = t2 * t;
    let x = 0.5
        * ((2.0 * p1.x)
            + (-p0.x + p2.x) * t
            + (2.0 * p0.x - 5.0 * p1.x + 4.0 * p2.x - p3.x) * t2
            + (-p0.x + 3.0 * p1.x - 3.0 * p2.x + p3.x) * t3);
    let y = 0.5
        * ((2.0 * p1.y)
            + (-p0.y + p2.y) * t
            + (2.0 * p0.y - 5.0 * p1.y + 4.0 * p2.y - p3.y) * t2
            + (-p0.y + 3.0 * p1.y - 3.0 * p2.y + p3.y) * t3);
    Point2::new(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_sweep_normalizes_into_range() {
        let sweep = normalize_sweep(0.0, 2.0 * PI + 0.1);
        assert!(sweep >= 0.0 && sweep < 2.0 * PI);
    }

    #[test]
    fn arc_segment_count_has_floor_of_four() {
        let (points, length) = tessellate_arc(Point2::new(0.0, 0.0), 10.0, 0.0, 0.01);
        assert!(points.len() - 1 >= 4);
        assert!(length > 0.0);
    }

    #[test]
    fn circle_uses_32_segments() {
        let (points, length) = tessellate_circle(Point2::new(0.0, 0.0), 5.0);
        assert_eq!(points.len(), 33);
        assert!((length - 5.0 * 2.0 * PI).abs() < 1e-9);
    }

    #[test]
    fn straight_bulge_returns_single_segment() {
        let (points, length) =
            tessellate_bulge(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), 0.0, 0.1);
        assert_eq!(points.len(), 2);
        assert!((length - 10.0).abs() < 1e-9);
    }

    #[test]
    fn spline_length_is_positive_for_nontrivial_control_points() {
        let pts = vec![
            Point2::new(0.0, 0.0),
            Point2::new(5.0, 5.0),
            Point2::new(10.0, 0.0),
        ];
        let (tess, length) = tessellate_spline(&pts);
        assert!(tess.len() >= 16);
        assert!(length > 0.0);
    }

    #[test]
    fn ellipse_closes_when_no_start_end_given() {
        let (points, length) =
            tessellate_ellipse(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), 0.5, 0.0, 0.0);
        assert_eq!(points.len(), 65);
        assert!(length > 0.0);
    }
}
