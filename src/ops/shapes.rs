// ============================================================================
// SHAPES: drag-defined outline paths and anti-aliased polyline stroking
// ============================================================================

use std::str::FromStr;

use image::Rgba;
use rayon::prelude::*;

use crate::canvas::{blend_over, PixelBuffer};
use crate::geometry::PointF;

/// Segments used to approximate a circle outline.
pub const CIRCLE_SEGMENTS: usize = 64;

/// Outline primitives available to the shape tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Circle,
    Rectangle,
    Square,
    Line,
    Triangle,
}

impl ShapeKind {
    pub fn label(&self) -> &'static str {
        match self {
            ShapeKind::Circle => "Circle",
            ShapeKind::Rectangle => "Rectangle",
            ShapeKind::Square => "Square",
            ShapeKind::Line => "Line",
            ShapeKind::Triangle => "Triangle",
        }
    }

    pub fn all() -> &'static [ShapeKind] {
        &[
            ShapeKind::Circle,
            ShapeKind::Rectangle,
            ShapeKind::Square,
            ShapeKind::Line,
            ShapeKind::Triangle,
        ]
    }

    /// Point path for a drag from `start` to `end`. Closed shapes repeat
    /// their first point at the end.
    pub fn path(&self, start: PointF, end: PointF) -> Vec<PointF> {
        match self {
            ShapeKind::Circle => {
                let r = start.distance(end);
                (0..=CIRCLE_SEGMENTS)
                    .map(|i| {
                        let t = (i % CIRCLE_SEGMENTS) as f64 / CIRCLE_SEGMENTS as f64
                            * std::f64::consts::TAU;
                        PointF::new(start.x + r * t.cos(), start.y + r * t.sin())
                    })
                    .collect()
            }
            ShapeKind::Rectangle => rect_path(start, end),
            ShapeKind::Square => {
                let dx = end.x - start.x;
                let dy = end.y - start.y;
                let side = dx.abs().min(dy.abs());
                let corner = PointF::new(
                    start.x + side.copysign(dx),
                    start.y + side.copysign(dy),
                );
                rect_path(start, corner)
            }
            ShapeKind::Line => vec![start, end],
            ShapeKind::Triangle => vec![start, PointF::new(start.x, end.y), end, start],
        }
    }
}

impl FromStr for ShapeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShapeKind::all()
            .iter()
            .copied()
            .find(|k| k.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown shape '{s}'"))
    }
}

fn rect_path(a: PointF, b: PointF) -> Vec<PointF> {
    vec![
        a,
        PointF::new(b.x, a.y),
        b,
        PointF::new(a.x, b.y),
        a,
    ]
}

// ---------------------------------------------------------------------------
//  Stroke rasterisation
// ---------------------------------------------------------------------------

/// Distance from `(px, py)` to the segment `a`–`b` (a point when `a == b`).
fn sdf_line_segment(px: f64, py: f64, ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    let dx = bx - ax;
    let dy = by - ay;
    let len2 = dx * dx + dy * dy;
    let t = if len2 > 0.0 {
        (((px - ax) * dx + (py - ay) * dy) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cx = ax + t * dx;
    let cy = ay + t * dy;
    ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt()
}

fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Stroke `path` as connected capsules `width` pixels wide (minimum 1),
/// which gives round joins and caps. Blends source-over into `buf`.
pub fn stroke_polyline(buf: &mut PixelBuffer, path: &[PointF], width: f64, color: Rgba<u8>) {
    if path.is_empty() || buf.is_empty() || color[3] == 0 {
        return;
    }
    let half = width.max(1.0) * 0.5;
    let pad = half + 1.0;

    // A lone point is a zero-length segment (a dot).
    let segments: Vec<(PointF, PointF)> = if path.len() == 1 {
        vec![(path[0], path[0])]
    } else {
        path.windows(2).map(|w| (w[0], w[1])).collect()
    };

    let (mut min_x, mut min_y) = (f64::MAX, f64::MAX);
    let (mut max_x, mut max_y) = (f64::MIN, f64::MIN);
    for p in path {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    let x0 = ((min_x - pad).floor() as i64).max(0);
    let y0 = ((min_y - pad).floor() as i64).max(0);
    let x1 = ((max_x + pad).ceil() as i64).min(buf.width() as i64);
    let y1 = ((max_y + pad).ceil() as i64).min(buf.height() as i64);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let n = buf.channels().count();
    let stride = buf.stride();
    let base_alpha = color[3] as f64;

    buf.as_raw_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .skip(y0 as usize)
        .take((y1 - y0) as usize)
        .for_each(|(y, row)| {
            let py = y as f64 + 0.5;
            for x in x0..x1 {
                let px = x as f64 + 0.5;
                let mut d = f64::MAX;
                for (a, b) in &segments {
                    if py < a.y.min(b.y) - pad || py > a.y.max(b.y) + pad {
                        continue;
                    }
                    if px < a.x.min(b.x) - pad || px > a.x.max(b.x) + pad {
                        continue;
                    }
                    d = d.min(sdf_line_segment(px, py, a.x, a.y, b.x, b.y));
                }
                let cov = smoothstep(0.5, -0.5, d - half);
                if cov <= 0.0 {
                    continue;
                }
                let a = (base_alpha * cov).round().clamp(0.0, 255.0) as u8;
                let top = Rgba([color[0], color[1], color[2], a]);
                let o = x as usize * n;
                let under = if n == 4 {
                    Rgba([row[o], row[o + 1], row[o + 2], row[o + 3]])
                } else {
                    Rgba([row[o], row[o + 1], row[o + 2], 255])
                };
                let out = blend_over(under, top);
                row[o..o + n].copy_from_slice(&out.0[..n]);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{rgb, Channels};
    use approx::assert_relative_eq;

    #[test]
    fn circle_is_closed_polygon_at_radius() {
        let c = PointF::new(100.0, 100.0);
        let path = ShapeKind::Circle.path(c, PointF::new(130.0, 140.0));
        assert_eq!(path.len(), CIRCLE_SEGMENTS + 1);
        assert_eq!(path.first(), path.last());
        for p in &path {
            assert_relative_eq!(p.distance(c), 50.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn square_uses_shorter_side_and_drag_direction() {
        let path = ShapeKind::Square.path(PointF::new(50.0, 50.0), PointF::new(10.0, 80.0));
        assert_eq!(path[2], PointF::new(20.0, 80.0));
        assert_eq!(path.len(), 5);
    }

    #[test]
    fn triangle_and_line_paths() {
        let s = PointF::new(0.0, 0.0);
        let e = PointF::new(10.0, 20.0);
        assert_eq!(
            ShapeKind::Triangle.path(s, e),
            vec![s, PointF::new(0.0, 20.0), e, s]
        );
        assert_eq!(ShapeKind::Line.path(s, e), vec![s, e]);
        assert_eq!("rectangle".parse::<ShapeKind>(), Ok(ShapeKind::Rectangle));
    }

    #[test]
    fn stroke_covers_segment_but_not_far_pixels() {
        let mut buf = PixelBuffer::filled(40, 40, Channels::Rgba, rgb(255, 255, 255));
        let path = [PointF::new(5.0, 20.0), PointF::new(35.0, 20.0)];
        stroke_polyline(&mut buf, &path, 4.0, rgb(0, 0, 0));
        assert_eq!(buf.get_pixel(20, 19), rgb(0, 0, 0));
        assert_eq!(buf.get_pixel(20, 20), rgb(0, 0, 0));
        assert_eq!(buf.get_pixel(20, 10), rgb(255, 255, 255));
        // round cap extends past the endpoint
        assert_eq!(buf.get_pixel(4, 20), rgb(0, 0, 0));
        assert_eq!(buf.get_pixel(0, 0), rgb(255, 255, 255));
    }

    #[test]
    fn single_point_draws_a_dot() {
        let mut buf = PixelBuffer::filled(10, 10, Channels::Rgb, rgb(255, 255, 255));
        stroke_polyline(&mut buf, &[PointF::new(5.0, 5.0)], 3.0, rgb(0, 0, 255));
        assert_eq!(buf.get_pixel(5, 5), rgb(0, 0, 255));
        assert_eq!(buf.get_pixel(9, 9), rgb(255, 255, 255));
    }
}
