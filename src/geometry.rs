// ============================================================================
// GEOMETRY: points, integer rectangles, rotation helpers
// ============================================================================

/// A point in canvas space (sub-pixel precision).
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct PointF {
    pub x: f64,
    pub y: f64,
}

impl PointF {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn scaled(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    pub fn distance(self, other: PointF) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Integer rectangle, half-open: covers `x..x+w` × `y..y+h`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Rectangle spanning two drag corners in any order.
    pub fn from_corners(a: PointF, b: PointF) -> Self {
        let x0 = a.x.min(b.x).floor() as i32;
        let y0 = a.y.min(b.y).floor() as i32;
        let x1 = a.x.max(b.x).floor() as i32;
        let y1 = a.y.max(b.y).floor() as i32;
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }

    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    pub fn center(&self) -> PointF {
        PointF::new(
            self.x as f64 + self.w as f64 / 2.0,
            self.y as f64 + self.h as f64 / 2.0,
        )
    }

    pub fn contains(&self, p: PointF) -> bool {
        p.x >= self.x as f64
            && p.y >= self.y as f64
            && p.x < self.right() as f64
            && p.y < self.bottom() as f64
    }

    pub fn translated(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.w, self.h)
    }

    /// Overlap of two rectangles, `None` when they do not share any pixel.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        let r = Rect::new(x0, y0, x1 - x0, y1 - y0);
        if r.is_empty() { None } else { Some(r) }
    }
}

/// Size of the axis-aligned box holding a `w`×`h` rectangle rotated by
/// `degrees` about its centre.
pub fn rotated_bounds(w: u32, h: u32, degrees: f64) -> (u32, u32) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let bw = (w as f64 * cos.abs() + h as f64 * sin.abs()) - 1e-6;
    let bh = (w as f64 * sin.abs() + h as f64 * cos.abs()) - 1e-6;
    (bw.ceil().max(1.0) as u32, bh.ceil().max(1.0) as u32)
}

/// Angle in degrees from `center` to `target`, clockwise-positive in the
/// y-down canvas space, in `(-180, 180]`.
pub fn angle_towards(center: PointF, target: PointF) -> f64 {
    (target.y - center.y).atan2(target.x - center.x).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn contains_is_half_open() {
        let r = Rect::new(50, 50, 200, 200);
        assert!(r.contains(PointF::new(50.0, 50.0)));
        assert!(r.contains(PointF::new(249.9, 249.9)));
        assert!(!r.contains(PointF::new(250.0, 100.0)));
        assert!(!r.contains(PointF::new(49.0, 100.0)));
    }

    #[test]
    fn intersect_overlapping_and_disjoint() {
        let a = Rect::new(0, 0, 100, 80);
        let b = Rect::new(60, 40, 100, 100);
        assert_eq!(a.intersect(&b), Some(Rect::new(60, 40, 40, 40)));
        let c = Rect::new(100, 0, 10, 10);
        assert_eq!(a.intersect(&c), None);
    }

    #[test]
    fn from_corners_normalizes() {
        let r = Rect::from_corners(PointF::new(30.0, 40.0), PointF::new(10.0, 5.0));
        assert_eq!(r, Rect::new(10, 5, 20, 35));
    }

    #[test]
    fn quarter_turn_swaps_bounds() {
        assert_eq!(rotated_bounds(200, 100, 90.0), (100, 200));
        assert_eq!(rotated_bounds(200, 200, 90.0), (200, 200));
        assert_eq!(rotated_bounds(200, 100, 0.0), (200, 100));
        assert_eq!(rotated_bounds(200, 100, -180.0), (200, 100));
    }

    #[test]
    fn diagonal_bounds_grow() {
        let (w, h) = rotated_bounds(100, 100, 45.0);
        assert_eq!(w, 142);
        assert_eq!(h, 142);
    }

    #[test]
    fn angle_towards_axes() {
        let c = PointF::new(0.0, 0.0);
        assert_relative_eq!(angle_towards(c, PointF::new(10.0, 0.0)), 0.0);
        assert_relative_eq!(angle_towards(c, PointF::new(0.0, 10.0)), 90.0);
        assert_relative_eq!(angle_towards(c, PointF::new(-10.0, 0.0)), 180.0);
    }
}
