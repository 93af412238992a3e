//! Integer and real 2-D vectors, lines and rectangles.
//!
//! These are deliberately minimal: the pipeline only ever needs points,
//! direction vectors, a rotate-about-center helper and rectangle clipping.
use core::ops::{Add, Mul, Sub};

/// Integer 2-D vector, used for image-space points and offsets.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct IVec
{
    pub x: i32,
    pub y: i32
}

impl IVec
{
    #[must_use]
    pub const fn new(x: i32, y: i32) -> IVec
    {
        IVec { x, y }
    }

    #[must_use]
    pub fn to_real(self) -> Vec2
    {
        Vec2::new(f64::from(self.x), f64::from(self.y))
    }

    /// Squared Euclidean distance; avoids the `sqrt` for comparisons.
    #[must_use]
    pub fn distance_sq(self, other: IVec) -> i64
    {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        dx * dx + dy * dy
    }
}

impl Add for IVec
{
    type Output = IVec;

    fn add(self, rhs: IVec) -> IVec
    {
        IVec::new(self.x.wrapping_add(rhs.x), self.y.wrapping_add(rhs.y))
    }
}

impl Sub for IVec
{
    type Output = IVec;

    fn sub(self, rhs: IVec) -> IVec
    {
        IVec::new(self.x.wrapping_sub(rhs.x), self.y.wrapping_sub(rhs.y))
    }
}

/// Real (floating point) 2-D vector, used for trigonometry and rare ratios.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Vec2
{
    pub x: f64,
    pub y: f64
}

impl Vec2
{
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Vec2
    {
        Vec2 { x, y }
    }

    #[must_use]
    pub fn length(self) -> f64
    {
        self.x.hypot(self.y)
    }

    #[must_use]
    pub fn normalized(self) -> Vec2
    {
        let len = self.length();
        if len == 0.0
        {
            self
        }
        else
        {
            Vec2::new(self.x / len, self.y / len)
        }
    }

    /// The vector perpendicular to `self`, rotated 90 degrees counter
    /// clockwise in image space (y grows downward).
    #[must_use]
    pub fn orthogonal(self) -> Vec2
    {
        Vec2::new(-self.y, self.x)
    }

    #[must_use]
    pub fn dot(self, other: Vec2) -> f64
    {
        self.x * other.x + self.y * other.y
    }

    /// Rotate `self` about `origin` by `degrees`.
    #[must_use]
    pub fn rotated_about(self, origin: Vec2, degrees: f64) -> Vec2
    {
        let radians = degrees.to_radians();
        let (sin, cos) = radians.sin_cos();
        let dx = self.x - origin.x;
        let dy = self.y - origin.y;
        Vec2::new(
            origin.x + dx * cos - dy * sin,
            origin.y + dx * sin + dy * cos
        )
    }

    #[must_use]
    pub fn round_to_ivec(self) -> IVec
    {
        IVec::new(self.x.round() as i32, self.y.round() as i32)
    }
}

impl Add for Vec2
{
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2
    {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2
{
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2
    {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2
{
    type Output = Vec2;

    fn mul(self, rhs: f64) -> Vec2
    {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// A directed line segment between two integer endpoints.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct Line
{
    pub p0: IVec,
    pub p1: IVec
}

impl Line
{
    #[must_use]
    pub const fn new(p0: IVec, p1: IVec) -> Line
    {
        Line { p0, p1 }
    }

    /// `max(|dx|, |dy|) + 1`, the canonical dense sample count for this
    /// line (see [`crate::sample_line::SampleLine`]).
    #[must_use]
    pub fn sample_count(self) -> usize
    {
        let dx = (self.p1.x - self.p0.x).unsigned_abs();
        let dy = (self.p1.y - self.p0.y).unsigned_abs();
        dx.max(dy) as usize + 1
    }

    #[must_use]
    pub fn direction(self) -> Vec2
    {
        (self.p1.to_real() - self.p0.to_real()).normalized()
    }

    #[must_use]
    pub fn center(self) -> Vec2
    {
        (self.p0.to_real() + self.p1.to_real()) * 0.5
    }
}

/// An axis-aligned integer rectangle, `[x0, x1) x [y0, y1)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IRect
{
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32
}

impl IRect
{
    #[must_use]
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> IRect
    {
        IRect { x0, y0, x1, y1 }
    }

    #[must_use]
    pub const fn from_size(width: usize, height: usize) -> IRect
    {
        IRect::new(0, 0, width as i32, height as i32)
    }

    #[must_use]
    pub const fn contains(self, p: IVec) -> bool
    {
        p.x >= self.x0 && p.x < self.x1 && p.y >= self.y0 && p.y < self.y1
    }

    #[must_use]
    pub const fn width(self) -> i32
    {
        self.x1 - self.x0
    }

    #[must_use]
    pub const fn height(self) -> i32
    {
        self.y1 - self.y0
    }

    #[must_use]
    pub fn center(self) -> Vec2
    {
        Vec2::new(
            f64::from(self.x0 + self.x1) * 0.5,
            f64::from(self.y0 + self.y1) * 0.5
        )
    }

    /// Clip `line` against this rectangle using the Liang-Barsky
    /// parametric algorithm, returning the clipped endpoints (as integer
    /// points, rounded towards the line's own direction) or `None` if the
    /// line does not intersect the rectangle at all.
    #[must_use]
    pub fn clip_line(self, line: Line) -> Option<Line>
    {
        let (x0, y0) = (f64::from(line.p0.x), f64::from(line.p0.y));
        let (x1, y1) = (f64::from(line.p1.x), f64::from(line.p1.y));
        let dx = x1 - x0;
        let dy = y1 - y0;

        let mut t0 = 0.0_f64;
        let mut t1 = 1.0_f64;

        let edges = [
            (-dx, x0 - f64::from(self.x0)),
            (dx, f64::from(self.x1) - 1.0 - x0),
            (-dy, y0 - f64::from(self.y0)),
            (dy, f64::from(self.y1) - 1.0 - y0)
        ];

        for (p, q) in edges
        {
            if p == 0.0
            {
                if q < 0.0
                {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0
            {
                if r > t1
                {
                    return None;
                }
                if r > t0
                {
                    t0 = r;
                }
            }
            else
            {
                if r < t0
                {
                    return None;
                }
                if r < t1
                {
                    t1 = r;
                }
            }
        }

        if t0 > t1
        {
            return None;
        }

        let clipped_p0 = IVec::new((x0 + t0 * dx).round() as i32, (y0 + t0 * dy).round() as i32);
        let clipped_p1 = IVec::new((x0 + t1 * dx).round() as i32, (y0 + t1 * dy).round() as i32);
        Some(Line::new(clipped_p0, clipped_p1))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn sample_count_matches_max_delta_plus_one()
    {
        let line = Line::new(IVec::new(0, 0), IVec::new(4, 2));
        assert_eq!(line.sample_count(), 5);
    }

    #[test]
    fn clip_line_fully_inside_is_unchanged()
    {
        let rect = IRect::from_size(100, 100);
        let line = Line::new(IVec::new(10, 10), IVec::new(20, 20));
        assert_eq!(rect.clip_line(line), Some(line));
    }

    #[test]
    fn clip_line_outside_returns_none()
    {
        let rect = IRect::from_size(10, 10);
        let line = Line::new(IVec::new(-50, 5), IVec::new(-40, 5));
        assert_eq!(rect.clip_line(line), None);
    }

    #[test]
    fn clip_line_crossing_boundary_is_truncated()
    {
        let rect = IRect::from_size(10, 10);
        let line = Line::new(IVec::new(-5, 5), IVec::new(5, 5));
        let clipped = rect.clip_line(line).unwrap();
        assert!(rect.contains(clipped.p0));
        assert!(rect.contains(clipped.p1));
    }

    #[test]
    fn rotated_about_self_is_identity()
    {
        let p = Vec2::new(5.0, 5.0);
        let rotated = p.rotated_about(p, 37.0);
        assert!((rotated.x - p.x).abs() < 1e-9);
        assert!((rotated.y - p.y).abs() < 1e-9);
    }
}
