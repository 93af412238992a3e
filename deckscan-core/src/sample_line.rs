//! Integer-endpoint lines through an image, sampled into a dense array.
//!
//! A [`SampleLine`] is built by clipping a [`Line`] to an image's rect and
//! then walking it with a DDA (digital differential analyzer) stepper,
//! recording one sample per integer step. Sampling never fails for a line
//! that survives clipping: every stepped point lies inside the buffer by
//! construction.
use crate::geometry::{IRect, IVec, Line, Vec2};
use crate::image::ImageBuffer;

/// A clipped line through an image, plus the dense samples collected along
/// it.
///
/// `samples.len() == max(|dx|, |dy|) + 1`, the canonical length defined by
/// [`Line::sample_count`].
#[derive(Clone, Debug, Default)]
pub struct SampleLine
{
    pub p0: IVec,
    pub p1: IVec,
    pub samples: Vec<i32>
}

impl SampleLine
{
    /// Clip `line` to `rect` and sample it from `image`, expanding each
    /// `Luma` sample to a signed `Sample` as the data model requires.
    ///
    /// Returns `None` if `line` does not intersect `rect` at all.
    #[must_use]
    pub fn clipped(image: &ImageBuffer<'_, u8>, line: Line, rect: IRect) -> Option<SampleLine>
    {
        let clipped = rect.clip_line(line)?;
        Some(Self::sample_clipped(image, clipped))
    }

    /// Sample a line that is already known to lie inside the image.
    fn sample_clipped(image: &ImageBuffer<'_, u8>, line: Line) -> SampleLine
    {
        let count = line.sample_count();
        let mut samples = Vec::with_capacity(count);
        let dx = f64::from(line.p1.x - line.p0.x);
        let dy = f64::from(line.p1.y - line.p0.y);
        let steps = (count - 1).max(1) as f64;

        for i in 0..count
        {
            let t = i as f64 / steps;
            let x = (f64::from(line.p0.x) + dx * t).round() as i32;
            let y = (f64::from(line.p0.y) + dy * t).round() as i32;
            samples.push(i32::from(image.get(x, y).unwrap_or(0)));
        }

        SampleLine {
            p0: line.p0,
            p1: line.p1,
            samples
        }
    }

    /// 1-2-1 cross-weighted sample: at each point along the line, also
    /// sample one pixel to either side along the line's normal and combine
    /// as `(a + 2*b + c) / 4`. Used by the mark-line sampler's linear mode
    /// (`sample_wide`, spec §4.5) to reduce sensitivity to a single noisy
    /// column.
    #[must_use]
    pub fn sample_wide(image: &ImageBuffer<'_, u8>, line: Line, rect: IRect) -> Option<SampleLine>
    {
        let clipped = rect.clip_line(line)?;
        let count = clipped.sample_count();
        let direction = clipped.direction();
        let normal = direction.orthogonal();

        let mut samples = Vec::with_capacity(count);
        let dx = f64::from(clipped.p1.x - clipped.p0.x);
        let dy = f64::from(clipped.p1.y - clipped.p0.y);
        let steps = (count - 1).max(1) as f64;

        for i in 0..count
        {
            let t = i as f64 / steps;
            let cx = f64::from(clipped.p0.x) + dx * t;
            let cy = f64::from(clipped.p0.y) + dy * t;
            let center = Vec2::new(cx, cy);
            let plus = center + normal;
            let minus = center - normal;

            let a = i32::from(sample_at(image, minus));
            let b = i32::from(sample_at(image, center));
            let c = i32::from(sample_at(image, plus));
            samples.push((a + 2 * b + c) / 4);
        }

        Some(SampleLine {
            p0: clipped.p0,
            p1: clipped.p1,
            samples
        })
    }

    #[must_use]
    pub fn len(&self) -> usize
    {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.samples.is_empty()
    }

    /// Image-space point for the sample at `offset`, interpolated linearly
    /// between `p0` and `p1`.
    #[must_use]
    pub fn point_at(&self, offset: usize) -> IVec
    {
        if self.samples.len() <= 1
        {
            return self.p0;
        }
        let t = offset as f64 / (self.samples.len() - 1) as f64;
        let x = f64::from(self.p0.x) + f64::from(self.p1.x - self.p0.x) * t;
        let y = f64::from(self.p0.y) + f64::from(self.p1.y - self.p0.y) * t;
        IVec::new(x.round() as i32, y.round() as i32)
    }

    /// Normalize a sample offset to `[0, 1]`.
    #[must_use]
    pub fn normalized(&self, offset: usize) -> f64
    {
        if self.samples.len() <= 1
        {
            return 0.0;
        }
        offset as f64 / (self.samples.len() - 1) as f64
    }

    #[must_use]
    pub fn as_line(&self) -> Line
    {
        Line::new(self.p0, self.p1)
    }
}

fn sample_at(image: &ImageBuffer<'_, u8>, p: Vec2) -> u8
{
    image.get(p.x.round() as i32, p.y.round() as i32).unwrap_or(0)
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn checkerboard(width: usize, height: usize) -> ImageBuffer<'static, u8>
    {
        let mut image: ImageBuffer<'static, u8> = ImageBuffer::owned(width, height);
        for y in 0..height
        {
            for x in 0..width
            {
                image.set(x, y, if (x + y) % 2 == 0 { 255 } else { 0 });
            }
        }
        image
    }

    #[test]
    fn sample_count_matches_clipped_line()
    {
        let image = checkerboard(10, 10);
        let line = Line::new(IVec::new(0, 5), IVec::new(9, 5));
        let sampled = SampleLine::clipped(&image, line, image.rect()).unwrap();
        assert_eq!(sampled.len(), line.sample_count());
    }

    #[test]
    fn clipping_outside_rect_returns_none()
    {
        let image = checkerboard(10, 10);
        let line = Line::new(IVec::new(-5, -5), IVec::new(-1, -1));
        assert!(SampleLine::clipped(&image, line, image.rect()).is_none());
    }

    #[test]
    fn point_at_endpoints_matches_line_endpoints()
    {
        let image = checkerboard(10, 10);
        let line = Line::new(IVec::new(1, 1), IVec::new(8, 4));
        let sampled = SampleLine::clipped(&image, line, image.rect()).unwrap();
        assert_eq!(sampled.point_at(0), sampled.p0);
        assert_eq!(sampled.point_at(sampled.len() - 1), sampled.p1);
    }

    #[test]
    fn sample_wide_stays_in_bounds_at_edges()
    {
        let image = checkerboard(10, 10);
        let line = Line::new(IVec::new(0, 0), IVec::new(9, 0));
        let sampled = SampleLine::sample_wide(&image, line, image.rect()).unwrap();
        assert_eq!(sampled.len(), line.sample_count());
    }
}
