//! A packed, row-major sample buffer.
//!
//! `ImageBuffer` is deliberately similar in spirit to `zune-image`'s
//! `Channel`: a flat buffer the rest of the pipeline treats as a bag of
//! samples, reinterpreted through a single numeric type. Unlike `Channel` it
//! never needs to change bit depth at runtime, so it stays a thin
//! borrowed-or-owned wrapper instead of a manually managed allocation.
use std::borrow::Cow;

use crate::geometry::{IRect, IVec};

/// Owns or borrows a `width * height` row-major sample buffer.
///
/// A borrowed buffer wraps externally-owned memory (typically a frame
/// handed to the scan manager by the video-capture collaborator, out of
/// scope per the specification) and cannot outlive it: the lifetime `'a` is
/// carried in the type, so the borrow cannot silently leak past the frame
/// boundary.
#[derive(Clone)]
pub struct ImageBuffer<'a, T: Clone>
{
    width:   usize,
    height:  usize,
    samples: Cow<'a, [T]>
}

impl<'a, T: Copy + Clone + Default> ImageBuffer<'a, T>
{
    /// Wrap an externally-owned buffer without copying it.
    ///
    /// # Panics
    /// Panics if `samples.len() != width * height`, the buffer's only
    /// invariant.
    pub fn borrowed(width: usize, height: usize, samples: &'a [T]) -> ImageBuffer<'a, T>
    {
        assert_eq!(
            samples.len(),
            width * height,
            "ImageBuffer invariant violated: len(samples) must equal width*height"
        );
        ImageBuffer {
            width,
            height,
            samples: Cow::Borrowed(samples)
        }
    }

    /// Allocate a new, zero-filled owned buffer.
    #[must_use]
    pub fn owned(width: usize, height: usize) -> ImageBuffer<'static, T>
    {
        ImageBuffer {
            width,
            height,
            samples: Cow::Owned(vec![T::default(); width * height])
        }
    }

    #[must_use]
    pub const fn width(&self) -> usize
    {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> usize
    {
        self.height
    }

    #[must_use]
    pub fn rect(&self) -> IRect
    {
        IRect::from_size(self.width, self.height)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[T]
    {
        self.samples.as_ref()
    }

    /// Point sample at `(x, y)`; returns `None` outside the buffer rect so
    /// callers along a clipped sample line never need a separate bounds
    /// check.
    #[must_use]
    pub fn get(&self, x: i32, y: i32) -> Option<T>
    {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height
        {
            return None;
        }
        let idx = y as usize * self.width + x as usize;
        self.samples.as_ref().get(idx).copied()
    }

    #[must_use]
    pub fn get_ivec(&self, p: IVec) -> Option<T>
    {
        self.get(p.x, p.y)
    }

    /// Mutable access, copy-on-write: a borrowed buffer is copied into an
    /// owned `Vec` the first time this is called.
    pub fn set(&mut self, x: usize, y: usize, value: T)
    {
        let idx = y * self.width + x;
        self.samples.to_mut()[idx] = value;
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn borrowed_buffer_reads_back_samples()
    {
        let data = [1u8, 2, 3, 4, 5, 6];
        let buf = ImageBuffer::borrowed(3, 2, &data);
        assert_eq!(buf.get(0, 0), Some(1));
        assert_eq!(buf.get(2, 1), Some(6));
        assert_eq!(buf.get(3, 0), None);
        assert_eq!(buf.get(-1, 0), None);
    }

    #[test]
    #[should_panic(expected = "ImageBuffer invariant violated")]
    fn mismatched_length_panics()
    {
        let data = [1u8, 2, 3];
        let _ = ImageBuffer::borrowed(2, 2, &data);
    }

    #[test]
    fn owned_buffer_is_zero_filled_and_mutable()
    {
        let mut buf: ImageBuffer<'static, u8> = ImageBuffer::owned(4, 4);
        assert_eq!(buf.get(0, 0), Some(0));
        buf.set(1, 1, 200);
        assert_eq!(buf.get(1, 1), Some(200));
    }
}
