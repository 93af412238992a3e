//! The `Edge` data entity (§3): a signed-slope peak detected along a
//! sample line. Lives in `deckscan-core` rather than the edge-detector
//! crate because it is pure data — the same shape a generic 1-D edge
//! detector would produce for any signal, with no knowledge of decks or
//! marks.
use crate::geometry::IVec;

/// A signed-slope peak along a [`crate::sample_line::SampleLine`].
///
/// A negative slope marks entry into a darker region (the start of a
/// mark); a positive slope marks exit (the end of a mark).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Edge
{
    pub sample_offset: usize,
    /// `sample_offset` normalized to `[0, 1]` over the sample line's length.
    pub normalized: f64,
    pub slope: i32,
    pub threshold: i32,
    pub point: IVec
}

impl Edge
{
    #[must_use]
    pub const fn is_start(&self) -> bool
    {
        self.slope < 0
    }

    #[must_use]
    pub const fn is_end(&self) -> bool
    {
        self.slope > 0
    }
}
