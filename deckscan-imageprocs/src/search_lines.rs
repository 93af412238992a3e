//! The search-line generator (§4.2): the fixed, ordered battery of
//! rotated/offset scan lines the matcher walks every frame looking for a
//! deck.
//!
//! Generation is deterministic given `(width, height, reversible)`;
//! [`SearchLineGenerator::lines_for`] regenerates only when that key
//! changes, matching the specification's "outputs are stable within a
//! size+reversible pair" requirement.
use deckscan_core::geometry::{Line, Vec2};
use deckscan_core::sample_line::SampleLine;
use deckscan_core::{IVec, ImageBuffer};

/// Tunables for [`SearchLineGenerator`], one field per config key in §6.1's
/// `search.Line*` group.
#[derive(Copy, Clone, Debug)]
pub struct SearchLineParams
{
    pub rotation_steps: usize,
    pub rotation_density: f64,
    pub min_angle_degrees: f64,
    pub max_angle_degrees: f64,
    pub linear_steps: usize,
    pub linear_density: f64,
    pub linear_limit_scalar: f64,
    pub bidirectional: bool,
    pub horizontal_weight_adjustment: f64
}

/// One parameterized scan line: an angle and a perpendicular offset from
/// the frame center, plus whether it should be walked start-to-end or
/// reversed (the "bidirectional" duplicate of an otherwise-identical line).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SearchLineSpec
{
    pub angle_degrees: f64,
    pub offset: Vec2,
    pub reversed: bool
}

impl SearchLineSpec
{
    /// Materialize this spec into a clipped, sampled [`SampleLine`] (the
    /// `get_line` operation of §4.2), rotated by `angle_degrees +
    /// offset_angle_degrees` about the frame center shifted by
    /// `offset_location`, and clipped to the image's rect. Returns `None`
    /// when the resulting line does not intersect the buffer at all.
    #[must_use]
    pub fn get_line(&self, image: &ImageBuffer<'_, u8>, offset_location: IVec, offset_angle_degrees: f64) -> Option<SampleLine>
    {
        let rect = image.rect();
        let center = rect.center() + Vec2::new(f64::from(offset_location.x), f64::from(offset_location.y)) + self.offset;

        // A generously oversized horizontal segment through `center`,
        // rotated into place and then clipped; long enough that the clip
        // always determines the visible extent rather than this length.
        let half_span = f64::from(rect.width().max(rect.height())) * 2.0;
        let p0 = Vec2::new(center.x - half_span, center.y);
        let p1 = Vec2::new(center.x + half_span, center.y);

        let angle = self.angle_degrees + offset_angle_degrees;
        let rotated_p0 = p0.rotated_about(center, angle).round_to_ivec();
        let rotated_p1 = p1.rotated_about(center, angle).round_to_ivec();

        let line = if self.reversed
        {
            Line::new(rotated_p1, rotated_p0)
        }
        else
        {
            Line::new(rotated_p0, rotated_p1)
        };

        SampleLine::clipped(image, line, rect)
    }
}

/// Exponential bias toward zero: maps `t in [-1, 1]` to `sign(t) *
/// |t|^density`, so `density >= 1` compresses samples toward the origin
/// (the horizontal/vertical angle, or the zero offset).
fn biased(t: f64, density: f64) -> f64
{
    t.signum() * t.abs().powf(density.max(1.0))
}

fn signed_steps(count: usize) -> Vec<f64>
{
    if count <= 1
    {
        return vec![0.0];
    }
    (0..count)
        .map(|i| (i as f64 / (count - 1) as f64) * 2.0 - 1.0)
        .collect()
}

fn is_duplicate(a: &SearchLineSpec, b: &SearchLineSpec) -> bool
{
    const ANGLE_EPS: f64 = 1e-6;
    const OFFSET_EPS: f64 = 0.5;
    a.reversed == b.reversed
        && (a.angle_degrees - b.angle_degrees).abs() < ANGLE_EPS
        && (a.offset.x - b.offset.x).abs() < OFFSET_EPS
        && (a.offset.y - b.offset.y).abs() < OFFSET_EPS
}

/// Caches the generated line battery for the last `(width, height,
/// reversible)` key seen.
#[derive(Default)]
pub struct SearchLineGenerator
{
    cached_key: Option<(usize, usize, bool)>,
    cached_lines: Vec<SearchLineSpec>
}

impl SearchLineGenerator
{
    #[must_use]
    pub fn new() -> SearchLineGenerator
    {
        SearchLineGenerator::default()
    }

    /// Return the line battery for `(width, height, reversible)`,
    /// regenerating only if that key differs from the last call.
    pub fn lines_for(&mut self, width: usize, height: usize, reversible: bool, params: SearchLineParams) -> &[SearchLineSpec]
    {
        let key = (width, height, reversible);
        if self.cached_key != Some(key)
        {
            self.cached_lines = generate(width, height, reversible, params);
            self.cached_key = Some(key);
        }
        &self.cached_lines
    }
}

fn generate(width: usize, height: usize, reversible: bool, params: SearchLineParams) -> Vec<SearchLineSpec>
{
    let half_extent = (width.min(height) as f64 / 2.0) * params.linear_limit_scalar.clamp(f64::EPSILON, 1.0);

    let angles: Vec<f64> = signed_steps(params.rotation_steps.max(1))
        .into_iter()
        .map(|t| {
            let bias = biased(t, params.rotation_density);
            let span = (params.max_angle_degrees - params.min_angle_degrees) / 2.0;
            let mid = (params.max_angle_degrees + params.min_angle_degrees) / 2.0;
            (mid + bias * span).clamp(params.min_angle_degrees, params.max_angle_degrees)
        })
        .collect();

    let offsets: Vec<f64> = signed_steps(params.linear_steps.max(1))
        .into_iter()
        .map(|t| biased(t, params.linear_density) * half_extent)
        .collect();

    let mut specs = Vec::with_capacity(angles.len() * offsets.len() * 2);
    for &angle in &angles
    {
        for &offset in &offsets
        {
            specs.push(SearchLineSpec {
                angle_degrees: angle,
                offset: Vec2::new(0.0, offset),
                reversed: false
            });
            if params.bidirectional && !reversible
            {
                specs.push(SearchLineSpec {
                    angle_degrees: angle,
                    offset: Vec2::new(0.0, offset),
                    reversed: true
                });
            }
        }
    }

    // Horizontal weight adjustment: compress near-horizontal lines' sort
    // key so they cluster earlier without disturbing relative order among
    // lines that are already equally off-axis.
    let weight = params.horizontal_weight_adjustment.clamp(0.0, 1.0);
    specs.sort_by(|a, b| {
        let key_a = a.angle_degrees.abs() * (1.0 - weight);
        let key_b = b.angle_degrees.abs() * (1.0 - weight);
        key_a.partial_cmp(&key_b).unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut deduped: Vec<SearchLineSpec> = Vec::with_capacity(specs.len());
    for spec in specs
    {
        if !deduped.iter().any(|existing| is_duplicate(existing, &spec))
        {
            deduped.push(spec);
        }
    }
    deduped
}
