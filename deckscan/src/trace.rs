//! The landmark tracer (§4.4): follows a matched deck's two outermost
//! bit-neighboring landmarks up and down the frame, producing the left
//! and right contour arrays the mark-line sampler walks in lockstep.
use std::collections::VecDeque;

use deckscan_core::geometry::{IVec, Line, Vec2};
use deckscan_core::rolling::RollingWindowArray;
use deckscan_core::sample_line::SampleLine;
use deckscan_core::ImageBuffer;
use deckscan_iface::{CodeDefinition, DeckMatchResult};

/// Tunables for one `trace_landmarks` call (§6.1's `search.trace_*` group).
#[derive(Copy, Clone, Debug)]
pub struct TraceParams
{
    pub edge_sensitivity: f64,
    pub max_stray_ratio: f64,
    /// Already scaled by `image_height / 720`.
    pub max_edge_trace_misses: i32,
    pub backup_distance: i32,
    /// Mirrors `search.use_landmark_contours` (§6.1): when set, the fine
    /// pass's contours are densified and smoothed (§4.4's final
    /// paragraph) so the contoured mark-line sampler walks an
    /// evenly-spaced, low-noise path instead of the raw accepted-step
    /// points (which skip rows on a miss-then-hit run).
    pub smooth_contours: bool
}

/// The two outermost landmark contours traced from a match, ordered
/// top-to-bottom.
#[derive(Clone, Debug, Default)]
pub struct LandmarkContours
{
    pub left: Vec<IVec>,
    pub right: Vec<IVec>
}

/// Probe one step of the trace: sample a short line of length
/// `mark_width + 2*extension` centered on `probe_center` and oriented
/// along `scan_dir`, then find the darkest `mark_width`-wide window (the
/// new landmark center) and the brightest `extension`-wide window
/// (background), in *average* intensity (sum divided by window length,
/// per §4.4).
fn probe(
    image: &ImageBuffer<'_, u8>,
    probe_center: Vec2,
    scan_dir: Vec2,
    mark_width: f64,
    extension: f64,
    scratch: &mut RollingWindowArray
) -> Option<(Vec2, f64)>
{
    let half_len = mark_width / 2.0 + extension;
    let dir = scan_dir.normalized();
    let rect = image.rect();
    let p0 = (probe_center - dir * half_len).round_to_ivec();
    let p1 = (probe_center + dir * half_len).round_to_ivec();
    let line = SampleLine::clipped(image, Line::new(p0, p1), rect)?;

    let width = (mark_width.round() as usize).max(1);
    let ext = (extension.round() as usize).max(1);

    let sums_width = scratch.rolling_sum(&line.samples, width).to_vec();
    let (min_index, &min_sum) = sums_width.iter().enumerate().min_by_key(|&(_, &v)| v)?;

    let sums_ext = scratch.rolling_sum(&line.samples, ext).to_vec();
    let &max_sum = sums_ext.iter().max()?;

    let delta = (f64::from(max_sum) / ext as f64) - (f64::from(min_sum) / width as f64);
    let new_center = line.point_at(min_index + width / 2).to_real();
    Some((new_center, delta))
}

/// Trace one landmark in one direction (`direction = -1` up, `+1` down),
/// stepping `step` pixels along `orthogonal` each iteration. Returns the
/// accepted centers in the order they were found (nearest-to-farthest).
fn trace_direction(
    image: &ImageBuffer<'_, u8>,
    start_center: Vec2,
    scan_dir: Vec2,
    orthogonal: Vec2,
    mark_width: f64,
    extension: f64,
    params: TraceParams,
    direction: i32,
    step: i32
) -> Vec<IVec>
{
    let mut out = Vec::new();
    let mut current = start_center;
    let mut average_delta = 0.0_f64;
    let mut accepted_steps: u32 = 0;
    let mut misses = 0_i32;
    let mut scratch = RollingWindowArray::new();
    let step_vec = orthogonal * f64::from(direction * step);
    let dir_unit = scan_dir.normalized();

    while misses < params.max_edge_trace_misses
    {
        let probe_center = current + step_vec;
        match probe(image, probe_center, scan_dir, mark_width, extension, &mut scratch)
        {
            Some((new_center, delta)) =>
            {
                let accept = delta > params.edge_sensitivity * average_delta;
                let stray = (new_center - start_center).dot(dir_unit).abs();
                if accept && stray <= params.max_stray_ratio * mark_width
                {
                    accepted_steps += 1;
                    average_delta += (delta - average_delta) / f64::from(accepted_steps);
                    current = new_center;
                    out.push(current.round_to_ivec());
                    misses = 0;
                }
                else
                {
                    misses += step;
                }
            }
            None => misses += step
        }
    }

    out
}

fn backed_off(points: &[IVec], backup_distance: i32) -> (Vec<IVec>, IVec)
{
    if points.is_empty()
    {
        return (Vec::new(), IVec::new(0, 0));
    }
    let keep = points.len().saturating_sub(backup_distance.max(0) as usize).max(1);
    let restart_from = points[keep - 1];
    (points[..keep].to_vec(), restart_from)
}

fn aligned_direction(left: IVec, right: IVec, fallback: Vec2) -> Vec2
{
    let delta = right.to_real() - left.to_real();
    if delta.length() < 1e-6
    {
        fallback
    }
    else
    {
        delta.normalized()
    }
}

/// Trace both outermost bit-neighboring landmarks, up and down, in a
/// coarse pass (`step=2`) followed by a fine pass (`step=1`) restarted
/// from a point backed off by `params.backup_distance`, using scan
/// vectors re-leveled from the coarse pass's top/bottom endpoints.
///
/// Returns `None` when either contour ends up with fewer than two
/// points — the tracer's own structural rejection (§4.4); the separate
/// `calc_min_sample_height` check is the scan manager's responsibility
/// (§4.9).
pub fn trace_landmarks(image: &ImageBuffer<'_, u8>, result: &DeckMatchResult, definition: &dyn CodeDefinition, params: TraceParams) -> Option<LandmarkContours>
{
    let landmarks = definition.bit_neighboring_landmarks();
    let (&first_landmark, &last_landmark) = (landmarks.first()?, landmarks.last()?);
    let marks = &result.location.marks;
    let left_mark = marks.iter().find(|m| m.matched_definition_index == first_landmark as i32)?;
    let right_mark = marks.iter().find(|m| m.matched_definition_index == last_landmark as i32)?;

    let scan_dir = (right_mark.center().to_real() - left_mark.center().to_real()).normalized();
    let orthogonal = scan_dir.orthogonal();

    let left_width = left_mark.sample_count() as f64;
    let right_width = right_mark.sample_count() as f64;
    let left_definition = &definition.mark_definitions()[first_landmark];
    let right_definition = &definition.mark_definitions()[last_landmark];
    let left_extension = (left_width * left_definition.landmark_min_gap_ratio.to_real()).ceil().max(1.0);
    let right_extension = (right_width * right_definition.landmark_min_gap_ratio.to_real()).ceil().max(1.0);

    let left_center = left_mark.center().to_real();
    let right_center = right_mark.center().to_real();

    // Coarse pass, step=2.
    let left_up_coarse = trace_direction(image, left_center, scan_dir, orthogonal, left_width, left_extension, params, -1, 2);
    let left_down_coarse = trace_direction(image, left_center, scan_dir, orthogonal, left_width, left_extension, params, 1, 2);
    let right_up_coarse = trace_direction(image, right_center, scan_dir, orthogonal, right_width, right_extension, params, -1, 2);
    let right_down_coarse = trace_direction(image, right_center, scan_dir, orthogonal, right_width, right_extension, params, 1, 2);

    let top_left = left_up_coarse.last().copied().unwrap_or_else(|| left_center.round_to_ivec());
    let top_right = right_up_coarse.last().copied().unwrap_or_else(|| right_center.round_to_ivec());
    let bottom_left = left_down_coarse.last().copied().unwrap_or_else(|| left_center.round_to_ivec());
    let bottom_right = right_down_coarse.last().copied().unwrap_or_else(|| right_center.round_to_ivec());

    let top_scan_dir = aligned_direction(top_left, top_right, scan_dir);
    let bottom_scan_dir = aligned_direction(bottom_left, bottom_right, scan_dir);

    // Back off and re-trace finely (step=1) using the re-leveled vectors.
    let (left_up_kept, left_up_restart) = backed_off(&left_up_coarse, params.backup_distance);
    let (left_down_kept, left_down_restart) = backed_off(&left_down_coarse, params.backup_distance);
    let (right_up_kept, right_up_restart) = backed_off(&right_up_coarse, params.backup_distance);
    let (right_down_kept, right_down_restart) = backed_off(&right_down_coarse, params.backup_distance);

    let mut left_up_fine = trace_direction(
        image,
        left_up_restart.to_real(),
        top_scan_dir,
        top_scan_dir.orthogonal(),
        left_width,
        left_extension,
        params,
        -1,
        1
    );
    let mut left_down_fine = trace_direction(
        image,
        left_down_restart.to_real(),
        bottom_scan_dir,
        bottom_scan_dir.orthogonal(),
        left_width,
        left_extension,
        params,
        1,
        1
    );
    let mut right_up_fine = trace_direction(
        image,
        right_up_restart.to_real(),
        top_scan_dir,
        top_scan_dir.orthogonal(),
        right_width,
        right_extension,
        params,
        -1,
        1
    );
    let mut right_down_fine = trace_direction(
        image,
        right_down_restart.to_real(),
        bottom_scan_dir,
        bottom_scan_dir.orthogonal(),
        right_width,
        right_extension,
        params,
        1,
        1
    );

    let mut left: VecDeque<IVec> = VecDeque::new();
    let mut left_up = left_up_kept;
    left_up.append(&mut left_up_fine);
    for point in left_up
    {
        left.push_front(point);
    }
    left.push_back(left_center.round_to_ivec());
    let mut left_down = left_down_kept;
    left_down.append(&mut left_down_fine);
    left.extend(left_down);

    let mut right: VecDeque<IVec> = VecDeque::new();
    let mut right_up = right_up_kept;
    right_up.append(&mut right_up_fine);
    for point in right_up
    {
        right.push_front(point);
    }
    right.push_back(right_center.round_to_ivec());
    let mut right_down = right_down_kept;
    right_down.append(&mut right_down_fine);
    right.extend(right_down);

    if left.len() < 2 || right.len() < 2
    {
        return None;
    }

    let mut left: Vec<IVec> = left.into_iter().collect();
    let mut right: Vec<IVec> = right.into_iter().collect();
    if params.smooth_contours
    {
        left = densify_and_smooth(&left);
        right = densify_and_smooth(&right);
    }

    Some(LandmarkContours { left, right })
}

/// Which axis a contour runs along, chosen by whichever axis covers more
/// ground between the contour's endpoints.
#[derive(Copy, Clone, Eq, PartialEq)]
enum DominantAxis
{
    Vertical,
    Horizontal
}

fn dominant_axis(points: &[IVec]) -> DominantAxis
{
    match (points.first(), points.last())
    {
        (Some(&a), Some(&b)) if (b.x - a.x).abs() > (b.y - a.y).abs() => DominantAxis::Horizontal,
        _ => DominantAxis::Vertical
    }
}

/// §4.4's final paragraph: "interpolate gaps between consecutive points
/// along the contour's dominant axis and apply a 1-2-1 filter on the
/// perpendicular axis". A miss-then-hit run in `trace_direction` can
/// accept a new center several orthogonal steps away from the last one,
/// leaving the contour with gaps along its dominant axis; this densifies
/// it to one point per dominant-axis step by linearly interpolating the
/// perpendicular coordinate, then smooths that perpendicular coordinate
/// with a three-tap `(a + 2b + c) / 4` filter.
fn densify_and_smooth(points: &[IVec]) -> Vec<IVec>
{
    if points.len() < 3
    {
        return points.to_vec();
    }

    let axis = dominant_axis(points);
    let mut dense = Vec::with_capacity(points.len());
    for pair in points.windows(2)
    {
        let (a, b) = (pair[0], pair[1]);
        dense.push(a);
        let (span, sign) = match axis
        {
            DominantAxis::Vertical => ((b.y - a.y).abs(), (b.y - a.y).signum()),
            DominantAxis::Horizontal => ((b.x - a.x).abs(), (b.x - a.x).signum())
        };
        for step in 1..span
        {
            let t = f64::from(step) / f64::from(span);
            dense.push(match axis {
                DominantAxis::Vertical => IVec::new((f64::from(a.x) + f64::from(b.x - a.x) * t).round() as i32, a.y + sign * step),
                DominantAxis::Horizontal => IVec::new(a.x + sign * step, (f64::from(a.y) + f64::from(b.y - a.y) * t).round() as i32)
            });
        }
    }
    dense.push(*points.last().unwrap());

    let mut smoothed = dense.clone();
    for i in 1..dense.len() - 1
    {
        match axis
        {
            DominantAxis::Vertical => smoothed[i].x = (dense[i - 1].x + 2 * dense[i].x + dense[i + 1].x) / 4,
            DominantAxis::Horizontal => smoothed[i].y = (dense[i - 1].y + 2 * dense[i].y + dense[i + 1].y) / 4
        }
    }
    smoothed
}

/// The deck height (in samples) this trace covers: the smaller of the
/// left and right contour's vertical extent, used by the scan manager to
/// check against `calc_min_sample_height` (§4.9).
#[must_use]
pub fn traced_height(contours: &LandmarkContours) -> f64
{
    fn extent(points: &[IVec]) -> f64
    {
        match (points.first(), points.last())
        {
            (Some(&a), Some(&b)) => (b.to_real() - a.to_real()).length(),
            _ => 0.0
        }
    }
    extent(&contours.left).min(extent(&contours.right))
}
