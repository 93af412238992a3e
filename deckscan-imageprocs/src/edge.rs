//! The edge detector (§4.1): turns a sample line into an ordered sequence
//! of signed-slope peaks.
//!
//! The algorithm works entirely in rolling *sums*, not averages, so the
//! hot loop stays in integer arithmetic; the window-size factor is folded
//! into the threshold instead of divided out of every sum.
use deckscan_core::rolling::RollingWindowArray;
use deckscan_core::sample_line::SampleLine;
use deckscan_core::Edge;

/// Tunable parameters for one `detect` call. All window sizes are expected
/// to already be scaled by the caller (`image_height / 720`, per §4.1).
#[derive(Copy, Clone, Debug)]
pub struct EdgeDetectorParams
{
    pub window_size: usize,
    pub min_max_window_size: usize,
    pub overlap: i32,
    pub sensitivity: f64,
    pub minimum_threshold: i32
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EdgeDetectError
{
    /// `N <= window_size`, or the slope curve has fewer than one sample.
    TooShort
}

/// Detect edges along `line` per §4.1. Returns an empty (not erroneous)
/// list when no peak passes threshold; fails with [`EdgeDetectError::TooShort`]
/// when the sample line is too short to compute even one slope sample.
pub fn detect(line: &SampleLine, params: EdgeDetectorParams, scratch: &mut RollingWindowArray) -> Result<Vec<Edge>, EdgeDetectError>
{
    let samples = &line.samples;
    if samples.len() <= params.window_size || params.window_size == 0
    {
        return Err(EdgeDetectError::TooShort);
    }

    let sums = scratch.rolling_sum(samples, params.window_size).to_vec();
    let slope_offset = (params.window_size as i64 - i64::from(params.overlap)).max(1) as usize;
    if sums.len() <= slope_offset
    {
        return Err(EdgeDetectError::TooShort);
    }

    let slope_len = sums.len() - slope_offset;
    let slope: Vec<i32> = (0..slope_len).map(|i| sums[i + slope_offset] - sums[i]).collect();
    if slope.is_empty()
    {
        return Err(EdgeDetectError::TooShort);
    }

    let peak_offset = params.window_size as i64 - 1 - i64::from(params.overlap) / 2;

    let candidates = extract_run_extrema(&slope);
    let mut edges = merge_same_sign_runs(candidates, &slope);

    let window_scale = params.window_size as i32;
    let min_threshold = params.minimum_threshold.saturating_mul(window_scale);

    edges.retain(|&(index, slope_value)| {
        let threshold = compute_threshold(samples, index, slope_offset, params, min_threshold, window_scale);
        slope_value.unsigned_abs() >= threshold.unsigned_abs()
    });

    let built = edges
        .into_iter()
        .map(|(index, slope_value)| {
            let raw_offset = if slope_value < 0 { index } else { index + slope_offset };
            let aligned = (raw_offset as i64 + peak_offset).clamp(0, samples.len() as i64 - 1) as usize;
            let threshold = compute_threshold(samples, index, slope_offset, params, min_threshold, window_scale);
            let point = line.point_at(aligned);
            Edge {
                sample_offset: aligned,
                normalized: line.normalized(aligned),
                slope: slope_value,
                threshold,
                point
            }
        })
        .collect();

    Ok(built)
}

/// Walk the slope curve in monotonic runs, keeping one extremum per run:
/// the first of consecutive duplicate maxima (positive peaks), the last of
/// consecutive duplicate minima (negative peaks).
fn extract_run_extrema(slope: &[i32]) -> Vec<(usize, i32)>
{
    let mut out = Vec::new();
    if slope.len() < 2
    {
        if let Some(&value) = slope.first()
        {
            out.push((0, value));
        }
        return out;
    }

    // `rising` tracks the last known trend; `run_start` the index where the
    // current monotonic run (or plateau) began.
    let mut rising: Option<bool> = None;
    let mut run_start = 0usize;

    for i in 1..slope.len()
    {
        let delta = slope[i] - slope[i - 1];
        if delta == 0
        {
            continue;
        }
        let now_rising = delta > 0;
        match rising
        {
            None => rising = Some(now_rising),
            Some(prev_rising) if prev_rising != now_rising =>
            {
                if prev_rising
                {
                    // Was rising, now falling: local max over [run_start, i-1].
                    // First of duplicate maxima => leftmost index at the
                    // plateau value, which is the first index that attained it.
                    let max_index = first_index_of_value(slope, run_start, i - 1, slope[i - 1]);
                    out.push((max_index, slope[max_index]));
                }
                else
                {
                    // Was falling, now rising: local min over [run_start, i-1].
                    // Last of duplicate minima => rightmost index at the
                    // plateau value.
                    let min_index = last_index_of_value(slope, run_start, i - 1, slope[i - 1]);
                    out.push((min_index, slope[min_index]));
                }
                run_start = i - 1;
                rising = Some(now_rising);
            }
            _ => {}
        }
    }

    out
}

fn first_index_of_value(slope: &[i32], from: usize, to: usize, value: i32) -> usize
{
    (from..=to).find(|&i| slope[i] == value).unwrap_or(to)
}

fn last_index_of_value(slope: &[i32], from: usize, to: usize, value: i32) -> usize
{
    (from..=to).rev().find(|&i| slope[i] == value).unwrap_or(to)
}

/// Enforce the edge-polarity invariant (§8): if the run-extrema pass ever
/// yields two consecutive same-sign peaks, keep only the stronger one.
fn merge_same_sign_runs(candidates: Vec<(usize, i32)>, _slope: &[i32]) -> Vec<(usize, i32)>
{
    let mut merged: Vec<(usize, i32)> = Vec::with_capacity(candidates.len());
    for (index, value) in candidates
    {
        if value == 0
        {
            continue;
        }
        match merged.last_mut()
        {
            Some(last) if last.1.signum() == value.signum() =>
            {
                if value.abs() > last.1.abs()
                {
                    *last = (index, value);
                }
            }
            _ => merged.push((index, value))
        }
    }
    merged
}

fn compute_threshold(
    samples: &[i32],
    slope_index: usize,
    slope_offset: usize,
    params: EdgeDetectorParams,
    min_threshold: i32,
    window_scale: i32
) -> i32
{
    let (lo, hi) = if params.min_max_window_size > 0
    {
        let mut scratch = RollingWindowArray::new();
        let (mins, maxs) = scratch.rolling_min_max(samples, params.min_max_window_size);
        if mins.is_empty()
        {
            return min_threshold;
        }
        let lookup = (slope_index + slope_offset / 2).min(mins.len() - 1);
        (mins[lookup], maxs[lookup])
    }
    else
    {
        RollingWindowArray::global_min_max(samples).unwrap_or((0, 0))
    };

    let raw = (params.sensitivity * f64::from(hi - lo) * f64::from(window_scale)) as i32;
    raw.max(min_threshold)
}

#[cfg(test)]
mod tests
{
    use super::*;
    use deckscan_core::geometry::{IVec, Line};
    use deckscan_core::image::ImageBuffer;

    fn params() -> EdgeDetectorParams
    {
        EdgeDetectorParams {
            window_size: 3,
            min_max_window_size: 0,
            overlap: 0,
            sensitivity: 0.2,
            minimum_threshold: 1
        }
    }

    fn line_from_samples(samples: Vec<i32>) -> SampleLine
    {
        SampleLine {
            p0: IVec::new(0, 0),
            p1: IVec::new(samples.len() as i32 - 1, 0),
            samples
        }
    }

    #[test]
    fn too_short_line_is_an_error()
    {
        let line = line_from_samples(vec![1, 2]);
        let mut scratch = RollingWindowArray::new();
        assert_eq!(detect(&line, params(), &mut scratch), Err(EdgeDetectError::TooShort));
    }

    #[test]
    fn bright_dark_bright_yields_alternating_edges()
    {
        // bright .. dark mark .. bright
        let samples: Vec<i32> = [200, 200, 200, 200, 10, 10, 10, 10, 200, 200, 200, 200].to_vec();
        let line = line_from_samples(samples);
        let mut scratch = RollingWindowArray::new();
        let edges = detect(&line, params(), &mut scratch).unwrap();

        assert!(!edges.is_empty());
        for pair in edges.windows(2)
        {
            assert_ne!(pair[0].slope.signum(), pair[1].slope.signum());
        }
    }

    #[test]
    fn flat_line_yields_no_edges()
    {
        let samples = vec![128; 20];
        let line = line_from_samples(samples);
        let mut scratch = RollingWindowArray::new();
        let edges = detect(&line, params(), &mut scratch).unwrap();
        assert!(edges.is_empty());
    }

    #[test]
    fn negative_peak_precedes_positive_peak_for_a_single_mark()
    {
        let samples: Vec<i32> = [250, 250, 250, 0, 0, 0, 250, 250, 250].to_vec();
        let line = line_from_samples(samples);
        let mut scratch = RollingWindowArray::new();
        let edges = detect(&line, params(), &mut scratch).unwrap();
        assert!(edges.len() >= 2);
        assert!(edges[0].is_start());
        assert!(edges.iter().any(Edge::is_end));
    }

    #[test]
    fn image_backed_sample_line_detects_a_dark_bar()
    {
        let width = 20;
        let mut image: ImageBuffer<'static, u8> = ImageBuffer::owned(width, 1);
        for x in 0..width
        {
            image.set(x, 0, if (8..12).contains(&x) { 10 } else { 220 });
        }
        let line = SampleLine::clipped(&image, Line::new(IVec::new(0, 0), IVec::new(width as i32 - 1, 0)), image.rect()).unwrap();
        let mut scratch = RollingWindowArray::new();
        let edges = detect(&line, params(), &mut scratch).unwrap();
        assert!(edges.iter().any(Edge::is_start));
        assert!(edges.iter().any(Edge::is_end));
    }
}
