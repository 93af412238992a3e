//! Rolling-window sums, minimums and maximums over a flat sample array.
//!
//! The edge detector and the landmark tracer both need windowed statistics
//! recomputed every frame over arrays whose length varies with the sample
//! line currently being processed. [`RollingWindowArray`] keeps one set of
//! scratch buffers per scan manager and grows them geometrically (by 1.5x)
//! instead of reallocating to the exact size every call; it never shrinks
//! the underlying `Vec` capacity within a run, only its reported length.
use std::collections::VecDeque;

/// Growth factor applied when a scratch buffer's capacity is exceeded.
const GROWTH_SCALAR: f64 = 1.5;

fn reserve_with_growth<T>(buf: &mut Vec<T>, needed: usize)
{
    if buf.capacity() < needed
    {
        let target = ((needed as f64) * GROWTH_SCALAR).ceil() as usize;
        let additional = target.saturating_sub(buf.len());
        buf.reserve(additional);
    }
}

/// Reusable scratch space for rolling sum / rolling min / rolling max over
/// `i32` sample arrays.
#[derive(Default)]
pub struct RollingWindowArray
{
    sums: Vec<i32>,
    mins: Vec<i32>,
    maxs: Vec<i32>
}

impl RollingWindowArray
{
    #[must_use]
    pub fn new() -> RollingWindowArray
    {
        RollingWindowArray::default()
    }

    /// Rolling sum of `samples` over `window`. The returned slice has
    /// length `samples.len() - window + 1`, or is empty when
    /// `samples.len() < window`.
    pub fn rolling_sum(&mut self, samples: &[i32], window: usize) -> &[i32]
    {
        self.sums.clear();
        if window == 0 || samples.len() < window
        {
            return &self.sums;
        }
        let out_len = samples.len() - window + 1;
        reserve_with_growth(&mut self.sums, out_len);

        let mut sum: i64 = samples[..window].iter().map(|&s| i64::from(s)).sum();
        self.sums.push(sum as i32);
        for i in 1..out_len
        {
            sum += i64::from(samples[i + window - 1]) - i64::from(samples[i - 1]);
            self.sums.push(sum as i32);
        }
        &self.sums
    }

    /// Rolling `(min, max)` of `samples` over `window`, computed in O(n)
    /// total with a monotonic-deque sliding window. Both returned slices
    /// have length `samples.len() - window + 1`, or are empty when
    /// `samples.len() < window`.
    pub fn rolling_min_max(&mut self, samples: &[i32], window: usize) -> (&[i32], &[i32])
    {
        self.mins.clear();
        self.maxs.clear();
        if window == 0 || samples.len() < window
        {
            return (&self.mins, &self.maxs);
        }
        let out_len = samples.len() - window + 1;
        reserve_with_growth(&mut self.mins, out_len);
        reserve_with_growth(&mut self.maxs, out_len);

        let mut min_deque: VecDeque<usize> = VecDeque::with_capacity(window);
        let mut max_deque: VecDeque<usize> = VecDeque::with_capacity(window);

        for (i, &value) in samples.iter().enumerate()
        {
            while min_deque.back().is_some_and(|&j| samples[j] >= value)
            {
                min_deque.pop_back();
            }
            min_deque.push_back(i);
            while max_deque.back().is_some_and(|&j| samples[j] <= value)
            {
                max_deque.pop_back();
            }
            max_deque.push_back(i);

            if i + 1 >= window
            {
                let window_start = i + 1 - window;
                if *min_deque.front().unwrap() < window_start
                {
                    min_deque.pop_front();
                }
                if *max_deque.front().unwrap() < window_start
                {
                    max_deque.pop_front();
                }
                self.mins.push(samples[*min_deque.front().unwrap()]);
                self.maxs.push(samples[*max_deque.front().unwrap()]);
            }
        }

        (&self.mins, &self.maxs)
    }

    /// Global `(min, max)` over the whole array; used when
    /// `min_max_window_size == 0` (edge detector, §4.1).
    #[must_use]
    pub fn global_min_max(samples: &[i32]) -> Option<(i32, i32)>
    {
        if samples.is_empty()
        {
            return None;
        }
        let mut lo = samples[0];
        let mut hi = samples[0];
        for &s in &samples[1..]
        {
            lo = lo.min(s);
            hi = hi.max(s);
        }
        Some((lo, hi))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn rolling_sum_matches_naive_sum()
    {
        let samples = [1, 2, 3, 4, 5, 6];
        let mut scratch = RollingWindowArray::new();
        let sums = scratch.rolling_sum(&samples, 3).to_vec();
        assert_eq!(sums, vec![6, 9, 12, 15]);
    }

    #[test]
    fn rolling_sum_too_short_is_empty()
    {
        let samples = [1, 2];
        let mut scratch = RollingWindowArray::new();
        assert!(scratch.rolling_sum(&samples, 5).is_empty());
    }

    #[test]
    fn rolling_min_max_matches_naive()
    {
        let samples = [5, 3, 8, 1, 9, 2, 7];
        let mut scratch = RollingWindowArray::new();
        let (mins, maxs) = scratch.rolling_min_max(&samples, 3);
        let mins = mins.to_vec();
        let maxs = maxs.to_vec();

        let naive_min: Vec<i32> = (0..=samples.len() - 3)
            .map(|i| *samples[i..i + 3].iter().min().unwrap())
            .collect();
        let naive_max: Vec<i32> = (0..=samples.len() - 3)
            .map(|i| *samples[i..i + 3].iter().max().unwrap())
            .collect();

        assert_eq!(mins, naive_min);
        assert_eq!(maxs, naive_max);
    }

    #[test]
    fn scratch_buffers_never_shrink_capacity()
    {
        let mut scratch = RollingWindowArray::new();
        let big = vec![1; 1000];
        scratch.rolling_sum(&big, 10);
        let grown_capacity = scratch.sums.capacity();

        let small = vec![1; 20];
        scratch.rolling_sum(&small, 10);
        assert!(scratch.sums.capacity() >= grown_capacity);
    }

    #[test]
    fn global_min_max_of_empty_is_none()
    {
        assert_eq!(RollingWindowArray::global_min_max(&[]), None);
    }
}
