//! The pause-aware monotonic clock interface (§6.3).
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Monotonic clock with explicit pause/resume.
///
/// `pausable_time_ms` never decreases between two consecutive calls not
/// separated by a pause; values returned while paused equal the value at
/// pause onset.
pub trait PausableClock: Send + Sync
{
    fn pausable_time_ms(&self) -> u64;
    fn pause(&self);
    fn resume(&self);
}

/// A [`PausableClock`] backed by [`std::time::Instant`].
pub struct SystemPausableClock
{
    epoch: Instant,
    /// Cumulative milliseconds spent paused so far, subtracted from the raw
    /// elapsed time to get `pausable_time_ms`.
    paused_accum_ms: AtomicU64,
    /// `Some(raw_ms_at_pause_onset)` while paused.
    paused_since_ms: Mutex<Option<u64>>
}

impl Default for SystemPausableClock
{
    fn default() -> SystemPausableClock
    {
        SystemPausableClock::new()
    }
}

impl SystemPausableClock
{
    #[must_use]
    pub fn new() -> SystemPausableClock
    {
        SystemPausableClock {
            epoch: Instant::now(),
            paused_accum_ms: AtomicU64::new(0),
            paused_since_ms: Mutex::new(None)
        }
    }

    fn raw_elapsed_ms(&self) -> u64
    {
        self.epoch.elapsed().as_millis() as u64
    }
}

impl PausableClock for SystemPausableClock
{
    fn pausable_time_ms(&self) -> u64
    {
        let paused_since_ms = self.paused_since_ms.lock().unwrap();
        let raw = match *paused_since_ms
        {
            Some(onset) => onset,
            None => self.raw_elapsed_ms()
        };
        raw.saturating_sub(self.paused_accum_ms.load(Ordering::Relaxed))
    }

    fn pause(&self)
    {
        let mut paused_since_ms = self.paused_since_ms.lock().unwrap();
        if paused_since_ms.is_none()
        {
            *paused_since_ms = Some(self.raw_elapsed_ms());
        }
    }

    fn resume(&self)
    {
        let mut paused_since_ms = self.paused_since_ms.lock().unwrap();
        if let Some(onset) = paused_since_ms.take()
        {
            let elapsed_paused = self.raw_elapsed_ms().saturating_sub(onset);
            self.paused_accum_ms.fetch_add(elapsed_paused, Ordering::Relaxed);
        }
    }
}

/// A deterministic [`PausableClock`] for tests: time only advances when
/// [`ManualClock::advance`] is called.
#[derive(Default)]
pub struct ManualClock
{
    now_ms: Mutex<u64>,
    paused: Mutex<bool>
}

impl ManualClock
{
    #[must_use]
    pub fn new() -> ManualClock
    {
        ManualClock::default()
    }

    pub fn advance(&self, delta_ms: u64)
    {
        if *self.paused.lock().unwrap()
        {
            return;
        }
        *self.now_ms.lock().unwrap() += delta_ms;
    }
}

impl PausableClock for ManualClock
{
    fn pausable_time_ms(&self) -> u64
    {
        *self.now_ms.lock().unwrap()
    }

    fn pause(&self)
    {
        *self.paused.lock().unwrap() = true;
    }

    fn resume(&self)
    {
        *self.paused.lock().unwrap() = false;
    }
}

#[must_use]
pub fn duration_to_ms(duration: Duration) -> u64
{
    duration.as_millis() as u64
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn manual_clock_does_not_advance_while_paused()
    {
        let clock = ManualClock::new();
        clock.advance(10);
        assert_eq!(clock.pausable_time_ms(), 10);
        clock.pause();
        clock.advance(50);
        assert_eq!(clock.pausable_time_ms(), 10);
        clock.resume();
        clock.advance(5);
        assert_eq!(clock.pausable_time_ms(), 15);
    }

    #[test]
    fn system_clock_pause_freezes_reported_time()
    {
        let clock = SystemPausableClock::new();
        clock.pause();
        let frozen = clock.pausable_time_ms();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(clock.pausable_time_ms(), frozen);
        clock.resume();
    }

    #[test]
    fn system_clock_is_monotonic_while_running()
    {
        let clock = SystemPausableClock::new();
        let first = clock.pausable_time_ms();
        std::thread::sleep(Duration::from_millis(2));
        let second = clock.pausable_time_ms();
        assert!(second >= first);
    }
}
