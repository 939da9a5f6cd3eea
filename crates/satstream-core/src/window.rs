//! Sample offsets and per-window time capture.
//!
//! A window is one pass over the [`SampleSchedule`]: offsets `0, s, 2s, ...`
//! strictly below the horizon. Each window captures its own wall-clock
//! instant `t_now`; sample `k` is stamped `t_now + offset_k`.

use chrono::{DateTime, TimeDelta, Utc};

/// Propagation offsets sampled in every window, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSchedule {
    horizon_seconds: u64,
    spacing_seconds: u64,
}

impl SampleSchedule {
    /// Build a schedule. Returns `None` if either value is zero.
    pub const fn new(horizon_seconds: u64, spacing_seconds: u64) -> Option<Self> {
        if horizon_seconds == 0 || spacing_seconds == 0 {
            return None;
        }
        Some(Self {
            horizon_seconds,
            spacing_seconds,
        })
    }

    /// Horizon covered by one window.
    pub const fn horizon_seconds(&self) -> u64 {
        self.horizon_seconds
    }

    /// Offset step between samples.
    pub const fn spacing_seconds(&self) -> u64 {
        self.spacing_seconds
    }

    /// Number of samples per window.
    pub const fn len(&self) -> u64 {
        self.horizon_seconds.div_ceil(self.spacing_seconds)
    }

    /// Always false; a valid schedule has at least one offset.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Offsets `0, spacing, 2*spacing, ...` below the horizon.
    pub fn offsets(&self) -> impl Iterator<Item = u64> + use<> {
        let spacing = self.spacing_seconds;
        let horizon = self.horizon_seconds;
        std::iter::successors(Some(0_u64), move |o| o.checked_add(spacing))
            .take_while(move |o| *o < horizon)
    }
}

/// Time base captured at the start of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Wall-clock instant captured when the window began.
    pub started_at: DateTime<Utc>,
    /// Seconds of propagation time added to every offset in this window.
    ///
    /// Zero in restart mode; elapsed session time in continuous mode.
    pub base_seconds: u64,
}

impl Window {
    /// A window that restarts propagation at offset zero.
    pub const fn restart(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            base_seconds: 0,
        }
    }

    /// A window whose propagation time continues from `session_start`.
    pub fn continuing(started_at: DateTime<Utc>, session_start: DateTime<Utc>) -> Self {
        let elapsed = started_at.signed_duration_since(session_start).num_seconds();
        Self {
            started_at,
            base_seconds: u64::try_from(elapsed).unwrap_or(0),
        }
    }

    /// Absolute instant for `offset_seconds`, or `None` on overflow.
    pub fn instant_at(&self, offset_seconds: u64) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(offset_seconds).ok()?;
        self.started_at
            .checked_add_signed(TimeDelta::try_seconds(secs)?)
    }

    /// Propagation time for `offset_seconds`, measured from the element epoch.
    pub const fn elapsed_seconds(&self, offset_seconds: u64) -> u64 {
        self.base_seconds.saturating_add(offset_seconds)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn reference_schedule_has_sixty_offsets() {
        let schedule = SampleSchedule::new(600, 10).unwrap();
        let offsets: Vec<u64> = schedule.offsets().collect();
        assert_eq!(offsets.len(), 60);
        assert_eq!(schedule.len(), 60);
        assert_eq!(offsets.first(), Some(&0));
        assert_eq!(offsets.last(), Some(&590));
        assert!(offsets.windows(2).all(|w| w[1] - w[0] == 10));
    }

    #[test]
    fn uneven_horizon_rounds_up() {
        let schedule = SampleSchedule::new(25, 10).unwrap();
        assert_eq!(schedule.offsets().collect::<Vec<_>>(), vec![0, 10, 20]);
        assert_eq!(schedule.len(), 3);
    }

    #[test]
    fn zero_values_are_rejected() {
        assert!(SampleSchedule::new(0, 10).is_none());
        assert!(SampleSchedule::new(600, 0).is_none());
    }

    #[test]
    fn huge_spacing_does_not_overflow() {
        let schedule = SampleSchedule::new(u64::MAX, u64::MAX - 1).unwrap();
        assert_eq!(schedule.offsets().count(), 2);
    }

    #[test]
    fn restart_window_stamps_offsets_from_capture() {
        let t_now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let window = Window::restart(t_now);
        assert_eq!(window.instant_at(0), Some(t_now));
        assert_eq!(
            window.instant_at(590),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 9, 50).unwrap())
        );
        assert_eq!(window.elapsed_seconds(30), 30);
    }

    #[test]
    fn continuing_window_adds_session_age() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 3, 1, 12, 1, 0).unwrap();
        let window = Window::continuing(later, start);
        assert_eq!(window.base_seconds, 60);
        assert_eq!(window.elapsed_seconds(10), 70);
    }

    #[test]
    fn instant_overflow_is_none() {
        let window = Window::restart(DateTime::<Utc>::MAX_UTC);
        assert_eq!(window.instant_at(10), None);
        assert_eq!(window.instant_at(u64::MAX), None);
    }
}
