//! Clocks and tick conversions
//!
//! The kernel time base is a monotonically increasing tick counter running
//! at [`CFG_TICK_RATE_HZ`]. Durations are converted to ticks by rounding
//! down ([`to_ticks`]); timeouts round up so a bounded wait never returns
//! before the requested time has passed.

use core::ops::{Add, Sub};
use core::time::Duration;

use crate::config::{CFG_CYCLE_RATE_HZ, CFG_TICK_RATE_HZ};
use crate::port;
use crate::types::Tick;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Convert a duration to ticks, rounding down
pub const fn to_ticks(d: Duration) -> Tick {
    let t = d.as_nanos() * CFG_TICK_RATE_HZ as u128 / NANOS_PER_SEC;
    if t > Tick::MAX as u128 { Tick::MAX } else { t as Tick }
}

/// Convert a duration to ticks, rounding up
pub const fn to_ticks_ceil(d: Duration) -> Tick {
    let n = d.as_nanos() * CFG_TICK_RATE_HZ as u128;
    let t = (n + NANOS_PER_SEC - 1) / NANOS_PER_SEC;
    if t > Tick::MAX as u128 { Tick::MAX } else { t as Tick }
}

/// Convert ticks to a duration, rounding down to whole nanoseconds
pub const fn ticks_to_duration(ticks: Tick) -> Duration {
    let ns = ticks as u128 * NANOS_PER_SEC / CFG_TICK_RATE_HZ as u128;
    Duration::new((ns / NANOS_PER_SEC) as u64, (ns % NANOS_PER_SEC) as u32)
}

/// Ticks elapsed since the kernel time base started
#[inline]
pub fn uptime_ticks() -> Tick {
    port::uptime_ticks()
}

/// A point in time measured from the start of the kernel time base
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimePoint(Duration);

impl TimePoint {
    /// Time since the start of the time base
    #[inline]
    pub const fn since_boot(self) -> Duration {
        self.0
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later
    #[inline]
    pub fn saturating_duration_since(self, earlier: TimePoint) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<Duration> for TimePoint {
    type Output = TimePoint;

    /// Saturates at the largest representable time point
    fn add(self, rhs: Duration) -> TimePoint {
        TimePoint(self.0.saturating_add(rhs))
    }
}

impl Sub<TimePoint> for TimePoint {
    type Output = Duration;

    fn sub(self, rhs: TimePoint) -> Duration {
        self.saturating_duration_since(rhs)
    }
}

/// Clock at tick resolution
pub struct UptimeClock;

impl UptimeClock {
    pub fn now() -> TimePoint {
        TimePoint(ticks_to_duration(uptime_ticks()))
    }
}

/// Clock at hardware cycle resolution
pub struct CycleClock;

impl CycleClock {
    pub fn now() -> TimePoint {
        let cycles = port::cycles() as u128;
        let ns = cycles * NANOS_PER_SEC / CFG_CYCLE_RATE_HZ as u128;
        TimePoint(Duration::new(
            (ns / NANOS_PER_SEC) as u64,
            (ns % NANOS_PER_SEC) as u32,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_conversion_rounding() {
        let one_tick = ticks_to_duration(1);
        assert_eq!(to_ticks(one_tick), 1);
        assert_eq!(to_ticks(one_tick - Duration::from_nanos(1)), 0);
        assert_eq!(to_ticks_ceil(one_tick - Duration::from_nanos(1)), 1);
        assert_eq!(to_ticks_ceil(Duration::ZERO), 0);
        assert_eq!(to_ticks(Duration::from_secs(1)), CFG_TICK_RATE_HZ as Tick);
    }

    #[test]
    fn time_point_add_saturates() {
        let t = TimePoint(Duration::from_secs(5));
        assert_eq!((t + Duration::MAX).since_boot(), Duration::MAX);
        assert!(t + Duration::MAX >= t);
    }
}
