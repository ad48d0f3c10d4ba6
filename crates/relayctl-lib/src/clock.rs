//! Millisecond time source with 32-bit wraparound.
//!
//! Timestamps are `u32` milliseconds that wrap after ~49.7 days, the same as
//! an embedded `millis()` counter. Compare them only through [`elapsed`] /
//! [`has_elapsed`], never with `<` on raw values.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Wrapping millisecond timestamp.
pub type Millis = u32;

/// Monotonic millisecond source.
pub trait Clock {
    fn now_ms(&self) -> Millis;
}

/// Milliseconds from `since` to `now`, correct across one counter wrap.
pub fn elapsed(since: Millis, now: Millis) -> Millis {
    now.wrapping_sub(since)
}

/// Longest span [`has_elapsed`] can measure (2^31 - 1 ms, about 24.8 days).
pub const MAX_SPAN_MS: Millis = i32::MAX as Millis;

/// Whether at least `duration_ms` has passed since `since`.
///
/// Differences past [`MAX_SPAN_MS`] are read as `now` lying *before*
/// `since` (a caller passing a slightly stale time) and never count as
/// elapsed. Non-positive durations have elapsed whenever `now` is not
/// before `since`.
pub fn has_elapsed(since: Millis, now: Millis, duration_ms: i64) -> bool {
    let span = elapsed(since, now);
    if span > MAX_SPAN_MS {
        return false;
    }
    i64::from(span) >= duration_ms
}

/// Wall-clock source backed by [`Instant`], truncated to 32 bits.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> Millis {
        // Truncation is the wrap.
        self.start.elapsed().as_millis() as Millis
    }
}

/// Hand-driven clock. Clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Millis>>,
}

impl ManualClock {
    pub fn new(start: Millis) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn set(&self, now: Millis) {
        self.now.set(now);
    }

    /// Move forward by `ms`, wrapping like the hardware counter.
    pub fn advance(&self, ms: Millis) -> Millis {
        let next = self.now.get().wrapping_add(ms);
        self.now.set(next);
        next
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.get()
    }
}
