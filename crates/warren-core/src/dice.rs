//! Randomness seam for jitter, damage rolls, coin flips and picks.

use std::time::Duration;

/// Source of uniform random numbers.
///
/// Only [`below`](Dice::below) must be implemented; every other roll is
/// derived from it, so a scripted implementation controls all outcomes.
pub trait Dice: Send + Sync {
    /// Uniform integer in `[0, n)`. Returns 0 when `n` is 0.
    fn below(&self, n: u64) -> u64;

    /// Uniform integer in `min..=max`. Returns `min` if `max < min`.
    fn range(&self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        // The span of any two i64 fits a u64; only the full range has no
        // representable `span + 1`.
        let span = max.wrapping_sub(min) as u64;
        let offset = match span.checked_add(1) {
            Some(n) => self.below(n),
            None => self.below(u64::MAX),
        };
        min.wrapping_add(offset as i64)
    }

    /// Fair coin flip.
    fn coin(&self) -> bool {
        self.below(2) == 0
    }

    /// Uniform index into a collection of `len` elements.
    fn pick(&self, len: usize) -> usize {
        self.below(len as u64) as usize
    }

    /// Uniform extra delay in `[0, max)`. Zero when `max` is zero.
    fn jitter(&self, max: Duration) -> Duration {
        let nanos = u64::try_from(max.as_nanos()).unwrap_or(u64::MAX);
        if nanos == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.below(nanos))
    }
}
