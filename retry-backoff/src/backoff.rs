use crate::error::PolicyError;
use rand::{thread_rng, Rng};
use std::time::Duration;

/// Rate of exponential increase in the delay, applied once per retry.
pub const RATE: f64 = 1.3;
/// Largest fraction of the delay that jitter may take away.
pub const JITTER: f64 = 0.4;

/// Minimum delay of the default policy.
pub const DEFAULT_MIN: Duration = Duration::from_millis(20);
/// Maximum delay of the default policy.
pub const DEFAULT_MAX: Duration = Duration::from_secs(10);

/// Ready-to-use policy for callers that do not need custom bounds.
pub const DEFAULT_BACKOFF: ExponentialBackoff = ExponentialBackoff::new(DEFAULT_MIN, DEFAULT_MAX);

/// Immutable exponential backoff policy.
///
/// The delay for the n-th retry starts at `min`, grows by [`RATE`] per retry
/// until it reaches `max`, then loses a random share of up to [`JITTER`] of
/// itself. The result never drops below `min`, so a policy that has not grown
/// yet always yields exactly `min`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExponentialBackoff {
    min: Duration,
    max: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        DEFAULT_BACKOFF
    }
}

impl ExponentialBackoff {
    /// Builds a policy without checking the bounds.
    ///
    /// Inverted bounds are accepted; [`delay`](Self::delay) still returns a
    /// value, just not a meaningful one.
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// Builds a policy, rejecting `min > max`.
    pub fn try_new(min: Duration, max: Duration) -> Result<Self, PolicyError> {
        if min > max {
            return Err(PolicyError::InvertedBounds { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Delay before the next attempt after `retries` retries, drawing
    /// jitter from the thread-local generator.
    pub fn delay(&self, retries: u32) -> Duration {
        self.delay_with(retries, &mut thread_rng())
    }

    /// Same as [`delay`](Self::delay) for callers that count retries with a
    /// signed integer. Negative counts behave like zero.
    pub fn delay_from_signed(&self, retries: i64) -> Duration {
        self.delay(clamp_retries(retries))
    }

    /// Delay before the next attempt after `retries` retries, drawing
    /// jitter from `rng`.
    pub fn delay_with<R: Rng + ?Sized>(&self, retries: u32, rng: &mut R) -> Duration {
        let (min, max) = (nanos(self.min), nanos(self.max));
        let mut delay = self.grow(retries);
        if delay > max {
            delay = max;
        }
        delay -= delay * JITTER * rng.gen::<f64>();
        if delay < min {
            delay = min;
        }
        // f64 loses nanoseconds past 2^53, so bound again on the exact values
        let delay = from_nanos(delay).min(self.max);
        if delay < self.min {
            self.min
        } else {
            delay
        }
    }

    /// Pre-jitter delay in nanoseconds, before clamping to `max`.
    fn grow(&self, retries: u32) -> f64 {
        let max = nanos(self.max);
        let mut delay = nanos(self.min);
        let mut left = retries;
        // zero never grows, so stop instead of spinning through `retries`
        while delay < max && delay > 0.0 && left > 0 {
            delay *= RATE;
            left -= 1;
        }
        delay
    }

    /// First retry count whose pre-jitter delay is clamped to `max`.
    ///
    /// `None` when the delay can never get there, i.e. a zero `min` below a
    /// non-zero `max`.
    pub fn saturation_retries(&self) -> Option<u32> {
        let max = nanos(self.max);
        let mut delay = nanos(self.min);
        if delay >= max {
            return Some(0);
        }
        if delay <= 0.0 {
            return None;
        }
        let mut retries = 0u32;
        while delay < max {
            delay *= RATE;
            retries += 1;
        }
        Some(retries)
    }

    /// Endless schedule of delays for retries 0, 1, 2, ...
    pub fn delays<R: Rng>(&self, rng: R) -> Delays<R> {
        Delays {
            policy: *self,
            retries: 0,
            rng,
        }
    }
}

/// Iterator returned by [`ExponentialBackoff::delays`].
#[derive(Debug)]
pub struct Delays<R> {
    policy: ExponentialBackoff,
    retries: u32,
    rng: R,
}

impl<R> Delays<R> {
    /// Retry count the next delay will be computed for.
    pub fn retries(&self) -> u32 {
        self.retries
    }
}

impl<R: Rng> Iterator for Delays<R> {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = self.policy.delay_with(self.retries, &mut self.rng);
        self.retries = self.retries.saturating_add(1);
        Some(delay)
    }
}

/// Maps a signed retry count onto the `u32` domain: negatives become zero,
/// anything past `u32::MAX` saturates.
pub fn clamp_retries(retries: i64) -> u32 {
    u32::try_from(retries.max(0)).unwrap_or(u32::MAX)
}

fn nanos(d: Duration) -> f64 {
    d.as_nanos() as f64
}

fn from_nanos(n: f64) -> Duration {
    if n < u64::MAX as f64 {
        Duration::from_nanos(n as u64)
    } else {
        Duration::try_from_secs_f64(n / 1e9).unwrap_or(Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn no_jitter() -> StepRng {
        StepRng::new(0, 0)
    }

    fn full_jitter() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    fn assert_close(actual: Duration, expected: Duration) {
        let diff = if actual > expected { actual - expected } else { expected - actual };
        assert!(diff <= Duration::from_micros(1), "{actual:?} != {expected:?}");
    }

    #[test]
    fn test_growth_without_jitter() {
        let b = DEFAULT_BACKOFF;
        assert_eq!(b.delay_with(0, &mut no_jitter()), Duration::from_millis(20));
        assert_close(b.delay_with(1, &mut no_jitter()), Duration::from_millis(26));
        assert_close(b.delay_with(2, &mut no_jitter()), Duration::from_micros(33_800));
        assert_close(b.delay_with(3, &mut no_jitter()), Duration::from_micros(43_940));
    }

    #[test]
    fn test_clamped_to_max() {
        let b = DEFAULT_BACKOFF;
        assert_eq!(b.delay_with(100, &mut no_jitter()), Duration::from_secs(10));
        assert_eq!(b.delay_with(u32::MAX, &mut no_jitter()), Duration::from_secs(10));
    }

    #[test]
    fn test_full_jitter_takes_forty_percent() {
        let b = DEFAULT_BACKOFF;
        assert_close(b.delay_with(100, &mut full_jitter()), Duration::from_secs(6));
        // floor pulls the unsaturated case back to min
        assert_eq!(b.delay_with(0, &mut full_jitter()), Duration::from_millis(20));
    }

    #[test]
    fn test_inverted_bounds_degrade_to_min() {
        let b = ExponentialBackoff::new(Duration::from_secs(2), Duration::from_secs(1));
        assert_eq!(b.delay_with(5, &mut full_jitter()), Duration::from_secs(2));
        assert!(ExponentialBackoff::try_new(Duration::from_secs(2), Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_bounds_past_f64_precision() {
        let odd = Duration::from_nanos((1 << 53) + 1);
        let b = ExponentialBackoff::new(odd, odd);
        assert_eq!(b.delay_with(0, &mut no_jitter()), odd);
        assert_eq!(b.delay_with(7, &mut full_jitter()), odd);
    }

    #[test]
    fn test_bounds_past_u64_nanos() {
        let huge = Duration::from_secs(u64::MAX / 2);
        let b = ExponentialBackoff::new(huge, huge);
        assert_eq!(b.delay_with(0, &mut full_jitter()), huge);

        let wide = ExponentialBackoff::new(Duration::from_secs(1), huge);
        for rng in [&mut no_jitter(), &mut full_jitter()] {
            let d = wide.delay_with(u32::MAX, rng);
            assert!(d >= huge.mul_f64(0.5) && d <= huge, "{d:?}");
        }
    }

    #[test]
    fn test_zero_min_never_grows() {
        let b = ExponentialBackoff::new(Duration::ZERO, Duration::from_secs(1));
        assert_eq!(b.delay_with(u32::MAX, &mut no_jitter()), Duration::ZERO);
        assert_eq!(b.saturation_retries(), None);
    }

    #[test]
    fn test_saturation_retries() {
        // 20ms * 1.3^24 ~ 10.8s, 1.3^23 ~ 8.3s
        assert_eq!(DEFAULT_BACKOFF.saturation_retries(), Some(24));
        let flat = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(1));
        assert_eq!(flat.saturation_retries(), Some(0));
    }

    #[test]
    fn test_clamp_retries() {
        assert_eq!(clamp_retries(-7), 0);
        assert_eq!(clamp_retries(0), 0);
        assert_eq!(clamp_retries(12), 12);
        assert_eq!(clamp_retries(i64::MAX), u32::MAX);
    }

    #[test]
    fn test_delays_iterator_walks_retries() {
        let mut it = DEFAULT_BACKOFF.delays(no_jitter());
        assert_eq!(it.next(), Some(Duration::from_millis(20)));
        assert_close(it.next().unwrap(), Duration::from_millis(26));
        assert_eq!(it.retries(), 2);
    }
}
