use std::time::Duration;
use thiserror::Error;

/// Reasons a backoff policy can be rejected at construction.
///
/// Computing a delay never fails; only building a policy from untrusted
/// bounds does.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("minimum delay {min:?} exceeds maximum delay {max:?}")]
    InvertedBounds { min: Duration, max: Duration },
}
