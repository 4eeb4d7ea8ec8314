//! Randomized exponential backoff for retry loops.
//!
//! [`ExponentialBackoff`] turns a retry count into a delay: it grows from a
//! minimum by a fixed rate, stops at a maximum, and subtracts up to 40% jitter
//! without ever going below the minimum. Sleeping, deciding whether to retry,
//! and capping attempts are left to the caller.
//!
//! ```
//! use retry_backoff::DEFAULT_BACKOFF;
//! use std::time::Duration;
//!
//! let d = DEFAULT_BACKOFF.delay(3);
//! assert!(d > Duration::from_millis(20) && d <= Duration::from_secs(10));
//! ```

pub mod backoff;
pub mod cli;
pub mod config;
pub mod error;
pub mod output;

pub use backoff::{clamp_retries, Delays, ExponentialBackoff, DEFAULT_BACKOFF, JITTER, RATE};
pub use error::PolicyError;
