//! Shared test utilities for the kube-stress workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Fake client handles with scripted latency and failures
//! - In-memory result sinks
//! - Kubeconfig fixtures
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../../crates/test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{FixedDelayClient, RecordingSink};
//! ```

pub mod fakes;
pub mod fixtures;
pub mod sinks;

// Re-export commonly used items at the crate root
pub use fakes::*;
pub use fixtures::*;
pub use sinks::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(33.3333_f64, 100.0 / 3.0, 0.001); // passes
/// assert_approx_eq!(50.1_f64, 50.0_f64, 0.001);       // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(33.3333, 100.0 / 3.0, 0.001);
        assert_approx_eq!(0.0, 0.0, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(50.1, 50.0, 0.001);
    }
}
