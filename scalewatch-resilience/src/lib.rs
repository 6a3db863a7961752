//! Resilience patterns for scalewatch
//!
//! This crate provides the retry machinery used by readiness probing and the
//! cleanup registry that tears external resources down when a run is
//! interrupted.

pub mod backoff;
pub mod cleanup;
pub mod retry;

// Re-export commonly used types
pub use backoff::{BackoffCalculator, BackoffStrategy};
pub use cleanup::{CleanupId, CleanupOutcome, CleanupRegistry, RunOutcome};
pub use retry::{RetryError, RetryExecutor, RetryPolicy, Retryable};
