//! Progress reporting for index and lookup builds.
//!
//! Builds stream a CSV of unknown length, so the trait only exposes
//! counting and messages; binaries render it with `indicatif` and tests
//! pass [`null_progress`].

use std::sync::Arc;

/// Receives progress updates from a long-running build.
///
/// Implementations must be `Send + Sync` so a reporter can be shared
/// with a `spawn_blocking` build task.
pub trait ProgressCallback: Send + Sync {
    /// Advance by `delta` rows.
    fn inc(&self, delta: u64);

    /// Replace the message shown next to the counter.
    fn set_message(&self, msg: String);

    /// Mark the build as complete with a final message.
    fn finish(&self, msg: String);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
