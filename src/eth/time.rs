//! Manages the timestamps the pool stamps entries with

use parking_lot::RwLock;
use std::{sync::Arc, time::Duration};
use tracing::trace;

/// Clock the pool reads admission timestamps from.
///
/// Wall-clock based with an adjustable offset, so tests can travel forward
/// without sleeping.
#[derive(Debug, Clone, Default)]
pub struct Clock {
    /// tracks the overall applied timestamp offset
    offset: Arc<RwLock<i128>>,
}

// === impl Clock ===

impl Clock {
    /// Returns the current timestamp in seconds since the unix epoch
    pub fn now(&self) -> u64 {
        let current = duration_since_unix_epoch().as_secs() as i128;
        current.saturating_add(*self.offset.read()).max(0) as u64
    }

    /// Jumps forward in time by the given seconds
    ///
    /// This applies a permanent offset to the natural UNIX epoch timestamp
    pub fn advance(&self, seconds: u64) {
        let mut current = self.offset.write();
        let next = current.saturating_add(seconds as i128);
        trace!(target: "time", "adding timestamp offset={}, total={}", seconds, next);
        *current = next;
    }
}

/// Returns the current duration since unix epoch.
pub fn duration_since_unix_epoch() -> Duration {
    use std::time::SystemTime;
    let now = SystemTime::now();
    now.duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_else(|err| panic!("Current time {now:?} is invalid: {err:?}"))
}
