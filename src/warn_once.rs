use std::fmt;

use ahash::HashSet;
use tracing::{trace, warn};

/// Logs each distinct capability gap or degraded path only the first time it is hit.
///
/// Keys are static strings naming the condition; the message may carry details of
/// the first occurrence.
#[derive(Debug, Default)]
pub struct WarnOnce {
    reported: HashSet<&'static str>,
}

impl WarnOnce {
    /// Returns `true` if this call emitted the warning.
    pub fn warn(&mut self, key: &'static str, message: fmt::Arguments<'_>) -> bool {
        if self.reported.insert(key) {
            warn!(key, "{}", message);
            true
        } else {
            trace!(key, "{}", message);
            false
        }
    }

    pub fn has_reported(&self, key: &str) -> bool {
        self.reported.contains(key)
    }

    pub fn reported_count(&self) -> usize {
        self.reported.len()
    }
}
