//! Counted wait reasons behind the single loading indicator.

use std::collections::HashMap;
use tracing::warn;

/// A counted set of reasons subsystems are currently waiting.
///
/// Multiple independent subsystems may each register the same reason; the
/// loading indicator is visible iff the set is non-empty.
#[derive(Debug, Default)]
pub struct WaitGroup {
    reasons: HashMap<&'static str, usize>,
}

impl WaitGroup {
    /// Create an empty wait group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wait for `reason`.
    pub fn begin_wait(&mut self, reason: &'static str) {
        *self.reasons.entry(reason).or_insert(0) += 1;
    }

    /// Release a wait for `reason`.
    ///
    /// Unbalanced releases are logged and ignored rather than underflowing.
    pub fn end_wait(&mut self, reason: &'static str) {
        match self.reasons.get_mut(reason) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                self.reasons.remove(reason);
            }
            None => warn!("end_wait without begin_wait for {:?}", reason),
        }
    }

    /// Whether anything is currently waiting.
    pub fn is_waiting(&self) -> bool {
        !self.reasons.is_empty()
    }

    /// Whether a specific reason is registered.
    pub fn is_waiting_on(&self, reason: &'static str) -> bool {
        self.reasons.contains_key(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_visible_iff_non_empty() {
        let mut waits = WaitGroup::new();
        assert!(!waits.is_waiting());

        waits.begin_wait("reconnecting");
        waits.begin_wait("loading-assets");
        assert!(waits.is_waiting());

        waits.end_wait("reconnecting");
        assert!(waits.is_waiting());

        waits.end_wait("loading-assets");
        assert!(!waits.is_waiting());
    }

    #[test]
    fn counted_reasons() {
        let mut waits = WaitGroup::new();
        waits.begin_wait("loading-assets");
        waits.begin_wait("loading-assets");

        waits.end_wait("loading-assets");
        assert!(waits.is_waiting_on("loading-assets"));

        waits.end_wait("loading-assets");
        assert!(!waits.is_waiting());
    }

    #[test]
    fn unbalanced_end_is_ignored() {
        let mut waits = WaitGroup::new();
        waits.end_wait("reconnecting");
        assert!(!waits.is_waiting());
    }
}
