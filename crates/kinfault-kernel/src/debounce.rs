//! [`OnsetTracker`] – collapses a run of per-frame detections into onsets.
//!
//! A violation that persists over consecutive frames is reported once, at
//! its first frame.  If the same key is seen again after a gap of at least
//! one frame, it is reported again.
//!
//! # Example
//!
//! ```rust
//! use kinfault_kernel::debounce::OnsetTracker;
//!
//! let mut onsets = OnsetTracker::new();
//!
//! assert!(onsets.observe("ELBOW", 10));  // onset
//! assert!(!onsets.observe("ELBOW", 11)); // continuing
//! assert!(!onsets.observe("ELBOW", 12));
//! assert!(onsets.observe("ELBOW", 14));  // gap at 13 → new onset
//! ```

use std::collections::HashMap;
use std::hash::Hash;

/// Remembers the last frame at which each key was detected.
#[derive(Debug, Clone)]
pub struct OnsetTracker<K> {
    last_frame: HashMap<K, usize>,
}

impl<K> Default for OnsetTracker<K> {
    fn default() -> Self {
        Self {
            last_frame: HashMap::new(),
        }
    }
}

impl<K: Hash + Eq> OnsetTracker<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a detection of `key` at `frame`.
    ///
    /// Returns `true` when this detection starts a new episode and should be
    /// reported.  The stored frame is updated either way.
    pub fn observe(&mut self, key: K, frame: usize) -> bool {
        match self.last_frame.insert(key, frame) {
            None => true,
            Some(last) => frame > last + 1,
        }
    }
}
