//! Suppression of repeated speech.
//!
//! The deduplicator remembers every normalized text that has been spoken
//! (or admitted to the queue) since the last [`Deduplicator::clear`], and
//! drops non-priority repeats before they reach the queue.
//!
//! The set is unbounded. Callers are expected to clear it on context changes
//! such as moving to a new lesson.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Normalize text for duplicate comparison: trim and case-fold.
pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Process-wide memory of recently spoken text.
#[derive(Debug, Default)]
pub struct Deduplicator {
    spoken: Mutex<HashSet<String>>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a request should be dropped as a duplicate.
    ///
    /// Priority requests are never suppressed.
    pub fn should_suppress(&self, text: &str, priority: bool) -> bool {
        if priority {
            return false;
        }
        self.lock().contains(&normalize_text(text))
    }

    /// Record `text` as spoken.
    pub fn remember(&self, text: &str) {
        let key = normalize_text(text);
        if !key.is_empty() {
            self.lock().insert(key);
        }
    }

    /// Forget everything spoken so far.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of remembered texts.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.spoken.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
