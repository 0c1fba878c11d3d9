//! Pending speech requests.
//!
//! A pure synchronous container (no async, no I/O, no locking). The queue
//! processor owns it behind a mutex.
//!
//! # Ordering
//!
//! - Non-priority requests are appended at the back (FIFO)
//! - Priority requests are inserted at the front, so the newest priority
//!   request is spoken next
//!
//! Priority preempts ordering only; it never interrupts an utterance that is
//! already playing.
//!
//! There is no capacity limit.

use std::collections::VecDeque;

use crate::domain::SpeechRequest;

/// Ordered buffer of pending speech requests with a priority lane.
#[derive(Debug, Default)]
pub struct RequestQueue {
    pending: VecDeque<SpeechRequest>,
}

impl RequestQueue {
    pub const fn new() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }

    /// Add a request according to its priority.
    pub fn enqueue(&mut self, request: SpeechRequest) {
        if request.priority {
            self.pending.push_front(request);
        } else {
            self.pending.push_back(request);
        }
    }

    /// Remove and return the front request.
    pub fn dequeue(&mut self) -> Option<SpeechRequest> {
        self.pending.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Drop every pending request, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(queue: &mut RequestQueue) -> Vec<String> {
        std::iter::from_fn(|| queue.dequeue()).map(|r| r.text).collect()
    }

    #[test]
    fn dequeue_fifo() {
        let mut queue = RequestQueue::new();
        queue.enqueue(SpeechRequest::new("a", false));
        queue.enqueue(SpeechRequest::new("b", false));
        queue.enqueue(SpeechRequest::new("c", false));

        assert_eq!(queue.len(), 3);
        assert_eq!(texts(&mut queue), ["a", "b", "c"]);
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn priority_jumps_ahead_of_non_priority() {
        let mut queue = RequestQueue::new();
        queue.enqueue(SpeechRequest::new("a", false));
        queue.enqueue(SpeechRequest::new("b", false));
        queue.enqueue(SpeechRequest::new("urgent", true));

        assert_eq!(texts(&mut queue), ["urgent", "a", "b"]);
    }

    #[test]
    fn newest_priority_goes_first() {
        let mut queue = RequestQueue::new();
        queue.enqueue(SpeechRequest::new("a", false));
        queue.enqueue(SpeechRequest::new("p1", true));
        queue.enqueue(SpeechRequest::new("p2", true));

        assert_eq!(texts(&mut queue), ["p2", "p1", "a"]);
    }

    #[test]
    fn clear_reports_dropped_count() {
        let mut queue = RequestQueue::new();
        queue.enqueue(SpeechRequest::new("a", false));
        queue.enqueue(SpeechRequest::new("b", true));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }
}
