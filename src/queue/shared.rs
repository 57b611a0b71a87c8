//! Process-wide FIFO queue of opaque string values.

use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::error::{QueueGateError, Result};

/// An unbounded FIFO queue shared by every client.
///
/// All operations take one short-lived lock, so enqueue and dequeue are
/// mutually exclusive and insertion order is the dequeue order.
#[derive(Debug, Default)]
pub struct SharedQueue {
    items: Mutex<VecDeque<String>>,
}

impl SharedQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` to the back.
    pub fn enqueue(&self, value: String) {
        self.items.lock().push_back(value);
    }

    /// Append `value` and return the contents as of right after the append.
    pub fn enqueue_and_snapshot(&self, value: String) -> Vec<String> {
        let mut items = self.items.lock();
        items.push_back(value);
        items.iter().cloned().collect()
    }

    /// Remove and return the front value.
    pub fn dequeue(&self) -> Result<String> {
        self.items.lock().pop_front().ok_or(QueueGateError::EmptyQueue)
    }

    /// Remove the front value and return it with the remaining contents.
    pub fn dequeue_and_snapshot(&self) -> Result<(String, Vec<String>)> {
        let mut items = self.items.lock();
        let removed = items.pop_front().ok_or(QueueGateError::EmptyQueue)?;
        Ok((removed, items.iter().cloned().collect()))
    }

    /// Contents front-to-back.
    pub fn snapshot(&self) -> Vec<String> {
        self.items.lock().iter().cloned().collect()
    }

    /// Number of queued values.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether the queue holds no values.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}
