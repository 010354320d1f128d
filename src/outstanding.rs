//! In-flight request tracking.
//!
//! [`OutstandingSet`] is a min-heap of completion timestamps. The window
//! engine pushes the finish time of every request still running at a window
//! boundary and, when the next boundary is reached, drains everything that
//! completed at or before it.

use crate::error::{Result, TraceError};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Min-heap over `finish_ns` values. Duplicate values are legal: distinct
/// requests may complete in the same nanosecond. Equal values come out in
/// no particular order.
#[derive(Debug, Clone, Default)]
pub struct OutstandingSet {
    heap: BinaryHeap<Reverse<u64>>,
}

impl OutstandingSet {
    /// Empty set with room for `capacity` pending requests.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, finish_ns: u64) {
        self.heap.push(Reverse(finish_ns));
    }

    /// Smallest pending completion time, without removing it.
    pub fn peek_min(&self) -> Option<u64> {
        self.heap.peek().map(|&Reverse(finish_ns)| finish_ns)
    }

    /// Remove and return the smallest pending completion time.
    pub fn pop_min(&mut self) -> Result<u64> {
        self.heap
            .pop()
            .map(|Reverse(finish_ns)| finish_ns)
            .ok_or(TraceError::EmptyPop)
    }

    /// Pop every entry completing at or before `edge_ns`; returns how many
    /// were removed.
    pub fn drain_until(&mut self, edge_ns: u64) -> Result<usize> {
        let mut drained = 0;
        while matches!(self.peek_min(), Some(finish_ns) if finish_ns <= edge_ns) {
            self.pop_min()?;
            drained += 1;
        }
        Ok(drained)
    }

    pub fn size(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
