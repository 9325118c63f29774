//! Change-event buffer
//!
//! Bounded FIFO; when full the oldest event is discarded and the overflow
//! flag stays latched until the next drain.

use outsim_model::Point;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Events handed out by a drain, oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    pub events: Vec<Point>,
    /// Events were lost since the previous drain
    pub overflow: bool,
}

#[derive(Debug)]
pub struct EventBuffer {
    queue: VecDeque<Point>,
    capacity: usize,
    overflow: bool,
}

impl EventBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
            overflow: false,
        }
    }

    pub fn push(&mut self, event: Point) {
        if self.queue.len() < self.capacity {
            self.queue.push_back(event);
            return;
        }

        if !self.overflow {
            debug!(
                "Event buffer full ({}), discarding oldest from {}[{}]",
                self.capacity, event.point_type, event.index
            );
        }
        self.overflow = true;
        if self.capacity > 0 {
            self.queue.pop_front();
            self.queue.push_back(event);
        }
    }

    pub fn drain(&mut self) -> EventBatch {
        let batch = EventBatch {
            events: self.queue.drain(..).collect(),
            overflow: self.overflow,
        };
        self.overflow = false;
        batch
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn overflowed(&self) -> bool {
        self.overflow
    }
}
