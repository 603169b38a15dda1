// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Bounded FIFO ring buffer.
//!
//! Overflow policy: a full ring refuses the incoming element, which is
//! dropped on the spot - its `Drop` impl is the "deleter" of the C design,
//! and it runs exactly once. Dropping the ring drains and drops everything
//! still queued.

use std::collections::VecDeque;

pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Creates a ring holding at most `capacity` elements (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { items: VecDeque::with_capacity(capacity), capacity }
    }

    /// Appends `item`; a full ring drops it and returns `false`.
    pub fn insert(&mut self, item: T) -> bool {
        if self.items.len() >= self.capacity {
            drop(item);
            return false;
        }
        self.items.push_back(item);
        true
    }

    /// Removes the oldest element.
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops every queued element.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}
