// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Bounded object cache for hot-path allocation reuse.
//!
//! `put` hands the object back to the caller when the cache is full - the
//! caller drops it. Misses on `get` are normal; the cache is a fast path,
//! never a requirement.

use parking_lot::Mutex;

pub struct RegisteredCache<T> {
    slots: Mutex<Vec<T>>,
    capacity: usize,
}

impl<T> RegisteredCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self { slots: Mutex::new(Vec::with_capacity(capacity)), capacity }
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Takes a cached object, if any.
    pub fn get(&self) -> Option<T> {
        self.slots.lock().pop()
    }

    /// Offers `item` to the cache. A full cache refuses and returns it.
    pub fn put(&self, item: T) -> Option<T> {
        let mut slots = self.slots.lock();
        if slots.len() >= self.capacity {
            return Some(item);
        }
        slots.push(item);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_put_cycle() {
        let cache = RegisteredCache::new(2);
        assert!(cache.get().is_none());

        assert!(cache.put(vec![1u8]).is_none());
        assert!(cache.put(vec![2u8]).is_none());
        assert_eq!(cache.len(), 2);

        // full: the third object comes back to the caller
        assert_eq!(cache.put(vec![3u8]), Some(vec![3u8]));

        assert!(cache.get().is_some());
        assert!(cache.put(vec![4u8]).is_none());
    }
}
