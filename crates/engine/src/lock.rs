// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Mutex with a bounded acquisition time.
//!
//! Producers on hot paths must not block indefinitely on a contended queue;
//! acquisition is bounded by a configurable timeout and reports failure
//! instead. Consumers that are allowed to block use [`TimedMutex::lock`]
//! plus the paired condition variable.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub const DEFAULT_LOCK_TIMEOUT_USECS: u64 = 100_000;

pub struct TimedMutex<T> {
    inner: Mutex<T>,
    timeout_usecs: AtomicU64,
}

impl<T> TimedMutex<T> {
    pub fn new(value: T, timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(value),
            timeout_usecs: AtomicU64::new(duration_to_usecs(timeout)),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_micros(self.timeout_usecs.load(Ordering::Relaxed))
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.timeout_usecs.store(duration_to_usecs(timeout), Ordering::Relaxed);
    }

    /// Acquires the lock within the configured timeout, or reports `None`.
    pub fn lock_timeout(&self) -> Option<MutexGuard<'_, T>> {
        self.inner.try_lock_for(self.timeout())
    }

    /// Unbounded acquisition, for consumers that intend to wait.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }
}

fn duration_to_usecs(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

/// Condition-variable wait bounded to `timeout`, tolerating spurious
/// wake-ups at the caller.
pub fn wait_for<T>(condvar: &Condvar, guard: &mut MutexGuard<'_, T>, timeout: Duration) -> bool {
    !condvar.wait_for(guard, timeout).timed_out()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_uncontended_lock() {
        let lock = TimedMutex::new(7, Duration::from_micros(DEFAULT_LOCK_TIMEOUT_USECS));
        {
            let guard = lock.lock_timeout();
            assert_eq!(guard.as_deref(), Some(&7));
        }
        assert!(lock.lock_timeout().is_some());
    }

    #[test]
    fn test_contended_lock_times_out() {
        let lock = Arc::new(TimedMutex::new((), Duration::from_millis(20)));

        let guard = lock.lock();

        let contender = {
            let lock = lock.clone();
            std::thread::spawn(move || {
                let started = Instant::now();
                let acquired = lock.lock_timeout().is_some();
                (acquired, started.elapsed())
            })
        };

        #[allow(clippy::unwrap_used)]
        let (acquired, elapsed) = contender.join().unwrap();
        drop(guard);

        assert!(!acquired, "lock must not be acquired while held");
        assert!(elapsed >= Duration::from_millis(15), "timeout returned too early");
        assert!(elapsed < Duration::from_secs(2), "timeout must not block forever");
    }

    #[test]
    fn test_timeout_reconfiguration() {
        let lock = TimedMutex::new((), Duration::from_micros(500));
        assert_eq!(lock.timeout(), Duration::from_micros(500));
        lock.set_timeout(Duration::from_millis(3));
        assert_eq!(lock.timeout(), Duration::from_millis(3));
    }
}
