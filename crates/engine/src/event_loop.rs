// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Readiness event loop the owner runs on one thread.
//!
//! Handlers are `FnMut() -> bool`: after a readiness event the loop keeps
//! re-invoking a handler for as long as it returns `true`. mio delivers
//! edge-triggered notifications; the re-invocation loop is what lets a
//! handler consume exactly one message per call without stranding buffered
//! input.

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::time::{Duration, Instant};
use voicekit_core::{Result, VoiceKitError};

/// Re-invoked while it returns `true`.
pub type IoHandler = Box<dyn FnMut() -> bool + Send>;

struct Registration {
    fd: RawFd,
    handler: IoHandler,
}

pub struct EventLoop {
    poll: Poll,
    registrations: HashMap<Token, Registration>,
    next_token: usize,
}

impl EventLoop {
    pub fn new() -> Result<Self> {
        Ok(Self { poll: Poll::new()?, registrations: HashMap::new(), next_token: 0 })
    }

    /// Watches `fd` for readability. One registration per fd.
    pub fn register_read(&mut self, fd: RawFd, handler: IoHandler) -> Result<()> {
        if self.registrations.values().any(|registration| registration.fd == fd) {
            return Err(VoiceKitError::InvalidArgument(format!(
                "fd {fd} is already registered"
            )));
        }

        let token = Token(self.next_token);
        self.next_token += 1;

        self.poll.registry().register(&mut SourceFd(&fd), token, Interest::READABLE)?;
        self.registrations.insert(token, Registration { fd, handler });
        Ok(())
    }

    /// Stops watching `fd`.
    pub fn unregister(&mut self, fd: RawFd) -> Result<()> {
        let token = self
            .registrations
            .iter()
            .find_map(|(token, registration)| (registration.fd == fd).then_some(*token))
            .ok_or_else(|| VoiceKitError::NotFound(format!("fd {fd} is not registered")))?;

        self.poll.registry().deregister(&mut SourceFd(&fd))?;
        self.registrations.remove(&token);
        Ok(())
    }

    pub fn registration_count(&self) -> usize {
        self.registrations.len()
    }

    /// Dispatches events for `duration`.
    pub fn run_for(&mut self, duration: Duration) -> Result<()> {
        self.run_until(Instant::now() + duration, || false)
    }

    /// Dispatches events until `deadline` passes or `stop` returns true
    /// (checked between poll rounds).
    pub fn run_until(&mut self, deadline: Instant, mut stop: impl FnMut() -> bool) -> Result<()> {
        let mut events = Events::with_capacity(64);

        while !stop() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }

            // Short poll rounds keep the stop predicate responsive.
            let timeout = (deadline - now).min(Duration::from_millis(20));
            self.poll.poll(&mut events, Some(timeout))?;

            for event in &events {
                let Some(registration) = self.registrations.get_mut(&event.token()) else {
                    continue;
                };
                while (registration.handler)() {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::os::unix::io::AsRawFd;
    use std::os::unix::net::UnixStream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_handler_runs_on_readable_fd() {
        let (mut writer, reader) = UnixStream::pair().unwrap();
        reader.set_nonblocking(true).unwrap();

        let mut event_loop = EventLoop::new().unwrap();
        let reads = Arc::new(AtomicUsize::new(0));

        let handler_reads = reads.clone();
        event_loop
            .register_read(
                reader.as_raw_fd(),
                Box::new(move || {
                    let mut byte = [0u8; 1];
                    match (&reader).read(&mut byte) {
                        Ok(1) => {
                            handler_reads.fetch_add(1, Ordering::SeqCst);
                            true
                        },
                        _ => false,
                    }
                }),
            )
            .unwrap();

        writer.write_all(&[1, 2, 3]).unwrap();
        event_loop.run_for(Duration::from_millis(200)).unwrap();

        // one byte per invocation, re-invoked until drained
        assert_eq!(reads.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let (_writer, reader) = UnixStream::pair().unwrap();
        let mut event_loop = EventLoop::new().unwrap();

        event_loop.register_read(reader.as_raw_fd(), Box::new(|| false)).unwrap();
        assert!(event_loop.register_read(reader.as_raw_fd(), Box::new(|| false)).is_err());
    }

    #[test]
    fn test_unregister() {
        let (_writer, reader) = UnixStream::pair().unwrap();
        let mut event_loop = EventLoop::new().unwrap();

        event_loop.register_read(reader.as_raw_fd(), Box::new(|| false)).unwrap();
        assert_eq!(event_loop.registration_count(), 1);

        event_loop.unregister(reader.as_raw_fd()).unwrap();
        assert_eq!(event_loop.registration_count(), 0);
        assert!(event_loop.unregister(reader.as_raw_fd()).is_err());
    }

    #[test]
    fn test_run_until_stop_predicate() {
        let mut event_loop = EventLoop::new().unwrap();
        let started = Instant::now();
        event_loop.run_until(started + Duration::from_secs(10), || true).unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
