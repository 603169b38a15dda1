// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! End-to-end thread-loop exercise: messages fan out to the worker pool,
//! the workers bounce them back to the event loop, and everything is
//! accounted for - delivered or released, never leaked.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use voicekit_core::JsonValue;
use voicekit_engine::event_loop::EventLoop;
use voicekit_engine::message::{GenericMessage, ThreadMessage};
use voicekit_engine::thread_loop::{
    Receiver, ThreadLoop, ThreadLoopCallbacks, ThreadLoopConfig, ThreadLoopSender,
};

/// Payload with a drop counter, so the no-leak property is checkable.
struct TrackedMessage {
    inner: GenericMessage,
    _guard: DropGuard,
}

struct DropGuard(Arc<AtomicUsize>);

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl ThreadMessage for TrackedMessage {
    fn kind(&self) -> voicekit_engine::message::MessageKind {
        self.inner.kind()
    }

    fn json(&self) -> Option<&JsonValue> {
        self.inner.json()
    }

    fn take_json(&mut self) -> Option<JsonValue> {
        self.inner.take_json()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Workers bounce every message back to the event loop; the loop side
/// records the payload number.
struct Bouncer {
    thread_seen: AtomicUsize,
    resend_failed: AtomicUsize,
    loop_numbers: Mutex<Vec<i64>>,
}

impl ThreadLoopCallbacks for Bouncer {
    fn handle_message_in_thread(
        &self,
        sender: &ThreadLoopSender,
        message: Box<dyn ThreadMessage>,
    ) -> bool {
        self.thread_seen.fetch_add(1, Ordering::SeqCst);
        if !sender.send(message, Receiver::EventLoop) {
            self.resend_failed.fetch_add(1, Ordering::SeqCst);
        }
        true
    }

    fn handle_message_in_loop(&self, _sender: &ThreadLoopSender, message: Box<dyn ThreadMessage>) {
        if let Some(number) = message.json().and_then(JsonValue::as_number) {
            #[allow(clippy::cast_possible_truncation)]
            self.loop_numbers.lock().push(number as i64);
        }
    }
}

#[test]
fn thread_loop_roundtrip_accounts_for_every_message() {
    const MESSAGES: i64 = 50;
    const CAPACITY: u64 = 20;

    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let drops = Arc::new(AtomicUsize::new(0));
    let bouncer = Arc::new(Bouncer {
        thread_seen: AtomicUsize::new(0),
        resend_failed: AtomicUsize::new(0),
        loop_numbers: Mutex::new(Vec::new()),
    });

    let config = ThreadLoopConfig {
        message_queue_capacity: CAPACITY,
        num_threads: 4,
        ..ThreadLoopConfig::default()
    };

    let mut event_loop = EventLoop::new().expect("event loop");
    let mut thread_loop = ThreadLoop::with_config(bouncer.clone(), config).expect("thread loop");
    thread_loop.attach(&mut event_loop).expect("attach");
    assert!(thread_loop.start_threads());

    let mut accepted = 0usize;
    for number in 0..MESSAGES {
        let message = TrackedMessage {
            inner: GenericMessage::generic(Some(JsonValue::number(number as f64))),
            _guard: DropGuard(drops.clone()),
        };
        if thread_loop.send(Box::new(message), Receiver::Thread) {
            accepted += 1;
        }
    }

    // Drive the loop side until everything that can arrive has arrived.
    let deadline = Instant::now() + Duration::from_secs(10);
    event_loop
        .run_until(deadline, || {
            let arrived = bouncer.loop_numbers.lock().len();
            let bounced = bouncer.thread_seen.load(Ordering::SeqCst);
            let lost = bouncer.resend_failed.load(Ordering::SeqCst);
            bounced == accepted && arrived + lost >= bounced
        })
        .expect("event loop run");

    let thread_seen = bouncer.thread_seen.load(Ordering::SeqCst);
    let resend_failed = bouncer.resend_failed.load(Ordering::SeqCst);
    let arrived = bouncer.loop_numbers.lock().clone();

    // Every accepted message was handled by exactly one worker.
    assert_eq!(thread_seen, accepted);

    // The loop side observed everything the workers managed to re-enqueue.
    assert_eq!(arrived.len() + resend_failed, thread_seen);

    // No duplicates: the arrived numbers are pairwise distinct.
    let mut distinct = arrived.clone();
    distinct.sort_unstable();
    distinct.dedup();
    assert_eq!(distinct.len(), arrived.len(), "duplicate delivery");

    // Both directions delivered well beyond the ring capacity bound.
    assert!(accepted as u64 >= CAPACITY - 2, "thread side accepted {accepted}");
    assert!(arrived.len() as u64 >= CAPACITY - 2, "loop side got {}", arrived.len());

    thread_loop.stop_threads();
    thread_loop.detach(&mut event_loop).expect("detach");
    drop(thread_loop);
    drop(event_loop);

    // No leaks: every message constructed was eventually released -
    // delivered ones after handling, refused ones at the refusal point.
    assert_eq!(drops.load(Ordering::SeqCst), MESSAGES as usize);
}

#[test]
fn stop_threads_joins_and_survives_restart() {
    struct Sink;
    impl ThreadLoopCallbacks for Sink {
        fn handle_message_in_thread(
            &self,
            _: &ThreadLoopSender,
            _: Box<dyn ThreadMessage>,
        ) -> bool {
            true
        }
        fn handle_message_in_loop(&self, _: &ThreadLoopSender, _: Box<dyn ThreadMessage>) {}
    }

    let mut thread_loop = ThreadLoop::new(Arc::new(Sink)).expect("thread loop");

    assert!(thread_loop.start_threads());
    assert!(thread_loop.stop_threads());
    assert!(thread_loop.start_threads());
    assert!(thread_loop.send(Box::new(GenericMessage::generic(None)), Receiver::Thread));
    assert!(thread_loop.stop_threads());
}
