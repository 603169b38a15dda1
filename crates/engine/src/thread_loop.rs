// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The thread-loop: a bridge between one event-loop thread and a pool of
//! worker threads, with bounded message paths in both directions.
//!
//! *To threads*: a bounded ring consumed by the workers, who block on a
//! condition variable and run the `handle_message_in_thread` callback.
//!
//! *To loop*: a queue plus a local socket pair `(trigger, catch)`. Each send
//! enqueues the message and writes one wake-up byte into `trigger`; the
//! event loop's readiness handler on `catch` reads exactly one byte, pops
//! exactly one message, and runs `handle_message_in_loop`. The socket is
//! purely a wake-up signal - the message never travels through it.
//!
//! Whoever receives a message owns it. A message refused by a full ring is
//! released on the spot; the sender learns via the return value.

use crate::event_loop::EventLoop;
use crate::lock::{wait_for, TimedMutex};
use crate::message::ThreadMessage;
use crate::ringbuffer::RingBuffer;
use parking_lot::Condvar;
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use voicekit_core::json::{self, JsonValue};
use voicekit_core::Result;

pub const MESSAGE_QUEUE_CAPACITY_DEFAULT: u64 = 100;
pub const LOCK_TIMEOUT_USECS_DEFAULT: u64 = 100_000;
pub const NUM_THREADS_DEFAULT: usize = 4;

const KEY_LOCK_TIMEOUT_USECS: &str = "lock_timeout_usecs";
const KEY_MESSAGE_QUEUE_CAPACITY: &str = "message_queue_capacity";
const KEY_NUM_THREADS: &str = "num_threads";
const KEY_DISABLE_TO_LOOP_QUEUE: &str = "disable_to_loop_queue";

/// Where a message is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    EventLoop,
    Thread,
}

/// Thread-loop tuning knobs. Zero-valued numeric fields mean "use the
/// default".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadLoopConfig {
    /// Ring size for both message paths.
    pub message_queue_capacity: u64,
    /// Budget for internal mutex acquisition.
    pub lock_timeout_usecs: u64,
    /// Worker pool size.
    pub num_threads: usize,
    /// When set, the to-loop queue is unbounded: sends to the loop never
    /// drop (the kernel socket buffer used to be the only bound here).
    pub disable_to_loop_queue: bool,
}

impl Default for ThreadLoopConfig {
    fn default() -> Self {
        Self {
            message_queue_capacity: MESSAGE_QUEUE_CAPACITY_DEFAULT,
            lock_timeout_usecs: LOCK_TIMEOUT_USECS_DEFAULT,
            num_threads: NUM_THREADS_DEFAULT,
            disable_to_loop_queue: false,
        }
    }
}

impl ThreadLoopConfig {
    fn normalized(mut self) -> Self {
        if self.message_queue_capacity == 0 {
            self.message_queue_capacity = MESSAGE_QUEUE_CAPACITY_DEFAULT;
        }
        if self.lock_timeout_usecs == 0 {
            self.lock_timeout_usecs = LOCK_TIMEOUT_USECS_DEFAULT;
        }
        if self.num_threads == 0 {
            self.num_threads = NUM_THREADS_DEFAULT;
        }
        self
    }

    /// Reads a config from JSON. Missing or non-positive numeric values are
    /// replaced with defaults; unknown keys are ignored.
    pub fn from_json(config: &JsonValue) -> Self {
        let positive = |key: &str, fallback: u64| -> u64 {
            #[allow(clippy::cast_possible_truncation)]
            match json::get(config, key).and_then(JsonValue::as_number) {
                Some(value) if value >= 1.0 && value <= 9.2e18 => value as u64,
                Some(value) => {
                    tracing::warn!(key, value, "invalid thread-loop setting, using default");
                    fallback
                },
                None => fallback,
            }
        };

        #[allow(clippy::cast_possible_truncation)]
        let num_threads = positive("/num_threads", NUM_THREADS_DEFAULT as u64) as usize;

        Self {
            message_queue_capacity: positive(
                "/message_queue_capacity",
                MESSAGE_QUEUE_CAPACITY_DEFAULT,
            ),
            lock_timeout_usecs: positive("/lock_timeout_usecs", LOCK_TIMEOUT_USECS_DEFAULT),
            num_threads,
            disable_to_loop_queue: json::get(config, "/disable_to_loop_queue")
                .and_then(JsonValue::as_bool)
                .unwrap_or(false),
        }
    }

    /// Writes all four keys into `target` (or a fresh object), replacing
    /// existing entries. Non-positive fields serialize as their defaults.
    pub fn to_json(&self, target: Option<JsonValue>) -> JsonValue {
        let normalized = self.normalized();
        let mut out = target.unwrap_or_else(JsonValue::object);

        #[allow(clippy::cast_precision_loss)]
        {
            let _ = out.object_set(
                KEY_LOCK_TIMEOUT_USECS,
                JsonValue::number(normalized.lock_timeout_usecs as f64),
            );
            let _ = out.object_set(
                KEY_MESSAGE_QUEUE_CAPACITY,
                JsonValue::number(normalized.message_queue_capacity as f64),
            );
            let _ = out.object_set(
                KEY_NUM_THREADS,
                JsonValue::number(normalized.num_threads as f64),
            );
        }
        let _ = out.object_set(
            KEY_DISABLE_TO_LOOP_QUEUE,
            JsonValue::boolean(normalized.disable_to_loop_queue),
        );

        out
    }
}

/// User hooks. The receiving side owns each message.
pub trait ThreadLoopCallbacks: Send + Sync + 'static {
    /// Runs on a worker thread. Return `false` to report a handling failure
    /// (the message is still consumed).
    fn handle_message_in_thread(
        &self,
        sender: &ThreadLoopSender,
        message: Box<dyn ThreadMessage>,
    ) -> bool;

    /// Runs on the event-loop thread.
    fn handle_message_in_loop(&self, sender: &ThreadLoopSender, message: Box<dyn ThreadMessage>);
}

enum MessageQueue {
    Bounded(RingBuffer<Box<dyn ThreadMessage>>),
    Unbounded(VecDeque<Box<dyn ThreadMessage>>),
}

impl MessageQueue {
    fn bounded(capacity: u64) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        Self::Bounded(RingBuffer::new(capacity as usize))
    }

    fn insert(&mut self, message: Box<dyn ThreadMessage>) -> bool {
        match self {
            Self::Bounded(ring) => ring.insert(message),
            Self::Unbounded(queue) => {
                queue.push_back(message);
                true
            },
        }
    }

    fn pop(&mut self) -> Option<Box<dyn ThreadMessage>> {
        match self {
            Self::Bounded(ring) => ring.pop(),
            Self::Unbounded(queue) => queue.pop_front(),
        }
    }
}

struct Shared {
    to_threads: TimedMutex<MessageQueue>,
    to_threads_ready: Condvar,
    to_loop: TimedMutex<MessageQueue>,
    /// Write side of the wake-up socket pair.
    trigger: UnixStream,
    /// Read side, registered with the event loop. Non-blocking.
    catch: UnixStream,
    callbacks: Arc<dyn ThreadLoopCallbacks>,
}

impl Shared {
    fn send(self: &Arc<Self>, message: Box<dyn ThreadMessage>, receiver: Receiver) -> bool {
        match receiver {
            Receiver::Thread => self.send_to_threads(message),
            Receiver::EventLoop => self.send_to_loop(message),
        }
    }

    fn send_to_threads(&self, message: Box<dyn ThreadMessage>) -> bool {
        let Some(mut queue) = self.to_threads.lock_timeout() else {
            tracing::error!("could not lock down on to-threads queue");
            return false;
        };

        let inserted = queue.insert(message);
        if inserted {
            self.to_threads_ready.notify_one();
        } else {
            tracing::error!("to-threads ring full, message released");
        }
        inserted
    }

    fn send_to_loop(&self, message: Box<dyn ThreadMessage>) -> bool {
        let inserted = {
            let Some(mut queue) = self.to_loop.lock_timeout() else {
                tracing::error!("could not lock down on to-loop queue");
                return false;
            };
            queue.insert(message)
        };

        if !inserted {
            tracing::error!("to-loop ring full, message released");
            return false;
        }

        // One wake-up byte per send. A failed write leaves the message
        // queued - the next successful wake-up will deliver it.
        match (&self.trigger).write(&[0x74]) {
            Ok(1) => true,
            other => {
                tracing::error!(?other, "could not write to trigger socket");
                false
            },
        }
    }

    /// The readiness handler body: one wake-up byte, one message.
    /// Returns true while more bytes may be buffered.
    fn handle_wakeup(self: &Arc<Self>) -> bool {
        let mut byte = [0u8; 1];
        match (&self.catch).read(&mut byte) {
            Ok(1) => {},
            Ok(_) => return false, // peer gone
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return false,
            Err(e) => {
                tracing::error!(error = %e, "could not read from catch socket");
                return false;
            },
        }

        let message = {
            let Some(mut queue) = self.to_loop.lock_timeout() else {
                tracing::error!("could not lock down on to-loop queue");
                return true;
            };
            queue.pop()
        };

        if let Some(message) = message {
            let sender = ThreadLoopSender { shared: self.clone() };
            self.callbacks.handle_message_in_loop(&sender, message);
        }

        true
    }
}

/// Cheap handle for sending into the thread-loop from any thread - this is
/// what the callbacks receive.
#[derive(Clone)]
pub struct ThreadLoopSender {
    shared: Arc<Shared>,
}

impl ThreadLoopSender {
    /// Sends `message` to the given receiver. On failure (lock timeout,
    /// full ring, broken trigger socket) the message is released and
    /// `false` is returned - nothing leaks.
    pub fn send(&self, message: Box<dyn ThreadMessage>, receiver: Receiver) -> bool {
        self.shared.send(message, receiver)
    }
}

fn worker(shared: Arc<Shared>, stop: Arc<AtomicBool>, index: usize) {
    tracing::debug!(index, "worker started");
    let sender = ThreadLoopSender { shared: shared.clone() };

    loop {
        let message = {
            let mut queue = shared.to_threads.lock();
            loop {
                if stop.load(Ordering::Acquire) {
                    tracing::debug!(index, "worker stopping");
                    return;
                }
                if let Some(message) = queue.pop() {
                    break message;
                }
                wait_for(&shared.to_threads_ready, &mut queue, Duration::from_millis(100));
            }
        };

        if !shared.callbacks.handle_message_in_thread(&sender, message) {
            tracing::warn!(index, "thread handler reported failure");
        }
    }
}

/// The event-loop / thread-pool bridge.
pub struct ThreadLoop {
    shared: Arc<Shared>,
    config: ThreadLoopConfig,
    workers: Vec<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl ThreadLoop {
    /// Creates a thread-loop with the default configuration. Threads are
    /// not started; the catch socket is not yet watched - call
    /// [`ThreadLoop::attach`] and [`ThreadLoop::start_threads`].
    pub fn new(callbacks: Arc<dyn ThreadLoopCallbacks>) -> Result<Self> {
        Self::with_config(callbacks, ThreadLoopConfig::default())
    }

    pub fn with_config(
        callbacks: Arc<dyn ThreadLoopCallbacks>,
        config: ThreadLoopConfig,
    ) -> Result<Self> {
        let (trigger, catch) = UnixStream::pair()?;
        catch.set_nonblocking(true)?;

        let config = config.normalized();
        let timeout = Duration::from_micros(config.lock_timeout_usecs);

        let shared = Arc::new(Shared {
            to_threads: TimedMutex::new(
                MessageQueue::bounded(config.message_queue_capacity),
                timeout,
            ),
            to_threads_ready: Condvar::new(),
            to_loop: TimedMutex::new(Self::loop_queue_for(&config), timeout),
            trigger,
            catch,
            callbacks,
        });

        Ok(Self { shared, config, workers: Vec::new(), stop: Arc::new(AtomicBool::new(false)) })
    }

    fn loop_queue_for(config: &ThreadLoopConfig) -> MessageQueue {
        if config.disable_to_loop_queue {
            MessageQueue::Unbounded(VecDeque::new())
        } else {
            MessageQueue::bounded(config.message_queue_capacity)
        }
    }

    pub const fn config(&self) -> &ThreadLoopConfig {
        &self.config
    }

    /// Raw fd of the catch socket, for owners integrating a foreign loop.
    pub fn catch_fd(&self) -> RawFd {
        self.shared.catch.as_raw_fd()
    }

    pub fn sender(&self) -> ThreadLoopSender {
        ThreadLoopSender { shared: self.shared.clone() }
    }

    /// See [`ThreadLoopSender::send`].
    pub fn send(&self, message: Box<dyn ThreadMessage>, receiver: Receiver) -> bool {
        self.shared.send(message, receiver)
    }

    /// Registers the catch handler with `event_loop`. The handler reads one
    /// wake-up byte and delivers one message per invocation.
    pub fn attach(&self, event_loop: &mut EventLoop) -> Result<()> {
        let shared = self.shared.clone();
        event_loop.register_read(self.catch_fd(), Box::new(move || shared.handle_wakeup()))
    }

    /// Unregisters the catch handler.
    pub fn detach(&self, event_loop: &mut EventLoop) -> Result<()> {
        event_loop.unregister(self.catch_fd())
    }

    /// Tears down queues and worker pool and rebuilds them for `config`.
    /// Running threads are stopped first; pending messages are released.
    pub fn reconfigure(&mut self, config: ThreadLoopConfig) -> Result<()> {
        let config = config.normalized();

        self.stop_threads();

        let timeout = Duration::from_micros(config.lock_timeout_usecs);
        self.shared.to_threads.set_timeout(timeout);
        self.shared.to_loop.set_timeout(timeout);

        *self.shared.to_threads.lock() = MessageQueue::bounded(config.message_queue_capacity);
        *self.shared.to_loop.lock() = Self::loop_queue_for(&config);

        self.config = config;
        Ok(())
    }

    /// Spawns the worker pool. Returns false when already running.
    pub fn start_threads(&mut self) -> bool {
        if !self.workers.is_empty() {
            tracing::warn!("worker pool already running");
            return false;
        }

        self.stop.store(false, Ordering::Release);
        for index in 0..self.config.num_threads {
            let shared = self.shared.clone();
            let stop = self.stop.clone();
            let handle = std::thread::Builder::new()
                .name(format!("thread-loop-{index}"))
                .spawn(move || worker(shared, stop, index));

            match handle {
                Ok(handle) => self.workers.push(handle),
                Err(e) => {
                    tracing::error!(error = %e, "could not spawn worker");
                    self.stop_threads();
                    return false;
                },
            }
        }

        true
    }

    /// Signals all workers and joins them. Workers observe the stop request
    /// between messages; in-flight handler calls run to completion.
    pub fn stop_threads(&mut self) -> bool {
        if self.workers.is_empty() {
            return true;
        }

        self.stop.store(true, Ordering::Release);
        self.shared.to_threads_ready.notify_all();

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("worker panicked");
            }
        }

        true
    }
}

impl Drop for ThreadLoop {
    /// Stops the workers. Queues drain (releasing pending messages) when
    /// the shared core is dropped; wake-up bytes still in the socket are
    /// lost with it.
    fn drop(&mut self) {
        self.stop_threads();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::message::{GenericMessage, MessageKind};
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    struct Recording {
        thread_seen: Mutex<Vec<f64>>,
        loop_seen: Mutex<Vec<f64>>,
    }

    impl Recording {
        fn new() -> Arc<Self> {
            Arc::new(Self { thread_seen: Mutex::new(Vec::new()), loop_seen: Mutex::new(Vec::new()) })
        }
    }

    impl ThreadLoopCallbacks for Recording {
        fn handle_message_in_thread(
            &self,
            _sender: &ThreadLoopSender,
            mut message: Box<dyn ThreadMessage>,
        ) -> bool {
            if let Some(json) = message.take_json() {
                if let Some(n) = json.as_number() {
                    self.thread_seen.lock().push(n);
                }
            }
            true
        }

        fn handle_message_in_loop(
            &self,
            _sender: &ThreadLoopSender,
            mut message: Box<dyn ThreadMessage>,
        ) {
            if let Some(json) = message.take_json() {
                if let Some(n) = json.as_number() {
                    self.loop_seen.lock().push(n);
                }
            }
        }
    }

    fn numbered(n: f64) -> Box<dyn ThreadMessage> {
        Box::new(GenericMessage::generic(Some(JsonValue::number(n))))
    }

    #[test]
    fn test_config_defaults_and_normalization() {
        let config = ThreadLoopConfig::default();
        assert_eq!(config.message_queue_capacity, 100);
        assert_eq!(config.lock_timeout_usecs, 100_000);
        assert_eq!(config.num_threads, 4);
        assert!(!config.disable_to_loop_queue);

        let zeroed = ThreadLoopConfig {
            message_queue_capacity: 0,
            lock_timeout_usecs: 0,
            num_threads: 0,
            disable_to_loop_queue: true,
        }
        .normalized();
        assert_eq!(zeroed.message_queue_capacity, 100);
        assert_eq!(zeroed.num_threads, 4);
        assert!(zeroed.disable_to_loop_queue);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = ThreadLoopConfig {
            message_queue_capacity: 20,
            lock_timeout_usecs: 5000,
            num_threads: 2,
            disable_to_loop_queue: true,
        };

        let jval = config.to_json(None);
        // all four keys are always present
        for key in
            ["lock_timeout_usecs", "message_queue_capacity", "num_threads", "disable_to_loop_queue"]
        {
            assert!(jval.object_get(key).is_some(), "missing {key}");
        }

        assert_eq!(ThreadLoopConfig::from_json(&jval), config);
    }

    #[test]
    fn test_config_from_json_invalid_values() {
        let jval = json::decode_str(
            r#"{"message_queue_capacity":-5,"num_threads":0,"lock_timeout_usecs":"fast","unknown":1}"#,
        )
        .unwrap();
        let config = ThreadLoopConfig::from_json(&jval);
        assert_eq!(config, ThreadLoopConfig::default());
    }

    #[test]
    fn test_messages_reach_workers() {
        let recording = Recording::new();
        let mut thread_loop = ThreadLoop::new(recording.clone()).unwrap();
        assert!(thread_loop.start_threads());

        for i in 0..10 {
            assert!(thread_loop.send(numbered(f64::from(i)), Receiver::Thread));
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while recording.thread_seen.lock().len() < 10 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        let mut seen = recording.thread_seen.lock().clone();
        seen.sort_by(f64::total_cmp);
        assert_eq!(seen, (0..10).map(f64::from).collect::<Vec<_>>());

        thread_loop.stop_threads();
    }

    #[test]
    fn test_full_ring_reports_and_releases() {
        let drops = Arc::new(AtomicUsize::new(0));

        struct Counted(Arc<AtomicUsize>);
        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        struct CountedMessage(#[allow(dead_code)] Counted);
        impl ThreadMessage for CountedMessage {
            fn kind(&self) -> MessageKind {
                MessageKind::GENERIC
            }
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
                self
            }
        }

        let recording = Recording::new();
        let config = ThreadLoopConfig {
            message_queue_capacity: 2,
            ..ThreadLoopConfig::default()
        };
        // no worker threads: the ring fills up
        let thread_loop = ThreadLoop::with_config(recording, config).unwrap();

        let send = |loop_: &ThreadLoop| {
            loop_.send(
                Box::new(CountedMessage(Counted(drops.clone()))),
                Receiver::Thread,
            )
        };

        assert!(send(&thread_loop));
        assert!(send(&thread_loop));
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        // ring full: refused message is released exactly once
        assert!(!send(&thread_loop));
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        // teardown releases the two queued messages
        drop(thread_loop);
        assert_eq!(drops.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_loop_path_via_event_loop() {
        let recording = Recording::new();
        let thread_loop = ThreadLoop::new(recording.clone()).unwrap();

        let mut event_loop = EventLoop::new().unwrap();
        thread_loop.attach(&mut event_loop).unwrap();

        for i in 0..5 {
            assert!(thread_loop.send(numbered(f64::from(i)), Receiver::EventLoop));
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        event_loop
            .run_until(deadline, || recording.loop_seen.lock().len() >= 5)
            .unwrap();

        let mut seen = recording.loop_seen.lock().clone();
        seen.sort_by(f64::total_cmp);
        assert_eq!(seen, (0..5).map(f64::from).collect::<Vec<_>>());

        thread_loop.detach(&mut event_loop).unwrap();
    }

    #[test]
    fn test_loop_path_preserves_fifo() {
        let recording = Recording::new();
        let thread_loop = ThreadLoop::new(recording.clone()).unwrap();
        let mut event_loop = EventLoop::new().unwrap();
        thread_loop.attach(&mut event_loop).unwrap();

        for i in 0..20 {
            assert!(thread_loop.send(numbered(f64::from(i)), Receiver::EventLoop));
        }

        event_loop
            .run_until(Instant::now() + Duration::from_secs(5), || {
                recording.loop_seen.lock().len() >= 20
            })
            .unwrap();

        // single consumer on the loop side: order is the send order
        let seen = recording.loop_seen.lock().clone();
        assert_eq!(seen, (0..20).map(f64::from).collect::<Vec<_>>());
    }

    #[test]
    fn test_unbounded_loop_queue_never_drops() {
        let recording = Recording::new();
        let config = ThreadLoopConfig {
            message_queue_capacity: 2,
            disable_to_loop_queue: true,
            ..ThreadLoopConfig::default()
        };
        let thread_loop = ThreadLoop::with_config(recording.clone(), config).unwrap();
        let mut event_loop = EventLoop::new().unwrap();
        thread_loop.attach(&mut event_loop).unwrap();

        // far beyond the ring capacity - the unbounded queue takes them all
        for i in 0..50 {
            assert!(thread_loop.send(numbered(f64::from(i)), Receiver::EventLoop));
        }

        event_loop
            .run_until(Instant::now() + Duration::from_secs(5), || {
                recording.loop_seen.lock().len() >= 50
            })
            .unwrap();
        assert_eq!(recording.loop_seen.lock().len(), 50);
    }

    #[test]
    fn test_reconfigure_requires_stopped_threads() {
        let recording = Recording::new();
        let mut thread_loop = ThreadLoop::new(recording).unwrap();
        assert!(thread_loop.start_threads());

        // reconfigure stops the pool itself, then rebuilds
        let config = ThreadLoopConfig { num_threads: 2, ..ThreadLoopConfig::default() };
        thread_loop.reconfigure(config).unwrap();
        assert_eq!(thread_loop.config().num_threads, 2);

        assert!(thread_loop.start_threads());
        assert!(!thread_loop.start_threads(), "double start must be refused");
        thread_loop.stop_threads();
    }
}
