// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! VoiceKit Engine - the concurrency core.
//!
//! ## Modules
//!
//! - [`event_loop`]: readiness loop the owner runs on one thread
//! - [`thread_loop`]: event-loop / worker-pool bridge with bounded message
//!   paths in both directions
//! - [`message`]: thread messages; [`rtp_message`]: the RTP frame variant
//! - [`ringbuffer`], [`lock`], [`cache`]: the underlying primitives
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use voicekit_engine::event_loop::EventLoop;
//! use voicekit_engine::message::{GenericMessage, ThreadMessage};
//! use voicekit_engine::thread_loop::{
//!     Receiver, ThreadLoop, ThreadLoopCallbacks, ThreadLoopSender,
//! };
//!
//! struct Echo;
//!
//! impl ThreadLoopCallbacks for Echo {
//!     fn handle_message_in_thread(
//!         &self,
//!         sender: &ThreadLoopSender,
//!         message: Box<dyn ThreadMessage>,
//!     ) -> bool {
//!         // heavy work happens here, then the result goes back to the loop
//!         sender.send(message, Receiver::EventLoop)
//!     }
//!
//!     fn handle_message_in_loop(&self, _: &ThreadLoopSender, _: Box<dyn ThreadMessage>) {}
//! }
//!
//! let mut event_loop = EventLoop::new()?;
//! let mut thread_loop = ThreadLoop::new(Arc::new(Echo))?;
//! thread_loop.attach(&mut event_loop)?;
//! thread_loop.start_threads();
//!
//! thread_loop.send(Box::new(GenericMessage::generic(None)), Receiver::Thread);
//! event_loop.run_for(std::time::Duration::from_millis(100))?;
//! # Ok::<(), voicekit_core::VoiceKitError>(())
//! ```

pub mod cache;
pub mod event_loop;
pub mod lock;
pub mod message;
pub mod ringbuffer;
pub mod rtp_message;
pub mod thread_loop;

pub use cache::RegisteredCache;
pub use event_loop::EventLoop;
pub use lock::TimedMutex;
pub use message::{GenericMessage, MessageKind, ThreadMessage};
pub use ringbuffer::RingBuffer;
pub use rtp_message::{RtpFrame, RtpFrameMessage, RTP_FRAME_MESSAGE_KIND};
pub use thread_loop::{
    Receiver, ThreadLoop, ThreadLoopCallbacks, ThreadLoopConfig, ThreadLoopSender,
};
