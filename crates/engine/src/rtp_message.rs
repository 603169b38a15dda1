// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! RTP frame message: a thread message owning one RTP frame.
//!
//! Media paths create and release one of these per packet; the payload
//! buffer is the allocation that matters, so released frames offer their
//! buffer to a process-wide bounded cache and new frames start from a
//! recycled buffer when one is available.

use crate::cache::RegisteredCache;
use crate::message::{MessageKind, ThreadMessage};
use std::any::Any;
use std::sync::OnceLock;

/// Kind carried by [`RtpFrameMessage`].
pub const RTP_FRAME_MESSAGE_KIND: MessageKind = MessageKind::user(0);

static FRAME_BUFFER_CACHE: OnceLock<RegisteredCache<Vec<u8>>> = OnceLock::new();

fn cache() -> Option<&'static RegisteredCache<Vec<u8>>> {
    FRAME_BUFFER_CACHE.get()
}

/// Enables frame-buffer recycling with a cache of `capacity` buffers.
/// The cache is created lazily once per process; later calls keep the
/// original capacity.
pub fn enable_caching(capacity: usize) {
    let _ = FRAME_BUFFER_CACHE.get_or_init(|| RegisteredCache::new(capacity));
}

/// An RTP frame as the thread-loop sees it: opaque payload plus the header
/// fields the media paths route on.
pub struct RtpFrame {
    pub ssrc: u32,
    pub sequence_number: u16,
    pub timestamp: u32,
    payload: Vec<u8>,
}

impl RtpFrame {
    /// Builds a frame, copying `payload` into a recycled buffer when the
    /// cache holds one.
    pub fn new(ssrc: u32, sequence_number: u16, timestamp: u32, payload: &[u8]) -> Self {
        let mut buffer = cache().and_then(RegisteredCache::get).unwrap_or_default();
        buffer.clear();
        buffer.extend_from_slice(payload);

        Self { ssrc, sequence_number, timestamp, payload: buffer }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl Drop for RtpFrame {
    fn drop(&mut self) {
        let Some(cache) = cache() else { return };
        let buffer = std::mem::take(&mut self.payload);
        if buffer.capacity() == 0 {
            return;
        }
        // A refused buffer falls out of scope here and is freed.
        drop(cache.put(buffer));
    }
}

/// Thread message owning one RTP frame.
pub struct RtpFrameMessage {
    frame: Option<RtpFrame>,
}

impl RtpFrameMessage {
    pub fn new(frame: RtpFrame) -> Self {
        Self { frame: Some(frame) }
    }

    pub fn frame(&self) -> Option<&RtpFrame> {
        self.frame.as_ref()
    }

    /// Detaches the frame; the message shell no longer owns it.
    pub fn take_frame(&mut self) -> Option<RtpFrame> {
        self.frame.take()
    }
}

impl ThreadMessage for RtpFrameMessage {
    fn kind(&self) -> MessageKind {
        RTP_FRAME_MESSAGE_KIND
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
