// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Thread messages - the payload type the thread-loop carries.
//!
//! A message is a kind discriminator plus an owned payload. Releasing a
//! message releases its payload; Rust's drop glue is the owned-deleter of
//! the original design. Runtime type recovery goes through `Any` downcasts
//! instead of magic-tag casts.

use std::any::Any;
use std::os::unix::io::RawFd;
use voicekit_core::{JsonValue, Result, VoiceKitError};

/// Open message-kind enumeration: a reserved sentinel, the generic kind,
/// and user kinds from [`MessageKind::USER_BASE`] upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageKind(pub i32);

impl MessageKind {
    /// Never carried by a valid message.
    pub const RESERVED: Self = Self(-1);
    /// Plain signaling message.
    pub const GENERIC: Self = Self(0);
    /// First kind available to users of the thread-loop.
    pub const USER_BASE: Self = Self(1);

    /// The `offset`-th user kind.
    pub const fn user(offset: i32) -> Self {
        Self(Self::USER_BASE.0 + offset)
    }
}

/// A message travelling between the event loop and the worker pool.
///
/// Whoever receives a message owns it; dropping it releases every owned
/// payload.
pub trait ThreadMessage: Send + Any {
    fn kind(&self) -> MessageKind;

    /// Borrow of the JSON payload, if the message carries one.
    fn json(&self) -> Option<&JsonValue> {
        None
    }

    /// Detaches the JSON payload.
    fn take_json(&mut self) -> Option<JsonValue> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Recovers the concrete message type, the typed replacement for the C
/// magic-tag cast.
pub fn downcast_ref<T: ThreadMessage>(message: &dyn ThreadMessage) -> Option<&T> {
    message.as_any().downcast_ref::<T>()
}

pub fn downcast_mut<T: ThreadMessage>(message: &mut dyn ThreadMessage) -> Option<&mut T> {
    message.as_any_mut().downcast_mut::<T>()
}

/// The standard message: kind, optional JSON payload, optional socket.
pub struct GenericMessage {
    kind: MessageKind,
    pub json: Option<JsonValue>,
    /// Socket the originating signaling connection lives on, when relevant.
    pub socket: Option<RawFd>,
}

impl GenericMessage {
    /// Creates a message of `kind`. The reserved sentinel is not a valid
    /// message kind.
    pub fn standard(kind: MessageKind, json: Option<JsonValue>) -> Result<Self> {
        if kind == MessageKind::RESERVED {
            return Err(VoiceKitError::InvalidArgument(
                "reserved message kind cannot be instantiated".to_string(),
            ));
        }
        Ok(Self { kind, json, socket: None })
    }

    /// Creates a plain generic message.
    pub fn generic(json: Option<JsonValue>) -> Self {
        Self { kind: MessageKind::GENERIC, json, socket: None }
    }
}

impl ThreadMessage for GenericMessage {
    fn kind(&self) -> MessageKind {
        self.kind
    }

    fn json(&self) -> Option<&JsonValue> {
        self.json.as_ref()
    }

    fn take_json(&mut self) -> Option<JsonValue> {
        self.json.take()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
