// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types for VoiceKit.
//!
//! One error enum covers the whole suite so failures can cross crate
//! boundaries without conversion layers. Every variant carries a descriptive
//! message; no component panics on bad input.

use thiserror::Error;

/// Main error type for VoiceKit operations.
#[derive(Debug, Error)]
pub enum VoiceKitError {
    /// Null-equivalent input, out-of-range size, or otherwise unusable argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Parse failure: broken JSON, invalid UTF-8, invalid escape,
    /// duplicate object key, trailing garbage.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// An output buffer or bounded queue cannot take the data.
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// A value of the wrong runtime variant was handed to an operation,
    /// e.g. decode into an existing node of a different kind.
    #[error("state mismatch: {0}")]
    StateMismatch(String),

    /// Socket, mutex, dynamic-library or external-codec failure.
    #[error("resource failure: {0}")]
    ResourceFailure(String),

    /// Unknown codec name, missing JSON pointer path, absent registry entry.
    #[error("not found: {0}")]
    NotFound(String),

    /// I/O error (file operations, socket pairs).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results using [`VoiceKitError`].
pub type Result<T> = std::result::Result<T, VoiceKitError>;

impl From<VoiceKitError> for String {
    fn from(err: VoiceKitError) -> Self {
        err.to_string()
    }
}
