// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! VoiceKit Core - foundational primitives for a real-time voice platform.
//!
//! ## Modules
//!
//! - [`utf8`]: RFC 3629 validation, code-point conversion, random generator
//! - [`json`]: self-contained JSON value tree, parser/encoder, RFC 6901 pointer
//! - [`value`]: alternate streaming value model accepting partial input
//! - [`config`]: VAD and logging configuration adapters
//! - [`error`]: the suite-wide error type

pub mod config;
pub mod error;
pub mod json;
pub mod utf8;
pub mod value;

pub use error::{Result, VoiceKitError};
pub use json::{JsonKind, JsonValue};
pub use value::Value;

/// The platform's fixed internal sample rate in Hertz.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Upper bound on the samples of one audio frame at the internal rate
/// (20 ms at 48 kHz).
pub const MAX_FRAME_LENGTH_SAMPLES: usize = 960;
