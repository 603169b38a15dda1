// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! JSON-backed configuration adapters.

pub mod log;
pub mod vad;

pub use log::{LogConfig, LogDestination, LogFileConfig, LogFormat, LogLevel, LogSinkConfig};
pub use vad::VadConfig;
