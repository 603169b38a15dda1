// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! VoiceKit Codecs - the audio codec framework.
//!
//! ## Modules
//!
//! - [`codec`]: the [`Codec`] trait, parameter JSON helpers, transparent
//!   resampling to the 48 kHz internal rate
//! - [`factory`]: name-to-generator registry with a lazy global default
//! - [`plugin`]: dynamic codec loading from shared objects
//! - [`raw`], [`pcm16`], [`g711`], [`opus`]: the built-in codecs
//!
//! ## Quick start
//!
//! ```no_run
//! use voicekit_codecs::factory::CodecFactory;
//! use voicekit_core::json;
//!
//! let factory = CodecFactory::standard();
//! let descriptor = json::decode_str(r#"{"codec":"G.711","law":"alaw"}"#)?;
//! let mut codec = factory.create_from_json(&descriptor, 1)?;
//!
//! // 20 ms of 48 kHz PCM16 in, G.711 bytes out - resampling is transparent.
//! let pcm = vec![0u8; 960 * 2];
//! let mut wire = vec![0u8; 960];
//! let bytes = codec.encode(&pcm, &mut wire)?;
//! # Ok::<(), voicekit_core::VoiceKitError>(())
//! ```

pub mod codec;
pub mod factory;
pub mod g711;
pub mod opus;
pub mod pcm16;
pub mod plugin;
pub mod raw;
pub mod resampler;

pub use codec::{enable_resampling, parameters_sample_rate_hertz, to_json, Codec};
pub use factory::{reset_global, with_global, CodecFactory, CodecGenerator};
pub use resampler::PcmResampler;
