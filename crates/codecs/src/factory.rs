// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Codec factory: a name-to-generator registry.
//!
//! A process-wide default factory is created lazily on first use and torn
//! down explicitly with [`reset_global`]. Prefer an explicitly-threaded
//! [`CodecFactory`] handle; the global is a convenience for the common
//! "one factory per process" deployment. Installs on the global are
//! serialized by its internal mutex, but concurrent install/create races
//! are the owner's to avoid.

use crate::codec::{self, Codec};
use crate::plugin::SharedLibrary;
use crate::{g711, opus, pcm16, raw};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use voicekit_core::json::{self, JsonValue};
use voicekit_core::{Result, VoiceKitError};

/// Builds one codec instance for `(ssid, parameters)`.
pub type CodecGenerator =
    Arc<dyn Fn(u32, Option<&JsonValue>) -> Result<Box<dyn Codec>> + Send + Sync>;

struct FactoryEntry {
    generate: CodecGenerator,
    /// Keeps the originating shared object loaded for plugin codecs.
    library: Option<SharedLibrary>,
}

/// Registry mapping codec type-ids to generators.
#[derive(Default)]
pub struct CodecFactory {
    entries: HashMap<String, FactoryEntry>,
}

impl CodecFactory {
    /// Creates an empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a factory with the built-in codecs pre-registered:
    /// raw, PCM16, Opus, G.711.
    pub fn standard() -> Self {
        let mut factory = Self::new();
        raw::RawCodec::install(&mut factory);
        pcm16::Pcm16Codec::install(&mut factory);
        opus::OpusCodec::install(&mut factory);
        g711::G711Codec::install(&mut factory);
        factory
    }

    /// Installs `generator` under `name`, returning the previously installed
    /// generator (if any). A dynamic-library handle owned by the replaced
    /// entry is dropped.
    pub fn install(&mut self, name: &str, generator: CodecGenerator) -> Option<CodecGenerator> {
        self.install_with_library(name, generator, None)
    }

    pub(crate) fn install_with_library(
        &mut self,
        name: &str,
        generator: CodecGenerator,
        library: Option<SharedLibrary>,
    ) -> Option<CodecGenerator> {
        self.entries
            .insert(name.to_string(), FactoryEntry { generate: generator, library })
            .map(|old| old.generate)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Instantiates the codec registered under `name` and interposes
    /// resampling when its rate differs from the internal 48 kHz.
    pub fn create(
        &self,
        name: &str,
        ssid: u32,
        parameters: Option<&JsonValue>,
    ) -> Result<Box<dyn Codec>> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| VoiceKitError::NotFound(format!("codec '{name}'")))?;

        let codec = (entry.generate)(ssid, parameters)?;
        codec::enable_resampling(codec)
    }

    /// Instantiates a codec from a descriptor object; the `"codec"` key
    /// names the type-id, the remaining keys are codec-specific.
    pub fn create_from_json(&self, descriptor: &JsonValue, ssid: u32) -> Result<Box<dyn Codec>> {
        let name = json::get(descriptor, "/codec").and_then(JsonValue::as_str).ok_or_else(
            || {
                tracing::error!("invalid codec configuration: 'codec' missing");
                VoiceKitError::InvalidArgument("codec descriptor without 'codec' key".to_string())
            },
        )?;

        self.create(name, ssid, Some(descriptor))
    }
}

/*
 *      ------------------------------------------------------------------------
 *
 *      GLOBAL DEFAULT FACTORY
 *
 *      ------------------------------------------------------------------------
 */

static GLOBAL_FACTORY: Mutex<Option<CodecFactory>> = Mutex::new(None);

/// Runs `f` against the process-wide default factory, creating the standard
/// factory on first use.
pub fn with_global<R>(f: impl FnOnce(&mut CodecFactory) -> R) -> R {
    let mut guard = GLOBAL_FACTORY.lock().unwrap_or_else(PoisonError::into_inner);
    let factory = guard.get_or_insert_with(CodecFactory::standard);
    f(factory)
}

/// Tears the process-wide default factory down. The next [`with_global`]
/// starts from a fresh standard factory.
pub fn reset_global() {
    let mut guard = GLOBAL_FACTORY.lock().unwrap_or_else(PoisonError::into_inner);
    *guard = None;
}
