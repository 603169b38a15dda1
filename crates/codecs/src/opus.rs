// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Opus codec wrapping the reference implementation (`opus` crate).
//!
//! Mono, VoIP application. The sample rate comes from the parameter JSON;
//! libopus only accepts 8/12/16/24/48 kHz and construction fails for
//! anything else.

use crate::codec::{self, Codec};
use crate::factory::{CodecFactory, CodecGenerator};
use std::sync::Arc;
use voicekit_core::{JsonValue, Result, VoiceKitError};

pub const TYPE_ID: &str = "opus";

pub struct OpusCodec {
    sample_rate_hertz: u32,
    last_seq_number: u64,
    encoder: opus::Encoder,
    decoder: opus::Decoder,
    pcm_scratch: Vec<i16>,
}

impl OpusCodec {
    /// Builds an Opus codec from parameter JSON.
    ///
    /// Recognized key: `"sample_rate_hertz"` (default 48 000). Fails when
    /// the rate is out of `i32` range or rejected by libopus.
    pub fn create(_ssid: u32, parameters: Option<&JsonValue>) -> Result<Box<dyn Codec>> {
        let sample_rate_hertz = codec::parameters_sample_rate_hertz(parameters);

        if i32::try_from(sample_rate_hertz).is_err() {
            return Err(VoiceKitError::InvalidArgument(format!(
                "sample rate out of bounds: {sample_rate_hertz}"
            )));
        }

        tracing::info!(sample_rate_hertz, "creating Opus codec");

        let decoder = opus::Decoder::new(sample_rate_hertz, opus::Channels::Mono)
            .map_err(|e| VoiceKitError::ResourceFailure(format!("opus decoder: {e}")))?;

        let encoder =
            opus::Encoder::new(sample_rate_hertz, opus::Channels::Mono, opus::Application::Voip)
                .map_err(|e| VoiceKitError::ResourceFailure(format!("opus encoder: {e}")))?;

        Ok(Box::new(Self {
            sample_rate_hertz,
            last_seq_number: 0,
            encoder,
            decoder,
            pcm_scratch: Vec::new(),
        }))
    }

    /// Registers this codec with `factory`, returning any generator it
    /// replaced.
    pub fn install(factory: &mut CodecFactory) -> Option<CodecGenerator> {
        factory.install(TYPE_ID, Arc::new(Self::create))
    }
}

impl Codec for OpusCodec {
    fn type_id(&self) -> &str {
        TYPE_ID
    }

    fn encode(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        if input.is_empty() {
            return Err(VoiceKitError::InvalidArgument("empty input".to_string()));
        }
        if input.len() % 2 != 0 {
            return Err(VoiceKitError::InvalidArgument(
                "expect input to have a length multiple of 2".to_string(),
            ));
        }

        self.pcm_scratch.clear();
        self.pcm_scratch.extend(
            input.chunks_exact(2).map(|pair| i16::from_ne_bytes([pair[0], pair[1]])),
        );

        self.encoder
            .encode(&self.pcm_scratch, output)
            .map_err(|e| VoiceKitError::ResourceFailure(format!("could not encode frame: {e}")))
    }

    fn decode(&mut self, seq_number: u64, input: &[u8], output: &mut [u8]) -> Result<usize> {
        if input.is_empty() {
            return Err(VoiceKitError::InvalidArgument("empty input".to_string()));
        }
        if output.is_empty() || output.len() % 2 != 0 {
            return Err(VoiceKitError::InvalidArgument(
                "output buffer length must be a non-zero multiple of 2".to_string(),
            ));
        }

        let max_samples = output.len() / 2;
        self.pcm_scratch.clear();
        self.pcm_scratch.resize(max_samples, 0);

        let samples = self
            .decoder
            .decode(input, &mut self.pcm_scratch, false)
            .map_err(|e| VoiceKitError::ResourceFailure(format!("could not decode frame: {e}")))?;

        for (index, sample) in self.pcm_scratch[..samples].iter().enumerate() {
            let pair = sample.to_ne_bytes();
            output[index * 2] = pair[0];
            output[index * 2 + 1] = pair[1];
        }

        self.last_seq_number = seq_number;

        Ok(samples * 2)
    }

    fn parameters(&self) -> JsonValue {
        let mut parameters = JsonValue::object();
        let _ = codec::set_parameters_sample_rate_hertz(&mut parameters, self.sample_rate_hertz);
        parameters
    }

    fn sample_rate_hertz(&self) -> u32 {
        self.sample_rate_hertz
    }
}
