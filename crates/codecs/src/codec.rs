// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The polymorphic codec abstraction.
//!
//! Concrete codecs operate at their own sample rate; the platform's media
//! pipelines run at the fixed internal rate of 48 kHz. [`enable_resampling`]
//! interposes [`ResamplingCodec`] so callers never see the codec rate: 48 kHz
//! PCM in on encode, 48 kHz PCM out on decode, regardless of the codec.
//!
//! All PCM crossing this API is interleaved signed 16-bit in native byte
//! order, passed as raw bytes.

use crate::resampler::PcmResampler;
use voicekit_core::json::{self, JsonValue};
use voicekit_core::{Result, VoiceKitError, DEFAULT_SAMPLE_RATE, MAX_FRAME_LENGTH_SAMPLES};

pub const KEY_CODEC: &str = "codec";
pub const KEY_SAMPLE_RATE_HERTZ: &str = "sample_rate_hertz";

/// One audio codec instance.
///
/// Codecs are stateful (resampler, Opus decoder state) and must not be used
/// from multiple threads concurrently; they may be moved between threads.
pub trait Codec: Send {
    /// Stable type id, the name the factory knows this codec under.
    fn type_id(&self) -> &str;

    /// Encodes PCM16 bytes into the codec's wire format.
    /// Returns the number of bytes written to `output`.
    fn encode(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize>;

    /// Decodes one unit of the codec's wire format into PCM16 bytes.
    /// `seq_number` lets stateful codecs observe packet loss.
    /// Returns the number of bytes written to `output`.
    fn decode(&mut self, seq_number: u64, input: &[u8], output: &mut [u8]) -> Result<usize>;

    /// A fresh JSON object holding the codec-specific parameters.
    fn parameters(&self) -> JsonValue;

    /// The codec's native sample rate.
    fn sample_rate_hertz(&self) -> u32 {
        DEFAULT_SAMPLE_RATE
    }

    /// Statically assigned RTP payload type, where the standard defines one.
    fn rtp_payload_type(&self) -> Option<i8> {
        None
    }
}

/// Serializes a codec to its parameter JSON plus the `"codec"` type-id key.
pub fn to_json(codec: &dyn Codec) -> Result<JsonValue> {
    let mut parameters = codec.parameters();
    parameters.object_set(KEY_CODEC, JsonValue::string(codec.type_id()))?;
    Ok(parameters)
}

/// Reads `"sample_rate_hertz"` from a parameter object.
/// Absent, non-numeric or out-of-range values yield the internal default.
pub fn parameters_sample_rate_hertz(parameters: Option<&JsonValue>) -> u32 {
    let Some(parameters) = parameters else {
        return DEFAULT_SAMPLE_RATE;
    };

    match json::get(parameters, "/sample_rate_hertz").and_then(JsonValue::as_number) {
        Some(rate) if rate >= 1.0 && rate <= f64::from(u32::MAX) => {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let rate = rate as u32;
            rate
        },
        _ => DEFAULT_SAMPLE_RATE,
    }
}

/// Writes `"sample_rate_hertz"` into a parameter object, replacing any
/// existing entry.
pub fn set_parameters_sample_rate_hertz(
    parameters: &mut JsonValue,
    sample_rate_hertz: u32,
) -> Result<()> {
    parameters
        .object_set(KEY_SAMPLE_RATE_HERTZ, JsonValue::number(f64::from(sample_rate_hertz)))?;
    Ok(())
}

/// Interposes a resampling wrapper when `codec` does not run at the internal
/// rate; codecs already at 48 kHz are returned untouched.
pub fn enable_resampling(codec: Box<dyn Codec>) -> Result<Box<dyn Codec>> {
    if codec.sample_rate_hertz() == DEFAULT_SAMPLE_RATE {
        return Ok(codec);
    }
    Ok(Box::new(ResamplingCodec::new(codec)?))
}

/// Transparent resampling around a codec running at its own rate.
///
/// Encode direction: 48 kHz in, codec rate into the inner encoder.
/// Decode direction: codec rate out of the inner decoder, 48 kHz returned.
pub struct ResamplingCodec {
    inner: Box<dyn Codec>,
    encode_resampler: PcmResampler,
    decode_resampler: PcmResampler,
    staging: Vec<i16>,
    byte_staging: Vec<u8>,
}

impl ResamplingCodec {
    pub fn new(inner: Box<dyn Codec>) -> Result<Self> {
        let codec_rate = inner.sample_rate_hertz();
        if codec_rate == 0 {
            return Err(VoiceKitError::InvalidArgument(format!(
                "codec '{}' reports a zero sample rate",
                inner.type_id()
            )));
        }

        // Worst case frame: MAX_FRAME_LENGTH_SAMPLES at the codec rate,
        // which covers the same period at 48 kHz.
        let max_out_samples = MAX_FRAME_LENGTH_SAMPLES;
        let period_seconds = max_out_samples as f64 / f64::from(codec_rate);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let max_in_samples = (period_seconds * f64::from(DEFAULT_SAMPLE_RATE)) as usize;
        let capacity = max_in_samples.max(max_out_samples);

        tracing::info!(
            from = DEFAULT_SAMPLE_RATE,
            to = codec_rate,
            staging_samples = capacity,
            codec = inner.type_id(),
            "enabling resampling"
        );

        Ok(Self {
            encode_resampler: PcmResampler::new(DEFAULT_SAMPLE_RATE, codec_rate)?,
            decode_resampler: PcmResampler::new(codec_rate, DEFAULT_SAMPLE_RATE)?,
            inner,
            staging: vec![0; capacity],
            byte_staging: Vec::new(),
        })
    }
}

fn bytes_to_samples(bytes: &[u8]) -> Result<Vec<i16>> {
    if bytes.len() % 2 != 0 {
        return Err(VoiceKitError::InvalidArgument(
            "PCM16 byte length must be a multiple of 2".to_string(),
        ));
    }
    Ok(bytes.chunks_exact(2).map(|pair| i16::from_ne_bytes([pair[0], pair[1]])).collect())
}

impl Codec for ResamplingCodec {
    fn type_id(&self) -> &str {
        self.inner.type_id()
    }

    fn encode(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        let samples = bytes_to_samples(input)?;
        let resampled = self.encode_resampler.resample(&samples, &mut self.staging)?;

        self.byte_staging.clear();
        for sample in &self.staging[..resampled] {
            self.byte_staging.extend_from_slice(&sample.to_ne_bytes());
        }

        self.inner.encode(&self.byte_staging, output)
    }

    fn decode(&mut self, seq_number: u64, input: &[u8], output: &mut [u8]) -> Result<usize> {
        let decoded = self.inner.decode(seq_number, input, output)?;

        let samples = bytes_to_samples(&output[..decoded])?;
        let resampled = self.decode_resampler.resample(&samples, &mut self.staging)?;

        let bytes = (resampled * 2).min(output.len());
        for (index, sample) in self.staging[..bytes / 2].iter().enumerate() {
            let pair = sample.to_ne_bytes();
            output[index * 2] = pair[0];
            output[index * 2 + 1] = pair[1];
        }

        Ok(bytes)
    }

    fn parameters(&self) -> JsonValue {
        self.inner.parameters()
    }

    fn sample_rate_hertz(&self) -> u32 {
        self.inner.sample_rate_hertz()
    }

    fn rtp_payload_type(&self) -> Option<i8> {
        self.inner.rtp_payload_type()
    }
}
