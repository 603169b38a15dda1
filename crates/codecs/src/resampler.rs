// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Mono PCM16 resampler with frame-exact output counts.
//!
//! The codec wrapper converts one audio frame per call and hands the result
//! straight to an encoder that insists on exact frame sizes (Opus rejects a
//! 319-sample "20 ms" frame). The sample count is therefore computed
//! exactly - `n_out = n_in * output_rate / input_rate` - and each call is
//! self-contained; no history is carried between frames. Interpolation is
//! linear, which is what the platform's reference resampler does for voice
//! rates.

use voicekit_core::{Result, VoiceKitError};

/// Fixed-ratio mono resampler for interleaved signed 16-bit samples.
pub struct PcmResampler {
    input_rate: u32,
    output_rate: u32,
}

impl PcmResampler {
    pub fn new(input_rate: u32, output_rate: u32) -> Result<Self> {
        if input_rate == 0 || output_rate == 0 {
            return Err(VoiceKitError::InvalidArgument(format!(
                "invalid resampling rates {input_rate} -> {output_rate}"
            )));
        }
        Ok(Self { input_rate, output_rate })
    }

    pub const fn input_rate(&self) -> u32 {
        self.input_rate
    }

    pub const fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Number of output samples produced for `input_samples`.
    pub fn output_samples(&self, input_samples: usize) -> usize {
        let exact =
            input_samples as u64 * u64::from(self.output_rate) / u64::from(self.input_rate);
        usize::try_from(exact).unwrap_or(usize::MAX)
    }

    /// Resamples `input` into `output`, returning the sample count written.
    pub fn resample(&mut self, input: &[i16], output: &mut [i16]) -> Result<usize> {
        if input.is_empty() {
            return Ok(0);
        }

        let produced = self.output_samples(input.len());
        if produced > output.len() {
            return Err(VoiceKitError::CapacityExceeded(format!(
                "resampler output needs {produced} samples, buffer holds {}",
                output.len()
            )));
        }

        let input_rate = u64::from(self.input_rate);
        let output_rate = u64::from(self.output_rate);

        for (k, slot) in output.iter_mut().take(produced).enumerate() {
            // Input position of output sample k as an exact rational:
            // k * input_rate / output_rate.
            let numerator = k as u64 * input_rate;
            #[allow(clippy::cast_possible_truncation)]
            let index = (numerator / output_rate) as usize;
            #[allow(clippy::cast_precision_loss)]
            let fraction = (numerator % output_rate) as f64 / output_rate as f64;

            let first = f64::from(input[index]);
            let second = f64::from(input[(index + 1).min(input.len() - 1)]);

            #[allow(clippy::cast_possible_truncation)]
            let sample = (second - first)
                .mul_add(fraction, first)
                .round()
                .clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16;
            *slot = sample;
        }

        Ok(produced)
    }
}
