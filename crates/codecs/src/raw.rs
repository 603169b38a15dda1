// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The raw codec: bytes in, the same bytes out. Used where a pipeline slot
//! requires a codec but the stream is already in its final form.

use crate::codec::Codec;
use crate::factory::{CodecFactory, CodecGenerator};
use std::sync::Arc;
use voicekit_core::{JsonValue, Result, VoiceKitError};

pub const TYPE_ID: &str = "raw";

pub struct RawCodec;

impl RawCodec {
    pub fn create(_ssid: u32, _parameters: Option<&JsonValue>) -> Result<Box<dyn Codec>> {
        Ok(Box::new(Self))
    }

    /// Registers this codec with `factory`, returning any generator it
    /// replaced.
    pub fn install(factory: &mut CodecFactory) -> Option<CodecGenerator> {
        factory.install(TYPE_ID, Arc::new(Self::create))
    }

    fn copy(input: &[u8], output: &mut [u8]) -> Result<usize> {
        if input.len() > output.len() {
            return Err(VoiceKitError::CapacityExceeded(format!(
                "output buffer not large enough: input is {}, output {}",
                input.len(),
                output.len()
            )));
        }
        output[..input.len()].copy_from_slice(input);
        Ok(input.len())
    }
}

impl Codec for RawCodec {
    fn type_id(&self) -> &str {
        TYPE_ID
    }

    fn encode(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        Self::copy(input, output)
    }

    fn decode(&mut self, _seq_number: u64, input: &[u8], output: &mut [u8]) -> Result<usize> {
        Self::copy(input, output)
    }

    fn parameters(&self) -> JsonValue {
        JsonValue::object()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough() {
        let mut codec = RawCodec;
        let input = [1u8, 2, 3, 4, 5];
        let mut output = [0u8; 8];
        assert_eq!(codec.encode(&input, &mut output).unwrap(), 5);
        assert_eq!(&output[..5], &input);
        assert_eq!(codec.decode(9, &input, &mut output).unwrap(), 5);
    }

    #[test]
    fn test_capacity() {
        let mut codec = RawCodec;
        let mut output = [0u8; 2];
        assert!(codec.encode(&[1, 2, 3], &mut output).is_err());
    }
}
