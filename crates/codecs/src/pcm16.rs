// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! PCM16 signed passthrough codec, parameterized by wire endianness.
//!
//! Bytes are swapped pairwise only when the requested endianness differs
//! from the native one; the codec never touches its input buffer.

use crate::codec::Codec;
use crate::factory::{CodecFactory, CodecGenerator};
use std::sync::Arc;
use voicekit_core::json::{self, JsonValue};
use voicekit_core::{Result, VoiceKitError};

pub const TYPE_ID: &str = "pcm16_signed";

const KEY_ENDIANNESS: &str = "endianness";
const BIG_ENDIAN: &str = "big_endian";
const LITTLE_ENDIAN: &str = "little_endian";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Big,
    Little,
}

pub struct Pcm16Codec {
    endianness: Endianness,
    last_seq_number: u64,
}

impl Pcm16Codec {
    /// Builds a PCM16 codec from parameter JSON.
    ///
    /// Recognized key: `"endianness"` with `"big_endian"` (the default) or
    /// `"little_endian"`.
    pub fn create(_ssid: u32, parameters: Option<&JsonValue>) -> Result<Box<dyn Codec>> {
        let endianness = match parameters
            .and_then(|parameters| json::get(parameters, "/endianness"))
            .and_then(JsonValue::as_str)
        {
            None => Endianness::Big,
            Some(BIG_ENDIAN) => Endianness::Big,
            Some(LITTLE_ENDIAN) => Endianness::Little,
            Some(other) => {
                return Err(VoiceKitError::InvalidArgument(format!(
                    "unknown endianness '{other}'"
                )));
            },
        };

        Ok(Box::new(Self { endianness, last_seq_number: 0 }))
    }

    /// Registers this codec with `factory`, returning any generator it
    /// replaced.
    pub fn install(factory: &mut CodecFactory) -> Option<CodecGenerator> {
        factory.install(TYPE_ID, Arc::new(Self::create))
    }

    fn transcode(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        if input.is_empty() {
            return Err(VoiceKitError::InvalidArgument("empty input".to_string()));
        }
        if input.len() % 2 != 0 {
            return Err(VoiceKitError::InvalidArgument(
                "need an array of 16 bit values - but input has an odd number of bytes"
                    .to_string(),
            ));
        }
        if input.len() > output.len() {
            return Err(VoiceKitError::CapacityExceeded(format!(
                "output buffer not large enough: input is {}, output {}",
                input.len(),
                output.len()
            )));
        }

        for (slot, pair) in output.chunks_exact_mut(2).zip(input.chunks_exact(2)) {
            let sample = i16::from_ne_bytes([pair[0], pair[1]]);
            let wire = match self.endianness {
                Endianness::Big => sample.to_be_bytes(),
                Endianness::Little => sample.to_le_bytes(),
            };
            slot.copy_from_slice(&wire);
        }

        Ok(input.len())
    }
}

impl Codec for Pcm16Codec {
    fn type_id(&self) -> &str {
        TYPE_ID
    }

    fn encode(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        self.transcode(input, output)
    }

    fn decode(&mut self, seq_number: u64, input: &[u8], output: &mut [u8]) -> Result<usize> {
        if self.last_seq_number + 1 != seq_number {
            tracing::warn!(
                expected = self.last_seq_number + 1,
                got = seq_number,
                "package loss detected"
            );
        }
        self.last_seq_number = seq_number;

        if input.is_empty() {
            return Err(VoiceKitError::InvalidArgument("empty input".to_string()));
        }
        if input.len() % 2 != 0 {
            return Err(VoiceKitError::InvalidArgument(
                "need an array of 16 bit values - but input has an odd number of bytes"
                    .to_string(),
            ));
        }
        if input.len() > output.len() {
            return Err(VoiceKitError::CapacityExceeded(format!(
                "output buffer not large enough: input is {}, output {}",
                input.len(),
                output.len()
            )));
        }

        for (slot, pair) in output.chunks_exact_mut(2).zip(input.chunks_exact(2)) {
            let wire = [pair[0], pair[1]];
            let sample = match self.endianness {
                Endianness::Big => i16::from_be_bytes(wire),
                Endianness::Little => i16::from_le_bytes(wire),
            };
            slot.copy_from_slice(&sample.to_ne_bytes());
        }

        Ok(input.len())
    }

    fn parameters(&self) -> JsonValue {
        let mut parameters = JsonValue::object();
        let endianness = match self.endianness {
            Endianness::Big => BIG_ENDIAN,
            Endianness::Little => LITTLE_ENDIAN,
        };
        let _ = parameters.object_set(KEY_ENDIANNESS, JsonValue::string(endianness));
        parameters
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use voicekit_core::json::decode_str;
    use voicekit_core::DEFAULT_SAMPLE_RATE;

    fn big() -> Pcm16Codec {
        Pcm16Codec { endianness: Endianness::Big, last_seq_number: 0 }
    }

    fn little() -> Pcm16Codec {
        Pcm16Codec { endianness: Endianness::Little, last_seq_number: 0 }
    }

    #[test]
    fn test_default_is_big_endian() {
        let codec = Pcm16Codec::create(0, None).unwrap();
        assert_eq!(
            codec.parameters().object_get("endianness").and_then(JsonValue::as_str),
            Some("big_endian")
        );

        let parameters = decode_str(r#"{"endianness":"little_endian"}"#).unwrap();
        let codec = Pcm16Codec::create(0, Some(&parameters)).unwrap();
        assert_eq!(
            codec.parameters().object_get("endianness").and_then(JsonValue::as_str),
            Some("little_endian")
        );

        let parameters = decode_str(r#"{"endianness":"middle_endian"}"#).unwrap();
        assert!(Pcm16Codec::create(0, Some(&parameters)).is_err());
    }

    #[test]
    fn test_big_endian_wire_format() {
        let mut codec = big();
        let samples: [i16; 2] = [0x0102, -0x0102];
        let input: Vec<u8> = samples.iter().flat_map(|s| s.to_ne_bytes()).collect();

        let mut wire = vec![0u8; 4];
        assert_eq!(codec.encode(&input, &mut wire).unwrap(), 4);
        assert_eq!(wire, vec![0x01, 0x02, 0xFE, 0xFE]);

        let mut back = vec![0u8; 4];
        assert_eq!(codec.decode(1, &wire, &mut back).unwrap(), 4);
        assert_eq!(back, input);
    }

    #[test]
    fn test_little_endian_wire_format() {
        let mut codec = little();
        let input = 0x0102i16.to_ne_bytes().to_vec();

        let mut wire = vec![0u8; 2];
        codec.encode(&input, &mut wire).unwrap();
        assert_eq!(wire, vec![0x02, 0x01]);

        let mut back = vec![0u8; 2];
        codec.decode(1, &wire, &mut back).unwrap();
        assert_eq!(back, input);
    }

    #[test]
    fn test_roundtrip_both_endiannesses() {
        for mut codec in [big(), little()] {
            let samples: Vec<i16> = (-50..50).map(|i| i * 321).collect();
            let input: Vec<u8> = samples.iter().flat_map(|s| s.to_ne_bytes()).collect();

            let mut wire = vec![0u8; input.len()];
            codec.encode(&input, &mut wire).unwrap();
            let mut back = vec![0u8; input.len()];
            codec.decode(1, &wire, &mut back).unwrap();
            assert_eq!(back, input);
        }
    }

    #[test]
    fn test_sample_rate_is_agnostic() {
        // endianness codecs report the internal default
        assert_eq!(big().sample_rate_hertz(), DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn test_buffer_validation() {
        let mut codec = big();
        let mut out = vec![0u8; 2];
        assert!(codec.encode(&[], &mut out).is_err());
        assert!(codec.encode(&[1], &mut out).is_err());
        assert!(codec.encode(&[1, 2, 3, 4], &mut out).is_err());
    }
}
