// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! UTF-8 validation and code-point conversion per RFC 3629.
//!
//! The walk-based validator reports *where* a byte stream stops being valid
//! UTF-8, which is what streaming consumers (signaling parsers fed from
//! sockets) need: everything up to that point can be processed, the rest is
//! kept for the next read.

use crate::error::{Result, VoiceKitError};
use rand::Rng;

/// Highest Unicode scalar value.
pub const MAX_CODE_POINT: u32 = 0x0010_FFFF;

const fn is_continuation(byte: u8) -> bool {
    byte >> 6 == 0b10
}

/// Walks `data` classifying each byte under RFC 3629 and stops at the first
/// malformed or truncated sequence.
///
/// With `character_start = false` the offset one past the last byte of the
/// last complete character is returned (`Some(0)` when nothing was valid).
/// With `character_start = true` the offset of the *start* of the last
/// complete character is returned, or `None` when no character was valid.
pub fn last_valid(data: &[u8], character_start: bool) -> Option<usize> {
    let mut pos = 0usize;
    let mut last_start: Option<usize> = None;

    while pos < data.len() {
        let open = data.len() - pos;
        let lead = data[pos];

        let width = if lead <= 0x7F {
            // ASCII, UTF8-1 = %x00-7F
            1
        } else if lead < 0xC2 {
            // continuation byte or overlong two-byte lead
            break;
        } else if lead <= 0xDF {
            // UTF8-2 = %xC2-DF UTF8-tail
            if open < 2 || !is_continuation(data[pos + 1]) {
                break;
            }
            2
        } else if lead < 0xF0 {
            // UTF8-3 = %xE0 %xA0-BF tail / %xE1-EC 2(tail)
            //        / %xED %x80-9F tail / %xEE-EF 2(tail)
            if open < 3 {
                break;
            }
            if lead == 0xE0 && data[pos + 1] < 0xA0 {
                break;
            }
            if lead == 0xED && data[pos + 1] > 0x9F {
                break;
            }
            if !is_continuation(data[pos + 1]) || !is_continuation(data[pos + 2]) {
                break;
            }
            3
        } else if lead <= 0xF4 {
            // UTF8-4 = %xF0 %x90-BF 2(tail) / %xF1-F3 3(tail) / %xF4 %x80-8F 2(tail)
            if open < 4 {
                break;
            }
            if lead == 0xF0 && data[pos + 1] < 0x90 {
                break;
            }
            if lead == 0xF4 && data[pos + 1] > 0x8F {
                break;
            }
            if !is_continuation(data[pos + 1])
                || !is_continuation(data[pos + 2])
                || !is_continuation(data[pos + 3])
            {
                break;
            }
            4
        } else {
            break;
        };

        last_start = Some(pos);
        pos += width;
    }

    if character_start {
        last_start
    } else {
        Some(pos)
    }
}

/// True iff `data` is non-empty and valid UTF-8 over its whole length.
pub fn validate(data: &[u8]) -> bool {
    if data.is_empty() {
        return false;
    }
    last_valid(data, false) == Some(data.len())
}

/// Number of bytes the UTF-8 encoding of `code_point` occupies,
/// or `None` for surrogates and out-of-range values.
pub const fn encoded_len(code_point: u32) -> Option<usize> {
    match code_point {
        0..=0x7F => Some(1),
        0x80..=0x07FF => Some(2),
        0xD800..=0xDFFF => None, // reserved for UTF-16 surrogates
        0x0800..=0xFFFF => Some(3),
        0x0001_0000..=MAX_CODE_POINT => Some(4),
        _ => None,
    }
}

/// Encodes `code_point` into `out`, returning the number of bytes written.
///
/// Rejects the UTF-16 surrogate range `D800..DFFF`, code points above
/// `10FFFF`, and output slices too small for the encoding.
pub fn encode_code_point(code_point: u32, out: &mut [u8]) -> Result<usize> {
    let width = encoded_len(code_point).ok_or_else(|| {
        VoiceKitError::InvalidArgument(format!("code point U+{code_point:04X} not encodable"))
    })?;

    if out.len() < width {
        return Err(VoiceKitError::CapacityExceeded(format!(
            "need {width} bytes for U+{code_point:04X}, have {}",
            out.len()
        )));
    }

    match width {
        1 => out[0] = (code_point & 0x7F) as u8,
        2 => {
            out[0] = 0xC0 | ((code_point >> 6) & 0x1F) as u8;
            out[1] = 0x80 | (code_point & 0x3F) as u8;
        },
        3 => {
            out[0] = 0xE0 | ((code_point >> 12) & 0x0F) as u8;
            out[1] = 0x80 | ((code_point >> 6) & 0x3F) as u8;
            out[2] = 0x80 | (code_point & 0x3F) as u8;
        },
        _ => {
            out[0] = 0xF0 | ((code_point >> 18) & 0x07) as u8;
            out[1] = 0x80 | ((code_point >> 12) & 0x3F) as u8;
            out[2] = 0x80 | ((code_point >> 6) & 0x3F) as u8;
            out[3] = 0x80 | (code_point & 0x3F) as u8;
        },
    }

    Ok(width)
}

/// Decodes one code point from the head of `data`.
///
/// Returns `(code_point, bytes_consumed)`, or `None` for malformed or
/// truncated sequences. A leading NUL is reported as code point 0 with one
/// byte consumed - the caller decides what a NUL means.
pub fn decode_code_point(data: &[u8]) -> Option<(u32, usize)> {
    let lead = *data.first()?;

    if lead <= 0x7F {
        return Some((u32::from(lead), 1));
    }

    // Re-use the walk so the constraint tables live in one place.
    let width = match lead {
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => return None,
    };

    if data.len() < width || last_valid(&data[..width], false) != Some(width) {
        return None;
    }

    let cp = match width {
        2 => (u32::from(lead & 0x1F) << 6) | u32::from(data[1] & 0x3F),
        3 => {
            (u32::from(lead & 0x0F) << 12)
                | (u32::from(data[1] & 0x3F) << 6)
                | u32::from(data[2] & 0x3F)
        },
        _ => {
            (u32::from(lead & 0x07) << 18)
                | (u32::from(data[1] & 0x3F) << 12)
                | (u32::from(data[2] & 0x3F) << 6)
                | u32::from(data[3] & 0x3F)
        },
    };

    Some((cp, width))
}

/// Generates `chars` random code points from the Basic Multilingual Plane
/// (surrogates skipped), encoded as UTF-8. Round-trip test fodder.
pub fn random_utf8<R: Rng>(rng: &mut R, chars: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 * chars);
    let mut scratch = [0u8; 4];

    for _ in 0..chars {
        loop {
            let cp: u32 = rng.gen_range(0..=0xFFFF);
            if let Ok(used) = encode_code_point(cp, &mut scratch) {
                out.extend_from_slice(&scratch[..used]);
                break;
            }
        }
    }

    out
}
