// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Streaming JSON parser for [`Value`].
//!
//! Input may arrive in arbitrary slices. The parser distinguishes three
//! outcomes: a complete value (with the cursor just past it), input that is
//! valid so far but truncated (append bytes and retry from the start of the
//! value), and malformed input (with the offending offset).

use crate::error::{Result, VoiceKitError};
use crate::json::parser::unescape;
use crate::utf8;
use crate::value::Value;

/// Outcome of one [`parse`] call.
#[derive(Debug)]
pub enum Parsed {
    /// A complete value; `consumed` points just past it.
    Value { value: Value, consumed: usize },
    /// Valid so far but incomplete; feed more bytes and parse again.
    Incomplete { consumed: usize },
    /// Malformed input; `offset` points at the offending byte.
    Error { offset: usize },
}

enum Step {
    Done(Value, usize),
    Incomplete(usize),
    Error(usize),
}

const fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\n' | b'\t' | b'\r')
}

fn skip_whitespace(input: &[u8], mut pos: usize) -> usize {
    while pos < input.len() && is_whitespace(input[pos]) {
        pos += 1;
    }
    pos
}

fn parse_word(input: &[u8], pos: usize, word: &[u8], value: Value) -> Step {
    let avail = input.len() - pos;

    if avail < word.len() {
        // Matching prefix of a keyword: complete it with the next read.
        for (index, &byte) in input[pos..].iter().enumerate() {
            if byte != word[index] {
                return Step::Error(pos + index);
            }
        }
        return Step::Incomplete(input.len());
    }

    if &input[pos..pos + word.len()] == word {
        Step::Done(value, pos + word.len())
    } else {
        Step::Error(pos)
    }
}

fn parse_string(input: &[u8], pos: usize) -> Step {
    debug_assert_eq!(input[pos], b'"');
    let mut scan = pos + 1;

    loop {
        let Some(&byte) = input.get(scan) else {
            // No closing quote yet.
            return Step::Incomplete(input.len());
        };

        match byte {
            0x5C => {
                let Some(&escaped) = input.get(scan + 1) else {
                    return Step::Incomplete(input.len());
                };
                match escaped {
                    0x22 | 0x5C | 0x2F | b'b' | b'f' | b'n' | b'r' | b't' => scan += 2,
                    b'u' => {
                        if scan + 6 > input.len() {
                            return Step::Incomplete(input.len());
                        }
                        scan += 6;
                    },
                    _ => return Step::Error(scan + 1),
                }
            },
            b'"' => {
                let raw = &input[pos + 1..scan];
                if !raw.is_empty() && !utf8::validate(raw) {
                    return Step::Error(pos + 1);
                }
                let Ok(bytes) = unescape(raw) else {
                    return Step::Error(pos + 1);
                };
                let Ok(text) = String::from_utf8(bytes) else {
                    return Step::Error(pos + 1);
                };
                return Step::Done(Value::String(text), scan + 1);
            },
            byte if byte < 0x1F => return Step::Error(scan),
            _ => scan += 1,
        }
    }
}

/// Longest float-literal prefix starting at `pos`, with strtod's exponent
/// backtracking: `e`/`e+` without a digit is not part of the number.
fn float_prefix(input: &[u8], pos: usize) -> Option<usize> {
    let mut i = pos;
    if matches!(input.get(i), Some(b'+' | b'-')) {
        i += 1;
    }

    let mut digits = false;
    while input.get(i).is_some_and(u8::is_ascii_digit) {
        digits = true;
        i += 1;
    }
    if input.get(i) == Some(&b'.') {
        i += 1;
        while input.get(i).is_some_and(u8::is_ascii_digit) {
            digits = true;
            i += 1;
        }
    }
    if !digits {
        return None;
    }

    let mantissa_end = i;
    if matches!(input.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(input.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        if input.get(j).is_some_and(u8::is_ascii_digit) {
            while input.get(j).is_some_and(u8::is_ascii_digit) {
                j += 1;
            }
            return Some(j);
        }
        return Some(mantissa_end);
    }

    Some(i)
}

fn parse_number(input: &[u8], pos: usize) -> Step {
    if input[pos] == b'.' {
        return Step::Error(pos);
    }

    let Some(stop) = float_prefix(input, pos) else {
        return Step::Error(pos);
    };

    let Ok(text) = std::str::from_utf8(&input[pos..stop]) else {
        return Step::Error(pos);
    };
    let Ok(number) = text.parse::<f64>() else {
        return Step::Error(pos);
    };

    // An exponent cut short at the end of the buffer may still complete
    // with further bytes: `1e`, `1e-`, `1e+`.
    let suffix = &input[stop..];
    match suffix.len() {
        1 if matches!(suffix[0], b'e' | b'E') => return Step::Incomplete(stop + 1),
        2 if matches!(suffix[0], b'e' | b'E') => {
            if matches!(suffix[1], b'+' | b'-') {
                return Step::Incomplete(stop + 2);
            }
            if !suffix[1].is_ascii_digit() {
                return Step::Error(stop + 1);
            }
        },
        3 if matches!(suffix[0], b'e' | b'E') => {
            if matches!(suffix[1], b'+' | b'-') {
                if !suffix[2].is_ascii_digit() {
                    return Step::Error(stop + 2);
                }
            } else {
                return Step::Error(stop + 1);
            }
        },
        _ => {},
    }

    Step::Done(Value::Number(number), stop)
}

fn parse_list(input: &[u8], pos: usize) -> Step {
    debug_assert_eq!(input[pos], b'[');
    let mut p = pos + 1;
    if p == input.len() {
        return Step::Incomplete(input.len());
    }

    let mut items = Vec::new();
    let mut require_comma = false;

    loop {
        p = skip_whitespace(input, p);
        if p == input.len() {
            return Step::Incomplete(input.len());
        }

        if input[p] == b']' {
            // A list is only returned once it is complete.
            return Step::Done(Value::List(items), p + 1);
        }

        if require_comma {
            if input[p] != b',' {
                return Step::Error(p);
            }
            p += 1;
            if p == input.len() {
                return Step::Incomplete(input.len());
            }
        }

        match parse_next_token(input, p) {
            Step::Done(entry, next) => {
                items.push(entry);
                p = next;
                require_comma = true;
            },
            other => return other,
        }
    }
}

fn parse_object(input: &[u8], pos: usize) -> Step {
    debug_assert_eq!(input[pos], b'{');
    let mut p = pos + 1;
    if p == input.len() {
        return Step::Incomplete(input.len());
    }

    let mut object = Value::object();
    let mut require_comma = false;

    loop {
        p = skip_whitespace(input, p);
        if p == input.len() {
            return Step::Incomplete(input.len());
        }

        if input[p] == b'}' {
            return Step::Done(object, p + 1);
        }

        if require_comma {
            if input[p] != b',' {
                return Step::Error(p);
            }
            p += 1;
            if p == input.len() {
                return Step::Incomplete(input.len());
            }
        }

        let key_at = skip_whitespace(input, p);
        let key = match parse_next_token(input, p) {
            Step::Done(Value::String(key), next) => {
                p = next;
                key
            },
            Step::Done(_, _) => return Step::Error(key_at),
            other => return other,
        };

        p = skip_whitespace(input, p);
        if p == input.len() {
            return Step::Incomplete(input.len());
        }
        if input[p] != b':' {
            return Step::Error(p);
        }
        p += 1;
        if p == input.len() {
            return Step::Incomplete(input.len());
        }

        match parse_next_token(input, p) {
            Step::Done(value, next) => {
                match object.object_set(key, value) {
                    Ok(None) => {},
                    // Duplicate keys make the whole object invalid.
                    Ok(Some(_)) | Err(_) => return Step::Error(key_at),
                }
                p = next;
                require_comma = true;
            },
            other => return other,
        }
    }
}

fn parse_next_token(input: &[u8], pos: usize) -> Step {
    let start = skip_whitespace(input, pos);
    if start == input.len() {
        return Step::Incomplete(input.len());
    }

    match input[start] {
        b'n' => parse_word(input, start, b"null", Value::Null),
        b't' => parse_word(input, start, b"true", Value::True),
        b'f' => parse_word(input, start, b"false", Value::False),
        b'"' => parse_string(input, start),
        b'0'..=b'9' | b'-' | b'+' => parse_number(input, start),
        b'[' => parse_list(input, start),
        b'{' => parse_object(input, start),
        _ => Step::Error(start),
    }
}

/// Parses one value from `input`.
///
/// Empty (or all-whitespace) input is incomplete, not malformed.
pub fn parse(input: &[u8]) -> Parsed {
    match parse_next_token(input, 0) {
        Step::Done(value, consumed) => Parsed::Value { value, consumed },
        Step::Incomplete(consumed) => Parsed::Incomplete { consumed },
        Step::Error(offset) => Parsed::Error { offset },
    }
}

/// Parses a value and requires the whole input to be consumed.
pub fn parse_complete(input: &[u8]) -> Result<Value> {
    match parse(input) {
        Parsed::Value { value, consumed } if consumed == input.len() => Ok(value),
        Parsed::Value { consumed, .. } => Err(VoiceKitError::MalformedInput(format!(
            "trailing bytes after offset {consumed}"
        ))),
        Parsed::Incomplete { .. } => {
            Err(VoiceKitError::MalformedInput("input is incomplete".to_string()))
        },
        Parsed::Error { offset } => {
            Err(VoiceKitError::MalformedInput(format!("invalid input at offset {offset}")))
        },
    }
}
