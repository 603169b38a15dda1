// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! JSON decode, configurable encode, and exact length calculation.
//!
//! The encoder is driven by a [`StringifyConfig`]: a frozen record of the
//! textual fragments emitted around each value variant. [`calculate`]
//! pre-computes exactly the number of bytes [`encode`] will append for the
//! same value and config - callers size buffers from it, so the two walking
//! the tree differently is a bug, never a tolerance.

use crate::error::{Result, VoiceKitError};
use crate::json::value::{JsonKind, JsonValue};
use crate::utf8;
use std::cmp::Ordering;
use std::fmt;

/// Fragments emitted around one value variant.
///
/// For containers: `intro` opens (e.g. `"{\n"`), `separator` joins members,
/// `out` is written before the closing indent (e.g. `"\n"`), `outro` closes.
/// `delimiter` sits between an object key and its value.
#[derive(Debug, Clone, Default)]
pub struct ItemFragments {
    pub intro: String,
    pub out: String,
    pub outro: String,
    pub separator: String,
    pub delimiter: String,
}

/// Depth-indent behavior for one container variant.
#[derive(Debug, Clone, Default)]
pub struct EntryLayout {
    /// When true, `indent` is repeated once per nesting level.
    pub depth: bool,
    pub indent: String,
}

#[derive(Debug, Clone, Default)]
pub struct VariantLayout {
    pub item: ItemFragments,
    pub entry: EntryLayout,
}

/// Frozen stringification recipe. See [`StringifyConfig::minimal`] and
/// [`StringifyConfig::default_pretty`] for the two canned instances.
#[derive(Debug, Clone, Default)]
pub struct StringifyConfig {
    /// Written once before the top-level value.
    pub intro: String,
    /// Written once after the top-level value.
    pub outro: String,
    pub literal: VariantLayout,
    pub number: VariantLayout,
    pub string: VariantLayout,
    pub array: VariantLayout,
    pub object: VariantLayout,
}

fn fragments(intro: &str, out: &str, outro: &str, separator: &str, delimiter: &str) -> ItemFragments {
    ItemFragments {
        intro: intro.to_string(),
        out: out.to_string(),
        outro: outro.to_string(),
        separator: separator.to_string(),
        delimiter: delimiter.to_string(),
    }
}

impl StringifyConfig {
    /// No whitespace at all: `{"key1":"value","key2":["string",null,false,true,5]}`
    pub fn minimal() -> Self {
        Self {
            string: VariantLayout { item: fragments("\"", "", "\"", "", ""), ..Default::default() },
            array: VariantLayout { item: fragments("[", "", "]", ",", ""), ..Default::default() },
            object: VariantLayout { item: fragments("{", "", "}", ",", ":"), ..Default::default() },
            ..Default::default()
        }
    }

    /// Tab-indented, newline-separated output:
    ///
    /// ```json
    /// {
    ///     "key1":"value",
    ///     "key2":
    ///     [
    ///         "string",
    ///         5
    ///     ]
    /// }
    /// ```
    pub fn default_pretty() -> Self {
        Self {
            string: VariantLayout { item: fragments("\"", "", "\"", "", ""), ..Default::default() },
            array: VariantLayout {
                item: fragments("[\n", "\n", "]", ",\n", ""),
                entry: EntryLayout { depth: true, indent: "\t".to_string() },
            },
            object: VariantLayout {
                item: fragments("{\n", "\n", "}", ",\n", ":"),
                entry: EntryLayout { depth: true, indent: "\t".to_string() },
            },
            ..Default::default()
        }
    }
}

/// Object key emission order.
#[derive(Default, Clone, Copy)]
pub enum KeyOrder<'a> {
    /// Keys as stored (insertion order).
    Insertion,
    /// Byte-ascending - the canonical order.
    #[default]
    Ascending,
    /// Caller-supplied comparator.
    Custom(&'a dyn Fn(&str, &str) -> Ordering),
}

/*
 *      ------------------------------------------------------------------------
 *
 *      DECODING
 *
 *      ------------------------------------------------------------------------
 */

const WHITESPACE: [u8; 4] = [0x20, 0x09, 0x0A, 0x0D];

struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(byte) = self.peek() {
            if WHITESPACE.contains(&byte) {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn fail(&self, what: &str) -> VoiceKitError {
        VoiceKitError::MalformedInput(format!("{what} at byte {}", self.pos))
    }

    fn parse_value(&mut self) -> Result<JsonValue> {
        self.skip_whitespace();
        match self.peek() {
            Some(b'{') => self.parse_object(),
            Some(b'[') => self.parse_array(),
            Some(b'"') => Ok(JsonValue::String(self.parse_string()?)),
            Some(b'n' | b't' | b'f') => self.parse_literal(),
            Some(b'-' | b'0'..=b'9') => self.parse_number(),
            Some(_) => Err(self.fail("unexpected byte")),
            None => Err(self.fail("unexpected end of input")),
        }
    }

    fn parse_object(&mut self) -> Result<JsonValue> {
        self.pos += 1; // {
        let mut object = JsonValue::object();

        self.skip_whitespace();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(object);
        }

        loop {
            self.skip_whitespace();
            if self.peek() != Some(b'"') {
                return Err(self.fail("expected object key"));
            }
            let key = self.parse_string()?;

            if object.object_get(&key).is_some() {
                return Err(self.fail("duplicate object key"));
            }

            self.skip_whitespace();
            if self.peek() != Some(b':') {
                return Err(self.fail("expected ':'"));
            }
            self.pos += 1;

            let child = self.parse_value()?;
            object.object_set(key, child)?;

            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(object);
                },
                _ => return Err(self.fail("expected ',' or '}'")),
            }
        }
    }

    fn parse_array(&mut self) -> Result<JsonValue> {
        self.pos += 1; // [
        let mut array = JsonValue::array();

        self.skip_whitespace();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(array);
        }

        loop {
            let child = self.parse_value()?;
            array.array_push(child)?;

            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(array);
                },
                _ => return Err(self.fail("expected ',' or ']'")),
            }
        }
    }

    /// Parses a string literal, returning the unescaped payload.
    fn parse_string(&mut self) -> Result<String> {
        self.pos += 1; // opening quote
        let start = self.pos;

        // First find the closing quote (escape-aware), so the raw span can
        // be UTF-8 checked before unescaping.
        let mut scan = start;
        loop {
            match self.buf.get(scan) {
                None => return Err(self.fail("unterminated string")),
                Some(b'"') => break,
                Some(0x5C) => {
                    scan += match self.buf.get(scan + 1) {
                        Some(b'u') => 6,
                        Some(_) => 2,
                        None => return Err(self.fail("unterminated escape")),
                    };
                },
                Some(_) => scan += 1,
            }
        }

        let raw = &self.buf[start..scan.min(self.buf.len())];
        if !raw.is_empty() && !utf8::validate(raw) {
            return Err(self.fail("string payload is not valid UTF-8"));
        }

        let unescaped = unescape(raw)
            .map_err(|offset| {
                VoiceKitError::MalformedInput(format!(
                    "invalid string content at byte {}",
                    start + offset
                ))
            })?;

        self.pos = scan + 1; // skip closing quote
        String::from_utf8(unescaped)
            .map_err(|_| self.fail("unescaped string is not valid UTF-8"))
    }

    fn parse_literal(&mut self) -> Result<JsonValue> {
        let rest = &self.buf[self.pos..];
        for (text, value) in [
            (&b"null"[..], JsonValue::Null),
            (&b"true"[..], JsonValue::True),
            (&b"false"[..], JsonValue::False),
        ] {
            if rest.starts_with(text) {
                self.pos += text.len();
                return Ok(value);
            }
        }
        Err(self.fail("invalid literal"))
    }

    fn parse_number(&mut self) -> Result<JsonValue> {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if byte.is_ascii_digit() || matches!(byte, b'-' | b'+' | b'.' | b'e' | b'E') {
                self.pos += 1;
            } else {
                break;
            }
        }

        // The byte after a number must be structural or whitespace. This is
        // what turns `1e ` (exponent never completed) into an error: the
        // token ends at the space but does not parse as a float.
        match self.peek() {
            None | Some(b',' | b']' | b'}' | 0x20 | 0x09 | 0x0A | 0x0D) => {},
            Some(_) => return Err(self.fail("garbage after number")),
        }

        let text = std::str::from_utf8(&self.buf[start..self.pos])
            .map_err(|_| self.fail("number is not ASCII"))?;
        let number: f64 = text.parse().map_err(|_| self.fail("invalid number"))?;
        Ok(JsonValue::Number(number))
    }
}

/// Unescapes the raw span between the quotes of a string literal.
/// On failure returns the offset of the offending byte within `raw`.
pub(crate) fn unescape(raw: &[u8]) -> std::result::Result<Vec<u8>, usize> {
    let mut out = Vec::with_capacity(raw.len());
    let mut pos = 0usize;

    while pos < raw.len() {
        let byte = raw[pos];

        if byte != 0x5C {
            // Unescaped control bytes below 0x1F are invalid; 0x1F itself
            // passes, matching the streaming scanner.
            if byte < 0x1F {
                return Err(pos);
            }
            out.push(byte);
            pos += 1;
            continue;
        }

        let escaped = *raw.get(pos + 1).ok_or(pos)?;
        match escaped {
            0x22 | 0x5C | 0x2F => out.push(escaped),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'u' => {
                let hex = raw.get(pos + 2..pos + 6).ok_or(pos)?;
                let code_point = parse_hex4(hex).ok_or(pos)?;
                let mut scratch = [0u8; 4];
                let used =
                    utf8::encode_code_point(code_point, &mut scratch).map_err(|_| pos)?;
                out.extend_from_slice(&scratch[..used]);
                pos += 6;
                continue;
            },
            _ => return Err(pos + 1),
        }
        pos += 2;
    }

    Ok(out)
}

fn parse_hex4(hex: &[u8]) -> Option<u32> {
    if hex.len() != 4 {
        return None;
    }
    let mut value = 0u32;
    for &byte in hex {
        value = (value << 4) | u32::from((byte as char).to_digit(16)?);
    }
    Some(value)
}

/// Decodes one JSON value from the head of `buffer`.
///
/// Returns the value and the number of bytes consumed (leading whitespace
/// included, trailing bytes untouched).
pub fn decode(buffer: &[u8]) -> Result<(JsonValue, usize)> {
    if buffer.is_empty() {
        return Err(VoiceKitError::InvalidArgument("empty buffer".to_string()));
    }
    let mut decoder = Decoder::new(buffer);
    let value = decoder.parse_value()?;
    Ok((value, decoder.pos))
}

/// Decodes into an existing node.
///
/// The target is reused when the parsed variant matches its variant class
/// (any literal refills a literal node); on mismatch the target is left
/// untouched and `StateMismatch` is returned.
pub fn decode_into(target: &mut JsonValue, buffer: &[u8]) -> Result<usize> {
    let (value, used) = decode(buffer)?;
    if !value.kind().same_class(target.kind()) {
        return Err(VoiceKitError::StateMismatch(format!(
            "decoded {:?} does not fit existing {:?}",
            value.kind(),
            target.kind()
        )));
    }
    *target = value;
    Ok(used)
}

/*
 *      ------------------------------------------------------------------------
 *
 *      ENCODING
 *
 *      ------------------------------------------------------------------------
 */

/// Length of `text` after JSON string escaping.
fn escaped_len(text: &str) -> usize {
    text.bytes()
        .map(|byte| match byte {
            0x22 | 0x5C | 0x08 | 0x0C | b'\n' | b'\r' | b'\t' => 2,
            0x00..=0x1F => 6, // \u00XX
            _ => 1,
        })
        .sum()
}

pub(crate) fn push_escaped(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if (ch as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04X}", ch as u32));
            },
            ch => out.push(ch),
        }
    }
}

/// Formats a number the way the encoder emits it: integral values in i64
/// range print without a fraction, everything else with 15 significant
/// digits.
pub(crate) fn format_number(value: f64) -> Result<String> {
    if !value.is_finite() {
        return Err(VoiceKitError::InvalidArgument(
            "non-finite number is not representable in JSON".to_string(),
        ));
    }

    #[allow(clippy::cast_possible_truncation)]
    if value == value.trunc() && value.abs() < 9.2e18 {
        return Ok(format!("{}", value as i64));
    }

    Ok(format_g15(value))
}

/// `%.15g`-style formatting: up to 15 significant digits, fixed notation for
/// exponents in `[-4, 15)`, scientific otherwise, trailing zeros trimmed.
fn format_g15(value: f64) -> String {
    let sci = format!("{value:.14e}");
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if (-4..15).contains(&exponent) {
        #[allow(clippy::cast_sign_loss)]
        let decimals = (14 - exponent).max(0) as usize;
        let mut fixed = format!("{value:.decimals$}");
        if fixed.contains('.') {
            while fixed.ends_with('0') {
                fixed.pop();
            }
            if fixed.ends_with('.') {
                fixed.pop();
            }
        }
        fixed
    } else {
        let mut m = mantissa.to_string();
        if m.contains('.') {
            while m.ends_with('0') {
                m.pop();
            }
            if m.ends_with('.') {
                m.pop();
            }
        }
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{m}e{sign}{:02}", exponent.abs())
    }
}

struct Encoder<'a> {
    config: &'a StringifyConfig,
    order: KeyOrder<'a>,
    out: &'a mut String,
    depth: usize,
}

impl Encoder<'_> {
    fn write_indent(&mut self, layout: &EntryLayout) {
        if !layout.depth || layout.indent.is_empty() {
            return;
        }
        for _ in 0..self.depth {
            self.out.push_str(&layout.indent);
        }
    }

    fn encode_value(&mut self, value: &JsonValue) -> Result<()> {
        match value {
            JsonValue::Null => self.encode_literal("null"),
            JsonValue::True => self.encode_literal("true"),
            JsonValue::False => self.encode_literal("false"),
            JsonValue::Number(n) => {
                let text = format_number(*n)?;
                self.out.push_str(&self.config.number.item.intro);
                self.out.push_str(&text);
                self.out.push_str(&self.config.number.item.outro);
                Ok(())
            },
            JsonValue::String(s) => {
                self.out.push_str(&self.config.string.item.intro);
                push_escaped(self.out, s);
                self.out.push_str(&self.config.string.item.outro);
                Ok(())
            },
            JsonValue::Array(_) => self.encode_array(value),
            JsonValue::Object(_) => self.encode_object(value),
        }
    }

    fn encode_literal(&mut self, text: &str) -> Result<()> {
        self.out.push_str(&self.config.literal.item.intro);
        self.out.push_str(text);
        self.out.push_str(&self.config.literal.item.outro);
        Ok(())
    }

    fn ordered_keys<'v>(&self, value: &'v JsonValue) -> Vec<&'v str> {
        let mut keys: Vec<&'v str> = Vec::with_capacity(value.count());
        value.for_each_entry(|key, _| {
            keys.push(key);
            true
        });
        match self.order {
            KeyOrder::Insertion => {},
            KeyOrder::Ascending => keys.sort_unstable(),
            KeyOrder::Custom(compare) => keys.sort_by(|a, b| compare(a, b)),
        }
        keys
    }

    fn encode_object(&mut self, value: &JsonValue) -> Result<()> {
        if value.is_empty() {
            self.out.push_str("{}");
            return Ok(());
        }

        let object = self.config.object.clone();

        self.write_indent(&object.entry);
        self.out.push_str(&object.item.intro);

        self.depth += 1;
        for key in self.ordered_keys(value) {
            let Some(child) = value.object_get(key) else {
                return Err(VoiceKitError::StateMismatch(format!("lost key '{key}'")));
            };

            self.write_indent(&object.entry);
            self.out.push('"');
            push_escaped(self.out, key);
            self.out.push('"');
            self.out.push_str(&object.item.delimiter);

            // Non-empty child containers start on their own line so the
            // opening bracket lines up with the parent's indent.
            if object.entry.depth
                && matches!(child.kind(), JsonKind::Array | JsonKind::Object)
                && !child.is_empty()
            {
                self.out.push('\n');
            }

            self.encode_value(child)?;
            self.out.push_str(&object.item.separator);
        }
        self.depth -= 1;

        // Rewind the separator written after the last member.
        self.out.truncate(self.out.len() - object.item.separator.len());

        self.out.push_str(&object.item.out);
        self.write_indent(&object.entry);
        self.out.push_str(&object.item.outro);
        Ok(())
    }

    fn encode_array(&mut self, value: &JsonValue) -> Result<()> {
        if value.is_empty() {
            self.out.push_str("[]");
            return Ok(());
        }

        let array = self.config.array.clone();
        let items = value.count();

        self.write_indent(&array.entry);
        self.out.push_str(&array.item.intro);

        self.depth += 1;
        for index in 0..items {
            let Some(child) = value.array_get(index) else {
                return Err(VoiceKitError::StateMismatch(format!("lost index {index}")));
            };

            // Non-empty containers emit their own leading indent with their
            // intro; scalars and empty containers get it here.
            let container = matches!(child.kind(), JsonKind::Array | JsonKind::Object);
            if !(container && !child.is_empty()) {
                self.write_indent(&array.entry);
            }

            self.encode_value(child)?;

            if index + 1 < items {
                self.out.push_str(&array.item.separator);
            }
        }
        self.depth -= 1;

        self.out.push_str(&array.item.out);
        self.write_indent(&array.entry);
        self.out.push_str(&array.item.outro);
        Ok(())
    }
}

/// Appends the stringification of `value` to `out`.
/// Returns the number of bytes written - always equal to
/// [`calculate`]`(value, config)` for the same inputs.
pub fn encode(
    value: &JsonValue,
    config: &StringifyConfig,
    order: KeyOrder<'_>,
    out: &mut String,
) -> Result<usize> {
    let start = out.len();
    out.push_str(&config.intro);

    let mut encoder = Encoder { config, order, out, depth: 0 };
    encoder.encode_value(value)?;

    out.push_str(&config.outro);
    Ok(out.len() - start)
}

/*
 *      ------------------------------------------------------------------------
 *
 *      LENGTH CALCULATION
 *
 *      ------------------------------------------------------------------------
 */

fn indent_width(layout: &EntryLayout, depth: usize) -> usize {
    if layout.depth && !layout.indent.is_empty() {
        layout.indent.len() * depth
    } else {
        0
    }
}

fn calculate_value(value: &JsonValue, config: &StringifyConfig, depth: usize) -> Result<usize> {
    match value {
        JsonValue::Null | JsonValue::True => {
            Ok(4 + config.literal.item.intro.len() + config.literal.item.outro.len())
        },
        JsonValue::False => {
            Ok(5 + config.literal.item.intro.len() + config.literal.item.outro.len())
        },
        JsonValue::Number(n) => Ok(format_number(*n)?.len()
            + config.number.item.intro.len()
            + config.number.item.outro.len()),
        JsonValue::String(s) => Ok(escaped_len(s)
            + config.string.item.intro.len()
            + config.string.item.outro.len()),
        JsonValue::Object(entries) => {
            if entries.is_empty() {
                return Ok(2);
            }
            let object = &config.object;
            let indent = indent_width(&object.entry, depth);

            let mut length = indent + object.item.intro.len();
            length += indent + object.item.outro.len();
            length += object.item.out.len();

            for (key, child) in entries {
                length += indent_width(&object.entry, depth + 1);
                length += escaped_len(key) + 2;
                length += object.item.delimiter.len();
                if object.entry.depth
                    && matches!(child.kind(), JsonKind::Array | JsonKind::Object)
                    && !child.is_empty()
                {
                    length += 1; // the newline before a non-empty container
                }
                length += calculate_value(child, config, depth + 1)?;
                length += object.item.separator.len();
            }

            // The separator after the last member is rewound.
            Ok(length - object.item.separator.len())
        },
        JsonValue::Array(items) => {
            if items.is_empty() {
                return Ok(2);
            }
            let array = &config.array;
            let indent = indent_width(&array.entry, depth);

            let mut length = indent + array.item.intro.len();
            length += indent + array.item.outro.len();
            length += array.item.out.len();

            for (index, child) in items.iter().enumerate() {
                let container = matches!(child.kind(), JsonKind::Array | JsonKind::Object);
                if !(container && !child.is_empty()) {
                    length += indent_width(&array.entry, depth + 1);
                }
                length += calculate_value(child, config, depth + 1)?;
                if index + 1 < items.len() {
                    length += array.item.separator.len();
                }
            }

            Ok(length)
        },
    }
}

/// Exact number of bytes [`encode`] will write for `value` under `config`.
pub fn calculate(value: &JsonValue, config: &StringifyConfig) -> Result<usize> {
    Ok(config.intro.len() + calculate_value(value, config, 0)? + config.outro.len())
}

impl fmt::Display for JsonValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        encode(self, &StringifyConfig::minimal(), KeyOrder::Ascending, &mut out)
            .map_err(|_| fmt::Error)?;
        f.write_str(&out)
    }
}

impl JsonValue {
    /// Writes the pretty form to `writer` - debugging aid.
    pub fn dump<W: std::io::Write>(&self, writer: &mut W) -> Result<()> {
        let mut out = String::new();
        encode(self, &StringifyConfig::default_pretty(), KeyOrder::Ascending, &mut out)?;
        out.push('\n');
        writer.write_all(out.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn decode_str(input: &str) -> Result<(JsonValue, usize)> {
        decode(input.as_bytes())
    }

    fn minimal(value: &JsonValue) -> String {
        let mut out = String::new();
        encode(value, &StringifyConfig::minimal(), KeyOrder::Ascending, &mut out).unwrap();
        out
    }

    fn pretty(value: &JsonValue) -> String {
        let mut out = String::new();
        encode(value, &StringifyConfig::default_pretty(), KeyOrder::Ascending, &mut out).unwrap();
        out
    }

    #[test]
    fn test_decode_literals() {
        assert!(decode_str("null").unwrap().0.is_null());
        assert_eq!(decode_str("true").unwrap().0.as_bool(), Some(true));
        assert_eq!(decode_str("false").unwrap().0.as_bool(), Some(false));
        assert_eq!(decode_str("  \t\nnull").unwrap().1, 8);
        assert!(decode_str("nul").is_err());
        assert!(decode_str("truth").is_err());
    }

    #[test]
    fn test_decode_numbers() {
        assert_eq!(decode_str("42 ").unwrap().0.as_number(), Some(42.0));
        assert_eq!(decode_str("-1.5,").unwrap().0.as_number(), Some(-1.5));
        assert_eq!(decode_str("2e3]").unwrap().0.as_number(), Some(2000.0));
        assert_eq!(decode_str("0123").unwrap().0.as_number(), Some(123.0));

        assert!(decode_str("1e ").is_err());
        assert!(decode_str("1e+ ").is_err());
        assert!(decode_str(".5").is_err());
        assert!(decode_str("1x").is_err());
        assert!(decode_str("-").is_err());
    }

    #[test]
    fn test_decode_strings() {
        assert_eq!(decode_str("\"abc\"").unwrap().0.as_str(), Some("abc"));
        assert_eq!(decode_str("\"\"").unwrap().0.as_str(), Some(""));
        assert_eq!(
            decode_str(r#""a\"b\\c\/d\b\f\n\r\t""#).unwrap().0.as_str(),
            Some("a\"b\\c/d\u{8}\u{c}\n\r\t")
        );
        assert_eq!(decode_str(r#""€""#).unwrap().0.as_str(), Some("\u{20AC}"));

        // raw control byte
        assert!(decode(b"\"a\x01b\"").is_err());
        // 0x1E is the last rejected control byte, 0x1F is a valid string byte
        assert!(decode(b"\"a\x1Eb\"").is_err());
        assert_eq!(decode(b"\"a\x1Fb\"").unwrap().0.as_str(), Some("a\u{1F}b"));
        // invalid escape
        assert!(decode_str(r#""\x""#).is_err());
        // surrogate escape cannot be encoded
        assert!(decode_str(r#""\uD800""#).is_err());
        // broken UTF-8 payload
        assert!(decode(&[b'"', 0xC3, b'"']).is_err());
        assert!(decode_str("\"open").is_err());
    }

    #[test]
    fn test_decode_containers() {
        let (v, used) = decode_str("{}").unwrap();
        assert!(v.is_object() && v.is_empty());
        assert_eq!(used, 2);

        let (v, _) = decode_str("[]").unwrap();
        assert!(v.is_array() && v.is_empty());

        let (v, _) = decode_str(r#"{"a":1,"b":[true,1,{"x":false}]}"#).unwrap();
        assert_eq!(v.object_get("a").and_then(JsonValue::as_number), Some(1.0));
        let b = v.object_get("b").unwrap();
        assert_eq!(b.count(), 3);
        assert_eq!(
            b.array_get(2).and_then(|o| o.object_get("x")).and_then(JsonValue::as_bool),
            Some(false)
        );

        assert!(decode_str(r#"{"a":1,"a":2}"#).is_err());
        assert!(decode_str("[1,]").is_err());
        assert!(decode_str(r#"{"a" 1}"#).is_err());
        assert!(decode_str("[1 2]").is_err());
        assert!(decode_str("[1,2").is_err());
    }

    #[test]
    fn test_decode_reports_consumed_bytes() {
        let input = b" [1,2] tail";
        let (_, used) = decode(input).unwrap();
        assert_eq!(used, 6);
        assert_eq!(&input[used..], b" tail");
    }

    #[test]
    fn test_decode_into_reuse_and_mismatch() {
        let mut node = JsonValue::object();
        node.object_set("stale", JsonValue::Null).unwrap();
        let used = decode_into(&mut node, b"{\"fresh\":1}").unwrap();
        assert_eq!(used, 11);
        assert!(node.object_get("stale").is_none());
        assert_eq!(node.object_get("fresh").and_then(JsonValue::as_number), Some(1.0));

        let mut node = JsonValue::number(7.0);
        assert!(decode_into(&mut node, b"\"text\"").is_err());
        assert_eq!(node.as_number(), Some(7.0)); // untouched

        // any literal refills a literal node
        let mut node = JsonValue::Null;
        decode_into(&mut node, b"true").unwrap();
        assert_eq!(node.as_bool(), Some(true));
    }

    #[test]
    fn test_minimal_encoding_shape() {
        let (v, _) = decode_str(r#"{"key1":"value","key2":["string",null,false,true,5]}"#).unwrap();
        assert_eq!(minimal(&v), r#"{"key1":"value","key2":["string",null,false,true,5]}"#);
    }

    #[test]
    fn test_pretty_encoding_shape() {
        let (v, _) = decode_str(r#"{"key1":"value","key2":["string",null,false,true,5]}"#).unwrap();
        let expected = "{\n\t\"key1\":\"value\",\n\t\"key2\":\n\t[\n\t\t\"string\",\n\t\tnull,\n\t\tfalse,\n\t\ttrue,\n\t\t5\n\t]\n}";
        assert_eq!(pretty(&v), expected);
    }

    #[test]
    fn test_pretty_empty_containers_inline() {
        let (v, _) = decode_str(r#"{"a":{},"b":[]}"#).unwrap();
        assert_eq!(pretty(&v), "{\n\t\"a\":{},\n\t\"b\":[]\n}");
    }

    #[test]
    fn test_key_order() {
        let (v, _) = decode_str(r#"{"b":2,"a":1}"#).unwrap();

        let mut out = String::new();
        encode(&v, &StringifyConfig::minimal(), KeyOrder::Insertion, &mut out).unwrap();
        assert_eq!(out, r#"{"b":2,"a":1}"#);

        assert_eq!(minimal(&v), r#"{"a":1,"b":2}"#);

        let reverse = |a: &str, b: &str| b.cmp(a);
        let mut out = String::new();
        encode(&v, &StringifyConfig::minimal(), KeyOrder::Custom(&reverse), &mut out).unwrap();
        assert_eq!(out, r#"{"b":2,"a":1}"#);
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(minimal(&JsonValue::number(5.0)), "5");
        assert_eq!(minimal(&JsonValue::number(-3.0)), "-3");
        assert_eq!(minimal(&JsonValue::number(1.5)), "1.5");
        assert_eq!(minimal(&JsonValue::number(0.25)), "0.25");
        assert_eq!(minimal(&JsonValue::number(1e20)), "1e+20");
        assert_eq!(minimal(&JsonValue::number(1.25e-7)), "1.25e-07");

        let mut out = String::new();
        assert!(encode(
            &JsonValue::number(f64::NAN),
            &StringifyConfig::minimal(),
            KeyOrder::Ascending,
            &mut out
        )
        .is_err());
    }

    #[test]
    fn test_string_escaping_roundtrip() {
        let v = JsonValue::string("line\nbreak \"quoted\" back\\slash \u{1}");
        let text = minimal(&v);
        assert_eq!(text, "\"line\\nbreak \\\"quoted\\\" back\\\\slash \\u0001\"");
        let (back, _) = decode(text.as_bytes()).unwrap();
        assert!(back.matches(&v));
    }

    fn random_value(rng: &mut StdRng, depth: usize) -> JsonValue {
        let pick = if depth >= 3 { rng.gen_range(0..5) } else { rng.gen_range(0..7) };
        match pick {
            0 => JsonValue::Null,
            1 => JsonValue::True,
            2 => JsonValue::False,
            3 => JsonValue::number(f64::from(rng.gen_range(-1_000_000..1_000_000)) / 4.0),
            4 => {
                let len = rng.gen_range(0..12);
                let bytes = crate::utf8::random_utf8(rng, len);
                JsonValue::string(String::from_utf8(bytes).unwrap_or_default())
            },
            5 => {
                let mut array = JsonValue::array();
                for _ in 0..rng.gen_range(0..5) {
                    array.array_push(random_value(rng, depth + 1)).unwrap();
                }
                array
            },
            _ => {
                let mut object = JsonValue::object();
                for i in 0..rng.gen_range(0..5) {
                    let key = format!("k{}_{}", depth, i);
                    object.object_set(key, random_value(rng, depth + 1)).unwrap();
                }
                object
            },
        }
    }

    #[test]
    fn test_roundtrip_random_trees() {
        let mut rng = StdRng::seed_from_u64(1234);
        for _ in 0..100 {
            let value = random_value(&mut rng, 0);
            for config in [StringifyConfig::minimal(), StringifyConfig::default_pretty()] {
                let mut text = String::new();
                encode(&value, &config, KeyOrder::Ascending, &mut text).unwrap();
                let (back, used) = decode(text.as_bytes()).unwrap();
                assert_eq!(used, text.len());
                assert!(back.matches(&value), "roundtrip failed for {text}");
            }
        }
    }

    #[test]
    fn test_encode_length_equals_calculate() {
        let mut rng = StdRng::seed_from_u64(99);

        let custom = {
            let mut config = StringifyConfig::default_pretty();
            config.intro = ">>".to_string();
            config.outro = "<<\n".to_string();
            config.object.entry.indent = "    ".to_string();
            config.array.entry.indent = "  ".to_string();
            config
        };

        for _ in 0..100 {
            let value = random_value(&mut rng, 0);
            for config in
                [StringifyConfig::minimal(), StringifyConfig::default_pretty(), custom.clone()]
            {
                let mut text = String::new();
                let written = encode(&value, &config, KeyOrder::Ascending, &mut text).unwrap();
                assert_eq!(written, text.len());
                assert_eq!(
                    calculate(&value, &config).unwrap(),
                    written,
                    "calculate disagrees with encode for {text}"
                );
            }
        }
    }

    #[test]
    fn test_encoder_output_is_valid_json() {
        // Cross-check against an independent parser.
        let mut rng = StdRng::seed_from_u64(4321);
        for _ in 0..50 {
            let value = random_value(&mut rng, 0);
            for config in [StringifyConfig::minimal(), StringifyConfig::default_pretty()] {
                let mut text = String::new();
                encode(&value, &config, KeyOrder::Ascending, &mut text).unwrap();
                assert!(
                    serde_json::from_str::<serde_json::Value>(&text).is_ok(),
                    "reference parser rejected: {text}"
                );
            }
        }
    }

    #[test]
    fn test_display_is_minimal() {
        let (v, _) = decode_str(r#"{ "a" : [ 1 , 2 ] }"#).unwrap();
        assert_eq!(v.to_string(), r#"{"a":[1,2]}"#);
    }
}
