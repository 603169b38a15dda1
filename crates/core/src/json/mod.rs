// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Self-contained JSON model: value tree, parser/encoder, RFC 6901 pointer.

pub mod parser;
pub mod pointer;
pub mod value;

pub use parser::{calculate, decode, decode_into, encode, KeyOrder, StringifyConfig};
pub use pointer::{get, get_mut};
pub use value::{JsonKind, JsonValue};

use crate::error::{Result, VoiceKitError};
use std::path::Path;

/// Decodes a complete JSON document; trailing whitespace is tolerated,
/// anything else after the value is an error.
pub fn decode_str(input: &str) -> Result<JsonValue> {
    let (value, used) = parser::decode(input.as_bytes())?;
    if input.as_bytes()[used..].iter().any(|b| !matches!(b, 0x20 | 0x09 | 0x0A | 0x0D)) {
        return Err(VoiceKitError::MalformedInput(format!(
            "trailing garbage after byte {used}"
        )));
    }
    Ok(value)
}

/// Canonical minimal stringification (no whitespace, keys byte-ascending).
pub fn encode_minimal(value: &JsonValue) -> Result<String> {
    let mut out = String::new();
    parser::encode(value, &StringifyConfig::minimal(), KeyOrder::Ascending, &mut out)?;
    Ok(out)
}

/// Canonical pretty stringification (tabs and newlines, keys byte-ascending).
pub fn encode_pretty(value: &JsonValue) -> Result<String> {
    let mut out = String::new();
    parser::encode(value, &StringifyConfig::default_pretty(), KeyOrder::Ascending, &mut out)?;
    Ok(out)
}

/// Reads and decodes a JSON file.
pub fn read_file(path: impl AsRef<Path>) -> Result<JsonValue> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "could not read JSON file");
        e
    })?;
    let text = String::from_utf8(bytes).map_err(|_| {
        VoiceKitError::MalformedInput(format!("{} is not UTF-8", path.display()))
    })?;
    decode_str(&text)
}

/// Pretty-encodes `value` into a file, newline-terminated.
pub fn write_file(path: impl AsRef<Path>, value: &JsonValue) -> Result<()> {
    let mut text = encode_pretty(value)?;
    text.push('\n');
    std::fs::write(path.as_ref(), text)?;
    Ok(())
}

/// Reads every JSON file in `dir` into one object keyed by file name.
///
/// With `extension = Some("json")` only matching files are read; with `None`
/// every regular file is attempted. Unparsable files are logged and skipped.
pub fn read_dir(dir: impl AsRef<Path>, extension: Option<&str>) -> Result<JsonValue> {
    let dir = dir.as_ref();
    let mut out = JsonValue::object();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let path = entry.path();
        if let Some(wanted) = extension {
            if path.extension().and_then(|e| e.to_str()) != Some(wanted) {
                continue;
            }
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        match read_file(&path) {
            Ok(content) => {
                out.object_set(name, content)?;
            },
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "skipping file");
            },
        }
    }

    Ok(out)
}
