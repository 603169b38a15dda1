// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! RFC 6901 JSON Pointer traversal.
//!
//! Reference tokens are split on `/`; within a token `~1` unescapes to `/`
//! and `~0` to `~`, applied in that order. Array tokens are decimal indices
//! (leading zeros permitted). The pseudo-token `-` appends a new `null`
//! child to an array and returns it - mutable traversal only.

use crate::json::value::JsonValue;

fn unescape_token(token: &str) -> String {
    // ~1 first, then ~0 - the reverse order would turn "~01" into "/".
    token.replace("~1", "/").replace("~0", "~")
}

fn tokens(pointer: &str) -> Option<impl Iterator<Item = String> + '_> {
    if !pointer.starts_with('/') {
        return None;
    }
    Some(pointer[1..].split('/').map(unescape_token))
}

fn array_index(token: &str) -> Option<usize> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

/// Resolves `pointer` against `root`, read-only.
///
/// The empty pointer returns the root. A pointer of just `"/"` carries the
/// empty reference token, i.e. it looks up the key `""` - absent in any
/// ordinary document, so the result is `None`. The `-` array pseudo-token
/// requires mutation and always fails here; use [`get_mut`].
pub fn get<'a>(root: &'a JsonValue, pointer: &str) -> Option<&'a JsonValue> {
    if pointer.is_empty() {
        return Some(root);
    }

    tokens(pointer)?.try_fold(root, |current, token| match current {
        JsonValue::Object(entries) => entries.get(&token),
        JsonValue::Array(items) => items.get(array_index(&token)?),
        _ => None,
    })
}

/// Resolves `pointer` against `root` for mutation.
///
/// Behaves like [`get`], and additionally supports the `-` pseudo-token on
/// arrays: a new `null` child is appended and returned.
pub fn get_mut<'a>(root: &'a mut JsonValue, pointer: &str) -> Option<&'a mut JsonValue> {
    if pointer.is_empty() {
        return Some(root);
    }

    tokens(pointer)?.try_fold(root, |current, token| match current {
        JsonValue::Object(entries) => entries.get_mut(&token),
        JsonValue::Array(items) => {
            if token == "-" {
                items.push(JsonValue::Null);
                items.last_mut()
            } else {
                items.get_mut(array_index(&token)?)
            }
        },
        _ => None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::json::parser::decode;

    fn doc() -> JsonValue {
        decode(br#"{"a":1,"b":[true,1,{"x":false}],"a/b":2,"m~n":3,"":4}"#).unwrap().0
    }

    #[test]
    fn test_empty_pointer_is_root() {
        let root = doc();
        assert!(get(&root, "").unwrap().matches(&root));
    }

    #[test]
    fn test_plain_keys_and_indices() {
        let root = doc();
        assert_eq!(get(&root, "/a").and_then(JsonValue::as_number), Some(1.0));
        assert_eq!(get(&root, "/b/0").and_then(JsonValue::as_bool), Some(true));
        assert_eq!(get(&root, "/b/2/x").and_then(JsonValue::as_bool), Some(false));
        // leading zeros are permitted
        assert_eq!(get(&root, "/b/01").and_then(JsonValue::as_number), Some(1.0));
    }

    #[test]
    fn test_escaped_tokens() {
        let root = doc();
        assert_eq!(get(&root, "/a~1b").and_then(JsonValue::as_number), Some(2.0));
        assert_eq!(get(&root, "/m~0n").and_then(JsonValue::as_number), Some(3.0));
    }

    #[test]
    fn test_slash_only_addresses_empty_key() {
        let root = doc();
        // "" IS a member of this document, but the canonical quirk is that
        // "/" resolves the empty token - most documents have no "" key.
        assert_eq!(get(&root, "/").and_then(JsonValue::as_number), Some(4.0));

        let (plain, _) = decode(br#"{"a":1}"#).unwrap();
        assert!(get(&plain, "/").is_none());
    }

    #[test]
    fn test_missing_paths() {
        let root = doc();
        assert!(get(&root, "/zzz").is_none());
        assert!(get(&root, "/b/9").is_none());
        assert!(get(&root, "/a/deeper").is_none()); // traversal into a number
        assert!(get(&root, "no-slash").is_none());
        assert!(get(&root, "/b/-3").is_none());
    }

    #[test]
    fn test_dash_appends_null() {
        let mut root = decode(br#"{"array":[1,2,3]}"#).unwrap().0;

        // read-only traversal must not mutate
        assert!(get(&root, "/array/-").is_none());
        assert_eq!(get(&root, "/array").unwrap().count(), 3);

        let appended = get_mut(&mut root, "/array/-").unwrap();
        assert!(appended.is_null());
        assert_eq!(get(&root, "/array").unwrap().count(), 4);
        assert!(get(&root, "/array/3").unwrap().is_null());
    }

    #[test]
    fn test_get_mut_allows_in_place_edit() {
        let mut root = doc();
        *get_mut(&mut root, "/b/2/x").unwrap() = JsonValue::True;
        assert_eq!(get(&root, "/b/2/x").and_then(JsonValue::as_bool), Some(true));
    }
}
