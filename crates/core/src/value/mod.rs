// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Minimalistic data representation for incrementally-arriving input.
//!
//! A second value type coexists with [`crate::json::JsonValue`]: same JSON
//! data model, but its parser ([`json::parse`]) accepts partial input and
//! reports how far it got, so callers feeding from a socket can append bytes
//! and retry. The two are deliberately not unified - the tree model's
//! decoder insists on a complete value.

pub mod json;

use crate::error::{Result, VoiceKitError};
use crate::json::parser::{format_number, push_escaped};
use indexmap::IndexMap;
use std::fmt;

/// A streaming-model value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    True,
    False,
    Number(f64),
    String(String),
    List(Vec<Value>),
    Object(IndexMap<String, Value>),
}

impl Value {
    pub fn string(text: impl Into<String>) -> Self {
        Self::String(text.into())
    }

    pub const fn number(value: f64) -> Self {
        Self::Number(value)
    }

    pub fn list() -> Self {
        Self::List(Vec::new())
    }

    pub fn object() -> Self {
        Self::Object(IndexMap::new())
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn is_true(&self) -> bool {
        matches!(self, Self::True)
    }

    pub const fn is_false(&self) -> bool {
        matches!(self, Self::False)
    }

    pub const fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    pub const fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// There is no `is_string` - ask for the payload and check for `None`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Number of values directly contained within `self`.
    pub fn count(&self) -> usize {
        match self {
            Self::List(items) => items.len(),
            Self::Object(entries) => entries.len(),
            _ => 0,
        }
    }

    pub fn list_push(&mut self, value: Self) -> Result<()> {
        match self {
            Self::List(items) => {
                items.push(value);
                Ok(())
            },
            _ => Err(VoiceKitError::StateMismatch("list_push on non-list".to_string())),
        }
    }

    pub fn list_get(&self, index: usize) -> Option<&Self> {
        match self {
            Self::List(items) => items.get(index),
            _ => None,
        }
    }

    /// Sets `key` on an object, returning any replaced member.
    pub fn object_set(&mut self, key: impl Into<String>, value: Self) -> Result<Option<Self>> {
        match self {
            Self::Object(entries) => Ok(entries.insert(key.into(), value)),
            _ => Err(VoiceKitError::StateMismatch("object_set on non-object".to_string())),
        }
    }

    /// Retrieves a member; `key` may be a `/`-separated path into nested
    /// objects (`"tier1/str"`, `"/tier1/str"`).
    pub fn object_get(&self, key: &str) -> Option<&Self> {
        if !self.is_object() {
            return None;
        }
        let mut current = self;
        for segment in key.split('/').filter(|s| !s.is_empty()) {
            current = match current {
                Self::Object(entries) => entries.get(segment)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Calls `visitor` on the contained values: per-member with its key for
    /// objects, per-item with `None` for lists, once with `None` for atoms.
    /// The visitor returns `false` to abort.
    pub fn for_each<F>(&self, mut visitor: F) -> bool
    where
        F: FnMut(Option<&str>, &Self) -> bool,
    {
        match self {
            Self::Object(entries) => {
                for (key, value) in entries {
                    if !visitor(Some(key), value) {
                        return false;
                    }
                }
                true
            },
            Self::List(items) => {
                for value in items {
                    if !visitor(None, value) {
                        return false;
                    }
                }
                true
            },
            other => visitor(None, other),
        }
    }

    /// Structural equality; object member order is irrelevant.
    pub fn matches(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null)
            | (Self::True, Self::True)
            | (Self::False, Self::False) => true,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.matches(y))
            },
            (Self::Object(a), Self::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, value)| {
                        b.get(key).is_some_and(|other| value.matches(other))
                    })
            },
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

impl fmt::Display for Value {
    /// Minimal JSON rendition.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::True => f.write_str("true"),
            Self::False => f.write_str("false"),
            Self::Number(n) => f.write_str(&format_number(*n).map_err(|_| fmt::Error)?),
            Self::String(s) => {
                let mut buf = String::with_capacity(s.len() + 2);
                buf.push('"');
                push_escaped(&mut buf, s);
                buf.push('"');
                f.write_str(&buf)
            },
            Self::List(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            },
            Self::Object(entries) => {
                f.write_str("{")?;
                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    let mut buf = String::with_capacity(key.len() + 2);
                    push_escaped(&mut buf, key);
                    write!(f, "\"{buf}\":{value}")?;
                }
                f.write_str("}")
            },
        }
    }
}
