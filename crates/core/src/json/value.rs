// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The JSON value tree.
//!
//! An owned tagged tree: every node has exactly one owner, freeing a parent
//! frees all descendants, and detaching a child is a move. Object members
//! keep insertion order (emit-time ordering is the encoder's concern, see
//! [`super::parser`]) and keys are unique within one object.

use crate::error::{Result, VoiceKitError};
use indexmap::IndexMap;

/// Variant discriminator for [`JsonValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonKind {
    Null,
    True,
    False,
    Number,
    String,
    Array,
    Object,
}

impl JsonKind {
    /// Literals (`null`, `true`, `false`) form one reuse class: a literal
    /// node can be refilled with any literal.
    pub const fn is_literal(self) -> bool {
        matches!(self, Self::Null | Self::True | Self::False)
    }

    /// Two kinds are reuse-compatible when a node of one can be cleared and
    /// refilled as the other.
    pub const fn same_class(self, other: Self) -> bool {
        if self.is_literal() {
            other.is_literal()
        } else {
            self as usize == other as usize
        }
    }
}

/// A JSON node.
#[derive(Debug, Clone)]
pub enum JsonValue {
    Null,
    True,
    False,
    Number(f64),
    String(String),
    Array(Vec<JsonValue>),
    Object(IndexMap<String, JsonValue>),
}

impl Default for JsonValue {
    fn default() -> Self {
        Self::Null
    }
}

impl JsonValue {
    /// Creates an empty object node.
    pub fn object() -> Self {
        Self::Object(IndexMap::new())
    }

    /// Creates an empty array node.
    pub fn array() -> Self {
        Self::Array(Vec::new())
    }

    /// Creates a string node.
    pub fn string(text: impl Into<String>) -> Self {
        Self::String(text.into())
    }

    /// Creates a number node.
    pub const fn number(value: f64) -> Self {
        Self::Number(value)
    }

    /// Creates a boolean literal node.
    pub const fn boolean(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }

    pub const fn kind(&self) -> JsonKind {
        match self {
            Self::Null => JsonKind::Null,
            Self::True => JsonKind::True,
            Self::False => JsonKind::False,
            Self::Number(_) => JsonKind::Number,
            Self::String(_) => JsonKind::String,
            Self::Array(_) => JsonKind::Array,
            Self::Object(_) => JsonKind::Object,
        }
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn is_true(&self) -> bool {
        matches!(self, Self::True)
    }

    pub const fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    pub const fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    pub const fn is_number(&self) -> bool {
        matches!(self, Self::Number(_))
    }

    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    /// Number payload, or `None` for other variants.
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// String payload, or `None` for other variants.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Boolean payload for the `true`/`false` literals.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::True => Some(true),
            Self::False => Some(false),
            _ => None,
        }
    }

    /// Resets the node in place: containers empty, strings empty, numbers
    /// zero, literals become `null`.
    pub fn clear(&mut self) {
        match self {
            Self::Null | Self::True | Self::False => *self = Self::Null,
            Self::Number(n) => *n = 0.0,
            Self::String(s) => s.clear(),
            Self::Array(items) => items.clear(),
            Self::Object(entries) => entries.clear(),
        }
    }

    /// Deep-copies `self` into an existing node of a matching variant class.
    ///
    /// A mismatching target is left untouched.
    pub fn copy_to(&self, dest: &mut Self) -> Result<()> {
        if !self.kind().same_class(dest.kind()) {
            return Err(VoiceKitError::StateMismatch(format!(
                "cannot copy {:?} into {:?}",
                self.kind(),
                dest.kind()
            )));
        }
        *dest = self.clone();
        Ok(())
    }

    /// Number of direct children (container variants) - zero for leaves.
    pub fn count(&self) -> usize {
        match self {
            Self::Array(items) => items.len(),
            Self::Object(entries) => entries.len(),
            _ => 0,
        }
    }

    /// True for leaves, and for containers without children.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Sets `key` on an object node, transferring ownership of `value`.
    /// An existing member under the same key is replaced and returned.
    pub fn object_set(&mut self, key: impl Into<String>, value: Self) -> Result<Option<Self>> {
        match self {
            Self::Object(entries) => Ok(entries.insert(key.into(), value)),
            _ => Err(VoiceKitError::StateMismatch(format!(
                "object_set on {:?}",
                self.kind()
            ))),
        }
    }

    pub fn object_get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Object(entries) => entries.get(key),
            _ => None,
        }
    }

    pub fn object_get_mut(&mut self, key: &str) -> Option<&mut Self> {
        match self {
            Self::Object(entries) => entries.get_mut(key),
            _ => None,
        }
    }

    /// Detaches and returns the member under `key`, if any.
    pub fn object_remove(&mut self, key: &str) -> Option<Self> {
        match self {
            Self::Object(entries) => entries.shift_remove(key),
            _ => None,
        }
    }

    /// Appends `value` to an array node.
    pub fn array_push(&mut self, value: Self) -> Result<()> {
        match self {
            Self::Array(items) => {
                items.push(value);
                Ok(())
            },
            _ => Err(VoiceKitError::StateMismatch(format!(
                "array_push on {:?}",
                self.kind()
            ))),
        }
    }

    pub fn array_get(&self, index: usize) -> Option<&Self> {
        match self {
            Self::Array(items) => items.get(index),
            _ => None,
        }
    }

    pub fn array_get_mut(&mut self, index: usize) -> Option<&mut Self> {
        match self {
            Self::Array(items) => items.get_mut(index),
            _ => None,
        }
    }

    /// Visits every member of an object with `(key, value)`.
    /// The visitor returns `false` to abort; the return value reports
    /// whether the traversal ran to completion.
    pub fn for_each_entry<'a, F>(&'a self, mut visitor: F) -> bool
    where
        F: FnMut(&'a str, &'a Self) -> bool,
    {
        match self {
            Self::Object(entries) => {
                for (key, value) in entries {
                    if !visitor(key, value) {
                        return false;
                    }
                }
                true
            },
            _ => false,
        }
    }

    /// Visits every item of an array with `(index, value)`.
    pub fn for_each_item<F>(&self, mut visitor: F) -> bool
    where
        F: FnMut(usize, &Self) -> bool,
    {
        match self {
            Self::Array(items) => {
                for (index, value) in items.iter().enumerate() {
                    if !visitor(index, value) {
                        return false;
                    }
                }
                true
            },
            _ => false,
        }
    }

    /// Structural equality: object member order is irrelevant, everything
    /// else (including number payloads) must match exactly.
    pub fn matches(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null)
            | (Self::True, Self::True)
            | (Self::False, Self::False) => true,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => {
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

impl PartialEq for JsonValue {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}
