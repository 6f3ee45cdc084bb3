//! Module properties collected while walking containers.
//!
//! Each nesting level contributes a set of properties; when a module is found the
//! levels are merged with the innermost value winning.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Well-known property names.
pub mod keys {
    /// Id of the plugin that produced the module.
    pub const TYPE: &str = "Type";
    /// Chain of container plugin ids, outermost first, joined with `>`.
    pub const CONTAINER: &str = "Container";
    /// Location of the module inside the opened file.
    pub const SUBPATH: &str = "Subpath";
    /// File name of the opened file.
    pub const FILENAME: &str = "Filename";
    /// Extension of the opened file, without the dot.
    pub const EXTENSION: &str = "Extension";
    /// Path of the opened file.
    pub const PATH: &str = "Path";
    /// Path of the opened file plus the subpath.
    pub const FULLPATH: &str = "Fullpath";
    /// CRC-32 of the whole module data.
    pub const CRC: &str = "CRC";
    /// CRC-32 of the part that identifies the tune regardless of packaging.
    pub const FIXED_CRC: &str = "FixedCRC";
    /// Module size in bytes.
    pub const SIZE: &str = "Size";
    /// Song title.
    pub const TITLE: &str = "Title";
    /// Author or composer.
    pub const AUTHOR: &str = "Author";
    /// Free-form comment.
    pub const COMMENT: &str = "Comment";
    /// Release year or date.
    pub const DATE: &str = "Date";
    /// Tracker or player program that produced the module.
    pub const PROGRAM: &str = "Program";
    /// Number of frames, when known.
    pub const FRAMES: &str = "Frames";
    /// 1-based track a multitrack module starts with, when not the first.
    pub const DEFAULT_TRACK: &str = "DefaultTrack";
    /// Separator used for [`CONTAINER`] chains.
    pub const CONTAINER_DELIMITER: char = '>';
}

/// A single property value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Integer property such as `Size` or `CRC`.
    Integer(i64),
    /// Text property.
    String(String),
}

impl PropertyValue {
    /// Integer content, if this is an integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(value) => Some(*value),
            PropertyValue::String(_) => None,
        }
    }

    /// Text content, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(value) => Some(value),
            PropertyValue::Integer(_) => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Integer(value) => write!(f, "{value}"),
            PropertyValue::String(value) => f.write_str(value),
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        PropertyValue::Integer(i64::from(value))
    }
}

impl From<usize> for PropertyValue {
    fn from(value: usize) -> Self {
        PropertyValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

/// Named property set, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, PropertyValue>);

impl Properties {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name`, replacing any previous value.
    pub fn set(&mut self, name: &str, value: impl Into<PropertyValue>) {
        self.0.insert(name.to_string(), value.into());
    }

    /// Set a text property unless `value` is empty.
    pub fn set_non_empty(&mut self, name: &str, value: &str) {
        if !value.is_empty() {
            self.set(name, value);
        }
    }

    /// Value of `name`.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.0.get(name)
    }

    /// Text value of `name`.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropertyValue::as_str)
    }

    /// Integer value of `name`.
    pub fn get_integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(PropertyValue::as_integer)
    }

    /// Whether `name` is set.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Copy every property of `inner` over this set; values from `inner` win.
    pub fn overlay(&mut self, inner: &Properties) {
        for (name, value) in &inner.0 {
            self.0.insert(name.clone(), value.clone());
        }
    }

    /// Append `id` to the `Container` chain.
    pub fn push_container(&mut self, id: &str) {
        let chain = match self.get_str(keys::CONTAINER) {
            Some(chain) if !chain.is_empty() => {
                format!("{chain}{}{id}", keys::CONTAINER_DELIMITER)
            }
            _ => id.to_string(),
        };
        self.set(keys::CONTAINER, chain);
    }

    /// Iterate in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no property is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
