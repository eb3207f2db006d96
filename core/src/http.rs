//! HTTP-level data handed to a transport primitive.
//!
//! # Design
//! Headers and bodies are plain owned data. The executor builds them, the
//! primitive puts them on the wire. Header names are unique under ASCII
//! case-insensitive comparison, the same way HTTP treats them, but the
//! spelling of the first insertion is what gets sent.

use std::collections::BTreeMap;

use crate::payload::FormData;

/// Content type attached to every JSON request body.
pub const JSON_CONTENT_TYPE: &str = "application/json;charset=utf-8";

pub const CONTENT_TYPE: &str = "Content-Type";

/// Header name to value mapping with case-insensitive unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    // lowercased name -> (name as inserted, value)
    entries: BTreeMap<String, (String, String)>,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The set every transport starts from: JSON content type only.
    pub fn json_defaults() -> Self {
        let mut headers = HeaderSet::new();
        headers.insert(CONTENT_TYPE, JSON_CONTENT_TYPE);
        headers
    }

    /// Insert or replace a header. Replacing keeps the original spelling of the name.
    pub fn insert(&mut self, name: &str, value: &str) {
        let key = name.to_ascii_lowercase();
        match self.entries.get_mut(&key) {
            Some(entry) => entry.1 = value.to_string(),
            None => {
                self.entries
                    .insert(key, (name.to_string(), value.to_string()));
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries
            .remove(&name.to_ascii_lowercase())
            .map(|(_, value)| value)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

/// Request body as handed to `RequestPrimitive::send`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Serialized JSON text.
    Text(String),
    /// Multipart form. The primitive chooses the boundary and sets the
    /// matching content type itself.
    Form(FormData),
}
