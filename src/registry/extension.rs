//! Extension fields.
//!
//! Inbound bodies may carry fields whose names start with
//! [`EXTENSION_MARKER`]. They are not part of the resource representation:
//! they are lifted out of the body before it is stored and written into the
//! metadata sidecar instead. Names found in the legacy rename table are
//! translated; any other marked name is kept with only the marker stripped,
//! so `@_origin` and `@origin` land in distinct metadata fields.

use crate::store::{Body, Metadata};
use std::collections::BTreeMap;

/// Leading character that marks a body field as an extension field.
pub const EXTENSION_MARKER: char = '@';

/// Extension fields extracted from one body, keyed by their metadata name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionFields {
    fields: Metadata,
}

impl ExtensionFields {
    /// Number of extracted fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if nothing was extracted.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look up an extracted field by metadata name.
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }

    /// Consume into a metadata map.
    pub fn into_metadata(self) -> Metadata {
        self.fields
    }
}

/// Splits extension fields out of bodies and renames them.
#[derive(Debug, Clone, Default)]
pub struct ExtensionExtractor {
    legacy_keys: BTreeMap<String, String>,
}

impl ExtensionExtractor {
    /// Create an extractor with the given legacy rename table.
    pub fn new(legacy_keys: BTreeMap<String, String>) -> Self {
        Self { legacy_keys }
    }

    /// Metadata name for a marked body field.
    pub fn metadata_name(&self, field: &str) -> String {
        match self.legacy_keys.get(field) {
            Some(renamed) => renamed.clone(),
            None => field
                .strip_prefix(EXTENSION_MARKER)
                .unwrap_or(field)
                .to_string(),
        }
    }

    /// Remove every marked field from `body` and return them.
    pub fn extract(&self, body: &mut Body) -> ExtensionFields {
        let marked: Vec<String> = body
            .keys()
            .filter(|name| name.starts_with(EXTENSION_MARKER))
            .cloned()
            .collect();

        let mut fields = Metadata::new();
        for name in marked {
            if let Some(value) = body.remove(&name) {
                fields.insert(self.metadata_name(&name), value);
            }
        }
        ExtensionFields { fields }
    }
}
