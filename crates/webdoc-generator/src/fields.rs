//! Field cache.
//!
//! Rendered fragments keyed by template and field name. A field is written
//! once per pass: the first render wins and later writes are ignored, so a
//! template re-entered through a field lookup never clobbers what it already
//! produced.

use std::collections::BTreeMap;

use serde::Serialize;
use webdoc_core::TemplateId;

/// Fields recorded for one template.
pub type TemplateFields = BTreeMap<String, String>;

/// Two-level map: template -> field name -> rendered text.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct FieldCache {
    fields: BTreeMap<TemplateId, TemplateFields>,
}

impl FieldCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `text` as `field` of `owner`.
    ///
    /// Returns `false` and keeps the existing value if the field was already set.
    pub fn record(&mut self, owner: &TemplateId, field: &str, text: impl Into<String>) -> bool {
        let fields = self.fields.entry(owner.clone()).or_default();
        if fields.contains_key(field) {
            return false;
        }
        fields.insert(field.to_string(), text.into());
        true
    }

    /// Raw field text, untrimmed.
    #[must_use]
    pub fn get(&self, owner: &TemplateId, field: &str) -> Option<&str> {
        self.fields
            .get(owner)
            .and_then(|fields| fields.get(field))
            .map(String::as_str)
    }

    /// Whether any field of `owner` has been recorded.
    #[must_use]
    pub fn contains_template(&self, owner: &TemplateId) -> bool {
        self.fields.contains_key(owner)
    }

    /// Iterate templates in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&TemplateId, &TemplateFields)> {
        self.fields.iter()
    }

    /// Number of templates with at least one field.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Total number of recorded fields.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.values().map(BTreeMap::len).sum()
    }
}
