//! Object cache and structured values.
//!
//! Data directives record typed values under a template, a named data section
//! and a key. Values are captured as JSON when written so the cache can be
//! exported without the template engine.
//!
//! Values that want a specific JSON shape implement [`Structured`]: they name
//! their type and list their fields, and are exported as
//! `{"type": <name>, <field>: <value>, ...}`.

use std::{collections::BTreeMap, sync::Arc};

use minijinja::{
    Value,
    value::{Enumerator, Object, ObjectRepr, ValueKind},
};
use serde::Serialize;
use serde_json::Value as JsonValue;
use webdoc_core::TemplateId;

use crate::error::{RenderError, Result};

/// Keys recorded inside one data section.
pub type SectionData = BTreeMap<String, JsonValue>;

/// Sections recorded for one template.
pub type TemplateSections = BTreeMap<String, SectionData>;

/// Three-level map: template -> section -> key -> value.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ObjectCache {
    objects: BTreeMap<TemplateId, TemplateSections>,
}

impl ObjectCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `section` of `owner`.
    ///
    /// An unseen section starts empty. Re-entering a section keeps its keys, so
    /// several section blocks contribute to one logical object.
    pub fn enter_section(&mut self, owner: &TemplateId, section: &str) {
        self.objects
            .entry(owner.clone())
            .or_default()
            .entry(section.to_string())
            .or_default();
    }

    /// Store `value` under `key` in an entered section.
    ///
    /// Fails with [`RenderError::NoActiveSection`] when no section is given and
    /// [`RenderError::UndefinedValue`] when the value is undefined or holds an
    /// undefined value anywhere inside it; nothing is stored in either case.
    pub fn insert(
        &mut self,
        owner: &TemplateId,
        section: Option<&str>,
        key: &str,
        value: &Value,
    ) -> Result<()> {
        let Some(section) = section else {
            return Err(RenderError::NoActiveSection {
                key: key.to_string(),
            });
        };

        if contains_undefined(value) {
            return Err(RenderError::UndefinedValue {
                section: section.to_string(),
                key: key.to_string(),
            });
        }

        let json = to_json(value)?;
        self.objects
            .entry(owner.clone())
            .or_default()
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), json);
        Ok(())
    }

    /// Read back a whole section.
    #[must_use]
    pub fn section(&self, owner: &TemplateId, section: &str) -> Option<&SectionData> {
        self.objects.get(owner).and_then(|sections| sections.get(section))
    }

    /// Read back one key.
    #[must_use]
    pub fn get(&self, owner: &TemplateId, section: &str, key: &str) -> Option<&JsonValue> {
        self.section(owner, section).and_then(|data| data.get(key))
    }

    /// Iterate templates in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&TemplateId, &TemplateSections)> {
        self.objects.iter()
    }

    /// Number of templates with at least one section.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Total number of stored keys.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.objects
            .values()
            .flat_map(BTreeMap::values)
            .map(BTreeMap::len)
            .sum()
    }
}

/// Whether `value` is undefined or nests an undefined item, map value or
/// structured field.
fn contains_undefined(value: &Value) -> bool {
    if value.is_undefined() {
        return true;
    }
    if let Some(wrapped) = value.downcast_object_ref::<AsArray>() {
        return contains_undefined(&wrapped.0);
    }

    match value.kind() {
        ValueKind::Seq => value
            .try_iter()
            .is_ok_and(|mut items| items.any(|item| contains_undefined(&item))),
        ValueKind::Map => value.try_iter().is_ok_and(|mut keys| {
            keys.any(|key| {
                value
                    .get_item(&key)
                    .map_or(true, |item| contains_undefined(&item))
            })
        }),
        _ => false,
    }
}

/// Convert a template value to JSON, unwrapping [`AsArray`].
fn to_json(value: &Value) -> Result<JsonValue> {
    if let Some(wrapped) = value.downcast_object_ref::<AsArray>() {
        return Ok(JsonValue::Array(vec![to_json(&wrapped.0)?]));
    }

    serde_json::to_value(value).map_err(|err| {
        RenderError::Evaluation(
            minijinja::Error::new(
                minijinja::ErrorKind::BadSerialization,
                "value cannot be exported as JSON",
            )
            .with_source(err),
        )
    })
}

/// A value that produces its own structured representation.
pub trait Structured: std::fmt::Debug + Send + Sync {
    /// Type tag written to the `type` key.
    fn type_name(&self) -> &str;

    /// Field values, in export order.
    fn fields(&self) -> Vec<(String, Value)>;

    /// Value of a single field.
    fn field(&self, name: &str) -> Option<Value> {
        self.fields()
            .into_iter()
            .find_map(|(key, value)| (key == name).then_some(value))
    }
}

/// Map view of a [`Structured`] value: `type` first, then its fields.
fn structured_get(value: &dyn Structured, key: &Value) -> Option<Value> {
    match key.as_str()? {
        "type" => Some(Value::from(value.type_name())),
        name => value.field(name),
    }
}

fn structured_keys(value: &dyn Structured) -> Enumerator {
    let mut keys = vec![Value::from("type")];
    keys.extend(value.fields().into_iter().map(|(key, _)| Value::from(key)));
    Enumerator::Values(keys)
}

/// A named record built from a registered record type.
#[derive(Debug, Clone)]
pub struct Record {
    type_name: Arc<str>,
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Create a record of `type_name` with the given fields.
    pub fn new(type_name: impl Into<Arc<str>>, fields: Vec<(String, Value)>) -> Self {
        Self {
            type_name: type_name.into(),
            fields,
        }
    }
}

impl Structured for Record {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn fields(&self) -> Vec<(String, Value)> {
        self.fields.clone()
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.fields
            .iter()
            .find_map(|(key, value)| (key == name).then(|| value.clone()))
    }
}

impl Object for Record {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Map
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        structured_get(self.as_ref(), key)
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        structured_keys(self.as_ref())
    }
}

/// An enumeration member, exported as `{"type": "enum", "name", "value"}`.
#[derive(Debug, Clone)]
pub struct EnumValue {
    name: String,
    value: Value,
}

impl EnumValue {
    /// Create an enum member.
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl Structured for EnumValue {
    fn type_name(&self) -> &str {
        "enum"
    }

    fn fields(&self) -> Vec<(String, Value)> {
        vec![
            ("name".to_string(), Value::from(self.name.as_str())),
            ("value".to_string(), self.value.clone()),
        ]
    }
}

impl Object for EnumValue {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Map
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        structured_get(self.as_ref(), key)
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        structured_keys(self.as_ref())
    }
}

/// Marks a value that must be exported as a one-element list.
///
/// Keeps the schema of a key uniform for consumers that always expect a list,
/// even while only one item exists.
#[derive(Debug, Clone)]
pub struct AsArray(pub Value);

impl Object for AsArray {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Seq
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        (key.as_usize()? == 0).then(|| self.0.clone())
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Seq(1)
    }
}
