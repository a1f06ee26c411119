//! Field and data directives.
//!
//! Templates use them as call blocks and functions:
//!
//! ```jinja
//! {% call fieldblock("name") %}Team{% endcall %}
//! {{ get_field("about", "name") }}
//! {{ link_to("about") }}
//!
//! {% call datasection("meta") %}
//!   {{ data("title", "Handbook") }}
//!   {{ data("authors", as_array("Ada")) }}
//! {% endcall %}
//! ```
//!
//! Block tags are not allowed inside a call body. A layout that wants a field
//! child templates can replace wraps the call in a block instead:
//!
//! ```jinja
//! {% block name %}{% call fieldblock("name") %}Untitled{% endcall %}{% endblock %}
//! ```
//!
//! Directives find the active [`RenderPass`] through the template state.
//! Typed failures are handed to [`RenderPass::fail`] so the engine can report
//! them with their template chain.

use minijinja::{Environment, Error, ErrorKind, HtmlEscape, State, Value, value::Kwargs};
use tracing::{debug, warn};
use webdoc_core::TemplateId;

use crate::{
    engine::{RenderPass, current_pass, request_render},
    error::RenderError,
    extension::{Extension, ExtensionError, Registrar},
    objects::{AsArray, EnumValue},
};

/// Registers `fieldblock`, `get_field` and `link_to`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldExtension;

impl Extension for FieldExtension {
    fn name(&self) -> &str {
        "fields"
    }

    fn register(&self, registrar: &mut Registrar<'_>) -> Result<(), ExtensionError> {
        registrar.add_global("fieldblock", Value::from_function(fieldblock))?;
        registrar.add_global("get_field", Value::from_function(get_field))?;
        registrar.add_global("link_to", Value::from_function(link_to))?;
        Ok(())
    }
}

/// Registers `datasection`, `data`, `as_array`, `enum_value` and `env_data`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataExtension;

impl Extension for DataExtension {
    fn name(&self) -> &str {
        "data"
    }

    fn register(&self, registrar: &mut Registrar<'_>) -> Result<(), ExtensionError> {
        registrar.add_global("datasection", Value::from_function(datasection))?;
        registrar.add_global("data", Value::from_function(data))?;
        registrar.add_global("as_array", Value::from_function(as_array))?;
        registrar.add_global("enum_value", Value::from_function(enum_value))?;
        registrar.add_global("env_data", Value::from_function(env_data))?;
        Ok(())
    }
}

fn outside_template() -> Error {
    Error::new(
        ErrorKind::InvalidOperation,
        "directive used outside of a rendering template",
    )
}

fn caller_of(kwargs: &Kwargs) -> Result<Value, Error> {
    let caller: Value = kwargs.get("caller")?;
    kwargs.assert_all_used()?;
    Ok(caller)
}

fn owner_id(pass: &RenderPass, template: &str) -> TemplateId {
    TemplateId::with_extension(template, pass.store().template_extension())
}

/// Text of `field` of `owner`, rendering `owner` first if it has no fields yet.
pub fn lookup_field(
    env: &Environment<'_>,
    pass: &RenderPass,
    owner: &TemplateId,
    field: &str,
) -> Result<String, RenderError> {
    let known = pass.with_fields(|fields| fields.contains_template(owner));
    if !known {
        debug!(template = %owner, field, "field lookup triggers render");
        request_render(env, pass, owner)?;
    }

    pass.with_fields(|fields| fields.get(owner, field).map(|text| text.trim().to_string()))
        .ok_or_else(|| RenderError::FieldNotFound {
            template: owner.clone(),
            field: field.to_string(),
        })
}

/// `{% call fieldblock(name) %}...{% endcall %}`
fn fieldblock(state: &State<'_, '_>, name: String, kwargs: Kwargs) -> Result<Value, Error> {
    let caller = caller_of(&kwargs)?;
    let pass = current_pass(state)?;
    let owner = pass.current_template().ok_or_else(outside_template)?;

    let body = caller.call(state, &[])?.to_string();
    if !pass.lock().fields.record(&owner, &name, body) {
        warn!(template = %owner, field = %name, "field already recorded, keeping first value");
    }
    Ok(Value::from(""))
}

/// `get_field(template, field)`
fn get_field(state: &State<'_, '_>, template: &str, field: &str) -> Result<Value, Error> {
    let pass = current_pass(state)?;
    let owner = owner_id(&pass, template);
    lookup_field(state.env(), &pass, &owner, field)
        .map(Value::from_safe_string)
        .map_err(|err| pass.fail(err))
}

/// `link_to(template, display=None)`
fn link_to(state: &State<'_, '_>, template: &str, display: Option<Value>) -> Result<Value, Error> {
    let pass = current_pass(state)?;
    let owner = owner_id(&pass, template);
    let href = pass.store().outbound_link_path(&owner);

    let display = match display {
        Some(value) if value.is_safe() => value.to_string(),
        Some(value) => HtmlEscape(&value.to_string()).to_string(),
        None => lookup_field(state.env(), &pass, &owner, "name").map_err(|err| pass.fail(err))?,
    };

    Ok(Value::from_safe_string(format!(
        "<a href=\"{href}\">{display}</a>"
    )))
}

/// `{% call datasection(name) %}...{% endcall %}`
fn datasection(state: &State<'_, '_>, name: String, kwargs: Kwargs) -> Result<Value, Error> {
    let caller = caller_of(&kwargs)?;
    let pass = current_pass(state)?;

    let previous = {
        let mut pass_state = pass.lock();
        let frame = pass_state.top_mut().ok_or_else(outside_template)?;
        let owner = frame.template.clone();
        let previous = frame.section.replace(name.clone());
        pass_state.objects.enter_section(&owner, &name);
        previous
    };

    let body = caller.call(state, &[]);

    if let Some(frame) = pass.lock().top_mut() {
        frame.section = previous;
    }
    body
}

/// `data(key, value)`
fn data(state: &State<'_, '_>, key: &str, value: Value) -> Result<Value, Error> {
    let pass = current_pass(state)?;

    let result = {
        let mut pass_state = pass.lock();
        let frame = pass_state.top().ok_or_else(outside_template)?;
        let owner = frame.template.clone();
        let section = frame.section.clone();
        pass_state
            .objects
            .insert(&owner, section.as_deref(), key, &value)
    };

    result.map_err(|err| pass.fail(err))?;
    Ok(Value::from(""))
}

/// `as_array(value)`
fn as_array(value: Value) -> Value {
    Value::from_object(AsArray(value))
}

/// `enum_value(name, value)`
fn enum_value(name: String, value: Value) -> Value {
    Value::from_object(EnumValue::new(name, value))
}

/// `env_data(section, key=None, default=none, template=none)`
///
/// Reads back from the object cache. Without `key` the whole section is
/// returned. `template` selects another page, rendering it first if needed.
fn env_data(
    state: &State<'_, '_>,
    section: &str,
    key: Option<&str>,
    kwargs: Kwargs,
) -> Result<Value, Error> {
    let default: Option<Value> = kwargs.get("default")?;
    let template: Option<String> = kwargs.get("template")?;
    kwargs.assert_all_used()?;

    let pass = current_pass(state)?;
    let owner = match template {
        Some(template) => {
            let owner = owner_id(&pass, &template);
            if !pass.is_rendered(&owner) && !pass.stack().contains(&owner) {
                request_render(state.env(), &pass, &owner).map_err(|err| pass.fail(err))?;
            }
            owner
        }
        None => pass.current_template().ok_or_else(outside_template)?,
    };

    let found = pass.with_objects(|objects| match key {
        Some(key) => objects.get(&owner, section, key).map(Value::from_serialize),
        None => objects.section(&owner, section).map(Value::from_serialize),
    });

    Ok(found.or(default).unwrap_or(Value::from(())))
}
