//! Template helper functions.
//!
//! Markup shortcuts for assets and links, plus a small per-pass scratch
//! stack that templates use to hand values to the layouts they extend.

use minijinja::{Error, ErrorKind, State, Value, value::Kwargs};
use webdoc_core::TemplateId;

use crate::{
    engine::current_pass,
    extension::{Extension, ExtensionError, Registrar},
};

/// Registers the asset, link and context-data helpers.
#[derive(Debug, Clone, Copy, Default)]
pub struct HelperExtension;

impl Extension for HelperExtension {
    fn name(&self) -> &str {
        "helpers"
    }

    fn register(&self, registrar: &mut Registrar<'_>) -> Result<(), ExtensionError> {
        let paths = registrar.config().paths.clone();
        let render = registrar.config().render.clone();

        registrar.add_global("style_dir", paths.style.clone())?;
        registrar.add_global("script_dir", paths.scripts.clone())?;
        registrar.add_global("image_dir", paths.images.clone())?;
        registrar.add_global("document_dir", paths.document.clone())?;

        let style_dir = paths.style.clone();
        registrar.add_global(
            "style",
            Value::from_function(move |path: &str| style_tag(&style_dir, path)),
        )?;

        let script_dir = paths.scripts.clone();
        registrar.add_global(
            "script",
            Value::from_function(move |path: &str, kwargs: Kwargs| {
                let kind: Option<String> = kwargs.get("type")?;
                let defer: Option<bool> = kwargs.get("defer")?;
                kwargs.assert_all_used()?;
                Ok::<_, Error>(script_tag(
                    &script_dir,
                    path,
                    kind.as_deref().unwrap_or("module"),
                    defer.unwrap_or(false),
                ))
            }),
        )?;

        let document_dir = paths.document.clone();
        let output_extension = render.output_extension.clone();
        registrar.add_global(
            "link",
            Value::from_function(move |location: &str, text: Value, kwargs: Kwargs| {
                let class: Option<String> = kwargs.get("class")?;
                kwargs.assert_all_used()?;
                Ok::<_, Error>(link_tag(
                    &document_dir,
                    &output_extension,
                    location,
                    &text.to_string(),
                    class.as_deref().unwrap_or(""),
                ))
            }),
        )?;

        let template_extension = render.template_extension.clone();
        registrar.add_global(
            "template_name",
            Value::from_function(move |id: &str, base_only: Option<bool>| {
                let id = TemplateId::new(id);
                if base_only.unwrap_or(false) {
                    id.base_name(&template_extension).to_string()
                } else {
                    id.name(&template_extension).to_string()
                }
            }),
        )?;

        registrar.add_global("markup", Value::from_function(markup))?;
        registrar.add_global("current_template", Value::from_function(current_template))?;
        registrar.add_global("push_context_data", Value::from_function(push_context_data))?;
        registrar.add_global("set_context_data", Value::from_function(set_context_data))?;
        registrar.add_global("get_context_data", Value::from_function(get_context_data))?;
        registrar.add_global("pop_context_data", Value::from_function(pop_context_data))?;
        Ok(())
    }
}

/// Split `@module/rest` into its parts.
fn module_path(path: &str) -> Option<(&str, &str)> {
    path.strip_prefix('@')?.split_once('/')
}

fn asset_href(dir: &str, path: &str) -> String {
    match module_path(path) {
        Some((module, rest)) => format!("/@{module}/{dir}/{rest}"),
        None => format!("/{dir}/{}", path.trim_start_matches('/')),
    }
}

fn style_tag(dir: &str, path: &str) -> Value {
    Value::from_safe_string(format!(
        "<link rel=\"stylesheet\" type=\"text/css\" href=\"{}\">",
        asset_href(dir, path)
    ))
}

fn script_tag(dir: &str, path: &str, kind: &str, defer: bool) -> Value {
    let defer = if defer { " defer" } else { "" };
    Value::from_safe_string(format!(
        "<script src=\"{}\" type=\"{kind}\"{defer}></script>",
        asset_href(dir, path)
    ))
}

fn link_tag(document_dir: &str, extension: &str, location: &str, text: &str, class: &str) -> Value {
    let location = location.trim_start_matches('/');
    let href = if location.ends_with(extension) {
        format!("/{document_dir}/{location}")
    } else {
        format!("/{document_dir}/{location}{extension}")
    };
    Value::from_safe_string(format!("<a href=\"{href}\" class=\"{class}\">{text}</a>"))
}

/// `markup(value)`: marks a value's text as safe.
fn markup(value: Value) -> Value {
    Value::from_safe_string(value.to_string())
}

/// `current_template()`
fn current_template(state: &State<'_, '_>) -> Result<Value, Error> {
    let pass = current_pass(state)?;
    pass.current_template()
        .map(|id| Value::from(id.as_str()))
        .ok_or_else(|| Error::new(ErrorKind::InvalidOperation, "no template is rendering"))
}

fn missing_context(name: &str) -> Error {
    Error::new(
        ErrorKind::InvalidOperation,
        format!("context data does not exist for key '{name}'"),
    )
}

/// `push_context_data(name, value)`
fn push_context_data(state: &State<'_, '_>, name: String, value: Value) -> Result<Value, Error> {
    let pass = current_pass(state)?;
    pass.lock().context_data.entry(name).or_default().push(value);
    Ok(Value::from(""))
}

/// `set_context_data(name, value)`: replaces the innermost value.
fn set_context_data(state: &State<'_, '_>, name: String, value: Value) -> Result<Value, Error> {
    let pass = current_pass(state)?;
    let mut pass_state = pass.lock();
    let stack = pass_state.context_data.entry(name).or_default();
    match stack.last_mut() {
        Some(top) => *top = value,
        None => stack.push(value),
    }
    Ok(Value::from(""))
}

/// `get_context_data(name)`
fn get_context_data(state: &State<'_, '_>, name: &str) -> Result<Value, Error> {
    let pass = current_pass(state)?;
    let pass_state = pass.lock();
    pass_state
        .context_data
        .get(name)
        .and_then(|stack| stack.last().cloned())
        .ok_or_else(|| missing_context(name))
}

/// `pop_context_data(name)`
fn pop_context_data(state: &State<'_, '_>, name: &str) -> Result<Value, Error> {
    let pass = current_pass(state)?;
    let mut pass_state = pass.lock();
    pass_state
        .context_data
        .get_mut(name)
        .and_then(Vec::pop)
        .ok_or_else(|| missing_context(name))?;
    Ok(Value::from(""))
}
