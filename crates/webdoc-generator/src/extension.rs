//! Template extensions.
//!
//! Everything a template can call beyond plain Jinja comes from an
//! [`Extension`]. A project assembles the list it wants and hands it to the
//! builder; nothing is registered through process-wide state.

use std::{collections::BTreeMap, fmt, sync::Arc};

use minijinja::{Environment, Value, value::Kwargs};
use thiserror::Error;
use tracing::debug;
use webdoc_core::Config;

use crate::{
    directives::{DataExtension, FieldExtension},
    helpers::HelperExtension,
    objects::Record,
};

/// Extension registration errors.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// Two extensions tried to register the same global name.
    #[error("global '{name}' registered by '{extension}' is already provided by '{previous}'")]
    DuplicateGlobal {
        /// Global name.
        name: String,
        /// Extension attempting the registration.
        extension: String,
        /// Extension that registered the name first.
        previous: String,
    },

    /// An extension rejected its own configuration.
    #[error("extension '{extension}': {message}")]
    Invalid {
        /// Extension name.
        extension: String,
        /// What is wrong.
        message: String,
    },
}

/// A bundle of template globals, functions and filters.
pub trait Extension: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Add this extension's items to the environment.
    fn register(&self, registrar: &mut Registrar<'_>) -> Result<(), ExtensionError>;
}

/// Registration handle passed to [`Extension::register`].
pub struct Registrar<'a> {
    env: &'a mut Environment<'static>,
    config: &'a Config,
    owners: &'a mut BTreeMap<String, String>,
    extension: String,
}

impl Registrar<'_> {
    /// Project configuration.
    pub fn config(&self) -> &Config {
        self.config
    }

    /// Register a global value or function under `name`.
    pub fn add_global(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), ExtensionError> {
        let name = name.into();
        if let Some(previous) = self.owners.get(&name) {
            return Err(ExtensionError::DuplicateGlobal {
                name,
                extension: self.extension.clone(),
                previous: previous.clone(),
            });
        }

        self.owners.insert(name.clone(), self.extension.clone());
        self.env.add_global(name, value.into());
        Ok(())
    }
}

/// An ordered list of extensions.
pub struct Extensions {
    extensions: Vec<Box<dyn Extension>>,
}

impl Extensions {
    /// No extensions at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            extensions: Vec::new(),
        }
    }

    /// The directives and helpers every project gets.
    #[must_use]
    pub fn builtin() -> Self {
        Self::empty()
            .with(FieldExtension)
            .with(DataExtension)
            .with(HelperExtension)
    }

    /// Append an extension.
    #[must_use]
    pub fn with(mut self, extension: impl Extension + 'static) -> Self {
        self.extensions.push(Box::new(extension));
        self
    }

    /// Extension names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.extensions.iter().map(|ext| ext.name()).collect()
    }

    /// Register every extension on `env`.
    pub fn install(
        &self,
        env: &mut Environment<'static>,
        config: &Config,
    ) -> Result<(), ExtensionError> {
        let mut owners = BTreeMap::new();
        for extension in &self.extensions {
            let mut registrar = Registrar {
                env: &mut *env,
                config,
                owners: &mut owners,
                extension: extension.name().to_string(),
            };
            extension.register(&mut registrar)?;
            debug!(extension = extension.name(), "registered extension");
        }
        Ok(())
    }
}

impl Default for Extensions {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// A named record type templates can construct.
///
/// `RecordType::new("Person", ["name", "role"])` makes `Person(name="Ada")`
/// available; the result is exported as `{"type": "Person", "name": "Ada",
/// "role": null}`.
#[derive(Debug, Clone)]
pub struct RecordType {
    name: Arc<str>,
    fields: Arc<[String]>,
}

impl RecordType {
    /// Declare a record type with the given field order.
    pub fn new<I, S>(name: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: Arc::from(name),
            fields: fields.into_iter().map(Into::<String>::into).collect(),
        }
    }

    fn construct(&self, kwargs: &Kwargs) -> Result<Value, minijinja::Error> {
        let mut values = Vec::with_capacity(self.fields.len());
        for field in self.fields.iter() {
            let value: Option<Value> = kwargs.get(field)?;
            values.push((field.clone(), value.unwrap_or(Value::from(()))));
        }
        kwargs.assert_all_used()?;
        Ok(Value::from_object(Record::new(self.name.clone(), values)))
    }
}

impl Extension for RecordType {
    fn name(&self) -> &str {
        &self.name
    }

    fn register(&self, registrar: &mut Registrar<'_>) -> Result<(), ExtensionError> {
        if self.fields.iter().any(|field| field == "type") {
            return Err(ExtensionError::Invalid {
                extension: self.name.to_string(),
                message: "field name 'type' is reserved".to_string(),
            });
        }

        let record = self.clone();
        registrar.add_global(
            self.name.to_string(),
            Value::from_function(move |kwargs: Kwargs| record.construct(&kwargs)),
        )
    }
}
