//! Template source loading.
//!
//! Plain names resolve against the source root; `@module/path` names resolve
//! into the module's own `template` directory, so projects can share layouts
//! without copying them.

use std::{fs, io, sync::Arc};

use minijinja::{Environment, Error, ErrorKind};
use tracing::trace;
use webdoc_core::TemplateId;

use crate::store::TemplateStore;

/// Read the source of `name`, or `None` if no such template exists.
pub fn load_source(store: &TemplateStore, name: &str) -> Result<Option<String>, Error> {
    let id = TemplateId::new(name);
    let Some(path) = store.source_file_for(&id) else {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("template name '{name}' escapes its root"),
        ));
    };

    match fs::read_to_string(&path) {
        Ok(source) => {
            trace!(template = %id, path = %path.display(), "loaded template source");
            Ok(Some(source))
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("could not read template '{name}'"),
        )
        .with_source(err)),
    }
}

/// Install the store-backed loader on `env`.
pub fn install(env: &mut Environment<'static>, store: Arc<TemplateStore>) {
    env.set_loader(move |name| load_source(&store, name));
}
