//! Template identifiers.

use std::{
    borrow::Borrow,
    fmt,
    path::{Component, Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Canonical, source-root relative identifier of a template.
///
/// Always `/`-separated, e.g. `guides/install.jinja`. Module templates are
/// namespaced with a leading `@`: `@blog/layout.jinja`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(String);

impl TemplateId {
    /// Create an id, normalizing separators and leading `./` or `/`.
    pub fn new(id: impl AsRef<str>) -> Self {
        let normalized = id.as_ref().replace('\\', "/");
        let mut trimmed = normalized.as_str();
        loop {
            if let Some(rest) = trimmed.strip_prefix("./") {
                trimmed = rest;
            } else if let Some(rest) = trimmed.strip_prefix('/') {
                trimmed = rest;
            } else {
                break;
            }
        }
        Self(trimmed.to_string())
    }

    /// Create an id, appending `extension` unless the name already ends in it.
    ///
    /// Lets templates refer to `"about"` as well as `"about.jinja"`.
    pub fn with_extension(id: impl AsRef<str>, extension: &str) -> Self {
        let id = Self::new(id);
        if id.file_name().ends_with(extension) {
            id
        } else {
            Self(format!("{}{extension}", id.0))
        }
    }

    /// Build an id from a file below `root`.
    pub fn from_relative_path(root: &Path, path: &Path) -> Result<Self> {
        let relative = path
            .strip_prefix(root)
            .map_err(|_| CoreError::InvalidTemplatePath(path.to_path_buf()))?;

        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy()),
                _ => return Err(CoreError::InvalidTemplatePath(path.to_path_buf())),
            }
        }

        if parts.is_empty() {
            return Err(CoreError::InvalidTemplatePath(path.to_path_buf()));
        }

        Ok(Self(parts.join("/")))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path segment.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// First path segment.
    pub fn first_component(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }

    /// The id without its template extension: `posts/a.jinja` becomes `posts/a`.
    pub fn name(&self, extension: &str) -> &str {
        self.0.strip_suffix(extension).unwrap_or(&self.0)
    }

    /// The last segment without its template extension.
    pub fn base_name(&self, extension: &str) -> &str {
        let file = self.file_name();
        file.strip_suffix(extension).unwrap_or(file)
    }

    /// Whether the file name carries exactly one suffix, equal to `extension`.
    ///
    /// `index.jinja` qualifies; `layout.lib.jinja` and `notes.txt` do not.
    pub fn is_page(&self, extension: &str) -> bool {
        let Some(stem) = self.file_name().strip_suffix(extension) else {
            return false;
        };
        !stem.is_empty() && !stem.contains('.')
    }

    /// Split a namespaced id into module name and nested template.
    pub fn module_parts(&self) -> Option<(&str, &str)> {
        let rest = self.0.strip_prefix('@')?;
        let (module, nested) = rest.split_once('/')?;
        if module.is_empty() || nested.is_empty() {
            return None;
        }
        Some((module, nested))
    }

    /// The id with `extension` replaced by `replacement`, as a relative path.
    pub fn with_suffix(&self, extension: &str, replacement: &str) -> PathBuf {
        let stem = self.name(extension);
        PathBuf::from(format!("{stem}{replacement}"))
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TemplateId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TemplateId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TemplateId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TemplateId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}
