//! Template store.
//!
//! Knows where templates live and where their rendered output and data
//! exports go. The list of renderable pages is computed once per pass.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};
use webdoc_core::{CoreError, ProjectPaths, RenderConfig, TemplateId};

/// Template store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory walk error.
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// A file could not be turned into a template id.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Filesystem view of a project's templates and outputs.
#[derive(Debug)]
pub struct TemplateStore {
    paths: ProjectPaths,
    template_extension: String,
    output_extension: String,
    modules_name: String,
    pages: Mutex<Option<Vec<TemplateId>>>,
}

impl TemplateStore {
    /// Create a store over resolved project paths.
    pub fn new(paths: ProjectPaths, render: &RenderConfig) -> Self {
        let modules_name = paths
            .modules
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            paths,
            template_extension: render.template_extension.clone(),
            output_extension: render.output_extension.clone(),
            modules_name,
            pages: Mutex::new(None),
        }
    }

    /// Resolved project paths.
    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    /// Suffix of renderable templates.
    pub fn template_extension(&self) -> &str {
        &self.template_extension
    }

    /// Whether rendering `id` produces a document.
    ///
    /// Library templates and module templates only contribute fields and
    /// data to the pass.
    pub fn is_document(&self, id: &TemplateId) -> bool {
        id.module_parts().is_none() && id.is_page(&self.template_extension)
    }

    /// Every renderable page below the source root, sorted by id.
    ///
    /// A page has exactly one suffix, the template extension, and does not
    /// live inside the reserved modules subtree. Hidden entries are skipped.
    /// The result is memoized until [`TemplateStore::reset`].
    pub fn list_page_templates(&self) -> Result<Vec<TemplateId>> {
        let mut cached = self.pages.lock();
        if let Some(pages) = cached.as_ref() {
            return Ok(pages.clone());
        }

        let pages = self.scan_pages()?;
        debug!(count = pages.len(), "listed page templates");
        *cached = Some(pages.clone());
        Ok(pages)
    }

    /// Forget the memoized page list.
    pub fn reset(&self) {
        *self.pages.lock() = None;
    }

    fn scan_pages(&self) -> Result<Vec<TemplateId>> {
        let source = &self.paths.source;
        if !source.exists() {
            return Ok(Vec::new());
        }

        let mut pages = Vec::new();
        let walker = WalkDir::new(source)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let id = TemplateId::from_relative_path(source, entry.path())?;
            if !id.is_page(&self.template_extension) {
                continue;
            }
            if id.as_str().contains('/') && id.first_component() == self.modules_name {
                continue;
            }
            pages.push(id);
        }

        pages.sort();
        Ok(pages)
    }

    /// Source file backing `id`.
    ///
    /// `@module/path` resolves into `<modules>/<module>/template/<path>`.
    /// Returns `None` for ids that would escape their root.
    pub fn source_file_for(&self, id: &TemplateId) -> Option<PathBuf> {
        let (root, relative) = match id.module_parts() {
            Some((module, nested)) => (self.paths.modules.join(module).join("template"), nested),
            None => (self.paths.source.clone(), id.as_str()),
        };

        if relative
            .split('/')
            .any(|segment| segment == ".." || segment.is_empty())
        {
            return None;
        }

        Some(root.join(relative))
    }

    /// Where the rendered document of `id` is written.
    pub fn output_file_for(&self, id: &TemplateId) -> PathBuf {
        self.paths
            .document
            .join(id.with_suffix(&self.template_extension, &self.output_extension))
    }

    /// Site-absolute link to the rendered document of `id`.
    pub fn outbound_link_path(&self, id: &TemplateId) -> String {
        let relative = id.with_suffix(&self.template_extension, &self.output_extension);
        format!(
            "{}/{}",
            self.paths.document_url,
            relative.to_string_lossy().replace('\\', "/")
        )
    }

    /// JSON export file for `id` below `root`.
    pub fn data_file_for(&self, root: &Path, id: &TemplateId) -> PathBuf {
        root.join(id.with_suffix(&self.template_extension, ".json"))
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;
    use webdoc_core::Config;

    use super::*;

    fn create_store(dir: &TempDir) -> TemplateStore {
        let config = Config::default();
        TemplateStore::new(config.project_paths(dir.path()), &config.render)
    }

    fn touch(dir: &TempDir, relative: &str) {
        let path = dir.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_list_page_templates() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "template/index.jinja");
        touch(&dir, "template/guides/install.jinja");
        touch(&dir, "template/layout.lib.jinja");
        touch(&dir, "template/notes.txt");
        touch(&dir, "template/.drafts/secret.jinja");
        touch(&dir, "template/modules/shared.jinja");

        let store = create_store(&dir);
        let pages: Vec<_> = store
            .list_page_templates()
            .unwrap()
            .into_iter()
            .map(|id| id.to_string())
            .collect();

        assert_eq!(pages, ["guides/install.jinja", "index.jinja"]);
    }

    #[test]
    fn test_list_is_memoized_until_reset() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "template/a.jinja");

        let store = create_store(&dir);
        assert_eq!(store.list_page_templates().unwrap().len(), 1);

        touch(&dir, "template/b.jinja");
        assert_eq!(store.list_page_templates().unwrap().len(), 1);

        store.reset();
        assert_eq!(store.list_page_templates().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_source_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = create_store(&dir);
        assert!(store.list_page_templates().unwrap().is_empty());
    }

    #[test]
    fn test_output_locations() {
        let dir = TempDir::new().unwrap();
        let store = create_store(&dir);
        let id = TemplateId::new("guides/install.jinja");

        assert_eq!(
            store.output_file_for(&id),
            dir.path().join("render/document/guides/install.html")
        );
        assert_eq!(
            store.outbound_link_path(&id),
            "/document/guides/install.html"
        );
        assert_eq!(
            store.data_file_for(&store.paths().fields, &id),
            dir.path().join("render/data/fields/guides/install.json")
        );
    }

    #[test]
    fn test_source_file_for_module() {
        let dir = TempDir::new().unwrap();
        let store = create_store(&dir);

        assert_eq!(
            store.source_file_for(&TemplateId::new("@blog/base.jinja")),
            Some(dir.path().join("modules/blog/template/base.jinja"))
        );
        assert_eq!(
            store.source_file_for(&TemplateId::new("index.jinja")),
            Some(dir.path().join("template/index.jinja"))
        );
        assert_eq!(
            store.source_file_for(&TemplateId::new("../secret.jinja")),
            None
        );
    }
}
