//! Build orchestration.
//!
//! Coordinates one full render pass: clean, render every page, export caches.

use std::{
    fs,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use minijinja::{AutoEscape, Environment, UndefinedBehavior, Value};
use thiserror::Error;
use tracing::{debug, info};
use webdoc_core::{Config, CoreError, UndefinedMode};

use crate::{
    engine::{RenderPass, request_render},
    error::RenderError,
    extension::{ExtensionError, Extensions},
    loader,
    store::{StoreError, TemplateStore},
    writer::{CacheWriter, WriteError},
};

/// Build errors.
#[derive(Debug, Error)]
pub enum BuildError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Render failure.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// Cache export error.
    #[error("write error: {0}")]
    Write(#[from] WriteError),

    /// Extension registration error.
    #[error("extension error: {0}")]
    Extension(#[from] ExtensionError),

    /// Template listing error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] CoreError),
}

/// Result type for build operations.
pub type Result<T> = std::result::Result<T, BuildError>;

/// Build statistics.
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    /// Number of documents rendered.
    pub pages: usize,

    /// Number of fields recorded.
    pub fields: usize,

    /// Number of data keys recorded.
    pub objects: usize,

    /// Number of data files written, manifest included.
    pub data_files: usize,

    /// Build duration in milliseconds.
    pub duration_ms: u64,
}

/// Marks a pass as active; released on drop.
struct PassGuard<'a>(&'a AtomicBool);

impl<'a> PassGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> std::result::Result<Self, RenderError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| RenderError::ReentrantPass)?;
        Ok(Self(flag))
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Project builder that runs render passes.
#[derive(Debug)]
pub struct Builder {
    config: Config,
    store: Arc<TemplateStore>,
    extensions: Extensions,
    active: AtomicBool,
}

impl Builder {
    /// Create a builder for the project at `root` with the builtin extensions.
    pub fn new(config: Config, root: impl Into<PathBuf>) -> Result<Self> {
        Self::with_extensions(config, root, Extensions::builtin())
    }

    /// Create a builder with an explicit extension list.
    pub fn with_extensions(
        config: Config,
        root: impl Into<PathBuf>,
        extensions: Extensions,
    ) -> Result<Self> {
        config.validate()?;
        let paths = config.project_paths(&root.into());
        let store = Arc::new(TemplateStore::new(paths, &config.render));

        let builder = Self {
            config,
            store,
            extensions,
            active: AtomicBool::new(false),
        };
        // Surface registration conflicts before the first pass.
        builder.environment()?;
        Ok(builder)
    }

    /// The template store.
    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    /// Whether a pass is running.
    pub fn is_rendering(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Run one pass with the base parameters.
    pub fn build(&self) -> Result<BuildStats> {
        self.build_with_spec(None)
    }

    /// Run one pass with `params` overlaid by the named spec.
    pub fn build_with_spec(&self, spec: Option<&str>) -> Result<BuildStats> {
        let start = Instant::now();
        let _guard = PassGuard::acquire(&self.active)?;
        let params = self.config.params_for(spec)?;
        let paths = self.store.paths();

        info!(
            source = %paths.source.display(),
            output = %paths.output.display(),
            spec = spec.unwrap_or("default"),
            "starting render pass"
        );

        // 1. Clean previous output
        self.clean()?;

        // 2. Render every page
        self.store.reset();
        let env = self.environment()?;
        let pass = RenderPass::new(self.store.clone(), Value::from_serialize(&params));
        let pages = self.store.list_page_templates()?;
        info!(count = pages.len(), "rendering pages");
        for id in &pages {
            request_render(&env, &pass, id)?;
        }

        // 3. Export caches
        let (fields, objects) = pass.take_caches();
        let written = CacheWriter::new(&self.store, self.config.render.pretty_json)
            .write(&fields, &objects)?;
        self.store.reset();

        let stats = BuildStats {
            pages: pass.document_count(),
            fields: fields.field_count(),
            objects: objects.entry_count(),
            data_files: written.total(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            pages = stats.pages,
            fields = stats.fields,
            objects = stats.objects,
            data_files = stats.data_files,
            duration_ms = stats.duration_ms,
            "render pass complete"
        );

        Ok(stats)
    }

    /// Remove the document and data directories.
    pub fn clean(&self) -> Result<()> {
        let paths = self.store.paths();
        for dir in [&paths.document, &paths.data] {
            if dir.exists() {
                debug!(dir = %dir.display(), "cleaning output directory");
                fs::remove_dir_all(dir)?;
            }
        }
        Ok(())
    }

    /// Template environment for one pass.
    fn environment(&self) -> Result<Environment<'static>> {
        let render = &self.config.render;
        let mut env = Environment::new();

        env.set_undefined_behavior(match render.undefined {
            UndefinedMode::Strict => UndefinedBehavior::Strict,
            UndefinedMode::Lenient => UndefinedBehavior::Lenient,
            UndefinedMode::Chainable => UndefinedBehavior::Chainable,
        });
        env.set_trim_blocks(render.trim_blocks);
        if render.autoescape {
            env.set_auto_escape_callback(|_| AutoEscape::Html);
        } else {
            env.set_auto_escape_callback(|_| AutoEscape::None);
        }

        loader::install(&mut env, self.store.clone());
        self.extensions.install(&mut env, &self.config)?;
        Ok(env)
    }
}
