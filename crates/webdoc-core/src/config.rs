//! Project configuration management.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Main configuration structure for webdoc.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Project-wide settings.
    #[serde(default)]
    pub project: ProjectConfig,

    /// Directory layout, relative to the project root.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Render settings.
    #[serde(default)]
    pub render: RenderConfig,

    /// Parameters exposed to every template as `PARAMS`.
    #[serde(default)]
    pub params: toml::Table,

    /// Named parameter sets, selectable per render pass.
    #[serde(default)]
    pub specs: BTreeMap<String, toml::Table>,
}

/// Project-wide configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Human readable project name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Directory names making up a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Template source root.
    #[serde(default = "default_source")]
    pub source: String,

    /// Output root; holds the document and data trees.
    #[serde(default = "default_output")]
    pub output: String,

    /// Module packages. Also the name of the reserved library subtree.
    #[serde(default = "default_modules")]
    pub modules: String,

    /// Rendered HTML directory inside the output root.
    #[serde(default = "default_document")]
    pub document: String,

    /// Data export directory inside the output root.
    #[serde(default = "default_data")]
    pub data: String,

    /// Stylesheet directory name used by the `style` helper.
    #[serde(default = "default_style")]
    pub style: String,

    /// Script directory name used by the `script` helper.
    #[serde(default = "default_scripts")]
    pub scripts: String,

    /// Image directory name.
    #[serde(default = "default_images")]
    pub images: String,
}

/// Render configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Suffix marking a renderable template.
    #[serde(default = "default_template_extension")]
    pub template_extension: String,

    /// Suffix of rendered documents.
    #[serde(default = "default_output_extension")]
    pub output_extension: String,

    /// How the template engine treats undefined values.
    #[serde(default)]
    pub undefined: UndefinedMode,

    /// Whether to HTML-escape expression output.
    #[serde(default = "default_true")]
    pub autoescape: bool,

    /// Whether exported JSON is indented.
    #[serde(default = "default_true")]
    pub pretty_json: bool,

    /// Remove the first newline after a block tag.
    #[serde(default)]
    pub trim_blocks: bool,
}

/// Undefined value handling in templates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndefinedMode {
    /// Any use of an undefined value is an error.
    #[default]
    Strict,
    /// Undefined values print as empty strings.
    Lenient,
    /// Attribute access on undefined values yields undefined.
    Chainable,
}

// Default value functions
fn default_source() -> String {
    "template".to_string()
}

fn default_output() -> String {
    "render".to_string()
}

fn default_modules() -> String {
    "modules".to_string()
}

fn default_document() -> String {
    "document".to_string()
}

fn default_data() -> String {
    "data".to_string()
}

fn default_style() -> String {
    "style".to_string()
}

fn default_scripts() -> String {
    "scripts".to_string()
}

fn default_images() -> String {
    "images".to_string()
}

fn default_template_extension() -> String {
    ".jinja".to_string()
}

fn default_output_extension() -> String {
    ".html".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            output: default_output(),
            modules: default_modules(),
            document: default_document(),
            data: default_data(),
            style: default_style(),
            scripts: default_scripts(),
            images: default_images(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            template_extension: default_template_extension(),
            output_extension: default_output_extension(),
            undefined: UndefinedMode::default(),
            autoescape: true,
            pretty_json: true,
            trim_blocks: false,
        }
    }
}

/// Absolute locations of every project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    /// Project root.
    pub root: PathBuf,
    /// Template source root.
    pub source: PathBuf,
    /// Module packages root.
    pub modules: PathBuf,
    /// Output root.
    pub output: PathBuf,
    /// Rendered HTML root.
    pub document: PathBuf,
    /// Data export root.
    pub data: PathBuf,
    /// Field cache export root.
    pub fields: PathBuf,
    /// Object cache export root.
    pub objects: PathBuf,
    /// Structure manifest file.
    pub structure: PathBuf,
    /// Site path prefix of rendered documents, e.g. `/document`.
    pub document_url: String,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            CoreError::config_with_source(
                format!("Failed to parse config file: {}", path.display()),
                e,
            )
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration using the config crate, layering `WEBDOC__*` variables.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("WEBDOC").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let render = &self.render;
        for (key, ext) in [
            ("render.template_extension", &render.template_extension),
            ("render.output_extension", &render.output_extension),
        ] {
            if !ext.starts_with('.') || ext.len() < 2 {
                return Err(CoreError::config(format!(
                    "{key} must start with '.' and name a suffix, got {ext:?}"
                )));
            }
        }

        if render.template_extension == render.output_extension {
            return Err(CoreError::config(
                "render.template_extension and render.output_extension must differ",
            ));
        }

        let paths = &self.paths;
        for (key, value) in [
            ("paths.source", &paths.source),
            ("paths.output", &paths.output),
            ("paths.modules", &paths.modules),
            ("paths.document", &paths.document),
            ("paths.data", &paths.data),
        ] {
            if value.trim().is_empty() {
                return Err(CoreError::config(format!("{key} cannot be empty")));
            }
        }

        if paths.document == paths.data {
            return Err(CoreError::config(
                "paths.document and paths.data must be different directories",
            ));
        }

        if self.project.name.as_deref().is_some_and(str::is_empty) {
            tracing::warn!("project.name is set but empty");
        }

        Ok(())
    }

    /// Resolve every project directory against `root`.
    pub fn project_paths(&self, root: &Path) -> ProjectPaths {
        let output = root.join(&self.paths.output);
        let document = output.join(&self.paths.document);
        let data = output.join(&self.paths.data);
        let document_url = format!("/{}", self.paths.document.trim_matches('/'));

        ProjectPaths {
            root: root.to_path_buf(),
            source: root.join(&self.paths.source),
            modules: root.join(&self.paths.modules),
            fields: data.join("fields"),
            objects: data.join("objects"),
            structure: data.join("structure.json"),
            output,
            document,
            data,
            document_url,
        }
    }

    /// Parameters for a render pass: `params` overlaid with the named spec.
    pub fn params_for(&self, spec: Option<&str>) -> Result<toml::Table> {
        let mut params = self.params.clone();
        if let Some(name) = spec {
            let overlay = self
                .specs
                .get(name)
                .ok_or_else(|| CoreError::config(format!("Unknown build spec: {name}")))?;
            params.extend(overlay.clone());
        }
        Ok(params)
    }
}
