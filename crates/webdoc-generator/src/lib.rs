//! Webdoc Generator Library
//!
//! Render engine for webdoc projects.
//!
//! # Modules
//!
//! - [`store`] - Template discovery and output path mapping
//! - [`loader`] - Template source loading, including `@module/` templates
//! - [`engine`] - Render passes, the render stack and reentrant rendering
//! - [`fields`] - Field cache
//! - [`objects`] - Object cache and structured values
//! - [`directives`] - Field and data directives
//! - [`helpers`] - Asset, link and context-data helpers
//! - [`extension`] - Extension registration
//! - [`writer`] - Cache export and structure manifest
//! - [`build`] - Build orchestration
//! - [`error`] - Render failures

pub mod build;
pub mod directives;
pub mod engine;
pub mod error;
pub mod extension;
pub mod fields;
pub mod helpers;
pub mod loader;
pub mod objects;
pub mod store;
pub mod writer;

pub use build::{BuildError, BuildStats, Builder};
pub use engine::{RenderPass, request_render};
pub use error::RenderError;
pub use extension::{Extension, ExtensionError, Extensions, RecordType, Registrar};
pub use fields::FieldCache;
pub use objects::{AsArray, EnumValue, ObjectCache, Record, Structured};
pub use store::TemplateStore;
pub use writer::{CacheWriter, StructureNode};
