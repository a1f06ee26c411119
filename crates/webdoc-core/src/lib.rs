//! webdoc Core Library
//!
//! Core types, configuration, and error handling for the webdoc static site builder.

pub mod config;
pub mod error;
pub mod template;

pub use config::{Config, ProjectPaths, RenderConfig, UndefinedMode};
pub use error::{CoreError, Result};
pub use template::TemplateId;
