//! Clean command - removes rendered output

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use webdoc_generator::Builder;

use super::load_project;

/// Run the clean command.
///
/// Deletes the document and data directories without rendering.
pub fn run(config_path: &Path) -> Result<()> {
    let (config, root) = load_project(config_path)?;
    let paths = config.project_paths(&root);

    let builder = Builder::new(config, &root).wrap_err("Failed to set up project")?;
    builder.clean().wrap_err("Failed to clean output")?;

    println!("  Removed {}", paths.document.display());
    println!("  Removed {}", paths.data.display());
    tracing::info!(output = %paths.output.display(), "Clean completed");

    Ok(())
}
