//! Render command - runs one full render pass

use std::{path::Path, time::Instant};

use color_eyre::eyre::{Result, WrapErr};
use webdoc_generator::{BuildError, BuildStats, Builder};

use super::load_project;

/// Run the render command.
///
/// Renders every page of the project and exports the field and object caches.
pub fn run(config_path: &Path, spec: Option<&str>) -> Result<BuildStats> {
    let start = Instant::now();
    tracing::info!(?config_path, ?spec, "Starting render");

    let (config, root) = load_project(config_path)?;
    let output = config.project_paths(&root).output;

    let builder = Builder::new(config, &root).wrap_err("Failed to set up project")?;
    let stats = match builder.build_with_spec(spec) {
        Ok(stats) => stats,
        Err(BuildError::Render(err)) => {
            eprintln!();
            eprintln!("  Render failed:");
            for line in err.report().lines() {
                eprintln!("  {line}");
            }
            eprintln!();
            return Err(BuildError::Render(err)).wrap_err("Render failed");
        }
        Err(err) => return Err(err).wrap_err("Render failed"),
    };

    let duration = start.elapsed();

    // Print render statistics
    println!();
    println!("  Render completed successfully!");
    println!();
    println!("  Pages:      {}", stats.pages);
    println!("  Fields:     {}", stats.fields);
    println!("  Objects:    {}", stats.objects);
    println!("  Data files: {}", stats.data_files);
    println!();
    println!("  Duration:   {:.2}s", duration.as_secs_f64());
    println!("  Output:     {}", output.display());
    println!();

    tracing::info!(?stats, ?duration, "Render completed successfully");

    Ok(stats)
}
