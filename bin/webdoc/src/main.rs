//! Webdoc CLI
//!
//! Renders Jinja template projects into static documents plus JSON data.
//!
//! This is the binary entry point. The library functionality is in `lib.rs`.

use clap::Parser;
use color_eyre::eyre::Result;

/// Command-line interface for webdoc.
#[derive(Parser)]
#[command(
    name = "webdoc",
    version,
    about = "Static documentation builder with structured data export"
)]
struct Cli {
    /// Path to configuration file; its directory is the project root
    #[arg(short, long, default_value = "webdoc.toml")]
    config: std::path::PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(clap::Subcommand)]
enum Commands {
    /// Render every page and export field and object data
    Render {
        /// Named parameter set from `[specs]`
        #[arg(long)]
        spec: Option<String>,
    },
    /// Delete rendered documents and data without rendering
    Clean,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    webdoc::init_tracing(cli.verbose);

    match cli.command {
        Commands::Render { spec } => {
            webdoc::cmd::render::run(&cli.config, spec.as_deref())?;
        }
        Commands::Clean => {
            webdoc::cmd::clean::run(&cli.config)?;
        }
    }

    Ok(())
}
