//! Webdoc CLI Library
//!
//! Command implementations for the `webdoc` binary, exposed as a library so
//! they can be driven from tests and other tools.
//!
//! # Modules
//!
//! - [`cmd`] - Command implementations (render, clean)
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use webdoc::cmd;
//!
//! // Render the project next to `webdoc.toml`
//! cmd::render::run(Path::new("webdoc.toml"), None).unwrap();
//! ```

pub mod cmd;

// Re-export core types for convenience
pub use webdoc_core::Config;
pub use webdoc_generator::{BuildStats, Builder};

/// Environment variable holding a full filter that replaces `-v`.
pub const LOG_ENV: &str = "WEBDOC_LOG";

/// Filter directives for a `-v` count: webdoc's crates at the requested level,
/// everything else at WARN.
pub fn log_directives(verbose: u8) -> String {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    format!("warn,webdoc={level},webdoc_core={level},webdoc_generator={level}")
}

/// Install the global subscriber.
///
/// `WEBDOC_LOG` takes precedence over the verbosity flags when set.
pub fn init_tracing(verbose: u8) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(log_directives(verbose)));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(verbose > 1))
        .with(filter)
        .init();
}
