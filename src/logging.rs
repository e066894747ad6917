//! Logger setup for the binary.
//!
//! Library code only emits `tracing` events; installing a subscriber is left to
//! the caller. `RUST_LOG` overrides the default filter.
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{MarkerError, Result};

fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "markerscout=debug,info" } else { "markerscout=info" })
    })
}

/// Compact stderr logging, plus a plain-text copy in `log_file` when given.
pub fn init_logger(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| MarkerError::io(parent, e))?;
            }
            let file = File::create(path).map_err(|e| MarkerError::io(path, e))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .with(file_layer)
        .try_init()
        .map_err(|e| MarkerError::Config { message: format!("cannot install logger: {}", e) })
}
