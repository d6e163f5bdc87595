//! Diagnostic logging via `tracing`.
//!
//! `RUST_LOG` wins when set. Otherwise only warnings are shown, or this
//! crate's debug events with `--verbose`. With `--log <file>` events are
//! appended to that file instead of stderr so they don't interleave with the
//! interactive screens.

use std::error::Error;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "pybuddy=debug"
    } else {
        "warn"
    }
}

fn log_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

pub fn init_tracing(
    verbose: bool,
    log_file: Option<&Path>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = log_filter(verbose);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()?;
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()?;
        }
    }

    Ok(())
}
