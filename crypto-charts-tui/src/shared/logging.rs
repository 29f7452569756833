//! File logging for the terminal UI. Writing to stdout would corrupt the alternate screen.

use std::{
    error::Error,
    fs::{self, OpenOptions},
    path::Path,
    sync::Mutex,
};

use tracing_subscriber::EnvFilter;

/// Install a `tracing` subscriber appending to `log_file`, filtered by `RUST_LOG`
/// (default `info`).
pub fn init_logging(log_file: &Path) -> Result<(), Box<dyn Error + Send + Sync>> {
    if let Some(parent) = log_file.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()?;

    Ok(())
}
