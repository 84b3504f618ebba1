// src/logging/mod.rs
mod access;

pub use access::AccessLog;

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

fn env_filter() -> Result<EnvFilter> {
    Ok(EnvFilter::from_default_env()
        .add_directive("argus=info".parse()?)
        .add_directive("hyper=info".parse()?))
}

/// Installs the global subscriber. Output goes to `log_file` (appended,
/// created if missing) when given, stdout otherwise.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter()?);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;

            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| anyhow::anyhow!(e))?;
        }
        None => {
            builder.try_init().map_err(|e| anyhow::anyhow!(e))?;
        }
    }

    Ok(())
}
