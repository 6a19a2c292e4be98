//! Diagnostic logging.
//!
//! The full-screen UI owns stdout and stderr, so events only go somewhere
//! when `--log <file>` names a destination. Verbosity follows `QUIRE_LOG`
//! (an `EnvFilter` directive such as `quire=debug`), defaulting to `info`.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "QUIRE_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

fn env_filter(directive: Option<&str>) -> EnvFilter {
    directive
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber. Without a log file nothing is installed
/// and `tracing` events are discarded.
pub fn init_tracing(log_file: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = log_file else {
        return Ok(());
    };
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(Path::new(path))
        .map_err(|err| format!("cannot open log file {path}: {err}"))?;
    let directive = std::env::var(LOG_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(directive.as_deref()))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|err| format!("cannot install logger: {err}"))?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Logging to {path}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_directives_fall_back_to_info() {
        assert_eq!(env_filter(Some("quire=notalevel")).to_string(), "info");
        assert_eq!(env_filter(None).to_string(), "info");
        assert_eq!(env_filter(Some("quire=debug")).to_string(), "quire=debug");
    }

    #[test]
    fn no_log_file_installs_nothing() {
        assert!(init_tracing(None).is_ok());
    }
}
