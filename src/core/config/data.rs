use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SERVER_URL: &str = "https://worksheets.codalab.org";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the worksheet server (e.g., "https://worksheets.codalab.org")
    pub server_url: Option<String>,
    /// Worksheet uuid or name opened when none is given on the command line
    pub default_worksheet: Option<String>,
    /// Poll delay ramp step in milliseconds
    pub poll_step_ms: Option<u64>,
    /// Upper bound of the ramped poll delay in milliseconds
    pub poll_cap_ms: Option<u64>,
    /// Multiple of the previous request duration the poller waits at least
    pub poll_slow_factor: Option<u32>,
    /// How long a completion toast stays visible in milliseconds
    pub toast_ms: Option<u64>,
    /// Lines at the top of the block pane covered by the sticky header
    pub sticky_header_lines: Option<u16>,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
///
/// # Examples
/// - Unix: `/home/user/.config/quire/config.toml` → `~/.config/quire/config.toml`
/// - macOS: `/Users/user/Library/Application Support/...` → `~/Library/Application Support/...`
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
