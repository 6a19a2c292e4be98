//! System clipboard access through the platform's copy helper.

use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[cfg(target_os = "macos")]
const HELPERS: &[(&str, &[&str])] = &[("pbcopy", &[])];
#[cfg(target_os = "windows")]
const HELPERS: &[(&str, &[&str])] = &[("cmd", &["/C", "clip"])];
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const HELPERS: &[(&str, &[&str])] = &[
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
];

/// Copy `text` with the first helper that succeeds.
pub async fn copy_to_clipboard(text: &str) -> Result<(), String> {
    for (cmd, args) in HELPERS {
        if run_with_stdin(cmd, args, text).await.is_ok() {
            return Ok(());
        }
    }
    let names: Vec<&str> = HELPERS.iter().map(|(cmd, _)| *cmd).collect();
    Err(format!("no clipboard command found (tried {})", names.join(", ")))
}

async fn run_with_stdin(cmd: &str, args: &[&str], input: &str) -> Result<(), String> {
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|_| format!("clipboard command `{cmd}` not available"))?;
    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(input.as_bytes()).await;
    }
    match child.wait().await {
        Ok(status) if status.success() => Ok(()),
        _ => Err(format!("clipboard command `{cmd}` failed")),
    }
}
