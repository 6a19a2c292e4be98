use std::fmt;

/// How a failure is recovered from. Every failure the core sees is
/// classified into one of these before it is surfaced (or not).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Fetch/save/delete failed below HTTP. Toast; state unchanged.
    TransientNetwork,
    /// Non-2xx with a text body. Error dialog; the action is not applied.
    ServerValidation,
    /// The worksheet does not exist. Not-found view; no polling.
    NotFound,
    /// A response for a worksheet the user has navigated away from. Dropped.
    StaleResponse,
    /// Focus could not be translated after a refresh. Clamped and logged.
    FocusOutOfRange,
    /// A bulk or terminal command returned an exception string.
    CommandFailed,
}

impl ErrorKind {
    /// Whether this kind ever reaches the user.
    pub fn is_surfaced(self) -> bool {
        !matches!(self, ErrorKind::StaleResponse | ErrorKind::FocusOutOfRange)
    }

    /// Whether the failure is shown in the error dialog rather than a toast.
    pub fn uses_dialog(self) -> bool {
        matches!(self, ErrorKind::ServerValidation | ErrorKind::CommandFailed)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::TransientNetwork => "network error",
            ErrorKind::ServerValidation => "server rejected the request",
            ErrorKind::NotFound => "not found",
            ErrorKind::StaleResponse => "stale response",
            ErrorKind::FocusOutOfRange => "focus out of range",
            ErrorKind::CommandFailed => "command failed",
        };
        f.write_str(label)
    }
}
