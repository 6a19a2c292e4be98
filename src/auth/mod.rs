//! Access tokens for worksheet servers.
//!
//! A token comes from `QUIRE_TOKEN` when set, otherwise from the system
//! keyring under the service `quire` with the server origin as the user.
//! `quire auth` and `quire deauth` manage the keyring entry.

use std::error::Error;
use std::fmt;

use keyring::Entry;
use tracing::{debug, warn};

use crate::core::clipboard::origin_key;

mod ui;

use self::ui::{prompt_confirmation, prompt_masked_input, ConfirmationChoice};

const KEYRING_SERVICE: &str = "quire";
pub const TOKEN_ENV: &str = "QUIRE_TOKEN";

/// Describes failures when attempting to access the system keyring.
///
/// Recoverable errors mean the backend was temporarily unavailable (a
/// locked keychain, a missing secret service). The client then runs
/// anonymously instead of refusing to start.
#[derive(Debug)]
pub enum KeyringAccessError {
    Recoverable(keyring::Error),
    Permanent(keyring::Error),
}

impl KeyringAccessError {
    fn inner(&self) -> &keyring::Error {
        match self {
            KeyringAccessError::Recoverable(err) | KeyringAccessError::Permanent(err) => err,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, KeyringAccessError::Recoverable(_))
    }
}

impl From<keyring::Error> for KeyringAccessError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
                KeyringAccessError::Recoverable(err)
            }
            other => KeyringAccessError::Permanent(other),
        }
    }
}

impl fmt::Display for KeyringAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "keyring unavailable: {}", self.inner())
    }
}

impl Error for KeyringAccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.inner())
    }
}

/// Where a resolved token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Environment,
    Keyring,
}

pub struct AuthManager {
    server_url: String,
    use_keyring: bool,
}

impl AuthManager {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self::new_with_keyring(server_url, true)
    }

    /// Construct an AuthManager, optionally disabling keyring access (useful for tests)
    pub fn new_with_keyring(server_url: impl Into<String>, use_keyring: bool) -> Self {
        Self {
            server_url: server_url.into(),
            use_keyring,
        }
    }

    /// Keyring user name for this server.
    pub fn account(&self) -> String {
        origin_key(&self.server_url)
    }

    fn entry(&self) -> Result<Entry, KeyringAccessError> {
        Entry::new(KEYRING_SERVICE, &self.account()).map_err(KeyringAccessError::from)
    }

    /// Token for requests, if any. A recoverable keyring failure is logged
    /// and treated as "no token".
    pub fn resolve_token(&self) -> Result<Option<(String, TokenSource)>, KeyringAccessError> {
        self.resolve_token_with_env(std::env::var(TOKEN_ENV).ok())
    }

    fn resolve_token_with_env(
        &self,
        env_token: Option<String>,
    ) -> Result<Option<(String, TokenSource)>, KeyringAccessError> {
        if let Some(token) = env_token.filter(|token| !token.trim().is_empty()) {
            debug!("Using token from {TOKEN_ENV}");
            return Ok(Some((token.trim().to_string(), TokenSource::Environment)));
        }
        match self.get_token() {
            Ok(token) => Ok(token.map(|token| (token, TokenSource::Keyring))),
            Err(err) if err.is_recoverable() => {
                warn!(error = %err, "Continuing without a stored token");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub fn get_token(&self) -> Result<Option<String>, KeyringAccessError> {
        if !self.use_keyring {
            return Ok(None);
        }
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn store_token(&self, token: &str) -> Result<(), KeyringAccessError> {
        if !self.use_keyring {
            return Ok(());
        }
        self.entry()?.set_password(token)?;
        debug!(account = %self.account(), "Stored token");
        Ok(())
    }

    /// Returns whether an entry existed.
    pub fn remove_token(&self) -> Result<bool, KeyringAccessError> {
        if !self.use_keyring {
            return Ok(false);
        }
        match self.entry()?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// `quire auth`: prompt for a token and store it for this server.
    pub fn interactive_auth(&self) -> Result<(), Box<dyn Error>> {
        println!("Server: {}", self.server_url);
        let token = prompt_masked_input()?;
        if token.is_empty() {
            return Err("Token cannot be empty".into());
        }
        self.store_token(&token)?;
        println!("✅ Token stored for {}", self.account());
        Ok(())
    }

    /// `quire deauth`: remove the stored token after confirmation.
    pub fn interactive_deauth(&self) -> Result<(), Box<dyn Error>> {
        let question = format!(
            "Remove the stored token for {}? (y/N): ",
            self.account()
        );
        match prompt_confirmation(&question)? {
            ConfirmationChoice::Yes => {
                if self.remove_token()? {
                    println!("✅ Token removed for {}", self.account());
                } else {
                    println!("No token stored for {}", self.account());
                }
            }
            ConfirmationChoice::No | ConfirmationChoice::Cancel => println!("Cancelled."),
        }
        Ok(())
    }
}
