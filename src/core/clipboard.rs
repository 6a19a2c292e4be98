//! Cross-session bundle clipboard and per-origin preferences.
//!
//! Both live as small JSON files under
//! `<data dir>/origins/<origin>/`, so every session talking to the same
//! server shares them. Writes replace the whole file atomically; the last
//! writer wins.

use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::api::AddItemsRequest;

const CLIPBOARD_FILE: &str = "CopiedBundles.json";
const PREFERENCES_FILE: &str = "preferences.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardEntry {
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    /// Worksheet item id of the row the entry was copied from.
    #[serde(default)]
    pub id: Option<i64>,
}

#[derive(Debug)]
pub enum PersistError {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
    Encode(serde_json::Error),
    Persist {
        path: PathBuf,
        source: tempfile::PersistError,
    },
    NoDataDir,
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistError::Io { path, source } => {
                write!(f, "Failed to access {}: {}", path.display(), source)
            }
            PersistError::Decode { path, source } => {
                write!(f, "Failed to parse {}: {}", path.display(), source)
            }
            PersistError::Encode(source) => write!(f, "Failed to encode state: {source}"),
            PersistError::Persist { path, source } => {
                write!(f, "Failed to replace {}: {}", path.display(), source)
            }
            PersistError::NoDataDir => f.write_str("Could not determine a data directory"),
        }
    }
}

impl StdError for PersistError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            PersistError::Io { source, .. } => Some(source),
            PersistError::Decode { source, .. } => Some(source),
            PersistError::Encode(source) => Some(source),
            PersistError::Persist { source, .. } => Some(source),
            PersistError::NoDataDir => None,
        }
    }
}

/// Directory-safe key for a server: `scheme://host:port/path` becomes
/// `host_port`.
pub fn origin_key(server_url: &str) -> String {
    let without_scheme = server_url
        .split_once("://")
        .map_or(server_url, |(_, rest)| rest);
    let authority = without_scheme.split('/').next().unwrap_or_default();
    let authority = authority.rsplit('@').next().unwrap_or(authority);
    let key: String = authority
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if key.is_empty() {
        "default".to_string()
    } else {
        key
    }
}

/// The per-origin directory holding persisted client state.
#[derive(Debug, Clone)]
pub struct OriginStore {
    dir: PathBuf,
}

impl OriginStore {
    pub fn new(data_dir: &Path, server_url: &str) -> Self {
        Self {
            dir: data_dir.join("origins").join(origin_key(server_url)),
        }
    }

    pub fn for_server(server_url: &str) -> Result<Self, PersistError> {
        let dirs = ProjectDirs::from("org", "quire", "quire").ok_or(PersistError::NoDataDir)?;
        Ok(Self::new(dirs.data_dir(), server_url))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read<T: DeserializeOwned + Default>(&self, file: &str) -> Result<T, PersistError> {
        let path = self.dir.join(file);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(T::default()),
            Err(source) => return Err(PersistError::Io { path, source }),
        };
        if contents.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&contents).map_err(|source| PersistError::Decode { path, source })
    }

    fn write<T: Serialize>(&self, file: &str, value: &T) -> Result<(), PersistError> {
        let path = self.dir.join(file);
        let io_error = |source: io::Error| PersistError::Io {
            path: self.dir.clone(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(io_error)?;
        let contents = serde_json::to_vec_pretty(value).map_err(PersistError::Encode)?;
        let mut temp_file = NamedTempFile::new_in(&self.dir).map_err(io_error)?;
        temp_file.write_all(&contents).map_err(io_error)?;
        temp_file.as_file_mut().sync_all().map_err(io_error)?;
        temp_file
            .persist(&path)
            .map_err(|source| PersistError::Persist { path, source })?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Clipboard {
    store: OriginStore,
}

impl Clipboard {
    pub fn new(store: OriginStore) -> Self {
        Self { store }
    }

    pub fn entries(&self) -> Result<Vec<ClipboardEntry>, PersistError> {
        self.store.read(CLIPBOARD_FILE)
    }

    /// Whether the paste affordance should be offered. A corrupt file counts
    /// as empty.
    pub fn has_entries(&self) -> bool {
        match self.entries() {
            Ok(entries) => !entries.is_empty(),
            Err(err) => {
                warn!(error = %err, "Ignoring unreadable clipboard");
                false
            }
        }
    }

    pub fn copy(&self, entries: &[ClipboardEntry]) -> Result<(), PersistError> {
        debug!(count = entries.len(), "Copying bundles to clipboard");
        self.store.write(CLIPBOARD_FILE, &entries)
    }

    /// Copy, then hand back the request that removes the source rows.
    pub fn cut(
        &self,
        entries: &[ClipboardEntry],
        item_ids: Vec<i64>,
    ) -> Result<AddItemsRequest, PersistError> {
        self.copy(entries)?;
        Ok(AddItemsRequest::remove("bundle", item_ids))
    }

    /// The insert request for the stored bundles, or `None` when the
    /// clipboard is empty. `None` for the sort key means the top of the
    /// worksheet.
    pub fn paste_request(
        &self,
        after_sort_key: Option<i64>,
    ) -> Result<Option<AddItemsRequest>, PersistError> {
        let entries = self.entries()?;
        if entries.is_empty() {
            return Ok(None);
        }
        let uuids = entries.into_iter().map(|entry| entry.uuid).collect();
        Ok(Some(AddItemsRequest::bundles(
            uuids,
            after_sort_key.unwrap_or(-1),
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidthPreference {
    #[default]
    Default,
    Expanded,
}

impl WidthPreference {
    pub fn toggled(self) -> Self {
        match self {
            WidthPreference::Default => WidthPreference::Expanded,
            WidthPreference::Expanded => WidthPreference::Default,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub width: WidthPreference,
}

#[derive(Debug, Clone)]
pub struct PreferenceStore {
    store: OriginStore,
}

impl PreferenceStore {
    pub fn new(store: OriginStore) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Preferences {
        self.store.read(PREFERENCES_FILE).unwrap_or_else(|err| {
            warn!(error = %err, "Falling back to default preferences");
            Preferences::default()
        })
    }

    pub fn save(&self, preferences: &Preferences) -> Result<(), PersistError> {
        self.store.write(PREFERENCES_FILE, preferences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(uuid: &str) -> ClipboardEntry {
        ClipboardEntry {
            uuid: uuid.to_string(),
            name: format!("name-{uuid}"),
            id: Some(1),
        }
    }

    #[test]
    fn origin_keys_are_directory_safe() {
        assert_eq!(origin_key("https://worksheets.example.org"), "worksheets.example.org");
        assert_eq!(origin_key("http://localhost:2900/rest"), "localhost_2900");
        assert_eq!(origin_key("https://user:pw@Host.io/"), "host.io");
        assert_eq!(origin_key(""), "default");
    }

    #[test]
    fn sessions_on_the_same_origin_share_the_clipboard() {
        let dir = TempDir::new().unwrap();
        let first = Clipboard::new(OriginStore::new(dir.path(), "https://a.example"));
        let second = Clipboard::new(OriginStore::new(dir.path(), "https://a.example/other"));
        let elsewhere = Clipboard::new(OriginStore::new(dir.path(), "https://b.example"));

        assert!(!second.has_entries());
        first.copy(&[entry("U1"), entry("U2")]).unwrap();
        assert!(second.has_entries());
        assert!(!elsewhere.has_entries());

        second.copy(&[entry("U3")]).unwrap();
        assert_eq!(first.entries().unwrap(), vec![entry("U3")]);
    }

    #[test]
    fn paste_request_targets_sort_key_or_top() {
        let dir = TempDir::new().unwrap();
        let clipboard = Clipboard::new(OriginStore::new(dir.path(), "https://a.example"));
        assert_eq!(clipboard.paste_request(Some(100)).unwrap(), None);

        clipboard.copy(&[entry("U3")]).unwrap();
        let request = clipboard.paste_request(Some(100)).unwrap().unwrap();
        assert_eq!(request.items, vec!["U3".to_string()]);
        assert_eq!(request.item_type, "bundle");
        assert_eq!(request.after_sort_key, Some(100));

        let top = clipboard.paste_request(None).unwrap().unwrap();
        assert_eq!(top.after_sort_key, Some(-1));
    }

    #[test]
    fn cut_stores_entries_and_builds_a_removal() {
        let dir = TempDir::new().unwrap();
        let clipboard = Clipboard::new(OriginStore::new(dir.path(), "https://a.example"));
        let removal = clipboard.cut(&[entry("U1")], vec![7, 8]).unwrap();
        assert!(removal.items.is_empty());
        assert_eq!(removal.ids, Some(vec![7, 8]));
        assert_eq!(clipboard.entries().unwrap(), vec![entry("U1")]);
    }

    #[test]
    fn corrupt_clipboard_is_reported_but_treated_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = OriginStore::new(dir.path(), "https://a.example");
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.dir().join(CLIPBOARD_FILE), "{not json").unwrap();
        let clipboard = Clipboard::new(store);
        assert!(matches!(clipboard.entries(), Err(PersistError::Decode { .. })));
        assert!(!clipboard.has_entries());
    }

    #[test]
    fn entries_written_by_other_clients_parse_with_missing_fields() {
        let dir = TempDir::new().unwrap();
        let store = OriginStore::new(dir.path(), "https://a.example");
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.dir().join(CLIPBOARD_FILE), r#"[{"uuid":"U3"}]"#).unwrap();
        let clipboard = Clipboard::new(store);
        let entries = clipboard.entries().unwrap();
        assert_eq!(entries[0].uuid, "U3");
        assert_eq!(entries[0].id, None);
    }

    #[test]
    fn width_preference_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let preferences = PreferenceStore::new(OriginStore::new(dir.path(), "https://a.example"));
        assert_eq!(preferences.load().width, WidthPreference::Default);
        preferences
            .save(&Preferences {
                width: WidthPreference::Default.toggled(),
            })
            .unwrap();
        assert_eq!(preferences.load().width, WidthPreference::Expanded);
        let raw = fs::read_to_string(dir.path().join("origins/a.example/preferences.json")).unwrap();
        assert!(raw.contains("\"expanded\""));
    }
}
