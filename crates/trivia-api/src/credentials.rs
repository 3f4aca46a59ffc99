//! Credential storage.
//!
//! The session only needs the bearer token and the username; how they got
//! there (login, registration) is outside this crate. The file store keeps
//! them in `~/.trivia/credentials.json` with 0o600 permissions.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::errors::ApiError;

/// Default credential file name.
const CREDENTIALS_FILE_NAME: &str = "credentials.json";

/// Stored credentials.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// Bearer token for the game API and socket server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Username the token belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// RFC 3339 time of the last save.
    #[serde(default)]
    pub last_updated: String,
}

impl Credentials {
    /// Credentials holding `token` and `username`.
    pub fn new(token: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            username: Some(username.into()),
            last_updated: String::new(),
        }
    }
}

/// Key-value store for the auth token and username.
pub trait CredentialStore: Send + Sync {
    /// Current credentials; empty when nothing is stored.
    fn load(&self) -> Credentials;

    /// Replace the stored credentials.
    fn save(&self, credentials: Credentials) -> Result<(), ApiError>;

    /// Stored token, if any.
    fn token(&self) -> Option<String> {
        self.load().token
    }

    /// Stored username, if any.
    fn username(&self) -> Option<String> {
        self.load().username
    }

    /// Forget everything.
    fn clear(&self) -> Result<(), ApiError> {
        self.save(Credentials::default())
    }
}

// ─── In-memory ───────────────────────────────────────────────────────────────

/// Credentials held in process memory only.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<Credentials>,
}

impl MemoryCredentialStore {
    /// Store pre-filled with `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(Credentials {
                token: Some(token.into()),
                ..Credentials::default()
            }),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Credentials {
        self.inner.read().clone()
    }

    fn save(&self, credentials: Credentials) -> Result<(), ApiError> {
        *self.inner.write() = credentials;
        Ok(())
    }
}

// ─── File ────────────────────────────────────────────────────────────────────

/// Credentials persisted as JSON on disk.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default file name under `data_dir`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(CREDENTIALS_FILE_NAME))
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Credentials {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Credentials::default(),
            Err(e) => {
                tracing::warn!("failed to read credentials file: {e}");
                return Credentials::default();
            }
        };

        serde_json::from_str(&data).unwrap_or_else(|e| {
            tracing::warn!("failed to parse credentials file: {e}");
            Credentials::default()
        })
    }

    fn save(&self, mut credentials: Credentials) -> Result<(), ApiError> {
        credentials.last_updated = chrono::Utc::now().to_rfc3339();

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&credentials)?;
        std::fs::write(&self.path, &json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&self.path, perms);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryCredentialStore::default();
        assert!(store.token().is_none());

        store.save(Credentials::new("tok", "Olajide")).unwrap();
        assert_eq!(store.token().as_deref(), Some("tok"));
        assert_eq!(store.username().as_deref(), Some("Olajide"));

        store.clear().unwrap();
        assert!(store.token().is_none());
    }

    #[test]
    fn memory_store_with_token() {
        let store = MemoryCredentialStore::with_token("abc");
        assert_eq!(store.token().as_deref(), Some("abc"));
        assert!(store.username().is_none());
    }

    #[test]
    fn file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::in_dir(dir.path());
        assert_eq!(store.load(), Credentials::default());
    }

    #[test]
    fn file_store_saves_and_loads() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::in_dir(&dir.path().join("nested"));
        store.save(Credentials::new("tok", "Ada")).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.token.as_deref(), Some("tok"));
        assert_eq!(loaded.username.as_deref(), Some("Ada"));
        assert!(!loaded.last_updated.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn file_store_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::in_dir(dir.path());
        store.save(Credentials::new("tok", "Ada")).unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn file_store_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::in_dir(dir.path());
        std::fs::write(store.path(), "{not json").unwrap();
        assert_eq!(store.load(), Credentials::default());
    }
}
