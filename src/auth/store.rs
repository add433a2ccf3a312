use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::credential::{keys, Credential};
use super::error::AuthError;

/// Durable key/value persistence for the session credential.
///
/// Implementors provide the three primitives; the credential-level operations
/// are built on top of them. `put` must apply all entries or none.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError>;
    fn put(&self, entries: &[(&str, &str)]) -> Result<(), AuthError>;
    fn clear(&self) -> Result<(), AuthError>;

    fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        self.put(&[
            (keys::ACCESS_TOKEN, credential.access_token.as_str()),
            (keys::REFRESH_TOKEN, credential.refresh_token.as_str()),
            (keys::SUBJECT_ID, credential.subject_id.as_str()),
            (keys::DISPLAY_NAME, credential.display_name.as_str()),
        ])
    }

    /// Load the full credential, or `None` when any required field is missing.
    fn load(&self) -> Result<Option<Credential>, AuthError> {
        let (Some(access_token), Some(refresh_token), Some(subject_id)) = (
            self.get(keys::ACCESS_TOKEN)?,
            self.get(keys::REFRESH_TOKEN)?,
            self.get(keys::SUBJECT_ID)?,
        ) else {
            return Ok(None);
        };
        Ok(Some(Credential {
            subject_id,
            access_token,
            refresh_token,
            display_name: self.get(keys::DISPLAY_NAME)?.unwrap_or_default(),
        }))
    }

    fn load_access_token(&self) -> Result<Option<String>, AuthError> {
        self.get(keys::ACCESS_TOKEN)
    }

    fn load_refresh_token(&self) -> Result<Option<String>, AuthError> {
        self.get(keys::REFRESH_TOKEN)
    }

    fn save_access_token(&self, token: &str) -> Result<(), AuthError> {
        self.put(&[(keys::ACCESS_TOKEN, token)])
    }
}

/// File-backed credential store using a single TOML file.
///
/// Writes go to a sibling temp file which is synced, then renamed over the
/// previous file. A crash never leaves a half-written credential behind.
///
/// # Example
/// ```no_run
/// use ecg_sync::auth::{Credential, CredentialStore, FileCredentialStore};
///
/// let store = FileCredentialStore::new("/tmp/ecg-sync/session.toml");
/// store.save(&Credential {
///     subject_id: "7".into(),
///     access_token: "access".into(),
///     refresh_token: "refresh".into(),
///     display_name: "Ana".into(),
/// })?;
/// assert!(store.load_access_token()?.is_some());
/// # Ok::<(), ecg_sync::auth::AuthError>(())
/// ```
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<Option<CredentialFile>, AuthError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AuthError::Io(err.to_string())),
        };
        Ok(Some(toml::from_str(&raw)?))
    }

    fn write_file(&self, file: &CredentialFile) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = toml::to_string(file)?;
        let tmp = self.path.with_extension("toml.tmp");
        {
            let mut out = fs::File::create(&tmp)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                out.set_permissions(fs::Permissions::from_mode(0o600))?;
            }
            out.write_all(serialized.as_bytes())?;
            out.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, ()> {
        // The guarded value is `()`, so a poisoned lock carries no broken state.
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        let _guard = self.guard();
        Ok(self
            .read_file()?
            .and_then(|mut file| file.entries.remove(key)))
    }

    fn put(&self, entries: &[(&str, &str)]) -> Result<(), AuthError> {
        let _guard = self.guard();
        let mut file = self.read_file()?.unwrap_or_default();
        for (key, value) in entries {
            file.entries.insert((*key).to_string(), (*value).to_string());
        }
        file.saved_at = Utc::now();
        self.write_file(&file)
    }

    fn clear(&self) -> Result<(), AuthError> {
        let _guard = self.guard();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::Io(err.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CredentialFile {
    version: u32,
    saved_at: DateTime<Utc>,
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

impl Default for CredentialFile {
    fn default() -> Self {
        Self {
            version: 1,
            saved_at: Utc::now(),
            entries: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, FileCredentialStore) {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(dir.path().join("nested").join("session.toml"));
        (dir, store)
    }

    fn credential() -> Credential {
        Credential {
            subject_id: "7".to_string(),
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            display_name: "Ana".to_string(),
        }
    }

    #[test]
    fn missing_file_means_signed_out() {
        let (_dir, store) = temp_store();
        assert!(store.load().unwrap().is_none());
        assert!(store.load_access_token().unwrap().is_none());
    }

    #[test]
    fn credential_survives_a_new_store_instance() {
        let (dir, store) = temp_store();
        store.save(&credential()).unwrap();

        let reopened = FileCredentialStore::new(store.path().to_path_buf());
        assert_eq!(reopened.load().unwrap(), Some(credential()));
        drop(dir);
    }

    #[test]
    fn save_access_token_keeps_other_fields() {
        let (_dir, store) = temp_store();
        store.save(&credential()).unwrap();
        store.save_access_token("fresh").unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.access_token, "fresh");
        assert_eq!(loaded.refresh_token, "refresh");
        assert_eq!(loaded.subject_id, "7");
    }

    #[test]
    fn clear_removes_file_and_is_idempotent() {
        let (_dir, store) = temp_store();
        store.save(&credential()).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(!store.path().exists());
        assert!(store.load_refresh_token().unwrap().is_none());
    }

    #[test]
    fn no_temp_file_is_left_behind() {
        let (_dir, store) = temp_store();
        store.save(&credential()).unwrap();
        assert!(!store.path().with_extension("toml.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn file_is_private_to_the_owner() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, store) = temp_store();
        store.save(&credential()).unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
