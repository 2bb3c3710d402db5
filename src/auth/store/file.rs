//! File-based credential storage.

use super::CredentialStore;
use crate::auth::error::AuthError;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// File permissions for the credential file (Unix only): owner read/write.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Directory permissions (Unix only): owner read/write/execute.
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

type Slots = BTreeMap<String, String>;

/// File-based credential storage.
///
/// All slots live in a single JSON object file, so the on-disk layout mirrors
/// a browser's local storage: `{"accessToken": "...", "refreshToken": "..."}`.
/// Every mutation is a read-modify-write under an internal lock, followed by
/// an atomic temp-file rename.
///
/// # Security
/// - File permissions are set to 0600 (owner read/write only) on Unix
/// - Parent directories are created with 0700 permissions
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Create a store backed by the JSON file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Get the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_slots(&self) -> Result<Slots, AuthError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Slots::new()),
            Err(e) => {
                return Err(AuthError::Storage(format!(
                    "Failed to read credential file '{}': {}",
                    self.path.display(),
                    e
                )));
            }
        };

        if content.trim().is_empty() {
            return Ok(Slots::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            AuthError::Storage(format!(
                "Failed to parse credential file '{}': {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Ensure the parent directory exists with correct permissions.
    fn ensure_dir(&self) -> Result<(), AuthError> {
        let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) else {
            return Ok(());
        };
        if dir.exists() {
            return Ok(());
        }

        std::fs::create_dir_all(dir).map_err(|e| {
            AuthError::Storage(format!(
                "Failed to create credential directory '{}': {}",
                dir.display(),
                e
            ))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(DIR_MODE);
            std::fs::set_permissions(dir, perms).map_err(|e| {
                AuthError::Storage(format!(
                    "Failed to set directory permissions on '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    fn write_slots(&self, slots: &Slots) -> Result<(), AuthError> {
        self.ensure_dir()?;

        let content = serde_json::to_string_pretty(slots)
            .map_err(|e| AuthError::Storage(format!("Failed to serialize credentials: {}", e)))?;

        // Write to temp file first, then rename for atomicity.
        let temp_path = self.path.with_extension("tmp");

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(FILE_MODE)
                .open(&temp_path)
                .map_err(|e| {
                    AuthError::Storage(format!(
                        "Failed to create temp file '{}': {}",
                        temp_path.display(),
                        e
                    ))
                })?;
            file.write_all(content.as_bytes()).map_err(|e| {
                AuthError::Storage(format!(
                    "Failed to write temp file '{}': {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.sync_all().map_err(|e| {
                AuthError::Storage(format!(
                    "Failed to sync temp file '{}': {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        #[cfg(not(unix))]
        {
            std::fs::write(&temp_path, &content).map_err(|e| {
                AuthError::Storage(format!(
                    "Failed to write temp file '{}': {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if let Err(e) = std::fs::rename(&temp_path, &self.path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(AuthError::Storage(format!(
                "Failed to rename '{}' to '{}': {}",
                temp_path.display(),
                self.path.display(),
                e
            )));
        }

        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    #[instrument(skip(self))]
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        let _guard = self.lock.lock();
        Ok(self.read_slots()?.remove(key))
    }

    #[instrument(skip(self, value))]
    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        if key.is_empty() {
            return Err(AuthError::Storage("Credential key cannot be empty".to_string()));
        }
        let _guard = self.lock.lock();
        let mut slots = self.read_slots()?;
        slots.insert(key.to_string(), value.to_string());
        self.write_slots(&slots)
    }

    #[instrument(skip(self))]
    fn remove(&self, key: &str) -> Result<bool, AuthError> {
        let _guard = self.lock.lock();
        let mut slots = self.read_slots()?;
        if slots.remove(key).is_none() {
            return Ok(false);
        }
        self.write_slots(&slots)?;
        Ok(true)
    }

    fn name(&self) -> &str {
        "file"
    }
}
