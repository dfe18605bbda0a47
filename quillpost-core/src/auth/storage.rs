//! Token persistence
//!
//! The only durable state the client keeps is the token pair. The file store
//! re-reads the file on every `get`, so several running clients sharing the
//! same data directory see whichever pair was written last.

use super::types::{AuthError, Credentials};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// Persisted key holding the access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Persisted key holding the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

const APP_DIR_NAME: &str = "QuillPost";
const CREDENTIALS_FILE: &str = "credentials.dat";

// Obfuscation only, keeps tokens out of casual `cat` output
const OBFUSCATION_KEY: &[u8] = b"QuillPost2024TokenStore";

/// Durable home of the access/refresh token pair.
///
/// Operations are synchronous and infallible from the caller's point of view;
/// implementations log storage faults instead of surfacing them.
pub trait TokenStore: Send + Sync {
    fn get(&self) -> Credentials;
    fn set(&self, credentials: Credentials);
    fn clear(&self);
}

/// Token store backed by an obfuscated file in the local data directory
pub struct FileTokenStore {
    path: PathBuf,
    // serializes read-modify-write within this process
    io: Mutex<()>,
}

impl FileTokenStore {
    /// Store at `<data_local_dir>/QuillPost/credentials.dat`
    pub fn new() -> Result<Self, AuthError> {
        let data_dir = dirs::data_local_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .ok_or_else(|| {
                AuthError::StorageError("Could not determine data directory".to_string())
            })?;

        Self::at(data_dir.join(CREDENTIALS_FILE))
    }

    /// Store at an explicit file path; the parent directory is created
    pub fn at(path: impl Into<PathBuf>) -> Result<Self, AuthError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AuthError::StorageError(format!("Failed to create data directory: {}", e))
            })?;
        }

        info!("Token store file: {}", path.display());
        Ok(Self {
            path,
            io: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// XOR with a fixed key; applying it twice restores the input
    fn obfuscate(data: &[u8]) -> Vec<u8> {
        data.iter()
            .enumerate()
            .map(|(i, &byte)| byte ^ OBFUSCATION_KEY[i % OBFUSCATION_KEY.len()])
            .collect()
    }

    fn encode(credentials: &Credentials) -> Result<String, AuthError> {
        let json = serde_json::to_string(credentials).map_err(|e| {
            AuthError::StorageError(format!("Failed to serialize credentials: {}", e))
        })?;
        Ok(BASE64.encode(Self::obfuscate(json.as_bytes())))
    }

    fn decode(encoded: &str) -> Result<Credentials, String> {
        let obfuscated = BASE64
            .decode(encoded.trim())
            .map_err(|e| format!("base64: {}", e))?;
        let json = String::from_utf8(Self::obfuscate(&obfuscated))
            .map_err(|e| format!("utf8: {}", e))?;
        serde_json::from_str(&json).map_err(|e| format!("json: {}", e))
    }

    fn read(&self) -> Credentials {
        let encoded = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Credentials::default();
            }
            Err(e) => {
                error!("Failed to read token file: {}", e);
                return Credentials::default();
            }
        };

        match Self::decode(&encoded) {
            Ok(credentials) => credentials,
            Err(e) => {
                error!("Token file is corrupted ({}), discarding it", e);
                let _ = std::fs::remove_file(&self.path);
                Credentials::default()
            }
        }
    }

    fn write(&self, credentials: &Credentials) -> Result<(), AuthError> {
        let encoded = Self::encode(credentials)?;

        // write-then-rename so a concurrent reader never sees half a file
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &encoded).map_err(|e| {
            AuthError::StorageError(format!("Failed to write token file: {}", e))
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            AuthError::StorageError(format!("Failed to replace token file: {}", e))
        })?;

        debug!("Stored credentials ({} bytes)", encoded.len());
        Ok(())
    }

    fn remove(&self) -> Result<(), AuthError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Cleared token file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::StorageError(format!(
                "Failed to delete token file: {}",
                e
            ))),
        }
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Credentials {
        let _guard = self.io.lock();
        self.read()
    }

    fn set(&self, credentials: Credentials) {
        let _guard = self.io.lock();
        if credentials.is_empty() {
            if let Err(e) = self.remove() {
                error!("{}", e);
            }
            return;
        }
        if let Err(e) = self.write(&credentials) {
            error!("{}", e);
        }
    }

    fn clear(&self) {
        let _guard = self.io.lock();
        if let Err(e) = self.remove() {
            warn!("{}", e);
        }
    }
}

/// Process-local token store, for tests and throwaway sessions
#[derive(Default)]
pub struct MemoryTokenStore {
    credentials: Mutex<Credentials>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            credentials: Mutex::new(credentials),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Credentials {
        self.credentials.lock().clone()
    }

    fn set(&self, credentials: Credentials) {
        *self.credentials.lock() = credentials;
    }

    fn clear(&self) {
        *self.credentials.lock() = Credentials::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obfuscation_roundtrip() {
        let original = b"{\"access_token\":\"abc\"}";
        let obfuscated = FileTokenStore::obfuscate(original);
        assert_ne!(obfuscated.as_slice(), original.as_slice());
        let recovered = FileTokenStore::obfuscate(&obfuscated);
        assert_eq!(original.as_slice(), recovered.as_slice());
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::at(dir.path().join("credentials.dat")).unwrap();

        assert!(store.get().is_empty());

        store.set(Credentials::new("A1", "R1"));
        let loaded = store.get();
        assert_eq!(loaded.access.as_deref(), Some("A1"));
        assert_eq!(loaded.refresh.as_deref(), Some("R1"));

        // tokens are not readable in plain text on disk
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(!raw.contains("A1"));

        store.clear();
        assert!(store.get().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.dat");

        FileTokenStore::at(&path)
            .unwrap()
            .set(Credentials::new("A1", "R1"));

        let reopened = FileTokenStore::at(&path).unwrap();
        assert_eq!(reopened.get(), Credentials::new("A1", "R1"));
    }

    #[test]
    fn test_last_writer_wins_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.dat");
        let first = FileTokenStore::at(&path).unwrap();
        let second = FileTokenStore::at(&path).unwrap();

        first.set(Credentials::new("A1", "R1"));
        second.set(Credentials::new("A2", "R1"));

        assert_eq!(first.get().access.as_deref(), Some("A2"));
    }

    #[test]
    fn test_corrupted_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.dat");
        std::fs::write(&path, "definitely not base64 !!!").unwrap();

        let store = FileTokenStore::at(&path).unwrap();
        assert!(store.get().is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_setting_empty_credentials_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::at(dir.path().join("credentials.dat")).unwrap();
        store.set(Credentials::new("A1", "R1"));
        store.set(Credentials::default());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_persisted_keys_match_constants() {
        let encoded = FileTokenStore::encode(&Credentials::new("A1", "R1")).unwrap();
        let json = FileTokenStore::obfuscate(&BASE64.decode(encoded).unwrap());
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value[ACCESS_TOKEN_KEY], "A1");
        assert_eq!(value[REFRESH_TOKEN_KEY], "R1");
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::with_credentials(Credentials::new("A1", "R1"));
        assert_eq!(store.get().access.as_deref(), Some("A1"));
        store.set(Credentials::new("A2", "R1"));
        assert_eq!(store.get().access.as_deref(), Some("A2"));
        store.clear();
        assert!(store.get().is_empty());
    }
}
