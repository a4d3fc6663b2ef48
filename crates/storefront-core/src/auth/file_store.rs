use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::credentials::{
    CookiePolicy, CredentialError, CredentialStore, StoredCredential, TokenKind,
};

/// Credentials file name in cache directory
const CREDENTIALS_FILE: &str = "credentials.json";

type Entries = HashMap<TokenKind, StoredCredential>;

/// Token store backed by a single JSON document on disk.
///
/// Every operation re-reads the file, so a token written by another process
/// is visible on the next `get`. Writes go to a temporary file that is renamed
/// over the document, so a reader sees either the old or the new contents.
pub struct FileCredentialStore {
    path: PathBuf,
    policy: CookiePolicy,
    // Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            path: cache_dir.join(CREDENTIALS_FILE),
            policy: CookiePolicy::default(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Entries, CredentialError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, entries: &Entries) -> Result<(), CredentialError> {
        if entries.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            };
        }
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), entries)?;
        tmp.as_file().sync_all()?;
        restrict_permissions(tmp.path())?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl CredentialStore for FileCredentialStore {
    fn set(&self, kind: TokenKind, value: &str, ttl_days: i64) -> Result<(), CredentialError> {
        let _guard = self.lock.lock();
        // An unreadable file is replaced rather than blocking the write
        let mut entries = self.load().unwrap_or_else(|e| {
            warn!(error = %e, path = ?self.path, "Discarding unreadable credentials file");
            Entries::new()
        });
        entries.insert(kind, StoredCredential::new(value, ttl_days, self.policy)?);
        self.save(&entries)?;
        debug!(token = %kind, ttl_days, "Stored credential");
        Ok(())
    }

    fn get(&self, kind: TokenKind) -> Option<String> {
        let _guard = self.lock.lock();
        let entries = match self.load() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, path = ?self.path, "Failed to read credentials file");
                return None;
            }
        };
        match entries.get(&kind) {
            Some(entry) if !entry.is_expired() => Some(entry.value.clone()),
            Some(_) => {
                debug!(token = %kind, "Credential expired");
                None
            }
            None => None,
        }
    }

    fn remove(&self, kind: TokenKind) -> Result<(), CredentialError> {
        let _guard = self.lock.lock();
        let mut entries = match self.load() {
            Ok(entries) => entries,
            Err(CredentialError::Serialize(_)) => Entries::new(),
            Err(e) => return Err(e),
        };
        if entries.remove(&kind).is_some() || entries.is_empty() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().to_path_buf());
        store.set(TokenKind::AccessToken, "access-1", 1).unwrap();
        store.set(TokenKind::RefreshToken, "refresh-1", 7).unwrap();

        let reopened = FileCredentialStore::new(dir.path().to_path_buf());
        assert_eq!(reopened.get(TokenKind::AccessToken).as_deref(), Some("access-1"));
        assert_eq!(reopened.get(TokenKind::RefreshToken).as_deref(), Some("refresh-1"));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("nested"));
        store.remove(TokenKind::RefreshToken).unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn test_clear_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().to_path_buf());
        store.set(TokenKind::AccessToken, "a", 1).unwrap();
        store.set(TokenKind::RefreshToken, "r", 7).unwrap();
        store.clear();
        assert!(!store.path().exists());
        assert_eq!(store.get(TokenKind::AccessToken), None);
    }

    #[test]
    fn test_corrupt_file_reads_as_absent_and_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().to_path_buf());
        std::fs::write(store.path(), "not json").unwrap();
        assert_eq!(store.get(TokenKind::AccessToken), None);

        store.set(TokenKind::AccessToken, "fresh", 1).unwrap();
        assert_eq!(store.get(TokenKind::AccessToken).as_deref(), Some("fresh"));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().to_path_buf());
        store.set(TokenKind::AccessToken, "a", 1).unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_concurrent_writers_leave_one_written_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileCredentialStore::new(dir.path().to_path_buf()));
        let written: Vec<String> = (0..8).map(|i| format!("token-{}", i)).collect();

        thread::scope(|scope| {
            for value in &written {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    for _ in 0..10 {
                        store.set(TokenKind::AccessToken, value, 1).unwrap();
                    }
                });
            }
        });

        let contents = std::fs::read_to_string(store.path()).unwrap();
        let entries: Entries = serde_json::from_str(&contents).unwrap();
        let stored = &entries[&TokenKind::AccessToken].value;
        assert!(written.contains(stored));
        assert_eq!(store.get(TokenKind::AccessToken).as_ref(), Some(stored));
    }

    #[test]
    fn test_readers_never_see_partial_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        FileCredentialStore::new(path.clone())
            .set(TokenKind::RefreshToken, "seed", 7)
            .unwrap();

        thread::scope(|scope| {
            for i in 0..4 {
                let writer = FileCredentialStore::new(path.clone());
                scope.spawn(move || {
                    for n in 0..25 {
                        let value = format!("writer-{}-{}", i, n);
                        writer.set(TokenKind::RefreshToken, &value, 7).unwrap();
                    }
                });
            }
            let reader = FileCredentialStore::new(path.clone());
            scope.spawn(move || {
                for _ in 0..100 {
                    let entries = reader.load().unwrap();
                    assert!(entries.contains_key(&TokenKind::RefreshToken));
                }
            });
        });
    }

    #[test]
    fn test_no_temporary_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().to_path_buf());
        store.set(TokenKind::AccessToken, "a", 1).unwrap();
        store.set(TokenKind::AccessToken, "b", 1).unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(CREDENTIALS_FILE)]);
    }
}
