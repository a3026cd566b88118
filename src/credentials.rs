//! Local credential storage.
//!
//! The transport reads the bearer token from a [`CredentialStore`] before every
//! request and purges it when the backend answers 401.  The token itself is
//! issued elsewhere; this crate only keeps and forgets it.

use std::io::ErrorKind;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use utf8path::Path;

use crate::error::{Error, Result};

/// What the client remembers about the signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    /// Bearer token attached to every request.
    pub token: String,

    /// Profile returned at sign-in, kept opaque.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<serde_json::Value>,
}

impl Credentials {
    /// Credentials consisting of just a token.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user: None,
        }
    }
}

/// Somewhere to keep the signed-in user's credentials between requests.
pub trait CredentialStore: Send + Sync {
    /// The bearer token, if the user is signed in.
    fn token(&self) -> Option<String>;

    /// Remember `credentials`, replacing whatever was there.
    fn store(&self, credentials: Credentials) -> Result<()>;

    /// Forget the token and the user profile.
    fn clear(&self) -> Result<()>;
}

/// Credentials held in process memory.
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    inner: Mutex<Option<Credentials>>,
}

impl MemoryCredentials {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that starts out signed in with `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(Some(Credentials::from_token(token))),
        }
    }

    /// The full credentials, if any.
    pub fn credentials(&self) -> Option<Credentials> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Credentials>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStore for MemoryCredentials {
    fn token(&self) -> Option<String> {
        self.lock().as_ref().map(|c| c.token.clone())
    }

    fn store(&self, credentials: Credentials) -> Result<()> {
        *self.lock() = Some(credentials);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.lock() = None;
        Ok(())
    }
}

/// Credentials persisted as a JSON file.
///
/// A missing file means nobody is signed in.  An unreadable or corrupt file
/// is treated the same way for reads, so a damaged file never wedges the
/// client; `clear` removes it.
#[derive(Debug, Clone)]
pub struct FileCredentials {
    path: Path<'static>,
}

impl FileCredentials {
    /// Keep credentials at `path`.
    pub fn new(path: impl AsRef<str>) -> Self {
        Self {
            path: Path::from(path.as_ref()).into_owned(),
        }
    }

    /// Where the credentials live.
    pub fn path(&self) -> &Path<'static> {
        &self.path
    }

    /// Read the credentials file.
    pub fn load(&self) -> Result<Option<Credentials>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(Error::io(
                    format!("failed to read credentials from {}", self.path.as_str()),
                    err,
                ));
            }
        };
        let credentials = serde_json::from_str(&content).map_err(|err| {
            Error::serialization("failed to parse credentials file", Some(Box::new(err)))
        })?;
        Ok(Some(credentials))
    }
}

impl CredentialStore for FileCredentials {
    fn token(&self) -> Option<String> {
        self.load().ok().flatten().map(|c| c.token)
    }

    fn store(&self, credentials: Credentials) -> Result<()> {
        let content = serde_json::to_string_pretty(&credentials)?;
        write_private(&self.path, content.as_bytes()).map_err(|err| {
            Error::io(
                format!("failed to write credentials to {}", self.path.as_str()),
                err,
            )
        })
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::io(
                format!("failed to remove credentials at {}", self.path.as_str()),
                err,
            )),
        }
    }
}

/// Write `content` to `path`, readable and writable by the owner only.
#[cfg(unix)]
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::fs::{OpenOptions, Permissions};
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode only applies on creation; tighten files left by older versions.
    file.set_permissions(Permissions::from_mode(0o600))?;
    file.write_all(content)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> String {
        let dir = std::env::temp_dir();
        format!(
            "{}/chatsync-{}-{}.json",
            dir.display(),
            name,
            std::process::id()
        )
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryCredentials::new();
        assert_eq!(store.token(), None);
        store.store(Credentials::from_token("abc")).unwrap();
        assert_eq!(store.token().as_deref(), Some("abc"));
        store.clear().unwrap();
        assert_eq!(store.token(), None);
        assert_eq!(store.credentials(), None);
    }

    #[test]
    fn file_store_missing_file_is_signed_out() {
        let store = FileCredentials::new(scratch_path("missing"));
        assert_eq!(store.token(), None);
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn file_store_persists_and_clears() {
        let path = scratch_path("persist");
        let store = FileCredentials::new(&path);
        let credentials = Credentials {
            token: "tok".to_string(),
            user: Some(serde_json::json!({"email": "a@example.com"})),
        };
        store.store(credentials.clone()).unwrap();

        let reopened = FileCredentials::new(&path);
        assert_eq!(reopened.token().as_deref(), Some("tok"));
        assert_eq!(reopened.load().unwrap(), Some(credentials));

        reopened.clear().unwrap();
        assert_eq!(store.token(), None);
        assert!(!std::path::Path::new(&path).exists());
    }

    #[cfg(unix)]
    #[test]
    fn file_store_is_private_to_the_owner() {
        use std::os::unix::fs::PermissionsExt;

        let path = scratch_path("private");
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        let store = FileCredentials::new(&path);
        store.store(Credentials::from_token("secret")).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.token().as_deref(), Some("secret"));
        store.clear().unwrap();

        store.store(Credentials::from_token("fresh")).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        store.clear().unwrap();
    }

    #[test]
    fn file_store_corrupt_file_reads_as_signed_out() {
        let path = scratch_path("corrupt");
        std::fs::write(&path, "not json").unwrap();
        let store = FileCredentials::new(&path);
        assert_eq!(store.token(), None);
        assert!(store.load().is_err());
        store.clear().unwrap();
    }
}
