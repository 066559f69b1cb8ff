//! Stable per-scope session identifiers.
//!
//! A session id is created on first use and persisted through a
//! [`SessionStorage`] so that later lookups in the same scope return the same
//! value. Storage problems never block the caller: they are logged and an
//! ephemeral id is handed out instead.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tempfile::NamedTempFile;
use tracing::{debug, warn};
use uuid::Builder;

pub const SESSION_ID_KEY: &str = "chatterbox_session_id";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
pub enum SessionError {
    /// The backing store could not be read or written.
    Unavailable {
        path: Option<PathBuf>,
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl SessionError {
    fn unavailable(path: &Path, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        SessionError::Unavailable {
            path: Some(path.to_path_buf()),
            source: source.into(),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Unavailable {
                path: Some(path),
                source,
            } => write!(
                f,
                "Session storage at {} is unavailable: {}",
                path.display(),
                source
            ),
            SessionError::Unavailable { path: None, source } => {
                write!(f, "Session storage is unavailable: {source}")
            }
        }
    }
}

impl StdError for SessionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            SessionError::Unavailable { source, .. } => Some(source.as_ref()),
        }
    }
}

/// Scope-local key/value store holding the session id.
pub trait SessionStorage: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, SessionError>;
    fn store(&self, key: &str, value: &str) -> Result<(), SessionError>;
}

/// Storage that lives only as long as the value itself.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn load(&self, key: &str) -> Result<Option<String>, SessionError> {
        let entries = self.entries.lock().map_err(|err| SessionError::Unavailable {
            path: None,
            source: err.to_string().into(),
        })?;
        Ok(entries.get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let mut entries = self.entries.lock().map_err(|err| SessionError::Unavailable {
            path: None,
            source: err.to_string().into(),
        })?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Storage backed by a small TOML table on disk.
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_table(&self) -> Result<HashMap<String, String>, SessionError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let contents =
            fs::read_to_string(&self.path).map_err(|err| SessionError::unavailable(&self.path, err))?;
        toml::from_str(&contents).map_err(|err| SessionError::unavailable(&self.path, err))
    }
}

impl SessionStorage for FileSessionStorage {
    fn load(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.read_table()?.remove(key))
    }

    fn store(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let mut table = self.read_table()?;
        table.insert(key.to_string(), value.to_string());

        let parent = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty());
        if let Some(dir) = parent {
            fs::create_dir_all(dir).map_err(|err| SessionError::unavailable(&self.path, err))?;
        }

        let contents =
            toml::to_string(&table).map_err(|err| SessionError::unavailable(&self.path, err))?;
        let mut temp_file = NamedTempFile::new_in(parent.unwrap_or(Path::new(".")))
            .map_err(|err| SessionError::unavailable(&self.path, err))?;
        temp_file
            .write_all(contents.as_bytes())
            .map_err(|err| SessionError::unavailable(&self.path, err))?;
        temp_file
            .persist(&self.path)
            .map_err(|err| SessionError::unavailable(&self.path, err.error))?;
        Ok(())
    }
}

/// Resolves the session id for a scope, creating it on first use.
pub struct SessionIdentity;

impl SessionIdentity {
    pub fn get_or_create(storage: &dyn SessionStorage) -> SessionId {
        match storage.load(SESSION_ID_KEY) {
            Ok(Some(existing)) if !existing.trim().is_empty() => {
                return SessionId(existing.trim().to_string());
            }
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "Session storage unreadable; using an ephemeral session id");
                return generate_session_id();
            }
        }

        let id = generate_session_id();
        match storage.store(SESSION_ID_KEY, id.as_str()) {
            Ok(()) => debug!(session_id = %id, "Created session id"),
            Err(err) => {
                warn!(error = %err, "Session id could not be persisted; it will not survive restarts")
            }
        }
        id
    }
}

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Random UUIDv4 id.
pub fn generate_session_id() -> SessionId {
    let mut bytes = [0_u8; 16];
    if let Err(err) = getrandom::fill(&mut bytes) {
        warn!(error = %err, "OS randomness unavailable; deriving session id from the clock");
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let counter = FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed);
        bytes[..8].copy_from_slice(&(nanos as u64).to_le_bytes());
        bytes[8..].copy_from_slice(&(counter ^ std::process::id() as u64).to_le_bytes());
    }
    SessionId(Builder::from_random_bytes(bytes).into_uuid().to_string())
}
