//! Pending image attachment and its preview handle.
//!
//! A [`PreviewHandle`] is a revocable reference into a [`PreviewRegistry`],
//! comparable to a `blob:` URL. Handles are move-only and release their
//! registry entry when dropped, so a handle can be released at most once and
//! cannot be used afterwards. [`AttachmentManager`] is the only owner of the
//! live handle.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::debug;

use crate::core::message::ImageRef;

pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Default)]
struct RegistryState {
    blobs: HashMap<u64, Arc<[u8]>>,
    next_id: u64,
    allocated: u64,
    released: u64,
}

/// Registry of live preview blobs.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn allocate(&self, bytes: Arc<[u8]>) -> PreviewHandle {
        let mut state = self.lock();
        state.next_id += 1;
        state.allocated += 1;
        let id = state.next_id;
        state.blobs.insert(id, bytes);
        debug!(preview_id = id, "Allocated attachment preview");
        PreviewHandle {
            id,
            url: format!("blob:chatterbox/{id}"),
            registry: Arc::downgrade(&self.state),
        }
    }

    /// Bytes behind a live handle.
    pub fn resolve(&self, handle: &PreviewHandle) -> Option<Arc<[u8]>> {
        self.lock().blobs.get(&handle.id).cloned()
    }

    pub fn allocated(&self) -> u64 {
        self.lock().allocated
    }

    pub fn released(&self) -> u64 {
        self.lock().released
    }

    pub fn live(&self) -> usize {
        self.lock().blobs.len()
    }
}

/// Move-only reference to a preview blob; dropping it revokes the blob.
#[derive(Debug)]
pub struct PreviewHandle {
    id: u64,
    url: String,
    registry: Weak<Mutex<RegistryState>>,
}

impl PreviewHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        let Some(state) = self.registry.upgrade() else {
            return;
        };
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.blobs.remove(&self.id).is_some() {
            state.released += 1;
            debug!(preview_id = self.id, "Released attachment preview");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Arc<[u8]>,
}

impl AttachmentFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, inferring its media type from the extension.
    pub fn from_path(path: &Path) -> Result<Self, AttachmentError> {
        let bytes = fs::read(path).map_err(|source| AttachmentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let media_type = mime_guess::from_path(path)
            .first()
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        Ok(Self::new(name, media_type, bytes))
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }
}

#[derive(Debug)]
pub enum AttachmentError {
    /// The selected file could not be read.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The selected file is not an image.
    NotAnImage { name: String, media_type: String },
    /// The selected file exceeds the configured size limit.
    TooLarge { name: String, size: u64, limit: u64 },
}

impl fmt::Display for AttachmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentError::Read { path, source } => {
                write!(f, "Failed to read attachment {}: {}", path.display(), source)
            }
            AttachmentError::NotAnImage { name, media_type } => {
                write!(f, "{name} is not an image ({media_type})")
            }
            AttachmentError::TooLarge { name, size, limit } => {
                write!(f, "{name} is {size} bytes; the limit is {limit} bytes")
            }
        }
    }
}

impl StdError for AttachmentError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            AttachmentError::Read { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Selected {
    file: AttachmentFile,
    preview: PreviewHandle,
}

/// Owner of the single pending attachment.
#[derive(Debug)]
pub struct AttachmentManager {
    registry: PreviewRegistry,
    max_bytes: u64,
    current: Option<Selected>,
}

impl AttachmentManager {
    pub fn new(registry: PreviewRegistry, max_bytes: u64) -> Self {
        Self {
            registry,
            max_bytes,
            current: None,
        }
    }

    pub fn registry(&self) -> &PreviewRegistry {
        &self.registry
    }

    /// Replace the pending attachment. The previous preview is released before
    /// the new one is allocated; a rejected file leaves the current selection
    /// in place.
    pub fn select(&mut self, file: AttachmentFile) -> Result<&PreviewHandle, AttachmentError> {
        if !file.is_image() {
            return Err(AttachmentError::NotAnImage {
                name: file.name,
                media_type: file.media_type,
            });
        }
        if file.len() > self.max_bytes {
            return Err(AttachmentError::TooLarge {
                size: file.len(),
                name: file.name,
                limit: self.max_bytes,
            });
        }

        self.release_current();
        let preview = self.registry.allocate(Arc::clone(&file.bytes));
        let selected = self.current.insert(Selected { file, preview });
        Ok(&selected.preview)
    }

    /// Drop the pending attachment. Returns whether anything was released.
    pub fn remove(&mut self) -> bool {
        self.release_current()
    }

    /// Same as [`remove`](Self::remove); used after a successful submission.
    pub fn clear(&mut self) -> bool {
        self.release_current()
    }

    fn release_current(&mut self) -> bool {
        // Dropping `Selected` drops its preview handle, which revokes it.
        self.current.take().is_some()
    }

    pub fn is_present(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&AttachmentFile> {
        self.current.as_ref().map(|s| &s.file)
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.current.as_ref().map(|s| &s.preview)
    }

    pub fn preview_url(&self) -> Option<&str> {
        self.preview().map(PreviewHandle::url)
    }

    /// Image reference that outlives the preview handle.
    pub fn image_ref(&self) -> Option<ImageRef> {
        self.current.as_ref().map(|s| ImageRef {
            name: s.file.name.clone(),
            media_type: s.file.media_type.clone(),
            bytes: Arc::clone(&s.file.bytes),
        })
    }
}
