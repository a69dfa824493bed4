//! In-memory file overlay.
//!
//! Entries added here shadow the real file system for the session that
//! holds a handle. Nothing is ever written to disk.

use std::io;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;

type FileTable = Arc<DashMap<String, Arc<[u8]>>>;

#[derive(Clone, Debug, Default)]
pub struct VirtualFileSystem {
    files: FileTable,
}

impl VirtualFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` under `name`, replacing any previous entry.
    pub fn add_file(&self, name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        let name = name.into();
        let bytes = bytes.into();
        tracing::trace!(file = %name, size = bytes.len(), "vfs entry added");
        self.files.insert(name, bytes);
    }

    /// A handle that sees this overlay, then the real file system.
    pub fn handle(&self) -> FileSystemHandle {
        FileSystemHandle {
            files: Arc::clone(&self.files),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FileSystemHandle {
    files: FileTable,
}

impl FileSystemHandle {
    pub fn read(&self, name: &str) -> io::Result<Arc<[u8]>> {
        if let Some(entry) = self.files.get(name) {
            return Ok(Arc::clone(entry.value()));
        }
        std::fs::read(Path::new(name)).map(Arc::from)
    }

    pub fn read_to_string(&self, name: &str) -> io::Result<String> {
        let bytes = self.read(name)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Whether `name` is an overlay entry. The real file system is not
    /// consulted.
    pub fn is_virtual(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.is_virtual(name) || Path::new(name).is_file()
    }
}
