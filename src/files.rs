//! Read-only access to file contents keyed by URI.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use thiserror::Error;
use url::Url;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FileError {
    #[error("file not found")]
    NotFound,
    #[error("'{0}' is not a local file URI")]
    NotLocal(Url),
    #[error("{0}")]
    Io(String),
}

/// Durable content source for files that are not open in the workspace.
pub trait FileResolver: Send + Sync {
    fn read(&self, uri: &Url) -> Result<String, FileError>;
}

/// Reads `file:` URIs from the local filesystem.
#[derive(Clone, Debug, Default)]
pub struct FsFileResolver;

impl FileResolver for FsFileResolver {
    fn read(&self, uri: &Url) -> Result<String, FileError> {
        if uri.scheme() != "file" {
            return Err(FileError::NotLocal(uri.clone()));
        }
        let path = uri
            .to_file_path()
            .map_err(|_| FileError::NotLocal(uri.clone()))?;
        std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FileError::NotFound,
            _ => FileError::Io(e.to_string()),
        })
    }
}

/// A fixed set of files held in memory. Counts reads per URI.
#[derive(Debug, Default)]
pub struct InMemoryFileResolver {
    files: HashMap<Url, String>,
    reads: Mutex<HashMap<Url, usize>>,
    total_reads: AtomicUsize,
}

impl InMemoryFileResolver {
    pub fn new(files: HashMap<Url, String>) -> Self {
        Self {
            files,
            ..Default::default()
        }
    }

    pub fn insert(&mut self, uri: Url, text: impl Into<String>) {
        self.files.insert(uri, text.into());
    }

    /// Number of read attempts for `uri`, successful or not.
    pub fn read_count(&self, uri: &Url) -> usize {
        let reads = self.reads.lock().unwrap_or_else(|e| e.into_inner());
        reads.get(uri).copied().unwrap_or(0)
    }

    pub fn total_reads(&self) -> usize {
        self.total_reads.load(Ordering::Relaxed)
    }
}

impl FileResolver for InMemoryFileResolver {
    fn read(&self, uri: &Url) -> Result<String, FileError> {
        self.total_reads.fetch_add(1, Ordering::Relaxed);
        *self
            .reads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(uri.clone())
            .or_default() += 1;
        self.files.get(uri).cloned().ok_or(FileError::NotFound)
    }
}
