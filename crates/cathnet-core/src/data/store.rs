use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("No remote source is configured")]
    NotConfigured,
    #[error("'{0}' was not found in the remote store")]
    NotFound(String),
    #[error("Request failed: {0}")]
    Request(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A content store that can deliver domain source files by name.
///
/// `fetch` must leave either a complete file at `destination` or no file at all.
pub trait RemoteStore: Send + Sync {
    fn fetch(&self, file_name: &str, destination: &Path) -> Result<(), FetchError>;
}

/// A store that never delivers anything, for runs that must use local data only.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineStore;

impl RemoteStore for OfflineStore {
    fn fetch(&self, _file_name: &str, _destination: &Path) -> Result<(), FetchError> {
        Err(FetchError::NotConfigured)
    }
}

/// A store backed by another directory, such as a shared network mount.
#[derive(Debug, Clone)]
pub struct MirrorStore {
    source: PathBuf,
}

impl MirrorStore {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

impl RemoteStore for MirrorStore {
    fn fetch(&self, file_name: &str, destination: &Path) -> Result<(), FetchError> {
        let source = self.source.join(file_name);
        if !source.is_file() {
            return Err(FetchError::NotFound(file_name.to_string()));
        }
        let partial = partial_path(destination);
        fs::copy(&source, &partial)?;
        fs::rename(&partial, destination)?;
        Ok(())
    }
}

/// The temporary path a download is written to before being moved into place.
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}
