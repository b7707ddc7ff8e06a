use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use trellis_unit::LoadError;
use trellis_unit::path::normalize_path;

/// Source of raw resource text. Implementations must surface missing
/// paths as [`LoadError::NotFound`]; no retry or auth behaviour is
/// assumed at this layer.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Adapter name carried into error context.
    fn name(&self) -> &str;

    async fn fetch(&self, path: &str) -> Result<String, LoadError>;
}

/// Backend reading resources from a directory tree.
#[derive(Debug, Clone)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsBackend { root: root.into() }
    }
}

#[async_trait]
impl Backend for FsBackend {
    fn name(&self) -> &str {
        "fs"
    }

    async fn fetch(&self, path: &str) -> Result<String, LoadError> {
        let full = self.root.join(normalize_path(path));
        match tokio::fs::read_to_string(&full).await {
            Ok(text) => Ok(text),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(LoadError::not_found(
                self.name(),
                path,
                format!("no file at {}", full.display()),
            )),
            Err(err) => Err(LoadError::execution(self.name(), path, err.to_string())),
        }
    }
}

/// In-memory backend for tests and embedded deployments.
#[derive(Debug, Default)]
pub struct MemBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemBackend {
    pub fn new() -> Self {
        MemBackend::default()
    }

    pub fn insert(&self, path: impl AsRef<str>, text: impl Into<String>) {
        self.entries
            .lock()
            .unwrap()
            .insert(normalize_path(path.as_ref()), text.into());
    }
}

#[async_trait]
impl Backend for MemBackend {
    fn name(&self) -> &str {
        "mem"
    }

    async fn fetch(&self, path: &str) -> Result<String, LoadError> {
        self.entries
            .lock()
            .unwrap()
            .get(&normalize_path(path))
            .cloned()
            .ok_or_else(|| LoadError::not_found(self.name(), path, "no entry under this path"))
    }
}
