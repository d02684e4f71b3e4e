// src/fs/mock.rs

use super::FileSystem;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// In-memory filesystem that records directory creation.
///
/// Clones share state, so a test can keep one clone for inspection and hand
/// another to the supervisor.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    created: Arc<Mutex<Vec<PathBuf>>>,
    failing: Arc<Mutex<HashSet<PathBuf>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `create_dir_all` call for `path` fail with
    /// `PermissionDenied`.
    pub fn fail_on(&self, path: impl AsRef<Path>) {
        let mut failing = self.failing.lock().unwrap();
        failing.insert(path.as_ref().to_path_buf());
    }

    /// Directories created so far, in call order.
    pub fn created(&self) -> Vec<PathBuf> {
        self.created.lock().unwrap().clone()
    }
}

impl FileSystem for MockFileSystem {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        if self.failing.lock().unwrap().contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("mock: cannot create {}", path.display()),
            ));
        }

        let mut created = self.created.lock().unwrap();
        if !created.iter().any(|p| p == path) {
            created.push(path.to_path_buf());
        }
        Ok(())
    }

    fn is_dir(&self, path: &Path) -> bool {
        let created = self.created.lock().unwrap();
        created.iter().any(|p| p.starts_with(path))
    }
}
