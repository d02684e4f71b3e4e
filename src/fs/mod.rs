// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::Path;

pub mod mock;

/// Filesystem operations the supervisor needs while bootstrapping.
pub trait FileSystem: Send + Sync + Debug {
    /// Create `path` and any missing parents. Succeeds if it already exists.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    fn is_dir(&self, path: &Path) -> bool;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}
