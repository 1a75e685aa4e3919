// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Filesystem Seam
//!
//! Abstraction over the filesystem primitives the lifecycle manager needs.
//! The network filesystem is assumed to be already mounted at a fixed local
//! path, so the production implementation is plain local I/O; the trait
//! exists so the engine can be driven against an in-memory filesystem in
//! tests. Every primitive surfaces a distinguishable not-found condition
//! separately from other failures.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use mock::MockFilesystem;

/// Filesystem errors
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    #[error("filesystem error at {path}: {message}")]
    Io { path: PathBuf, message: String },
}

impl FsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    fn from_io(path: &Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::Io {
                path: path.to_path_buf(),
                message: err.to_string(),
            }
        }
    }
}

/// Filesystem primitives consumed by the lifecycle manager.
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Create `path` and all missing ancestors. Already-existing is success.
    async fn create_dir_all(&self, path: &Path) -> Result<(), FsError>;

    /// Set POSIX permission bits on `path`.
    async fn set_mode(&self, path: &Path, mode: u32) -> Result<(), FsError>;

    /// Atomically rename `from` to `to`.
    async fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError>;

    /// Recursively delete `path`.
    async fn remove_dir_all(&self, path: &Path) -> Result<(), FsError>;

    /// Whether `path` exists.
    async fn exists(&self, path: &Path) -> Result<bool, FsError>;
}

/// Local filesystem implementation over the already-mounted export.
pub struct LocalFilesystem;

#[async_trait]
impl Filesystem for LocalFilesystem {
    async fn create_dir_all(&self, path: &Path) -> Result<(), FsError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| FsError::from_io(path, e))
    }

    async fn set_mode(&self, path: &Path, mode: u32) -> Result<(), FsError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
                .await
                .map_err(|e| FsError::from_io(path, e))
        }
        #[cfg(not(unix))]
        {
            let _ = (path, mode);
            Ok(())
        }
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        tokio::fs::rename(from, to)
            .await
            .map_err(|e| FsError::from_io(from, e))
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<(), FsError> {
        tokio::fs::remove_dir_all(path)
            .await
            .map_err(|e| FsError::from_io(path, e))
    }

    async fn exists(&self, path: &Path) -> Result<bool, FsError> {
        tokio::fs::try_exists(path)
            .await
            .map_err(|e| FsError::from_io(path, e))
    }
}

mod mock {
    use super::*;
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Mutex;

    /// In-memory filesystem for unit tests.
    ///
    /// Tracks created directories as a sorted set of absolute paths, records
    /// the last mode set per path, and lets tests inject a number of
    /// transient failures per operation to exercise the retry budget.
    #[derive(Default)]
    pub struct MockFilesystem {
        pub directories: Mutex<BTreeSet<PathBuf>>,
        pub modes: Mutex<HashMap<PathBuf, u32>>,
        pub fail_creates: Mutex<u32>,
        pub fail_removes: Mutex<u32>,
        pub fail_renames: Mutex<u32>,
    }

    impl MockFilesystem {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_directory(self, path: impl Into<PathBuf>) -> Self {
            self.directories.lock().unwrap().insert(path.into());
            self
        }

        pub fn contains(&self, path: impl AsRef<Path>) -> bool {
            let path = path.as_ref();
            self.directories
                .lock()
                .unwrap()
                .iter()
                .any(|d| d == path || d.starts_with(path))
        }

        pub fn mode_of(&self, path: impl AsRef<Path>) -> Option<u32> {
            self.modes.lock().unwrap().get(path.as_ref()).copied()
        }

        pub fn is_empty(&self) -> bool {
            self.directories.lock().unwrap().is_empty()
        }

        fn take_failure(counter: &Mutex<u32>, path: &Path) -> Result<(), FsError> {
            let mut remaining = counter.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(FsError::Io {
                    path: path.to_path_buf(),
                    message: "injected transient failure".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Filesystem for MockFilesystem {
        async fn create_dir_all(&self, path: &Path) -> Result<(), FsError> {
            Self::take_failure(&self.fail_creates, path)?;
            self.directories.lock().unwrap().insert(path.to_path_buf());
            Ok(())
        }

        async fn set_mode(&self, path: &Path, mode: u32) -> Result<(), FsError> {
            if !self.contains(path) {
                return Err(FsError::NotFound(path.to_path_buf()));
            }
            self.modes.lock().unwrap().insert(path.to_path_buf(), mode);
            Ok(())
        }

        async fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError> {
            Self::take_failure(&self.fail_renames, from)?;
            let mut dirs = self.directories.lock().unwrap();
            let moved: Vec<PathBuf> = dirs
                .iter()
                .filter(|d| d.starts_with(from))
                .cloned()
                .collect();
            if moved.is_empty() {
                return Err(FsError::NotFound(from.to_path_buf()));
            }
            for old in moved {
                dirs.remove(&old);
                let suffix = old.strip_prefix(from).unwrap_or(&old).to_path_buf();
                dirs.insert(to.join(suffix));
            }
            Ok(())
        }

        async fn remove_dir_all(&self, path: &Path) -> Result<(), FsError> {
            Self::take_failure(&self.fail_removes, path)?;
            let mut dirs = self.directories.lock().unwrap();
            let removed: Vec<PathBuf> = dirs
                .iter()
                .filter(|d| d.starts_with(path))
                .cloned()
                .collect();
            if removed.is_empty() {
                return Err(FsError::NotFound(path.to_path_buf()));
            }
            for dir in removed {
                dirs.remove(&dir);
            }
            Ok(())
        }

        async fn exists(&self, path: &Path) -> Result<bool, FsError> {
            Ok(self.contains(path))
        }
    }
}
