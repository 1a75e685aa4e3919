// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Directory Lifecycle Manager
//!
//! Creates, permissions, archives and removes the backing directories of
//! provisioned volumes. Every filesystem mutation funnels through the one
//! shared retry budget; there is no partial-success state, only eventual
//! success or terminal failure after the budget is exhausted.
//!
//! Reclaim operations check existence first and treat an absent target as
//! already reconciled, which keeps deletion idempotent under at-least-once
//! delivery. The stat-then-act sequence is racy if two deletions target the
//! same path concurrently; the caller is expected to request deletion at
//! most once per volume, and that assumption is not defended with locking.

use crate::infrastructure::fs::{Filesystem, FsError};
use crate::infrastructure::retry::{RetryBudget, RetryError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Prefix prepended to archived directory basenames.
pub const ARCHIVE_PREFIX: &str = "archived-";

/// World-readable/writable mode applied to fresh volume directories so
/// consumer workloads of unknown uid/gid can write. A deliberate trust
/// trade-off of shared-export provisioning, not a security boundary.
pub const VOLUME_DIR_MODE: u32 = 0o777;

pub struct DirectoryLifecycle {
    fs: Arc<dyn Filesystem>,
    retry: RetryBudget,
}

impl DirectoryLifecycle {
    pub fn new(fs: Arc<dyn Filesystem>, retry: RetryBudget) -> Self {
        Self { fs, retry }
    }

    /// Create `path` and all missing ancestors. Retry-safe: an ancestor
    /// created by an earlier partial attempt is not an error.
    pub async fn create(
        &self,
        cancel: &CancellationToken,
        path: &Path,
    ) -> Result<(), RetryError<FsError>> {
        debug!(path = %path.display(), "creating volume directory");
        let fs = self.fs.as_ref();
        self.retry.run(cancel, move || fs.create_dir_all(path)).await
    }

    /// Open up permissions so arbitrary consumer workloads can write.
    pub async fn set_world_writable(
        &self,
        cancel: &CancellationToken,
        path: &Path,
    ) -> Result<(), RetryError<FsError>> {
        let fs = self.fs.as_ref();
        self.retry
            .run(cancel, move || fs.set_mode(path, VOLUME_DIR_MODE))
            .await
    }

    /// Recursively delete `path`. Absent targets are success: an earlier
    /// attempt may have completed before a crash.
    pub async fn remove(
        &self,
        cancel: &CancellationToken,
        path: &Path,
    ) -> Result<(), RetryError<FsError>> {
        if self.is_absent(path).await {
            info!(path = %path.display(), "directory already absent, delete skipped");
            return Ok(());
        }
        let fs = self.fs.as_ref();
        self.retry
            .run(cancel, move || async move {
                match fs.remove_dir_all(path).await {
                    Err(e) if e.is_not_found() => Ok(()),
                    other => other,
                }
            })
            .await
    }

    /// Rename `path` under the archive root as `archived-<basename>`.
    ///
    /// Returns the archive destination. No collision handling exists if two
    /// volumes share a basename after prior archival; upstream behavior on
    /// collision is unspecified and deliberately left unchanged.
    pub async fn archive(
        &self,
        cancel: &CancellationToken,
        path: &Path,
        archive_root: &Path,
    ) -> Result<PathBuf, RetryError<FsError>> {
        let Some(basename) = path.file_name() else {
            return Err(RetryError::Exhausted {
                attempts: 1,
                source: FsError::Io {
                    path: path.to_path_buf(),
                    message: "path has no basename to archive".to_string(),
                },
            });
        };
        let mut archived = OsString::from(ARCHIVE_PREFIX);
        archived.push(basename);
        let destination = archive_root.join(archived);

        if self.is_absent(path).await {
            info!(path = %path.display(), "directory already absent, archive skipped");
            return Ok(destination);
        }

        debug!(from = %path.display(), to = %destination.display(), "archiving volume directory");
        let fs = self.fs.as_ref();
        let dest = destination.as_path();
        self.retry.run(cancel, move || fs.rename(path, dest)).await?;
        Ok(destination)
    }

    /// Whether the target is missing. Stat errors other than not-found fall
    /// through to the operation itself, which will surface them with retry.
    pub async fn is_absent(&self, path: &Path) -> bool {
        matches!(
            self.fs.exists(path).await,
            Ok(false) | Err(FsError::NotFound(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::fs::MockFilesystem;

    fn lifecycle(fs: Arc<MockFilesystem>) -> DirectoryLifecycle {
        DirectoryLifecycle::new(fs, RetryBudget::default())
    }

    #[tokio::test(start_paused = true)]
    async fn create_twice_succeeds() {
        let fs = Arc::new(MockFilesystem::new());
        let manager = lifecycle(fs.clone());
        let cancel = CancellationToken::new();
        let path = Path::new("/persistentvolumes/ns-claim-pvc-1");

        manager.create(&cancel, path).await.unwrap();
        manager.create(&cancel, path).await.unwrap();
        assert!(fs.contains(path));
    }

    #[tokio::test(start_paused = true)]
    async fn create_survives_transient_failures() {
        let fs = Arc::new(MockFilesystem::new());
        *fs.fail_creates.lock().unwrap() = 2;
        let manager = lifecycle(fs.clone());
        let cancel = CancellationToken::new();

        manager
            .create(&cancel, Path::new("/persistentvolumes/v"))
            .await
            .unwrap();
        assert!(fs.contains("/persistentvolumes/v"));
    }

    #[tokio::test(start_paused = true)]
    async fn create_fails_terminally_after_budget() {
        let fs = Arc::new(MockFilesystem::new());
        *fs.fail_creates.lock().unwrap() = 100;
        let manager = DirectoryLifecycle::new(
            fs,
            RetryBudget {
                attempts: 3,
                initial_delay: std::time::Duration::from_millis(10),
            },
        );
        let cancel = CancellationToken::new();

        let result = manager.create(&cancel, Path::new("/persistentvolumes/v")).await;
        assert!(matches!(
            result,
            Err(RetryError::Exhausted { attempts: 3, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn remove_missing_path_is_success() {
        let fs = Arc::new(MockFilesystem::new());
        let manager = lifecycle(fs);
        let cancel = CancellationToken::new();

        manager
            .remove(&cancel, Path::new("/persistentvolumes/never-existed"))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn archive_renames_under_archive_root() {
        let fs = Arc::new(MockFilesystem::new().with_directory("/persistentvolumes/ns-c-pvc-1"));
        let manager = lifecycle(fs.clone());
        let cancel = CancellationToken::new();

        let destination = manager
            .archive(
                &cancel,
                Path::new("/persistentvolumes/ns-c-pvc-1"),
                Path::new("/persistentvolumes"),
            )
            .await
            .unwrap();

        assert_eq!(
            destination,
            PathBuf::from("/persistentvolumes/archived-ns-c-pvc-1")
        );
        assert!(!fs.contains("/persistentvolumes/ns-c-pvc-1"));
        assert!(fs.contains("/persistentvolumes/archived-ns-c-pvc-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn archive_missing_path_is_success() {
        let fs = Arc::new(MockFilesystem::new());
        let manager = lifecycle(fs);
        let cancel = CancellationToken::new();

        let destination = manager
            .archive(
                &cancel,
                Path::new("/persistentvolumes/gone"),
                Path::new("/persistentvolumes"),
            )
            .await
            .unwrap();
        assert_eq!(destination, PathBuf::from("/persistentvolumes/archived-gone"));
    }

    #[tokio::test(start_paused = true)]
    async fn world_writable_records_mode() {
        let fs = Arc::new(MockFilesystem::new().with_directory("/persistentvolumes/v"));
        let manager = lifecycle(fs.clone());
        let cancel = CancellationToken::new();

        manager
            .set_world_writable(&cancel, Path::new("/persistentvolumes/v"))
            .await
            .unwrap();
        assert_eq!(fs.mode_of("/persistentvolumes/v"), Some(0o777));
    }
}
