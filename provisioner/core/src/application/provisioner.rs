// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Provisioning Engine Application Service
//!
//! The two entry points exposed to the external controller loop: `provision`
//! allocates and permissions the backing directory and returns the volume
//! record; `delete` reclaims it according to the current storage-class
//! policy.
//!
//! The engine is stateless and safe for unbounded concurrent invocation:
//! each call operates on an independent path and class lookup, and the only
//! shared mutable state is the append-only outcome sink. Two requests for
//! the same path are caller-level misuse and not defended against here.

use crate::domain::claim::{AccessMode, ClaimMetadata, Quantity, STORAGE_RESOURCE};
use crate::domain::paths::{self, PathError};
use crate::domain::policy::{self, DeletionPolicy, PolicyError};
use crate::domain::storage_class::{
    StorageClass, StorageClassLookup, StorageClassLookupError, MOUNT_OPTIONS_PARAM,
    PATH_PATTERN_PARAM,
};
use crate::domain::volume::VolumeRecord;
use crate::application::lifecycle::DirectoryLifecycle;
use crate::infrastructure::fs::{Filesystem, FsError};
use crate::infrastructure::outcomes::{Operation, Outcome, OutcomeSink};
use crate::infrastructure::retry::{RetryBudget, RetryError};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Construction-time configuration, immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    /// NFS server address stamped onto every volume record.
    pub server: String,
    /// Export root as consumer workloads mount it (mounted view base).
    pub export_root: PathBuf,
    /// Local path where the same export is mounted for the provisioner
    /// process (provisioner-root view base).
    pub mount_root: PathBuf,
    /// Root under which archived directories are renamed.
    pub archive_root: PathBuf,
}

impl ProvisionerConfig {
    /// Archive root defaults to the mount root, matching the fixed
    /// `archived-<basename>` sibling naming of the upstream provisioner.
    pub fn new(
        server: impl Into<String>,
        export_root: impl Into<PathBuf>,
        mount_root: impl Into<PathBuf>,
    ) -> Self {
        let mount_root = mount_root.into();
        Self {
            server: server.into(),
            export_root: export_root.into(),
            archive_root: mount_root.clone(),
            mount_root,
        }
    }

    pub fn with_archive_root(mut self, archive_root: impl Into<PathBuf>) -> Self {
        self.archive_root = archive_root.into();
        self
    }
}

/// One provisioning request from the controller loop.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    /// Generated volume name (e.g. "pvc-<uid>"), chosen by the controller.
    pub volume_name: String,
    pub claim: ClaimMetadata,
    pub storage_class: StorageClass,
    pub access_modes: Vec<AccessMode>,
    /// Resource requests from the claim spec; capacity is copied verbatim
    /// from the storage entry, never recomputed.
    pub requests: BTreeMap<String, Quantity>,
}

/// Provisioning errors
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Selector-based binding is incompatible with dynamic path generation.
    /// Permanent: retrying cannot help.
    #[error("claim Selector is not supported")]
    UnsupportedSelector,

    #[error("unable to resolve volume path: {0}")]
    UnsafePath(#[from] PathError),

    #[error("unable to create directory to provision new volume at {path}: {source}")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: RetryError<FsError>,
    },

    #[error("unable to set permissions on new directory {path}: {source}")]
    PermissionSet {
        path: PathBuf,
        #[source]
        source: RetryError<FsError>,
    },
}

/// Deletion errors
#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("unable to get storage class: {0}")]
    StorageClassLookup(#[from] StorageClassLookupError),

    /// Configuration error, surfaced immediately without retry.
    #[error(transparent)]
    InvalidPolicyParameter(#[from] PolicyError),

    #[error("unable to delete directory {path}: {source}")]
    DirectoryDelete {
        path: PathBuf,
        #[source]
        source: RetryError<FsError>,
    },

    #[error("unable to archive directory {path}: {source}")]
    ArchiveRename {
        path: PathBuf,
        #[source]
        source: RetryError<FsError>,
    },
}

pub struct ProvisioningEngine {
    config: ProvisionerConfig,
    lifecycle: DirectoryLifecycle,
    classes: Arc<dyn StorageClassLookup>,
    outcomes: Arc<dyn OutcomeSink>,
}

impl ProvisioningEngine {
    pub fn new(
        config: ProvisionerConfig,
        fs: Arc<dyn Filesystem>,
        classes: Arc<dyn StorageClassLookup>,
        outcomes: Arc<dyn OutcomeSink>,
        retry: RetryBudget,
    ) -> Self {
        Self {
            config,
            lifecycle: DirectoryLifecycle::new(fs, retry),
            classes,
            outcomes,
        }
    }

    /// Provision the backing directory for a claim and build its record.
    ///
    /// Exactly one outcome counter increment per call, regardless of how
    /// many retry attempts ran inside the failing step.
    pub async fn provision(
        &self,
        cancel: &CancellationToken,
        request: ProvisionRequest,
    ) -> Result<VolumeRecord, ProvisionError> {
        let result = self.provision_inner(cancel, request).await;
        self.outcomes
            .record(Operation::Provision, outcome_of(result.is_ok()));
        result
    }

    /// Reclaim a previously provisioned volume per the current class policy.
    pub async fn delete(
        &self,
        cancel: &CancellationToken,
        record: &VolumeRecord,
    ) -> Result<(), DeleteError> {
        let result = self.delete_inner(cancel, record).await;
        self.outcomes
            .record(Operation::Delete, outcome_of(result.is_ok()));
        result
    }

    async fn provision_inner(
        &self,
        cancel: &CancellationToken,
        request: ProvisionRequest,
    ) -> Result<VolumeRecord, ProvisionError> {
        if request.claim.selector.is_some() {
            warn!(
                namespace = %request.claim.namespace,
                claim = %request.claim.name,
                "rejecting claim with selector"
            );
            return Err(ProvisionError::UnsupportedSelector);
        }

        let pattern = request
            .storage_class
            .parameters
            .get(PATH_PATTERN_PARAM)
            .map(String::as_str);
        let resolved = paths::resolve(
            &self.config.mount_root,
            &self.config.export_root,
            &request.claim,
            &request.volume_name,
            pattern,
        )?;

        info!(path = %resolved.local.display(), "creating path");
        self.lifecycle
            .create(cancel, &resolved.local)
            .await
            .map_err(|source| ProvisionError::DirectoryCreate {
                path: resolved.local.clone(),
                source,
            })?;

        self.lifecycle
            .set_world_writable(cancel, &resolved.local)
            .await
            .map_err(|source| ProvisionError::PermissionSet {
                path: resolved.local.clone(),
                source,
            })?;

        let mut mount_options = request.storage_class.mount_options.clone();
        if let Some(csv) = request.storage_class.parameters.get(MOUNT_OPTIONS_PARAM) {
            // Appended, not deduplicated; duplicates are tolerated downstream.
            mount_options.extend(csv.split(',').map(str::to_string));
        }

        let capacity = request
            .requests
            .get(STORAGE_RESOURCE)
            .cloned()
            .unwrap_or_default();

        info!(
            volume = %request.volume_name,
            path = %resolved.exported.display(),
            "volume provisioned"
        );

        Ok(VolumeRecord {
            name: request.volume_name,
            server: self.config.server.clone(),
            path: resolved.exported,
            storage_class: request.storage_class.name,
            access_modes: request.access_modes,
            capacity,
            mount_options,
            reclaim_policy: request.storage_class.reclaim_policy,
            provisioned_at: Utc::now(),
        })
    }

    async fn delete_inner(
        &self,
        cancel: &CancellationToken,
        record: &VolumeRecord,
    ) -> Result<(), DeleteError> {
        // Lifecycle operations act on the provisioner's own filesystem, so
        // the local view is re-derived from the mounted view on the record.
        let local = self.local_view(&record.path);

        if self.lifecycle.is_absent(&local).await {
            warn!(path = %local.display(), "path does not exist, deletion skipped");
            return Ok(());
        }

        let class = self.classes.get(&record.storage_class).await?;

        match policy::resolve(&class.parameters)? {
            DeletionPolicy::Delete => {
                self.lifecycle
                    .remove(cancel, &local)
                    .await
                    .map_err(|source| DeleteError::DirectoryDelete {
                        path: local.clone(),
                        source,
                    })?;
                info!(path = %local.display(), "volume directory deleted");
            }
            DeletionPolicy::Retain => {
                info!(path = %local.display(), "volume directory retained");
            }
            DeletionPolicy::Archive => {
                let destination = self
                    .lifecycle
                    .archive(cancel, &local, &self.config.archive_root)
                    .await
                    .map_err(|source| DeleteError::ArchiveRename {
                        path: local.clone(),
                        source,
                    })?;
                info!(
                    from = %local.display(),
                    to = %destination.display(),
                    "volume directory archived"
                );
            }
        }
        Ok(())
    }

    /// Fixed-prefix substitution from the mounted view to the local view.
    /// Paths outside the export root pass through unchanged, as upstream.
    fn local_view(&self, exported: &Path) -> PathBuf {
        match exported.strip_prefix(&self.config.export_root) {
            Ok(relative) => self.config.mount_root.join(relative),
            Err(_) => exported.to_path_buf(),
        }
    }
}

fn outcome_of(ok: bool) -> Outcome {
    if ok {
        Outcome::Success
    } else {
        Outcome::Failure
    }
}
