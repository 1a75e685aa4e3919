// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Storage Class Stores
//!
//! Concrete implementations of the `StorageClassLookup` seam. The manifest
//! store reads Kubernetes-style `StorageClass` YAML manifests from a
//! directory on every lookup, so parameter changes made after provisioning
//! are visible at deletion time. The static store backs tests and
//! single-class deployments.

use crate::domain::storage_class::{StorageClass, StorageClassLookup, StorageClassLookupError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::warn;

/// In-memory storage-class source.
///
/// Interior mutability lets tests swap parameters between provision and
/// delete, mirroring a class edited in the cluster.
#[derive(Default)]
pub struct StaticStorageClassStore {
    classes: RwLock<HashMap<String, StorageClass>>,
}

impl StaticStorageClassStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(self, class: StorageClass) -> Self {
        self.insert(class);
        self
    }

    pub fn insert(&self, class: StorageClass) {
        self.classes
            .write()
            .expect("storage class store poisoned")
            .insert(class.name.clone(), class);
    }
}

#[async_trait]
impl StorageClassLookup for StaticStorageClassStore {
    async fn get(&self, name: &str) -> Result<StorageClass, StorageClassLookupError> {
        self.classes
            .read()
            .map_err(|e| StorageClassLookupError::Backend(e.to_string()))?
            .get(name)
            .cloned()
            .ok_or_else(|| StorageClassLookupError::NotFound(name.to_string()))
    }
}

/// Kubernetes-style StorageClass manifest (apiVersion/kind/metadata).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageClassManifest {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: ManifestMetadata,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    #[serde(default, rename = "mountOptions")]
    pub mount_options: Vec<String>,
    #[serde(default, rename = "reclaimPolicy")]
    pub reclaim_policy: crate::domain::storage_class::ReclaimPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,
}

impl From<StorageClassManifest> for StorageClass {
    fn from(manifest: StorageClassManifest) -> Self {
        StorageClass {
            name: manifest.metadata.name,
            parameters: manifest.parameters,
            mount_options: manifest.mount_options,
            reclaim_policy: manifest.reclaim_policy,
        }
    }
}

/// Directory-of-manifests storage-class source.
pub struct ManifestStorageClassStore {
    dir: PathBuf,
}

impl ManifestStorageClassStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn is_manifest(path: &Path) -> bool {
        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        )
    }
}

#[async_trait]
impl StorageClassLookup for ManifestStorageClassStore {
    async fn get(&self, name: &str) -> Result<StorageClass, StorageClassLookupError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| StorageClassLookupError::Backend(e.to_string()))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageClassLookupError::Backend(e.to_string()))?
        {
            let path = entry.path();
            if !Self::is_manifest(&path) {
                continue;
            }
            let raw = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| StorageClassLookupError::Backend(e.to_string()))?;
            let manifest: StorageClassManifest = match serde_yaml::from_str(&raw) {
                Ok(manifest) => manifest,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unparsable manifest");
                    continue;
                }
            };
            if manifest.kind != "StorageClass" {
                continue;
            }
            if manifest.metadata.name == name {
                return Ok(manifest.into());
            }
        }

        Err(StorageClassLookupError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
apiVersion: storage.k8s.io/v1
kind: StorageClass
metadata:
  name: nfs-client
reclaimPolicy: Delete
mountOptions:
  - nfsvers=4.1
parameters:
  archiveOnDelete: "false"
  pathPattern: "${.PVC.namespace}/${.PVC.name}"
"#;

    #[tokio::test]
    async fn static_store_reflects_updates() {
        let store =
            StaticStorageClassStore::new().with_class(StorageClass::new("nfs-client"));

        let class = store.get("nfs-client").await.unwrap();
        assert!(class.parameters.is_empty());

        store.insert(StorageClass::new("nfs-client").with_parameter("onDelete", "retain"));
        let class = store.get("nfs-client").await.unwrap();
        assert_eq!(class.parameters.get("onDelete").unwrap(), "retain");
    }

    #[tokio::test]
    async fn static_store_not_found() {
        let store = StaticStorageClassStore::new();
        let result = store.get("missing").await;
        assert!(matches!(result, Err(StorageClassLookupError::NotFound(_))));
    }

    #[tokio::test]
    async fn manifest_store_parses_storage_class() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("nfs-client.yaml"), MANIFEST).unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "not a manifest").unwrap();

        let store = ManifestStorageClassStore::new(tmp.path());
        let class = store.get("nfs-client").await.unwrap();

        assert_eq!(class.name, "nfs-client");
        assert_eq!(class.mount_options, vec!["nfsvers=4.1".to_string()]);
        assert_eq!(
            class.parameters.get("pathPattern").unwrap(),
            "${.PVC.namespace}/${.PVC.name}"
        );
    }

    #[tokio::test]
    async fn manifest_store_skips_garbage_and_misses() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("broken.yaml"), ": not yaml {").unwrap();

        let store = ManifestStorageClassStore::new(tmp.path());
        let result = store.get("nfs-client").await;
        assert!(matches!(result, Err(StorageClassLookupError::NotFound(_))));
    }
}
