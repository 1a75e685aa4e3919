// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Volume Record
//!
//! The persisted outcome of provisioning. Created exactly once by
//! `Provision`, stored by the external controller, and read back unmodified
//! by `Delete`. The `path` field is the mounted view; the provisioner-root
//! view is re-derived from it at deletion time by fixed-prefix substitution.

use crate::domain::claim::{AccessMode, Quantity};
use crate::domain::storage_class::ReclaimPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRecord {
    /// Generated volume name.
    pub name: String,
    /// Network-filesystem server address.
    pub server: String,
    /// Backing directory, mounted view (under the export root).
    pub path: PathBuf,
    /// Name of the storage class this volume was provisioned from.
    pub storage_class: String,
    pub access_modes: Vec<AccessMode>,
    /// Capacity copied verbatim from the claim's storage request.
    pub capacity: Quantity,
    /// Class mount options plus the per-class CSV parameter, appended
    /// without deduplication; duplicates are tolerated downstream.
    pub mount_options: Vec<String>,
    pub reclaim_policy: ReclaimPolicy,
    pub provisioned_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_round_trips_through_yaml() {
        let record = VolumeRecord {
            name: "pvc-123".to_string(),
            server: "nfs.example.com".to_string(),
            path: PathBuf::from("/export/default-data-pvc-123"),
            storage_class: "nfs-client".to_string(),
            access_modes: vec![AccessMode::ReadWriteMany],
            capacity: Quantity::new("10Gi"),
            mount_options: vec!["nfsvers=4.1".to_string(), "hard".to_string()],
            reclaim_policy: ReclaimPolicy::Delete,
            provisioned_at: Utc::now(),
        };

        let yaml = serde_yaml::to_string(&record).unwrap();
        let back: VolumeRecord = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.name, record.name);
        assert_eq!(back.path, record.path);
        assert_eq!(back.capacity, record.capacity);
        assert_eq!(back.mount_options, record.mount_options);
    }
}
