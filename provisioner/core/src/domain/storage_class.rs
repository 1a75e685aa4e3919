// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Storage Class Value Objects and Lookup Seam
//!
//! A storage class is a named bundle of provisioning parameters selected by
//! a claim. The lookup trait is the anti-corruption layer towards the
//! cluster control plane: deletion always consults the *current* class
//! state, never a snapshot captured at provisioning time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Storage-class parameter carrying a custom path pattern.
pub const PATH_PATTERN_PARAM: &str = "pathPattern";
/// Storage-class parameter carrying extra mount options as CSV.
pub const MOUNT_OPTIONS_PARAM: &str = "mountOptions";

/// Named bundle of provisioning parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageClass {
    pub name: String,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    #[serde(default)]
    pub mount_options: Vec<String>,
    #[serde(default)]
    pub reclaim_policy: ReclaimPolicy,
}

impl StorageClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Reclaim policy stamped onto provisioned volume records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReclaimPolicy {
    #[default]
    Delete,
    Retain,
}

/// Storage-class lookup errors
#[derive(Debug, Error)]
pub enum StorageClassLookupError {
    #[error("storage class {0:?} not found")]
    NotFound(String),

    #[error("storage class lookup failed: {0}")]
    Backend(String),
}

/// Lookup seam towards the cluster control plane.
///
/// Implementations must reflect the current class state on every call; the
/// class parameters may have changed between provisioning and reclaim.
#[async_trait]
pub trait StorageClassLookup: Send + Sync {
    async fn get(&self, name: &str) -> Result<StorageClass, StorageClassLookupError>;
}
