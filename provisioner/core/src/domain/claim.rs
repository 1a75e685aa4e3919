// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Claim Value Objects
//!
//! Immutable snapshot of the persistent volume claim fields the provisioner
//! reads. Built once per provisioning request, never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Resource name under which claims request storage capacity.
pub const STORAGE_RESOURCE: &str = "storage";

/// Metadata snapshot of a storage claim.
///
/// Only the fields consumed by path templating and provisioning decisions
/// are carried; the rest of the claim object stays with the controller loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimMetadata {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    /// Label selector from the claim spec, if any. Selector-based binding is
    /// incompatible with dynamic path generation and rejects the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
}

impl ClaimMetadata {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    /// Look up a bare template field (`name`, `namespace`).
    ///
    /// Unknown fields yield `None`, which templating renders as the empty
    /// string rather than an error.
    pub fn bare_field(&self, field: &str) -> Option<&str> {
        match field {
            "name" => Some(self.name.as_str()),
            "namespace" => Some(self.namespace.as_str()),
            _ => None,
        }
    }
}

/// Label selector carried by a claim spec.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelSelector {
    #[serde(default, rename = "matchLabels")]
    pub match_labels: HashMap<String, String>,
}

/// Volume access mode requested by the claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    ReadWriteOnce,
    ReadOnlyMany,
    ReadWriteMany,
    ReadWriteOncePod,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ReadWriteOnce => "ReadWriteOnce",
            Self::ReadOnlyMany => "ReadOnlyMany",
            Self::ReadWriteMany => "ReadWriteMany",
            Self::ReadWriteOncePod => "ReadWriteOncePod",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for AccessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ReadWriteOnce" => Ok(Self::ReadWriteOnce),
            "ReadOnlyMany" => Ok(Self::ReadOnlyMany),
            "ReadWriteMany" => Ok(Self::ReadWriteMany),
            "ReadWriteOncePod" => Ok(Self::ReadWriteOncePod),
            other => Err(format!("unknown access mode: {}", other)),
        }
    }
}

/// Opaque resource quantity (e.g. "10Gi").
///
/// Copied verbatim from the claim's storage request onto the volume record;
/// the provisioner never recomputes or rounds it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity(pub String);

impl Quantity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
