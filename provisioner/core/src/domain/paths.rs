// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Path Resolver
//!
//! Turns claim metadata and an optional storage-class path pattern into the
//! two views of the backing directory: the path as the provisioner process
//! sees it under its local mount root, and the path as it will appear inside
//! the served volume under the export root. Both always share the same
//! relative suffix.
//!
//! Traversal sanitization here is a security invariant, not a formatting
//! detail: label and annotation values are caller-controlled, and a resolved
//! path escaping either base directory would hand arbitrary filesystem
//! locations to the lifecycle manager.

use crate::domain::claim::ClaimMetadata;
use crate::domain::template;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Path resolution errors
#[derive(Debug, Error)]
pub enum PathError {
    #[error("resolved path {0:?} contains a parent-directory segment")]
    Traversal(String),

    #[error("resolved path is empty")]
    Empty,
}

/// The same logical directory under the two roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Provisioner-root view: where the lifecycle manager operates.
    pub local: PathBuf,
    /// Mounted view: what consumer workloads will mount, persisted on the
    /// volume record.
    pub exported: PathBuf,
}

/// Resolve the directory for a provisioning request.
///
/// Without a pattern (or when the pattern resolves to the empty string,
/// which callers treat as "no override") the relative path is
/// `<namespace>-<claim>-<generated>`. A pattern that resolves non-empty
/// replaces it.
pub fn resolve(
    mount_root: &Path,
    export_root: &Path,
    claim: &ClaimMetadata,
    generated_name: &str,
    pattern: Option<&str>,
) -> Result<ResolvedPath, PathError> {
    let mut relative = format!("{}-{}-{}", claim.namespace, claim.name, generated_name);

    if let Some(pattern) = pattern {
        let custom = template::resolve(pattern, claim);
        if !custom.is_empty() {
            relative = custom;
        }
    }

    let relative = sanitize_relative(&relative)?;
    Ok(ResolvedPath {
        local: mount_root.join(&relative),
        exported: export_root.join(&relative),
    })
}

/// Reduce a raw relative path to plain normal components.
///
/// `.` segments and leading roots are dropped; any `..` segment rejects the
/// whole path rather than being silently resolved.
fn sanitize_relative(raw: &str) -> Result<PathBuf, PathError> {
    let mut clean = PathBuf::new();
    for component in Path::new(raw).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => return Err(PathError::Traversal(raw.to_string())),
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(PathError::Empty);
    }
    Ok(clean)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots() -> (PathBuf, PathBuf) {
        (
            PathBuf::from("/persistentvolumes"),
            PathBuf::from("/export"),
        )
    }

    #[test]
    fn default_naming_without_pattern() {
        let (mount, export) = roots();
        let claim = ClaimMetadata::new("default", "data");
        let resolved = resolve(&mount, &export, &claim, "pvc-123", None).unwrap();
        assert_eq!(
            resolved.local,
            PathBuf::from("/persistentvolumes/default-data-pvc-123")
        );
        assert_eq!(resolved.exported, PathBuf::from("/export/default-data-pvc-123"));
    }

    #[test]
    fn pattern_overrides_default_naming() {
        let (mount, export) = roots();
        let claim = ClaimMetadata::new("b", "a");
        let resolved = resolve(
            &mount,
            &export,
            &claim,
            "pvc-123",
            Some("${.PVC.namespace}/${.PVC.name}"),
        )
        .unwrap();
        assert_eq!(resolved.local, PathBuf::from("/persistentvolumes/b/a"));
        assert_eq!(resolved.exported, PathBuf::from("/export/b/a"));
    }

    #[test]
    fn empty_pattern_resolution_falls_back() {
        let (mount, export) = roots();
        let claim = ClaimMetadata::new("default", "data");
        // Pattern referencing an absent annotation resolves empty: no override.
        let resolved = resolve(
            &mount,
            &export,
            &claim,
            "pvc-123",
            Some("${.PVC.annotations.subdir}"),
        )
        .unwrap();
        assert_eq!(
            resolved.exported,
            PathBuf::from("/export/default-data-pvc-123")
        );
    }

    #[test]
    fn traversal_segments_rejected() {
        let (mount, export) = roots();
        let mut claim = ClaimMetadata::new("default", "data");
        claim
            .annotations
            .insert("subdir".to_string(), "../../etc".to_string());
        let result = resolve(
            &mount,
            &export,
            &claim,
            "pvc-123",
            Some("${.PVC.annotations.subdir}"),
        );
        assert!(matches!(result, Err(PathError::Traversal(_))));
    }

    #[test]
    fn leading_root_and_curdir_stripped() {
        let (mount, export) = roots();
        let claim = ClaimMetadata::new("b", "a");
        let resolved = resolve(&mount, &export, &claim, "pvc-1", Some("/shares/./a")).unwrap();
        assert_eq!(resolved.local, PathBuf::from("/persistentvolumes/shares/a"));
        assert_eq!(resolved.exported, PathBuf::from("/export/shares/a"));
    }

    #[test]
    fn identical_relative_suffix_under_both_roots() {
        let (mount, export) = roots();
        let claim = ClaimMetadata::new("ns", "claim");
        let resolved = resolve(&mount, &export, &claim, "pvc-9", None).unwrap();
        assert_eq!(
            resolved.local.strip_prefix(&mount).unwrap(),
            resolved.exported.strip_prefix(&export).unwrap()
        );
    }
}
