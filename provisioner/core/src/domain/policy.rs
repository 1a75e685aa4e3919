// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Deletion Policy Resolver
//!
//! Decides, per deletion request, whether the backing directory is
//! hard-deleted, retained in place, or archived. The policy is recomputed
//! from the current storage-class parameters on every deletion; the class
//! may have changed since the volume was provisioned.
//!
//! Archival is the safe default: destructive deletion requires explicit
//! opt-in, and an explicit `onDelete` parameter is a higher-priority
//! override for forward compatibility with newer policy naming.

use std::collections::HashMap;
use thiserror::Error;

/// Storage-class parameter naming the reclaim behavior directly.
pub const ON_DELETE_PARAM: &str = "onDelete";
/// Storage-class parameter enabling/disabling archival (boolean).
pub const ARCHIVE_ON_DELETE_PARAM: &str = "archiveOnDelete";

/// What happens to the backing directory when a volume is reclaimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionPolicy {
    /// Recursively delete the directory.
    Delete,
    /// Leave the directory untouched.
    Retain,
    /// Rename the directory under the archive root.
    Archive,
}

/// Policy resolution errors
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid {key} value {value:?}: not a boolean")]
    InvalidParameter { key: &'static str, value: String },
}

/// Resolve the deletion policy from storage-class parameters.
///
/// Precedence, first match wins:
/// 1. `onDelete: delete` / `onDelete: retain`
/// 2. `archiveOnDelete: false` (deletes); unparsable values are a
///    configuration error, never silently defaulted
/// 3. otherwise archive
pub fn resolve(parameters: &HashMap<String, String>) -> Result<DeletionPolicy, PolicyError> {
    match parameters.get(ON_DELETE_PARAM).map(String::as_str) {
        Some("delete") => return Ok(DeletionPolicy::Delete),
        Some("retain") => return Ok(DeletionPolicy::Retain),
        _ => {}
    }

    if let Some(raw) = parameters.get(ARCHIVE_ON_DELETE_PARAM) {
        let archive = parse_bool(raw).ok_or_else(|| PolicyError::InvalidParameter {
            key: ARCHIVE_ON_DELETE_PARAM,
            value: raw.clone(),
        })?;
        if !archive {
            return Ok(DeletionPolicy::Delete);
        }
    }

    Ok(DeletionPolicy::Archive)
}

// Accepts the same spellings as Go's strconv.ParseBool, which is what
// existing storage-class manifests in the wild rely on.
fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn on_delete_delete() {
        let p = params(&[("onDelete", "delete")]);
        assert_eq!(resolve(&p).unwrap(), DeletionPolicy::Delete);
    }

    #[test]
    fn on_delete_wins_over_archive_on_delete() {
        let p = params(&[("onDelete", "retain"), ("archiveOnDelete", "false")]);
        assert_eq!(resolve(&p).unwrap(), DeletionPolicy::Retain);
    }

    #[test]
    fn archive_on_delete_false_deletes() {
        let p = params(&[("archiveOnDelete", "false")]);
        assert_eq!(resolve(&p).unwrap(), DeletionPolicy::Delete);
    }

    #[test]
    fn archive_on_delete_true_archives() {
        let p = params(&[("archiveOnDelete", "true")]);
        assert_eq!(resolve(&p).unwrap(), DeletionPolicy::Archive);
    }

    #[test]
    fn go_style_boolean_spellings_accepted() {
        assert_eq!(
            resolve(&params(&[("archiveOnDelete", "0")])).unwrap(),
            DeletionPolicy::Delete
        );
        assert_eq!(
            resolve(&params(&[("archiveOnDelete", "T")])).unwrap(),
            DeletionPolicy::Archive
        );
    }

    #[test]
    fn unparsable_archive_on_delete_is_an_error() {
        let result = resolve(&params(&[("archiveOnDelete", "notabool")]));
        assert!(matches!(
            result,
            Err(PolicyError::InvalidParameter { key: "archiveOnDelete", .. })
        ));
    }

    #[test]
    fn no_parameters_archives_by_default() {
        assert_eq!(resolve(&HashMap::new()).unwrap(), DeletionPolicy::Archive);
    }

    #[test]
    fn unknown_on_delete_value_falls_through() {
        // Unrecognized onDelete values defer to the archiveOnDelete chain.
        let p = params(&[("onDelete", "shred"), ("archiveOnDelete", "false")]);
        assert_eq!(resolve(&p).unwrap(), DeletionPolicy::Delete);
    }
}
