// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Metadata Templater
//!
//! Resolves `${.PVC.<field>}`, `${.PVC.labels.<key>}` and
//! `${.PVC.annotations.<key>}` placeholders in a path pattern against claim
//! metadata. A deliberately small single-pass scanner rather than a general
//! template engine: the grammar has exactly three token shapes and no
//! escaping mechanism, so a literal `${.PVC.` sequence cannot be emitted.
//!
//! Substitution is driven by token order within the pattern, never by map
//! iteration order, so output is deterministic. A key absent from the
//! relevant map substitutes the empty string; missing metadata is not an
//! error at this layer.

use crate::domain::claim::ClaimMetadata;

const TOKEN_OPEN: &str = "${.PVC.";
const TOKEN_CLOSE: char = '}';

const LABELS_PREFIX: &str = "labels.";
const ANNOTATIONS_PREFIX: &str = "annotations.";

/// Resolve every placeholder in `pattern` against `meta`.
///
/// Patterns without placeholders come back unchanged. An unterminated token
/// (`${.PVC.` with no closing brace) is passed through verbatim.
pub fn resolve(pattern: &str, meta: &ClaimMetadata) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;

    while let Some(start) = rest.find(TOKEN_OPEN) {
        out.push_str(&rest[..start]);
        let body = &rest[start + TOKEN_OPEN.len()..];
        match body.find(TOKEN_CLOSE) {
            Some(end) => {
                out.push_str(lookup(meta, &body[..end]));
                rest = &body[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn lookup<'a>(meta: &'a ClaimMetadata, expr: &str) -> &'a str {
    let value = if let Some(key) = expr.strip_prefix(LABELS_PREFIX) {
        meta.labels.get(key).map(String::as_str)
    } else if let Some(key) = expr.strip_prefix(ANNOTATIONS_PREFIX) {
        meta.annotations.get(key).map(String::as_str)
    } else {
        meta.bare_field(expr)
    };
    value.unwrap_or("")
}
