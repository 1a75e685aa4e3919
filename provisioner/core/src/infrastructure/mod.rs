// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Provides mod functionality for the system.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements mod

pub mod fs;
pub mod health;
pub mod outcomes;
pub mod retry;
pub mod storage_class;

pub use fs::{Filesystem, FsError, LocalFilesystem, MockFilesystem};
pub use outcomes::{CountingOutcomeSink, MetricsOutcomeSink, Operation, Outcome, OutcomeSink};
pub use retry::{RetryBudget, RetryError};
pub use storage_class::{ManifestStorageClassStore, StaticStorageClassStore};
