// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Provides mod functionality for the system.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Implements mod

pub mod lifecycle;
pub mod provisioner;

pub use lifecycle::DirectoryLifecycle;
pub use provisioner::{
    DeleteError, ProvisionError, ProvisionRequest, ProvisionerConfig, ProvisioningEngine,
};
