// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Provides mod functionality for the system.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Implements mod

pub mod claim;
pub mod paths;
pub mod policy;
pub mod storage_class;
pub mod template;
pub mod volume;
