// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Mount Root Health Probe
//!
//! Background task sampling the provisioner's local mount root on a fixed
//! interval. Shares no state with in-flight requests; failures are reported
//! through logs and never suspend provisioning.

use crate::infrastructure::fs::Filesystem;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Interval used by the production binary (matches the upstream probe).
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(300);

/// Spawn the probe loop. Runs until `cancel` fires.
pub fn spawn_health_probe(
    fs: Arc<dyn Filesystem>,
    mount_root: PathBuf,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            match fs.exists(&mount_root).await {
                Ok(true) => debug!(root = %mount_root.display(), "mount root healthy"),
                Ok(false) => {
                    error!(root = %mount_root.display(), "mount root missing, NFS health check failed")
                }
                Err(e) => {
                    error!(root = %mount_root.display(), error = %e, "NFS health check failed")
                }
            }
        }
    })
}
