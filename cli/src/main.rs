// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # NFS Subdir Provisioner CLI
//!
//! The `nfs-provisioner` binary wires the provisioning engine to its
//! environment: configuration from flags and environment variables, storage
//! classes from a directory of YAML manifests, structured logs, and a
//! Prometheus endpoint in `serve` mode.
//!
//! ## Commands
//!
//! - `nfs-provisioner provision` - Allocate a volume directory for a claim
//!   and emit its volume record as YAML
//! - `nfs-provisioner delete` - Reclaim a volume from its record file
//! - `nfs-provisioner serve` - Run the mount-root health probe and the
//!   Prometheus metrics listener
//!
//! The controller loop that watches claims and invokes provision/delete
//! lives outside this binary; each command is a single engine invocation.

use anyhow::{Context, Result};
use clap::builder::TypedValueParser as _;
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use nfs_subdir_provisioner_core::application::{
    ProvisionRequest, ProvisionerConfig, ProvisioningEngine,
};
use nfs_subdir_provisioner_core::claim::{AccessMode, ClaimMetadata, Quantity, STORAGE_RESOURCE};
use nfs_subdir_provisioner_core::infrastructure::health::{
    spawn_health_probe, DEFAULT_PROBE_INTERVAL,
};
use nfs_subdir_provisioner_core::infrastructure::{
    LocalFilesystem, ManifestStorageClassStore, MetricsOutcomeSink, RetryBudget,
};
use nfs_subdir_provisioner_core::storage_class::StorageClassLookup;
use nfs_subdir_provisioner_core::volume::VolumeRecord;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// NFS subdir provisioner - dynamic volume directories on a shared export
#[derive(Parser)]
#[command(name = "nfs-provisioner")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// NFS server address stamped onto volume records
    #[arg(long, global = true, env = "NFS_SERVER", default_value = "")]
    nfs_server: String,

    /// Export root as consumers mount it (e.g. /export)
    #[arg(
        long,
        global = true,
        env = "NFS_PATH",
        default_value = "",
        value_parser = clap::builder::OsStringValueParser::new().map(PathBuf::from)
    )]
    nfs_path: PathBuf,

    /// Local path where the export is mounted for this process
    #[arg(
        long,
        global = true,
        env = "NFS_MOUNT_PATH",
        default_value = "/persistentvolumes"
    )]
    mount_path: PathBuf,

    /// Directory of StorageClass YAML manifests
    #[arg(
        long,
        global = true,
        env = "NFS_CLASS_DIR",
        default_value = "/etc/nfs-provisioner/classes"
    )]
    class_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "NFS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision a volume directory for a claim and print its record
    Provision {
        /// Claim namespace
        #[arg(long)]
        namespace: String,

        /// Claim name
        #[arg(long)]
        claim: String,

        /// Storage class name (must exist under --class-dir)
        #[arg(long)]
        storage_class: String,

        /// Volume name; generated as pvc-<uuid> when omitted
        #[arg(long)]
        volume_name: Option<String>,

        /// Claim label as key=value (repeatable)
        #[arg(long = "label", value_parser = parse_key_val)]
        labels: Vec<(String, String)>,

        /// Claim annotation as key=value (repeatable)
        #[arg(long = "annotation", value_parser = parse_key_val)]
        annotations: Vec<(String, String)>,

        /// Requested access mode (repeatable)
        #[arg(long = "access-mode", default_value = "ReadWriteMany")]
        access_modes: Vec<String>,

        /// Requested storage capacity (copied verbatim, e.g. 10Gi)
        #[arg(long, default_value = "")]
        storage: String,

        /// Write the volume record here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Reclaim a volume from its record file per the current class policy
    Delete {
        /// Volume record YAML emitted by provision
        record: PathBuf,
    },

    /// Run the health probe and the Prometheus metrics endpoint
    Serve {
        /// Prometheus listen address
        #[arg(long, env = "NFS_METRICS_ADDR", default_value = "0.0.0.0:8080")]
        metrics_addr: SocketAddr,

        /// Seconds between mount-root health probes
        #[arg(long, default_value_t = DEFAULT_PROBE_INTERVAL.as_secs())]
        probe_interval_secs: u64,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {:?}", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.clone())),
        )
        .init();

    // Cancellation fans out from Ctrl-C; in-flight filesystem operations are
    // allowed to finish, further retry attempts are not started.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Provision {
            namespace,
            claim,
            storage_class,
            volume_name,
            labels,
            annotations,
            access_modes,
            storage,
            output,
        } => {
            let engine = build_engine(&cli.nfs_server, &cli.nfs_path, &cli.mount_path, &cli.class_dir)?;
            let classes = ManifestStorageClassStore::new(&cli.class_dir);
            let class = classes
                .get(&storage_class)
                .await
                .context("loading storage class")?;

            let mut meta = ClaimMetadata::new(namespace, claim);
            meta.labels.extend(labels);
            meta.annotations.extend(annotations);

            let access_modes = access_modes
                .iter()
                .map(|s| s.parse::<AccessMode>().map_err(anyhow::Error::msg))
                .collect::<Result<Vec<_>>>()?;

            let mut requests = BTreeMap::new();
            if !storage.is_empty() {
                requests.insert(STORAGE_RESOURCE.to_string(), Quantity::new(storage));
            }

            let request = ProvisionRequest {
                volume_name: volume_name
                    .unwrap_or_else(|| format!("pvc-{}", Uuid::new_v4())),
                claim: meta,
                storage_class: class,
                access_modes,
                requests,
            };

            let record = engine
                .provision(&cancel, request)
                .await
                .context("provisioning failed")?;
            emit_record(&record, output.as_deref())?;
        }

        Commands::Delete { record } => {
            let engine = build_engine(&cli.nfs_server, &cli.nfs_path, &cli.mount_path, &cli.class_dir)?;
            let raw = std::fs::read_to_string(&record)
                .with_context(|| format!("reading record {}", record.display()))?;
            let record: VolumeRecord =
                serde_yaml::from_str(&raw).context("parsing volume record")?;

            engine
                .delete(&cancel, &record)
                .await
                .context("deletion failed")?;
            info!(volume = %record.name, "volume reclaimed");
        }

        Commands::Serve {
            metrics_addr,
            probe_interval_secs,
        } => {
            PrometheusBuilder::new()
                .with_http_listener(metrics_addr)
                .install()
                .context("installing Prometheus exporter")?;
            info!(addr = %metrics_addr, "metrics endpoint listening");

            let probe = spawn_health_probe(
                Arc::new(LocalFilesystem),
                cli.mount_path.clone(),
                Duration::from_secs(probe_interval_secs),
                cancel.clone(),
            );

            cancel.cancelled().await;
            probe.await.ok();
            info!("shutting down");
        }
    }

    Ok(())
}

fn build_engine(
    nfs_server: &str,
    nfs_path: &std::path::Path,
    mount_path: &std::path::Path,
    class_dir: &std::path::Path,
) -> Result<ProvisioningEngine> {
    if nfs_server.is_empty() {
        anyhow::bail!("NFS_SERVER not set");
    }
    if nfs_path.as_os_str().is_empty() {
        anyhow::bail!("NFS_PATH not set");
    }

    let config = ProvisionerConfig::new(nfs_server, nfs_path, mount_path);
    Ok(ProvisioningEngine::new(
        config,
        Arc::new(LocalFilesystem),
        Arc::new(ManifestStorageClassStore::new(class_dir)),
        Arc::new(MetricsOutcomeSink),
        RetryBudget::default(),
    ))
}

fn emit_record(record: &VolumeRecord, output: Option<&std::path::Path>) -> Result<()> {
    let yaml = serde_yaml::to_string(record).context("serializing volume record")?;
    match output {
        Some(path) => std::fs::write(path, yaml)
            .with_context(|| format!("writing record to {}", path.display()))?,
        None => print!("{}", yaml),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_provision_invocation() {
        let cli = Cli::try_parse_from([
            "nfs-provisioner",
            "--nfs-server",
            "nfs.example.com",
            "--nfs-path",
            "/export",
            "provision",
            "--namespace",
            "default",
            "--claim",
            "data",
            "--storage-class",
            "nfs-client",
            "--label",
            "team=storage",
        ])
        .unwrap();

        match cli.command {
            Commands::Provision {
                namespace,
                claim,
                labels,
                ..
            } => {
                assert_eq!(namespace, "default");
                assert_eq!(claim, "data");
                assert_eq!(labels, vec![("team".to_string(), "storage".to_string())]);
            }
            _ => panic!("expected provision command"),
        }
    }

    #[test]
    fn key_val_parser_rejects_missing_separator() {
        assert!(parse_key_val("team=storage").is_ok());
        assert!(parse_key_val("teamstorage").is_err());
    }
}
