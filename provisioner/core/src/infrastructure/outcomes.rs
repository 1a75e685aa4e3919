// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Outcome Counters
//!
//! Process-wide monotonically increasing counters keyed by operation and
//! result. The sink is injected into the engine rather than being a global
//! so unit tests observe counts deterministically; the production sink
//! forwards to the `metrics` facade and is scraped via Prometheus.
//!
//! Recording is fire-and-forget: it must never block or fail the calling
//! operation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counter name for provisioning attempts.
pub const PROVISION_ATTEMPTS_TOTAL: &str = "nfs_provision_attempts_total";
/// Counter name for deletion attempts.
pub const DELETE_ATTEMPTS_TOTAL: &str = "nfs_delete_attempts_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Provision,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Sink for completed-request outcomes.
pub trait OutcomeSink: Send + Sync {
    fn record(&self, op: Operation, outcome: Outcome);
}

/// Production sink emitting over the `metrics` facade.
///
/// Counter names and the `result` label match the upstream provisioner's
/// Prometheus series, so existing dashboards keep working.
pub struct MetricsOutcomeSink;

impl OutcomeSink for MetricsOutcomeSink {
    fn record(&self, op: Operation, outcome: Outcome) {
        let name = match op {
            Operation::Provision => PROVISION_ATTEMPTS_TOTAL,
            Operation::Delete => DELETE_ATTEMPTS_TOTAL,
        };
        metrics::counter!(name, "result" => outcome.as_str()).increment(1);
    }
}

/// In-memory sink for deterministic tests.
#[derive(Debug, Default)]
pub struct CountingOutcomeSink {
    provision_success: AtomicU64,
    provision_failure: AtomicU64,
    delete_success: AtomicU64,
    delete_failure: AtomicU64,
}

impl CountingOutcomeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, op: Operation, outcome: Outcome) -> u64 {
        self.cell(op, outcome).load(Ordering::SeqCst)
    }

    fn cell(&self, op: Operation, outcome: Outcome) -> &AtomicU64 {
        match (op, outcome) {
            (Operation::Provision, Outcome::Success) => &self.provision_success,
            (Operation::Provision, Outcome::Failure) => &self.provision_failure,
            (Operation::Delete, Outcome::Success) => &self.delete_success,
            (Operation::Delete, Outcome::Failure) => &self.delete_failure,
        }
    }
}

impl OutcomeSink for CountingOutcomeSink {
    fn record(&self, op: Operation, outcome: Outcome) {
        self.cell(op, outcome).fetch_add(1, Ordering::SeqCst);
    }
}
