//! Per-device orchestration.
//!
//! One device at a time: take the lock, run the resource batches in
//! dependency order, commit if asked to, release the lock.

use serde::Serialize;
use tracing::{error, info, info_span, Instrument};

use crate::client::ControllerClient;
use crate::config::DeviceSpec;
use crate::device::{CommitPolicy, CommitReport, DeviceTarget, LockCoordinator, LockMode, LockPolicy, PolicyCommit};
use crate::error::Result;
use crate::planner::{BatchResult, ExecutionMode};
use crate::reconciler::Reconciler;

/// Which parts of a device's desired state to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunScope {
    /// Create, edit and delete-by-key sections.
    Reconcile,
    /// Dependency-aware deletions only.
    Deletions,
    /// Everything.
    All,
}

impl RunScope {
    const fn reconciles(self) -> bool {
        matches!(self, Self::Reconcile | Self::All)
    }

    const fn deletes(self) -> bool {
        matches!(self, Self::Deletions | Self::All)
    }
}

/// Options for one orchestration run.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Apply or preview.
    pub mode: ExecutionMode,
    /// Lock acquisition.
    pub lock: LockPolicy,
    /// Whether to commit at the end of each device.
    pub commit: CommitPolicy,
    /// Sections to run.
    pub scope: RunScope,
}

/// Everything that happened on one device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceReport {
    /// Device address.
    pub device: String,
    /// Batches in execution order.
    pub batches: Vec<BatchResult>,
    /// Commit outcome, if a commit was attempted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitReport>,
    /// Fatal error that stopped the device run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl DeviceReport {
    fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            batches: Vec::new(),
            commit: None,
            aborted: None,
        }
    }

    /// True iff at least one batch changed something.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.batches.iter().any(|b| b.changed)
    }

    /// Whether the device run should fail the overall run.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.aborted.is_some() || self.batches.iter().any(BatchResult::is_failure)
    }

    fn push(&mut self, batch: BatchResult) -> bool {
        let aborted = batch.aborted.clone();
        self.batches.push(batch);
        if let Some(reason) = aborted {
            self.aborted = Some(reason);
            return false;
        }
        true
    }

    fn abort(&mut self, reason: String) {
        error!("Run on {} aborted: {reason}", self.device);
        self.aborted.get_or_insert(reason);
    }
}

/// Runs one device's desired state under its lock.
pub async fn run_device(client: &ControllerClient, spec: &DeviceSpec, options: RunOptions) -> DeviceReport {
    let target = match options.lock.mode {
        LockMode::Managed => DeviceTarget::new(&spec.address),
        LockMode::External => DeviceTarget::locked_externally(&spec.address),
    };
    let span = info_span!("device", address = %spec.address, mode = %options.mode);

    async {
        let mut report = DeviceReport::new(&spec.address);
        let coordinator = LockCoordinator::new(client, options.lock, options.mode);

        let target_ref = &target;
        let report_ref = &mut report;
        let outcome = coordinator
            .with_lock(target_ref, move || run_batches(client, target_ref, spec, options, report_ref))
            .await;
        if let Err(e) = outcome {
            report.abort(e.to_string());
        }

        info!(
            "Device {} done: {} batches, changed={}",
            report.device,
            report.batches.len(),
            report.changed()
        );
        report
    }
    .instrument(span)
    .await
}

/// Records a batch outcome. Returns false once the device run must stop.
fn absorb(report: &mut DeviceReport, outcome: Result<BatchResult>) -> bool {
    match outcome {
        Ok(batch) => report.push(batch),
        Err(e) => {
            report.abort(e.to_string());
            false
        }
    }
}

async fn run_batches(
    client: &ControllerClient,
    target: &DeviceTarget,
    spec: &DeviceSpec,
    options: RunOptions,
    report: &mut DeviceReport,
) -> Result<()> {
    let reconciler = Reconciler::new(client, target, options.mode);

    if options.scope.reconciles() {
        for (kind, inputs) in &spec.create {
            if !absorb(report, reconciler.create(*kind, inputs).await) {
                return Ok(());
            }
        }
        for (kind, inputs) in &spec.edit {
            if !absorb(report, reconciler.edit(*kind, inputs).await) {
                return Ok(());
            }
        }
        // Referencing types go first.
        for (kind, inputs) in spec.delete.iter().rev() {
            if !absorb(report, reconciler.delete(*kind, inputs).await) {
                return Ok(());
            }
        }
    }

    if options.scope.deletes() {
        for group in &spec.deletions {
            let outcome = reconciler
                .delete_dependent(group.container_type, &group.request)
                .await;
            if !absorb(report, outcome) {
                return Ok(());
            }
        }
    }

    if options.commit == CommitPolicy::Immediate && report.changed() {
        match PolicyCommit::new(client, options.mode).commit(target).await {
            Ok(commit) => report.commit = Some(commit),
            Err(e) => report.abort(e.to_string()),
        }
    }

    Ok(())
}
