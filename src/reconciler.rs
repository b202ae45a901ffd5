//! Resource reconciler.
//!
//! Drives create, edit, get and delete batches for one resource type on one
//! device. Every mutating batch reads the current table once, plans purely,
//! and hands the plan to the executor; preview and apply differ only in
//! whether the executor sends the planned calls.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::{ControllerClient, paths};
use crate::device::DeviceTarget;
use crate::error::Result;
use crate::planner::{
    BatchResult, DeletionPlanner, DeletionRequest, ExecutionMode, OperationPlan, PlanExecutor,
    plan_create, plan_delete, plan_edit,
};
use crate::resource::{DescriptorInput, Listing, ResourceKind, ResourceSpec};

/// Summary of a get operation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GetSummary {
    /// Rows returned (after filtering).
    pub total: usize,
    /// Distinct natural names among them.
    pub distinct_keys: usize,
    /// The names, sorted.
    pub keys: Vec<String>,
    /// Whether a key filter was applied.
    pub filtered: bool,
}

/// Rows of one resource type, grouped by natural name.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GetReport {
    /// Resource type.
    pub kind: ResourceKind,
    /// Device address.
    pub device: String,
    /// Rows per name, in controller order within a name.
    pub entries: BTreeMap<String, Vec<Map<String, Value>>>,
    /// Counts.
    pub summary: GetSummary,
}

/// Reconciler for one device.
///
/// In preview, rows that earlier batches planned to create are staged onto
/// later listings of the same type, so a run previews the way it applies.
#[derive(Debug)]
pub struct Reconciler<'a> {
    client: &'a ControllerClient,
    device: &'a DeviceTarget,
    mode: ExecutionMode,
    staged: Mutex<HashMap<ResourceKind, Vec<Map<String, Value>>>>,
}

impl<'a> Reconciler<'a> {
    /// Creates a reconciler.
    #[must_use]
    pub fn new(client: &'a ControllerClient, device: &'a DeviceTarget, mode: ExecutionMode) -> Self {
        Self {
            client,
            device,
            mode,
            staged: Mutex::new(HashMap::new()),
        }
    }

    /// Creates resources.
    ///
    /// # Errors
    ///
    /// Returns an error only if the controller cannot be reached at all
    /// before the first call; item failures are in the batch result.
    pub async fn create(&self, kind: ResourceKind, inputs: &[DescriptorInput]) -> Result<BatchResult> {
        info!("Create {} {kind} on {}", inputs.len(), self.device);
        let current = self.current(kind.spec()).await?;
        let plan = plan_create(self.device.address(), kind, inputs, current.as_ref());
        Ok(self.run(plan).await)
    }

    /// Partially updates resources.
    ///
    /// # Errors
    ///
    /// See [`Reconciler::create`].
    pub async fn edit(&self, kind: ResourceKind, inputs: &[DescriptorInput]) -> Result<BatchResult> {
        info!("Edit {} {kind} on {}", inputs.len(), self.device);
        let current = self.current(kind.spec()).await?;
        let plan = plan_edit(self.device.address(), kind, inputs, current.as_ref());
        Ok(self.run(plan).await)
    }

    /// Deletes resources by key. Absent resources are left as they are.
    ///
    /// # Errors
    ///
    /// See [`Reconciler::create`].
    pub async fn delete(&self, kind: ResourceKind, inputs: &[DescriptorInput]) -> Result<BatchResult> {
        info!("Delete {} {kind} on {}", inputs.len(), self.device);
        let current = self.current(kind.spec()).await?;
        let plan = plan_delete(self.device.address(), kind, inputs, current.as_ref());
        Ok(self.run(plan).await)
    }

    /// Runs a detach-then-destroy batch for a container type.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `container_kind` has no member type, or
    /// any error from reading the container or member listing.
    pub async fn delete_dependent(
        &self,
        container_kind: ResourceKind,
        request: &DeletionRequest,
    ) -> Result<BatchResult> {
        let planner = DeletionPlanner::new(container_kind)?;
        info!(
            "Delete {} detach and {} destroy requests for {container_kind} on {}",
            request.detach.len(),
            request.destroy.len(),
            self.device
        );

        let containers = self.listing(container_kind.spec()).await?;
        let members = if request.needs_member_listing() {
            Some(self.listing(planner.member_kind().spec()).await?)
        } else {
            None
        };

        let plan = planner.plan(self.device.address(), request, &containers, members.as_ref());
        Ok(self.run(plan).await)
    }

    /// Reads the full table for a type, optionally filtered to some names.
    ///
    /// Never mutating, so identical in preview.
    ///
    /// # Errors
    ///
    /// Returns the controller error if the listing cannot be read.
    pub async fn get(&self, kind: ResourceKind, keys: &[String]) -> Result<GetReport> {
        let spec = kind.spec();
        let body = self
            .client
            .get(&paths::itemlist(self.device.address(), spec.table))
            .await?;
        let listing = Listing::from_response(spec, &body)?;

        let mut entries: BTreeMap<String, Vec<Map<String, Value>>> = BTreeMap::new();
        for entry in listing.entries() {
            let name = entry.key.name();
            if keys.is_empty() || keys.iter().any(|k| k == name) {
                entries
                    .entry(name.to_string())
                    .or_default()
                    .push(entry.attributes.clone());
            }
        }

        let summary = GetSummary {
            total: entries.values().map(Vec::len).sum(),
            distinct_keys: entries.len(),
            keys: entries.keys().cloned().collect(),
            filtered: !keys.is_empty(),
        };
        debug!("{kind} on {}: {} rows, {} keys", self.device, summary.total, summary.distinct_keys);

        Ok(GetReport {
            kind,
            device: self.device.address().to_string(),
            entries,
            summary,
        })
    }

    async fn run(&self, plan: OperationPlan) -> BatchResult {
        if self.mode.is_preview() {
            let rows: Vec<Map<String, Value>> = plan.created_rows().cloned().collect();
            if !rows.is_empty() {
                self.staged.lock().await.entry(plan.kind).or_default().extend(rows);
            }
        }
        PlanExecutor::new(self.client, self.mode).execute(plan).await
    }

    /// Reads a listing that planning cannot do without.
    async fn listing(&self, spec: &'static ResourceSpec) -> Result<Listing> {
        let body = self
            .client
            .get(&paths::table(self.device.address(), spec.table))
            .await?;
        let mut listing = Listing::from_response(spec, &body)?;
        if let Some(rows) = self.staged.lock().await.get(&spec.kind) {
            let mut staged = 0;
            for row in rows {
                if listing.stage(row.clone()) {
                    staged += 1;
                }
            }
            debug!("{} on {}: {staged} planned rows staged", spec.table, self.device);
        }
        Ok(listing)
    }

    /// Reads a listing used for no-op detection; a rejected read yields `None`.
    async fn current(&self, spec: &'static ResourceSpec) -> Result<Option<Listing>> {
        match self.listing(spec).await {
            Ok(listing) => Ok(Some(listing)),
            Err(e) if !e.is_fatal() => {
                warn!("Could not read {} on {}: {e}; planning without current state", spec.table, self.device);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
