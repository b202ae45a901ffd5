//! Policy commit trigger.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::target::DeviceTarget;
use crate::client::{ControllerClient, HttpMethod, paths};
use crate::error::{LockError, Result};
use crate::planner::{ExecutionMode, PlannedCall};

/// Whether an orchestration run commits pending changes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommitPolicy {
    /// Commit at the end of each device run.
    #[default]
    Immediate,
    /// Leave pending changes for a later, explicit commit.
    Deferred,
}

/// Outcome of a commit.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommitReport {
    /// Device address.
    pub device: String,
    /// The commit call.
    pub call: PlannedCall,
    /// False in preview mode.
    pub sent: bool,
}

/// Applies all pending configuration changes on a device.
#[derive(Debug, Clone, Copy)]
pub struct PolicyCommit<'a> {
    client: &'a ControllerClient,
    mode: ExecutionMode,
}

impl<'a> PolicyCommit<'a> {
    /// Creates a commit trigger.
    #[must_use]
    pub const fn new(client: &'a ControllerClient, mode: ExecutionMode) -> Self {
        Self { client, mode }
    }

    /// Commits pending changes on `device`.
    ///
    /// Commits everything pending on the device, not only the current batch.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::NotHeld`] without any call if the device lock is
    /// not held, or the controller error if the commit call fails.
    pub async fn commit(&self, device: &DeviceTarget) -> Result<CommitReport> {
        if !device.is_locked() {
            return Err(LockError::NotHeld {
                device: device.address().to_string(),
            }
            .into());
        }

        let call = PlannedCall::new(HttpMethod::Post, paths::commit(device.address()));
        if self.mode.is_preview() {
            info!("[preview] Would commit pending policies on {device}");
            return Ok(CommitReport {
                device: device.address().to_string(),
                call,
                sent: false,
            });
        }

        self.client.post(&call.path, None).await?;
        info!("Committed pending policies on {device}");
        Ok(CommitReport {
            device: device.address().to_string(),
            call,
            sent: true,
        })
    }
}
