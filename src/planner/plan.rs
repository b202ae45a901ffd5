//! Operation plan types.
//!
//! A plan is computed once, purely, from desired descriptors and current
//! state. Preview and apply both consume the same plan; only apply sends it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::client::HttpMethod;
use crate::error::ItemError;
use crate::resource::ResourceKind;

/// Whether calls are sent or only reported.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Send every planned call.
    #[default]
    Apply,
    /// Report what apply would do; no mutating call is sent.
    Preview,
}

impl ExecutionMode {
    /// Returns true in preview mode.
    #[must_use]
    pub const fn is_preview(self) -> bool {
        matches!(self, Self::Preview)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Apply => "apply",
            Self::Preview => "preview",
        };
        write!(f, "{s}")
    }
}

/// What a plan step does to its resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Create a resource.
    Create,
    /// Partially update a resource.
    Edit,
    /// Delete a resource without containment.
    Delete,
    /// Remove a member reference from a container.
    Detach,
    /// Delete a member entity.
    Destroy,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::Detach => "detach",
            Self::Destroy => "destroy",
        };
        write!(f, "{s}")
    }
}

/// One controller call, fully determined before anything is sent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannedCall {
    /// HTTP method.
    pub method: HttpMethod,
    /// Controller path.
    pub path: String,
    /// JSON body, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl PlannedCall {
    /// A call without a body.
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    /// A call with a JSON body.
    #[must_use]
    pub fn with_body(method: HttpMethod, path: impl Into<String>, body: Value) -> Self {
        Self {
            method,
            path: path.into(),
            body: Some(body),
        }
    }

    /// Short digest of the body, `-` when there is none.
    #[must_use]
    pub fn body_digest(&self) -> String {
        self.body.as_ref().map_or_else(
            || "-".to_string(),
            |body| {
                let digest = Sha256::digest(body.to_string().as_bytes());
                hex::encode(&digest[..6])
            },
        )
    }
}

impl fmt::Display for PlannedCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// What happens for one descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    /// Send this call.
    Send(PlannedCall),
    /// Nothing to do.
    Unchanged {
        /// Why no call is needed.
        reason: String,
    },
    /// The descriptor cannot be processed.
    Reject(ItemError),
}

/// An earlier step that must succeed before a step is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prerequisite {
    /// The earlier step removes a container's reference to this resource.
    Detach {
        /// Index of the earlier step in the plan.
        step: usize,
        /// Container whose reference the earlier step removes.
        holder: String,
    },
    /// The earlier step creates the row this step completes.
    Create {
        /// Index of the earlier step in the plan.
        step: usize,
    },
}

impl Prerequisite {
    /// Index of the earlier step.
    #[must_use]
    pub const fn step(&self) -> usize {
        match self {
            Self::Detach { step, .. } | Self::Create { step } => *step,
        }
    }
}

/// A consequence the controller applies on its own when a step succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideEffect {
    /// What happens.
    pub description: String,
    /// Earlier steps that must also have succeeded.
    pub requires: Vec<usize>,
}

/// One planned step, keyed by the resource it concerns.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanStep {
    /// Resource key as displayed to the operator.
    pub key: String,
    /// Operation requested.
    pub operation: Operation,
    /// Resulting action.
    pub action: StepAction,
    /// Steps that must have succeeded for this one to be sent.
    pub after: Vec<Prerequisite>,
    /// Consequence of this step succeeding.
    pub effect: Option<SideEffect>,
}

impl PlanStep {
    fn new(key: String, operation: Operation, action: StepAction) -> Self {
        Self {
            key,
            operation,
            action,
            after: Vec::new(),
            effect: None,
        }
    }
}

/// Ordered steps for one resource type on one device.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationPlan {
    /// Resource type.
    pub kind: ResourceKind,
    /// Device address.
    pub device: String,
    /// Steps in execution order.
    pub steps: Vec<PlanStep>,
}

impl OperationPlan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new(kind: ResourceKind, device: impl Into<String>) -> Self {
        Self {
            kind,
            device: device.into(),
            steps: Vec::new(),
        }
    }

    /// Appends a call and returns its step index.
    pub fn send(&mut self, key: impl Into<String>, operation: Operation, call: PlannedCall) -> usize {
        self.send_after(key, operation, call, Vec::new())
    }

    /// Appends a call that is only sent if every prerequisite succeeded.
    pub fn send_after(
        &mut self,
        key: impl Into<String>,
        operation: Operation,
        call: PlannedCall,
        after: Vec<Prerequisite>,
    ) -> usize {
        let mut step = PlanStep::new(key.into(), operation, StepAction::Send(call));
        step.after = after;
        self.steps.push(step);
        self.steps.len() - 1
    }

    /// Attaches a side effect to an existing step.
    pub fn attach_effect(&mut self, step: usize, effect: SideEffect) {
        if let Some(target) = self.steps.get_mut(step) {
            target.effect = Some(effect);
        }
    }

    /// Appends a no-op.
    pub fn unchanged(&mut self, key: impl Into<String>, operation: Operation, reason: impl Into<String>) {
        self.steps.push(PlanStep::new(
            key.into(),
            operation,
            StepAction::Unchanged {
                reason: reason.into(),
            },
        ));
    }

    /// Appends a per-item failure.
    pub fn reject(&mut self, key: impl Into<String>, operation: Operation, error: ItemError) {
        self.steps
            .push(PlanStep::new(key.into(), operation, StepAction::Reject(error)));
    }

    /// Side effects expected if every step succeeds.
    pub fn side_effects(&self) -> impl Iterator<Item = &SideEffect> {
        self.steps.iter().filter_map(|step| step.effect.as_ref())
    }

    /// Calls in send order.
    pub fn calls(&self) -> impl Iterator<Item = &PlannedCall> {
        self.steps.iter().filter_map(|step| match &step.action {
            StepAction::Send(call) => Some(call),
            _ => None,
        })
    }

    /// Row bodies this plan creates, for steps that POST a full row.
    pub fn created_rows(&self) -> impl Iterator<Item = &Map<String, Value>> {
        self.steps.iter().filter_map(|step| match (&step.operation, &step.action) {
            (Operation::Create, StepAction::Send(call)) if call.method == HttpMethod::Post => {
                call.body.as_ref().and_then(Value::as_object)
            }
            _ => None,
        })
    }

    /// Returns true if no step sends anything.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.calls().next().is_none()
    }
}

impl fmt::Display for OperationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "No {} descriptors for {}", self.kind, self.device);
        }

        writeln!(f, "{} plan for {} ({} steps):", self.kind, self.device, self.steps.len())?;
        for (i, step) in self.steps.iter().enumerate() {
            match &step.action {
                StepAction::Send(call) => {
                    writeln!(f, "  {i}. {} {}: {call}", step.operation, step.key)?;
                }
                StepAction::Unchanged { reason } => {
                    writeln!(f, "  {i}. {} {}: unchanged ({reason})", step.operation, step.key)?;
                }
                StepAction::Reject(error) => {
                    writeln!(f, "  {i}. {} {}: error ({error})", step.operation, step.key)?;
                }
            }
        }
        for effect in self.side_effects() {
            writeln!(f, "  * {}", effect.description)?;
        }
        Ok(())
    }
}
