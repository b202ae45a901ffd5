//! Planning and execution of resource batches.
//!
//! This module handles:
//! - Pure planning of create, edit and delete batches against current state
//! - Dependency-aware deletion ordering for container types
//! - Executing a plan in apply or preview mode into a batch result

mod deletion;
mod diff;
mod executor;
mod plan;

pub use deletion::{DeletionPlanner, DeletionRequest, DetachRequest, MemberRef};
pub use diff::{plan_create, plan_delete, plan_edit};
pub use executor::{BatchResult, BatchStatus, Outcome, OperationResult, PlanExecutor};
pub use plan::{
    ExecutionMode, Operation, OperationPlan, PlanStep, PlannedCall, Prerequisite, SideEffect,
    StepAction,
};
