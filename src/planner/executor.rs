//! Plan executor producing batch results.
//!
//! Preview and apply walk the same plan step by step. Apply sends each call;
//! preview records it and moves on. An item-scoped failure is recorded and
//! the batch continues; a fatal failure stops the batch for the device.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::{error, info, warn};

use crate::client::ControllerClient;
use crate::error::ItemError;
use crate::resource::ResourceKind;

use super::plan::{
    ExecutionMode, Operation, OperationPlan, PlanStep, PlannedCall, Prerequisite, StepAction,
};

/// Outcome of one item.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Nothing needed to change.
    Unchanged,
    /// A call was (or in preview, would be) sent and accepted.
    Changed,
    /// The item failed.
    Error,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unchanged => "unchanged",
            Self::Changed => "changed",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Result of one item.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OperationResult {
    /// Resource key.
    pub key: String,
    /// Operation requested.
    pub operation: Operation,
    /// Single outcome.
    pub outcome: Outcome,
    /// Error detail when the outcome is `Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Overall verdict on a batch.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// No item failed.
    Clean,
    /// Some items failed, others did not.
    Degraded,
    /// Every item failed.
    Failed,
    /// A fatal error stopped the batch.
    Aborted,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Clean => "clean",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        };
        write!(f, "{s}")
    }
}

/// Result of one resource-type batch on one device.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BatchResult {
    /// Resource type.
    pub kind: ResourceKind,
    /// Device address.
    pub device: String,
    /// Mode the batch ran in.
    pub mode: ExecutionMode,
    /// True iff at least one item changed.
    pub changed: bool,
    /// Per-item results in plan order.
    pub results: Vec<OperationResult>,
    /// Error strings in plan order.
    pub errors: Vec<String>,
    /// Calls sent (apply) or planned (preview), in order.
    pub calls: Vec<PlannedCall>,
    /// Consequences applied by the controller without a call.
    pub side_effects: Vec<String>,
    /// Fatal error that stopped the batch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl BatchResult {
    /// Creates an empty result.
    #[must_use]
    pub fn new(kind: ResourceKind, device: impl Into<String>, mode: ExecutionMode) -> Self {
        Self {
            kind,
            device: device.into(),
            mode,
            changed: false,
            results: Vec::new(),
            errors: Vec::new(),
            calls: Vec::new(),
            side_effects: Vec::new(),
            aborted: None,
        }
    }

    /// Records one item result.
    pub fn record(&mut self, key: impl Into<String>, operation: Operation, outcome: Outcome, error: Option<String>) {
        let key = key.into();
        match outcome {
            Outcome::Changed => self.changed = true,
            Outcome::Error => {
                let detail = error.as_deref().unwrap_or("unknown error");
                self.errors.push(format!("{operation} {key}: {detail}"));
            }
            Outcome::Unchanged => {}
        }
        self.results.push(OperationResult {
            key,
            operation,
            outcome,
            error,
        });
    }

    /// Number of items with the given outcome.
    #[must_use]
    pub fn count(&self, outcome: Outcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    /// Verdict on the batch.
    #[must_use]
    pub fn status(&self) -> BatchStatus {
        if self.aborted.is_some() {
            BatchStatus::Aborted
        } else if self.errors.is_empty() {
            BatchStatus::Clean
        } else if self.results.iter().all(|r| r.outcome == Outcome::Error) {
            BatchStatus::Failed
        } else {
            BatchStatus::Degraded
        }
    }

    /// Whether the batch should fail an orchestration run.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self.status(), BatchStatus::Failed | BatchStatus::Aborted)
    }
}

impl fmt::Display for BatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} on {} ({}): {} changed, {} unchanged, {} errors [{}]",
            self.kind,
            self.device,
            self.mode,
            self.count(Outcome::Changed),
            self.count(Outcome::Unchanged),
            self.count(Outcome::Error),
            self.status()
        )?;
        for error in &self.errors {
            writeln!(f, "  - {error}")?;
        }
        if let Some(reason) = &self.aborted {
            writeln!(f, "  aborted: {reason}")?;
        }
        Ok(())
    }
}

/// Executor for operation plans.
#[derive(Debug, Clone, Copy)]
pub struct PlanExecutor<'a> {
    client: &'a ControllerClient,
    mode: ExecutionMode,
}

impl<'a> PlanExecutor<'a> {
    /// Creates an executor.
    #[must_use]
    pub const fn new(client: &'a ControllerClient, mode: ExecutionMode) -> Self {
        Self { client, mode }
    }

    /// Executes a plan.
    ///
    /// Never fails as a whole: item failures are recorded per item and a
    /// fatal failure sets [`BatchResult::aborted`] and stops the batch.
    pub async fn execute(&self, plan: OperationPlan) -> BatchResult {
        let mut result = BatchResult::new(plan.kind, plan.device.clone(), self.mode);
        info!(
            "Executing {} plan for {} with {} steps ({})",
            plan.kind,
            plan.device,
            plan.steps.len(),
            self.mode
        );

        let mut failed: HashSet<usize> = HashSet::new();
        for (index, step) in plan.steps.into_iter().enumerate() {
            let PlanStep {
                key,
                operation,
                action,
                after,
                effect,
            } = step;

            let call = match action {
                StepAction::Unchanged { reason } => {
                    info!("{operation} {key}: unchanged ({reason})");
                    result.record(key, operation, Outcome::Unchanged, None);
                    continue;
                }
                StepAction::Reject(e) => {
                    warn!("{operation} {key}: {e}");
                    result.record(key, operation, Outcome::Error, Some(e.to_string()));
                    failed.insert(index);
                    continue;
                }
                StepAction::Send(call) => call,
            };

            let unmet: Vec<Prerequisite> = after
                .into_iter()
                .filter(|p| failed.contains(&p.step()))
                .collect();
            if !unmet.is_empty() {
                let holders: Vec<String> = unmet
                    .into_iter()
                    .filter_map(|p| match p {
                        Prerequisite::Detach { holder, .. } => Some(holder),
                        Prerequisite::Create { .. } => None,
                    })
                    .collect();
                let blocked = if holders.is_empty() {
                    ItemError::Incomplete { key: key.clone() }
                } else {
                    ItemError::DependencyConflict {
                        member: key.clone(),
                        containers: holders,
                    }
                };
                warn!("{operation} {key} not sent: {blocked}");
                result.record(key, operation, Outcome::Error, Some(blocked.to_string()));
                failed.insert(index);
                continue;
            }

            result.calls.push(call.clone());
            if self.mode.is_preview() {
                info!("[preview] {operation} {key}: {call}");
            } else {
                match self
                    .client
                    .request(call.method, &call.path, call.body.as_ref())
                    .await
                {
                    Ok(_) => info!("{operation} {key}: done"),
                    Err(e) if !e.is_fatal() => {
                        warn!("{operation} {key} failed: {e}");
                        result.record(key, operation, Outcome::Error, Some(e.to_string()));
                        failed.insert(index);
                        continue;
                    }
                    Err(e) => {
                        error!("{operation} {key} aborted the batch: {e}");
                        result.record(key, operation, Outcome::Error, Some(e.to_string()));
                        result.aborted = Some(e.to_string());
                        break;
                    }
                }
            }

            result.record(key, operation, Outcome::Changed, None);
            if let Some(effect) = effect {
                if effect.requires.iter().all(|step| !failed.contains(step)) {
                    result.side_effects.push(effect.description);
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ControllerClient, HttpMethod, paths};
    use crate::config::ControllerSettings;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_plan() -> OperationPlan {
        let mut plan = OperationPlan::new(ResourceKind::OosProfile, "10.0.0.5");
        plan.send(
            "a",
            Operation::Create,
            PlannedCall::with_body(HttpMethod::Post, "/t/a", json!({"n": "a"})),
        );
        plan.unchanged("b", Operation::Create, "already present");
        plan.reject("c", Operation::Create, ItemError::validation_general("bad"));
        plan.send(
            "d",
            Operation::Create,
            PlannedCall::with_body(HttpMethod::Post, "/t/d", json!({"n": "d"})),
        );
        plan
    }

    #[tokio::test]
    async fn test_preview_records_calls_without_network() {
        let settings = ControllerSettings::new("http://127.0.0.1:1", "u", "p").unwrap();
        let client = ControllerClient::with_memory_store(settings).unwrap();
        let result = PlanExecutor::new(&client, ExecutionMode::Preview)
            .execute(sample_plan())
            .await;

        assert!(result.changed);
        assert_eq!(result.calls.len(), 2);
        assert_eq!(result.count(Outcome::Changed), 2);
        assert_eq!(result.count(Outcome::Unchanged), 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.status(), BatchStatus::Degraded);
    }

    #[tokio::test]
    async fn test_apply_matches_preview_and_continues_past_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(paths::LOGIN))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "JSESSIONID=1")
                    .set_body_json(json!({"status": "ok"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/t/a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/t/d"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
            .expect(1)
            .mount(&server)
            .await;

        let settings = ControllerSettings::new(server.uri(), "u", "p").unwrap();
        let client = ControllerClient::with_memory_store(settings).unwrap();

        let preview = PlanExecutor::new(&client, ExecutionMode::Preview)
            .execute(sample_plan())
            .await;
        let applied = PlanExecutor::new(&client, ExecutionMode::Apply)
            .execute(sample_plan())
            .await;

        assert_eq!(preview.calls, applied.calls);
        assert!(applied.changed);
        assert_eq!(applied.errors.len(), 2);
        assert!(applied.errors[1].contains("boom"));
        assert_eq!(applied.status(), BatchStatus::Degraded);
        assert!(applied.aborted.is_none());
    }

    #[tokio::test]
    async fn test_fatal_error_aborts_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(paths::LOGIN))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "JSESSIONID=1")
                    .set_body_json(json!({"status": "ok"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/t/a"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/t/d"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let settings = ControllerSettings::new(server.uri(), "u", "p").unwrap();
        let client = ControllerClient::with_memory_store(settings).unwrap();
        let result = PlanExecutor::new(&client, ExecutionMode::Apply)
            .execute(sample_plan())
            .await;

        assert_eq!(result.status(), BatchStatus::Aborted);
        assert_eq!(result.results.len(), 1);
        assert!(!result.changed);
        assert!(result.is_failure());
    }

    #[tokio::test]
    async fn test_failed_create_skips_follow_up() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(paths::LOGIN))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "JSESSIONID=1")
                    .set_body_json(json!({"status": "ok"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/t/dns1"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "bad"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/t/dns1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut plan = OperationPlan::new(ResourceKind::DnsProfile, "10.0.0.5");
        let created = plan.send(
            "dns1",
            Operation::Create,
            PlannedCall::with_body(HttpMethod::Post, "/t/dns1", json!({"n": "dns1"})),
        );
        plan.send_after(
            "dns1",
            Operation::Edit,
            PlannedCall::with_body(HttpMethod::Put, "/t/dns1", json!({"q": "10"})),
            vec![Prerequisite::Create { step: created }],
        );

        let settings = ControllerSettings::new(server.uri(), "u", "p").unwrap();
        let client = ControllerClient::with_memory_store(settings).unwrap();
        let result = PlanExecutor::new(&client, ExecutionMode::Apply).execute(plan).await;

        assert_eq!(result.calls.len(), 1);
        assert_eq!(result.status(), BatchStatus::Failed);
        assert!(result.errors[1].contains("left incomplete"));
    }

    #[test]
    fn test_status_failed_when_every_item_errors() {
        let mut result = BatchResult::new(ResourceKind::ClProfile, "d", ExecutionMode::Apply);
        result.record("x", Operation::Detach, Outcome::Error, Some("nope".into()));
        assert_eq!(result.status(), BatchStatus::Failed);
        assert_eq!(result.errors, vec!["detach x: nope".to_string()]);

        let empty = BatchResult::new(ResourceKind::ClProfile, "d", ExecutionMode::Apply);
        assert_eq!(empty.status(), BatchStatus::Clean);
        assert!(!empty.changed);
    }
}
