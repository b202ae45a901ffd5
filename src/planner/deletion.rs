//! Dependency-aware deletion planning for container/member resource types.
//!
//! Detaches are planned before destroys. Planning simulates the container
//! edges as detaches remove them, so a destroy later in the same batch sees
//! the references that will still exist when it is sent. A destroy names the
//! detaches that freed its member; if one of them fails, the executor
//! reports the destroy as a dependency conflict and does not send it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use tracing::debug;

use super::plan::{Operation, OperationPlan, PlannedCall, Prerequisite, SideEffect};
use crate::client::{HttpMethod, paths};
use crate::error::ItemError;
use crate::resource::{Listing, ResourceKind};

/// Remove member references from one container.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetachRequest {
    /// Container name.
    pub container: String,
    /// Members to detach.
    #[serde(default)]
    pub members: Vec<String>,
}

/// A member addressed either by device index or by name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum MemberRef {
    /// Device index, already known.
    Id(u64),
    /// Natural name, resolved against the member listing.
    Name(String),
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

/// One deletion batch for a container type and its member type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeletionRequest {
    /// Member references to remove from containers.
    #[serde(default)]
    pub detach: Vec<DetachRequest>,
    /// Member entities to delete.
    #[serde(default)]
    pub destroy: Vec<MemberRef>,
}

impl DeletionRequest {
    /// Whether any destroy needs the member listing to resolve a name.
    #[must_use]
    pub fn needs_member_listing(&self) -> bool {
        self.destroy.iter().any(|m| matches!(m, MemberRef::Name(_)))
    }

    /// Whether the request asks for nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.detach.is_empty() && self.destroy.is_empty()
    }
}

/// Plans detach-then-destroy batches for one container type.
#[derive(Debug, Clone, Copy)]
pub struct DeletionPlanner {
    container_kind: ResourceKind,
    member_kind: ResourceKind,
}

impl DeletionPlanner {
    /// Creates a planner for a container type.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `container_kind` has no member type.
    pub fn new(container_kind: ResourceKind) -> Result<Self, ItemError> {
        let member_kind = container_kind.spec().member_kind().ok_or_else(|| {
            ItemError::validation(
                format!("{container_kind} is not a container type"),
                "container_type",
            )
        })?;
        Ok(Self {
            container_kind,
            member_kind,
        })
    }

    /// Member type.
    #[must_use]
    pub const fn member_kind(&self) -> ResourceKind {
        self.member_kind
    }

    /// Plans the batch.
    ///
    /// `containers` is the container listing fetched once for this batch.
    /// `members` is the member listing, fetched only when
    /// [`DeletionRequest::needs_member_listing`] holds.
    #[must_use]
    pub fn plan(
        &self,
        device: &str,
        request: &DeletionRequest,
        containers: &Listing,
        members: Option<&Listing>,
    ) -> OperationPlan {
        let container_spec = self.container_kind.spec();
        let member_spec = self.member_kind.spec();
        let mut plan = OperationPlan::new(self.container_kind, device);

        let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (container, member) in containers.edges() {
            edges
                .entry(container.to_string())
                .or_default()
                .insert(member.to_string());
        }

        let mut freed: HashMap<String, Vec<Prerequisite>> = HashMap::new();
        let mut detach_steps: HashMap<String, Vec<usize>> = HashMap::new();

        for detach in &request.detach {
            let container = detach.container.trim();
            if container.is_empty() || detach.members.is_empty() {
                plan.reject(
                    detach.container.clone(),
                    Operation::Detach,
                    ItemError::validation_general("detach needs a container and at least one member"),
                );
                continue;
            }

            for member in &detach.members {
                let key = format!("{container}/{member}");
                if !paths::is_addressable(container) || !paths::is_addressable(member) {
                    plan.reject(
                        key,
                        Operation::Detach,
                        ItemError::validation_general("container and member must name a row"),
                    );
                    continue;
                }

                let attached = edges
                    .get_mut(container)
                    .is_some_and(|set| set.remove(member.as_str()));
                if !attached {
                    plan.unchanged(key, Operation::Detach, "member not attached");
                    continue;
                }

                let step = plan.send(
                    key,
                    Operation::Detach,
                    PlannedCall::new(
                        HttpMethod::Delete,
                        paths::row(device, container_spec.table, &[container, member.as_str()]),
                    ),
                );
                freed.entry(member.clone()).or_default().push(Prerequisite::Detach {
                    step,
                    holder: container.to_string(),
                });
                let earlier = detach_steps.entry(container.to_string()).or_default();

                if edges.get(container).is_some_and(BTreeSet::is_empty) {
                    edges.remove(container);
                    debug!("{} '{container}' loses its last member", self.container_kind);
                    plan.attach_effect(
                        step,
                        SideEffect {
                            description: format!(
                                "{} '{container}' removed with its last member",
                                self.container_kind
                            ),
                            requires: earlier.clone(),
                        },
                    );
                }
                earlier.push(step);
            }
        }

        let mut destroyed: HashSet<u64> = HashSet::new();
        for target in &request.destroy {
            let (id, name) = match target {
                MemberRef::Name(name) => {
                    match members.and_then(|listing| listing.id_for_name(name)) {
                        Some(id) => (id, Some(name.clone())),
                        None => {
                            plan.reject(
                                name.clone(),
                                Operation::Destroy,
                                ItemError::ResourceNotFound {
                                    kind: self.member_kind.to_string(),
                                    key: name.clone(),
                                    device: device.to_string(),
                                },
                            );
                            continue;
                        }
                    }
                }
                MemberRef::Id(id) => match members {
                    Some(listing) => match listing.name_for_id(*id) {
                        Some(name) => (*id, Some(name.to_string())),
                        None => {
                            plan.unchanged(target.to_string(), Operation::Destroy, "not present on device");
                            continue;
                        }
                    },
                    None => (*id, None),
                },
            };
            let key = name.clone().unwrap_or_else(|| target.to_string());

            if !destroyed.insert(id) {
                plan.unchanged(key, Operation::Destroy, "already destroyed earlier in this batch");
                continue;
            }

            let mut after = Vec::new();
            if let Some(name) = &name {
                let referencing: Vec<String> = edges
                    .iter()
                    .filter(|(_, set)| set.contains(name))
                    .map(|(container, _)| container.clone())
                    .collect();
                if !referencing.is_empty() {
                    destroyed.remove(&id);
                    plan.reject(
                        key,
                        Operation::Destroy,
                        ItemError::DependencyConflict {
                            member: name.clone(),
                            containers: referencing,
                        },
                    );
                    continue;
                }
                after = freed.get(name).cloned().unwrap_or_default();
            }

            plan.send_after(
                key,
                Operation::Destroy,
                PlannedCall::new(
                    HttpMethod::Delete,
                    paths::row(device, member_spec.table, &[id.to_string()]),
                ),
                after,
            );
        }

        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::plan::StepAction;
    use serde_json::json;

    const DEVICE: &str = "10.0.0.5";

    fn profiles(edges: &[(&str, &str)]) -> Listing {
        let rows: Vec<_> = edges
            .iter()
            .map(|(c, m)| {
                json!({
                    "rsIDSSynProfilesName": c,
                    "rsIDSSynProfileServiceName": m
                })
            })
            .collect();
        Listing::from_response(
            ResourceKind::SynProfile.spec(),
            &json!({ "rsIDSSynProfilesTable": rows }),
        )
        .unwrap()
    }

    fn protections(entries: &[(&str, u64)]) -> Listing {
        let rows: Vec<_> = entries
            .iter()
            .map(|(n, id)| json!({"rsIDSSYNAttackName": n, "rsIDSSYNAttackId": id.to_string()}))
            .collect();
        Listing::from_response(
            ResourceKind::SynProtection.spec(),
            &json!({ "rsIDSSYNAttackTable": rows }),
        )
        .unwrap()
    }

    fn planner() -> DeletionPlanner {
        DeletionPlanner::new(ResourceKind::SynProfile).unwrap()
    }

    #[test]
    fn test_only_containers_get_a_planner() {
        assert!(DeletionPlanner::new(ResourceKind::BdosProfile).is_err());
        assert_eq!(planner().member_kind(), ResourceKind::SynProtection);
    }

    #[test]
    fn test_detach_last_member_then_destroy() {
        let request = DeletionRequest {
            detach: vec![DetachRequest {
                container: "c1".into(),
                members: vec!["m1".into()],
            }],
            destroy: vec![MemberRef::Name("m1".into())],
        };
        assert!(request.needs_member_listing());

        let containers = profiles(&[("c1", "m1")]);
        let members = protections(&[("m1", 500_001)]);
        let plan = planner().plan(DEVICE, &request, &containers, Some(&members));

        let calls: Vec<String> = plan.calls().map(ToString::to_string).collect();
        assert_eq!(
            calls,
            vec![
                "DELETE /mgmt/device/byip/10.0.0.5/config/rsIDSSynProfilesTable/c1/m1",
                "DELETE /mgmt/device/byip/10.0.0.5/config/rsIDSSYNAttackTable/500001",
            ]
        );
        let effects: Vec<_> = plan.side_effects().collect();
        assert_eq!(effects.len(), 1);
        assert!(effects[0].description.contains("'c1'"));
        assert!(effects[0].requires.is_empty());
        assert_eq!(
            plan.steps[1].after,
            vec![Prerequisite::Detach {
                step: 0,
                holder: "c1".into()
            }]
        );
    }

    #[test]
    fn test_destroy_still_referenced_conflicts() {
        let request = DeletionRequest {
            detach: vec![],
            destroy: vec![MemberRef::Name("m2".into()), MemberRef::Name("m3".into())],
        };
        let containers = profiles(&[("c2", "m2"), ("c3", "m2")]);
        let members = protections(&[("m2", 7), ("m3", 8)]);
        let plan = planner().plan(DEVICE, &request, &containers, Some(&members));

        match &plan.steps[0].action {
            StepAction::Reject(ItemError::DependencyConflict { member, containers }) => {
                assert_eq!(member, "m2");
                assert_eq!(containers, &vec!["c2".to_string(), "c3".to_string()]);
            }
            other => panic!("expected dependency conflict, got {other:?}"),
        }
        assert_eq!(plan.calls().count(), 1);
        assert_eq!(plan.steps[1].key, "m3");
    }

    #[test]
    fn test_detaches_always_precede_destroys() {
        let request = DeletionRequest {
            detach: vec![
                DetachRequest {
                    container: "c1".into(),
                    members: vec!["a".into(), "b".into()],
                },
                DetachRequest {
                    container: "c2".into(),
                    members: vec!["c".into()],
                },
            ],
            destroy: vec![MemberRef::Id(1), MemberRef::Id(2), MemberRef::Id(3)],
        };
        let containers = profiles(&[("c1", "a"), ("c1", "b"), ("c1", "keep"), ("c2", "c")]);
        let plan = planner().plan(DEVICE, &request, &containers, None);

        let ops: Vec<Operation> = plan.steps.iter().map(|s| s.operation).collect();
        let last_detach = ops.iter().rposition(|o| *o == Operation::Detach).unwrap();
        let first_destroy = ops.iter().position(|o| *o == Operation::Destroy).unwrap();
        assert!(last_detach < first_destroy);
        assert_eq!(plan.calls().count(), 6);
        assert_eq!(plan.side_effects().count(), 1);
    }

    #[test]
    fn test_unknown_name_and_missing_edge() {
        let request = DeletionRequest {
            detach: vec![DetachRequest {
                container: "c1".into(),
                members: vec!["never".into()],
            }],
            destroy: vec![MemberRef::Name("ghost".into()), MemberRef::Id(99)],
        };
        let containers = profiles(&[("c1", "m1")]);
        let members = protections(&[("m1", 1)]);
        let plan = planner().plan(DEVICE, &request, &containers, Some(&members));

        assert!(matches!(plan.steps[0].action, StepAction::Unchanged { .. }));
        assert!(matches!(
            plan.steps[1].action,
            StepAction::Reject(ItemError::ResourceNotFound { .. })
        ));
        assert!(matches!(plan.steps[2].action, StepAction::Unchanged { .. }));
        assert!(plan.is_noop());
    }

    #[test]
    fn test_duplicate_destroy_sent_once() {
        let request = DeletionRequest {
            detach: vec![],
            destroy: vec![MemberRef::Id(5), MemberRef::Id(5)],
        };
        let plan = planner().plan(DEVICE, &request, &profiles(&[]), None);
        assert_eq!(plan.calls().count(), 1);
        assert!(matches!(plan.steps[1].action, StepAction::Unchanged { .. }));
    }

    #[test]
    fn test_member_ref_parses_untagged() {
        let request: DeletionRequest =
            serde_yaml::from_str("destroy: [12, syn_a]\ndetach:\n  - container: c\n    members: [x]\n")
                .unwrap();
        assert_eq!(
            request.destroy,
            vec![MemberRef::Id(12), MemberRef::Name("syn_a".into())]
        );
        assert_eq!(request.detach[0].members, vec!["x".to_string()]);
    }
}
