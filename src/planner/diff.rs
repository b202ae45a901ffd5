//! Planning of create, edit and delete batches against current state.
//!
//! Every function here is pure. The listing passed in is the one read-only
//! fetch made per batch; `None` means it could not be read and planning
//! proceeds without no-op detection.

use serde_json::{Map, Value};
use tracing::debug;

use super::plan::{Operation, OperationPlan, PlannedCall, Prerequisite};
use crate::client::{HttpMethod, paths};
use crate::error::ItemError;
use crate::resource::{
    Addressing, DescriptorInput, Listing, NaturalKey, ResourceDescriptor, ResourceKind, ResourceSpec,
};

/// Plans a create batch.
///
/// The body is the type's defaults, overlaid with the key columns and the
/// user-specified attributes. An entry whose row already holds every value
/// of that body is a no-op. Deferred columns leave the POST body and go out
/// in a PUT that is only sent once the POST succeeded.
#[must_use]
pub fn plan_create(
    device: &str,
    kind: ResourceKind,
    inputs: &[DescriptorInput],
    current: Option<&Listing>,
) -> OperationPlan {
    let spec = kind.spec();
    let mut plan = OperationPlan::new(kind, device);

    for input in inputs {
        let (descriptor, encoded) = match prepare(kind, input) {
            Ok(prepared) => prepared,
            Err(e) => {
                plan.reject(input.label(), Operation::Create, e);
                continue;
            }
        };
        let key = descriptor.key();

        let mut body = spec.default_body();
        body.extend(key_columns(spec, key));
        body.extend(encoded);

        if let Some(row) = current.and_then(|listing| listing.find(key)) {
            if row.matches(&body) {
                debug!("{kind} {key} already matches desired state");
                plan.unchanged(key.to_string(), Operation::Create, "already present with the same values");
                continue;
            }
        }

        let deferred: Map<String, Value> = spec
            .deferred
            .iter()
            .filter_map(|wire| body.remove(*wire).map(|value| ((*wire).to_string(), value)))
            .collect();

        let segments = match key {
            NaturalKey::Indexed { index, .. } => vec![index.to_string()],
            other => key_segments(other),
        };
        let path = paths::row(device, spec.table, &segments);
        let created = plan.send(
            key.to_string(),
            Operation::Create,
            PlannedCall::with_body(HttpMethod::Post, path.clone(), Value::Object(body)),
        );
        if !deferred.is_empty() {
            debug!("{kind} {key}: {} columns follow the create", deferred.len());
            plan.send_after(
                key.to_string(),
                Operation::Edit,
                PlannedCall::with_body(HttpMethod::Put, path, Value::Object(deferred)),
                vec![Prerequisite::Create { step: created }],
            );
        }
    }

    plan
}

/// Plans an edit batch.
///
/// Only user-specified attributes are sent. An edit whose attributes all
/// already hold is a no-op; an edit of a key absent from the listing fails
/// for that item.
#[must_use]
pub fn plan_edit(
    device: &str,
    kind: ResourceKind,
    inputs: &[DescriptorInput],
    current: Option<&Listing>,
) -> OperationPlan {
    let spec = kind.spec();
    let mut plan = OperationPlan::new(kind, device);

    for input in inputs {
        let (mut descriptor, encoded) = match prepare(kind, input) {
            Ok(prepared) => prepared,
            Err(e) => {
                plan.reject(input.label(), Operation::Edit, e);
                continue;
            }
        };
        let label = descriptor.key().to_string();

        if encoded.is_empty() {
            plan.reject(
                label,
                Operation::Edit,
                ItemError::validation_general("edit specifies no attributes"),
            );
            continue;
        }

        if let Some(listing) = current {
            let Some(row) = listing.find(descriptor.key()) else {
                plan.reject(label, Operation::Edit, not_found(kind, descriptor.key(), device));
                continue;
            };
            if row.matches(&encoded) {
                plan.unchanged(label, Operation::Edit, "attributes already hold the desired values");
                continue;
            }
            if let NaturalKey::Indexed { index, .. } = row.key {
                descriptor.resolve(index);
            }
        }

        let Some(segments) = row_segments(&descriptor) else {
            plan.reject(label, Operation::Edit, not_found(kind, descriptor.key(), device));
            continue;
        };
        plan.send(
            label,
            Operation::Edit,
            PlannedCall::with_body(
                HttpMethod::Put,
                paths::row(device, spec.table, &segments),
                Value::Object(encoded),
            ),
        );
    }

    plan
}

/// Plans a delete batch for a type without containment handling.
///
/// Deleting a resource that is already absent is a no-op.
#[must_use]
pub fn plan_delete(
    device: &str,
    kind: ResourceKind,
    inputs: &[DescriptorInput],
    current: Option<&Listing>,
) -> OperationPlan {
    let spec = kind.spec();
    let mut plan = OperationPlan::new(kind, device);

    for input in inputs {
        let mut descriptor = match ResourceDescriptor::new(kind, input) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                plan.reject(input.label(), Operation::Delete, e);
                continue;
            }
        };
        let label = descriptor.key().to_string();

        if let Some(listing) = current {
            let Some(row) = listing.find(descriptor.key()) else {
                plan.unchanged(label, Operation::Delete, "not present on device");
                continue;
            };
            if let NaturalKey::Indexed { index, .. } = row.key {
                descriptor.resolve(index);
            }
        }

        let Some(segments) = row_segments(&descriptor) else {
            plan.reject(label, Operation::Delete, not_found(kind, descriptor.key(), device));
            continue;
        };
        plan.send(
            label,
            Operation::Delete,
            PlannedCall::new(HttpMethod::Delete, paths::row(device, spec.table, &segments)),
        );
    }

    plan
}

/// Path segments addressing an existing row, if its index is known.
pub(crate) fn row_segments(descriptor: &ResourceDescriptor) -> Option<Vec<String>> {
    match descriptor.key() {
        NaturalKey::Indexed { .. } => descriptor.resolved_id().map(|id| vec![id.to_string()]),
        other => Some(key_segments(other)),
    }
}

pub(crate) fn not_found(kind: ResourceKind, key: &NaturalKey, device: &str) -> ItemError {
    ItemError::ResourceNotFound {
        kind: kind.to_string(),
        key: key.to_string(),
        device: device.to_string(),
    }
}

fn prepare(
    kind: ResourceKind,
    input: &DescriptorInput,
) -> Result<(ResourceDescriptor, Map<String, Value>), ItemError> {
    let descriptor = ResourceDescriptor::new(kind, input)?;
    let encoded = kind.spec().encode_attributes(descriptor.attributes())?;
    Ok((descriptor, encoded))
}

fn key_segments(key: &NaturalKey) -> Vec<String> {
    match key {
        NaturalKey::Name { name } => vec![name.clone()],
        NaturalKey::Slotted { name, slot } => vec![name.clone(), slot.to_string()],
        NaturalKey::Indexed { index, .. } => vec![index.to_string()],
        NaturalKey::Member { container, member } => vec![container.clone(), member.clone()],
    }
}

fn key_columns(spec: &ResourceSpec, key: &NaturalKey) -> Map<String, Value> {
    let mut columns = Map::new();
    columns.insert(spec.name_field.to_string(), Value::String(key.name().to_string()));
    match (spec.addressing, key) {
        (Addressing::NameAndSlot { slot_field }, NaturalKey::Slotted { slot, .. }) => {
            columns.insert(slot_field.to_string(), Value::String(slot.to_string()));
        }
        (
            Addressing::Member { member_field, .. } | Addressing::Scoped { member_field },
            NaturalKey::Member { member, .. },
        ) => {
            columns.insert(member_field.to_string(), Value::String(member.clone()));
        }
        _ => {}
    }
    columns
}
