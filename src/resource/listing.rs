//! Current resource state as read back from a controller table listing.

use serde_json::{Map, Value};

use super::catalog::{Addressing, ResourceSpec};
use super::codec::scalar_text;
use super::descriptor::NaturalKey;
use crate::error::ControllerError;

/// One row of a table listing with its derived natural key.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentState {
    /// Natural key derived from the row's key columns.
    pub key: NaturalKey,
    /// Every column the controller reported.
    pub attributes: Map<String, Value>,
}

impl CurrentState {
    /// Whether every column in `fields` already holds the same value.
    ///
    /// Values are compared in their textual form; the controller reports
    /// numbers as strings.
    #[must_use]
    pub fn matches(&self, fields: &Map<String, Value>) -> bool {
        fields.iter().all(|(column, wanted)| {
            self.attributes
                .get(column)
                .and_then(scalar_text)
                .zip(scalar_text(wanted))
                .is_some_and(|(have, want)| have == want)
        })
    }
}

/// A full table listing for one resource type on one device.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    spec: &'static ResourceSpec,
    entries: Vec<CurrentState>,
}

impl Listing {
    /// Parses a `{ "<table>": [ rows... ] }` listing response.
    ///
    /// A `null` body or a body without the table key is an empty table.
    /// Rows missing their key columns are skipped.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the body is not an object or the table is not an array.
    pub fn from_response(spec: &'static ResourceSpec, body: &Value) -> Result<Self, ControllerError> {
        let rows = match body {
            Value::Null => return Ok(Self::empty(spec)),
            Value::Object(map) => match map.get(spec.table) {
                None | Some(Value::Null) => return Ok(Self::empty(spec)),
                Some(Value::Array(rows)) => rows,
                Some(_) => {
                    return Err(ControllerError::protocol(format!(
                        "'{}' in listing is not an array",
                        spec.table
                    )));
                }
            },
            _ => {
                return Err(ControllerError::protocol(format!(
                    "listing for '{}' is not a JSON object",
                    spec.table
                )));
            }
        };

        let entries = rows
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|row| {
                key_of(spec, row).map(|key| CurrentState {
                    key,
                    attributes: row.clone(),
                })
            })
            .collect();

        Ok(Self { spec, entries })
    }

    /// A listing with no rows.
    #[must_use]
    pub const fn empty(spec: &'static ResourceSpec) -> Self {
        Self {
            spec,
            entries: Vec::new(),
        }
    }

    /// All rows.
    #[must_use]
    pub fn entries(&self) -> &[CurrentState] {
        &self.entries
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds the row identified by `key`.
    #[must_use]
    pub fn find(&self, key: &NaturalKey) -> Option<&CurrentState> {
        self.entries.iter().find(|entry| key.identifies(&entry.key))
    }

    /// Device index of the first row named `name`.
    #[must_use]
    pub fn id_for_name(&self, name: &str) -> Option<u64> {
        self.entries.iter().find_map(|entry| match &entry.key {
            NaturalKey::Indexed { name: n, index } if n == name && *index != 0 => Some(*index),
            _ => None,
        })
    }

    /// Name of the row with device index `id`.
    #[must_use]
    pub fn name_for_id(&self, id: u64) -> Option<&str> {
        self.entries.iter().find_map(|entry| match &entry.key {
            NaturalKey::Indexed { name, index } if *index == id => Some(name.as_str()),
            _ => None,
        })
    }

    /// Adds a row that is planned but not on the device yet, replacing any
    /// row with the same key.
    ///
    /// Returns false if the row's key cannot be derived, as for indexed rows
    /// whose index the device has not allocated yet.
    pub fn stage(&mut self, row: Map<String, Value>) -> bool {
        let Some(key) = key_of(self.spec, &row) else {
            return false;
        };
        self.entries.retain(|entry| entry.key != key);
        self.entries.push(CurrentState {
            key,
            attributes: row,
        });
        true
    }

    /// Container-to-member edges, for container types.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|entry| match &entry.key {
            NaturalKey::Member { container, member } => Some((container.as_str(), member.as_str())),
            _ => None,
        })
    }
}

fn key_of(spec: &ResourceSpec, row: &Map<String, Value>) -> Option<NaturalKey> {
    let name = row.get(spec.name_field).and_then(scalar_text)?;
    let number = |column: &str| {
        row.get(column)
            .and_then(scalar_text)
            .and_then(|s| s.trim().parse::<u64>().ok())
    };

    let key = match spec.addressing {
        Addressing::Name => NaturalKey::Name { name },
        Addressing::NameAndSlot { slot_field } => NaturalKey::Slotted {
            name,
            slot: number(slot_field).unwrap_or(0),
        },
        Addressing::Indexed { id_field, .. } => NaturalKey::Indexed {
            name,
            index: number(id_field)?,
        },
        Addressing::Member { member_field, .. } | Addressing::Scoped { member_field } => {
            NaturalKey::Member {
                container: name,
                member: row.get(member_field).and_then(scalar_text)?,
            }
        }
    };
    Some(key)
}
