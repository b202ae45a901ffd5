//! Desired-state descriptors and natural keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use super::catalog::Addressing;
use super::kind::ResourceKind;
use crate::client::paths;
use crate::error::ItemError;

/// One desired-state entry as written in a desired-state file.
///
/// Everything except the key fields lands in `attributes`, untouched. An
/// attribute that is absent means "leave unchanged" on edit and "controller
/// default" on create.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DescriptorInput {
    /// Natural name (profile name, protection name, container name).
    pub name: String,
    /// Slot or numeric index, for types addressed that way.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
    /// Member name, for container types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,
    /// Partial attribute map, operator-facing names.
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl DescriptorInput {
    /// Creates an input with only a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(attribute.into(), value.into());
        self
    }

    /// Sets the slot or index.
    #[must_use]
    pub const fn with_index(mut self, index: u64) -> Self {
        self.index = Some(index);
        self
    }

    /// Sets the member name.
    #[must_use]
    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }

    /// Best-effort label used when the input cannot be turned into a key.
    #[must_use]
    pub fn label(&self) -> String {
        match (&self.member, self.index) {
            (Some(member), _) => format!("{}/{member}", self.name),
            (None, Some(index)) => format!("{}[{index}]", self.name),
            (None, None) if self.name.is_empty() => "<unnamed>".to_string(),
            (None, None) => self.name.clone(),
        }
    }
}

/// Identity of a resource on the device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NaturalKey {
    /// Addressed by name alone.
    Name {
        /// Natural name.
        name: String,
    },
    /// Name plus a slot number.
    Slotted {
        /// Natural name.
        name: String,
        /// Slot number.
        slot: u64,
    },
    /// Named entry with a device index; 0 means "not yet known".
    Indexed {
        /// Natural name.
        name: String,
        /// Device index.
        index: u64,
    },
    /// Container-to-member edge.
    Member {
        /// Container name.
        container: String,
        /// Member name.
        member: String,
    },
}

impl NaturalKey {
    /// The natural name (container name for edges).
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Name { name } | Self::Slotted { name, .. } | Self::Indexed { name, .. } => name,
            Self::Member { container, .. } => container,
        }
    }

    /// Whether a key read back from the device identifies the same resource.
    ///
    /// An indexed key with index 0 matches by name; any other index matches by index.
    #[must_use]
    pub fn identifies(&self, current: &Self) -> bool {
        match (self, current) {
            (Self::Indexed { name, index: 0 }, Self::Indexed { name: other, .. }) => name == other,
            (Self::Indexed { index, .. }, Self::Indexed { index: other, .. }) => index == other,
            _ => self == current,
        }
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name { name } | Self::Indexed { name, index: 0 } => write!(f, "{name}"),
            Self::Slotted { name, slot } => write!(f, "{name}[{slot}]"),
            Self::Indexed { name, index } => write!(f, "{name}#{index}"),
            Self::Member { container, member } => write!(f, "{container}/{member}"),
        }
    }
}

/// A validated descriptor bound to its resource type.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    key: NaturalKey,
    attributes: BTreeMap<String, Value>,
    resolved_id: Option<u64>,
}

impl ResourceDescriptor {
    /// Validates an input against the addressing rules of `kind`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the name is empty, a key part is missing
    /// or not allowed for this type, or an explicit index is in a reserved range.
    pub fn new(kind: ResourceKind, input: &DescriptorInput) -> Result<Self, ItemError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(ItemError::validation("name cannot be empty", "name"));
        }
        if !paths::is_addressable(name) {
            return Err(ItemError::validation(format!("'{name}' cannot address a row"), "name"));
        }
        let name = name.to_string();
        let spec = kind.spec();

        if input.member.is_some() && !spec.takes_member() {
            return Err(ItemError::validation(
                format!("{kind} does not take a member"),
                "member",
            ));
        }

        let key = match spec.addressing {
            Addressing::Name => {
                if input.index.is_some() {
                    return Err(ItemError::validation(
                        format!("{kind} is addressed by name only"),
                        "index",
                    ));
                }
                NaturalKey::Name { name }
            }
            Addressing::NameAndSlot { .. } => NaturalKey::Slotted {
                name,
                slot: input.index.unwrap_or(0),
            },
            Addressing::Indexed { reserved_min, .. } => {
                let index = input.index.unwrap_or(0);
                if let Some(min) = reserved_min {
                    if index != 0 && index < min {
                        return Err(ItemError::validation(
                            format!("index must be 0 or at least {min}, got {index}"),
                            "index",
                        ));
                    }
                }
                NaturalKey::Indexed { name, index }
            }
            Addressing::Member { .. } | Addressing::Scoped { .. } => {
                let member = input
                    .member
                    .as_deref()
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .ok_or_else(|| {
                        ItemError::validation(format!("{kind} requires a member"), "member")
                    })?;
                if !paths::is_addressable(member) {
                    return Err(ItemError::validation(
                        format!("'{member}' cannot address a row"),
                        "member",
                    ));
                }
                if input.index.is_some() {
                    return Err(ItemError::validation(
                        format!("{kind} is addressed by container and member"),
                        "index",
                    ));
                }
                NaturalKey::Member {
                    container: name,
                    member: member.to_string(),
                }
            }
        };

        Ok(Self {
            key,
            attributes: input.attributes.clone(),
            resolved_id: None,
        })
    }

    /// Natural key.
    #[must_use]
    pub const fn key(&self) -> &NaturalKey {
        &self.key
    }

    /// User-specified attributes.
    #[must_use]
    pub const fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// Device index, when known from the key or resolved from a listing.
    #[must_use]
    pub fn resolved_id(&self) -> Option<u64> {
        match self.key {
            NaturalKey::Indexed { index, .. } if index != 0 => Some(index),
            _ => self.resolved_id,
        }
    }

    /// Records the device index found for this descriptor's name.
    pub const fn resolve(&mut self, id: u64) {
        self.resolved_id = Some(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_flattens_attributes() {
        let yaml = "name: P1\nthreshold: 500\naction: drop\n";
        let input: DescriptorInput = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(input.name, "P1");
        assert_eq!(input.index, None);
        assert_eq!(input.attributes.len(), 2);
        assert_eq!(input.attributes["threshold"], Value::from(500));
    }

    #[test]
    fn test_indexed_key_rules() {
        let ok = ResourceDescriptor::new(
            ResourceKind::ClProtection,
            &DescriptorInput::named("p1").with_index(450_001),
        )
        .unwrap();
        assert_eq!(ok.resolved_id(), Some(450_001));

        let allocated =
            ResourceDescriptor::new(ResourceKind::ClProtection, &DescriptorInput::named("p1"))
                .unwrap();
        assert_eq!(allocated.resolved_id(), None);
        assert_eq!(allocated.key().to_string(), "p1");

        let reserved = ResourceDescriptor::new(
            ResourceKind::ClProtection,
            &DescriptorInput::named("p1").with_index(12),
        );
        assert!(matches!(reserved, Err(ItemError::Validation { .. })));
    }

    #[test]
    fn test_member_key_requires_member() {
        let missing =
            ResourceDescriptor::new(ResourceKind::ClProfile, &DescriptorInput::named("c1"));
        assert!(missing.is_err());

        let edge = ResourceDescriptor::new(
            ResourceKind::ClProfile,
            &DescriptorInput::named("c1").with_member("m1"),
        )
        .unwrap();
        assert_eq!(edge.key().to_string(), "c1/m1");
        assert_eq!(edge.key().name(), "c1");
    }

    #[test]
    fn test_name_kind_rejects_index_and_member() {
        assert!(
            ResourceDescriptor::new(
                ResourceKind::BdosProfile,
                &DescriptorInput::named("b").with_index(3)
            )
            .is_err()
        );
        assert!(
            ResourceDescriptor::new(
                ResourceKind::BdosProfile,
                &DescriptorInput::named("b").with_member("x")
            )
            .is_err()
        );
        assert!(
            ResourceDescriptor::new(ResourceKind::BdosProfile, &DescriptorInput::named("  "))
                .is_err()
        );
    }

    #[test]
    fn test_dot_segment_names_rejected() {
        assert!(
            ResourceDescriptor::new(ResourceKind::BdosProfile, &DescriptorInput::named("..")).is_err()
        );
        assert!(
            ResourceDescriptor::new(
                ResourceKind::ClProfile,
                &DescriptorInput::named("c1").with_member(".")
            )
            .is_err()
        );
        let odd = ResourceDescriptor::new(ResourceKind::BdosProfile, &DescriptorInput::named("web#old"))
            .unwrap();
        assert_eq!(odd.key().name(), "web#old");
    }

    #[test]
    fn test_key_identity() {
        let wanted = NaturalKey::Indexed {
            name: "p1".into(),
            index: 0,
        };
        let current = NaturalKey::Indexed {
            name: "p1".into(),
            index: 450_002,
        };
        assert!(wanted.identifies(&current));

        let explicit = NaturalKey::Indexed {
            name: "renamed".into(),
            index: 450_002,
        };
        assert!(explicit.identifies(&current));

        let slotted = NaturalKey::Slotted {
            name: "net".into(),
            slot: 1,
        };
        assert!(!slotted.identifies(&NaturalKey::Slotted {
            name: "net".into(),
            slot: 0
        }));
    }
}
