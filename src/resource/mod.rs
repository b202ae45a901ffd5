//! Resource types managed on a device.
//!
//! This module holds everything that is specific to a resource type but
//! independent of the network:
//! - The catalog of controller tables and their key columns
//! - Declarative attribute-to-wire mapping tables
//! - Desired-state descriptors and their natural keys
//! - Parsed table listings (current state)

mod catalog;
mod codec;
mod descriptor;
mod kind;
mod listing;

pub use catalog::{Addressing, ResourceSpec};
pub use codec::{Codec, FieldSpec, scalar_text};
pub use descriptor::{DescriptorInput, NaturalKey, ResourceDescriptor};
pub use kind::ResourceKind;
pub use listing::{CurrentState, Listing};
