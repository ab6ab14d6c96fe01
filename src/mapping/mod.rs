//! Mapping between application types and graph records.
//!
//! - [`EntityType`] / [`EntityMarker`] - what kind of record a type maps to
//! - [`FieldSpec`] / [`Link`] - fields with special storage
//! - [`EntityRegistry`] - all mapped types, validated at startup
//! - [`IdParser`] - application identifiers to and from [`Rid`](crate::graph::Rid)
//! - [`EntityInformation`] - per-type conversion and proxy resolution

pub(crate) mod convert;
mod entity_type;
mod fields;
pub(crate) mod id;
mod information;
mod registry;

pub use convert::CLASS_TAG;
pub use entity_type::{EntityMarker, EntityType};
pub use fields::{FieldKind, FieldSpec, Link, TypeRef};
pub use id::{EntityId, IdParser, RidIdParser, StringIdParser};
pub use information::EntityInformation;
pub use registry::{Entity, EntityMetadata, EntityRegistry, EntityRegistryBuilder};
