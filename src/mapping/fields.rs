//! Field declarations and typed references.
//!
//! Fields that are not declared are plain properties: they are stored as-is
//! on the record. Declared fields change how a value is stored:
//!
//! | Kind | Rust type | Stored as |
//! |------|-----------|-----------|
//! | `Id` | `Option<ID>` | the record's rid (never a property) |
//! | `Embedded` | an `Embedded` entity (or `Option`/`Vec` of one) | inline object tagged with its class |
//! | `Link` | [`Link<T>`] | record link |
//! | `FromVertex` / `ToVertex` | [`Link<T>`] on an edge | the edge's `out` / `in` endpoint |

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::graph::{Direction, Rid};
use crate::mapping::Entity;
use crate::proxy::EntityProxy;

/// Reference to a registered entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub id: TypeId,
    pub name: &'static str,
}

impl TypeRef {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Holds the application identifier.
    Id,
    Embedded { target: TypeRef },
    Link { target: TypeRef },
    /// Edge source vertex.
    FromVertex { target: TypeRef },
    /// Edge target vertex.
    ToVertex { target: TypeRef },
}

/// A declared field of an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn id(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Id,
        }
    }

    pub fn embedded<E: Entity>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Embedded {
                target: TypeRef::of::<E>(),
            },
        }
    }

    pub fn link<T: Entity>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Link {
                target: TypeRef::of::<T>(),
            },
        }
    }

    pub fn from_vertex<V: Entity>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::FromVertex {
                target: TypeRef::of::<V>(),
            },
        }
    }

    pub fn to_vertex<V: Entity>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::ToVertex {
                target: TypeRef::of::<V>(),
            },
        }
    }

    /// Type referenced by this field, if any.
    pub fn target(&self) -> Option<TypeRef> {
        match &self.kind {
            FieldKind::Id => None,
            FieldKind::Embedded { target }
            | FieldKind::Link { target }
            | FieldKind::FromVertex { target }
            | FieldKind::ToVertex { target } => Some(*target),
        }
    }

    /// Endpoint direction for edge endpoint fields.
    pub fn endpoint(&self) -> Option<Direction> {
        match self.kind {
            FieldKind::FromVertex { .. } => Some(Direction::Out),
            FieldKind::ToVertex { .. } => Some(Direction::In),
            _ => None,
        }
    }

    /// True for fields stored as a reference to another record.
    pub fn is_reference(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::Link { .. } | FieldKind::FromVertex { .. } | FieldKind::ToVertex { .. }
        )
    }
}

/// A typed reference to another entity, navigated lazily.
///
/// Serializes as the target's rid string, or `null` when unset.
pub struct Link<T> {
    rid: Option<Rid>,
    _target: PhantomData<fn() -> T>,
}

impl<T> Link<T> {
    pub fn unset() -> Self {
        Self {
            rid: None,
            _target: PhantomData,
        }
    }

    pub fn from_rid(rid: Rid) -> Self {
        Self {
            rid: Some(rid),
            _target: PhantomData,
        }
    }

    pub fn rid(&self) -> Option<Rid> {
        self.rid
    }

    pub fn is_set(&self) -> bool {
        self.rid.is_some()
    }
}

impl<T: Entity> Link<T> {
    /// Reference to a managed entity.
    pub fn to(target: &EntityProxy<T>) -> Self {
        Self {
            rid: target.rid(),
            _target: PhantomData,
        }
    }
}

impl<T> Clone for Link<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Link<T> {}

impl<T> Default for Link<T> {
    fn default() -> Self {
        Self::unset()
    }
}

impl<T> PartialEq for Link<T> {
    fn eq(&self, other: &Self) -> bool {
        self.rid == other.rid
    }
}

impl<T> Eq for Link<T> {}

impl<T> fmt::Debug for Link<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rid {
            Some(rid) => write!(f, "Link({rid})"),
            None => f.write_str("Link(unset)"),
        }
    }
}

impl<T> Serialize for Link<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.rid.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Link<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self {
            rid: Option::<Rid>::deserialize(deserializer)?,
            _target: PhantomData,
        })
    }
}
