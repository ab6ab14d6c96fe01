//! Entity declarations and the registry built from them.
//!
//! Application types implement [`Entity`] to declare how they map to the
//! database. Declarations are collected once at startup by
//! [`EntityRegistry::builder`] and validated eagerly, so a misdeclared type
//! fails at bootstrap instead of on first use.

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{OgmError, Result};
use crate::graph::{Direction, IndexSpec};
use crate::mapping::entity_type::{EntityMarker, EntityType};
use crate::mapping::fields::{FieldKind, FieldSpec};

/// An application type mapped to the graph database.
///
/// # Example
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Person {
///     id: Option<Rid>,
///     name: String,
///     address: Address,
/// }
///
/// impl Entity for Person {
///     fn markers() -> Vec<EntityMarker> {
///         vec![EntityMarker::vertex().with_index(IndexSpec::unique("Person.name", ["name"]))]
///     }
///
///     fn fields() -> Vec<FieldSpec> {
///         vec![FieldSpec::id("id"), FieldSpec::embedded::<Address>("address")]
///     }
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Entity declarations. Exactly one is expected.
    fn markers() -> Vec<EntityMarker>;

    /// Fields that need special handling. Undeclared fields are properties.
    fn fields() -> Vec<FieldSpec> {
        Vec::new()
    }

    /// Type name without module path or generics.
    fn simple_name() -> &'static str {
        simple_name(std::any::type_name::<Self>())
    }
}

pub(crate) fn simple_name(type_name: &'static str) -> &'static str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}

/// Resolved mapping of one application type.
#[derive(Debug, Clone)]
pub struct EntityMetadata {
    type_id: TypeId,
    type_name: &'static str,
    entity_type: EntityType,
    name: String,
    indexes: Vec<IndexSpec>,
    fields: Vec<FieldSpec>,
}

impl EntityMetadata {
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Database class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn indexes(&self) -> &[IndexSpec] {
        &self.indexes
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn id_field(&self) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.kind == FieldKind::Id)
            .map(|f| f.name.as_str())
    }

    /// Field holding the edge endpoint in `direction`.
    pub fn endpoint_field(&self, direction: Direction) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.endpoint() == Some(direction))
    }

    pub fn is_embedded(&self) -> bool {
        self.entity_type == EntityType::Embedded
    }
}

struct Declaration {
    type_id: TypeId,
    type_name: &'static str,
    simple_name: &'static str,
    markers: Vec<EntityMarker>,
    fields: Vec<FieldSpec>,
}

/// Collects entity declarations for [`EntityRegistry`].
#[derive(Default)]
pub struct EntityRegistryBuilder {
    namespace: Option<String>,
    declarations: Vec<Declaration>,
}

impl EntityRegistryBuilder {
    /// Restricts registration to types under this module path.
    pub fn scan_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let namespace = namespace.trim().trim_end_matches("::");
        self.namespace = (!namespace.is_empty()).then(|| namespace.to_string());
        self
    }

    pub fn register<T: Entity>(mut self) -> Self {
        let type_id = TypeId::of::<T>();
        if self.declarations.iter().all(|d| d.type_id != type_id) {
            self.declarations.push(Declaration {
                type_id,
                type_name: std::any::type_name::<T>(),
                simple_name: T::simple_name(),
                markers: T::markers(),
                fields: T::fields(),
            });
        }
        self
    }

    /// Validates every declaration and builds the registry.
    pub fn build(self) -> Result<EntityRegistry> {
        let mut by_type = HashMap::new();
        let mut by_name = BTreeMap::new();

        for declaration in &self.declarations {
            if let Some(namespace) = &self.namespace {
                let inside = declaration.type_name == namespace
                    || declaration
                        .type_name
                        .starts_with(&format!("{namespace}::"));
                if !inside {
                    return Err(OgmError::mapping(format!(
                        "{} is outside the entity namespace '{}'",
                        declaration.type_name, namespace
                    )));
                }
            }

            let metadata = Arc::new(resolve(declaration)?);
            if let Some(existing) = by_name.insert(metadata.name.clone(), metadata.clone()) {
                return Err(OgmError::mapping(format!(
                    "class name '{}' is declared by both {} and {}",
                    metadata.name, existing.type_name, metadata.type_name
                )));
            }
            by_type.insert(metadata.type_id, metadata);
        }

        let registry = EntityRegistry { by_type, by_name };
        for metadata in registry.iter() {
            registry.check_targets(metadata)?;
        }

        tracing::debug!("Registered {} entity types", registry.len());
        Ok(registry)
    }
}

fn resolve(declaration: &Declaration) -> Result<EntityMetadata> {
    let type_name = declaration.type_name;
    let entity_type = EntityType::classify(&declaration.markers)
        .map_err(|e| match e {
            OgmError::Mapping(message) => OgmError::mapping(format!("{type_name}: {message}")),
            other => other,
        })?
        .ok_or_else(|| OgmError::mapping(format!("{type_name} has no entity declaration")))?;
    let marker = &declaration.markers[0];

    let mut seen = HashSet::new();
    for field in &declaration.fields {
        if !seen.insert(field.name.as_str()) {
            return Err(OgmError::mapping(format!(
                "{type_name}: field '{}' is declared twice",
                field.name
            )));
        }
    }

    let count = |pred: fn(&FieldSpec) -> bool| declaration.fields.iter().filter(|f| pred(f)).count();
    if count(|f| f.kind == FieldKind::Id) > 1 {
        return Err(OgmError::mapping(format!(
            "{type_name} declares more than one identity field"
        )));
    }

    let from = count(|f| matches!(f.kind, FieldKind::FromVertex { .. }));
    let to = count(|f| matches!(f.kind, FieldKind::ToVertex { .. }));
    match entity_type {
        EntityType::Embedded => {
            if let Some(field) = declaration
                .fields
                .iter()
                .find(|f| !matches!(f.kind, FieldKind::Embedded { .. }))
            {
                return Err(OgmError::mapping(format!(
                    "embedded type {type_name} cannot declare field '{}' as {:?}",
                    field.name, field.kind
                )));
            }
        }
        EntityType::Edge if from != 1 || to != 1 => {
            return Err(OgmError::mapping(format!(
                "edge {type_name} needs exactly one from-vertex and one to-vertex field"
            )));
        }
        EntityType::Element | EntityType::Vertex if from + to > 0 => {
            return Err(OgmError::mapping(format!(
                "{type_name} is not an edge and cannot declare vertex endpoints"
            )));
        }
        _ => {}
    }

    Ok(EntityMetadata {
        type_id: declaration.type_id,
        type_name,
        entity_type,
        name: entity_type.resolve_name(marker, declaration.simple_name),
        indexes: entity_type.resolve_indexes(marker),
        fields: declaration.fields.clone(),
    })
}

/// All mapped types, indexed by Rust type and by database class name.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    by_type: HashMap<TypeId, Arc<EntityMetadata>>,
    by_name: BTreeMap<String, Arc<EntityMetadata>>,
}

impl EntityRegistry {
    pub fn builder() -> EntityRegistryBuilder {
        EntityRegistryBuilder::default()
    }

    /// Metadata for `T`; unregistered types are a mapping error.
    pub fn metadata<T: Entity>(&self) -> Result<Arc<EntityMetadata>> {
        self.by_type_id(TypeId::of::<T>()).cloned().ok_or_else(|| {
            OgmError::mapping(format!(
                "{} is not a registered entity",
                std::any::type_name::<T>()
            ))
        })
    }

    pub fn by_type_id(&self, type_id: TypeId) -> Option<&Arc<EntityMetadata>> {
        self.by_type.get(&type_id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<EntityMetadata>> {
        self.by_name.get(name)
    }

    /// Registered types ordered by class name.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntityMetadata>> {
        self.by_name.values()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    fn check_targets(&self, metadata: &EntityMetadata) -> Result<()> {
        for field in metadata.fields() {
            let Some(target) = field.target() else {
                continue;
            };
            let resolved = self.by_type_id(target.id).ok_or_else(|| {
                OgmError::mapping(format!(
                    "{}.{} references unregistered type {}",
                    metadata.name, field.name, target.name
                ))
            })?;

            let valid = match field.kind {
                FieldKind::Embedded { .. } => resolved.is_embedded(),
                FieldKind::Link { .. } => !resolved.is_embedded(),
                FieldKind::FromVertex { .. } | FieldKind::ToVertex { .. } => {
                    resolved.entity_type == EntityType::Vertex
                }
                FieldKind::Id => true,
            };
            if !valid {
                return Err(OgmError::mapping(format!(
                    "{}.{} cannot reference {} entity {}",
                    metadata.name, field.name, resolved.entity_type, resolved.name
                )));
            }
        }
        Ok(())
    }
}
