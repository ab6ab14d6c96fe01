//! Per-type mapping descriptor.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{OgmError, Result, StorageError};
use crate::graph::{Direction, Element, ElementKind, Record, Rid, Session};
use crate::mapping::convert;
use crate::mapping::entity_type::EntityType;
use crate::mapping::id::{EntityId, IdEncoder, IdParser, ParserEncoder};
use crate::mapping::registry::{Entity, EntityMetadata, EntityRegistry};
use crate::proxy::{DedupCache, EntityProxy, ProxyState};

/// Everything needed to move one application type `T` with identifier `ID`
/// in and out of the database.
///
/// Built once per type and cheap to clone.
pub struct EntityInformation<T, ID> {
    metadata: Arc<EntityMetadata>,
    registry: Arc<EntityRegistry>,
    parser: Arc<dyn IdParser<ID>>,
    ids: Arc<dyn IdEncoder>,
    _entity: PhantomData<fn() -> T>,
}

impl<T, ID> Clone for EntityInformation<T, ID> {
    fn clone(&self) -> Self {
        Self {
            metadata: self.metadata.clone(),
            registry: self.registry.clone(),
            parser: self.parser.clone(),
            ids: self.ids.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T, ID> fmt::Debug for EntityInformation<T, ID> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityInformation")
            .field("name", &self.metadata.name())
            .field("entity_type", &self.metadata.entity_type())
            .finish()
    }
}

impl<T: Entity, ID: EntityId> EntityInformation<T, ID> {
    /// Descriptor for a registered, non-embedded type.
    pub fn new(registry: Arc<EntityRegistry>, parser: impl IdParser<ID> + 'static) -> Result<Self> {
        let metadata = registry.metadata::<T>()?;
        if metadata.is_embedded() {
            return Err(OgmError::mapping(format!(
                "embedded type {} has no identity of its own",
                metadata.type_name()
            )));
        }

        let parser: Arc<dyn IdParser<ID>> = Arc::new(parser);
        let ids: Arc<dyn IdEncoder> = Arc::new(ParserEncoder::new(parser.clone()));
        Ok(Self {
            metadata,
            registry,
            parser,
            ids,
            _entity: PhantomData,
        })
    }

    /// Database class name.
    pub fn entity_name(&self) -> &str {
        self.metadata.name()
    }

    pub fn entity_type(&self) -> EntityType {
        self.metadata.entity_type()
    }

    pub fn metadata(&self) -> &Arc<EntityMetadata> {
        &self.metadata
    }

    pub fn to_record_identifier(&self, id: &ID) -> Result<Rid> {
        self.parser.to_record_identifier(id)
    }

    pub fn to_application_id(&self, rid: &Rid) -> Result<ID> {
        self.parser.to_application_id(rid)
    }

    /// Writes the application id for `rid` into the entity's identity field.
    pub fn assign_identity(&self, entity: &mut T, rid: &Rid) -> Result<()> {
        let field = self.id_field()?;
        let mut value = self.serialize(entity)?;
        if let Value::Object(object) = &mut value {
            object.insert(field.to_string(), self.ids.encode(rid)?);
        }
        *entity = serde_json::from_value(value).map_err(|e| {
            OgmError::mapping(format!(
                "cannot assign identity to {}.{}: {}",
                self.entity_name(),
                field,
                e
            ))
        })?;
        Ok(())
    }

    /// Identifier currently held by the entity, `None` while unset.
    pub fn identity_of(&self, entity: &T) -> Result<Option<ID>> {
        let field = self.id_field()?;
        match self.serialize(entity)?.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| OgmError::identity(value, e.to_string())),
        }
    }

    /// Converts a transient entity into a new record.
    ///
    /// Edge endpoints must reference stored vertices of the declared types.
    pub async fn new_record(&self, entity: &T, session: &dyn Session) -> Result<Record> {
        let record = convert::encode_record(&self.metadata, &self.registry, self.serialize(entity)?)?;
        if record.kind() == ElementKind::Edge {
            for direction in [Direction::Out, Direction::In] {
                self.check_endpoint(&record, direction, session).await?;
            }
        }
        Ok(record)
    }

    /// Returns the proxy for `element` from `cache`, creating and caching it
    /// on first resolution.
    pub fn resolve_proxy(&self, element: Element, cache: &mut DedupCache) -> Result<EntityProxy<T>> {
        let (rid, class) = {
            let record = element.read();
            (record.rid(), record.class().to_string())
        };
        let rid = rid.ok_or_else(|| {
            OgmError::mapping(format!("cannot resolve unsaved {} element", class))
        })?;
        if class != self.entity_name() {
            return Err(OgmError::mapping(format!(
                "element {} is a {}, not a {}",
                rid,
                class,
                self.entity_name()
            )));
        }

        if let Some(proxy) = cache.get::<T>(&rid) {
            return Ok(proxy);
        }
        let proxy = self.proxy(element, ProxyState::Managed);
        cache.insert(rid, proxy.clone());
        Ok(proxy)
    }

    /// A proxy over a new, unsaved record for `entity`.
    pub async fn transient_proxy(&self, entity: &T, session: &dyn Session) -> Result<EntityProxy<T>> {
        let record = self.new_record(entity, session).await?;
        Ok(self.proxy(Element::new(record), ProxyState::Transient))
    }

    /// Builds, stores and wraps a new record for `entity`, optionally in a
    /// named cluster.
    pub async fn save_new(
        &self,
        entity: &T,
        session: &dyn Session,
        cluster: Option<&str>,
    ) -> Result<EntityProxy<T>> {
        let proxy = self.transient_proxy(entity, session).await?;
        proxy.save_element(session, cluster).await?;
        Ok(proxy)
    }

    fn proxy(&self, element: Element, state: ProxyState) -> EntityProxy<T> {
        EntityProxy::new(
            element,
            self.metadata.clone(),
            self.registry.clone(),
            self.ids.clone(),
            state,
        )
    }

    fn id_field(&self) -> Result<&str> {
        self.metadata.id_field().ok_or_else(|| {
            OgmError::mapping(format!("{} has no identity field", self.metadata.type_name()))
        })
    }

    fn serialize(&self, entity: &T) -> Result<Value> {
        serde_json::to_value(entity).map_err(|e| {
            OgmError::mapping(format!("cannot serialize {}: {}", self.metadata.type_name(), e))
        })
    }

    async fn check_endpoint(&self, record: &Record, direction: Direction, session: &dyn Session) -> Result<()> {
        let Some(field) = self.metadata.endpoint_field(direction) else {
            return Ok(());
        };
        let rid = record.endpoint(direction).ok_or_else(|| {
            OgmError::mapping(format!("{}.{} is not set", self.entity_name(), field.name))
        })?;

        let vertex = session
            .load(&rid)
            .await?
            .ok_or(StorageError::RecordNotFound(rid))?;
        let expected = field
            .target()
            .and_then(|t| self.registry.by_type_id(t.id))
            .map(|m| m.name().to_string());
        let (kind, class) = {
            let record = vertex.read();
            (record.kind(), record.class().to_string())
        };

        if kind != ElementKind::Vertex || expected.as_deref() != Some(class.as_str()) {
            return Err(OgmError::mapping(format!(
                "{}.{} must reference a {}, found {} {}",
                self.entity_name(),
                field.name,
                expected.unwrap_or_default(),
                kind,
                class
            )));
        }
        Ok(())
    }
}
