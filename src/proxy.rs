//! Live stand-ins for stored elements.
//!
//! An [`EntityProxy`] wraps one [`Element`] and exposes it as the mapped
//! application type. The element is the source of truth: reads decode from
//! it lazily and are cached per field, writes go straight through to it.
//!
//! ```text
//! Transient ──save_element──▶ Managed ──delete_element──▶ Removed
//! ```
//!
//! Embedded values are reached through an [`EmbeddedProxy`], a view onto
//! the sub-object inside the parent's element rather than a copy of it.
//!
//! Any access to a removed proxy fails with [`OgmError::Detached`].

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{OgmError, Result};
use crate::graph::{Direction, Element, ElementKind, Rid, Session};
use crate::mapping::convert;
use crate::mapping::id::{EntityId, IdEncoder};
use crate::mapping::{Entity, EntityInformation, EntityMetadata, EntityRegistry, EntityType, FieldKind};

/// Lifecycle of a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    /// Backed by a record that was never saved.
    Transient,
    Managed,
    /// The backing record was deleted.
    Removed,
}

#[derive(Default)]
struct LoadedFields {
    version: u32,
    values: HashMap<String, Value>,
}

struct ProxyInner {
    element: Element,
    metadata: Arc<EntityMetadata>,
    registry: Arc<EntityRegistry>,
    ids: Arc<dyn IdEncoder>,
    state: RwLock<ProxyState>,
    loaded: Mutex<LoadedFields>,
}

impl ProxyInner {
    fn state(&self) -> ProxyState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_attached(&self) -> Result<()> {
        if self.state() == ProxyState::Removed {
            return Err(OgmError::Detached {
                entity: self.metadata.name().to_string(),
                rid: self
                    .element
                    .rid()
                    .map(|rid| rid.to_string())
                    .unwrap_or_else(|| "<unsaved>".to_string()),
            });
        }
        Ok(())
    }

    /// Drops the decoded value of a top-level field.
    fn forget(&self, field: &str) {
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values
            .remove(field);
    }
}

/// Identity-preserving view of a stored element as a `T`.
///
/// Clones share state; use [`EntityProxy::same_instance`] to tell whether
/// two proxies are the same instance. Equality compares record identity.
pub struct EntityProxy<T> {
    inner: Arc<ProxyInner>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for EntityProxy<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T> EntityProxy<T> {
    pub fn state(&self) -> ProxyState {
        self.inner.state()
    }

    pub fn rid(&self) -> Option<Rid> {
        self.inner.element.rid()
    }

    /// Database class name.
    pub fn entity_name(&self) -> &str {
        self.inner.metadata.name()
    }

    /// The backing element.
    pub fn element(&self) -> &Element {
        &self.inner.element
    }

    /// True when both proxies are the same instance.
    pub fn same_instance(&self, other: &EntityProxy<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn ensure_attached(&self) -> Result<()> {
        self.inner.ensure_attached()
    }

    fn set_state(&self, state: ProxyState) {
        *self.inner.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn loaded(&self) -> MutexGuard<'_, LoadedFields> {
        self.inner.loaded.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Entity> EntityProxy<T> {
    pub(crate) fn new(
        element: Element,
        metadata: Arc<EntityMetadata>,
        registry: Arc<EntityRegistry>,
        ids: Arc<dyn IdEncoder>,
        state: ProxyState,
    ) -> Self {
        Self {
            inner: Arc::new(ProxyInner {
                element,
                metadata,
                registry,
                ids,
                state: RwLock::new(state),
                loaded: Mutex::new(LoadedFields::default()),
            }),
            _entity: PhantomData,
        }
    }

    /// Reads one field, decoding it from the element on first access.
    ///
    /// Embedded fields materialize as owned values; reference fields read as
    /// [`Link`](crate::mapping::Link)s and are resolved with
    /// [`EntityProxy::navigate`].
    pub fn get<V: DeserializeOwned>(&self, field: &str) -> Result<V> {
        self.ensure_attached()?;

        let value = {
            let record = self.inner.element.read();
            let mut loaded = self.loaded();
            if loaded.version != record.version() {
                loaded.values.clear();
                loaded.version = record.version();
            }

            match loaded.values.get(field) {
                Some(value) => value.clone(),
                None => {
                    let value = match self.inner.metadata.field(field).map(|f| &f.kind) {
                        Some(FieldKind::Id) => match record.rid() {
                            Some(rid) => self.inner.ids.encode(&rid)?,
                            None => Value::Null,
                        },
                        _ => convert::decode_field(&self.inner.metadata, &record, field)
                            .unwrap_or(Value::Null),
                    };
                    loaded.values.insert(field.to_string(), value.clone());
                    value
                }
            }
        };

        serde_json::from_value(value).map_err(|e| {
            OgmError::mapping(format!("cannot read {}.{}: {}", self.entity_name(), field, e))
        })
    }

    /// Whether `field` has been decoded since the element last changed.
    pub fn is_loaded(&self, field: &str) -> bool {
        let version = self.inner.element.read().version();
        let loaded = self.loaded();
        loaded.version == version && loaded.values.contains_key(field)
    }

    /// Writes one field through to the element, marking it dirty.
    pub fn set<V: Serialize>(&self, field: &str, value: V) -> Result<()> {
        self.ensure_attached()?;
        if self.inner.metadata.id_field() == Some(field) {
            return Err(OgmError::mapping(format!(
                "identity field {}.{} is assigned by the database",
                self.entity_name(),
                field
            )));
        }

        let value = serde_json::to_value(value).map_err(|e| {
            OgmError::mapping(format!("cannot write {}.{}: {}", self.entity_name(), field, e))
        })?;

        let mut record = self.inner.element.write();
        convert::encode_field(
            &self.inner.metadata,
            &self.inner.registry,
            &mut record,
            field,
            value.clone(),
        )?;
        let mut loaded = self.loaded();
        if loaded.version != record.version() {
            loaded.values.clear();
            loaded.version = record.version();
        }
        loaded.values.insert(field.to_string(), value);
        Ok(())
    }

    /// Live view of an embedded field. Reads and writes through the view
    /// go straight to the sub-object inside this proxy's element.
    pub fn embedded<E: Entity>(&self, field: &str) -> Result<EmbeddedProxy<E>> {
        self.ensure_attached()?;
        let metadata = embedded_target::<E>(&self.inner.registry, &self.inner.metadata, field)?;
        Ok(EmbeddedProxy::new(self.inner.clone(), vec![Step::Field(field.to_string())], metadata))
    }

    /// Live view of one item of an embedded list field.
    pub fn embedded_at<E: Entity>(&self, field: &str, index: usize) -> Result<EmbeddedProxy<E>> {
        self.ensure_attached()?;
        let metadata = embedded_target::<E>(&self.inner.registry, &self.inner.metadata, field)?;
        Ok(EmbeddedProxy::new(
            self.inner.clone(),
            vec![Step::Field(field.to_string()), Step::Item(index)],
            metadata,
        ))
    }

    /// Materializes the whole entity.
    pub fn entity(&self) -> Result<T> {
        self.ensure_attached()?;
        let value = {
            let record = self.inner.element.read();
            let id = match record.rid() {
                Some(rid) => self.inner.ids.encode(&rid)?,
                None => Value::Null,
            };
            convert::decode_record(&self.inner.metadata, &record, id)
        };
        serde_json::from_value(value).map_err(|e| {
            OgmError::mapping(format!("cannot materialize {}: {}", self.entity_name(), e))
        })
    }

    /// Copies every field of `entity` onto the element. The identity field
    /// is ignored.
    pub fn apply(&self, entity: &T) -> Result<()> {
        self.ensure_attached()?;
        let value = serde_json::to_value(entity).map_err(|e| {
            OgmError::mapping(format!("cannot serialize {}: {}", self.entity_name(), e))
        })?;
        let Value::Object(object) = value else {
            return Err(OgmError::mapping(format!(
                "{} must serialize to an object",
                self.entity_name()
            )));
        };

        let mut record = self.inner.element.write();
        for (name, value) in object {
            convert::encode_field(&self.inner.metadata, &self.inner.registry, &mut record, &name, value)?;
        }
        self.loaded().values.clear();
        Ok(())
    }

    /// Saves the element, optionally into a named cluster, and marks the
    /// proxy managed.
    pub async fn save_element(&self, session: &dyn Session, cluster: Option<&str>) -> Result<Rid> {
        self.ensure_attached()?;
        let rid = session.save(&self.inner.element, cluster).await?;
        self.set_state(ProxyState::Managed);
        Ok(rid)
    }

    /// Deletes the backing element and detaches the proxy.
    pub async fn delete_element(&self, session: &dyn Session) -> Result<()> {
        self.ensure_attached()?;
        if let Some(rid) = self.rid() {
            session.delete(&rid).await?;
        }
        self.set_state(ProxyState::Removed);
        self.loaded().values.clear();
        Ok(())
    }

    /// Follows a link or edge endpoint field to the referenced entity.
    ///
    /// Returns `None` when the reference is unset or dangling. Targets are
    /// resolved through `cache`, so shared targets yield one proxy.
    pub async fn navigate<V: Entity, VID: EntityId>(
        &self,
        field: &str,
        target: &EntityInformation<V, VID>,
        session: &dyn Session,
        cache: &mut DedupCache,
    ) -> Result<Option<EntityProxy<V>>> {
        self.ensure_attached()?;
        let spec = self
            .inner
            .metadata
            .field(field)
            .filter(|f| f.is_reference())
            .ok_or_else(|| {
                OgmError::mapping(format!("{}.{} is not a reference", self.entity_name(), field))
            })?;
        if spec.target().map(|t| t.id) != Some(target.metadata().type_id()) {
            return Err(OgmError::mapping(format!(
                "{}.{} does not reference {}",
                self.entity_name(),
                field,
                target.entity_name()
            )));
        }

        let rid = {
            let record = self.inner.element.read();
            match spec.endpoint() {
                Some(direction) => record.endpoint(direction),
                None => record.link(field),
            }
        };
        let Some(rid) = rid else {
            return Ok(None);
        };

        match session.load(&rid).await? {
            Some(element) => target.resolve_proxy(element, cache).map(Some),
            None => Ok(None),
        }
    }

    /// Edges of type `E` attached to this vertex in `direction`.
    pub async fn edges<E: Entity, EID: EntityId>(
        &self,
        direction: Direction,
        edge: &EntityInformation<E, EID>,
        session: &dyn Session,
        cache: &mut DedupCache,
    ) -> Result<Vec<EntityProxy<E>>> {
        self.ensure_attached()?;
        if self.inner.element.kind() != ElementKind::Vertex {
            return Err(OgmError::mapping(format!(
                "{} is not a vertex",
                self.entity_name()
            )));
        }
        if edge.entity_type() != EntityType::Edge {
            return Err(OgmError::mapping(format!(
                "{} is not an edge",
                edge.entity_name()
            )));
        }
        let Some(rid) = self.rid() else {
            return Ok(Vec::new());
        };

        session
            .edges(&rid, direction, Some(edge.entity_name()))
            .await?
            .into_iter()
            .map(|element| edge.resolve_proxy(element, cache))
            .collect()
    }
}

/// Checks that `field` of `owner` embeds an `E` and returns `E`'s metadata.
fn embedded_target<E: Entity>(
    registry: &EntityRegistry,
    owner: &EntityMetadata,
    field: &str,
) -> Result<Arc<EntityMetadata>> {
    let target = registry.metadata::<E>()?;
    match owner.field(field).map(|f| &f.kind) {
        Some(FieldKind::Embedded { target: declared }) if declared.id == target.type_id() => Ok(target),
        _ => Err(OgmError::mapping(format!(
            "{}.{} does not embed {}",
            owner.name(),
            field,
            target.name()
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Field(String),
    Item(usize),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Field(name) => write!(f, ".{}", name),
            Step::Item(index) => write!(f, "[{}]", index),
        }
    }
}

fn descend<'a>(value: &'a Value, path: &[Step]) -> Option<&'a Value> {
    path.iter().try_fold(value, |value, step| match step {
        Step::Field(name) => value.get(name.as_str()),
        Step::Item(index) => value.get(*index),
    })
}

fn descend_mut<'a>(value: &'a mut Value, path: &[Step]) -> Option<&'a mut Value> {
    path.iter().try_fold(value, |value, step| match step {
        Step::Field(name) => value.get_mut(name.as_str()),
        Step::Item(index) => value.get_mut(*index),
    })
}

/// Embedded value living inside an entity proxy's element.
///
/// Holds no copy of the value: every read decodes from the parent record
/// and every write updates it in place, marking the element dirty. The
/// view shares the parent proxy's lifecycle, so it is detached once the
/// parent is removed.
pub struct EmbeddedProxy<E> {
    parent: Arc<ProxyInner>,
    path: Vec<Step>,
    metadata: Arc<EntityMetadata>,
    _value: PhantomData<fn() -> E>,
}

impl<E> Clone for EmbeddedProxy<E> {
    fn clone(&self) -> Self {
        Self {
            parent: self.parent.clone(),
            path: self.path.clone(),
            metadata: self.metadata.clone(),
            _value: PhantomData,
        }
    }
}

impl<E> EmbeddedProxy<E> {
    fn new(parent: Arc<ProxyInner>, path: Vec<Step>, metadata: Arc<EntityMetadata>) -> Self {
        Self {
            parent,
            path,
            metadata,
            _value: PhantomData,
        }
    }

    /// Location of the value, e.g. `Person.address` or `Station.tags[0]`.
    pub fn path(&self) -> String {
        let mut path = self.parent.metadata.name().to_string();
        for step in &self.path {
            path.push_str(&step.to_string());
        }
        path
    }

    /// Top-level record property the value lives under.
    fn root(&self) -> &str {
        match self.path.first() {
            Some(Step::Field(name)) => name,
            _ => "",
        }
    }

    fn not_set(&self) -> OgmError {
        OgmError::mapping(format!("{} is not set", self.path()))
    }

    /// Whether the parent currently holds an object at this location.
    pub fn is_set(&self) -> Result<bool> {
        self.parent.ensure_attached()?;
        let record = self.parent.element.read();
        Ok(record
            .property(self.root())
            .and_then(|root| descend(root, &self.path[1..]))
            .is_some_and(Value::is_object))
    }

    fn read_value(&self, field: Option<&str>) -> Result<Value> {
        self.parent.ensure_attached()?;
        let record = self.parent.element.read();
        let object = record
            .property(self.root())
            .and_then(|root| descend(root, &self.path[1..]))
            .filter(|value| value.is_object())
            .ok_or_else(|| self.not_set())?;
        let value = match field {
            Some(field) => object.get(field).cloned().unwrap_or(Value::Null),
            None => object.clone(),
        };
        Ok(convert::strip_tags(value))
    }
}

impl<E: Entity> EmbeddedProxy<E> {
    /// Reads one field of the embedded value.
    pub fn get<V: DeserializeOwned>(&self, field: &str) -> Result<V> {
        let value = self.read_value(Some(field))?;
        serde_json::from_value(value).map_err(|e| {
            OgmError::mapping(format!("cannot read {}.{}: {}", self.path(), field, e))
        })
    }

    /// Writes one field of the embedded value into the parent element.
    pub fn set<V: Serialize>(&self, field: &str, value: V) -> Result<()> {
        self.parent.ensure_attached()?;
        let mut value = serde_json::to_value(value).map_err(|e| {
            OgmError::mapping(format!("cannot write {}.{}: {}", self.path(), field, e))
        })?;
        if let Some(spec) = self.metadata.field(field) {
            value = convert::tag_embedded(&self.parent.registry, spec, value)?;
        }

        {
            let mut record = self.parent.element.write();
            let mut root = record
                .property(self.root())
                .cloned()
                .ok_or_else(|| self.not_set())?;
            let object = descend_mut(&mut root, &self.path[1..])
                .and_then(Value::as_object_mut)
                .ok_or_else(|| self.not_set())?;
            object.insert(field.to_string(), value);
            record.set_property(self.root(), root);
        }
        self.parent.forget(self.root());
        Ok(())
    }

    /// Materializes the whole embedded value.
    pub fn value(&self) -> Result<E> {
        let value = self.read_value(None)?;
        serde_json::from_value(value).map_err(|e| {
            OgmError::mapping(format!("cannot materialize {}: {}", self.path(), e))
        })
    }

    /// View of an embedded field nested in this value.
    pub fn embedded<F: Entity>(&self, field: &str) -> Result<EmbeddedProxy<F>> {
        let metadata = embedded_target::<F>(&self.parent.registry, &self.metadata, field)?;
        let mut path = self.path.clone();
        path.push(Step::Field(field.to_string()));
        Ok(EmbeddedProxy::new(self.parent.clone(), path, metadata))
    }

    /// View of one item of a nested embedded list.
    pub fn embedded_at<F: Entity>(&self, field: &str, index: usize) -> Result<EmbeddedProxy<F>> {
        let metadata = embedded_target::<F>(&self.parent.registry, &self.metadata, field)?;
        let mut path = self.path.clone();
        path.push(Step::Field(field.to_string()));
        path.push(Step::Item(index));
        Ok(EmbeddedProxy::new(self.parent.clone(), path, metadata))
    }
}

impl<E> fmt::Debug for EmbeddedProxy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedProxy")
            .field("path", &self.path())
            .field("class", &self.metadata.name())
            .finish()
    }
}

impl<T> PartialEq for EntityProxy<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self.rid(), other.rid()) {
            (Some(a), Some(b)) => a == b,
            _ => self.same_instance(other),
        }
    }
}

impl<T> fmt::Debug for EntityProxy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityProxy")
            .field("class", &self.entity_name())
            .field("rid", &self.rid())
            .field("state", &self.state())
            .finish()
    }
}

/// Proxies already built within one scope, keyed by record identity.
///
/// Scopes are explicit: one scan, one query result or one navigation
/// traversal. Caches are never shared between unrelated calls.
#[derive(Default)]
pub struct DedupCache {
    entries: HashMap<Rid, Box<dyn std::any::Any + Send + Sync>>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: Entity>(&self, rid: &Rid) -> Option<EntityProxy<T>> {
        self.entries
            .get(rid)
            .and_then(|entry| entry.downcast_ref::<EntityProxy<T>>())
            .cloned()
    }

    pub fn insert<T: Entity>(&mut self, rid: Rid, proxy: EntityProxy<T>) {
        self.entries.insert(rid, Box::new(proxy));
    }

    pub fn contains(&self, rid: &Rid) -> bool {
        self.entries.contains_key(rid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for DedupCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// An entity handed to the entity manager: either a plain value not yet
/// stored, or a proxy over a stored element.
#[derive(Debug)]
pub enum Persistable<T> {
    Transient(T),
    Managed(EntityProxy<T>),
}

impl<T> Persistable<T> {
    pub fn transient(entity: T) -> Self {
        Self::Transient(entity)
    }
}

impl<T> From<EntityProxy<T>> for Persistable<T> {
    fn from(proxy: EntityProxy<T>) -> Self {
        Self::Managed(proxy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::backends::memory::MemoryDatabase;
    use crate::mapping::{EntityMarker, FieldSpec, Link, RidIdParser};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Tag {
        label: String,
    }

    impl Entity for Tag {
        fn markers() -> Vec<EntityMarker> {
            vec![EntityMarker::embedded()]
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Station {
        id: Option<Rid>,
        name: String,
        tags: Vec<Tag>,
    }

    impl Entity for Station {
        fn markers() -> Vec<EntityMarker> {
            vec![EntityMarker::vertex()]
        }

        fn fields() -> Vec<FieldSpec> {
            vec![FieldSpec::id("id"), FieldSpec::embedded::<Tag>("tags")]
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Line {
        id: Option<Rid>,
        minutes: u32,
        from: Link<Station>,
        to: Link<Station>,
    }

    impl Entity for Line {
        fn markers() -> Vec<EntityMarker> {
            vec![EntityMarker::edge()]
        }

        fn fields() -> Vec<FieldSpec> {
            vec![
                FieldSpec::id("id"),
                FieldSpec::from_vertex::<Station>("from"),
                FieldSpec::to_vertex::<Station>("to"),
            ]
        }
    }

    struct Fixture {
        stations: EntityInformation<Station, Rid>,
        lines: EntityInformation<Line, Rid>,
        database: MemoryDatabase,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(
            EntityRegistry::builder()
                .register::<Tag>()
                .register::<Station>()
                .register::<Line>()
                .build()
                .unwrap(),
        );
        Fixture {
            stations: EntityInformation::new(registry.clone(), RidIdParser).unwrap(),
            lines: EntityInformation::new(registry, RidIdParser).unwrap(),
            database: MemoryDatabase::new("proxy"),
        }
    }

    fn station(name: &str) -> Station {
        Station {
            id: None,
            name: name.to_string(),
            tags: vec![Tag { label: "hub".into() }],
        }
    }

    #[tokio::test]
    async fn test_transient_proxy_becomes_managed() {
        let fx = fixture();
        let session = fx.database.session();

        let proxy = fx.stations.transient_proxy(&station("North"), &session).await.unwrap();
        assert_eq!(proxy.state(), ProxyState::Transient);
        assert_eq!(proxy.get::<Option<Rid>>("id").unwrap(), None);

        let rid = proxy.save_element(&session, None).await.unwrap();
        assert_eq!(proxy.state(), ProxyState::Managed);
        assert_eq!(proxy.get::<Option<Rid>>("id").unwrap(), Some(rid));
    }

    #[tokio::test]
    async fn test_get_is_lazy_and_cached() {
        let fx = fixture();
        let session = fx.database.session();
        let proxy = fx.stations.save_new(&station("North"), &session, None).await.unwrap();

        assert!(!proxy.is_loaded("name"));
        assert_eq!(proxy.get::<String>("name").unwrap(), "North");
        assert!(proxy.is_loaded("name"));
        assert_eq!(
            proxy.get::<Vec<Tag>>("tags").unwrap(),
            vec![Tag { label: "hub".into() }]
        );
    }

    #[tokio::test]
    async fn test_set_writes_through_to_element() {
        let fx = fixture();
        let session = fx.database.session();
        let proxy = fx.stations.save_new(&station("North"), &session, None).await.unwrap();

        proxy.set("name", "South").unwrap();

        assert!(proxy.element().read().is_dirty());
        assert_eq!(
            proxy.element().read().property("name"),
            Some(&serde_json::json!("South"))
        );
        assert_eq!(proxy.entity().unwrap().name, "South");

        let err = proxy.set("id", Rid::new(1, 1)).unwrap_err();
        assert!(matches!(err, OgmError::Mapping(_)));
    }

    #[tokio::test]
    async fn test_apply_then_save_updates_record() {
        let fx = fixture();
        let session = fx.database.session();
        let proxy = fx.stations.save_new(&station("North"), &session, None).await.unwrap();

        let mut changed = proxy.entity().unwrap();
        changed.name = "East".into();
        proxy.apply(&changed).unwrap();
        proxy.save_element(&session, None).await.unwrap();

        let other = fx.database.session();
        let element = other.load(&proxy.rid().unwrap()).await.unwrap().unwrap();
        assert_eq!(element.read().property("name"), Some(&serde_json::json!("East")));
        assert_eq!(element.read().version(), 2);
    }

    #[tokio::test]
    async fn test_removed_proxy_is_detached() {
        let fx = fixture();
        let session = fx.database.session();
        let proxy = fx.stations.save_new(&station("North"), &session, None).await.unwrap();

        proxy.delete_element(&session).await.unwrap();

        assert_eq!(proxy.state(), ProxyState::Removed);
        assert!(proxy.get::<String>("name").unwrap_err().is_detached());
        assert!(proxy.entity().unwrap_err().is_detached());
        assert!(proxy.set("name", "x").unwrap_err().is_detached());
        assert!(proxy.delete_element(&session).await.unwrap_err().is_detached());
    }

    #[tokio::test]
    async fn test_embedded_set_writes_into_parent_record() {
        let fx = fixture();
        let session = fx.database.session();
        let proxy = fx.stations.save_new(&station("North"), &session, None).await.unwrap();
        assert_eq!(proxy.get::<Vec<Tag>>("tags").unwrap()[0].label, "hub");
        assert!(!proxy.element().read().is_dirty());

        let tag = proxy.embedded_at::<Tag>("tags", 0).unwrap();
        assert_eq!(tag.path(), "Station.tags[0]");
        tag.set("label", "terminus").unwrap();

        assert!(proxy.element().read().is_dirty());
        assert_eq!(
            proxy.element().read().property("tags"),
            Some(&serde_json::json!([{ "label": "terminus", "@class": "Tag" }]))
        );
        assert_eq!(tag.get::<String>("label").unwrap(), "terminus");
        assert_eq!(tag.value().unwrap(), Tag { label: "terminus".into() });
        assert_eq!(
            proxy.get::<Vec<Tag>>("tags").unwrap(),
            vec![Tag { label: "terminus".into() }]
        );

        proxy.save_element(&session, None).await.unwrap();
        let element = session.load(&proxy.rid().unwrap()).await.unwrap().unwrap();
        assert_eq!(
            element.read().property("tags"),
            Some(&serde_json::json!([{ "label": "terminus", "@class": "Tag" }]))
        );
    }

    #[tokio::test]
    async fn test_embedded_view_rejects_wrong_field_or_type() {
        let fx = fixture();
        let session = fx.database.session();
        let proxy = fx.stations.save_new(&station("North"), &session, None).await.unwrap();

        assert!(matches!(proxy.embedded::<Tag>("name"), Err(OgmError::Mapping(_))));
        assert!(matches!(proxy.embedded::<Station>("tags"), Err(OgmError::Mapping(_))));

        let missing = proxy.embedded_at::<Tag>("tags", 3).unwrap();
        assert!(!missing.is_set().unwrap());
        assert!(matches!(missing.get::<String>("label"), Err(OgmError::Mapping(_))));
        assert!(matches!(missing.set("label", "x"), Err(OgmError::Mapping(_))));
        assert!(!proxy.element().read().is_dirty());
    }

    #[tokio::test]
    async fn test_embedded_view_of_removed_parent_is_detached() {
        let fx = fixture();
        let session = fx.database.session();
        let proxy = fx.stations.save_new(&station("North"), &session, None).await.unwrap();
        let tag = proxy.embedded_at::<Tag>("tags", 0).unwrap();

        proxy.delete_element(&session).await.unwrap();

        assert!(tag.get::<String>("label").unwrap_err().is_detached());
        assert!(tag.set("label", "x").unwrap_err().is_detached());
        assert!(proxy.embedded_at::<Tag>("tags", 0).unwrap_err().is_detached());
    }

    #[tokio::test]
    async fn test_navigate_and_edges_share_cache() {
        let fx = fixture();
        let session = fx.database.session();
        let north = fx.stations.save_new(&station("North"), &session, None).await.unwrap();
        let south = fx.stations.save_new(&station("South"), &session, None).await.unwrap();
        for minutes in [5, 7] {
            let line = Line {
                id: None,
                minutes,
                from: Link::to(&north),
                to: Link::to(&south),
            };
            fx.lines.save_new(&line, &session, None).await.unwrap();
        }

        let mut cache = DedupCache::new();
        let lines = north
            .edges(Direction::Out, &fx.lines, &session, &mut cache)
            .await
            .unwrap();
        assert_eq!(lines.len(), 2);
        assert!(north
            .edges(Direction::In, &fx.lines, &session, &mut cache)
            .await
            .unwrap()
            .is_empty());

        let first = lines[0]
            .navigate("to", &fx.stations, &session, &mut cache)
            .await
            .unwrap()
            .unwrap();
        let second = lines[1]
            .navigate("to", &fx.stations, &session, &mut cache)
            .await
            .unwrap()
            .unwrap();
        assert!(first.same_instance(&second));
        assert_eq!(first, south);
    }

    #[tokio::test]
    async fn test_navigate_rejects_plain_field() {
        let fx = fixture();
        let session = fx.database.session();
        let north = fx.stations.save_new(&station("North"), &session, None).await.unwrap();

        let err = north
            .navigate("name", &fx.stations, &session, &mut DedupCache::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a reference"));
    }

    #[tokio::test]
    async fn test_dedup_cache_downcasts_by_type() {
        let fx = fixture();
        let session = fx.database.session();
        let proxy = fx.stations.transient_proxy(&station("North"), &session).await.unwrap();

        let mut cache = DedupCache::new();
        cache.insert(Rid::new(1, 0), proxy.clone());
        assert!(cache.get::<Station>(&Rid::new(1, 0)).unwrap().same_instance(&proxy));
        assert!(cache.get::<Line>(&Rid::new(1, 0)).is_none());
        assert!(cache.contains(&Rid::new(1, 0)));
        assert_eq!(cache.len(), 1);
    }
}
