//! Entity manager: the operations repositories are built from.

use futures::TryStreamExt;

use crate::context::Context;
use crate::di::FromContext;
use crate::error::{OgmError, Result};
use crate::graph::{Cursor, Direction, Rid};
use crate::mapping::{Entity, EntityId, EntityInformation};
use crate::proxy::{DedupCache, EntityProxy, Persistable};
use crate::query::TypedQuery;
use crate::session::{BoundSession, SessionHandle, SessionProvider, UnitOfWork};

/// Persists, loads and queries entities.
///
/// Each call resolves its session through the [`SessionProvider`]: the
/// bound unit of work's session when there is one, else a session opened
/// and closed around the call. Driver failures are returned unmodified and
/// never retried.
#[derive(FromContext, Clone, Debug)]
pub struct EntityManager {
    sessions: SessionProvider,
    #[from_context(default)]
    bound: Option<BoundSession>,
}

impl EntityManager {
    pub fn new(sessions: SessionProvider) -> Self {
        Self {
            sessions,
            bound: None,
        }
    }

    /// A manager whose calls run inside `unit`.
    pub fn within(&self, unit: &UnitOfWork) -> Self {
        self.bound_to(unit.bind())
    }

    pub fn bound_to(&self, bound: BoundSession) -> Self {
        Self {
            sessions: self.sessions.clone(),
            bound: Some(bound),
        }
    }

    pub fn sessions(&self) -> &SessionProvider {
        &self.sessions
    }

    pub fn bound(&self) -> Option<&BoundSession> {
        self.bound.as_ref()
    }

    async fn session(&self) -> Result<SessionHandle> {
        self.sessions.current_session(self.bound.as_ref()).await
    }

    /// The unit of work's navigation scope when `session` is its session.
    fn navigated(&self, session: &SessionHandle) -> Option<&tokio::sync::Mutex<DedupCache>> {
        match &self.bound {
            Some(bound) if !session.is_scoped() => Some(bound.navigated()),
            _ => None,
        }
    }

    /// Inserts a transient entity and writes the assigned identity back
    /// into it. Every call inserts a new record.
    pub async fn persist<T: Entity, ID: EntityId>(
        &self,
        entity: &mut T,
        info: &EntityInformation<T, ID>,
    ) -> Result<Rid> {
        let session = self.session().await?;
        let proxy = info.save_new(entity, &*session, None).await?;
        let rid = proxy.rid().ok_or_else(|| {
            OgmError::mapping(format!("{} was saved without identity", info.entity_name()))
        })?;

        if info.metadata().id_field().is_some() {
            info.assign_identity(entity, &rid)?;
        }
        tracing::debug!(entity = info.entity_name(), %rid, "Persisted entity");
        Ok(rid)
    }

    /// Saves a managed proxy's current state, or inserts a transient
    /// entity, optionally in a named cluster.
    pub async fn persist_in<T: Entity, ID: EntityId>(
        &self,
        entity: impl Into<Persistable<T>>,
        cluster: Option<&str>,
        info: &EntityInformation<T, ID>,
    ) -> Result<EntityProxy<T>> {
        let session = self.session().await?;
        let proxy = match entity.into() {
            Persistable::Managed(proxy) => {
                proxy.save_element(&*session, cluster).await?;
                proxy
            }
            Persistable::Transient(entity) => info.save_new(&entity, &*session, cluster).await?,
        };
        tracing::debug!(
            entity = info.entity_name(),
            rid = ?proxy.rid(),
            cluster = cluster.unwrap_or_default(),
            "Saved entity"
        );
        Ok(proxy)
    }

    /// Deletes the backing element of a managed entity. Transient entities
    /// are left alone.
    pub async fn remove<T: Entity>(&self, entity: impl Into<Persistable<T>>) -> Result<()> {
        match entity.into() {
            Persistable::Managed(proxy) => {
                let session = self.session().await?;
                proxy.delete_element(&*session).await?;
                tracing::debug!(entity = proxy.entity_name(), rid = ?proxy.rid(), "Removed entity");
            }
            Persistable::Transient(_) => {
                tracing::debug!(entity = T::simple_name(), "Ignoring removal of transient entity");
            }
        }
        Ok(())
    }

    /// Loads the entity stored under `id`; `None` when nothing is stored.
    pub async fn find<T: Entity, ID: EntityId>(
        &self,
        id: &ID,
        info: &EntityInformation<T, ID>,
    ) -> Result<Option<EntityProxy<T>>> {
        let rid = info.to_record_identifier(id)?;
        let session = self.session().await?;
        let found = match session.load(&rid).await? {
            Some(element) => Some(info.resolve_proxy(element, &mut DedupCache::new())?),
            None => None,
        };
        tracing::debug!(entity = info.entity_name(), %rid, found = found.is_some(), "Find entity");
        Ok(found)
    }

    /// Every stored entity of the mapped class, in driver scan order.
    pub async fn find_all<T: Entity, ID: EntityId>(
        &self,
        info: &EntityInformation<T, ID>,
    ) -> Result<Vec<EntityProxy<T>>> {
        let session = self.session().await?;
        let cursor = session.browse_class(info.entity_name()).await?;
        let entities = resolve_all(cursor, info).await?;
        tracing::debug!(entity = info.entity_name(), count = entities.len(), "Find all entities");
        Ok(entities)
    }

    /// Stored entities of the mapped class within one cluster.
    pub async fn find_all_in_cluster<T: Entity, ID: EntityId>(
        &self,
        cluster: &str,
        info: &EntityInformation<T, ID>,
    ) -> Result<Vec<EntityProxy<T>>> {
        let session = self.session().await?;
        let cursor = session.browse_cluster(cluster).await?;
        let entities = resolve_all(cursor, info).await?;
        tracing::debug!(
            entity = info.entity_name(),
            cluster,
            count = entities.len(),
            "Find all entities in cluster"
        );
        Ok(entities)
    }

    pub async fn count<T: Entity, ID: EntityId>(&self, info: &EntityInformation<T, ID>) -> Result<u64> {
        let session = self.session().await?;
        let count = session.count_class(info.entity_name()).await?;
        tracing::debug!(entity = info.entity_name(), count, "Count entities");
        Ok(count)
    }

    /// Runs `template` with every `%s` replaced by the class name.
    pub async fn create_query<T: Entity, ID: EntityId>(
        &self,
        template: &str,
        info: &EntityInformation<T, ID>,
    ) -> Result<TypedQuery<T, ID>> {
        let text = template.replace("%s", info.entity_name());
        let session = self.session().await?;
        let cursor = session.query(&text).await?;
        tracing::debug!(entity = info.entity_name(), query = %text, "Created query");
        Ok(TypedQuery::new(text, cursor, info.clone(), session))
    }

    /// Follows a reference field of `entity`.
    pub async fn navigate<T: Entity, V: Entity, VID: EntityId>(
        &self,
        entity: &EntityProxy<T>,
        field: &str,
        target: &EntityInformation<V, VID>,
    ) -> Result<Option<EntityProxy<V>>> {
        let session = self.session().await?;
        match self.navigated(&session) {
            Some(cache) => {
                let mut cache = cache.lock().await;
                entity.navigate(field, target, &*session, &mut cache).await
            }
            None => {
                entity
                    .navigate(field, target, &*session, &mut DedupCache::new())
                    .await
            }
        }
    }

    /// Edges of type `E` attached to the vertex `entity`.
    pub async fn edges<T: Entity, E: Entity, EID: EntityId>(
        &self,
        entity: &EntityProxy<T>,
        direction: Direction,
        edge: &EntityInformation<E, EID>,
    ) -> Result<Vec<EntityProxy<E>>> {
        let session = self.session().await?;
        match self.navigated(&session) {
            Some(cache) => {
                let mut cache = cache.lock().await;
                entity.edges(direction, edge, &*session, &mut cache).await
            }
            None => {
                entity
                    .edges(direction, edge, &*session, &mut DedupCache::new())
                    .await
            }
        }
    }
}

/// Drains `cursor`, resolving every element through one cache.
async fn resolve_all<T: Entity, ID: EntityId>(
    mut cursor: Cursor,
    info: &EntityInformation<T, ID>,
) -> Result<Vec<EntityProxy<T>>> {
    let mut cache = DedupCache::new();
    let mut entities = Vec::new();
    while let Some(element) = cursor.try_next().await? {
        entities.push(info.resolve_proxy(element, &mut cache)?);
    }
    Ok(entities)
}
