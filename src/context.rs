//! Dependency injection root.

use std::sync::Arc;

use crate::config::Config;
use crate::di::{Context as ContextDerive, FromRef};
use crate::error::Result;
use crate::graph::backends;
use crate::manager::EntityManager;
use crate::mapping::{Entity, EntityId, EntityInformation, EntityRegistry, EntityRegistryBuilder, IdParser};
use crate::repository::Repository;
use crate::schema::SchemaGenerator;
use crate::session::SessionProvider;

/// Shared dependencies of the mapping layer.
///
/// `#[derive(Context)]` makes each field resolvable through `FromRef`, so
/// types deriving `FromContext` (such as [`EntityManager`]) can be built
/// from it.
#[derive(ContextDerive, Clone)]
pub struct Context {
    /// Sessions against the configured database.
    pub sessions: SessionProvider,
    /// Every mapped entity type.
    pub registry: Arc<EntityRegistry>,
    pub config: Arc<Config>,
}

impl Context {
    pub fn new(sessions: SessionProvider, registry: EntityRegistry, config: Config) -> Self {
        Self {
            sessions,
            registry: Arc::new(registry),
            config: Arc::new(config),
        }
    }

    /// Builds the registry (restricted to the configured entity namespace),
    /// connects to the configured database and, when enabled, generates the
    /// schema.
    pub async fn bootstrap(config: Config, entities: EntityRegistryBuilder) -> Result<Self> {
        let entities = match config.mapping.entity_namespace.as_deref() {
            Some(namespace) => entities.scan_namespace(namespace),
            None => entities,
        };
        let registry = entities.build()?;
        let sessions = SessionProvider::new(backends::connect(&config.database)?);
        let context = Self::new(sessions, registry, config);

        if context.config.mapping.auto_generate_schema {
            let report = SchemaGenerator::new(context.registry.clone())
                .run(&context.sessions)
                .await?;
            tracing::info!(
                "Schema ready: {} classes and {} indexes created",
                report.created_classes.len(),
                report.created_indexes.len()
            );
        }

        tracing::info!(
            source = %context.sessions.source(),
            entities = context.registry.len(),
            "Mapping context ready"
        );
        Ok(context)
    }

    pub fn entity_manager(&self) -> EntityManager {
        EntityManager::from_ref(self)
    }

    /// Descriptor for a registered entity type.
    pub fn information<T: Entity, ID: EntityId>(
        &self,
        parser: impl IdParser<ID> + 'static,
    ) -> Result<EntityInformation<T, ID>> {
        EntityInformation::new(self.registry.clone(), parser)
    }

    pub fn repository<T: Entity, ID: EntityId>(
        &self,
        parser: impl IdParser<ID> + 'static,
    ) -> Result<Repository<T, ID>> {
        Ok(Repository::new(self.entity_manager(), self.information(parser)?))
    }
}
