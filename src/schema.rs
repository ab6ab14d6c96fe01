//! Schema generation for registered entities.
//!
//! Creates the database class of every non-embedded entity with its record
//! kind, then its declared indexes. Generation is:
//! - **Idempotent**: existing classes and indexes are left untouched
//! - **Additive-only**: nothing is ever dropped or altered
//! - **Ordered**: classes are processed by name

use std::sync::Arc;

use crate::error::Result;
use crate::graph::Session;
use crate::mapping::EntityRegistry;
use crate::session::SessionProvider;

/// What a generation run created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReport {
    pub created_classes: Vec<String>,
    pub created_indexes: Vec<String>,
}

impl SchemaReport {
    /// True when the schema was already complete.
    pub fn is_empty(&self) -> bool {
        self.created_classes.is_empty() && self.created_indexes.is_empty()
    }
}

/// Generates the schema for an [`EntityRegistry`].
pub struct SchemaGenerator {
    registry: Arc<EntityRegistry>,
}

impl SchemaGenerator {
    pub fn new(registry: Arc<EntityRegistry>) -> Self {
        Self { registry }
    }

    /// Runs generation on a session scoped to this call.
    pub async fn run(&self, sessions: &SessionProvider) -> Result<SchemaReport> {
        let session = sessions.current_session(None).await?;
        self.generate(&*session).await
    }

    /// Creates missing classes and indexes through `session`.
    pub async fn generate(&self, session: &dyn Session) -> Result<SchemaReport> {
        let mut report = SchemaReport::default();

        for metadata in self.registry.iter() {
            let Some(kind) = metadata.entity_type().element_kind() else {
                continue;
            };

            if session.create_class(metadata.name(), kind).await? {
                tracing::info!("Created {} class {}", kind, metadata.name());
                report.created_classes.push(metadata.name().to_string());
            }

            for index in metadata.indexes() {
                if session.create_index(metadata.name(), index).await? {
                    tracing::info!(
                        "Created {:?} index {} on {}({})",
                        index.index_type,
                        index.name,
                        metadata.name(),
                        index.fields.join(", ")
                    );
                    report.created_indexes.push(index.name.clone());
                }
            }
        }

        if report.is_empty() {
            tracing::debug!("Schema is up to date");
        }
        Ok(report)
    }
}
