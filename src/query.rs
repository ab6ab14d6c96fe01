//! Typed query results.

use futures::TryStreamExt;

use crate::error::Result;
use crate::graph::Cursor;
use crate::mapping::{Entity, EntityId, EntityInformation};
use crate::proxy::{DedupCache, EntityProxy};
use crate::session::SessionHandle;

/// A query whose rows are entities of type `T`.
///
/// The cursor is single-pass, so [`get_result_list`](TypedQuery::get_result_list)
/// consumes the query. A scoped session stays open until then.
pub struct TypedQuery<T, ID> {
    text: String,
    cursor: Cursor,
    information: EntityInformation<T, ID>,
    _session: SessionHandle,
}

impl<T: Entity, ID: EntityId> TypedQuery<T, ID> {
    pub(crate) fn new(
        text: String,
        cursor: Cursor,
        information: EntityInformation<T, ID>,
        session: SessionHandle,
    ) -> Self {
        Self {
            text,
            cursor,
            information,
            _session: session,
        }
    }

    /// The executed query text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Drains the cursor into proxies. Rows backed by the same element
    /// resolve to the same proxy.
    pub async fn get_result_list(mut self) -> Result<Vec<EntityProxy<T>>> {
        let mut cache = DedupCache::new();
        let mut results = Vec::new();
        while let Some(element) = self.cursor.try_next().await? {
            results.push(self.information.resolve_proxy(element, &mut cache)?);
        }
        tracing::trace!(query = %self.text, rows = results.len(), "Materialized query results");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use futures::stream;

    use crate::graph::backends::memory::MemoryDatabase;
    use crate::graph::{Element, ElementKind, Record, Rid, Session};
    use crate::mapping::{EntityMarker, EntityRegistry, RidIdParser};
    use crate::session::SessionProvider;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct Item {
        sku: String,
    }

    impl Entity for Item {
        fn markers() -> Vec<EntityMarker> {
            vec![EntityMarker::element()]
        }
    }

    #[tokio::test]
    async fn test_repeated_rows_share_one_proxy() {
        let registry = Arc::new(EntityRegistry::builder().register::<Item>().build().unwrap());
        let info = EntityInformation::<Item, Rid>::new(registry, RidIdParser).unwrap();
        let provider = SessionProvider::new(Arc::new(MemoryDatabase::new("query")));
        let session = provider.current_session(None).await.unwrap();

        let mut record = Record::new("Item", ElementKind::Element);
        record.set_property("sku", serde_json::json!("a-1"));
        let element = Element::new(record);
        session.save(&element, None).await.unwrap();

        let cursor: Cursor = Box::pin(stream::iter(vec![Ok(element.clone()), Ok(element)]));
        let query = TypedQuery::new("rows".to_string(), cursor, info, session);

        let rows = query.get_result_list().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].same_instance(&rows[1]));
        assert_eq!(rows[0].get::<String>("sku").unwrap(), "a-1");
    }
}
