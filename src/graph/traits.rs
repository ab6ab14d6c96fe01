//! Driver contract.
//!
//! The mapping layer talks to a graph database only through these traits:
//!
//! - [`SessionFactory`] - opens sessions against one data source
//! - [`Session`] - record CRUD, scans, queries, transactions and schema

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::StorageError;
use crate::graph::element::{Direction, Element, ElementKind};
use crate::graph::index::IndexSpec;
use crate::graph::Rid;

/// A stream of elements produced by a scan or a query.
///
/// Cursors are single-pass: once drained they cannot be restarted.
pub type Cursor = BoxStream<'static, Result<Element, StorageError>>;

/// A connection to the database.
///
/// Sessions are used from one task at a time but must be shareable so a
/// unit of work can hand the same session to several calls.
#[async_trait]
pub trait Session: Send + Sync {
    /// Identifier used in logs.
    fn id(&self) -> &str;

    /// Persists the element and returns its identity.
    ///
    /// New records get a rid in `cluster` (or the class default cluster).
    /// Existing records are written back with an optimistic version check.
    async fn save(&self, element: &Element, cluster: Option<&str>) -> Result<Rid, StorageError>;

    /// Loads a record, or `None` when nothing is stored under `rid`.
    ///
    /// Repeated loads within one session return the same handle.
    async fn load(&self, rid: &Rid) -> Result<Option<Element>, StorageError>;

    /// Deletes a record. Deleting a vertex also deletes its edges.
    async fn delete(&self, rid: &Rid) -> Result<(), StorageError>;

    async fn browse_class(&self, class: &str) -> Result<Cursor, StorageError>;

    async fn browse_cluster(&self, cluster: &str) -> Result<Cursor, StorageError>;

    async fn count_class(&self, class: &str) -> Result<u64, StorageError>;

    /// Executes a query in the driver's query language.
    async fn query(&self, text: &str) -> Result<Cursor, StorageError>;

    /// Edges attached to `vertex`, optionally restricted to one edge class.
    async fn edges(
        &self,
        vertex: &Rid,
        direction: Direction,
        class: Option<&str>,
    ) -> Result<Vec<Element>, StorageError>;

    async fn begin(&self) -> Result<(), StorageError>;

    async fn commit(&self) -> Result<(), StorageError>;

    async fn rollback(&self) -> Result<(), StorageError>;

    async fn class_exists(&self, class: &str) -> Result<bool, StorageError>;

    /// Creates a class. Returns `false` if it already existed.
    async fn create_class(&self, class: &str, kind: ElementKind) -> Result<bool, StorageError>;

    /// Creates an index. Returns `false` if it already existed.
    async fn create_index(&self, class: &str, index: &IndexSpec) -> Result<bool, StorageError>;

    /// Releases the session. Pending transactional changes are discarded.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Opens sessions against one data source.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Identity of the data source; units of work are keyed by it.
    fn source(&self) -> &str;

    async fn open(&self) -> Result<Arc<dyn Session>, StorageError>;
}
