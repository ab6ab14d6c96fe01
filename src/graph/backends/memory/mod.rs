//! In-process graph database.
//!
//! A complete driver kept in memory: classes with default clusters,
//! optimistic record versions, unique indexes, per-session transactions
//! and a small SQL subset (see `sql.pest`). Used for embedding, tests and
//! as the reference implementation of the driver contract.
//!
//! # Example
//!
//! ```ignore
//! use graph_ogm::graph::backends::memory::MemoryDatabase;
//! use graph_ogm::graph::SessionFactory;
//!
//! let database = MemoryDatabase::new("demo");
//! let session = database.open().await?;
//! let people = session.count_class("Person").await?;
//! ```

mod query;
mod store;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::stream;

use crate::error::StorageError;
use crate::graph::element::{Direction, Element, ElementKind, Record};
use crate::graph::index::IndexSpec;
use crate::graph::traits::{Cursor, Session, SessionFactory};
use crate::graph::Rid;

use query::{Select, Target};
use store::Store;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An in-memory database; cheap to clone, clones share storage.
#[derive(Clone)]
pub struct MemoryDatabase {
    source: Arc<str>,
    store: Arc<Mutex<Store>>,
}

impl MemoryDatabase {
    pub fn new(name: &str) -> Self {
        Self {
            source: Arc::from(format!("memory:{}", name)),
            store: Arc::new(Mutex::new(Store::default())),
        }
    }

    /// Opens a session without going through the factory trait.
    pub fn session(&self) -> MemorySession {
        MemorySession {
            id: ulid::Ulid::new().to_string(),
            store: self.store.clone(),
            tx: Mutex::new(None),
            cache: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl SessionFactory for MemoryDatabase {
    fn source(&self) -> &str {
        &self.source
    }

    async fn open(&self) -> Result<Arc<dyn Session>, StorageError> {
        let session = self.session();
        tracing::debug!(session = %session.id, source = %self.source, "Opened memory session");
        Ok(Arc::new(session))
    }
}

/// Pending changes of an open transaction.
#[derive(Debug, Default)]
struct TxState {
    /// `None` marks a deletion.
    writes: BTreeMap<Rid, Option<Record>>,
    /// Committed version observed when the rid was first touched (0 = absent).
    base_versions: HashMap<Rid, u32>,
}

/// A session over a [`MemoryDatabase`].
pub struct MemorySession {
    id: String,
    store: Arc<Mutex<Store>>,
    tx: Mutex<Option<TxState>>,
    cache: Mutex<HashMap<Rid, Element>>,
    closed: AtomicBool,
}

impl MemorySession {
    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::Acquire) {
            Err(StorageError::SessionClosed)
        } else {
            Ok(())
        }
    }

    /// Returns the cached handle for a record, refreshing clean handles.
    fn attach(&self, record: Record) -> Element {
        let Some(rid) = record.rid else {
            return Element::new(record);
        };

        let mut cache = lock(&self.cache);
        if let Some(existing) = cache.get(&rid) {
            let mut current = existing.write();
            if !current.dirty {
                *current = record;
            }
            drop(current);
            return existing.clone();
        }

        let element = Element::new(record);
        cache.insert(rid, element.clone());
        element
    }

    fn attach_all(&self, records: Vec<Record>) -> Vec<Element> {
        records.into_iter().map(|r| self.attach(r)).collect()
    }

    fn cursor(elements: Vec<Element>) -> Cursor {
        Box::pin(stream::iter(elements.into_iter().map(Ok)))
    }
}

fn visible(store: &Store, tx: Option<&TxState>, rid: &Rid) -> Option<Record> {
    if let Some(pending) = tx.and_then(|t| t.writes.get(rid)) {
        return pending.clone();
    }
    store.get(rid).cloned()
}

fn visible_records(store: &Store, tx: Option<&TxState>) -> Vec<Record> {
    let mut records: BTreeMap<Rid, Record> = store
        .records()
        .map(|(rid, record)| (rid, record.clone()))
        .collect();

    if let Some(tx) = tx {
        for (rid, pending) in &tx.writes {
            match pending {
                Some(record) => {
                    records.insert(*rid, record.clone());
                }
                None => {
                    records.remove(rid);
                }
            }
        }
    }
    records.into_values().collect()
}

fn write(store: &mut Store, tx: Option<&mut TxState>, rid: Rid, record: Option<Record>) -> Result<(), StorageError> {
    match tx {
        Some(tx) => {
            let committed = store.get(&rid).map(|r| r.version).unwrap_or(0);
            tx.base_versions.entry(rid).or_insert(committed);
            tx.writes.insert(rid, record);
            Ok(())
        }
        None => match record {
            Some(record) => store.put(rid, record),
            None => {
                store.remove(&rid);
                Ok(())
            }
        },
    }
}

fn index_key(record: &Record, index: &IndexSpec) -> Option<String> {
    let mut parts = Vec::with_capacity(index.fields.len());
    for field in &index.fields {
        match record.properties.get(field) {
            None | Some(serde_json::Value::Null) => return None,
            Some(value) => parts.push(value.to_string()),
        }
    }
    Some(parts.join(","))
}

fn check_unique(store: &Store, tx: Option<&TxState>, record: &Record) -> Result<(), StorageError> {
    let Some(class) = store.class(&record.class) else {
        return Ok(());
    };
    let unique: Vec<&IndexSpec> = class.indexes.iter().filter(|i| i.is_unique()).collect();
    if unique.is_empty() {
        return Ok(());
    }

    let others: Vec<Record> = visible_records(store, tx)
        .into_iter()
        .filter(|r| r.class == record.class && r.rid != record.rid)
        .collect();

    for index in unique {
        let Some(key) = index_key(record, index) else {
            continue;
        };
        if others.iter().any(|r| index_key(r, index).as_deref() == Some(key.as_str())) {
            return Err(StorageError::ConstraintViolation {
                index: index.name.clone(),
                key,
            });
        }
    }
    Ok(())
}

fn check_endpoints(store: &Store, tx: Option<&TxState>, record: &Record) -> Result<(), StorageError> {
    if record.kind != ElementKind::Edge {
        return Ok(());
    }
    for (side, endpoint) in [("out", record.out), ("in", record.in_)] {
        let rid = endpoint.ok_or_else(|| {
            StorageError::InvalidRecord(format!("edge {} has no '{}' vertex", record.class, side))
        })?;
        let target = visible(store, tx, &rid).ok_or(StorageError::RecordNotFound(rid))?;
        if target.kind != ElementKind::Vertex {
            return Err(StorageError::InvalidRecord(format!(
                "edge {} '{}' endpoint {} is not a vertex",
                record.class, side, rid
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl Session for MemorySession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn save(&self, element: &Element, cluster: Option<&str>) -> Result<Rid, StorageError> {
        self.ensure_open()?;

        let (rid, snapshot) = {
            let mut store = lock(&self.store);
            let mut tx = lock(&self.tx);
            let mut record = element.write();

            store.ensure_class(&record.class, record.kind)?;
            check_endpoints(&store, tx.as_ref(), &record)?;

            let existing = record.rid;
            match existing {
                None => {
                    let cluster_id = match cluster {
                        Some(name) => store.ensure_cluster(name, &record.class)?,
                        None => store
                            .class(&record.class)
                            .map(|c| c.default_cluster)
                            .ok_or_else(|| StorageError::ClassNotFound(record.class.clone()))?,
                    };
                    check_unique(&store, tx.as_ref(), &record)?;
                    let rid = store.allocate(cluster_id)?;
                    record.assign(rid, 1);
                }
                Some(rid) => {
                    if let Some(requested) = cluster {
                        if store.cluster_id(requested) != Some(rid.cluster()) {
                            return Err(StorageError::ClusterMismatch {
                                rid,
                                actual: store.cluster_name(rid.cluster()).unwrap_or_default().to_string(),
                                requested: requested.to_string(),
                            });
                        }
                    }
                    let current =
                        visible(&store, tx.as_ref(), &rid).ok_or(StorageError::RecordNotFound(rid))?;
                    if current.version != record.version {
                        return Err(StorageError::ConcurrentModification {
                            rid,
                            expected: record.version,
                            actual: current.version,
                        });
                    }
                    check_unique(&store, tx.as_ref(), &record)?;
                    record.assign(rid, current.version + 1);
                }
            }

            let rid = record.rid.ok_or_else(|| {
                StorageError::InvalidRecord("record has no identity after save".to_string())
            })?;
            let snapshot = record.clone();
            drop(record);

            write(&mut store, tx.as_mut(), rid, Some(snapshot.clone()))?;
            (rid, snapshot)
        };

        tracing::trace!(session = %self.id, %rid, version = snapshot.version, "Saved record");
        lock(&self.cache).insert(rid, element.clone());
        Ok(rid)
    }

    async fn load(&self, rid: &Rid) -> Result<Option<Element>, StorageError> {
        self.ensure_open()?;
        let record = {
            let store = lock(&self.store);
            let tx = lock(&self.tx);
            visible(&store, tx.as_ref(), rid)
        };
        Ok(record.map(|r| self.attach(r)))
    }

    async fn delete(&self, rid: &Rid) -> Result<(), StorageError> {
        self.ensure_open()?;

        let doomed = {
            let mut store = lock(&self.store);
            let mut tx = lock(&self.tx);

            let record = visible(&store, tx.as_ref(), rid).ok_or(StorageError::RecordNotFound(*rid))?;
            let mut doomed = vec![*rid];
            if record.kind == ElementKind::Vertex {
                doomed.extend(
                    visible_records(&store, tx.as_ref())
                        .into_iter()
                        .filter(|r| r.touches(rid, Direction::Both))
                        .filter_map(|r| r.rid),
                );
            }

            for target in &doomed {
                write(&mut store, tx.as_mut(), *target, None)?;
            }
            doomed
        };

        let mut cache = lock(&self.cache);
        for target in &doomed {
            cache.remove(target);
        }
        tracing::trace!(session = %self.id, %rid, removed = doomed.len(), "Deleted record");
        Ok(())
    }

    async fn browse_class(&self, class: &str) -> Result<Cursor, StorageError> {
        self.ensure_open()?;
        let records = {
            let store = lock(&self.store);
            if store.class(class).is_none() {
                return Err(StorageError::ClassNotFound(class.to_string()));
            }
            let tx = lock(&self.tx);
            visible_records(&store, tx.as_ref())
                .into_iter()
                .filter(|r| r.class == class)
                .collect::<Vec<_>>()
        };
        Ok(Self::cursor(self.attach_all(records)))
    }

    async fn browse_cluster(&self, cluster: &str) -> Result<Cursor, StorageError> {
        self.ensure_open()?;
        let records = {
            let store = lock(&self.store);
            let id = store
                .cluster_id(cluster)
                .ok_or_else(|| StorageError::ClusterNotFound(cluster.to_string()))?;
            let tx = lock(&self.tx);
            visible_records(&store, tx.as_ref())
                .into_iter()
                .filter(|r| r.rid.map(|rid| rid.cluster()) == Some(id))
                .collect::<Vec<_>>()
        };
        Ok(Self::cursor(self.attach_all(records)))
    }

    async fn count_class(&self, class: &str) -> Result<u64, StorageError> {
        self.ensure_open()?;
        let store = lock(&self.store);
        if store.class(class).is_none() {
            return Err(StorageError::ClassNotFound(class.to_string()));
        }
        let tx = lock(&self.tx);
        let count = visible_records(&store, tx.as_ref())
            .iter()
            .filter(|r| r.class == class)
            .count();
        Ok(count as u64)
    }

    async fn query(&self, text: &str) -> Result<Cursor, StorageError> {
        self.ensure_open()?;
        let select = Select::parse(text)?;

        let records = {
            let store = lock(&self.store);
            let tx = lock(&self.tx);
            let candidates = visible_records(&store, tx.as_ref());
            match &select.target {
                Target::Class(class) => {
                    if store.class(class).is_none() {
                        return Err(StorageError::ClassNotFound(class.clone()));
                    }
                    candidates.into_iter().filter(|r| &r.class == class).collect::<Vec<_>>()
                }
                Target::Cluster(cluster) => {
                    let id = store
                        .cluster_id(cluster)
                        .ok_or_else(|| StorageError::ClusterNotFound(cluster.clone()))?;
                    candidates
                        .into_iter()
                        .filter(|r| r.rid.map(|rid| rid.cluster()) == Some(id))
                        .collect::<Vec<_>>()
                }
            }
        };

        let selected = select.apply(records);
        tracing::trace!(session = %self.id, query = text, rows = selected.len(), "Executed query");
        Ok(Self::cursor(self.attach_all(selected)))
    }

    async fn edges(
        &self,
        vertex: &Rid,
        direction: Direction,
        class: Option<&str>,
    ) -> Result<Vec<Element>, StorageError> {
        self.ensure_open()?;
        let records = {
            let store = lock(&self.store);
            let tx = lock(&self.tx);
            visible_records(&store, tx.as_ref())
                .into_iter()
                .filter(|r| r.touches(vertex, direction))
                .filter(|r| class.map_or(true, |c| r.class == c))
                .collect::<Vec<_>>()
        };
        Ok(self.attach_all(records))
    }

    async fn begin(&self) -> Result<(), StorageError> {
        self.ensure_open()?;
        let mut tx = lock(&self.tx);
        if tx.is_some() {
            return Err(StorageError::Transaction(
                "a transaction is already active".to_string(),
            ));
        }
        *tx = Some(TxState::default());
        Ok(())
    }

    async fn commit(&self) -> Result<(), StorageError> {
        self.ensure_open()?;
        let mut store = lock(&self.store);
        let pending = lock(&self.tx)
            .take()
            .ok_or_else(|| StorageError::Transaction("no active transaction".to_string()))?;

        for (rid, expected) in &pending.base_versions {
            let actual = store.get(rid).map(|r| r.version).unwrap_or(0);
            if actual != *expected {
                drop(store);
                lock(&self.cache).clear();
                return Err(StorageError::ConcurrentModification {
                    rid: *rid,
                    expected: *expected,
                    actual,
                });
            }
        }

        // Keys committed by other sessions since this transaction began
        for record in pending.writes.values().flatten() {
            if let Err(e) = check_unique(&store, Some(&pending), record) {
                drop(store);
                lock(&self.cache).clear();
                return Err(e);
            }
        }

        let changes = pending.writes.len();
        for (rid, record) in pending.writes {
            write(&mut store, None, rid, record)?;
        }
        tracing::trace!(session = %self.id, changes, "Committed transaction");
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StorageError> {
        self.ensure_open()?;
        let discarded = lock(&self.tx)
            .take()
            .ok_or_else(|| StorageError::Transaction("no active transaction".to_string()))?;
        lock(&self.cache).clear();
        tracing::trace!(session = %self.id, changes = discarded.writes.len(), "Rolled back transaction");
        Ok(())
    }

    async fn class_exists(&self, class: &str) -> Result<bool, StorageError> {
        self.ensure_open()?;
        Ok(lock(&self.store).class(class).is_some())
    }

    async fn create_class(&self, class: &str, kind: ElementKind) -> Result<bool, StorageError> {
        self.ensure_open()?;
        lock(&self.store).ensure_class(class, kind)
    }

    async fn create_index(&self, class: &str, index: &IndexSpec) -> Result<bool, StorageError> {
        self.ensure_open()?;
        let mut store = lock(&self.store);

        if index.is_unique() {
            let tx = lock(&self.tx);
            let mut seen = std::collections::HashSet::new();
            for record in visible_records(&store, tx.as_ref()).iter().filter(|r| r.class == class) {
                if let Some(key) = index_key(record, index) {
                    if !seen.insert(key.clone()) {
                        return Err(StorageError::ConstraintViolation {
                            index: index.name.clone(),
                            key,
                        });
                    }
                }
            }
        }

        store.add_index(class, index)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            lock(&self.tx).take();
            lock(&self.cache).clear();
            tracing::debug!(session = %self.id, "Closed memory session");
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use serde_json::json;

    fn vertex(class: &str, name: &str) -> Element {
        let mut record = Record::new(class, ElementKind::Vertex);
        record.set_property("name", json!(name));
        Element::new(record)
    }

    async fn names(cursor: Cursor) -> Vec<String> {
        let elements: Vec<Element> = cursor.try_collect().await.unwrap();
        elements
            .iter()
            .map(|e| e.read().property("name").and_then(|v| v.as_str()).unwrap_or_default().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_save_assigns_rid_and_load_returns_same_handle() {
        let database = MemoryDatabase::new("test");
        let session = database.session();

        let ada = vertex("Person", "Ada");
        let rid = session.save(&ada, None).await.unwrap();
        assert_eq!(ada.rid(), Some(rid));
        assert_eq!(ada.read().version(), 1);

        let loaded = session.load(&rid).await.unwrap().unwrap();
        assert!(loaded.ptr_eq(&ada));
        assert!(session.load(&Rid::new(rid.cluster(), 99)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_save_is_rejected() {
        let database = MemoryDatabase::new("test");
        let first = database.session();
        let second = database.session();

        let ada = vertex("Person", "Ada");
        let rid = first.save(&ada, None).await.unwrap();

        let copy = second.load(&rid).await.unwrap().unwrap();
        copy.write().set_property("name", json!("Ada L."));
        second.save(&copy, None).await.unwrap();

        ada.write().set_property("name", json!("Stale"));
        let err = first.save(&ada, None).await.unwrap_err();
        assert_eq!(
            err,
            StorageError::ConcurrentModification {
                rid,
                expected: 1,
                actual: 2
            }
        );
    }

    #[tokio::test]
    async fn test_unique_index_violation() {
        let database = MemoryDatabase::new("test");
        let session = database.session();
        session.create_class("Person", ElementKind::Vertex).await.unwrap();
        session
            .create_index("Person", &IndexSpec::unique("Person.name", ["name"]))
            .await
            .unwrap();

        session.save(&vertex("Person", "Ada"), None).await.unwrap();
        let err = session.save(&vertex("Person", "Ada"), None).await.unwrap_err();
        assert!(matches!(err, StorageError::ConstraintViolation { .. }));
    }

    #[tokio::test]
    async fn test_cluster_pinning_and_browse() {
        let database = MemoryDatabase::new("test");
        let session = database.session();

        let rid = session.save(&vertex("Person", "Ada"), Some("archive")).await.unwrap();
        session.save(&vertex("Person", "Grace"), None).await.unwrap();

        assert_eq!(names(session.browse_cluster("archive").await.unwrap()).await, vec!["Ada"]);
        assert_eq!(session.count_class("Person").await.unwrap(), 2);

        let moved = session.load(&rid).await.unwrap().unwrap();
        let err = session.save(&moved, Some("person")).await.unwrap_err();
        assert!(matches!(err, StorageError::ClusterMismatch { .. }));

        assert!(matches!(
            session.browse_cluster("nowhere").await,
            Err(StorageError::ClusterNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_named_cluster_holds_one_class() {
        let database = MemoryDatabase::new("test");
        let session = database.session();

        session.save(&vertex("Person", "Ada"), Some("shared")).await.unwrap();
        let err = session
            .save(&vertex("Company", "Acme"), Some("shared"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ClusterOwnership { ref owner, .. } if owner == "Person"));
        assert_eq!(names(session.browse_cluster("shared").await.unwrap()).await, vec!["Ada"]);
        assert_eq!(session.count_class("Company").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_commit_rechecks_unique_keys() {
        let database = MemoryDatabase::new("test");
        let a = database.session();
        let b = database.session();
        a.create_class("Person", ElementKind::Vertex).await.unwrap();
        a.create_index("Person", &IndexSpec::unique("Person.name", ["name"]))
            .await
            .unwrap();

        a.begin().await.unwrap();
        b.begin().await.unwrap();
        a.save(&vertex("Person", "Ada"), None).await.unwrap();
        b.save(&vertex("Person", "Ada"), None).await.unwrap();

        a.commit().await.unwrap();
        let err = b.commit().await.unwrap_err();
        assert_eq!(
            err,
            StorageError::ConstraintViolation {
                index: "Person.name".to_string(),
                key: "\"Ada\"".to_string(),
            }
        );

        let found = names(b.query("select from Person where name = 'Ada'").await.unwrap()).await;
        assert_eq!(found, vec!["Ada"]);
    }

    #[tokio::test]
    async fn test_commit_allows_replacing_a_unique_key() {
        let database = MemoryDatabase::new("test");
        let session = database.session();
        session.create_class("Person", ElementKind::Vertex).await.unwrap();
        session
            .create_index("Person", &IndexSpec::unique("Person.name", ["name"]))
            .await
            .unwrap();
        let old = session.save(&vertex("Person", "Ada"), None).await.unwrap();

        session.begin().await.unwrap();
        session.delete(&old).await.unwrap();
        session.save(&vertex("Person", "Ada"), None).await.unwrap();
        session.commit().await.unwrap();

        assert_eq!(session.count_class("Person").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_vertex_removes_edges() {
        let database = MemoryDatabase::new("test");
        let session = database.session();

        let a = session.save(&vertex("Person", "A"), None).await.unwrap();
        let b = session.save(&vertex("Person", "B"), None).await.unwrap();

        let mut knows = Record::new("Knows", ElementKind::Edge);
        knows.set_endpoint(Direction::Out, Some(a));
        knows.set_endpoint(Direction::In, Some(b));
        session.save(&Element::new(knows), None).await.unwrap();

        assert_eq!(session.edges(&a, Direction::Out, Some("Knows")).await.unwrap().len(), 1);
        assert_eq!(session.edges(&a, Direction::In, None).await.unwrap().len(), 0);

        session.delete(&b).await.unwrap();
        assert_eq!(session.count_class("Knows").await.unwrap(), 0);
        assert!(matches!(
            session.delete(&b).await,
            Err(StorageError::RecordNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_edge_requires_vertex_endpoints() {
        let database = MemoryDatabase::new("test");
        let session = database.session();

        let unbound = Record::new("Knows", ElementKind::Edge);
        let err = session.save(&Element::new(unbound), None).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidRecord(_)));

        let mut dangling = Record::new("Knows", ElementKind::Edge);
        dangling.set_endpoint(Direction::Out, Some(Rid::new(40, 0)));
        dangling.set_endpoint(Direction::In, Some(Rid::new(40, 1)));
        let err = session.save(&Element::new(dangling), None).await.unwrap_err();
        assert_eq!(err, StorageError::RecordNotFound(Rid::new(40, 0)));
    }

    #[tokio::test]
    async fn test_transaction_isolation_and_rollback() {
        let database = MemoryDatabase::new("test");
        let writer = database.session();
        let reader = database.session();
        reader.create_class("Person", ElementKind::Vertex).await.unwrap();

        writer.begin().await.unwrap();
        writer.save(&vertex("Person", "Ada"), None).await.unwrap();
        assert_eq!(writer.count_class("Person").await.unwrap(), 1);
        assert_eq!(reader.count_class("Person").await.unwrap(), 0);

        writer.rollback().await.unwrap();
        assert_eq!(writer.count_class("Person").await.unwrap(), 0);

        writer.begin().await.unwrap();
        writer.save(&vertex("Person", "Grace"), None).await.unwrap();
        writer.commit().await.unwrap();
        assert_eq!(reader.count_class("Person").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_query_and_closed_session() {
        let database = MemoryDatabase::new("test");
        let session = database.session();
        for name in ["A", "B", "A"] {
            session.save(&vertex("Person", name), None).await.unwrap();
        }

        let found = names(session.query("select from Person where name = 'A'").await.unwrap()).await;
        assert_eq!(found, vec!["A", "A"]);

        session.close();
        assert!(session.is_closed());
        assert!(matches!(
            session.count_class("Person").await,
            Err(StorageError::SessionClosed)
        ));
    }
}
