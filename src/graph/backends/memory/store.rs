//! Shared storage behind all sessions of one in-memory database.

use std::collections::BTreeMap;

use crate::error::StorageError;
use crate::graph::element::{ElementKind, Record};
use crate::graph::index::IndexSpec;
use crate::graph::Rid;

/// Schema entry for a class.
#[derive(Debug, Clone)]
pub(crate) struct ClassDef {
    pub kind: ElementKind,
    pub default_cluster: u32,
    pub indexes: Vec<IndexSpec>,
}

#[derive(Debug)]
struct Cluster {
    name: String,
    /// The only class whose records the cluster holds.
    class: String,
    next_position: u64,
    records: BTreeMap<u64, Record>,
}

/// Committed records, clusters and classes.
#[derive(Debug, Default)]
pub(crate) struct Store {
    classes: BTreeMap<String, ClassDef>,
    clusters: Vec<Cluster>,
}

impl Store {
    pub fn class(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(name)
    }

    /// Creates the class with a default cluster named after it
    /// (lowercased, suffixed when another class already owns that name).
    ///
    /// Returns `false` if the class exists. An existing class of another
    /// kind is an error.
    pub fn ensure_class(&mut self, name: &str, kind: ElementKind) -> Result<bool, StorageError> {
        if let Some(existing) = self.classes.get(name) {
            if existing.kind != kind {
                return Err(StorageError::InvalidRecord(format!(
                    "class {} is a {} class, not {}",
                    name, existing.kind, kind
                )));
            }
            return Ok(false);
        }

        let base = name.to_lowercase();
        let mut cluster_name = base.clone();
        let mut suffix = 1;
        while self.cluster_id(&cluster_name).is_some() {
            suffix += 1;
            cluster_name = format!("{}_{}", base, suffix);
        }
        let default_cluster = self.create_cluster(&cluster_name, name);
        self.classes.insert(
            name.to_string(),
            ClassDef {
                kind,
                default_cluster,
                indexes: Vec::new(),
            },
        );
        Ok(true)
    }

    /// Adds an index to an existing class. Returns `false` if an index with
    /// the same name exists.
    pub fn add_index(&mut self, class: &str, index: &IndexSpec) -> Result<bool, StorageError> {
        let def = self
            .classes
            .get_mut(class)
            .ok_or_else(|| StorageError::ClassNotFound(class.to_string()))?;

        if def.indexes.iter().any(|i| i.name == index.name) {
            return Ok(false);
        }
        def.indexes.push(index.clone());
        Ok(true)
    }

    pub fn cluster_id(&self, name: &str) -> Option<u32> {
        self.clusters
            .iter()
            .position(|c| c.name == name)
            .map(|id| id as u32)
    }

    pub fn cluster_name(&self, id: u32) -> Option<&str> {
        self.clusters.get(id as usize).map(|c| c.name.as_str())
    }

    /// The named cluster for records of `class`, created on first use.
    ///
    /// A cluster belongs to the class that created it; any other class
    /// writing to it is rejected.
    pub fn ensure_cluster(&mut self, name: &str, class: &str) -> Result<u32, StorageError> {
        let Some(id) = self.cluster_id(name) else {
            return Ok(self.create_cluster(name, class));
        };
        let owner = &self.clusters[id as usize].class;
        if owner != class {
            return Err(StorageError::ClusterOwnership {
                cluster: name.to_string(),
                owner: owner.clone(),
                class: class.to_string(),
            });
        }
        Ok(id)
    }

    fn create_cluster(&mut self, name: &str, class: &str) -> u32 {
        self.clusters.push(Cluster {
            name: name.to_string(),
            class: class.to_string(),
            next_position: 0,
            records: BTreeMap::new(),
        });
        (self.clusters.len() - 1) as u32
    }

    /// Reserves the next position in a cluster.
    pub fn allocate(&mut self, cluster: u32) -> Result<Rid, StorageError> {
        let target = self
            .clusters
            .get_mut(cluster as usize)
            .ok_or_else(|| StorageError::ClusterNotFound(format!("#{}", cluster)))?;
        let position = target.next_position;
        target.next_position += 1;
        Ok(Rid::new(cluster, position))
    }

    pub fn get(&self, rid: &Rid) -> Option<&Record> {
        self.clusters
            .get(rid.cluster() as usize)
            .and_then(|c| c.records.get(&rid.position()))
    }

    pub fn put(&mut self, rid: Rid, record: Record) -> Result<(), StorageError> {
        let cluster = self
            .clusters
            .get_mut(rid.cluster() as usize)
            .ok_or_else(|| StorageError::ClusterNotFound(format!("#{}", rid.cluster())))?;
        cluster.records.insert(rid.position(), record);
        Ok(())
    }

    pub fn remove(&mut self, rid: &Rid) -> Option<Record> {
        self.clusters
            .get_mut(rid.cluster() as usize)
            .and_then(|c| c.records.remove(&rid.position()))
    }

    /// All committed records in rid order.
    pub fn records(&self) -> impl Iterator<Item = (Rid, &Record)> {
        self.clusters.iter().enumerate().flat_map(|(id, cluster)| {
            cluster
                .records
                .iter()
                .map(move |(position, record)| (Rid::new(id as u32, *position), record))
        })
    }
}
