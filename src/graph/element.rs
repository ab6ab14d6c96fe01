//! Records and the shared element handle.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{Map, Value as JsonValue};

use crate::graph::Rid;

/// Structural kind of a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Plain document.
    Element,
    Vertex,
    /// Relationship between two vertices.
    Edge,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementKind::Element => "element",
            ElementKind::Vertex => "vertex",
            ElementKind::Edge => "edge",
        };
        f.write_str(name)
    }
}

/// Direction of an edge relative to a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Edges whose `out` endpoint is the vertex.
    Out,
    /// Edges whose `in` endpoint is the vertex.
    In,
    Both,
}

/// In-memory state of a database record.
///
/// Properties hold scalar and embedded values as JSON. References to other
/// records live in `links`; edges additionally carry their `out`/`in`
/// endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub(crate) rid: Option<Rid>,
    pub(crate) class: String,
    pub(crate) kind: ElementKind,
    pub(crate) version: u32,
    pub(crate) properties: Map<String, JsonValue>,
    pub(crate) links: BTreeMap<String, Rid>,
    pub(crate) out: Option<Rid>,
    pub(crate) in_: Option<Rid>,
    pub(crate) dirty: bool,
}

impl Record {
    /// Creates an unsaved record of the given class.
    pub fn new(class: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            rid: None,
            class: class.into(),
            kind,
            version: 0,
            properties: Map::new(),
            links: BTreeMap::new(),
            out: None,
            in_: None,
            dirty: true,
        }
    }

    pub fn rid(&self) -> Option<Rid> {
        self.rid
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Version last seen from storage; 0 before the first save.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn property(&self, name: &str) -> Option<&JsonValue> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> &Map<String, JsonValue> {
        &self.properties
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: JsonValue) {
        self.properties.insert(name.into(), value);
        self.dirty = true;
    }

    pub fn remove_property(&mut self, name: &str) -> Option<JsonValue> {
        let removed = self.properties.remove(name);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    pub fn link(&self, name: &str) -> Option<Rid> {
        self.links.get(name).copied()
    }

    pub fn links(&self) -> &BTreeMap<String, Rid> {
        &self.links
    }

    /// Sets or clears a link.
    pub fn set_link(&mut self, name: impl Into<String>, target: Option<Rid>) {
        let name = name.into();
        match target {
            Some(rid) => {
                self.links.insert(name, rid);
            }
            None => {
                self.links.remove(&name);
            }
        }
        self.dirty = true;
    }

    /// Endpoint of an edge record. `Direction::Both` has no single endpoint.
    pub fn endpoint(&self, direction: Direction) -> Option<Rid> {
        match direction {
            Direction::Out => self.out,
            Direction::In => self.in_,
            Direction::Both => None,
        }
    }

    pub fn set_endpoint(&mut self, direction: Direction, target: Option<Rid>) {
        match direction {
            Direction::Out => self.out = target,
            Direction::In => self.in_ = target,
            Direction::Both => return,
        }
        self.dirty = true;
    }

    /// Records the identity and version assigned by storage.
    pub fn assign(&mut self, rid: Rid, version: u32) {
        self.rid = Some(rid);
        self.version = version;
        self.dirty = false;
    }

    /// Whether this record is attached to `vertex` in the given direction.
    pub fn touches(&self, vertex: &Rid, direction: Direction) -> bool {
        if self.kind != ElementKind::Edge {
            return false;
        }
        match direction {
            Direction::Out => self.out.as_ref() == Some(vertex),
            Direction::In => self.in_.as_ref() == Some(vertex),
            Direction::Both => self.out.as_ref() == Some(vertex) || self.in_.as_ref() == Some(vertex),
        }
    }
}

/// Shared handle to a live record.
///
/// Cloning the handle shares the record; sessions hand out the same handle
/// for repeated loads of one rid, and proxies write through it.
#[derive(Clone)]
pub struct Element(Arc<RwLock<Record>>);

impl Element {
    pub fn new(record: Record) -> Self {
        Self(Arc::new(RwLock::new(record)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Record> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Record> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn rid(&self) -> Option<Rid> {
        self.read().rid
    }

    pub fn class(&self) -> String {
        self.read().class.clone()
    }

    pub fn kind(&self) -> ElementKind {
        self.read().kind
    }

    /// Copy of the current record state.
    pub fn snapshot(&self) -> Record {
        self.read().clone()
    }

    /// True when both handles share one record.
    pub fn ptr_eq(&self, other: &Element) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.read();
        f.debug_struct("Element")
            .field("rid", &record.rid)
            .field("class", &record.class)
            .field("version", &record.version)
            .finish()
    }
}

impl From<Record> for Element {
    fn from(record: Record) -> Self {
        Self::new(record)
    }
}
