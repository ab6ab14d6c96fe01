//! Entity kinds and their declarations.

use std::fmt;

use crate::error::OgmError;
use crate::graph::{ElementKind, IndexSpec};

/// Structural kind an application type maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    Element,
    Vertex,
    Edge,
    /// Stored inline inside a parent; never has its own record.
    Embedded,
}

/// A declaration attached to an application type: its kind, an optional
/// database class name override, and the indexes to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMarker {
    kind: EntityType,
    name: Option<String>,
    indexes: Vec<IndexSpec>,
}

impl EntityMarker {
    pub fn new(kind: EntityType) -> Self {
        Self {
            kind,
            name: None,
            indexes: Vec::new(),
        }
    }

    pub fn element() -> Self {
        Self::new(EntityType::Element)
    }

    pub fn vertex() -> Self {
        Self::new(EntityType::Vertex)
    }

    pub fn edge() -> Self {
        Self::new(EntityType::Edge)
    }

    pub fn embedded() -> Self {
        Self::new(EntityType::Embedded)
    }

    /// Overrides the database class name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn kind(&self) -> EntityType {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn indexes(&self) -> &[IndexSpec] {
        &self.indexes
    }
}

impl EntityType {
    /// Derives the entity type from a type's declarations.
    ///
    /// No declaration yields `None`; more than one is a configuration error.
    pub fn classify(markers: &[EntityMarker]) -> Result<Option<EntityType>, OgmError> {
        match markers {
            [] => Ok(None),
            [marker] => Ok(Some(marker.kind)),
            many => Err(OgmError::mapping(format!(
                "ambiguous entity declaration: {}",
                many.iter()
                    .map(|m| m.kind.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    /// Database class name: the declared override when non-blank, else the
    /// type's simple name.
    pub fn resolve_name(&self, marker: &EntityMarker, simple_name: &str) -> String {
        marker
            .name()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(simple_name)
            .to_string()
    }

    /// Declared indexes; embedded values are never indexed on their own.
    pub fn resolve_indexes(&self, marker: &EntityMarker) -> Vec<IndexSpec> {
        match self {
            EntityType::Embedded => Vec::new(),
            _ => marker.indexes.clone(),
        }
    }

    /// Record kind used for storage, `None` for embedded types.
    pub fn element_kind(&self) -> Option<ElementKind> {
        match self {
            EntityType::Element => Some(ElementKind::Element),
            EntityType::Vertex => Some(ElementKind::Vertex),
            EntityType::Edge => Some(ElementKind::Edge),
            EntityType::Embedded => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityType::Element => "element",
            EntityType::Vertex => "vertex",
            EntityType::Edge => "edge",
            EntityType::Embedded => "embedded",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_single_marker() {
        for marker in [
            EntityMarker::element(),
            EntityMarker::vertex(),
            EntityMarker::edge(),
            EntityMarker::embedded(),
        ] {
            let kind = marker.kind();
            assert_eq!(EntityType::classify(&[marker]).unwrap(), Some(kind));
        }
    }

    #[test]
    fn test_classify_no_marker() {
        assert_eq!(EntityType::classify(&[]).unwrap(), None);
    }

    #[test]
    fn test_classify_rejects_multiple_markers() {
        let err = EntityType::classify(&[EntityMarker::vertex(), EntityMarker::edge()]).unwrap_err();
        assert!(matches!(err, OgmError::Mapping(ref m) if m.contains("vertex, edge")));
    }

    #[test]
    fn test_resolve_name() {
        let plain = EntityMarker::vertex();
        assert_eq!(EntityType::Vertex.resolve_name(&plain, "Person"), "Person");

        let named = EntityMarker::vertex().named("People");
        assert_eq!(EntityType::Vertex.resolve_name(&named, "Person"), "People");

        let blank = EntityMarker::vertex().named("  ");
        assert_eq!(EntityType::Vertex.resolve_name(&blank, "Person"), "Person");
    }

    #[test]
    fn test_resolve_indexes_empty_for_embedded() {
        let index = IndexSpec::unique("Address.city", ["city"]);
        let vertex = EntityMarker::vertex().with_index(index.clone());
        assert_eq!(EntityType::Vertex.resolve_indexes(&vertex), vec![index.clone()]);

        let embedded = EntityMarker::embedded().with_index(index);
        assert!(EntityType::Embedded.resolve_indexes(&embedded).is_empty());
    }

    #[test]
    fn test_element_kind() {
        assert_eq!(EntityType::Edge.element_kind(), Some(ElementKind::Edge));
        assert_eq!(EntityType::Embedded.element_kind(), None);
    }
}
