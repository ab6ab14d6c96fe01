//! Declared index specifications.

use serde::{Deserialize, Serialize};

/// Index kinds understood by the drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexType {
    Unique,
    NotUnique,
    FullText,
}

/// An index declared on an entity class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub fields: Vec<String>,
    pub index_type: IndexType,
}

impl IndexSpec {
    pub fn new<I, S>(name: impl Into<String>, index_type: IndexType, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            index_type,
        }
    }

    /// Unique index over the given fields.
    pub fn unique<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, IndexType::Unique, fields)
    }

    pub fn not_unique<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, IndexType::NotUnique, fields)
    }

    pub fn is_unique(&self) -> bool {
        self.index_type == IndexType::Unique
    }
}
