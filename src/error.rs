//! Error taxonomy for the mapping layer and the driver contract.

use thiserror::Error;

use crate::graph::Rid;

/// Failures surfaced by a graph driver.
///
/// The mapping layer never recovers from these; they are wrapped in
/// [`OgmError::Storage`] and returned to the caller unmodified.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("session is closed")]
    SessionClosed,

    #[error("class not found: {0}")]
    ClassNotFound(String),

    #[error("cluster not found: {0}")]
    ClusterNotFound(String),

    #[error("record not found: {0}")]
    RecordNotFound(Rid),

    #[error("record {rid} belongs to cluster {actual}, cannot be saved in '{requested}'")]
    ClusterMismatch {
        rid: Rid,
        actual: String,
        requested: String,
    },

    #[error("cluster {cluster} belongs to class {owner}, cannot store {class} records")]
    ClusterOwnership {
        cluster: String,
        owner: String,
        class: String,
    },

    #[error("duplicate key {key} on unique index {index}")]
    ConstraintViolation { index: String, key: String },

    #[error("record {rid} was modified concurrently: expected version {expected}, found {actual}")]
    ConcurrentModification {
        rid: Rid,
        expected: u32,
        actual: u32,
    },

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("transaction error: {0}")]
    Transaction(String),
}

/// Errors returned by the object-graph mapping layer.
#[derive(Error, Debug)]
pub enum OgmError {
    /// A type cannot be mapped: no or ambiguous declaration, missing identity
    /// field, or an object whose shape does not match its declaration.
    #[error("mapping error: {0}")]
    Mapping(String),

    #[error("cannot convert identifier '{value}': {reason}")]
    IdentityConversion { value: String, reason: String },

    #[error("{entity} backed by {rid} is not managed")]
    Detached { entity: String, rid: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl OgmError {
    pub(crate) fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping(message.into())
    }

    pub(crate) fn identity(value: impl ToString, reason: impl Into<String>) -> Self {
        Self::IdentityConversion {
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns true for [`OgmError::Detached`].
    pub fn is_detached(&self) -> bool {
        matches!(self, Self::Detached { .. })
    }
}

pub type Result<T, E = OgmError> = std::result::Result<T, E>;
