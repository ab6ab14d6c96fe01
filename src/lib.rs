//! graph-ogm - Object-graph mapping for multi-model graph databases
//!
//! Maps plain Rust types onto vertices, edges, documents and embedded
//! values, and hands them back as managed proxies bound to their stored
//! records.

pub mod config;
pub mod context;
pub mod di;
pub mod error;
pub mod graph;
pub mod manager;
pub mod mapping;
pub mod proxy;
pub mod query;
pub mod repository;
pub mod schema;
pub mod session;

// Re-export FromRef at crate root for di-macros generated code
pub use di::FromRef;

pub use error::{OgmError, Result, StorageError};
pub use manager::EntityManager;
pub use mapping::{
    Entity, EntityId, EntityInformation, EntityMarker, EntityRegistry, EntityType, FieldSpec,
    IdParser, Link,
};
pub use proxy::{EmbeddedProxy, EntityProxy, Persistable, ProxyState};
pub use query::TypedQuery;
pub use repository::Repository;
pub use session::{BoundSession, SessionProvider, UnitOfWork};
