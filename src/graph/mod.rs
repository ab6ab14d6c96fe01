//! Graph driver abstraction.
//!
//! The mapping layer is backend-agnostic: everything it needs from a
//! graph database is expressed by the traits in this module.
//!
//! # Architecture
//!
//! - [`Rid`] - record identity assigned by the driver on first save
//! - [`Record`] / [`Element`] - a record's state and the shared handle to it
//! - [`Session`] - CRUD, scans, queries, transactions and schema
//! - [`SessionFactory`] - opens sessions against one data source
//!
//! # Usage
//!
//! ```ignore
//! use graph_ogm::graph::backends::memory::MemoryDatabase;
//! use graph_ogm::graph::{Element, ElementKind, Record, SessionFactory};
//!
//! let database = MemoryDatabase::new("demo");
//! let session = database.open().await?;
//!
//! let mut record = Record::new("Person", ElementKind::Vertex);
//! record.set_property("name", serde_json::json!("Ada"));
//! let rid = session.save(&Element::new(record), None).await?;
//!
//! let loaded = session.load(&rid).await?;
//! session.close();
//! ```

mod element;
mod index;
mod rid;
mod traits;

pub mod backends;

pub use element::{Direction, Element, ElementKind, Record};
pub use index::{IndexSpec, IndexType};
pub use rid::Rid;
pub use traits::{Cursor, Session, SessionFactory};
