//! Driver implementations.
//!
//! Each backend implements the traits from [`crate::graph`]:
//!
//! - [`SessionFactory`](crate::graph::SessionFactory) - Required
//! - [`Session`](crate::graph::Session) - Required
//!
//! # Available Backends
//!
//! | Backend | Module | URL |
//! |---------|--------|-----|
//! | In-memory | [`memory`] | `memory:<name>` |
//!
//! # Implementing a Backend
//!
//! 1. Create a factory struct holding the connection pool
//! 2. Create a session struct wrapping one connection
//! 3. Implement `Session` (record CRUD, scans, query, transactions, schema)
//! 4. Implement `SessionFactory` for the factory struct
//! 5. Add the URL scheme to [`connect`]

pub mod memory;

use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::error::StorageError;
use crate::graph::SessionFactory;

/// Builds the session factory for the configured connection URL.
pub fn connect(config: &DatabaseConfig) -> Result<Arc<dyn SessionFactory>, StorageError> {
    let (scheme, location) = config
        .url
        .split_once(':')
        .ok_or_else(|| StorageError::Connection(format!("invalid url '{}'", config.url)))?;

    match scheme {
        "memory" => {
            let name = if location.is_empty() {
                config.name.as_str()
            } else {
                location
            };
            tracing::info!("Using in-memory database '{}'", name);
            Ok(Arc::new(memory::MemoryDatabase::new(name)))
        }
        other => Err(StorageError::Connection(format!(
            "unsupported url scheme '{}' in '{}'",
            other, config.url
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database(url: &str) -> DatabaseConfig {
        DatabaseConfig {
            url: url.to_string(),
            name: "fallback".to_string(),
            server_user: None,
            server_password: None,
            username: "admin".to_string(),
            password: "admin".to_string(),
        }
    }

    #[test]
    fn test_connect_memory_url() {
        let factory = connect(&database("memory:people")).unwrap();
        assert_eq!(factory.source(), "memory:people");

        let factory = connect(&database("memory:")).unwrap();
        assert_eq!(factory.source(), "memory:fallback");
    }

    #[test]
    fn test_connect_rejects_unknown_scheme() {
        assert!(matches!(
            connect(&database("remote:localhost")),
            Err(StorageError::Connection(_))
        ));
        assert!(matches!(
            connect(&database("nonsense")),
            Err(StorageError::Connection(_))
        ));
    }
}
