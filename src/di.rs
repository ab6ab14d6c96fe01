//! Dependency injection infrastructure.
//!
//! Compile-time dependency injection using the `FromRef` trait and the
//! derives from `di-macros`.
//!
//! - `FromRef<T>`: extract a value from a reference to `T`
//! - `#[derive(Context)]`: makes each field of a struct extractable via `FromRef`
//! - `#[derive(FromContext)]`: builds a struct by resolving each field;
//!   fields marked `#[from_context(default)]` start from `Default::default()`
//!
//! # Example
//!
//! ```ignore
//! use graph_ogm::context::Context;
//! use graph_ogm::di::FromRef;
//! use graph_ogm::EntityManager;
//!
//! let context = Context::bootstrap(config, registry).await?;
//! let manager = EntityManager::from_ref(&context);
//! ```

/// Extracts a value from a reference to another type.
pub trait FromRef<T> {
    fn from_ref(input: &T) -> Self;
}

/// Any `Clone` type can be extracted from itself.
impl<T: Clone> FromRef<T> for T {
    fn from_ref(input: &T) -> Self {
        input.clone()
    }
}

// Re-export derive macros
pub use di_macros::{Context, FromContext};
