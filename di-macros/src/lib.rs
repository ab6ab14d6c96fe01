//! Compile-time dependency injection derives for graph-ogm.
//!
//! - `#[derive(Context)]` makes each field of a root struct extractable
//! - `#[derive(FromContext)]` builds a struct by resolving its fields from a context
//!
//! Generated code refers to `crate::FromRef`, so the consuming crate must
//! expose the trait at its root.

use proc_macro::TokenStream;

mod context;
mod fields;
mod from_context;

/// Derive macro for a dependency injection root.
///
/// Generates a `FromRef` implementation for each field type, so the field
/// can be extracted from the context by cloning it.
///
/// # Requirements
///
/// - All fields must implement `Clone`
/// - Field types must be distinct
///
/// # Example
///
/// ```ignore
/// #[derive(Context, Clone)]
/// pub struct Context {
///     pub sessions: SessionProvider,
///     pub registry: Arc<EntityRegistry>,
/// }
///
/// // Generated:
/// // impl FromRef<Context> for SessionProvider { ... }
/// // impl FromRef<Context> for Arc<EntityRegistry> { ... }
/// ```
#[proc_macro_derive(Context)]
pub fn derive_context(input: TokenStream) -> TokenStream {
    context::derive_context_impl(input)
}

/// Derive macro for types constructed from a context.
///
/// Generates `FromRef<Context>`, resolving each field with
/// `FromRef::from_ref(ctx)`. Fields marked `#[from_context(default)]` are
/// initialised with `Default::default()` instead.
///
/// # Example
///
/// ```ignore
/// #[derive(FromContext, Clone)]
/// pub struct EntityManager {
///     sessions: SessionProvider,          // SessionProvider::from_ref(ctx)
///     #[from_context(default)]
///     bound: Option<BoundSession>,        // None
/// }
/// ```
///
/// # Custom Context Type
///
/// ```ignore
/// #[derive(FromContext)]
/// #[from_context(Context = "TestContext")]
/// pub struct Probe {
///     sessions: SessionProvider,
/// }
/// ```
#[proc_macro_derive(FromContext, attributes(from_context))]
pub fn derive_from_context(input: TokenStream) -> TokenStream {
    from_context::derive_from_context_impl(input)
}
