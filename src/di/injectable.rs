use crate::di::{Capability, Resolver};
use crate::error::Result;

/// Trait for types that can be constructed from the service registry
///
/// This trait is typically implemented automatically via the `#[derive(Injectable)]` macro.
///
/// # Example
/// ```
/// use hostkit::DeriveInjectable as Injectable;
/// use std::sync::Arc;
///
/// // 1. Define a trait
/// trait UserLogic: Send + Sync {}
///
/// // 2. Derive Injectable on a struct
/// #[derive(Injectable)]
/// pub struct Greeter {
///     // This field will be resolved from the registry
///     users: Arc<dyn UserLogic>,
/// }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Create an instance by resolving dependencies through the resolver
    ///
    /// # Errors
    /// Returns an error if any required dependency is not registered, or if
    /// its lifetime is not compatible with the resolver's scope.
    fn inject(resolver: &Resolver<'_>) -> Result<Self>;

    /// Capabilities `inject` will resolve.
    ///
    /// Used to validate a pipeline before the first request is served.
    fn dependencies() -> Vec<Capability> {
        Vec::new()
    }
}
