use proc_macro::TokenStream;

mod injectable;

/// Derive macro for building a struct from the service registry
///
/// `Arc<T>` fields are resolved, `Option<Arc<T>>` fields are resolved when
/// registered, and every other field is filled with `Default::default()`.
///
/// # Example
/// ```ignore
/// use hostkit::DeriveInjectable as Injectable;
///
/// #[derive(Injectable)]
/// pub struct UserService {
///     repository: Arc<dyn UserRepository>,
///     audit: Option<Arc<AuditLog>>,
///     calls: AtomicUsize,
/// }
/// ```
#[proc_macro_derive(Injectable)]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    injectable::derive_injectable(input)
}
