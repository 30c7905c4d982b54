mod capability;
mod collection;
mod injectable;
mod provider;

pub use capability::{Capability, Lifetime};
pub use collection::ServiceCollection;
pub use injectable::Injectable;
pub use provider::{Resolver, Scope, ServiceProvider};
