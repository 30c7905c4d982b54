use crate::di::provider::{Factory, Instance, erase};
use crate::di::{Capability, Injectable, Lifetime, Resolver, ServiceProvider};
use crate::error::Result;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) capability: Capability,
    pub(crate) lifetime: Lifetime,
    pub(crate) factory: Factory,
}

/// Registration surface for services
///
/// Use this to configure and register services before building the final immutable provider.
///
/// # Example
/// ```
/// use hostkit::di::ServiceCollection;
/// use std::sync::Arc;
///
/// trait Clock: Send + Sync {
///     fn now(&self) -> u64;
/// }
///
/// struct FixedClock;
///
/// impl Clock for FixedClock {
///     fn now(&self) -> u64 {
///         42
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services
///     .add_instance(FixedClock)
///     .bind::<dyn Clock, FixedClock, _>(|clock| clock as Arc<dyn Clock>);
///
/// let provider = services.build();
/// assert_eq!(provider.resolve::<dyn Clock>().unwrap().now(), 42);
/// ```
#[derive(Default)]
pub struct ServiceCollection {
    registrations: HashMap<TypeId, Registration>,
}

impl ServiceCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `T` with the given lifetime
    ///
    /// Registering the same capability twice replaces the earlier registration.
    pub fn add<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        let capability = Capability::of::<T>();
        let factory: Factory = erase(move |resolver| {
            let instance: Arc<T> = factory(resolver)?;
            Ok(Arc::new(instance) as Instance)
        });

        let previous = self.registrations.insert(
            capability.id(),
            Registration {
                capability,
                lifetime,
                factory,
            },
        );
        if previous.is_some() {
            tracing::debug!(capability = %capability, "replacing existing registration");
        }
        self
    }

    /// Register a factory producing one instance per provider
    pub fn add_singleton<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        self.add(Lifetime::Singleton, factory)
    }

    /// Register a factory producing one instance per request scope
    pub fn add_scoped<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        self.add(Lifetime::Scoped, factory)
    }

    /// Register a factory producing a new instance on every resolution
    pub fn add_transient<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        self.add(Lifetime::Transient, factory)
    }

    /// Register an already constructed singleton
    pub fn add_instance<T: Send + Sync + 'static>(&mut self, instance: T) -> &mut Self {
        self.add_shared(Arc::new(instance))
    }

    /// Register an already shared singleton, e.g. an `Arc<dyn Trait>`
    pub fn add_shared<T: ?Sized + Send + Sync + 'static>(&mut self, instance: Arc<T>) -> &mut Self {
        self.add::<T, _>(Lifetime::Singleton, move |_| Ok(Arc::clone(&instance)))
    }

    /// Register a type whose dependencies are resolved through [`Injectable`]
    pub fn add_injectable<T: Injectable>(&mut self, lifetime: Lifetime) -> &mut Self {
        self.add::<T, _>(lifetime, |resolver| T::inject(resolver).map(Arc::new))
    }

    /// Bind a trait to a registered implementation
    ///
    /// Resolving `Trait` resolves `Impl` and casts it, so the binding shares
    /// whatever lifetime `Impl` was registered with.
    pub fn bind<Trait, Impl, F>(&mut self, caster: F) -> &mut Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        Impl: Send + Sync + 'static,
        F: Fn(Arc<Impl>) -> Arc<Trait> + Send + Sync + 'static,
    {
        self.add::<Trait, _>(Lifetime::Transient, move |resolver| {
            resolver.resolve::<Impl>().map(&caster)
        })
    }

    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Freeze the registrations into a provider
    pub fn build(self) -> ServiceProvider {
        tracing::debug!(registrations = self.registrations.len(), "building service provider");
        ServiceProvider::from_registrations(self.registrations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Settings {
        name: &'static str,
    }

    #[test]
    fn later_registration_wins() {
        let mut services = ServiceCollection::new();
        services
            .add_singleton(|_| Ok(Arc::new(Settings { name: "first" })))
            .add_singleton(|_| Ok(Arc::new(Settings { name: "second" })));

        assert_eq!(services.len(), 1);
        let provider = services.build();
        assert_eq!(provider.resolve::<Settings>().unwrap().name, "second");
    }

    #[test]
    fn contains_reports_registered_capabilities() {
        let mut services = ServiceCollection::new();
        assert!(services.is_empty());
        services.add_instance(Settings { name: "x" });
        assert!(services.contains::<Settings>());
        assert!(!services.contains::<String>());
    }
}
