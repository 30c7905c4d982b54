use crate::di::collection::Registration;
use crate::di::{Capability, Lifetime};
use crate::error::{ConfigurationError, Result};
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

/// Type-erased instance. The inner value is always an `Arc<T>` for the
/// capability `T` it was registered under, which lets unsized capabilities
/// such as `dyn Trait` share the same storage as concrete types.
pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

pub(crate) type Factory = Arc<dyn Fn(&Resolver<'_>) -> Result<Instance> + Send + Sync>;

pub(crate) fn erase<F>(factory: F) -> Factory
where
    F: Fn(&Resolver<'_>) -> Result<Instance> + Send + Sync + 'static,
{
    Arc::new(factory)
}

struct Registry {
    registrations: HashMap<TypeId, Registration>,
    singletons: DashMap<TypeId, Instance>,
}

/// Root of the service registry.
///
/// Owns the registrations and the singleton cache. Cloning is cheap and every
/// clone shares the same singletons.
#[derive(Clone)]
pub struct ServiceProvider {
    registry: Arc<Registry>,
}

impl ServiceProvider {
    pub(crate) fn from_registrations(registrations: HashMap<TypeId, Registration>) -> Self {
        Self {
            registry: Arc::new(Registry {
                registrations,
                singletons: DashMap::new(),
            }),
        }
    }

    /// A provider with no registrations
    pub fn empty() -> Self {
        Self::from_registrations(HashMap::new())
    }

    /// Resolve a singleton or transient capability from the root
    ///
    /// Scoped capabilities need a [`Scope`] and fail here with
    /// [`ConfigurationError::ScopeMismatch`].
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        Resolver::root(self).resolve::<T>()
    }

    /// Start a new scope, typically one per request
    pub fn create_scope(&self) -> Scope {
        Scope {
            provider: self.clone(),
            instances: DashMap::new(),
        }
    }

    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.registry.registrations.contains_key(&TypeId::of::<T>())
    }

    pub fn lifetime_of(&self, capability: &Capability) -> Option<Lifetime> {
        self.registration(capability).map(|r| r.lifetime)
    }

    /// Check that every capability in `required` is registered
    pub fn validate(&self, required: &[Capability], required_by: &str) -> Result<()> {
        for capability in required {
            if self.registration(capability).is_none() {
                return Err(ConfigurationError::missing_for(capability.name(), required_by).into());
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.registry.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.registrations.is_empty()
    }

    fn registration(&self, capability: &Capability) -> Option<&Registration> {
        self.registry.registrations.get(&capability.id())
    }
}

/// A resolution boundary for scoped services.
///
/// Scoped instances are cached here; singletons are delegated to the root
/// provider. Dropping the scope releases its scoped instances.
pub struct Scope {
    provider: ServiceProvider,
    instances: DashMap<TypeId, Instance>,
}

impl Scope {
    /// Resolve a capability of any lifetime
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        Resolver::scoped(self).resolve::<T>()
    }

    pub fn provider(&self) -> &ServiceProvider {
        &self.provider
    }
}

/// Handed to factories so they can resolve their own dependencies.
///
/// Tracks the chain of capabilities under construction to report cycles,
/// and whether a scope is available. Singletons are always constructed
/// against the root so they cannot capture scoped instances.
pub struct Resolver<'a> {
    provider: &'a ServiceProvider,
    scope: Option<&'a Scope>,
    chain: RefCell<Vec<Capability>>,
}

impl<'a> Resolver<'a> {
    pub(crate) fn root(provider: &'a ServiceProvider) -> Self {
        Self {
            provider,
            scope: None,
            chain: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn scoped(scope: &'a Scope) -> Self {
        Self {
            provider: &scope.provider,
            scope: Some(scope),
            chain: RefCell::new(Vec::new()),
        }
    }

    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let capability = Capability::of::<T>();
        let instance = self.resolve_capability(capability)?;
        instance.downcast_ref::<Arc<T>>().cloned().ok_or_else(|| {
            ConfigurationError::DowncastFailed {
                type_name: capability.name().to_string(),
            }
            .into()
        })
    }

    pub fn provider(&self) -> &ServiceProvider {
        self.provider
    }

    /// Whether scoped capabilities can be resolved
    pub fn has_scope(&self) -> bool {
        self.scope.is_some()
    }

    fn resolve_capability(&self, capability: Capability) -> Result<Instance> {
        let registration = self.provider.registration(&capability).ok_or_else(|| {
            match self.chain.borrow().last() {
                Some(owner) => ConfigurationError::missing_for(capability.name(), owner.name()),
                None => ConfigurationError::missing(capability.name()),
            }
        })?;

        match registration.lifetime {
            Lifetime::Transient => self.construct(registration),
            Lifetime::Singleton => {
                let singletons = &self.provider.registry.singletons;
                if let Some(existing) = singletons.get(&capability.id()) {
                    return Ok(existing.value().clone());
                }

                let root = Resolver {
                    provider: self.provider,
                    scope: None,
                    chain: RefCell::new(self.chain.borrow().clone()),
                };
                let created = root.construct(registration)?;
                // A concurrent resolution may have won; keep the first one stored.
                Ok(singletons
                    .entry(capability.id())
                    .or_insert(created)
                    .value()
                    .clone())
            }
            Lifetime::Scoped => {
                let scope = self.scope.ok_or_else(|| {
                    let message = match self.chain.borrow().last() {
                        Some(owner) => format!(
                            "scoped capability '{}' cannot be resolved outside a scope (required by {})",
                            capability, owner
                        ),
                        None => format!(
                            "scoped capability '{}' cannot be resolved from the root provider",
                            capability
                        ),
                    };
                    ConfigurationError::scope_mismatch(message)
                })?;

                if let Some(existing) = scope.instances.get(&capability.id()) {
                    return Ok(existing.value().clone());
                }
                let created = self.construct(registration)?;
                Ok(scope
                    .instances
                    .entry(capability.id())
                    .or_insert(created)
                    .value()
                    .clone())
            }
        }
    }

    fn construct(&self, registration: &Registration) -> Result<Instance> {
        let capability = registration.capability;
        {
            let chain = self.chain.borrow();
            if chain.contains(&capability) {
                let cycle = chain
                    .iter()
                    .chain(std::iter::once(&capability))
                    .map(|c| c.name())
                    .collect::<Vec<_>>()
                    .join(" -> ");
                return Err(ConfigurationError::CircularDependency { cycle }.into());
            }
        }

        self.chain.borrow_mut().push(capability);
        let result = (registration.factory)(self);
        self.chain.borrow_mut().pop();
        result
    }
}
