use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifies an abstract capability in the registry.
///
/// A capability is any `'static` type, sized or not, so both concrete
/// services (`UserLogic`) and trait objects (`dyn UserLogic`) can be keyed.
#[derive(Clone, Copy, Debug)]
pub struct Capability {
    id: TypeId,
    name: &'static str,
}

impl Capability {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for Capability {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Capability {}

impl Hash for Capability {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// How long a resolved instance lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum Lifetime {
    /// A new instance for every resolution.
    Transient,
    /// One instance per request scope.
    Scoped,
    /// One instance per provider.
    Singleton,
}
