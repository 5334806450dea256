//! Identifier-keyed factory registries.
//!
//! Two registries hang off every runtime instance: one for object (servant)
//! factories and one for user exception factories. Both are consulted when
//! unmarshaling a value whose concrete type is only known by its type id.
//!
//! Registering a second factory under an id that is already taken is
//! rejected with [`IceError::AlreadyRegistered`]; the first registration
//! stays in place. Removing or looking up an unknown id is not an error.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::adapter::Servant;
use crate::error::{IceError, Result};

/// Common behavior of anything stored in a [`FactoryRegistry`].
pub trait RegisteredFactory: Send + Sync {
    /// Called once when the owning runtime instance is destroyed.
    fn destroy(&self) {}
}

/// Creates servants for a type id.
pub trait ObjectFactory: RegisteredFactory {
    fn create(&self, type_id: &str) -> Option<Arc<dyn Servant>>;
}

/// Creates user exceptions for a type id.
pub trait UserExceptionFactory: RegisteredFactory {
    fn create(&self, type_id: &str) -> Option<UserException>;
}

/// Application-defined exception raised by a remote operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("user exception {type_id}: {message}")]
pub struct UserException {
    pub type_id: String,
    pub message: String,
}

impl UserException {
    pub fn new(type_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            message: message.into(),
        }
    }
}

/// Map from id to factory.
pub struct FactoryRegistry<F: ?Sized + RegisteredFactory> {
    kind: &'static str,
    factories: RwLock<HashMap<String, Arc<F>>>,
}

pub type ObjectFactoryRegistry = FactoryRegistry<dyn ObjectFactory>;
pub type UserExceptionFactoryRegistry = FactoryRegistry<dyn UserExceptionFactory>;

impl<F: ?Sized + RegisteredFactory> FactoryRegistry<F> {
    /// Create an empty registry. `kind` names the factory type in errors.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Register `factory` under `id`.
    pub fn add(&self, factory: Arc<F>, id: &str) -> Result<()> {
        let mut factories = self.factories.write().unwrap_or_else(|e| e.into_inner());
        if factories.contains_key(id) {
            return Err(IceError::AlreadyRegistered {
                kind: self.kind,
                id: id.to_string(),
            });
        }
        factories.insert(id.to_string(), factory);
        tracing::debug!("Registered {} `{}`", self.kind, id);
        Ok(())
    }

    /// Unregister and return the factory for `id`, if any.
    pub fn remove(&self, id: &str) -> Option<Arc<F>> {
        self.factories
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
    }

    pub fn find(&self, id: &str) -> Option<Arc<F>> {
        self.factories
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.factories.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empty the registry, calling `destroy` on every factory it held.
    pub fn destroy(&self) {
        let drained: Vec<Arc<F>> = {
            let mut factories = self.factories.write().unwrap_or_else(|e| e.into_inner());
            factories.drain().map(|(_, f)| f).collect()
        };
        for factory in drained {
            factory.destroy();
        }
    }
}

impl<F: ?Sized + RegisteredFactory> fmt::Debug for FactoryRegistry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("kind", &self.kind)
            .field("len", &self.len())
            .finish()
    }
}
