//! Servant and user exception factory registries on Communicator.

use std::sync::Arc;

use crate::error::Result;
use crate::factory::{ObjectFactory, UserExceptionFactory};
use crate::Communicator;

impl Communicator {
    // ========================================
    // Object Factories
    // ========================================

    /// Register an object factory for a type id.
    ///
    /// Fails with `AlreadyRegistered` if the id is taken; the existing
    /// factory is kept.
    pub fn add_object_factory(&self, factory: Arc<dyn ObjectFactory>, id: &str) -> Result<()> {
        let _guard = self.lock_active()?;
        self.instance.servant_factory_registry().add(factory, id)
    }

    /// Unregister the object factory for `id`, returning it if there was one.
    pub fn remove_object_factory(&self, id: &str) -> Result<Option<Arc<dyn ObjectFactory>>> {
        let _guard = self.lock_active()?;
        Ok(self.instance.servant_factory_registry().remove(id))
    }

    pub fn find_object_factory(&self, id: &str) -> Result<Option<Arc<dyn ObjectFactory>>> {
        let _guard = self.lock_active()?;
        Ok(self.instance.servant_factory_registry().find(id))
    }

    // ========================================
    // User Exception Factories
    // ========================================

    pub fn add_user_exception_factory(
        &self,
        factory: Arc<dyn UserExceptionFactory>,
        id: &str,
    ) -> Result<()> {
        let _guard = self.lock_active()?;
        self.instance.user_exception_factory_registry().add(factory, id)
    }

    pub fn remove_user_exception_factory(
        &self,
        id: &str,
    ) -> Result<Option<Arc<dyn UserExceptionFactory>>> {
        let _guard = self.lock_active()?;
        Ok(self.instance.user_exception_factory_registry().remove(id))
    }

    pub fn find_user_exception_factory(
        &self,
        id: &str,
    ) -> Result<Option<Arc<dyn UserExceptionFactory>>> {
        let _guard = self.lock_active()?;
        Ok(self.instance.user_exception_factory_registry().find(id))
    }
}
