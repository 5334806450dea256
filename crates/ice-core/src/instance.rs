//! Shared runtime context.
//!
//! An [`Instance`] aggregates everything a communicator fronts: properties,
//! logger, proxy resolver, routing defaults, factory registries, the adapter
//! factory, and the server worker pool. It is created once per communicator
//! and destroyed once.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info};

use crate::adapter::AdapterFactory;
use crate::config::{PropertyNames, ThreadPoolConfig};
use crate::error::{IceError, Result};
use crate::factory::{ObjectFactoryRegistry, UserExceptionFactoryRegistry};
use crate::logger::Logger;
use crate::properties::Properties;
use crate::proxy::{LocatorPrx, RouterPrx};
use crate::reference::{ProxyFactory, ReferenceFactory};
use crate::thread_pool::{ThreadPool, WorkerPool};

/// Builds the server worker pool on first use.
pub type WorkerPoolFactory =
    Arc<dyn Fn(&Properties) -> Result<Arc<dyn WorkerPool>> + Send + Sync>;

/// Default [`WorkerPoolFactory`]: a [`ThreadPool`] sized by
/// `Ice.ServerThreadPool.Size`.
pub fn default_worker_pool_factory() -> WorkerPoolFactory {
    Arc::new(|properties: &Properties| -> Result<Arc<dyn WorkerPool>> {
        let size = properties.get_property_as_int_with_default(
            PropertyNames::SERVER_THREAD_POOL_SIZE,
            ThreadPoolConfig::DEFAULT_SIZE as i64,
        )?;
        let size = usize::try_from(size).map_err(|_| IceError::Config {
            message: format!(
                "{} must not be negative, got {}",
                PropertyNames::SERVER_THREAD_POOL_SIZE,
                size
            ),
        })?;
        let pool = ThreadPool::new(ThreadPoolConfig::SERVER_POOL_NAME, size)?;
        Ok(Arc::new(pool))
    })
}

/// Runtime context owned by a communicator.
pub struct Instance {
    properties: Arc<Properties>,
    logger: RwLock<Arc<dyn Logger>>,
    proxy_factory: ProxyFactory,
    reference_factory: ReferenceFactory,
    servant_factories: ObjectFactoryRegistry,
    user_exception_factories: UserExceptionFactoryRegistry,
    adapter_factory: Arc<dyn AdapterFactory>,
    pool_factory: WorkerPoolFactory,
    server_thread_pool: Mutex<Option<Arc<dyn WorkerPool>>>,
    destroyed: AtomicBool,
}

impl Instance {
    pub(crate) fn new(
        properties: Arc<Properties>,
        logger: Arc<dyn Logger>,
        adapter_factory: Arc<dyn AdapterFactory>,
        pool_factory: WorkerPoolFactory,
    ) -> Self {
        Self {
            properties,
            logger: RwLock::new(logger),
            proxy_factory: ProxyFactory::new(),
            reference_factory: ReferenceFactory::new(),
            servant_factories: ObjectFactoryRegistry::new("object factory"),
            user_exception_factories: UserExceptionFactoryRegistry::new("user exception factory"),
            adapter_factory,
            pool_factory,
            server_thread_pool: Mutex::new(None),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn properties(&self) -> &Arc<Properties> {
        &self.properties
    }

    pub fn logger(&self) -> Arc<dyn Logger> {
        self.logger.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_logger(&self, logger: Arc<dyn Logger>) {
        *self.logger.write().unwrap_or_else(|e| e.into_inner()) = logger;
    }

    pub fn proxy_factory(&self) -> &ProxyFactory {
        &self.proxy_factory
    }

    pub fn reference_factory(&self) -> &ReferenceFactory {
        &self.reference_factory
    }

    pub fn servant_factory_registry(&self) -> &ObjectFactoryRegistry {
        &self.servant_factories
    }

    pub fn user_exception_factory_registry(&self) -> &UserExceptionFactoryRegistry {
        &self.user_exception_factories
    }

    pub fn adapter_factory(&self) -> &Arc<dyn AdapterFactory> {
        &self.adapter_factory
    }

    /// The server worker pool, created on first call.
    pub fn server_thread_pool(&self) -> Result<Arc<dyn WorkerPool>> {
        let mut slot = self
            .server_thread_pool
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if self.is_destroyed() {
            return Err(IceError::CommunicatorDestroyed);
        }
        if let Some(pool) = slot.as_ref() {
            return Ok(pool.clone());
        }
        let pool = (self.pool_factory)(&self.properties)?;
        debug!("Created server worker pool");
        *slot = Some(pool.clone());
        Ok(pool)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Second construction phase.
    ///
    /// Moves `--Ice.*` options out of `args` into the properties (they win
    /// over anything loaded from `Ice.Config`), loads the configuration
    /// files, and installs the default router and locator.
    pub(crate) fn finish_setup(&self, args: &mut Vec<String>) -> Result<()> {
        let overrides = Properties::new();
        overrides.parse_ice_command_line_options(args);

        let mut config = overrides.get_property(PropertyNames::CONFIG);
        if config.is_empty() {
            config = self.properties.get_property(PropertyNames::CONFIG);
        }
        for path in config.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            self.properties.load(path)?;
        }
        for (key, value) in overrides.snapshot() {
            self.properties.set_property(&key, &value);
        }

        let router = self.properties.get_property(PropertyNames::DEFAULT_ROUTER);
        if let Some(proxy) = self.proxy_factory.string_to_proxy(&router)? {
            self.reference_factory
                .set_default_router(Some(RouterPrx::unchecked_cast(proxy)));
        }
        let locator = self.properties.get_property(PropertyNames::DEFAULT_LOCATOR);
        if let Some(proxy) = self.proxy_factory.string_to_proxy(&locator)? {
            self.reference_factory
                .set_default_locator(Some(LocatorPrx::unchecked_cast(proxy)));
        }

        debug!("Runtime instance setup complete");
        Ok(())
    }

    /// Tear everything down. Only the first call has any effect.
    ///
    /// The adapter factory must already have been shut down by the caller.
    pub(crate) fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }

        let pool = self
            .server_thread_pool
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(pool) = pool {
            pool.destroy();
        }

        self.servant_factories.destroy();
        self.user_exception_factories.destroy();
        self.reference_factory.clear();
        info!("Runtime instance destroyed");
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("destroyed", &self.is_destroyed())
            .field("servant_factories", &self.servant_factories)
            .field("user_exception_factories", &self.user_exception_factories)
            .finish_non_exhaustive()
    }
}
