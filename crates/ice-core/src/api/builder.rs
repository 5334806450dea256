//! Two-phase construction of a Communicator.
//!
//! [`CommunicatorBuilder::build`] wires the runtime instance and returns a
//! [`PendingCommunicator`]. Nothing can be done with that value except
//! [`PendingCommunicator::finish_setup`], which completes initialization and
//! yields the active [`Communicator`].

use std::sync::Arc;

use tracing::{debug, warn};

use crate::adapter::{AdapterFactory, ObjectAdapterFactory};
use crate::config::PropertyNames;
use crate::error::{IceError, Result};
use crate::instance::{default_worker_pool_factory, Instance, WorkerPoolFactory};
use crate::logger::{Logger, TracingLogger};
use crate::properties::Properties;
use crate::thread_pool::WorkerPool;
use crate::Communicator;

/// Builder for configuring a Communicator.
///
/// # Example
///
/// ```rust,ignore
/// use ice_core::{Communicator, Properties};
///
/// let props = Properties::new();
/// props.set_property("Ice.ServerThreadPool.Size", "4");
///
/// let communicator = Communicator::builder()
///     .properties(props)
///     .build()
///     .finish_setup(&mut args)?;
/// ```
#[derive(Default)]
pub struct CommunicatorBuilder {
    properties: Option<Properties>,
    logger: Option<Arc<dyn Logger>>,
    adapter_factory: Option<Arc<dyn AdapterFactory>>,
    worker_pool_factory: Option<WorkerPoolFactory>,
}

impl CommunicatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing property set.
    ///
    /// Default: empty properties.
    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Use a custom logger.
    ///
    /// Default: [`TracingLogger`] tagged with `Ice.ProgramName`.
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Use a custom adapter factory.
    ///
    /// Default: [`ObjectAdapterFactory`].
    pub fn adapter_factory(mut self, factory: Arc<dyn AdapterFactory>) -> Self {
        self.adapter_factory = Some(factory);
        self
    }

    /// Use a custom constructor for the server worker pool.
    ///
    /// It runs at most once, when the first object adapter is created.
    /// Default: a [`ThreadPool`](crate::ThreadPool) sized by
    /// `Ice.ServerThreadPool.Size`.
    pub fn worker_pool_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Properties) -> Result<Arc<dyn WorkerPool>> + Send + Sync + 'static,
    {
        self.worker_pool_factory = Some(Arc::new(factory));
        self
    }

    /// Construct the runtime instance. Setup is completed by
    /// [`PendingCommunicator::finish_setup`].
    pub fn build(self) -> PendingCommunicator {
        let properties = Arc::new(self.properties.unwrap_or_default());
        let logger: Arc<dyn Logger> = match self.logger {
            Some(logger) => logger,
            None => Arc::new(TracingLogger::with_prefix(
                properties.get_property(PropertyNames::PROGRAM_NAME),
            )),
        };
        let adapter_factory: Arc<dyn AdapterFactory> = match self.adapter_factory {
            Some(factory) => factory,
            None => Arc::new(ObjectAdapterFactory::new()),
        };
        let pool_factory = self
            .worker_pool_factory
            .unwrap_or_else(default_worker_pool_factory);

        let instance = Instance::new(properties, logger, adapter_factory, pool_factory);
        PendingCommunicator {
            instance: Some(Arc::new(instance)),
        }
    }
}

/// A constructed but not yet usable communicator.
///
/// Dropping it without calling [`finish_setup`](Self::finish_setup)
/// destroys the runtime instance.
pub struct PendingCommunicator {
    instance: Option<Arc<Instance>>,
}

impl PendingCommunicator {
    /// Properties of the instance being set up.
    pub fn properties(&self) -> Option<&Arc<Properties>> {
        self.instance.as_ref().map(|instance| instance.properties())
    }

    /// Complete setup and return the active communicator.
    ///
    /// Runtime options (`--Ice.*`) are moved out of `args` into the
    /// properties, `Ice.Config` files are loaded, and the default router and
    /// locator are installed. On failure the instance is destroyed and no
    /// communicator is produced.
    pub fn finish_setup(mut self, args: &mut Vec<String>) -> Result<Communicator> {
        let instance = self
            .instance
            .take()
            .ok_or(IceError::CommunicatorDestroyed)?;

        match instance.finish_setup(args) {
            Ok(()) => {
                debug!("Communicator ready");
                Ok(Communicator::from_instance(instance))
            }
            Err(e) => {
                warn!("Communicator setup failed: {}", e);
                abandon(&instance);
                Err(e)
            }
        }
    }
}

impl Drop for PendingCommunicator {
    fn drop(&mut self) {
        if let Some(instance) = self.instance.take() {
            debug!("Pending communicator dropped before setup finished");
            abandon(&instance);
        }
    }
}

/// Tear down an instance that never became a communicator.
fn abandon(instance: &Instance) {
    instance.adapter_factory().shutdown();
    instance.destroy();
}
