//! Ice Core - communicator runtime facade.
//!
//! A [`Communicator`] is the root handle through which an application
//! reaches the runtime: object adapters, the proxy resolver, properties,
//! the logger, the servant and user exception factory registries, and the
//! default router and locator. It is also the single point that tears all of
//! them down, exactly once.
//!
//! # Example
//!
//! ```rust,no_run
//! use ice_core::Communicator;
//!
//! fn main() -> ice_core::Result<()> {
//!     let mut args: Vec<String> = std::env::args().collect();
//!     let communicator = Communicator::builder().build().finish_setup(&mut args)?;
//!
//!     let adapter = communicator
//!         .create_object_adapter_with_endpoints("Hello", "tcp -h localhost -p 10000")?;
//!     adapter.activate()?;
//!
//!     communicator.wait_for_shutdown();
//!     communicator.destroy();
//!     Ok(())
//! }
//! ```
//!
//! # Locking
//!
//! Every operation that reaches into the runtime instance runs under one
//! mutex and fails with [`IceError::CommunicatorDestroyed`] once
//! [`Communicator::destroy`] has run. [`Communicator::shutdown`] and
//! [`Communicator::wait_for_shutdown`] never take that mutex: they only touch
//! the server worker pool through an atomically swapped handle, so
//! `shutdown` can be called from a signal handler while another thread holds
//! the lock.

pub mod adapter;
pub mod config;
pub mod error;
pub mod factory;
pub mod instance;
pub mod logger;
pub mod properties;
pub mod proxy;
pub mod reference;
pub mod thread_pool;

mod api;

pub use adapter::{AdapterFactory, AdapterState, ObjectAdapter, ObjectAdapterFactory, Servant};
pub use api::{CommunicatorBuilder, Lifecycle, PendingCommunicator};
pub use error::{IceError, Result};
pub use factory::{
    FactoryRegistry, ObjectFactory, RegisteredFactory, UserException, UserExceptionFactory,
};
pub use instance::{default_worker_pool_factory, Instance, WorkerPoolFactory};
pub use logger::{Logger, TracingLogger};
pub use properties::Properties;
pub use proxy::{Endpoint, Identity, LocatorPrx, ObjectPrx, ProxyMode, RouterPrx, Transport};
pub use thread_pool::{ThreadPool, WorkerPool, WorkerPoolHandle};

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwapOption;

/// Root handle to the runtime.
///
/// Share it across threads with `Arc<Communicator>`. Call
/// [`destroy`](Communicator::destroy) before dropping the last reference;
/// dropping an active communicator logs a warning and leaves adapters and
/// worker threads to their own devices.
pub struct Communicator {
    /// Main lock. Guards the lifecycle and serializes every call into the
    /// instance.
    state: Mutex<Lifecycle>,
    instance: Arc<Instance>,
    /// Written under `state` (lazy init, destroy); read without it.
    server_thread_pool: ArcSwapOption<WorkerPoolHandle>,
}

impl Communicator {
    /// Create a builder for a communicator.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let communicator = Communicator::builder()
    ///     .properties(props)
    ///     .logger(Arc::new(TracingLogger::with_prefix("server")))
    ///     .build()
    ///     .finish_setup(&mut args)?;
    /// ```
    pub fn builder() -> CommunicatorBuilder {
        CommunicatorBuilder::new()
    }

    pub(crate) fn from_instance(instance: Arc<Instance>) -> Self {
        Self {
            state: Mutex::new(Lifecycle::Active),
            instance,
            server_thread_pool: ArcSwapOption::empty(),
        }
    }
}

/// Initialize a communicator with default collaborators.
///
/// Runtime options (`--Ice.*`) are moved out of `args`.
pub fn initialize(args: &mut Vec<String>) -> Result<Communicator> {
    Communicator::builder().build().finish_setup(args)
}

/// Initialize a communicator on top of an existing property set.
pub fn initialize_with_properties(
    args: &mut Vec<String>,
    properties: Properties,
) -> Result<Communicator> {
    Communicator::builder()
        .properties(properties)
        .build()
        .finish_setup(args)
}
