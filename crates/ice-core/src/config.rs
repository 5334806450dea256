//! Centralized configuration for the communicator runtime.
//!
//! Property names the runtime reads, plus tuning constants for the default
//! collaborator implementations.

use std::time::Duration;

/// Well-known property names.
pub struct PropertyNames;

impl PropertyNames {
    /// Prefix reserved for runtime properties on the command line.
    pub const RUNTIME_PREFIX: &'static str = "Ice";
    pub const ADAPTER_PREFIX: &'static str = "Ice.Adapter.";
    pub const CONFIG: &'static str = "Ice.Config";
    pub const PROGRAM_NAME: &'static str = "Ice.ProgramName";
    pub const DEFAULT_ROUTER: &'static str = "Ice.Default.Router";
    pub const DEFAULT_LOCATOR: &'static str = "Ice.Default.Locator";
    pub const SERVER_THREAD_POOL_SIZE: &'static str = "Ice.ServerThreadPool.Size";

    /// `<name>.AdapterId`
    pub fn adapter_id(adapter: &str) -> String {
        format!("{}.AdapterId", adapter)
    }

    /// `<name>.Endpoints`
    pub fn endpoints(adapter: &str) -> String {
        format!("{}.Endpoints", adapter)
    }

    /// `Ice.Adapter.<name>.Router`
    pub fn adapter_router(adapter: &str) -> String {
        format!("{}{}.Router", Self::ADAPTER_PREFIX, adapter)
    }

    /// `Ice.Adapter.<name>.Locator`
    pub fn adapter_locator(adapter: &str) -> String {
        format!("{}{}.Locator", Self::ADAPTER_PREFIX, adapter)
    }
}

/// Tuning for the default server thread pool.
pub struct ThreadPoolConfig;

impl ThreadPoolConfig {
    pub const SERVER_POOL_NAME: &'static str = "Ice.ServerThreadPool";
    pub const DEFAULT_SIZE: usize = 1;
    /// How often an idle worker rechecks the shutdown flag.
    pub const POLL_INTERVAL: Duration = Duration::from_millis(25);
}

/// Message emitted when a communicator is dropped while still active.
pub const LEAK_WARNING: &str = "Communicator::destroy() has not been called";
