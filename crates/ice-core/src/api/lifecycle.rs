//! Lifecycle state machine: destroy, shutdown, wait, and the leak check.

use std::sync::{Arc, MutexGuard};

use tracing::{debug, info};

use crate::config::LEAK_WARNING;
use crate::error::{IceError, Result};
use crate::thread_pool::WorkerPoolHandle;
use crate::Communicator;

/// Externally observable communicator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    /// Terminal.
    Destroyed,
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lifecycle::Active => write!(f, "ACTIVE"),
            Lifecycle::Destroyed => write!(f, "DESTROYED"),
        }
    }
}

impl Communicator {
    /// Acquire the main lock regardless of state.
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, Lifecycle> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Acquire the main lock, failing if the communicator is destroyed.
    ///
    /// Every guarded operation holds the returned guard for its whole
    /// delegation into the instance.
    pub(crate) fn lock_active(&self) -> Result<MutexGuard<'_, Lifecycle>> {
        let state = self.lock_state();
        match *state {
            Lifecycle::Active => Ok(state),
            Lifecycle::Destroyed => Err(IceError::CommunicatorDestroyed),
        }
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        *self.lock_state()
    }

    pub fn is_destroyed(&self) -> bool {
        self.lifecycle() == Lifecycle::Destroyed
    }

    /// Destroy the communicator and everything it owns.
    ///
    /// Shuts down the adapter factory, destroys the runtime instance, then
    /// releases the worker pool handle. Safe to call any number of times from
    /// any number of threads; only the first call does anything. The state
    /// becomes [`Lifecycle::Destroyed`] once the teardown has completed, and
    /// the lock is held throughout so no guarded call sees it half done.
    pub fn destroy(&self) {
        let mut state = self.lock_state();
        if *state == Lifecycle::Destroyed {
            return;
        }

        self.instance.adapter_factory().shutdown();
        self.instance.destroy();
        self.server_thread_pool.store(None);

        *state = Lifecycle::Destroyed;
        info!("Communicator destroyed");
    }

    /// Ask the server worker pool to shut down.
    ///
    /// Takes no lock and never touches the runtime instance, so it may be
    /// called from a signal handler or while another thread is inside a
    /// guarded call. Does nothing until the first object adapter has been
    /// created, and nothing after [`destroy`](Self::destroy).
    pub fn shutdown(&self) {
        let handle = self.server_thread_pool.load();
        if let Some(handle) = &*handle {
            handle.initiate_shutdown();
        }
    }

    /// Block until the server worker pool has finished all dispatch work.
    ///
    /// Takes no lock, so other threads keep full use of the communicator
    /// while this one waits. Returns immediately if no adapter has been
    /// created yet. There is no timeout.
    pub fn wait_for_shutdown(&self) {
        // Owned Arc: the wait may be long and must not pin a guard slot.
        let handle = self.server_thread_pool.load_full();
        if let Some(handle) = handle {
            debug!("Waiting for server worker pool to finish");
            handle.wait_until_finished();
        }
    }

    /// Cache the server worker pool handle on first adapter creation.
    ///
    /// Caller holds the main lock, which makes the check-then-store safe.
    pub(crate) fn init_server_thread_pool(&self) -> Result<()> {
        if self.server_thread_pool.load().is_some() {
            return Ok(());
        }
        let pool = self.instance.server_thread_pool()?;
        self.server_thread_pool
            .store(Some(Arc::new(WorkerPoolHandle::new(pool))));
        debug!("Server worker pool handle cached");
        Ok(())
    }
}

impl Drop for Communicator {
    fn drop(&mut self) {
        let state = *self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        if state == Lifecycle::Active {
            self.instance.logger().warning(LEAK_WARNING);
        }
    }
}
