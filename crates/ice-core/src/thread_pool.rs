//! Worker pool that services inbound dispatch work.
//!
//! # Shutdown
//!
//! [`WorkerPool::initiate_shutdown`] is callable from a restricted execution
//! context: the default [`ThreadPool`] implements it as a single atomic store.
//! No lock, no allocation, no blocking. Workers notice the flag the next time
//! their queue runs dry, so work that was already queued still runs.
//! [`WorkerPool::wait_until_finished`] blocks until the last worker has left
//! its loop.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error};

use crate::config::ThreadPoolConfig;
use crate::error::{IceError, Result};

/// Contract the communicator relies on for its server pool.
pub trait WorkerPool: Send + Sync {
    /// Stop accepting work and let in-flight work drain. Non-blocking and
    /// safe to call from a signal-handling context. Idempotent.
    fn initiate_shutdown(&self);

    /// Block until all dispatch work has finished. Returns immediately if
    /// it already has.
    fn wait_until_finished(&self);

    /// Initiate shutdown and reclaim worker resources. Called once by the
    /// owning runtime instance during its teardown.
    fn destroy(&self);
}

/// Independently held reference to a worker pool.
///
/// The communicator stores this behind an atomic swap so its lock-free
/// shutdown path can reach the pool without touching anything else.
pub struct WorkerPoolHandle {
    pool: Arc<dyn WorkerPool>,
}

impl WorkerPoolHandle {
    pub fn new(pool: Arc<dyn WorkerPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<dyn WorkerPool> {
        &self.pool
    }

    pub fn initiate_shutdown(&self) {
        self.pool.initiate_shutdown();
    }

    pub fn wait_until_finished(&self) {
        self.pool.wait_until_finished();
    }
}

/// Unit of dispatch work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    shutdown: AtomicBool,
    running: AtomicUsize,
    finished: Mutex<bool>,
    finished_cv: Condvar,
}

impl Shared {
    fn worker_exited(&self) {
        if self.running.fetch_sub(1, Ordering::AcqRel) == 1 {
            *self.finished.lock().unwrap_or_else(|e| e.into_inner()) = true;
            self.finished_cv.notify_all();
        }
    }
}

/// Fixed-size pool of OS threads fed from one queue.
pub struct ThreadPool {
    name: String,
    size: usize,
    sender: Sender<Job>,
    shared: Arc<Shared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPool {
    /// Spawn `size` workers (at least one).
    pub fn new(name: impl Into<String>, size: usize) -> Result<Self> {
        let name = name.into();
        let size = size.max(1);
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let shared = Arc::new(Shared {
            shutdown: AtomicBool::new(false),
            running: AtomicUsize::new(0),
            finished: Mutex::new(false),
            finished_cv: Condvar::new(),
        });

        let mut threads = Vec::with_capacity(size);
        for i in 0..size {
            let receiver = receiver.clone();
            let worker_shared = shared.clone();
            shared.running.fetch_add(1, Ordering::AcqRel);
            let spawned = std::thread::Builder::new()
                .name(format!("{}-{}", name, i))
                .spawn(move || Self::run(receiver, worker_shared));
            match spawned {
                Ok(handle) => threads.push(handle),
                Err(e) => {
                    shared.shutdown.store(true, Ordering::Release);
                    shared.worker_exited();
                    return Err(IceError::Config {
                        message: format!("failed to spawn worker for {}: {}", name, e),
                    });
                }
            }
        }

        debug!("Thread pool {} started with {} workers", name, size);
        Ok(Self {
            name,
            size,
            sender,
            shared,
            threads: Mutex::new(threads),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        *self.shared.finished.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a job. Rejected once shutdown has been initiated.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<()> {
        if self.is_shutdown_requested() {
            return Err(IceError::ThreadPoolShutdown {
                name: self.name.clone(),
            });
        }
        self.sender
            .send(Box::new(job))
            .map_err(|_| IceError::ThreadPoolShutdown {
                name: self.name.clone(),
            })
    }

    fn run(receiver: Receiver<Job>, shared: Arc<Shared>) {
        loop {
            match receiver.recv_timeout(ThreadPoolConfig::POLL_INTERVAL) {
                Ok(job) => {
                    if catch_unwind(AssertUnwindSafe(job)).is_err() {
                        error!("Dispatch job panicked; worker continues");
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if shared.shutdown.load(Ordering::Acquire) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        shared.worker_exited();
    }
}

impl WorkerPool for ThreadPool {
    fn initiate_shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
    }

    fn wait_until_finished(&self) {
        let mut finished = self.shared.finished.lock().unwrap_or_else(|e| e.into_inner());
        while !*finished {
            finished = self
                .shared
                .finished_cv
                .wait(finished)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    fn destroy(&self) {
        self.initiate_shutdown();
        let threads = std::mem::take(&mut *self.threads.lock().unwrap_or_else(|e| e.into_inner()));
        let current = std::thread::current().id();
        for handle in threads {
            // A worker tearing down its own pool cannot join itself.
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!("Worker thread of {} panicked", self.name);
            }
        }
        debug!("Thread pool {} destroyed", self.name);
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.initiate_shutdown();
    }
}
