//! Communicator API, split by concern.

mod adapters;
mod builder;
mod factories;
mod lifecycle;
mod proxies;
mod runtime;

pub use builder::{CommunicatorBuilder, PendingCommunicator};
pub use lifecycle::Lifecycle;
