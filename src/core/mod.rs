// src/core/mod.rs

//! The relay core: the connection registry, the message queue, the
//! distributor, and the state and protocol they share.

pub mod distributor;
pub mod errors;
pub mod metrics;
pub mod protocol;
pub mod queue;
pub mod registry;
pub mod state;

pub use distributor::{BroadcastReport, MessageDistributor};
pub use errors::RelayError;
pub use queue::{EnqueueOutcome, MessageQueue};
pub use registry::ConnectionRegistry;
