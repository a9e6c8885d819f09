// src/connection/mod.rs

//! Manages the lifecycle of a single client connection: the shared write
//! side used for broadcasts and the per-connection collector that reads.

mod collector;
mod guard;
mod handle;

pub use collector::{BoxedReader, MessageCollector};
pub use handle::{BoxedWriter, Connection};
