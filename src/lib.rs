// Library root: exposes the bootstrap machinery to the binary and to
// integration tests. The binary entry point is src/main.rs.

pub mod bootstrap;
pub mod collections;
pub mod core;
pub mod platform;
pub mod policy;
pub mod sequencer;

pub use crate::bootstrap::logger;
pub use crate::core::{config, error};
