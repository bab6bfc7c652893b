//! Bootstrap layer: modules that run before the ledger session starts.
//!
//! - **logger**: tracing-subscriber initialisation.

pub mod logger;
