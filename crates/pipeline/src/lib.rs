//! Job processing and script execution services.
//!
//! [`JobProcessor`] owns the background generation jobs; [`ExecutionEngine`]
//! runs stored scripts synchronously. Both talk to storage only through the
//! store traits in `scriptforge_core::store`.

pub mod config;
pub mod engine;
pub mod processor;

pub use config::ExecutionConfig;
pub use engine::{ExecuteRequest, ExecutionEngine};
pub use processor::JobProcessor;
