//! Text-generation backends and the ordered-fallback gateway.
//!
//! Each provider implements [`GenerationBackend`]. [`ModelGateway`] holds the
//! registered backends by name and tries them in the order a caller asks for,
//! returning the first non-empty result.

pub mod anthropic;
pub mod backend;
pub mod config;
pub mod gateway;
pub mod openai;

pub use backend::{BackendError, GenerationBackend};
pub use gateway::ModelGateway;
