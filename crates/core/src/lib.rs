//! ScriptForge domain logic.
//!
//! Pure building blocks shared by the pipeline, database, and HTTP crates:
//! entity types and their lifecycle rules, store contracts, the metadata
//! extractor, prompt templates, and the subprocess primitives used to run
//! stored scripts. Nothing in here talks to a database or the network.

pub mod error;
pub mod execution;
pub mod extraction;
pub mod job;
pub mod prompt;
pub mod script;
pub mod scripting;
pub mod store;
pub mod types;
