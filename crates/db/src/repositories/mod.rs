//! Query structs, one per table. Each is zero-sized and takes the pool as
//! its first argument.

pub mod job_repo;
pub mod script_execution_repo;
pub mod script_repo;

pub use job_repo::JobRepo;
pub use script_execution_repo::ScriptExecutionRepo;
pub use script_repo::ScriptRepo;
