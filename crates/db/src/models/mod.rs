pub mod execution;
pub mod job;
pub mod script;
pub mod status;
