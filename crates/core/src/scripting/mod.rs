//! Script execution primitives.
//!
//! [`workspace`] owns the per-attempt temporary directory, [`subprocess`]
//! runs one child process under a hard deadline, and [`runtime`] ties them
//! together for an interpreter profile (source composition, best-effort
//! dependency installs, the interpreter run itself). All of it is free of
//! database access so it can be exercised directly in tests.

pub mod executor;
pub mod runtime;
pub mod subprocess;
pub mod workspace;
