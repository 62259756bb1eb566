//! Subcommand implementations.

pub mod fetch;
pub mod sync;
pub mod validate;
