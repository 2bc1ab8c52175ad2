//! CLI command implementations.

pub mod keys;
pub mod seed;
pub mod trigger;
