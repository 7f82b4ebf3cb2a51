//! CLI commands

pub mod checksum;
pub mod diff;
pub mod drift;
pub mod eval;
pub mod placeholder;
pub mod resolve;
pub mod template;
