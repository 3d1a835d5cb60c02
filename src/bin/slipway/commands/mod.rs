//! Command implementations

pub mod build;
pub mod clean;
pub mod completions;
pub mod env;
pub mod init;
pub mod runtimes;
