//! Per-runtime artifact builds.
//!
//! This module turns one (package, runtime) pair into a distributable
//! artifact plus an installed tree, via an engine seam that keeps the
//! toolchain mockable.

pub mod engine;
pub mod interpreter;
pub mod pipeline;

pub use engine::{
    BuildEngine, BuildRequest, ProbeFailure, ProbeReport, TestReport, ToolAvailability,
};
pub use interpreter::InterpreterEngine;
pub use pipeline::{ArtifactBuilder, BuildError};
