//! Slipway - a build-matrix runner for Python distribution packages
//!
//! This crate provides the core library functionality for Slipway:
//! expanding one package descriptor across a runtime axis, building a
//! wheel per runtime, rewriting install provenance, and provisioning
//! per-runtime environments.

pub mod builder;
pub mod core;
pub mod matrix;
pub mod metadata;
pub mod provision;
pub mod util;

/// Test utilities and fakes for Slipway unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides a scripted build engine so the pipeline
/// and matrix layers can be exercised without an interpreter.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{
    artifact::BuildResult, descriptor::PackageDescriptor, manifest::Manifest, runtime::Runtime,
    runtime::RuntimeAxis,
};

pub use crate::matrix::{FailureMode, MatrixEvent, MatrixExpander, MatrixResult};
pub use crate::util::context::GlobalContext;
