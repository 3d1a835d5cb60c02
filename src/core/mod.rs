//! Core data structures for Slipway.
//!
//! This module contains the foundational types used throughout Slipway:
//! - Package descriptors (what to build)
//! - Runtime axes (which interpreter versions to build against)
//! - Artifact naming and per-runtime build results
//! - The Slipway.toml manifest

pub mod artifact;
pub mod descriptor;
pub mod manifest;
pub mod runtime;

pub use artifact::{artifact_file_name, artifact_path, BuildResult, ARTIFACT_SUFFIX};
pub use descriptor::PackageDescriptor;
pub use manifest::{generate_default_manifest, Manifest};
pub use runtime::{Runtime, RuntimeAxis};
