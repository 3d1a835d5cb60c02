//! Artifact naming conventions and build results.
//!
//! Artifact and installed-tree paths are pure functions of the
//! descriptor and axis entry, so every stage (builder, rewriter,
//! provisioner, CLI) derives the same locations independently.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;

use crate::core::descriptor::PackageDescriptor;
use crate::core::runtime::Runtime;
use crate::util::context::ProjectLayout;
use crate::util::hash::sha256_file;

/// File extension of distributable artifacts.
pub const ARTIFACT_SUFFIX: &str = ".whl";

/// Deterministic artifact file name:
/// `{name_with_underscores}-{version}-{tag}-none-any.whl`.
pub fn artifact_file_name(descriptor: &PackageDescriptor, runtime: &Runtime) -> String {
    format!(
        "{}-{}-{}-none-any{}",
        descriptor.snake_name(),
        descriptor.version(),
        runtime.tag(),
        ARTIFACT_SUFFIX
    )
}

/// Absolute path the artifact for (descriptor, runtime) lands at.
pub fn artifact_path(
    layout: &ProjectLayout,
    descriptor: &PackageDescriptor,
    runtime: &Runtime,
) -> PathBuf {
    layout.dist_dir().join(artifact_file_name(descriptor, runtime))
}

/// Metadata directory name inside site-packages:
/// `{name_with_underscores}-{version}.dist-info`.
pub fn dist_info_dir_name(descriptor: &PackageDescriptor) -> String {
    format!("{}-{}.dist-info", descriptor.snake_name(), descriptor.version())
}

/// Site-packages directory inside an installed tree, keyed by the
/// runtime's `major.minor`.
pub fn site_packages_dir(install_tree: &Path, runtime: &Runtime) -> PathBuf {
    install_tree
        .join("lib")
        .join(format!("python{}", runtime.major_minor()))
        .join("site-packages")
}

/// The outcome of one successful (descriptor, runtime) build.
///
/// Created by the builder, read by the rewriter and provisioner;
/// frozen after the provenance rewrite.
#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    /// Axis entry id this result belongs to, e.g. "3.11.4".
    pub runtime: String,

    /// Artifact tag for the entry, e.g. "py311".
    pub tag: String,

    /// Absolute path of the distributable artifact.
    pub artifact: PathBuf,

    /// Absolute path of the installed tree root.
    pub install_tree: PathBuf,

    /// Site-packages directory inside the installed tree.
    pub site_packages: PathBuf,

    /// SHA256 digest of the artifact contents.
    pub digest: String,
}

impl BuildResult {
    /// Reconstruct the result of an earlier build from disk.
    ///
    /// Returns `Ok(None)` when the artifact or installed tree is
    /// absent (the entry has not been built).
    pub fn locate(
        layout: &ProjectLayout,
        descriptor: &PackageDescriptor,
        runtime: &Runtime,
    ) -> Result<Option<BuildResult>> {
        let artifact = artifact_path(layout, descriptor, runtime);
        let install_tree = layout.install_tree(runtime.tag());
        if !artifact.is_file() || !install_tree.is_dir() {
            return Ok(None);
        }

        let digest = sha256_file(&artifact)?;
        Ok(Some(BuildResult {
            runtime: runtime.id(),
            tag: runtime.tag().to_string(),
            site_packages: site_packages_dir(&install_tree, runtime),
            artifact,
            install_tree,
            digest,
        }))
    }

    /// Path of the dist-info directory inside this result's tree.
    pub fn dist_info_dir(&self, descriptor: &PackageDescriptor) -> PathBuf {
        self.site_packages.join(dist_info_dir_name(descriptor))
    }
}
