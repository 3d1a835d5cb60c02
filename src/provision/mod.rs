//! Dev-shell environment provisioning.
//!
//! Given a finished build, provisioning produces an environment
//! descriptor: the variables a shell should export and the ordered
//! startup actions (banner lines, then the import-search-path export).
//! Rendering the descriptor into shell syntax is the command layer's
//! job; nothing here mutates the calling process.
//!
//! The only side effect permitted during provisioning is running the
//! configured search-path resolver subprocess. When it fails, the
//! whole provisioning fails; a descriptor is never returned partially
//! populated.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use thiserror::Error;

use crate::core::artifact::BuildResult;
use crate::core::descriptor::PackageDescriptor;
use crate::core::runtime::Runtime;
use crate::util::hash::Fingerprint;
use crate::util::process::ProcessBuilder;

/// Errors from environment provisioning.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("installed tree for runtime {runtime} is missing at `{}`", path.display())]
    MissingInstallTree { runtime: String, path: PathBuf },

    #[error("search-path resolver failed for runtime {runtime}")]
    ResolverFailed {
        runtime: String,
        #[source]
        source: anyhow::Error,
    },
}

/// One step a shell performs when entering the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum StartupAction {
    /// Print a banner line.
    Print { line: String },

    /// Export an environment variable.
    Export { name: String, value: String },
}

/// A fully provisioned environment, ready to render.
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentDescriptor {
    /// Variables identifying the environment. Unordered.
    pub vars: BTreeMap<String, String>,

    /// Ordered startup sequence: banner first, search path last.
    pub actions: Vec<StartupAction>,
}

/// Computes the import search path for a provisioned environment.
pub trait SearchPathResolver: Send + Sync {
    fn resolve(&self, result: &BuildResult, runtime: &Runtime) -> Result<Vec<PathBuf>>;
}

/// Default resolver: the installed tree's site-packages directory.
#[derive(Debug, Default)]
pub struct SitePackagesResolver;

impl SearchPathResolver for SitePackagesResolver {
    fn resolve(&self, result: &BuildResult, _runtime: &Runtime) -> Result<Vec<PathBuf>> {
        Ok(vec![result.site_packages.clone()])
    }
}

/// Resolver backed by a project-configured executable.
///
/// The script is invoked with the site-packages directory as its only
/// argument and the runtime identity in the environment; it prints one
/// search-path entry per stdout line.
#[derive(Debug)]
pub struct ScriptResolver {
    script: PathBuf,
}

impl ScriptResolver {
    pub fn new(script: PathBuf) -> Self {
        ScriptResolver { script }
    }
}

impl SearchPathResolver for ScriptResolver {
    fn resolve(&self, result: &BuildResult, runtime: &Runtime) -> Result<Vec<PathBuf>> {
        let cmd = ProcessBuilder::new(&self.script)
            .arg(&result.site_packages)
            .env("SLIPWAY_RUNTIME", runtime.identifier())
            .env("SLIPWAY_SITE_PACKAGES", result.site_packages.display().to_string());

        tracing::debug!("running search-path resolver `{}`", cmd.display_command());
        let output = cmd
            .exec_and_check()
            .with_context(|| format!("resolver `{}` failed", self.script.display()))?;

        let paths: Vec<PathBuf> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect();
        Ok(paths)
    }
}

/// Builds environment descriptors for finished builds.
pub struct Provisioner<'a> {
    identity: &'a str,
    resolver: &'a dyn SearchPathResolver,
}

impl<'a> Provisioner<'a> {
    /// Create a provisioner for a matrix identity and resolver.
    pub fn new(identity: &'a str, resolver: &'a dyn SearchPathResolver) -> Self {
        Provisioner { identity, resolver }
    }

    /// Provision an environment for one finished build.
    pub fn provision(
        &self,
        result: &BuildResult,
        runtime: &Runtime,
        descriptor: &PackageDescriptor,
    ) -> Result<EnvironmentDescriptor, ProvisionError> {
        if !result.install_tree.is_dir() {
            return Err(ProvisionError::MissingInstallTree {
                runtime: runtime.id(),
                path: result.install_tree.clone(),
            });
        }

        let mut vars = BTreeMap::new();
        vars.insert(
            "SLIPWAY_PACKAGE".to_string(),
            descriptor.name().to_string(),
        );
        vars.insert(
            "SLIPWAY_VERSION".to_string(),
            descriptor.version().to_string(),
        );
        vars.insert("SLIPWAY_RUNTIME".to_string(), runtime.identifier());
        vars.insert("SLIPWAY_MATRIX".to_string(), self.identity.to_string());
        vars.insert(
            format!("{}_ROOT", descriptor.upper_snake_name()),
            result.install_tree.display().to_string(),
        );

        let search_path = self
            .resolver
            .resolve(result, runtime)
            .map_err(|source| ProvisionError::ResolverFailed {
                runtime: runtime.id(),
                source,
            })?;
        if search_path.is_empty() {
            return Err(ProvisionError::ResolverFailed {
                runtime: runtime.id(),
                source: anyhow::anyhow!("resolver produced no search path"),
            });
        }
        let joined = std::env::join_paths(&search_path)
            .map_err(|source| ProvisionError::ResolverFailed {
                runtime: runtime.id(),
                source: source.into(),
            })?
            .to_string_lossy()
            .into_owned();

        let mut actions = vec![
            StartupAction::Print {
                line: format!(
                    "slipway environment for {} {}",
                    descriptor.name(),
                    descriptor.version()
                ),
            },
            StartupAction::Print {
                line: format!(
                    "runtime {} [env {}]",
                    runtime.identifier(),
                    self.environment_id(result, runtime, descriptor)
                ),
            },
        ];
        actions.push(StartupAction::Export {
            name: "PYTHONPATH".to_string(),
            value: joined,
        });

        Ok(EnvironmentDescriptor { vars, actions })
    }

    /// Short stable identifier shown in the banner.
    fn environment_id(
        &self,
        result: &BuildResult,
        runtime: &Runtime,
        descriptor: &PackageDescriptor,
    ) -> String {
        let mut fingerprint = Fingerprint::new();
        fingerprint
            .update_str(descriptor.name())
            .update_str(descriptor.version())
            .update_str(&runtime.id())
            .update_str(self.identity)
            .update_str(&result.digest);
        fingerprint.finish_short()
    }
}
