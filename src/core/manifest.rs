//! Slipway.toml manifest parsing and schema.
//!
//! The manifest is the single configuration file for a slipway project:
//! the `[package]` section describes what to build, `[matrix]` declares
//! the runtime version axis, and `[provision]` configures dev-shell
//! provisioning.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::descriptor::PackageDescriptor;
use crate::core::runtime::{Runtime, RuntimeAxis};
use crate::matrix::FailureMode;

/// The parsed Slipway.toml manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// What to build.
    pub descriptor: PackageDescriptor,

    /// The runtime version axis.
    pub axis: RuntimeAxis,

    /// Default failure policy for matrix expansion.
    pub failure_mode: FailureMode,

    /// Auxiliary import-search-path resolver script, if configured.
    /// Absolute (resolved against the manifest directory).
    pub resolver: Option<PathBuf>,

    /// The directory containing this manifest.
    pub manifest_dir: PathBuf,
}

/// Raw manifest as deserialized from TOML.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    #[serde(default)]
    package: Option<RawPackage>,

    #[serde(default)]
    matrix: Option<RawMatrix>,

    #[serde(default)]
    provision: RawProvision,
}

/// Raw [package] section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPackage {
    name: String,
    version: String,

    #[serde(default)]
    description: Option<String>,

    /// Source root, relative to the manifest directory.
    #[serde(default)]
    source: Option<PathBuf>,

    #[serde(default)]
    build_tools: Vec<String>,

    #[serde(default)]
    test_tools: Vec<String>,

    /// Defaults to the underscore-normalized package name.
    #[serde(default)]
    imports: Vec<String>,
}

/// Raw [matrix] section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMatrix {
    /// Registry identity exported into provisioned environments.
    /// Defaults to `slipway:{name}`.
    #[serde(default)]
    identity: Option<String>,

    /// Designated "latest" entry. Defaults to the last declared
    /// runtime.
    #[serde(default)]
    default: Option<String>,

    #[serde(default)]
    failure_mode: Option<FailureMode>,

    #[serde(default, rename = "runtime")]
    runtimes: Vec<RawRuntime>,
}

/// Raw [[matrix.runtime]] entry.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRuntime {
    version: String,

    #[serde(default)]
    tag: Option<String>,

    #[serde(default)]
    interpreter: Option<String>,
}

/// Raw [provision] section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProvision {
    /// Path of the resolver script, relative to the manifest directory.
    #[serde(default)]
    resolver: Option<PathBuf>,
}

impl Manifest {
    /// Load a manifest from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;

        Self::parse(&content, path)
    }

    /// Parse manifest content.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let raw: RawManifest =
            toml::from_str(content).with_context(|| "failed to parse Slipway.toml")?;

        let manifest_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();

        let Some(package) = raw.package else {
            anyhow::bail!(
                "manifest at {} must have a [package] section",
                path.display()
            );
        };

        let source_root = manifest_dir.join(package.source.unwrap_or_else(|| PathBuf::from(".")));

        let imports = if package.imports.is_empty() {
            vec![package.name.replace(['-', '.'], "_")]
        } else {
            package.imports
        };

        let mut descriptor =
            PackageDescriptor::new(package.name, package.version, source_root)
                .with_build_tools(package.build_tools)
                .with_test_tools(package.test_tools)
                .with_imports(imports);
        if let Some(description) = package.description {
            descriptor = descriptor.with_description(description);
        }
        descriptor
            .validate()
            .with_context(|| format!("invalid [package] in {}", path.display()))?;

        let Some(matrix) = raw.matrix else {
            anyhow::bail!(
                "manifest at {} must have a [matrix] section with at least one [[matrix.runtime]]",
                path.display()
            );
        };
        if matrix.runtimes.is_empty() {
            anyhow::bail!(
                "manifest at {} must declare at least one [[matrix.runtime]]",
                path.display()
            );
        }

        let mut entries = Vec::with_capacity(matrix.runtimes.len());
        for raw_runtime in matrix.runtimes {
            let mut runtime = Runtime::new(&raw_runtime.version)
                .with_context(|| format!("invalid [[matrix.runtime]] in {}", path.display()))?;
            if let Some(tag) = raw_runtime.tag {
                runtime = runtime.with_tag(tag);
            }
            if let Some(interpreter) = raw_runtime.interpreter {
                runtime = runtime.with_interpreter(interpreter);
            }
            entries.push(runtime);
        }

        let default_id = matrix
            .default
            .unwrap_or_else(|| entries[entries.len() - 1].id());
        let identity = matrix
            .identity
            .unwrap_or_else(|| format!("slipway:{}", descriptor.name()));

        let axis = RuntimeAxis::new(entries, default_id, identity)
            .with_context(|| format!("invalid [matrix] in {}", path.display()))?;

        let resolver = raw.provision.resolver.map(|p| manifest_dir.join(p));

        Ok(Manifest {
            descriptor,
            axis,
            failure_mode: matrix.failure_mode.unwrap_or_default(),
            resolver,
            manifest_dir,
        })
    }

    /// Get the package name.
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// Get the package version string.
    pub fn version(&self) -> &str {
        self.descriptor.version()
    }
}

/// Generate a default Slipway.toml for a new project.
pub fn generate_default_manifest(name: &str) -> String {
    let snake = name.replace(['-', '.'], "_");
    format!(
        r#"[package]
name = "{name}"
version = "0.1.0"
build_tools = ["setuptools", "wheel"]
test_tools = ["pytest"]
# Units probed by the post-build import check.
# imports = ["{snake}"]

[matrix]
# identity = "github:acme/{name}"
default = "3.11.4"

[[matrix.runtime]]
version = "3.9.18"

[[matrix.runtime]]
version = "3.11.4"

# [provision]
# resolver = "scripts/resolve_search_path.py"
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_basic_manifest() {
        let content = r#"
[package]
name = "sample-pkg"
version = "0.0.1a1"
build_tools = ["setuptools", "wheel"]
test_tools = ["pytest"]

[matrix]
default = "3.11.4"

[[matrix.runtime]]
version = "3.9.18"

[[matrix.runtime]]
version = "3.11.4"
"#;
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Slipway.toml");

        let manifest = Manifest::parse(content, &path).unwrap();
        assert_eq!(manifest.name(), "sample-pkg");
        assert_eq!(manifest.version(), "0.0.1a1");
        assert_eq!(manifest.axis.len(), 2);
        assert_eq!(manifest.axis.default_id(), "3.11.4");
        assert_eq!(manifest.axis.identity(), "slipway:sample-pkg");
        assert_eq!(manifest.failure_mode, FailureMode::FailFast);
        // Imports default to the normalized package name.
        assert_eq!(manifest.descriptor.imports(), ["sample_pkg"]);
        assert_eq!(manifest.descriptor.source_root(), tmp.path());
    }

    #[test]
    fn test_parse_manifest_with_overrides() {
        let content = r#"
[package]
name = "sample-pkg"
version = "0.0.1a1"
source = "python"
imports = ["sample_pkg", "sample_pkg.events"]

[matrix]
identity = "github:acme/sample-pkg"
failure_mode = "continue"

[[matrix.runtime]]
version = "3.9.18"
tag = "cp39"
interpreter = "/opt/python3.9/bin/python"
"#;
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Slipway.toml");

        let manifest = Manifest::parse(content, &path).unwrap();
        assert_eq!(manifest.failure_mode, FailureMode::Continue);
        assert_eq!(manifest.axis.identity(), "github:acme/sample-pkg");
        assert_eq!(manifest.descriptor.imports().len(), 2);
        assert_eq!(manifest.descriptor.source_root(), tmp.path().join("python"));

        let runtime = &manifest.axis.entries()[0];
        assert_eq!(runtime.tag(), "cp39");
        assert_eq!(runtime.interpreter(), "/opt/python3.9/bin/python");
        // Default falls back to the last declared runtime.
        assert_eq!(manifest.axis.default_id(), "3.9.18");
    }

    #[test]
    fn test_manifest_requires_package() {
        let content = r#"
[matrix]
[[matrix.runtime]]
version = "3.11.4"
"#;
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Slipway.toml");

        let err = Manifest::parse(content, &path).unwrap_err().to_string();
        assert!(err.contains("[package]"));
    }

    #[test]
    fn test_manifest_requires_runtimes() {
        let content = r#"
[package]
name = "sample-pkg"
version = "0.0.1a1"

[matrix]
default = "3.11.4"
"#;
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Slipway.toml");

        let err = Manifest::parse(content, &path).unwrap_err().to_string();
        assert!(err.contains("[[matrix.runtime]]"));
    }

    #[test]
    fn test_manifest_rejects_unknown_keys() {
        let content = r#"
[package]
name = "sample-pkg"
version = "0.0.1a1"
build_toolz = ["setuptools"]

[matrix]
[[matrix.runtime]]
version = "3.11.4"
"#;
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Slipway.toml");

        assert!(Manifest::parse(content, &path).is_err());
    }

    #[test]
    fn test_resolver_resolved_against_manifest_dir() {
        let content = r#"
[package]
name = "sample-pkg"
version = "0.0.1a1"

[matrix]
[[matrix.runtime]]
version = "3.11.4"

[provision]
resolver = "scripts/resolve_search_path.py"
"#;
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Slipway.toml");

        let manifest = Manifest::parse(content, &path).unwrap();
        assert_eq!(
            manifest.resolver,
            Some(tmp.path().join("scripts/resolve_search_path.py"))
        );
    }

    #[test]
    fn test_generated_manifest_parses() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Slipway.toml");

        let content = generate_default_manifest("my-pkg");
        let manifest = Manifest::parse(&content, &path).unwrap();
        assert_eq!(manifest.name(), "my-pkg");
        assert_eq!(manifest.axis.len(), 2);
        assert_eq!(manifest.axis.default_id(), "3.11.4");
    }
}
