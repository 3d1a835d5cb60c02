//! Package descriptors: the immutable specification of what to build.
//!
//! A descriptor is constructed once (normally from `Slipway.toml`) and
//! shared read-only across every axis entry of a matrix expansion.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

// PEP 503-style distribution names: alphanumeric with inner . _ - runs.
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9._-]*[A-Za-z0-9])?$").unwrap());

// Release segments plus an optional pre/post/dev suffix, e.g. "0.0.1a1".
static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]+(\.[0-9]+)*((a|b|rc)[0-9]+)?(\.post[0-9]+)?(\.dev[0-9]+)?$").unwrap()
});

/// Errors from descriptor validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("package name must not be empty")]
    EmptyName,

    #[error("package version must not be empty")]
    EmptyVersion,

    #[error("invalid package name `{name}`")]
    InvalidName { name: String },

    #[error("invalid package version `{version}`")]
    InvalidVersion { version: String },
}

/// The immutable specification of a package to build across the axis.
#[derive(Debug, Clone)]
pub struct PackageDescriptor {
    /// Distribution name, e.g. "sample-pkg".
    name: String,

    /// Version string, e.g. "0.0.1a1".
    version: String,

    /// Optional one-line description, shown in provisioned banners.
    description: Option<String>,

    /// Directory containing the package sources.
    source_root: PathBuf,

    /// Auxiliary tools required at build time, in declaration order.
    build_tools: Vec<String>,

    /// Auxiliary tools required at test time; the first one is the
    /// test runner.
    test_tools: Vec<String>,

    /// Importable unit names probed by the smoke check.
    imports: Vec<String>,
}

impl PackageDescriptor {
    /// Create a descriptor with no auxiliary tools or imports.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        source_root: impl Into<PathBuf>,
    ) -> Self {
        PackageDescriptor {
            name: name.into(),
            version: version.into(),
            description: None,
            source_root: source_root.into(),
            build_tools: Vec::new(),
            test_tools: Vec::new(),
            imports: Vec::new(),
        }
    }

    /// Set the description line.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the build-time auxiliary tools.
    pub fn with_build_tools(mut self, tools: Vec<String>) -> Self {
        self.build_tools = tools;
        self
    }

    /// Set the test-time auxiliary tools.
    pub fn with_test_tools(mut self, tools: Vec<String>) -> Self {
        self.test_tools = tools;
        self
    }

    /// Set the importable unit names for the smoke check.
    pub fn with_imports(mut self, imports: Vec<String>) -> Self {
        self.imports = imports;
        self
    }

    /// Validate name and version against the accepted grammar.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.name.is_empty() {
            return Err(DescriptorError::EmptyName);
        }
        if self.version.is_empty() {
            return Err(DescriptorError::EmptyVersion);
        }
        if !NAME_RE.is_match(&self.name) {
            return Err(DescriptorError::InvalidName {
                name: self.name.clone(),
            });
        }
        if !VERSION_RE.is_match(&self.version) {
            return Err(DescriptorError::InvalidVersion {
                version: self.version.clone(),
            });
        }
        Ok(())
    }

    /// Package name as declared.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version string as declared.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Description line, if declared.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Directory containing the package sources.
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Build-time auxiliary tools.
    pub fn build_tools(&self) -> &[String] {
        &self.build_tools
    }

    /// Test-time auxiliary tools.
    pub fn test_tools(&self) -> &[String] {
        &self.test_tools
    }

    /// Importable unit names for the smoke check.
    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    /// Name normalized for artifact file names: hyphens and dots
    /// become underscores.
    pub fn snake_name(&self) -> String {
        self.name.replace(['-', '.'], "_")
    }

    /// Name normalized for environment variables: snake name, upper
    /// cased.
    pub fn upper_snake_name(&self) -> String {
        self.snake_name().to_uppercase()
    }
}
