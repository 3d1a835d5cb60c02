//! Global context for slipway operations.
//!
//! Provides centralized access to paths and environment: the current
//! working directory, the user-level slipway home, manifest discovery,
//! and the on-disk layout of a project (dist and scratch directories).

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use thiserror::Error;

/// File name of the project manifest.
pub const MANIFEST_NAME: &str = "Slipway.toml";

/// Errors from manifest discovery.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("no `{}` found in `{}` or any parent directory", MANIFEST_NAME, dir.display())]
    NotFound { dir: PathBuf },
}

/// Project directories for slipway
static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("dev", "slipway", "slipway"));

/// Global context containing paths and output settings.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global slipway data (~/.slipway/)
    home: PathBuf,

    /// Whether to use verbose output
    verbose: bool,

    /// Whether to use colors in output
    color: bool,
}

impl GlobalContext {
    /// Create a new GlobalContext with defaults.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;

        let home = if let Some(dirs) = PROJECT_DIRS.as_ref() {
            dirs.data_dir().to_path_buf()
        } else {
            // Fallback to ~/.slipway
            std::env::var_os("HOME")
                .map(|h| PathBuf::from(h).join(".slipway"))
                .unwrap_or_else(|| PathBuf::from(".slipway"))
        };

        Ok(GlobalContext {
            cwd,
            home,
            verbose: false,
            color: true,
        })
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let mut ctx = Self::new()?;
        ctx.cwd = cwd;
        Ok(ctx)
    }

    /// Set verbose mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Set color output.
    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the slipway home directory (~/.slipway/).
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    /// Check if verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Check if color output is enabled.
    pub fn color(&self) -> bool {
        self.color
    }

    /// Find the manifest file, starting from cwd and searching upward.
    pub fn find_manifest(&self) -> Result<PathBuf, ManifestError> {
        let mut current = self.cwd.clone();
        loop {
            let candidate = current.join(MANIFEST_NAME);
            if candidate.is_file() {
                return Ok(candidate);
            }
            if !current.pop() {
                return Err(ManifestError::NotFound {
                    dir: self.cwd.clone(),
                });
            }
        }
    }

    /// Find the project root (directory containing the manifest).
    pub fn find_project_root(&self) -> Result<PathBuf, ManifestError> {
        // find_manifest only returns paths with a parent
        self.find_manifest()
            .map(|p| p.parent().map(Path::to_path_buf).unwrap_or_default())
    }

    /// Resolve the on-disk layout of the enclosing project.
    pub fn project_layout(&self) -> Result<ProjectLayout, ManifestError> {
        self.find_project_root().map(ProjectLayout::new)
    }
}

impl Default for GlobalContext {
    fn default() -> Self {
        Self::new().expect("failed to create default GlobalContext")
    }
}

/// On-disk layout of a slipway project.
///
/// Final artifacts land in `dist/`; everything else lives under the
/// `.slipway/` directory: per-runtime scratch space in `build/{tag}`
/// and per-runtime installed trees in `install/{tag}`.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    /// Create a layout rooted at the given project directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ProjectLayout { root: root.into() }
    }

    /// Project root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory that receives final distributable artifacts.
    pub fn dist_dir(&self) -> PathBuf {
        self.root.join("dist")
    }

    /// The project-local slipway directory.
    pub fn slipway_dir(&self) -> PathBuf {
        self.root.join(".slipway")
    }

    /// Scratch directory for one runtime tag, cleared before each build.
    pub fn build_dir(&self, tag: &str) -> PathBuf {
        self.slipway_dir().join("build").join(tag)
    }

    /// Installed-tree root for one runtime tag.
    pub fn install_tree(&self, tag: &str) -> PathBuf {
        self.slipway_dir().join("install").join(tag)
    }

    /// Project-local configuration file.
    pub fn config_path(&self) -> PathBuf {
        self.slipway_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_context_paths() {
        let ctx = GlobalContext::new().unwrap();
        assert!(ctx.cwd().is_absolute());
        assert!(ctx.home().to_string_lossy().contains("slipway"));
    }

    #[test]
    fn test_find_manifest_searches_upward() {
        let tmp = TempDir::new().unwrap();
        let manifest = tmp.path().join(MANIFEST_NAME);
        std::fs::write(&manifest, "[package]\nname = \"test\"\nversion = \"0.1.0\"\n").unwrap();

        let nested = tmp.path().join("src").join("deep");
        std::fs::create_dir_all(&nested).unwrap();

        let ctx = GlobalContext::with_cwd(nested).unwrap();
        assert_eq!(ctx.find_manifest().ok(), Some(manifest));
        assert_eq!(ctx.find_project_root().ok(), Some(tmp.path().to_path_buf()));
    }

    #[test]
    fn test_find_manifest_not_found() {
        let tmp = TempDir::new().unwrap();
        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf()).unwrap();
        let result = ctx.find_manifest();
        assert!(matches!(result, Err(ManifestError::NotFound { .. })));
    }

    #[test]
    fn test_project_layout_paths() {
        let layout = ProjectLayout::new("/project");
        assert_eq!(layout.dist_dir(), PathBuf::from("/project/dist"));
        assert_eq!(
            layout.build_dir("py311"),
            PathBuf::from("/project/.slipway/build/py311")
        );
        assert_eq!(
            layout.install_tree("py311"),
            PathBuf::from("/project/.slipway/install/py311")
        );
    }
}
