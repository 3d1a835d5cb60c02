//! `slipway init` command

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::cli::InitArgs;
use slipway::core::generate_default_manifest;
use slipway::util::context::MANIFEST_NAME;
use slipway::PackageDescriptor;

/// Determines the package name from the arguments or directory.
///
/// This is extracted for testability.
pub fn determine_package_name(name: &Option<String>, path: &Path) -> String {
    name.clone().unwrap_or_else(|| {
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unnamed")
            .to_string()
    })
}

/// Scaffold a Slipway project in `path`.
///
/// Writes a starter manifest plus a minimal buildable package layout.
/// Pre-existing source files are left alone so `init` is safe in a
/// directory that already holds a Python project.
pub fn scaffold_project(path: &Path, name: &str) -> Result<()> {
    let manifest_path = path.join(MANIFEST_NAME);
    if manifest_path.exists() {
        bail!("`{}` already exists in `{}`", MANIFEST_NAME, path.display());
    }

    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }

    fs::write(&manifest_path, generate_default_manifest(name))
        .with_context(|| format!("failed to write {}", MANIFEST_NAME))?;

    let snake = name.replace(['-', '.'], "_");

    // pip needs a build backend declaration to produce a wheel.
    let pyproject_path = path.join("pyproject.toml");
    if !pyproject_path.exists() {
        let pyproject = format!(
            r#"[build-system]
requires = ["setuptools", "wheel"]
build-backend = "setuptools.build_meta"

[project]
name = "{name}"
version = "0.1.0"
"#
        );
        fs::write(&pyproject_path, pyproject).with_context(|| "failed to write pyproject.toml")?;
    }

    let package_dir = path.join(&snake);
    if !package_dir.exists() {
        fs::create_dir_all(&package_dir)
            .with_context(|| format!("failed to create package directory: {snake}"))?;
        fs::write(package_dir.join("__init__.py"), "__version__ = \"0.1.0\"\n")?;
    }

    let gitignore_path = path.join(".gitignore");
    if !gitignore_path.exists() {
        let gitignore = r#"# Slipway build artifacts
.slipway/
dist/

# Python
__pycache__/
*.egg-info/
"#;
        fs::write(&gitignore_path, gitignore)?;
    }

    Ok(())
}

pub fn execute(args: InitArgs) -> Result<()> {
    let path = args.path.unwrap_or_else(|| PathBuf::from("."));
    let name = determine_package_name(&args.name, &path);

    // Same rules the manifest loader will apply later.
    PackageDescriptor::new(&name, "0.1.0", &path).validate()?;

    scaffold_project(&path, &name)?;

    eprintln!("     Initialized `{}` package", name);

    Ok(())
}
