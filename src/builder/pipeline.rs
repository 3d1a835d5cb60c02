//! The per-runtime build pipeline.
//!
//! One `ArtifactBuilder::build` call takes a package descriptor and a
//! single runtime entry through the full pipeline: toolchain and
//! declared-tool checks, scratch preparation, artifact production,
//! staging into `dist/`, installation into the per-runtime tree,
//! import probes, and the mandatory test-suite run.

use std::path::{Path, PathBuf};

use anyhow::Context;
use thiserror::Error;

use crate::builder::engine::{BuildEngine, BuildRequest};
use crate::core::artifact::{artifact_path, site_packages_dir, BuildResult, ARTIFACT_SUFFIX};
use crate::core::descriptor::PackageDescriptor;
use crate::core::runtime::Runtime;
use crate::util::fs;
use crate::util::hash::sha256_file;

/// Failure of a single (descriptor, runtime) build.
///
/// Every variant names the runtime entry it belongs to, so callers can
/// report which axis entry failed without extra bookkeeping.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no usable interpreter for runtime {runtime}: {message}")]
    MissingInterpreter { runtime: String, message: String },

    #[error("declared tool `{tool}` is not available for runtime {runtime}")]
    MissingTool { runtime: String, tool: String },

    #[error("package `{name}` declares no test tools; every build must run a test suite")]
    NoTestTools { name: String },

    #[error("build failed for runtime {runtime}")]
    BuildFailed {
        runtime: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("build for runtime {runtime} produced no `{ARTIFACT_SUFFIX}` artifact under `{}`", work_dir.display())]
    ArtifactMissing { runtime: String, work_dir: PathBuf },

    #[error("install into the {runtime} tree failed")]
    InstallFailed {
        runtime: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("import probe `{unit}` failed for runtime {runtime}: {stderr}")]
    SmokeTestFailed {
        runtime: String,
        unit: String,
        stderr: String,
    },

    #[error("test suite `{tool}` failed for runtime {runtime}\n{output}")]
    TestsFailed {
        runtime: String,
        tool: String,
        output: String,
    },

    #[error("could not run {stage} for runtime {runtime}")]
    StageFailed {
        runtime: String,
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl BuildError {
    /// The runtime entry this failure belongs to, if the build got far
    /// enough to have one.
    pub fn runtime(&self) -> Option<&str> {
        match self {
            BuildError::NoTestTools { .. } => None,
            BuildError::MissingInterpreter { runtime, .. }
            | BuildError::MissingTool { runtime, .. }
            | BuildError::BuildFailed { runtime, .. }
            | BuildError::ArtifactMissing { runtime, .. }
            | BuildError::InstallFailed { runtime, .. }
            | BuildError::SmokeTestFailed { runtime, .. }
            | BuildError::TestsFailed { runtime, .. }
            | BuildError::StageFailed { runtime, .. } => Some(runtime),
        }
    }
}

/// Drives one runtime entry through the build pipeline.
pub struct ArtifactBuilder<'a> {
    engine: &'a dyn BuildEngine,
    layout: &'a crate::util::context::ProjectLayout,
    jobs: Option<usize>,
    verbose: bool,
}

impl<'a> ArtifactBuilder<'a> {
    /// Create a builder over an engine and project layout.
    pub fn new(engine: &'a dyn BuildEngine, layout: &'a crate::util::context::ProjectLayout) -> Self {
        ArtifactBuilder {
            engine,
            layout,
            jobs: None,
            verbose: false,
        }
    }

    /// Set the parallel-jobs hint passed to the engine.
    pub fn jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    /// Enable verbose engine output.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Build one runtime entry to completion.
    pub fn build(
        &self,
        descriptor: &PackageDescriptor,
        runtime: &Runtime,
    ) -> Result<BuildResult, BuildError> {
        let id = runtime.id();

        if descriptor.test_tools().is_empty() {
            return Err(BuildError::NoTestTools {
                name: descriptor.name().to_string(),
            });
        }

        let availability =
            self.engine
                .availability(runtime)
                .map_err(|source| BuildError::StageFailed {
                    runtime: id.clone(),
                    stage: "the toolchain check",
                    source,
                })?;
        if let Some(message) = availability.error_message() {
            return Err(BuildError::MissingInterpreter {
                runtime: id,
                message,
            });
        }

        let work_dir = self.layout.build_dir(runtime.tag());
        let install_tree = self.layout.install_tree(runtime.tag());
        let site_packages = site_packages_dir(&install_tree, runtime);
        let artifact = artifact_path(self.layout, descriptor, runtime);

        let request = BuildRequest::new(
            descriptor.source_root().to_path_buf(),
            work_dir.clone(),
            site_packages.clone(),
        )
        .with_build_tools(descriptor.build_tools().to_vec())
        .with_test_tools(descriptor.test_tools().to_vec())
        .with_jobs(self.jobs)
        .with_verbose(self.verbose);

        let missing = self
            .engine
            .missing_tools(&request, runtime)
            .map_err(|source| BuildError::StageFailed {
                runtime: id.clone(),
                stage: "the toolchain check",
                source,
            })?;
        if let Some(tool) = missing.into_iter().next() {
            return Err(BuildError::MissingTool { runtime: id, tool });
        }

        prepare_dirs(&work_dir, &install_tree, &site_packages, &artifact).map_err(|source| {
            BuildError::StageFailed {
                runtime: id.clone(),
                stage: "workspace preparation",
                source,
            }
        })?;

        tracing::debug!(
            "building {} {} for runtime {}",
            descriptor.name(),
            descriptor.version(),
            id
        );
        self.engine
            .build_artifact(&request, runtime)
            .map_err(|source| BuildError::BuildFailed {
                runtime: id.clone(),
                source,
            })?;

        let produced = find_wheel(&work_dir, &descriptor.snake_name())
            .map_err(|source| BuildError::StageFailed {
                runtime: id.clone(),
                stage: "artifact staging",
                source,
            })?
            .ok_or_else(|| BuildError::ArtifactMissing {
                runtime: id.clone(),
                work_dir: work_dir.clone(),
            })?;

        stage_artifact(&produced, &artifact).map_err(|source| BuildError::StageFailed {
            runtime: id.clone(),
            stage: "artifact staging",
            source,
        })?;

        self.engine
            .install_artifact(&request, runtime, &produced)
            .map_err(|source| BuildError::InstallFailed {
                runtime: id.clone(),
                source,
            })?;

        let probes = self
            .engine
            .probe_imports(&request, runtime, descriptor.imports())
            .map_err(|source| BuildError::StageFailed {
                runtime: id.clone(),
                stage: "the import probe",
                source,
            })?;
        if let Some(failure) = probes.failures.into_iter().next() {
            return Err(BuildError::SmokeTestFailed {
                runtime: id,
                unit: failure.unit,
                stderr: failure.stderr,
            });
        }

        let tool = &descriptor.test_tools()[0];
        let tests = self
            .engine
            .run_tests(&request, runtime, tool)
            .map_err(|source| BuildError::StageFailed {
                runtime: id.clone(),
                stage: "the test suite",
                source,
            })?;
        if !tests.success() {
            return Err(BuildError::TestsFailed {
                runtime: id,
                tool: tests.tool,
                output: tests.output,
            });
        }

        let digest = sha256_file(&artifact).map_err(|source| BuildError::StageFailed {
            runtime: id.clone(),
            stage: "artifact fingerprinting",
            source,
        })?;

        Ok(BuildResult {
            runtime: id,
            tag: runtime.tag().to_string(),
            artifact,
            install_tree,
            site_packages,
            digest,
        })
    }
}

/// Reset per-runtime directories so every build starts from a clean
/// slate. The dist directory is created but never cleared; other
/// entries' artifacts live there too.
fn prepare_dirs(
    work_dir: &Path,
    install_tree: &Path,
    site_packages: &Path,
    artifact: &Path,
) -> anyhow::Result<()> {
    fs::remove_dir_all_if_exists(work_dir)?;
    fs::ensure_dir(work_dir)?;
    fs::remove_dir_all_if_exists(install_tree)?;
    fs::ensure_dir(site_packages)?;
    if let Some(dist_dir) = artifact.parent() {
        fs::ensure_dir(dist_dir)?;
    }
    Ok(())
}

/// Place the produced wheel at its deterministic dist path.
fn stage_artifact(produced: &Path, artifact: &Path) -> anyhow::Result<()> {
    std::fs::copy(produced, artifact)
        .with_context(|| format!("failed to place artifact at {}", artifact.display()))?;
    Ok(())
}

/// Find the wheel the engine produced in the scratch directory.
///
/// `pip wheel --no-deps` leaves exactly one; if anything else slipped
/// in, prefer the file named for the package.
fn find_wheel(work_dir: &Path, snake_name: &str) -> anyhow::Result<Option<PathBuf>> {
    let mut wheels: Vec<PathBuf> = std::fs::read_dir(work_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("whl"))
        })
        .collect();
    wheels.sort();

    let prefix = format!("{}-", snake_name);
    let named = wheels.iter().find(|path| {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(&prefix))
    });
    Ok(named.cloned().or_else(|| wheels.first().cloned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeEngine;
    use crate::util::context::ProjectLayout;
    use tempfile::TempDir;

    fn sample_descriptor(source_root: &Path) -> PackageDescriptor {
        PackageDescriptor::new("sample-pkg", "0.0.1a1", source_root.to_path_buf())
            .with_build_tools(vec!["setuptools".into(), "wheel".into()])
            .with_test_tools(vec!["pytest".into()])
            .with_imports(vec!["sample_pkg".into()])
    }

    #[test]
    fn test_build_renames_artifact_to_runtime_tag() {
        let tmp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(tmp.path());
        let descriptor = sample_descriptor(tmp.path());
        let runtime = Runtime::new("3.11.4").unwrap();

        // Engine output carries pip's generic tag; staging renames it.
        let engine = FakeEngine::producing("sample_pkg-0.0.1a1-py3-none-any.whl");
        let result = ArtifactBuilder::new(&engine, &layout)
            .build(&descriptor, &runtime)
            .unwrap();

        assert_eq!(
            result.artifact,
            tmp.path().join("dist/sample_pkg-0.0.1a1-py311-none-any.whl")
        );
        assert!(result.artifact.is_file());
        assert_eq!(result.runtime, "3.11.4");
        assert_eq!(result.tag, "py311");
        assert_eq!(result.digest.len(), 64);
        assert!(result
            .site_packages
            .ends_with("install/py311/lib/python3.11/site-packages"));
    }

    #[test]
    fn test_build_requires_test_tools() {
        let tmp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(tmp.path());
        let descriptor = PackageDescriptor::new("sample-pkg", "0.0.1a1", tmp.path().to_path_buf());
        let runtime = Runtime::new("3.11.4").unwrap();

        let engine = FakeEngine::producing("sample_pkg-0.0.1a1-py3-none-any.whl");
        let err = ArtifactBuilder::new(&engine, &layout)
            .build(&descriptor, &runtime)
            .unwrap_err();
        assert!(matches!(err, BuildError::NoTestTools { .. }));
    }

    #[test]
    fn test_build_fails_on_missing_interpreter() {
        let tmp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(tmp.path());
        let descriptor = sample_descriptor(tmp.path());
        let runtime = Runtime::new("3.11.4").unwrap();

        let engine = FakeEngine::producing("x.whl").unavailable();
        let err = ArtifactBuilder::new(&engine, &layout)
            .build(&descriptor, &runtime)
            .unwrap_err();
        assert!(matches!(err, BuildError::MissingInterpreter { .. }));
        assert_eq!(err.runtime(), Some("3.11.4"));
    }

    #[test]
    fn test_build_fails_on_missing_build_tool() {
        let tmp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(tmp.path());
        let descriptor = sample_descriptor(tmp.path());
        let runtime = Runtime::new("3.11.4").unwrap();

        let engine =
            FakeEngine::producing("sample_pkg-0.0.1a1-py3-none-any.whl").missing_tool("wheel");
        let err = ArtifactBuilder::new(&engine, &layout)
            .build(&descriptor, &runtime)
            .unwrap_err();
        match err {
            BuildError::MissingTool { runtime: entry, tool } => {
                assert_eq!(tool, "wheel");
                assert_eq!(entry, "3.11.4");
            }
            other => panic!("expected missing-tool failure, got {other:?}"),
        }

        // The check fires before any directory is touched.
        assert!(!tmp.path().join("dist").exists());
        assert!(!layout.build_dir("py311").exists());
    }

    #[test]
    fn test_build_fails_on_missing_test_tool() {
        let tmp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(tmp.path());
        let descriptor = sample_descriptor(tmp.path());
        let runtime = Runtime::new("3.11.4").unwrap();

        let engine =
            FakeEngine::producing("sample_pkg-0.0.1a1-py3-none-any.whl").missing_tool("pytest");
        let err = ArtifactBuilder::new(&engine, &layout)
            .build(&descriptor, &runtime)
            .unwrap_err();
        match err {
            BuildError::MissingTool { tool, .. } => assert_eq!(tool, "pytest"),
            other => panic!("expected missing-tool failure, got {other:?}"),
        }
    }

    #[test]
    fn test_build_fails_when_no_artifact_produced() {
        let tmp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(tmp.path());
        let descriptor = sample_descriptor(tmp.path());
        let runtime = Runtime::new("3.11.4").unwrap();

        let engine = FakeEngine::producing_nothing();
        let err = ArtifactBuilder::new(&engine, &layout)
            .build(&descriptor, &runtime)
            .unwrap_err();
        assert!(matches!(err, BuildError::ArtifactMissing { .. }));
    }

    #[test]
    fn test_build_fails_on_import_probe() {
        let tmp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(tmp.path());
        let descriptor = sample_descriptor(tmp.path());
        let runtime = Runtime::new("3.11.4").unwrap();

        let engine = FakeEngine::producing("sample_pkg-0.0.1a1-py3-none-any.whl")
            .failing_import("sample_pkg");
        let err = ArtifactBuilder::new(&engine, &layout)
            .build(&descriptor, &runtime)
            .unwrap_err();
        match err {
            BuildError::SmokeTestFailed { unit, .. } => assert_eq!(unit, "sample_pkg"),
            other => panic!("expected smoke-test failure, got {other:?}"),
        }
    }

    #[test]
    fn test_build_fails_on_failing_tests() {
        let tmp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(tmp.path());
        let descriptor = sample_descriptor(tmp.path());
        let runtime = Runtime::new("3.11.4").unwrap();

        let engine =
            FakeEngine::producing("sample_pkg-0.0.1a1-py3-none-any.whl").failing_tests();
        let err = ArtifactBuilder::new(&engine, &layout)
            .build(&descriptor, &runtime)
            .unwrap_err();
        match err {
            BuildError::TestsFailed { tool, .. } => assert_eq!(tool, "pytest"),
            other => panic!("expected test failure, got {other:?}"),
        }
    }

    #[test]
    fn test_rebuild_produces_identical_digest() {
        let tmp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(tmp.path());
        let descriptor = sample_descriptor(tmp.path());
        let runtime = Runtime::new("3.11.4").unwrap();

        let engine = FakeEngine::producing("sample_pkg-0.0.1a1-py3-none-any.whl");
        let first = ArtifactBuilder::new(&engine, &layout)
            .build(&descriptor, &runtime)
            .unwrap();
        let second = ArtifactBuilder::new(&engine, &layout)
            .build(&descriptor, &runtime)
            .unwrap();

        assert_eq!(first.digest, second.digest);
        assert_eq!(first.artifact, second.artifact);
    }

    #[test]
    fn test_build_clears_stale_scratch() {
        let tmp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(tmp.path());
        let descriptor = sample_descriptor(tmp.path());
        let runtime = Runtime::new("3.11.4").unwrap();

        let stale = layout.build_dir("py311").join("stale.whl");
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, b"stale").unwrap();

        let engine = FakeEngine::producing("sample_pkg-0.0.1a1-py3-none-any.whl");
        ArtifactBuilder::new(&engine, &layout)
            .build(&descriptor, &runtime)
            .unwrap();

        assert!(!stale.exists());
    }

    #[test]
    fn test_find_wheel_prefers_package_name() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("dep-1.0-py3-none-any.whl"), b"d").unwrap();
        std::fs::write(tmp.path().join("sample_pkg-0.0.1a1-py3-none-any.whl"), b"s").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), b"n").unwrap();

        let found = find_wheel(tmp.path(), "sample_pkg").unwrap().unwrap();
        assert!(found
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("sample_pkg-"));
    }
}
