//! Process-backed build engine driving a Python interpreter.
//!
//! Every operation shells out to the interpreter selected for the
//! runtime entry: `pip show` to verify declared tools, `pip wheel` to
//! produce the artifact, `pip install --target` to populate the
//! installed tree, `-c` one-liners for import probes, and `-m <tool>`
//! for the test suite.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::builder::engine::{
    BuildEngine, BuildRequest, ProbeFailure, ProbeReport, TestReport, ToolAvailability,
};
use crate::core::runtime::Runtime;
use crate::util::config::Config;
use crate::util::process::{find_interpreter, ProcessBuilder};

/// 1980-01-01 in seconds, the zip timestamp floor. Pinning it makes
/// repeated builds of the same source byte-identical.
const SOURCE_DATE_EPOCH: &str = "315532800";

/// BuildEngine implementation backed by real interpreter processes.
pub struct InterpreterEngine {
    config: Config,
}

impl InterpreterEngine {
    /// Create an engine using the given configuration for interpreter
    /// overrides.
    pub fn new(config: Config) -> Self {
        InterpreterEngine { config }
    }

    /// The program to run for a runtime: a configured override if one
    /// exists, otherwise the runtime's derived interpreter name.
    fn program_for(&self, runtime: &Runtime) -> String {
        self.config
            .interpreter_for(&runtime.id(), runtime.tag())
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| runtime.interpreter().to_string())
    }

    /// Resolve the interpreter for a runtime, failing if it is absent.
    fn require(&self, runtime: &Runtime) -> Result<PathBuf> {
        let program = self.program_for(runtime);
        find_interpreter(&program).with_context(|| {
            format!(
                "interpreter `{}` for runtime {} is not available",
                program,
                runtime.id()
            )
        })
    }

    /// A pip invocation with the environment pinned for reproducible
    /// output.
    fn pip(&self, interpreter: &Path, subcommand: &str) -> ProcessBuilder {
        ProcessBuilder::new(interpreter)
            .args(["-m", "pip", subcommand, "--no-deps", "--disable-pip-version-check"])
            .env("SOURCE_DATE_EPOCH", SOURCE_DATE_EPOCH)
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .env_remove("PYTHONPATH")
    }
}

impl BuildEngine for InterpreterEngine {
    fn availability(&self, runtime: &Runtime) -> Result<ToolAvailability> {
        let program = self.program_for(runtime);
        let Some(interpreter) = find_interpreter(&program) else {
            return Ok(ToolAvailability::NotInstalled {
                program,
                install_hint: format!(
                    "Install Python {} or map `{}` under [interpreters] in the slipway config.",
                    runtime.major_minor(),
                    runtime.id()
                ),
            });
        };

        let output = ProcessBuilder::new(&interpreter).arg("--version").exec()?;
        // Older interpreters print the version line to stderr.
        let mut reported = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if reported.is_empty() {
            reported = String::from_utf8_lossy(&output.stderr).trim().to_string();
        }

        let required = runtime.major_minor();
        match parse_version_line(&reported) {
            Some(version) if version_matches(&version, &required) => {
                Ok(ToolAvailability::Available {
                    interpreter,
                    version,
                })
            }
            Some(version) => Ok(ToolAvailability::WrongVersion {
                interpreter,
                found: version,
                required,
            }),
            None => Ok(ToolAvailability::WrongVersion {
                interpreter,
                found: if reported.is_empty() {
                    "unknown".to_string()
                } else {
                    reported
                },
                required,
            }),
        }
    }

    fn missing_tools(&self, request: &BuildRequest, runtime: &Runtime) -> Result<Vec<String>> {
        let interpreter = self.require(runtime)?;
        let mut missing = Vec::new();
        // `pip show` exits nonzero when the distribution is absent.
        for tool in request.build_tools.iter().chain(&request.test_tools) {
            tracing::debug!("checking declared tool `{}`", tool);
            let output = ProcessBuilder::new(&interpreter)
                .args(["-m", "pip", "show", "--quiet", "--disable-pip-version-check", tool])
                .env("PYTHONDONTWRITEBYTECODE", "1")
                .env_remove("PYTHONPATH")
                .exec()?;
            if !output.status.success() {
                missing.push(tool.clone());
            }
        }
        Ok(missing)
    }

    fn build_artifact(&self, request: &BuildRequest, runtime: &Runtime) -> Result<()> {
        let interpreter = self.require(runtime)?;
        let cmd = self
            .pip(&interpreter, "wheel")
            .arg("--wheel-dir")
            .arg(&request.work_dir)
            .arg(&request.source_root)
            .cwd(&request.source_root);

        tracing::debug!("running `{}`", cmd.display_command());
        cmd.exec_and_check()?;
        Ok(())
    }

    fn install_artifact(
        &self,
        request: &BuildRequest,
        runtime: &Runtime,
        artifact: &Path,
    ) -> Result<()> {
        let interpreter = self.require(runtime)?;
        let cmd = self
            .pip(&interpreter, "install")
            .arg("--no-compile")
            .arg("--target")
            .arg(&request.site_dir)
            .arg(artifact)
            .cwd(&request.work_dir);

        tracing::debug!("running `{}`", cmd.display_command());
        cmd.exec_and_check()?;
        Ok(())
    }

    fn probe_imports(
        &self,
        request: &BuildRequest,
        runtime: &Runtime,
        units: &[String],
    ) -> Result<ProbeReport> {
        let interpreter = self.require(runtime)?;
        let mut report = ProbeReport::default();

        for unit in units {
            let probe = format!("import importlib; importlib.import_module('{}')", unit);
            // Probe from the scratch directory so the source tree
            // cannot shadow the installed copy.
            let cmd = ProcessBuilder::new(&interpreter)
                .args(["-c", &probe])
                .env("PYTHONPATH", request.site_dir.display().to_string())
                .env("PYTHONDONTWRITEBYTECODE", "1")
                .cwd(&request.work_dir);

            tracing::debug!("probing import `{}`", unit);
            let output = cmd.exec()?;
            if !output.status.success() {
                report.failures.push(ProbeFailure {
                    unit: unit.clone(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
        }

        Ok(report)
    }

    fn run_tests(
        &self,
        request: &BuildRequest,
        runtime: &Runtime,
        tool: &str,
    ) -> Result<TestReport> {
        let interpreter = self.require(runtime)?;
        let cmd = ProcessBuilder::new(&interpreter)
            .args(["-m", tool])
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .cwd(&request.source_root);

        tracing::debug!("running `{}`", cmd.display_command());
        let output = cmd.exec()?;

        let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !captured.is_empty() {
                captured.push('\n');
            }
            captured.push_str(stderr.trim_end());
        }

        Ok(TestReport {
            tool: tool.to_string(),
            ok: output.status.success(),
            output: captured,
        })
    }
}

/// Extract the version token from interpreter output like
/// "Python 3.11.4".
fn parse_version_line(text: &str) -> Option<String> {
    text.split_whitespace()
        .find(|token| token.starts_with(|c: char| c.is_ascii_digit()))
        .map(|token| token.to_string())
}

/// Check a reported version against a required major.minor prefix.
fn version_matches(reported: &str, major_minor: &str) -> bool {
    reported == major_minor || reported.starts_with(&format!("{}.", major_minor))
}
