//! BuildEngine trait definition and result types.
//!
//! The BuildEngine trait defines the interface between the build
//! pipeline and the runtime's toolchain. Operations only - mapping
//! outcomes onto failures is done by the pipeline.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::runtime::Runtime;

/// Toolchain availability status for one runtime.
#[derive(Debug, Clone)]
pub enum ToolAvailability {
    /// Interpreter is present and reports the expected version line
    Available {
        /// Resolved interpreter path
        interpreter: PathBuf,
        /// Version reported by the interpreter (e.g., "3.11.4")
        version: String,
    },

    /// Interpreter is not installed
    NotInstalled {
        /// Name of the missing program (e.g., "python3.11")
        program: String,
        /// Hint for how to make it available
        install_hint: String,
    },

    /// Interpreter exists but reports a different version line
    WrongVersion {
        /// Resolved interpreter path
        interpreter: PathBuf,
        /// Version the interpreter reported
        found: String,
        /// Major.minor the runtime entry requires
        required: String,
    },
}

impl ToolAvailability {
    /// Check if the toolchain is usable.
    pub fn is_available(&self) -> bool {
        matches!(self, ToolAvailability::Available { .. })
    }

    /// Get error message if not usable.
    pub fn error_message(&self) -> Option<String> {
        match self {
            ToolAvailability::Available { .. } => None,
            ToolAvailability::NotInstalled {
                program,
                install_hint,
            } => Some(format!("{} not found. {}", program, install_hint)),
            ToolAvailability::WrongVersion {
                interpreter,
                found,
                required,
            } => Some(format!(
                "{} reports version {}, but {} is required",
                interpreter.display(),
                found,
                required
            )),
        }
    }
}

/// Build context passed to engine operations.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Package source root (where the package's own build files live)
    pub source_root: PathBuf,

    /// Per-runtime scratch directory
    pub work_dir: PathBuf,

    /// Site-packages directory inside the per-runtime installed tree
    pub site_dir: PathBuf,

    /// Auxiliary tools the package declares for its build
    pub build_tools: Vec<String>,

    /// Tools the package's test suite runs with
    pub test_tools: Vec<String>,

    /// Parallel job count hint
    pub jobs: Option<usize>,

    /// Verbose output
    pub verbose: bool,
}

impl BuildRequest {
    /// Create a new build request.
    pub fn new(source_root: PathBuf, work_dir: PathBuf, site_dir: PathBuf) -> Self {
        BuildRequest {
            source_root,
            work_dir,
            site_dir,
            build_tools: Vec::new(),
            test_tools: Vec::new(),
            jobs: None,
            verbose: false,
        }
    }

    /// Set the declared auxiliary build tools.
    pub fn with_build_tools(mut self, tools: Vec<String>) -> Self {
        self.build_tools = tools;
        self
    }

    /// Set the declared test tools.
    pub fn with_test_tools(mut self, tools: Vec<String>) -> Self {
        self.test_tools = tools;
        self
    }

    /// Set job count.
    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Result of probing importable units in the installed tree.
#[derive(Debug, Clone, Default)]
pub struct ProbeReport {
    /// Units that failed to import
    pub failures: Vec<ProbeFailure>,
}

impl ProbeReport {
    /// Check if every probed unit imported cleanly.
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A single failed import probe.
#[derive(Debug, Clone)]
pub struct ProbeFailure {
    /// The unit that failed to import
    pub unit: String,

    /// Captured interpreter stderr
    pub stderr: String,
}

/// Result of a test-suite run.
#[derive(Debug, Clone)]
pub struct TestReport {
    /// Tool the suite was run with (e.g., "pytest")
    pub tool: String,

    /// Whether the suite passed
    pub ok: bool,

    /// Captured output (stdout and stderr, merged)
    pub output: String,
}

impl TestReport {
    /// Check if the suite passed.
    pub fn success(&self) -> bool {
        self.ok
    }
}

/// BuildEngine trait - interface to a runtime's toolchain.
///
/// The engine trait is purely operational: it runs the toolchain and
/// reports what happened. Deciding whether an outcome fails the build
/// is the pipeline's job.
pub trait BuildEngine: Send + Sync {
    /// Check if the runtime's interpreter is available and matches.
    ///
    /// This may run processes (e.g., `python3.11 --version`) and should
    /// be called once per runtime before any other operation.
    fn availability(&self, runtime: &Runtime) -> Result<ToolAvailability>;

    /// Report which of the request's declared tools are absent for the
    /// runtime. An empty list means every declared tool is present.
    fn missing_tools(&self, request: &BuildRequest, runtime: &Runtime) -> Result<Vec<String>>;

    /// Produce the distributable artifact into the scratch directory.
    fn build_artifact(&self, request: &BuildRequest, runtime: &Runtime) -> Result<()>;

    /// Install a built artifact into the request's site directory.
    fn install_artifact(
        &self,
        request: &BuildRequest,
        runtime: &Runtime,
        artifact: &Path,
    ) -> Result<()>;

    /// Probe that each unit imports from the installed tree.
    fn probe_imports(
        &self,
        request: &BuildRequest,
        runtime: &Runtime,
        units: &[String],
    ) -> Result<ProbeReport>;

    /// Run the package's test suite with the given tool.
    fn run_tests(
        &self,
        request: &BuildRequest,
        runtime: &Runtime,
        tool: &str,
    ) -> Result<TestReport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_availability() {
        let avail = ToolAvailability::Available {
            interpreter: PathBuf::from("/usr/bin/python3.11"),
            version: "3.11.4".to_string(),
        };
        assert!(avail.is_available());
        assert!(avail.error_message().is_none());

        let not_installed = ToolAvailability::NotInstalled {
            program: "python3.11".to_string(),
            install_hint: "install Python 3.11 or map it in [interpreters]".to_string(),
        };
        assert!(!not_installed.is_available());
        assert!(not_installed
            .error_message()
            .unwrap()
            .contains("python3.11 not found"));

        let wrong = ToolAvailability::WrongVersion {
            interpreter: PathBuf::from("/usr/bin/python3"),
            found: "3.12.1".to_string(),
            required: "3.11".to_string(),
        };
        assert!(!wrong.is_available());
        let message = wrong.error_message().unwrap();
        assert!(message.contains("3.12.1"));
        assert!(message.contains("3.11"));
    }

    #[test]
    fn test_build_request() {
        let request = BuildRequest::new(
            PathBuf::from("/src"),
            PathBuf::from("/work"),
            PathBuf::from("/site"),
        )
        .with_build_tools(vec!["setuptools".to_string()])
        .with_test_tools(vec!["pytest".to_string()])
        .with_jobs(Some(4))
        .with_verbose(true);

        assert_eq!(request.build_tools, ["setuptools"]);
        assert_eq!(request.test_tools, ["pytest"]);
        assert_eq!(request.jobs, Some(4));
        assert!(request.verbose);
    }

    #[test]
    fn test_probe_report() {
        let clean = ProbeReport::default();
        assert!(clean.success());

        let failed = ProbeReport {
            failures: vec![ProbeFailure {
                unit: "sample_pkg".to_string(),
                stderr: "ModuleNotFoundError: No module named 'sample_pkg'".to_string(),
            }],
        };
        assert!(!failed.success());
    }
}
