//! Test utilities and fakes for slipway unit tests.
//!
//! The pipeline and matrix tests run against [`FakeEngine`], an
//! in-memory stand-in for the interpreter toolchain. It fabricates
//! wheels and dist-info trees on the real filesystem (tests hand it a
//! tempdir-backed layout) without ever spawning a process, and every
//! failure the real toolchain can produce is scriptable.
//!
//! # Example
//!
//! ```rust,ignore
//! use slipway::test_support::FakeEngine;
//!
//! let engine = FakeEngine::producing("sample_pkg-0.0.1a1-py3-none-any.whl")
//!     .failing_tests();
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::builder::engine::{
    BuildEngine, BuildRequest, ProbeFailure, ProbeReport, TestReport, ToolAvailability,
};
use crate::core::runtime::Runtime;

/// A scripted build engine.
///
/// By default it behaves like a healthy toolchain: the interpreter is
/// available, the build drops the configured wheel into the scratch
/// directory, installation writes a dist-info tree with a provenance
/// record, probes pass, and the test suite passes.
#[derive(Debug, Clone)]
pub struct FakeEngine {
    wheel: Option<String>,
    available: bool,
    absent_tools: Vec<String>,
    failing_units: Vec<String>,
    tests_pass: bool,
    fail_build_runtime: Option<String>,
    write_provenance: bool,
    corrupt_provenance: bool,
}

impl FakeEngine {
    /// A healthy engine that produces the named wheel.
    pub fn producing(wheel: &str) -> Self {
        FakeEngine {
            wheel: Some(wheel.to_string()),
            available: true,
            absent_tools: Vec::new(),
            failing_units: Vec::new(),
            tests_pass: true,
            fail_build_runtime: None,
            write_provenance: true,
            corrupt_provenance: false,
        }
    }

    /// An engine whose build exits cleanly but leaves nothing behind.
    pub fn producing_nothing() -> Self {
        FakeEngine {
            wheel: None,
            ..Self::producing("")
        }
    }

    /// Make the interpreter unavailable.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Make one declared tool report as absent.
    pub fn missing_tool(mut self, tool: &str) -> Self {
        self.absent_tools.push(tool.to_string());
        self
    }

    /// Make the import probe fail for one unit.
    pub fn failing_import(mut self, unit: &str) -> Self {
        self.failing_units.push(unit.to_string());
        self
    }

    /// Make the test suite fail.
    pub fn failing_tests(mut self) -> Self {
        self.tests_pass = false;
        self
    }

    /// Make the build step fail for one runtime id.
    pub fn fail_build_for(mut self, runtime: &str) -> Self {
        self.fail_build_runtime = Some(runtime.to_string());
        self
    }

    /// Skip writing the provenance record during install.
    pub fn without_provenance(mut self) -> Self {
        self.write_provenance = false;
        self
    }

    /// Write an unparseable provenance record during install.
    pub fn corrupt_provenance(mut self) -> Self {
        self.corrupt_provenance = true;
        self
    }
}

impl BuildEngine for FakeEngine {
    fn availability(&self, runtime: &Runtime) -> Result<ToolAvailability> {
        if self.available {
            Ok(ToolAvailability::Available {
                interpreter: PathBuf::from(format!("/usr/bin/{}", runtime.interpreter())),
                version: runtime.id(),
            })
        } else {
            Ok(ToolAvailability::NotInstalled {
                program: runtime.interpreter().to_string(),
                install_hint: "unavailable in this test".to_string(),
            })
        }
    }

    fn missing_tools(&self, request: &BuildRequest, _runtime: &Runtime) -> Result<Vec<String>> {
        Ok(request
            .build_tools
            .iter()
            .chain(&request.test_tools)
            .filter(|tool| self.absent_tools.contains(tool))
            .cloned()
            .collect())
    }

    fn build_artifact(&self, request: &BuildRequest, runtime: &Runtime) -> Result<()> {
        if self.fail_build_runtime.as_deref() == Some(runtime.id().as_str()) {
            bail!("scripted build failure for runtime {}", runtime.id());
        }
        if let Some(wheel) = &self.wheel {
            std::fs::write(
                request.work_dir.join(wheel),
                format!("fake wheel built with {}", runtime.interpreter()),
            )?;
        }
        Ok(())
    }

    fn install_artifact(
        &self,
        request: &BuildRequest,
        _runtime: &Runtime,
        artifact: &Path,
    ) -> Result<()> {
        // Mirror pip: dist-info is named from the wheel's first two
        // name segments.
        let file_name = artifact
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let mut segments = file_name.split('-');
        let (Some(name), Some(version)) = (segments.next(), segments.next()) else {
            bail!("unparseable wheel name: {file_name}");
        };

        let package_dir = request.site_dir.join(name);
        std::fs::create_dir_all(&package_dir)?;
        std::fs::write(package_dir.join("__init__.py"), "")?;

        let dist_info = request.site_dir.join(format!("{name}-{version}.dist-info"));
        std::fs::create_dir_all(&dist_info)?;
        std::fs::write(
            dist_info.join("METADATA"),
            format!("Name: {name}\nVersion: {version}\n"),
        )?;

        if self.corrupt_provenance {
            std::fs::write(dist_info.join("direct_url.json"), "{broken")?;
        } else if self.write_provenance {
            let record = serde_json::json!({
                "url": format!("file://{}", artifact.display()),
                "archive_info": {},
            });
            std::fs::write(
                dist_info.join("direct_url.json"),
                serde_json::to_vec_pretty(&record)?,
            )?;
        }
        Ok(())
    }

    fn probe_imports(
        &self,
        _request: &BuildRequest,
        _runtime: &Runtime,
        units: &[String],
    ) -> Result<ProbeReport> {
        let failures = units
            .iter()
            .filter(|unit| self.failing_units.contains(unit))
            .map(|unit| ProbeFailure {
                unit: unit.clone(),
                stderr: format!("ModuleNotFoundError: No module named '{unit}'"),
            })
            .collect();
        Ok(ProbeReport { failures })
    }

    fn run_tests(
        &self,
        _request: &BuildRequest,
        _runtime: &Runtime,
        tool: &str,
    ) -> Result<TestReport> {
        Ok(TestReport {
            tool: tool.to_string(),
            ok: self.tests_pass,
            output: if self.tests_pass {
                "4 passed".to_string()
            } else {
                "1 failed, 3 passed".to_string()
            },
        })
    }
}
