//! Matrix event types for JSON output.
//!
//! This module defines the stable JSON schema for machine-readable
//! matrix output. These events are emitted when using
//! `--message-format=json`.
//!
//! # Event Types
//!
//! - `matrix-started`: Expansion began, with the axis being built
//! - `runtime-built`: One axis entry finished its full pipeline
//! - `runtime-failed`: One axis entry failed, with stage and message
//! - `matrix-finished`: Expansion completed (success or failure)
//!
//! # Stability
//!
//! New fields may be added, but existing fields should not be removed
//! or renamed.

use std::path::PathBuf;

use serde::Serialize;

/// A matrix event emitted during expansion.
///
/// Each event is serialized as a single JSON object per line.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason")]
pub enum MatrixEvent {
    /// Expansion started.
    #[serde(rename = "matrix-started")]
    MatrixStarted {
        /// Package name
        package: String,
        /// Package version
        version: String,
        /// Axis entry ids, in declaration order
        runtimes: Vec<String>,
    },

    /// One axis entry completed its build, rewrite, and provisioning.
    #[serde(rename = "runtime-built")]
    RuntimeBuilt {
        /// Axis entry id
        runtime: String,
        /// Artifact tag
        tag: String,
        /// Staged artifact path
        artifact: PathBuf,
        /// Entry pipeline duration in milliseconds
        duration_ms: u64,
    },

    /// One axis entry failed.
    #[serde(rename = "runtime-failed")]
    RuntimeFailed {
        /// Axis entry id
        runtime: String,
        /// Pipeline stage that failed ("build", "metadata", "provision")
        stage: String,
        /// Failure message
        message: String,
    },

    /// Expansion finished.
    #[serde(rename = "matrix-finished")]
    MatrixFinished {
        /// Whether every processed entry succeeded
        success: bool,
        /// Entries built
        built: u64,
        /// Entries failed
        failed: u64,
        /// Total expansion duration in milliseconds
        duration_ms: u64,
    },
}

impl MatrixEvent {
    /// Create a matrix started event.
    pub fn started(
        package: impl Into<String>,
        version: impl Into<String>,
        runtimes: Vec<String>,
    ) -> Self {
        MatrixEvent::MatrixStarted {
            package: package.into(),
            version: version.into(),
            runtimes,
        }
    }

    /// Create a runtime built event.
    pub fn built(
        runtime: impl Into<String>,
        tag: impl Into<String>,
        artifact: PathBuf,
        duration_ms: u64,
    ) -> Self {
        MatrixEvent::RuntimeBuilt {
            runtime: runtime.into(),
            tag: tag.into(),
            artifact,
            duration_ms,
        }
    }

    /// Create a runtime failed event.
    pub fn failed(
        runtime: impl Into<String>,
        stage: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        MatrixEvent::RuntimeFailed {
            runtime: runtime.into(),
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create a matrix finished event.
    pub fn finished(success: bool, built: u64, failed: u64, duration_ms: u64) -> Self {
        MatrixEvent::MatrixFinished {
            success,
            built,
            failed,
            duration_ms,
        }
    }

    /// Serialize this event to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_started_serialization() {
        let event = MatrixEvent::started(
            "sample-pkg",
            "0.0.1a1",
            vec!["3.9.18".to_string(), "3.11.4".to_string()],
        );
        let json = event.to_json();
        assert!(json.contains("\"reason\":\"matrix-started\""));
        assert!(json.contains("\"package\":\"sample-pkg\""));
        assert!(json.contains("\"3.9.18\""));
    }

    #[test]
    fn test_built_serialization() {
        let event = MatrixEvent::built(
            "3.11.4",
            "py311",
            PathBuf::from("dist/sample_pkg-0.0.1a1-py311-none-any.whl"),
            840,
        );
        let json = event.to_json();
        assert!(json.contains("\"reason\":\"runtime-built\""));
        assert!(json.contains("py311-none-any.whl"));
        assert!(json.contains("\"duration_ms\":840"));
    }

    #[test]
    fn test_failed_serialization() {
        let event = MatrixEvent::failed("3.9.18", "build", "test suite `pytest` failed");
        let json = event.to_json();
        assert!(json.contains("\"reason\":\"runtime-failed\""));
        assert!(json.contains("\"stage\":\"build\""));
        assert!(json.contains("pytest"));
    }

    #[test]
    fn test_finished_serialization() {
        let event = MatrixEvent::finished(false, 1, 1, 2340);
        let json = event.to_json();
        assert!(json.contains("\"reason\":\"matrix-finished\""));
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("\"built\":1"));
        assert!(json.contains("\"failed\":1"));
    }
}
