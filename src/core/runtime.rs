//! The version axis: supported runtime entries and their registry.
//!
//! Axis entries are enumerated once at startup (from the manifest) and
//! never change during a run. Each entry pairs a full interpreter
//! version with an artifact tag and the interpreter program used to
//! drive builds for that entry.

use semver::Version;
use thiserror::Error;

/// Errors from axis construction.
#[derive(Debug, Error)]
pub enum AxisError {
    #[error("version axis must contain at least one runtime")]
    Empty,

    #[error("invalid runtime version `{version}`: {source}")]
    InvalidVersion {
        version: String,
        source: semver::Error,
    },

    #[error("duplicate runtime `{id}` in version axis")]
    DuplicateId { id: String },

    #[error("duplicate runtime tag `{tag}` in version axis")]
    DuplicateTag { tag: String },

    #[error("axis default `{default}` does not match any runtime (available: {available})")]
    UnknownDefault { default: String, available: String },
}

/// One supported runtime version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Runtime {
    version: Version,
    tag: String,
    interpreter: String,
}

impl Runtime {
    /// Create a runtime from a `major.minor.patch` version string.
    ///
    /// The artifact tag defaults to `py{major}{minor}` and the
    /// interpreter program to `python{major}.{minor}`.
    pub fn new(version: &str) -> Result<Self, AxisError> {
        let parsed: Version = version.parse().map_err(|source| AxisError::InvalidVersion {
            version: version.to_string(),
            source,
        })?;
        let tag = format!("py{}{}", parsed.major, parsed.minor);
        let interpreter = format!("python{}.{}", parsed.major, parsed.minor);
        Ok(Runtime {
            version: parsed,
            tag,
            interpreter,
        })
    }

    /// Override the artifact tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Override the interpreter program (name or path).
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Axis lookup key: the full version string, e.g. "3.11.4".
    pub fn id(&self) -> String {
        self.version.to_string()
    }

    /// Full interpreter version.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Artifact tag, e.g. "py311".
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Interpreter program name or path.
    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    /// The `major.minor` prefix, e.g. "3.11".
    pub fn major_minor(&self) -> String {
        format!("{}.{}", self.version.major, self.version.minor)
    }

    /// Identifier embedded in provisioned environments, e.g.
    /// "python-3.11.4".
    pub fn identifier(&self) -> String {
        format!("python-{}", self.version)
    }
}

/// The finite, explicit set of supported runtimes.
///
/// Holds the ordered entries, the designated default entry (the
/// "latest" alias target) and the registry identity string exported
/// into provisioned environments.
#[derive(Debug, Clone)]
pub struct RuntimeAxis {
    entries: Vec<Runtime>,
    default_id: String,
    identity: String,
}

impl RuntimeAxis {
    /// Build an axis, validating entry uniqueness and the default.
    pub fn new(
        entries: Vec<Runtime>,
        default_id: impl Into<String>,
        identity: impl Into<String>,
    ) -> Result<Self, AxisError> {
        if entries.is_empty() {
            return Err(AxisError::Empty);
        }

        for (i, entry) in entries.iter().enumerate() {
            for earlier in &entries[..i] {
                if earlier.id() == entry.id() {
                    return Err(AxisError::DuplicateId { id: entry.id() });
                }
                if earlier.tag() == entry.tag() {
                    return Err(AxisError::DuplicateTag {
                        tag: entry.tag().to_string(),
                    });
                }
            }
        }

        let default_id = default_id.into();
        if !entries.iter().any(|e| e.id() == default_id) {
            let available = entries
                .iter()
                .map(Runtime::id)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(AxisError::UnknownDefault {
                default: default_id,
                available,
            });
        }

        Ok(RuntimeAxis {
            entries,
            default_id,
            identity: identity.into(),
        })
    }

    /// Entries in declaration order.
    pub fn entries(&self) -> &[Runtime] {
        &self.entries
    }

    /// Number of axis entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: construction rejects empty axes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Id of the designated default entry.
    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    /// The designated default entry.
    pub fn default_runtime(&self) -> &Runtime {
        // Validated present at construction.
        self.entries
            .iter()
            .find(|e| e.id() == self.default_id)
            .unwrap_or(&self.entries[0])
    }

    /// Registry identity string, e.g. "github:acme/sample-pkg".
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Look up an entry by exact id.
    pub fn get(&self, id: &str) -> Option<&Runtime> {
        self.entries.iter().find(|e| e.id() == id)
    }

    /// Resolve a user-supplied selector to exactly one entry.
    ///
    /// Matches the full id, the tag, or the `major.minor` prefix;
    /// ambiguous or unknown selectors yield `None`.
    pub fn select(&self, selector: &str) -> Option<&Runtime> {
        let matches: Vec<&Runtime> = self
            .entries
            .iter()
            .filter(|e| {
                e.id() == selector || e.tag() == selector || e.major_minor() == selector
            })
            .collect();
        match matches.as_slice() {
            [single] => Some(single),
            _ => None,
        }
    }

    /// One-line summary of the axis for error help text.
    pub fn summary(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{} ({})", e.id(), e.tag()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis() -> RuntimeAxis {
        RuntimeAxis::new(
            vec![
                Runtime::new("3.9.18").unwrap(),
                Runtime::new("3.11.4").unwrap(),
            ],
            "3.11.4",
            "github:acme/sample-pkg",
        )
        .unwrap()
    }

    #[test]
    fn test_runtime_defaults_derive_from_version() {
        let rt = Runtime::new("3.11.4").unwrap();
        assert_eq!(rt.id(), "3.11.4");
        assert_eq!(rt.tag(), "py311");
        assert_eq!(rt.interpreter(), "python3.11");
        assert_eq!(rt.major_minor(), "3.11");
        assert_eq!(rt.identifier(), "python-3.11.4");
    }

    #[test]
    fn test_runtime_overrides() {
        let rt = Runtime::new("3.9.18")
            .unwrap()
            .with_tag("cp39")
            .with_interpreter("/opt/python3.9/bin/python");
        assert_eq!(rt.tag(), "cp39");
        assert_eq!(rt.interpreter(), "/opt/python3.9/bin/python");
    }

    #[test]
    fn test_runtime_requires_full_version() {
        assert!(matches!(
            Runtime::new("3.11"),
            Err(AxisError::InvalidVersion { .. })
        ));
    }

    #[test]
    fn test_axis_rejects_empty() {
        let result = RuntimeAxis::new(vec![], "3.11.4", "id");
        assert!(matches!(result, Err(AxisError::Empty)));
    }

    #[test]
    fn test_axis_rejects_duplicates() {
        let result = RuntimeAxis::new(
            vec![
                Runtime::new("3.11.4").unwrap(),
                Runtime::new("3.11.4").unwrap(),
            ],
            "3.11.4",
            "id",
        );
        assert!(matches!(result, Err(AxisError::DuplicateId { .. })));

        let result = RuntimeAxis::new(
            vec![
                Runtime::new("3.11.4").unwrap(),
                Runtime::new("3.11.9").unwrap(),
            ],
            "3.11.4",
            "id",
        );
        assert!(matches!(result, Err(AxisError::DuplicateTag { .. })));
    }

    #[test]
    fn test_axis_rejects_unknown_default() {
        let result = RuntimeAxis::new(vec![Runtime::new("3.11.4").unwrap()], "3.12.0", "id");
        assert!(matches!(result, Err(AxisError::UnknownDefault { .. })));
    }

    #[test]
    fn test_axis_selection() {
        let axis = axis();
        assert_eq!(axis.select("3.11.4").unwrap().tag(), "py311");
        assert_eq!(axis.select("py39").unwrap().id(), "3.9.18");
        assert_eq!(axis.select("3.9").unwrap().id(), "3.9.18");
        assert!(axis.select("3.12").is_none());
    }

    #[test]
    fn test_axis_default_runtime() {
        let axis = axis();
        assert_eq!(axis.default_runtime().id(), "3.11.4");
        assert_eq!(axis.default_id(), "3.11.4");
    }
}
