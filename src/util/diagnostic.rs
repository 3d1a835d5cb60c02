//! User-friendly diagnostic messages.
//!
//! Every reported failure should carry its root cause, the matrix entry
//! and stage it belongs to, and suggested fixes.

use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Suggestion when a build fails.
    pub const BUILD_FAILED: &str = "Run `slipway build --verbose` for full tool output";

    /// Suggestion when one entry aborts the whole matrix.
    pub const KEEP_GOING: &str =
        "Use `slipway build --keep-going` to collect failures across all runtimes";
}

/// An error report with context lines and suggested fixes.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let prefix = if color {
            "\x1b[1;31merror\x1b[0m"
        } else {
            "error"
        };
        output.push_str(&format!("{}: {}\n", prefix, self.message));

        // Context lines
        for ctx in &self.context {
            output.push_str(&format!("  | {}\n", ctx));
        }

        // Suggestions
        if !self.suggestions.is_empty() {
            output.push('\n');
            let help_prefix = if color {
                "\x1b[1;32mhelp\x1b[0m"
            } else {
                "help"
            };
            output.push_str(&format!("{}: consider:\n", help_prefix));
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Unknown runtime selector error.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("no runtime matching `{selector}` in the version axis")]
#[diagnostic(code(slipway::matrix::runtime_not_found))]
pub struct RuntimeNotFoundError {
    pub selector: String,
    #[help]
    pub available: Option<String>,
}

/// Environment requested for an entry that has not been built.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("runtime `{runtime}` has not been built")]
#[diagnostic(
    code(slipway::env::not_built),
    help("Run `slipway build` to produce the artifact first")
)]
pub struct NotBuiltError {
    pub runtime: String,
    pub expected_artifact: PathBuf,
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}

/// Print an error message with context and suggestions.
pub fn emit_error(message: &str, context: &[&str], suggestions: &[&str], color: bool) {
    let mut diag = Diagnostic::error(message);
    for ctx in context {
        diag = diag.with_context(*ctx);
    }
    for sug in suggestions {
        diag = diag.with_suggestion(*sug);
    }
    emit(&diag, color);
}
