//! Diagnostic data model shared by every analyzer adapter
//!
//! Adapters produce `ValidationError`/`ValidationWarning` records and fold
//! them into a `ValidationResult`. Records are immutable after creation;
//! the classifier annotates by producing new records, never in place.

use serde::{Deserialize, Serialize};

/// Category of a diagnostic, matching the stage that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Type-check or lint diagnostics
    Syntax,
    /// Compilation/bundling failures
    Build,
    /// Missing packages or unresolvable modules
    Dependency,
    /// A validation step itself failed (tool crash, timeout)
    Runtime,
}

impl ErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Syntax => "syntax",
            ErrorKind::Build => "build",
            ErrorKind::Dependency => "dependency",
            ErrorKind::Runtime => "runtime",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single blocking diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub kind: ErrorKind,
    /// Project-relative path as reported by the tool
    pub file: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub message: String,
    /// Rule or diagnostic code when the tool provides one
    pub rule: Option<String>,
    pub severity: Severity,
    /// Whether the pipeline believes it can repair this automatically
    pub fixable: bool,
}

impl ValidationError {
    pub fn new(kind: ErrorKind, file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            file: file.into(),
            line: None,
            column: None,
            message: message.into(),
            rule: None,
            severity: Severity::Error,
            fixable: false,
        }
    }

    pub fn with_location(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    pub fn fixable(mut self) -> Self {
        self.fixable = true;
        self
    }

    /// Produce an annotated copy. Enhancement never mutates the original
    /// record.
    pub fn with_appended_message(&self, extra: &str) -> Self {
        let mut copy = self.clone();
        copy.message = format!("{}\n{}", copy.message, extra);
        copy
    }

    /// Display location like `app/page.tsx:12:5`, omitting missing parts.
    pub fn location(&self) -> String {
        match (self.line, self.column) {
            (Some(line), Some(col)) => format!("{}:{}:{}", self.file, line, col),
            (Some(line), None) => format!("{}:{}", self.file, line),
            _ => self.file.clone(),
        }
    }
}

/// An informational diagnostic; never blocks validity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub kind: ErrorKind,
    pub file: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub message: String,
    pub rule: Option<String>,
}

impl ValidationWarning {
    pub fn new(kind: ErrorKind, file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            file: file.into(),
            line: None,
            column: None,
            message: message.into(),
            rule: None,
        }
    }

    pub fn with_location(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }
}

/// Outcome of one analysis pass (or a merge of several).
///
/// Invariants are maintained by construction: `is_valid` iff no errors,
/// `fixable_errors` is the fixable subset of `errors`, `can_auto_fix` iff
/// that subset is non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub fixable_errors: Vec<ValidationError>,
    pub can_auto_fix: bool,
}

impl ValidationResult {
    /// A result with no diagnostics at all.
    pub fn valid() -> Self {
        Self::from_parts(Vec::new(), Vec::new())
    }

    /// The only way to build a result; derives the invariant fields.
    pub fn from_parts(errors: Vec<ValidationError>, warnings: Vec<ValidationWarning>) -> Self {
        let fixable_errors: Vec<ValidationError> =
            errors.iter().filter(|e| e.fixable).cloned().collect();
        Self {
            is_valid: errors.is_empty(),
            can_auto_fix: !fixable_errors.is_empty(),
            errors,
            warnings,
            fixable_errors,
        }
    }

    /// Fold several adapter results into one.
    pub fn merge(results: impl IntoIterator<Item = ValidationResult>) -> Self {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        for result in results {
            errors.extend(result.errors);
            warnings.extend(result.warnings);
        }
        Self::from_parts(errors, warnings)
    }

    /// Rebuild with a replacement error list (used after enhancement).
    pub fn with_errors(self, errors: Vec<ValidationError>) -> Self {
        Self::from_parts(errors, self.warnings)
    }
}

/// Outcome of one auto-fix invocation. Not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixResult {
    pub success: bool,
    pub fixed_errors: Vec<ValidationError>,
    pub remaining_errors: Vec<ValidationError>,
    /// Deduplicated, in first-seen order
    pub changed_files: Vec<String>,
}
