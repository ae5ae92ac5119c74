//! Error classification: recovery suggestions and dominant-pattern
//! detection
//!
//! Both classifiers are ordered tables of (signatures, action) pairs so
//! each rule can be unit-tested on its own.

use crate::config::ValidatorConfig;
use crate::model::ValidationError;

/// A suggestion category: message signatures plus the recovery hints
/// appended when one matches. Only the first matching category applies.
pub struct SuggestionRule {
    pub category: &'static str,
    pub signatures: &'static [&'static str],
    pub suggestions: &'static [&'static str],
}

pub const SUGGESTION_RULES: &[SuggestionRule] = &[
    SuggestionRule {
        category: "jsx_structure",
        signatures: &[
            "JSX element",
            "Adjacent JSX",
            "has no corresponding closing tag",
            "JSX fragment",
            "Unexpected token <",
        ],
        suggestions: &[
            "Check that every opened JSX tag has a matching closing tag",
            "Wrap sibling elements in a single parent or fragment (<>...</>)",
            "Self-close void elements like <img /> and <input />",
        ],
    },
    SuggestionRule {
        category: "incomplete_expression",
        signatures: &[
            "Expression expected",
            "Unexpected end of file",
            "',' expected",
            "Unterminated string",
        ],
        suggestions: &[
            "Complete the statement on the reported line",
            "Check the end of the previous line for a dangling operator or comma",
        ],
    },
    SuggestionRule {
        category: "missing_brackets",
        signatures: &["'}' expected", "')' expected", "']' expected", "Unexpected token }"],
        suggestions: &[
            "Count opening and closing braces in the enclosing block",
            "Close the innermost unclosed brace/paren/bracket before this line",
        ],
    },
    SuggestionRule {
        category: "import_export",
        signatures: &[
            "has no exported member",
            "has no default export",
            "Cannot find module",
            "is not a module",
        ],
        suggestions: &[
            "Check the exported name's spelling against the source module",
            "Switch between default and named import to match the export",
            "Verify the module path relative to this file",
        ],
    },
    SuggestionRule {
        category: "duplicate_declaration",
        signatures: &[
            "Duplicate identifier",
            "has already been declared",
            "Duplicate export",
            "Cannot redeclare",
        ],
        suggestions: &[
            "Remove the duplicate declaration, keeping the most complete one",
            "Rename one of the declarations if both are needed",
        ],
    },
];

/// Drop vendor-path diagnostics, then append the first matching
/// category's recovery suggestions to each remaining error. Produces new
/// records; the inputs are never mutated.
pub fn enhance_error_context(
    errors: &[ValidationError],
    config: &ValidatorConfig,
) -> Vec<ValidationError> {
    errors
        .iter()
        .filter(|error| !error.file.contains(&config.excluded_path_marker))
        .map(|error| match matching_rule(&error.message) {
            Some(rule) => {
                let bullets = rule
                    .suggestions
                    .iter()
                    .map(|s| format!("- {}", s))
                    .collect::<Vec<_>>()
                    .join("\n");
                error.with_appended_message(&format!("Recovery suggestions:\n{}", bullets))
            }
            None => error.clone(),
        })
        .collect()
}

fn matching_rule(message: &str) -> Option<&'static SuggestionRule> {
    SUGGESTION_RULES
        .iter()
        .find(|rule| rule.signatures.iter().any(|sig| message.contains(sig)))
}

/// Failure category accounting for a majority of diagnostics in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPattern {
    DuplicateCode,
    JsxStructure,
    MissingBrackets,
    ImportExport,
    MixedIssues,
}

impl ErrorPattern {
    /// One guidance sentence prefixed to the verbose report.
    pub fn guidance(&self) -> &'static str {
        match self {
            ErrorPattern::DuplicateCode => {
                "Most errors stem from duplicated declarations; remove the duplicates before anything else."
            }
            ErrorPattern::JsxStructure => {
                "Most errors stem from malformed JSX structure; fix tag nesting and closing first."
            }
            ErrorPattern::MissingBrackets => {
                "Most errors stem from unbalanced brackets; balance braces and parens first."
            }
            ErrorPattern::ImportExport => {
                "Most errors stem from import/export mismatches; align imports with the actual exports first."
            }
            ErrorPattern::MixedIssues => {
                "Errors are mixed; address them file by file starting with the first."
            }
        }
    }
}

const DOMINANT_THRESHOLD: f64 = 0.6;

const PATTERN_SIGNATURES: &[(ErrorPattern, &[&str])] = &[
    (
        ErrorPattern::DuplicateCode,
        &["Duplicate identifier", "has already been declared", "Duplicate export", "Cannot redeclare"],
    ),
    (
        ErrorPattern::JsxStructure,
        &["JSX", "closing tag"],
    ),
    (
        ErrorPattern::MissingBrackets,
        &["'}' expected", "')' expected", "']' expected", "Unexpected end of file"],
    ),
    (
        ErrorPattern::ImportExport,
        &["has no exported member", "has no default export", "Cannot find module", "is not a module"],
    ),
];

/// Report the category exceeding 60% of all errors, if any.
pub fn detect_error_pattern(errors: &[ValidationError]) -> ErrorPattern {
    if errors.is_empty() {
        return ErrorPattern::MixedIssues;
    }
    let total = errors.len() as f64;
    for (pattern, signatures) in PATTERN_SIGNATURES {
        let matching = errors
            .iter()
            .filter(|e| signatures.iter().any(|sig| e.message.contains(sig)))
            .count() as f64;
        if matching / total > DOMINANT_THRESHOLD {
            return *pattern;
        }
    }
    ErrorPattern::MixedIssues
}
