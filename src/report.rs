//! Report rendering: the two machine-facing outputs of a validation run
//!
//! The initial report is verbose and strategic (dominant-pattern guidance,
//! per-file grouping, counts). The fix-task report is strictly
//! errors-first with exactly one fix instruction per error, so a repair
//! agent mid-loop gets marching orders instead of prose.

use crate::classify::detect_error_pattern;
use crate::model::{ValidationError, ValidationResult};
use crate::scope::{DefaultScopeAnalyzer, ScopeAnalyzer};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const SUCCESS_REPORT: &str = "All validation checks passed.";

pub struct ReportGenerator {
    scope: Box<dyn ScopeAnalyzer>,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportGenerator {
    pub fn new() -> Self {
        Self {
            scope: Box::new(DefaultScopeAnalyzer),
        }
    }

    /// Inject a different scope analyzer (tests, smarter collaborator).
    pub fn with_scope_analyzer(scope: Box<dyn ScopeAnalyzer>) -> Self {
        Self { scope }
    }

    pub fn generate_error_report(
        &self,
        dir: &Path,
        result: &ValidationResult,
        is_fix_task: bool,
    ) -> String {
        if result.is_valid {
            return SUCCESS_REPORT.to_string();
        }
        if is_fix_task {
            self.render_fix_task(dir, result)
        } else {
            render_initial(result)
        }
    }

    fn render_fix_task(&self, dir: &Path, result: &ValidationResult) -> String {
        let mut out = format!("Fix the following {} error(s):\n", result.errors.len());
        for (idx, error) in result.errors.iter().enumerate() {
            let content = fs::read_to_string(dir.join(&error.file)).unwrap_or_default();
            let recommendation =
                self.scope
                    .recommend(error, &content, Path::new(&error.file));
            out.push_str(&format!(
                "\n{}. {}\n   Error: {}\n   Fix: {}\n   Edit scope: {} ({})\n",
                idx + 1,
                error.location(),
                first_line(&error.message),
                fix_instruction(error),
                recommendation.granularity.label(),
                recommendation.primitive,
            ));
        }
        out
    }
}

fn render_initial(result: &ValidationResult) -> String {
    let pattern = detect_error_pattern(&result.errors);

    let mut by_file: BTreeMap<&str, Vec<&ValidationError>> = BTreeMap::new();
    for error in &result.errors {
        by_file.entry(error.file.as_str()).or_default().push(error);
    }

    let mut out = String::new();
    out.push_str(pattern.guidance());
    out.push_str(&format!(
        "\n\nFound {} error(s) in {} file(s):\n",
        result.errors.len(),
        by_file.len()
    ));

    for (file, errors) in &by_file {
        out.push_str(&format!("\n{}:\n", file));
        for error in errors {
            let position = match (error.line, error.column) {
                (Some(line), Some(col)) => format!("[{}:{}] ", line, col),
                (Some(line), None) => format!("[{}] ", line),
                _ => String::new(),
            };
            let rule = error
                .rule
                .as_deref()
                .map(|r| format!(" ({})", r))
                .unwrap_or_default();
            out.push_str(&format!(
                "  - {}{}{}\n",
                position,
                first_line(&error.message),
                rule
            ));
        }
    }

    out.push_str(&format!(
        "\nAuto-fixable: {} error(s)\nWarnings: {}\n",
        result.fixable_errors.len(),
        result.warnings.len()
    ));
    out
}

/// Ordered fix-instruction table: the first matching pattern supplies the
/// single instruction emitted for an error.
fn fix_instruction(error: &ValidationError) -> String {
    let message = &error.message;

    if message.contains("Cannot find name") {
        let identifier = Regex::new(r"Cannot find name '([^']+)'")
            .expect("identifier regex")
            .captures(message)
            .map(|caps| caps[1].to_string());
        return match identifier {
            Some(name) => format!(
                "Import '{}' or replace it with an element that exists in this project",
                name
            ),
            None => "Import the missing identifier or replace it with an existing one".to_string(),
        };
    }

    if message.contains("is not assignable to type") {
        let allowed = Regex::new(r"is not assignable to type '([^']+)'")
            .expect("assignable regex")
            .captures(message)
            .map(|caps| caps[1].to_string());
        return match allowed {
            Some(options) => format!("Replace the value with one of the allowed options: {}", options),
            None => "Replace the value with one the prop's type allows".to_string(),
        };
    }

    if ["Duplicate identifier", "has already been declared", "Duplicate export", "Cannot redeclare"]
        .iter()
        .any(|sig| message.contains(sig))
    {
        return "Remove the duplicate declaration, keeping the most complete one".to_string();
    }

    if message.contains("JSX") || message.contains("closing tag") {
        return "Repair the JSX structure: close every opened tag and keep a single root element"
            .to_string();
    }

    "Fix the syntax error at this location".to_string()
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or(message)
}
