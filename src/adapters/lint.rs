//! Lint adapter: eslint in three shapes
//!
//! Full project lint, a minimal syntax-only confirmation pass, and the
//! built-in `--fix` mode used by the auto-fixer. Output is consumed via
//! `--format json`, which is still plain stdout text as far as the
//! subprocess contract goes.

use crate::adapters::{collect_source_files, relative_display};
use crate::config::ValidatorConfig;
use crate::model::{ErrorKind, Severity, ValidationError, ValidationResult, ValidationWarning};
use crate::toolchain;
use crate::util::{hash_str, run_command_with_timeout, tail_chars};
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintMode {
    /// The project's own rule configuration over all source files.
    Full,
    /// A minimal inline ruleset (undefined identifiers only), used as a
    /// cheap confirmation pass.
    SyntaxOnly,
}

/// Critical syntax signatures that must never be reclassified as noise,
/// even when they also match a non-critical pattern.
const CRITICAL_SYNTAX_PATTERNS: &[&str] = &[
    "Duplicate export",
    "Adjacent JSX elements",
    "Missing semicolon",
    "Unterminated string",
];

/// Diagnostics the linter reports as errors but that experience shows are
/// tool-configuration noise or parser false positives, not broken code.
const NONCRITICAL_PATTERNS: &[&str] = &[
    "Failed to load config",
    "Failed to load plugin",
    "next/babel",
    "Parsing error: The keyword 'interface' is reserved",
    "Parsing error: Unexpected token :",
];

#[derive(Debug, Deserialize)]
struct EslintFileResult {
    #[serde(rename = "filePath")]
    file_path: String,
    #[serde(default)]
    messages: Vec<EslintMessage>,
}

#[derive(Debug, Deserialize)]
struct EslintMessage {
    #[serde(rename = "ruleId")]
    rule_id: Option<String>,
    severity: u8,
    message: String,
    line: Option<u32>,
    column: Option<u32>,
    /// Present when eslint knows how to repair the problem in place.
    fix: Option<serde_json::Value>,
}

pub async fn validate_lint(
    dir: &Path,
    config: &ValidatorConfig,
    mode: LintMode,
) -> Result<ValidationResult> {
    let output = run_eslint(dir, config, mode, false).await?;
    parse_eslint_json(dir, &output, config, mode == LintMode::Full)
}

/// Outcome of the linter's in-place repair mode.
#[derive(Debug, Clone, Default)]
pub struct LintFixOutcome {
    pub changed_files: Vec<String>,
    pub remaining_errors: Vec<ValidationError>,
}

/// Run `eslint --fix`, reporting which files it rewrote (detected by
/// content hashing around the run) and which errors remain.
pub async fn auto_fix_lint(dir: &Path, config: &ValidatorConfig) -> Result<LintFixOutcome> {
    let before = hash_source_files(dir, config);
    let output = run_eslint(dir, config, LintMode::Full, true).await?;
    let after = hash_source_files(dir, config);

    let mut changed_files = Vec::new();
    for (file, hash) in &after {
        if before.get(file) != Some(hash) {
            changed_files.push(file.clone());
        }
    }
    changed_files.sort();

    let result = parse_eslint_json(dir, &output, config, true)?;
    Ok(LintFixOutcome {
        changed_files,
        remaining_errors: result.errors,
    })
}

async fn run_eslint(
    dir: &Path,
    config: &ValidatorConfig,
    mode: LintMode,
    fix: bool,
) -> Result<String> {
    let (program, base_args) = toolchain::resolve_bin(dir, "eslint");
    debug!(dir = %dir.display(), ?mode, fix, "Running linter");

    let mut cmd = Command::new(&program);
    cmd.current_dir(dir).args(&base_args);
    match mode {
        LintMode::Full => {
            cmd.arg("--ext").arg(".ts,.tsx,.js,.jsx");
            cmd.arg("--ignore-pattern")
                .arg(format!("**/{}/**", config.excluded_path_marker));
        }
        LintMode::SyntaxOnly => {
            cmd.arg("--no-eslintrc").arg("--rule").arg("no-undef: 2");
        }
    }
    if fix {
        cmd.arg("--fix");
    }
    cmd.arg("--format").arg("json").arg(".");

    let output = run_command_with_timeout(&mut cmd, Some(config.analyzer_timeout()))
        .await
        .map_err(|e| anyhow!("Failed to run linter: {}", e))?;
    if output.timed_out {
        bail!(
            "Linter timed out after {}s",
            config.analyzer_timeout_secs
        );
    }
    // eslint exits 1 when it found problems; the JSON is on stdout either
    // way. A spawn-level crash leaves stdout unparseable and is caught by
    // the JSON parse below.
    Ok(output.stdout)
}

fn parse_eslint_json(
    dir: &Path,
    stdout: &str,
    config: &ValidatorConfig,
    reclassify: bool,
) -> Result<ValidationResult> {
    let trimmed = stdout.trim();
    let files: Vec<EslintFileResult> = serde_json::from_str(trimmed).with_context(|| {
        format!(
            "Linter output was not JSON: {}",
            tail_chars(trimmed, 400)
        )
    })?;

    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    for file in files {
        let display = relative_display(dir, Path::new(&file.file_path));
        if display.contains(&config.excluded_path_marker) {
            continue;
        }
        for message in file.messages {
            let is_error = message.severity >= 2;
            let downgraded = is_error && reclassify && is_noncritical(&message.message);
            if is_error && !downgraded {
                let mut error =
                    ValidationError::new(ErrorKind::Syntax, display.clone(), message.message);
                if let (Some(line), Some(column)) = (message.line, message.column) {
                    error = error.with_location(line, column);
                } else if let Some(line) = message.line {
                    error = error.with_line(line);
                }
                if let Some(rule) = message.rule_id {
                    error = error.with_rule(rule);
                }
                if message.fix.is_some() {
                    error = error.fixable();
                }
                debug_assert_eq!(error.severity, Severity::Error);
                errors.push(error);
            } else {
                let mut warning =
                    ValidationWarning::new(ErrorKind::Syntax, display.clone(), message.message);
                if let (Some(line), Some(column)) = (message.line, message.column) {
                    warning = warning.with_location(line, column);
                }
                if let Some(rule) = message.rule_id {
                    warning = warning.with_rule(rule);
                }
                warnings.push(warning);
            }
        }
    }
    Ok(ValidationResult::from_parts(errors, warnings))
}

/// Ordered check: critical signatures win over the non-critical table.
fn is_noncritical(message: &str) -> bool {
    if CRITICAL_SYNTAX_PATTERNS
        .iter()
        .any(|pattern| message.contains(pattern))
    {
        return false;
    }
    NONCRITICAL_PATTERNS
        .iter()
        .any(|pattern| message.contains(pattern))
}

fn hash_source_files(dir: &Path, config: &ValidatorConfig) -> HashMap<String, String> {
    let mut hashes = HashMap::new();
    for path in collect_source_files(dir, config) {
        if let Ok(content) = std::fs::read_to_string(&path) {
            hashes.insert(relative_display(dir, &path), hash_str(&content));
        }
    }
    hashes
}
