//! Type-check adapter: `tsc --noEmit` with diagnostic parsing
//!
//! Handles both diagnostic shapes tsc emits depending on version and
//! host:
//!   src/foo.ts(12,34): error TS2304: Cannot find name 'X'.
//!   src/foo.ts:12:34 - error TS2304: Cannot find name 'X'.

use crate::config::ValidatorConfig;
use crate::model::{ErrorKind, ValidationError, ValidationResult};
use crate::toolchain;
use crate::util::{run_command_with_timeout, strip_ansi_sequences, tail_chars};
use anyhow::{anyhow, Result};
use regex::Regex;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Messages repairable by rewriting only the import statement.
const IMPORT_EXPORT_PATTERNS: &[&str] = &[
    "has no exported member",
    "has no default export",
    "is not a module",
    "Cannot find module",
];

const SURGICAL_IMPORT_EXPORT_RULE: &str = "surgical-import-export";

const MAX_RAW_OUTPUT_CHARS: usize = 2_000;

pub async fn validate_types(dir: &Path, config: &ValidatorConfig) -> Result<ValidationResult> {
    let (program, base_args) = toolchain::resolve_bin(dir, "tsc");
    debug!(dir = %dir.display(), program = %program.display(), "Running type check");

    let mut cmd = Command::new(&program);
    cmd.current_dir(dir)
        .args(&base_args)
        .arg("--noEmit")
        .arg("--pretty")
        .arg("false");

    let output = run_command_with_timeout(&mut cmd, Some(config.analyzer_timeout()))
        .await
        .map_err(|e| anyhow!("Failed to run type checker: {}", e))?;

    if output.timed_out {
        let error = ValidationError::new(
            ErrorKind::Runtime,
            "tsconfig.json",
            format!(
                "Type check timed out after {}s",
                config.analyzer_timeout_secs
            ),
        );
        return Ok(ValidationResult::from_parts(vec![error], Vec::new()));
    }
    if output.success() {
        return Ok(ValidationResult::valid());
    }

    let combined = strip_ansi_sequences(&output.combined_output());
    let mut errors = parse_tsc_output(&combined, config);
    if errors.is_empty() {
        // Non-zero exit with nothing parseable must never pass silently.
        errors.push(ValidationError::new(
            ErrorKind::Syntax,
            "tsconfig.json",
            format!(
                "Type check failed:\n{}",
                tail_chars(combined.trim(), MAX_RAW_OUTPUT_CHARS)
            ),
        ));
    }
    Ok(ValidationResult::from_parts(errors, Vec::new()))
}

fn parse_tsc_output(output: &str, config: &ValidatorConfig) -> Vec<ValidationError> {
    let paren_format = Regex::new(
        r"^\s*(?P<path>[^\s:(][^():]*)\((?P<line>\d+),(?P<col>\d+)\):\s*error\s+(?P<code>TS\d+):\s*(?P<msg>.+)$",
    )
    .expect("paren diagnostic regex");
    let colon_format = Regex::new(
        r"^\s*(?P<path>[^\s:(][^():]*):(?P<line>\d+):(?P<col>\d+)\s*-\s*error\s+(?P<code>TS\d+):\s*(?P<msg>.+)$",
    )
    .expect("colon diagnostic regex");

    let mut errors = Vec::new();
    for line in output.lines() {
        let Some(caps) = paren_format
            .captures(line)
            .or_else(|| colon_format.captures(line))
        else {
            continue;
        };

        let path = caps["path"].trim_start_matches("./").replace('\\', "/");
        if path.contains(&config.excluded_path_marker) {
            continue;
        }
        let (Ok(line_no), Ok(col)) = (caps["line"].parse::<u32>(), caps["col"].parse::<u32>())
        else {
            continue;
        };
        let message = caps["msg"].trim().to_string();

        let mut error = ValidationError::new(ErrorKind::Syntax, path, message.clone())
            .with_location(line_no, col);
        if is_import_export_issue(&message) {
            error = error.with_rule(SURGICAL_IMPORT_EXPORT_RULE).fixable();
        } else {
            error = error.with_rule(&caps["code"]);
        }
        errors.push(error);
    }
    errors
}

fn is_import_export_issue(message: &str) -> bool {
    IMPORT_EXPORT_PATTERNS
        .iter()
        .any(|pattern| message.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn config() -> ValidatorConfig {
        ValidatorConfig::default()
    }

    #[test]
    fn test_parse_paren_format() {
        let output = "app/page.tsx(12,5): error TS2304: Cannot find name 'Button'.";
        let errors = parse_tsc_output(output, &config());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].file, "app/page.tsx");
        assert_eq!(errors[0].line, Some(12));
        assert_eq!(errors[0].column, Some(5));
        assert_eq!(errors[0].rule.as_deref(), Some("TS2304"));
        assert!(!errors[0].fixable);
    }

    #[test]
    fn test_parse_colon_format() {
        let output = "./lib/api.ts:3:10 - error TS2551: Property 'fetchh' does not exist.";
        let errors = parse_tsc_output(output, &config());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].file, "lib/api.ts");
        assert_eq!(errors[0].line, Some(3));
    }

    #[test]
    fn test_import_export_issue_is_fixable_with_surgical_rule() {
        let output =
            "app/page.tsx(1,10): error TS2305: Module '\"./ui\"' has no exported member 'Card'.";
        let errors = parse_tsc_output(output, &config());
        assert!(errors[0].fixable);
        assert_eq!(errors[0].rule.as_deref(), Some("surgical-import-export"));
    }

    #[test]
    fn test_vendor_paths_are_dropped() {
        let output =
            "node_modules/react/index.d.ts(5,1): error TS1005: ';' expected.\napp/page.tsx(1,1): error TS2304: Cannot find name 'x'.";
        let errors = parse_tsc_output(output, &config());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].file, "app/page.tsx");
    }

    #[test]
    fn test_non_diagnostic_lines_ignored() {
        let output = "Compiling...\nDone in 2.3s";
        assert!(parse_tsc_output(output, &config()).is_empty());
    }

    #[cfg(unix)]
    fn install_fake_tsc(dir: &Path, script: &str) {
        use std::os::unix::fs::PermissionsExt;
        let bin = dir.join("node_modules/.bin");
        fs::create_dir_all(&bin).unwrap();
        let path = bin.join("tsc");
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_validate_types_parses_tool_output() {
        let dir = tempdir().unwrap();
        install_fake_tsc(
            dir.path(),
            "#!/bin/sh\necho \"app/page.tsx(2,7): error TS2304: Cannot find name 'Nav'.\"\nexit 2\n",
        );

        let result = validate_types(dir.path(), &config()).await.unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].file, "app/page.tsx");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_validate_types_synthesizes_on_unparseable_failure() {
        let dir = tempdir().unwrap();
        install_fake_tsc(dir.path(), "#!/bin/sh\necho \"boom\" 1>&2\nexit 1\n");

        let result = validate_types(dir.path(), &config()).await.unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("boom"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_validate_types_passes_on_clean_exit() {
        let dir = tempdir().unwrap();
        install_fake_tsc(dir.path(), "#!/bin/sh\nexit 0\n");

        let result = validate_types(dir.path(), &config()).await.unwrap();
        assert!(result.is_valid);
    }
}
