//! Build adapter: the project's own `build` script under a hard timeout
//!
//! Next.js build output is noisy; failure parsing walks the combined
//! output line by line with three patterns in priority order (missing
//! module, located error, generic error line) and skips known
//! webpack/chunk noise.

use crate::config::ValidatorConfig;
use crate::model::{ErrorKind, ValidationError, ValidationResult, ValidationWarning};
use crate::toolchain::{Manifest, PackageManager};
use crate::util::{run_command_with_timeout, strip_ansi_sequences, tail_chars};
use anyhow::{anyhow, Result};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

const MAX_RAW_OUTPUT_CHARS: usize = 3_000;

/// Output lines that never carry an actionable diagnostic.
const NOISE_MARKERS: &[&str] = &[
    "webpack",
    "chunk",
    "entrypoint",
    "import trace for requested module",
    "generating static pages",
    "compiled with warnings",
];

pub async fn validate_build(dir: &Path, config: &ValidatorConfig) -> Result<ValidationResult> {
    let manifest = match Manifest::read(dir) {
        Ok(manifest) => manifest,
        Err(err) => {
            let error = ValidationError::new(
                ErrorKind::Build,
                "package.json",
                format!("Could not read project manifest: {}", err),
            );
            return Ok(ValidationResult::from_parts(vec![error], Vec::new()));
        }
    };
    if manifest.script("build").is_none() {
        // Nothing to validate; note it and spawn nothing.
        let warning = ValidationWarning::new(
            ErrorKind::Build,
            "package.json",
            "No build script declared; skipping build validation",
        );
        return Ok(ValidationResult::from_parts(Vec::new(), vec![warning]));
    }

    let pm = PackageManager::detect(dir);
    debug!(dir = %dir.display(), pm = pm.program(), "Running build");
    let mut cmd = Command::new(pm.program());
    cmd.current_dir(dir).args(pm.run_script_args("build"));

    let output = run_command_with_timeout(&mut cmd, Some(config.build_timeout()))
        .await
        .map_err(|e| anyhow!("Failed to run build: {}", e))?;

    if output.timed_out {
        let error = ValidationError::new(
            ErrorKind::Build,
            "package.json",
            format!(
                "Build timed out after {}s and was killed",
                config.build_timeout_secs
            ),
        );
        return Ok(ValidationResult::from_parts(vec![error], Vec::new()));
    }
    if output.success() {
        return Ok(ValidationResult::valid());
    }

    let combined = strip_ansi_sequences(&output.combined_output());
    let mut errors = parse_build_output(&combined);
    if errors.is_empty() {
        errors.push(ValidationError::new(
            ErrorKind::Build,
            "package.json",
            format!(
                "Build failed:\n{}",
                tail_chars(combined.trim(), MAX_RAW_OUTPUT_CHARS)
            ),
        ));
    }
    Ok(ValidationResult::from_parts(errors, Vec::new()))
}

fn parse_build_output(output: &str) -> Vec<ValidationError> {
    let module_not_found = Regex::new(
        r"Module not found: (?:Error: )?Can't resolve '(?P<module>[^']+)'",
    )
    .expect("module-not-found regex");
    let located = Regex::new(
        r"^\s*(?:\./)?(?P<path>[^\s:]+?\.[A-Za-z0-9]+):(?P<line>\d+):(?P<col>\d+)",
    )
    .expect("located diagnostic regex");

    let lines: Vec<&str> = output.lines().collect();
    let mut errors = Vec::new();
    let mut consumed: HashSet<usize> = HashSet::new();

    for (idx, raw) in lines.iter().enumerate() {
        if consumed.contains(&idx) {
            continue;
        }
        let line = raw.trim();
        if line.is_empty() || is_noise_line(line) {
            continue;
        }

        if let Some(caps) = module_not_found.captures(line) {
            errors.push(
                ValidationError::new(
                    ErrorKind::Dependency,
                    "package.json",
                    format!("Missing module '{}'; install it or fix the import", &caps["module"]),
                )
                .fixable(),
            );
            continue;
        }

        if let Some(caps) = located.captures(line) {
            let next = lines.get(idx + 1).map(|l| l.trim()).unwrap_or("");
            let line_marked = line.to_lowercase().contains("error") || line.contains('⨯');
            let next_marked = next.to_lowercase().contains("error") || next.contains('⨯');
            if line_marked || next_marked {
                let message = if next_marked {
                    consumed.insert(idx + 1);
                    next.trim_start_matches('⨯')
                        .trim()
                        .strip_prefix("Type error:")
                        .unwrap_or(next)
                        .trim()
                        .to_string()
                } else {
                    line.to_string()
                };
                let path = caps["path"].trim_start_matches("./").replace('\\', "/");
                let (Ok(line_no), Ok(col)) =
                    (caps["line"].parse::<u32>(), caps["col"].parse::<u32>())
                else {
                    continue;
                };
                errors.push(
                    ValidationError::new(ErrorKind::Build, path, message)
                        .with_location(line_no, col),
                );
                continue;
            }
        }

        if line.to_lowercase().contains("error") {
            errors.push(ValidationError::new(
                ErrorKind::Build,
                "package.json",
                line.to_string(),
            ));
        }
    }
    errors
}

fn is_noise_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    NOISE_MARKERS.iter().any(|marker| lower.contains(marker))
}
