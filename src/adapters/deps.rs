//! Dependency adapter: installed packages and manifest sanity
//!
//! Checks that dependencies are installed, that the mandatory runtime
//! libraries are declared, and that a project visibly using utility
//! classes also declares the CSS framework providing them.

use crate::adapters::collect_source_files;
use crate::config::ValidatorConfig;
use crate::model::{ErrorKind, ValidationError, ValidationResult, ValidationWarning};
use crate::toolchain::Manifest;
use anyhow::Result;
use regex::Regex;
use std::path::Path;

/// How many source files the utility-class sniff samples.
const MAX_SAMPLED_FILES: usize = 10;

const CSS_FRAMEWORK: &str = "tailwindcss";

pub fn validate_dependencies(dir: &Path, config: &ValidatorConfig) -> Result<ValidationResult> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if !dir.join("node_modules").is_dir() {
        errors.push(
            ValidationError::new(
                ErrorKind::Dependency,
                "node_modules",
                "Dependencies are not installed; run the package manager's install",
            )
            .fixable(),
        );
    }

    let manifest = Manifest::read(dir)?;
    for dep in &config.required_runtime_deps {
        if !manifest.has_dependency(dep) {
            errors.push(
                ValidationError::new(
                    ErrorKind::Dependency,
                    "package.json",
                    format!("Required runtime dependency '{}' is not declared", dep),
                )
                .fixable(),
            );
        }
    }

    // Utility classes without the framework still render, just unstyled,
    // so this is a warning rather than an error.
    if uses_utility_classes(dir, config) && !manifest.has_dependency(CSS_FRAMEWORK) {
        warnings.push(ValidationWarning::new(
            ErrorKind::Dependency,
            "package.json",
            format!(
                "Source files use utility classes but '{}' is not declared",
                CSS_FRAMEWORK
            ),
        ));
    }

    Ok(ValidationResult::from_parts(errors, warnings))
}

fn uses_utility_classes(dir: &Path, config: &ValidatorConfig) -> bool {
    let signature = Regex::new(
        r#"class(?:Name)?="[^"]*\b(?:flex|grid|px-\d|py-\d|text-[a-z]+|bg-[a-z]+|rounded)\b"#,
    )
    .expect("utility class regex");

    collect_source_files(dir, config)
        .iter()
        .take(MAX_SAMPLED_FILES)
        .filter_map(|path| std::fs::read_to_string(path).ok())
        .any(|content| signature.is_match(&content))
}
