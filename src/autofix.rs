//! Auto-repair: linter `--fix`, contrast rewriting, dependency install
//!
//! Runs the linter's built-in repair mode and the custom button-contrast
//! rewriter concurrently under the project lock, then installs
//! dependencies when the dependency check reported them missing. The
//! rewriter applies an ordered list of class rewrites and only writes a
//! file back when at least one fired, which keeps the whole pass
//! idempotent.

use crate::adapters::{collect_source_files, deps, lint, relative_display};
use crate::config::ValidatorConfig;
use crate::lock::LockManager;
use crate::model::{ErrorKind, FixResult, ValidationError};
use crate::toolchain::PackageManager;
use crate::util::{dedup_preserve_order, run_command_with_timeout, tail_chars};
use anyhow::Result;
use regex::Regex;
use std::cell::RefCell;
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{info, warn};

use crate::adapters::contrast::{is_text_color, DARK_BACKGROUNDS, LIGHT_TEXTS};

/// Dangerous background/foreground pairs swapped for safe equivalents.
const DANGEROUS_PAIR_SWAPS: &[(&str, &str, &str)] = &[
    ("bg-white", "text-white", "text-gray-900"),
    ("bg-black", "text-black", "text-white"),
    ("bg-gray-100", "text-gray-100", "text-gray-900"),
];

pub async fn auto_fix_project(
    dir: &Path,
    config: &ValidatorConfig,
    locks: &Arc<LockManager>,
) -> Result<FixResult> {
    locks
        .with_lock(dir, config.lock_timeout(), auto_fix_inner(dir, config))
        .await
}

async fn auto_fix_inner(dir: &Path, config: &ValidatorConfig) -> FixResult {
    let (lint_outcome, contrast_outcome) = tokio::join!(
        lint::auto_fix_lint(dir, config),
        fix_button_contrast(dir, config)
    );
    let lint_outcome = match lint_outcome {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!("Lint auto-fix unavailable: {}", err);
            lint::LintFixOutcome::default()
        }
    };

    match deps::validate_dependencies(dir, config) {
        Ok(result) if result.errors.iter().any(|e| e.file == "node_modules") => {
            install_dependencies(dir, config).await;
        }
        Ok(_) => {}
        Err(err) => warn!("Dependency check failed during auto-fix: {}", err),
    }

    let mut changed_files = lint_outcome.changed_files;
    changed_files.extend(contrast_outcome.changed_files);
    let changed_files = dedup_preserve_order(changed_files);

    FixResult {
        success: lint_outcome.remaining_errors.is_empty(),
        fixed_errors: contrast_outcome.fixed,
        remaining_errors: lint_outcome.remaining_errors,
        changed_files,
    }
}

#[derive(Debug, Default)]
pub struct ContrastFixOutcome {
    pub changed_files: Vec<String>,
    pub fixed: Vec<ValidationError>,
}

/// Rewrite dangerous class combinations in place. Files are processed
/// concurrently; each is written back only when at least one rewrite
/// fired.
pub async fn fix_button_contrast(dir: &Path, config: &ValidatorConfig) -> ContrastFixOutcome {
    let class_attr = Regex::new(r#"(class(?:Name)?=")([^"]*)(")"#).expect("class attr regex");

    let files = collect_source_files(dir, config);
    let tasks = files
        .iter()
        .map(|path| fix_contrast_file(dir, path, &class_attr));
    let per_file = futures::future::join_all(tasks).await;

    let mut outcome = ContrastFixOutcome::default();
    for fixed in per_file.into_iter().flatten() {
        let (display, fired) = fixed;
        for (rule, line_no) in fired {
            outcome.fixed.push(
                ValidationError::new(ErrorKind::Syntax, display.clone(), rewrite_message(rule))
                    .with_line(line_no)
                    .with_rule(rule)
                    .fixable(),
            );
        }
        outcome.changed_files.push(display);
    }
    outcome
}

/// Apply the rewrite table to one file. Returns the display path and the
/// rules that fired, or `None` when the file was left untouched.
async fn fix_contrast_file(
    dir: &Path,
    path: &Path,
    class_attr: &Regex,
) -> Option<(String, Vec<(&'static str, u32)>)> {
    let content = tokio::fs::read_to_string(path).await.ok()?;
    let display_path = relative_display(dir, path);

    let fired: RefCell<Vec<(&'static str, u32)>> = RefCell::new(Vec::new());
    let mut new_lines = Vec::new();
    for (line_idx, line) in content.lines().enumerate() {
        let line_no = (line_idx + 1) as u32;
        let rewritten = class_attr.replace_all(line, |caps: &regex::Captures| {
            let (classes, rules) = rewrite_class_tokens(&caps[2]);
            for rule in rules {
                fired.borrow_mut().push((rule, line_no));
            }
            format!("{}{}{}", &caps[1], classes, &caps[3])
        });
        new_lines.push(rewritten.into_owned());
    }

    let fired = fired.into_inner();
    if fired.is_empty() {
        return None;
    }

    let mut rewritten = new_lines.join("\n");
    if content.ends_with('\n') {
        rewritten.push('\n');
    }
    if let Err(err) = tokio::fs::write(path, rewritten).await {
        warn!(file = %display_path, "Failed to write contrast fix: {}", err);
        return None;
    }
    Some((display_path, fired))
}

/// Ordered rewrite list over one class attribute. Returns the rewritten
/// token string and the names of the rules that fired.
fn rewrite_class_tokens(classes: &str) -> (String, Vec<&'static str>) {
    let mut tokens: Vec<String> = classes.split_whitespace().map(str::to_string).collect();
    let mut fired = Vec::new();

    // 1. Themed buttons own their contrast; strip explicit text colors.
    let themed = tokens
        .iter()
        .any(|t| t == "btn-primary" || t == "btn-secondary");
    if themed && tokens.iter().any(|t| is_text_color(t)) {
        tokens.retain(|t| !is_text_color(t));
        fired.push("contrast/button-text-override");
    }

    // 2. A light foreground on a button with no explicit dark background
    //    disappears against the default surface.
    let buttonish = tokens.iter().any(|t| t == "btn" || t.starts_with("btn-"));
    let has_dark_bg = tokens.iter().any(|t| DARK_BACKGROUNDS.contains(&t.as_str()));
    if buttonish && !has_dark_bg && tokens.iter().any(|t| LIGHT_TEXTS.contains(&t.as_str())) {
        tokens.retain(|t| !LIGHT_TEXTS.contains(&t.as_str()));
        fired.push("contrast/light-text-on-button");
    }

    // 3. Swap the fixed dangerous pairs for safe foregrounds.
    for (bg, fg, safe) in DANGEROUS_PAIR_SWAPS {
        if tokens.iter().any(|t| t == bg) && tokens.iter().any(|t| t == fg) {
            for token in tokens.iter_mut() {
                if token == fg {
                    *token = (*safe).to_string();
                }
            }
            fired.push("contrast/dangerous-pair");
        }
    }

    (tokens.join(" "), fired)
}

fn rewrite_message(rule: &str) -> String {
    match rule {
        "contrast/button-text-override" => {
            "Removed explicit text color from themed button".to_string()
        }
        "contrast/light-text-on-button" => {
            "Removed light text color from button without dark background".to_string()
        }
        "contrast/dangerous-pair" => {
            "Swapped unreadable background/text pair for a safe foreground".to_string()
        }
        other => format!("Applied contrast rewrite '{}'", other),
    }
}

async fn install_dependencies(dir: &Path, config: &ValidatorConfig) {
    let pm = PackageManager::detect(dir);
    info!(dir = %dir.display(), pm = pm.program(), "Installing missing dependencies");

    let mut cmd = Command::new(pm.program());
    cmd.current_dir(dir).args(pm.install_args());
    match run_command_with_timeout(&mut cmd, Some(config.install_timeout())).await {
        Ok(output) if output.success() => {
            info!("Dependency install completed");
        }
        Ok(output) => {
            warn!(
                "Dependency install failed: {}",
                tail_chars(output.combined_output().trim(), 400)
            );
        }
        Err(err) => warn!("Dependency install could not start: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn config() -> ValidatorConfig {
        ValidatorConfig::default()
    }

    fn write_page(dir: &Path, content: &str) {
        fs::create_dir_all(dir.join("app")).unwrap();
        fs::write(dir.join("app/page.tsx"), content).unwrap();
    }

    fn read_page(dir: &Path) -> String {
        fs::read_to_string(dir.join("app/page.tsx")).unwrap()
    }

    #[test]
    fn test_rewrite_strips_text_color_from_themed_button() {
        let (classes, fired) = rewrite_class_tokens("btn-primary text-red-500");
        assert_eq!(classes, "btn-primary");
        assert_eq!(fired, vec!["contrast/button-text-override"]);
    }

    #[test]
    fn test_rewrite_strips_light_text_from_unthemed_button() {
        let (classes, fired) = rewrite_class_tokens("btn text-white px-4");
        assert_eq!(classes, "btn px-4");
        assert_eq!(fired, vec!["contrast/light-text-on-button"]);
    }

    #[test]
    fn test_light_text_kept_when_dark_background_present() {
        let (classes, fired) = rewrite_class_tokens("btn bg-black text-white");
        assert_eq!(classes, "btn bg-black text-white");
        assert!(fired.is_empty());
    }

    #[test]
    fn test_rewrite_swaps_dangerous_pairs() {
        let (classes, fired) = rewrite_class_tokens("bg-white text-white");
        assert_eq!(classes, "bg-white text-gray-900");
        assert_eq!(fired, vec!["contrast/dangerous-pair"]);

        let (classes, _) = rewrite_class_tokens("bg-black text-black");
        assert_eq!(classes, "bg-black text-white");
    }

    #[test]
    fn test_safe_classes_untouched() {
        let (classes, fired) = rewrite_class_tokens("flex items-center bg-white text-gray-900");
        assert_eq!(classes, "flex items-center bg-white text-gray-900");
        assert!(fired.is_empty());
    }

    #[tokio::test]
    async fn test_fix_button_contrast_rewrites_file() {
        let dir = tempdir().unwrap();
        write_page(
            dir.path(),
            r#"<button className="btn-primary text-red-500">Go</button>"#,
        );

        let outcome = fix_button_contrast(dir.path(), &config()).await;
        assert_eq!(outcome.changed_files, vec!["app/page.tsx".to_string()]);
        assert_eq!(outcome.fixed.len(), 1);
        assert!(read_page(dir.path()).contains(r#"className="btn-primary""#));
        assert!(!read_page(dir.path()).contains("text-red-500"));
    }

    #[tokio::test]
    async fn test_fix_button_contrast_is_idempotent() {
        let dir = tempdir().unwrap();
        write_page(
            dir.path(),
            r#"<div className="bg-white text-white"><button className="btn-primary text-red-500">Go</button></div>"#,
        );

        let first = fix_button_contrast(dir.path(), &config()).await;
        assert_eq!(first.changed_files.len(), 1);
        let after_first = read_page(dir.path());

        let second = fix_button_contrast(dir.path(), &config()).await;
        assert!(second.changed_files.is_empty());
        assert!(second.fixed.is_empty());
        assert_eq!(read_page(dir.path()), after_first);
    }

    #[tokio::test]
    async fn test_clean_file_not_rewritten() {
        let dir = tempdir().unwrap();
        let content = r#"<button className="btn-primary px-4">Go</button>"#;
        write_page(dir.path(), content);

        let outcome = fix_button_contrast(dir.path(), &config()).await;
        assert!(outcome.changed_files.is_empty());
        assert_eq!(read_page(dir.path()), content);
    }
}
