//! Validation orchestration: fail-fast fast path, then a parallel full
//! pass under the project lock
//!
//! Type errors are cheapest to detect and cascade into unreadable build
//! and lint noise, so the fast path strictly gates the expensive pass.
//! One broken tool must not abort the pipeline: lint, dependency, and
//! contrast failures degrade to an empty valid result, while the
//! type-checker and build synthesize a diagnostic instead of silently
//! passing.

use crate::adapters::lint::LintMode;
use crate::adapters::{build, contrast, deps, lint, typecheck};
use crate::classify::enhance_error_context;
use crate::config::ValidatorConfig;
use crate::lock::LockManager;
use crate::model::{ErrorKind, ValidationError, ValidationResult};
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct Validator {
    config: ValidatorConfig,
    locks: Arc<LockManager>,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
            locks: LockManager::new(),
        }
    }

    /// Share a lock manager with other pipeline components (the
    /// auto-fixer must contend on the same locks).
    pub fn with_lock_manager(config: ValidatorConfig, locks: Arc<LockManager>) -> Self {
        Self { config, locks }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn lock_manager(&self) -> Arc<LockManager> {
        Arc::clone(&self.locks)
    }

    /// The cheap fail-fast sequence: type check, then a minimal lint,
    /// then the build as final confirmation. Each stage returns
    /// immediately on failure.
    pub async fn validate_syntax_only(&self, dir: &Path) -> ValidationResult {
        let types = hardened(
            "type-check",
            typecheck::validate_types(dir, &self.config).await,
        );
        if !types.is_valid {
            return types;
        }

        let lint_result = isolated(
            "lint",
            lint::validate_lint(dir, &self.config, LintMode::SyntaxOnly).await,
        );
        if !lint_result.is_valid {
            return lint_result;
        }

        hardened("build", build::validate_build(dir, &self.config).await)
    }

    /// Full validation under the project lock. The only error this
    /// returns is a lock-acquisition timeout; every analysis failure is
    /// folded into the result.
    pub async fn validate_project(&self, dir: &Path, syntax_only: bool) -> Result<ValidationResult> {
        self.locks
            .with_lock(
                dir,
                self.config.lock_timeout(),
                self.validate_project_without_lock(dir, syntax_only),
            )
            .await
    }

    /// Identical logic without the lock, for callers that already
    /// serialize access at a coarser grain.
    pub async fn validate_project_without_lock(
        &self,
        dir: &Path,
        syntax_only: bool,
    ) -> ValidationResult {
        let run_id = Uuid::new_v4();
        info!(%run_id, dir = %dir.display(), syntax_only, "Validation started");

        let fast = self.validate_syntax_only(dir).await;
        if !fast.is_valid {
            info!(%run_id, errors = fast.errors.len(), "Fast path failed; skipping full pass");
            let enhanced = enhance_error_context(&fast.errors, &self.config);
            return fast.with_errors(enhanced);
        }
        if syntax_only {
            info!(%run_id, "Fast path passed; syntax-only run complete");
            return fast;
        }

        let (lint_full, build_result, deps_result, contrast_result) = tokio::join!(
            lint::validate_lint(dir, &self.config, LintMode::Full),
            build::validate_build(dir, &self.config),
            async { deps::validate_dependencies(dir, &self.config) },
            async { contrast::validate_contrast(dir, &self.config) },
        );

        let merged = ValidationResult::merge([
            isolated("lint", lint_full),
            hardened("build", build_result),
            isolated("dependency", deps_result),
            isolated("contrast", contrast_result),
        ]);
        info!(
            %run_id,
            errors = merged.errors.len(),
            warnings = merged.warnings.len(),
            "Full pass complete"
        );

        let enhanced = enhance_error_context(&merged.errors, &self.config);
        merged.with_errors(enhanced)
    }
}

/// Fault isolation for the optional analyzers: a crashed tool degrades to
/// an empty, valid result so it cannot abort the whole pipeline.
fn isolated(stage: &str, result: Result<ValidationResult>) -> ValidationResult {
    match result {
        Ok(result) => result,
        Err(err) => {
            warn!(stage, "Analyzer failed; continuing with empty result: {}", err);
            ValidationResult::valid()
        }
    }
}

/// The type-checker and build must never silently pass: an internal
/// failure synthesizes a runtime diagnostic instead.
fn hardened(stage: &str, result: Result<ValidationResult>) -> ValidationResult {
    match result {
        Ok(result) => result,
        Err(err) => {
            warn!(stage, "Analyzer failed; synthesizing error: {}", err);
            let error = ValidationError::new(
                ErrorKind::Runtime,
                "package.json",
                format!("{} step failed: {}", stage, err),
            );
            ValidationResult::from_parts(vec![error], Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn config() -> ValidatorConfig {
        ValidatorConfig::default()
    }

    #[cfg(unix)]
    fn install_fake_tool(dir: &Path, name: &str, script: &str) {
        use std::os::unix::fs::PermissionsExt;
        let bin = dir.join("node_modules/.bin");
        fs::create_dir_all(&bin).unwrap();
        let path = bin.join(name);
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// Manifest with no build script so the build stage validates
    /// without spawning a package manager.
    fn write_manifest_without_build(dir: &Path) {
        fs::write(
            dir.join("package.json"),
            r#"{
                "dependencies": {
                    "react": "^18.2.0",
                    "react-dom": "^18.2.0",
                    "tailwindcss": "^3.4.0"
                }
            }"#,
        )
        .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fast_path_stops_at_first_failing_stage() {
        let dir = tempdir().unwrap();
        write_manifest_without_build(dir.path());
        install_fake_tool(
            dir.path(),
            "tsc",
            "#!/bin/sh\necho \"app/page.tsx(1,1): error TS2304: Cannot find name 'x'.\"\nexit 2\n",
        );
        // If lint ran anyway it would leave a marker.
        install_fake_tool(
            dir.path(),
            "eslint",
            "#!/bin/sh\ntouch lint-ran\necho '[]'\n",
        );

        let validator = Validator::new(config());
        let result = validator.validate_syntax_only(dir.path()).await;
        assert!(!result.is_valid);
        assert!(!dir.path().join("lint-ran").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_syntax_only_run_skips_full_pass() {
        let dir = tempdir().unwrap();
        write_manifest_without_build(dir.path());
        fs::create_dir_all(dir.path().join("app")).unwrap();
        // Would produce a contrast error if the full pass ran.
        fs::write(
            dir.path().join("app/page.tsx"),
            r#"<button className="btn-primary text-red-500">Go</button>"#,
        )
        .unwrap();
        install_fake_tool(dir.path(), "tsc", "#!/bin/sh\nexit 0\n");
        install_fake_tool(dir.path(), "eslint", "#!/bin/sh\necho '[]'\n");

        let validator = Validator::new(config());
        let result = validator
            .validate_project(dir.path(), true)
            .await
            .unwrap();
        assert!(result.is_valid);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_full_pass_merges_adapter_results() {
        let dir = tempdir().unwrap();
        write_manifest_without_build(dir.path());
        fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        fs::create_dir_all(dir.path().join("app")).unwrap();
        fs::write(
            dir.path().join("app/page.tsx"),
            r#"<button className="btn-primary text-red-500">Go</button>"#,
        )
        .unwrap();
        install_fake_tool(dir.path(), "tsc", "#!/bin/sh\nexit 0\n");
        install_fake_tool(dir.path(), "eslint", "#!/bin/sh\necho '[]'\n");

        let validator = Validator::new(config());
        let result = validator
            .validate_project(dir.path(), false)
            .await
            .unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(
            result.errors[0].rule.as_deref(),
            Some("contrast/button-text-override")
        );
        // Build stage contributed its informational warning.
        assert!(result
            .warnings
            .iter()
            .any(|w| w.message.contains("No build script")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_broken_lint_tool_does_not_abort_full_pass() {
        let dir = tempdir().unwrap();
        write_manifest_without_build(dir.path());
        fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        install_fake_tool(dir.path(), "tsc", "#!/bin/sh\nexit 0\n");
        // Fast-path lint must succeed, full lint crashes: emit valid JSON
        // only for the --no-eslintrc confirmation pass.
        install_fake_tool(
            dir.path(),
            "eslint",
            "#!/bin/sh\ncase \"$*\" in *no-eslintrc*) echo '[]';; *) echo 'segfault' ; exit 2;; esac\n",
        );

        let validator = Validator::new(config());
        let result = validator
            .validate_project(dir.path(), false)
            .await
            .unwrap();
        // Lint degraded to empty; nothing else failed.
        assert!(result.is_valid);
    }

    #[tokio::test]
    async fn test_validate_project_fails_hard_on_lock_timeout() {
        let dir = tempdir().unwrap();
        let mut cfg = config();
        cfg.lock_timeout_ms = 100;

        let validator = Validator::new(cfg);
        let locks = validator.lock_manager();
        locks
            .acquire(dir.path(), Duration::from_secs(30))
            .await
            .unwrap();

        let err = validator
            .validate_project(dir.path(), true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Lock timeout"));
        locks.clear_all();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fast_path_failure_is_enhanced() {
        let dir = tempdir().unwrap();
        write_manifest_without_build(dir.path());
        install_fake_tool(
            dir.path(),
            "tsc",
            "#!/bin/sh\necho \"app/page.tsx(1,10): error TS2305: Module './ui' has no exported member 'Card'.\"\nexit 2\n",
        );

        let validator = Validator::new(config());
        let result = validator
            .validate_project(dir.path(), true)
            .await
            .unwrap();
        assert!(!result.is_valid);
        assert!(result.errors[0].message.contains("Recovery suggestions"));
    }
}
