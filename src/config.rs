//! Validator configuration
//!
//! All tunables live here with sensible defaults; a project may override
//! them through an optional `groundcontrol.json` at its root.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Project-root file that overrides the defaults when present.
const CONFIG_FILE: &str = "groundcontrol.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Diagnostics whose path contains this marker are vendor noise and
    /// are dropped outright.
    pub excluded_path_marker: String,
    /// Directories walked when scanning or snapshotting source files.
    pub source_roots: Vec<String>,
    /// Extensions treated as scannable source.
    pub source_extensions: Vec<String>,
    /// Runtime libraries every generated project must declare.
    pub required_runtime_deps: Vec<String>,
    /// Hard cap on the build subprocess.
    pub build_timeout_secs: u64,
    /// Cap on the type-checker and linter subprocesses.
    pub analyzer_timeout_secs: u64,
    /// Cap on dependency installation during auto-fix.
    pub install_timeout_secs: u64,
    /// Default lock acquisition/auto-release window.
    pub lock_timeout_ms: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            excluded_path_marker: "node_modules".to_string(),
            source_roots: vec![
                "app".to_string(),
                "pages".to_string(),
                "components".to_string(),
                "lib".to_string(),
                "src".to_string(),
            ],
            source_extensions: vec![
                "ts".to_string(),
                "tsx".to_string(),
                "js".to_string(),
                "jsx".to_string(),
                "mjs".to_string(),
                "cjs".to_string(),
            ],
            required_runtime_deps: vec!["react".to_string(), "react-dom".to_string()],
            build_timeout_secs: 240,
            analyzer_timeout_secs: 120,
            install_timeout_secs: 600,
            lock_timeout_ms: 30_000,
        }
    }
}

impl ValidatorConfig {
    /// Load overrides from the project directory, or return defaults.
    pub fn load(project_dir: &Path) -> Self {
        let path = project_dir.join(CONFIG_FILE);
        if let Ok(content) = fs::read_to_string(&path) {
            match serde_json::from_str(&content) {
                Ok(config) => return config,
                Err(err) => {
                    tracing::warn!(
                        "Ignoring malformed {} ({}); using defaults",
                        path.display(),
                        err
                    );
                }
            }
        }
        Self::default()
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    pub fn analyzer_timeout(&self) -> Duration {
        Duration::from_secs(self.analyzer_timeout_secs)
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn is_source_extension(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        self.source_extensions.iter().any(|e| *e == ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_when_no_config_file() {
        let dir = tempdir().unwrap();
        let config = ValidatorConfig::load(dir.path());
        assert_eq!(config.excluded_path_marker, "node_modules");
        assert_eq!(config.build_timeout_secs, 240);
        assert!(config.is_source_extension("tsx"));
        assert!(!config.is_source_extension("css"));
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("groundcontrol.json"),
            r#"{"build_timeout_secs": 60}"#,
        )
        .unwrap();

        let config = ValidatorConfig::load(dir.path());
        assert_eq!(config.build_timeout_secs, 60);
        assert_eq!(config.lock_timeout_ms, 30_000);
    }

    #[test]
    fn test_malformed_config_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("groundcontrol.json"), "{not json").unwrap();

        let config = ValidatorConfig::load(dir.path());
        assert_eq!(config.excluded_path_marker, "node_modules");
    }
}
