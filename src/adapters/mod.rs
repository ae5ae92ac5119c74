//! Analyzer adapters
//!
//! One module per external tool. Each adapter spawns its tool with a
//! fixed argument list, captures stdout/stderr, and parses the text into
//! the shared diagnostic model. Adapters never panic on weird output;
//! ambiguity degrades into diagnostics or an `Err` the orchestrator can
//! isolate.

pub mod build;
pub mod contrast;
pub mod deps;
pub mod lint;
pub mod typecheck;

use crate::config::ValidatorConfig;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Collect scannable source files under the configured roots, skipping
/// vendor paths.
pub fn collect_source_files(dir: &Path, config: &ValidatorConfig) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for root in &config.source_roots {
        let root_path = dir.join(root);
        if !root_path.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&root_path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            if path
                .to_string_lossy()
                .contains(&config.excluded_path_marker)
            {
                continue;
            }
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if config.is_source_extension(ext) {
                files.push(path.to_path_buf());
            }
        }
    }
    files.sort();
    files
}

/// Project-relative, forward-slashed display path.
pub fn relative_display(dir: &Path, path: &Path) -> String {
    path.strip_prefix(dir)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_collect_source_files_filters_and_sorts() {
        let dir = tempdir().unwrap();
        let config = ValidatorConfig::default();

        fs::create_dir_all(dir.path().join("app")).unwrap();
        fs::create_dir_all(dir.path().join("app/node_modules/pkg")).unwrap();
        fs::write(dir.path().join("app/b.tsx"), "").unwrap();
        fs::write(dir.path().join("app/a.ts"), "").unwrap();
        fs::write(dir.path().join("app/styles.css"), "").unwrap();
        fs::write(dir.path().join("app/node_modules/pkg/index.ts"), "").unwrap();

        let files = collect_source_files(dir.path(), &config);
        let names: Vec<String> = files
            .iter()
            .map(|p| relative_display(dir.path(), p))
            .collect();
        assert_eq!(names, vec!["app/a.ts", "app/b.tsx"]);
    }
}
