//! Snapshot/restore corruption recovery for a live project directory
//!
//! Captures file contents before an isolated operation and selectively
//! restores them afterwards: a file is only rewritten when its content
//! changed *and* the new content fails a structural syntax heuristic.
//! Changed-but-balanced files are treated as legitimate out-of-band edits
//! by the generation agent and left alone.

use crate::watch::WatcherRegistry;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Extensions captured into snapshots.
const SNAPSHOT_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "css", "html", "json",
];

/// Markup files checked by tag counting instead of brace counting.
const MARKUP_EXTENSIONS: &[&str] = &["html", "xml", "svg"];

#[derive(Debug, Clone)]
struct Snapshot {
    taken_at: DateTime<Utc>,
    /// Project-relative path -> captured content
    files: HashMap<String, String>,
}

/// Files rewritten (or not) by a restore pass.
#[derive(Debug, Clone, Default)]
pub struct RestoreOutcome {
    pub restored: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct IsolationOptions {
    pub create_snapshot: bool,
    pub restore_on_error: bool,
}

impl Default for IsolationOptions {
    fn default() -> Self {
        Self {
            create_snapshot: true,
            restore_on_error: true,
        }
    }
}

/// Owns at most one snapshot per directory; each `create_snapshot` call
/// replaces the previous one wholesale.
pub struct SnapshotManager {
    watchers: Arc<WatcherRegistry>,
    snapshots: Mutex<HashMap<PathBuf, Snapshot>>,
}

impl SnapshotManager {
    pub fn new(watchers: Arc<WatcherRegistry>) -> Self {
        Self {
            watchers,
            snapshots: Mutex::new(HashMap::new()),
        }
    }

    /// Close the external watch subscription for `dir` so validation and
    /// restore passes don't race against watcher reactions.
    pub fn disable_watchers(&self, dir: &Path) {
        self.watchers.suspend(dir);
    }

    pub fn enable_watchers(&self, dir: &Path) -> Result<()> {
        self.watchers.resume(dir)
    }

    /// Capture every snapshot-eligible file under the given roots.
    /// Returns the number of files captured.
    pub fn create_snapshot(&self, dir: &Path, roots: &[String]) -> Result<usize> {
        let mut files = HashMap::new();
        for root in roots {
            let root_path = dir.join(root);
            if !root_path.is_dir() {
                continue;
            }
            for entry in WalkDir::new(&root_path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) else {
                    continue;
                };
                if !SNAPSHOT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
                    continue;
                }
                let Ok(content) = fs::read_to_string(entry.path()) else {
                    // Binary or unreadable; not snapshot material.
                    continue;
                };
                let Ok(relative) = entry.path().strip_prefix(dir) else {
                    continue;
                };
                files.insert(relative.to_string_lossy().replace('\\', "/"), content);
            }
        }

        let count = files.len();
        let snapshot = Snapshot {
            taken_at: Utc::now(),
            files,
        };
        debug!(
            dir = %dir.display(),
            files = count,
            taken_at = %snapshot.taken_at,
            "Snapshot captured"
        );
        self.snapshots
            .lock()
            .expect("snapshot registry poisoned")
            .insert(dir.to_path_buf(), snapshot);
        Ok(count)
    }

    /// Undo corruption: rewrite a recorded file only when its current
    /// content differs from the snapshot *and* is structurally broken.
    pub fn restore_from_snapshot(&self, dir: &Path) -> Result<RestoreOutcome> {
        let snapshot = self
            .snapshots
            .lock()
            .expect("snapshot registry poisoned")
            .get(dir)
            .cloned();
        let Some(snapshot) = snapshot else {
            return Ok(RestoreOutcome::default());
        };

        let mut outcome = RestoreOutcome::default();
        for (relative, original) in &snapshot.files {
            let absolute = dir.join(relative);
            let needs_restore = match fs::read_to_string(&absolute) {
                Ok(current) => {
                    current != *original && !is_structurally_balanced(&current, &absolute)
                }
                // Deleted or unreadable counts as corruption.
                Err(_) => true,
            };
            if !needs_restore {
                continue;
            }
            match fs::write(&absolute, original) {
                Ok(()) => outcome.restored.push(relative.clone()),
                Err(err) => {
                    warn!(file = %relative, "Failed to restore from snapshot: {}", err);
                    outcome.failed.push(relative.clone());
                }
            }
        }

        if !outcome.restored.is_empty() {
            info!(
                dir = %dir.display(),
                restored = outcome.restored.len(),
                "Restored corrupted files from snapshot"
            );
        }
        Ok(outcome)
    }

    /// Compose the isolation window: suspend watchers, optionally
    /// snapshot, run the operation, optionally restore on error, and
    /// always re-enable watchers.
    pub async fn with_template_isolation<T, Fut>(
        &self,
        dir: &Path,
        roots: &[String],
        options: IsolationOptions,
        operation: Fut,
    ) -> Result<T>
    where
        Fut: std::future::Future<Output = Result<T>>,
    {
        self.disable_watchers(dir);

        if options.create_snapshot {
            if let Err(err) = self.create_snapshot(dir, roots) {
                warn!(dir = %dir.display(), "Snapshot capture failed: {}", err);
            }
        }

        let result = operation.await;

        if result.is_err() && options.restore_on_error {
            match self.restore_from_snapshot(dir) {
                Ok(outcome) if !outcome.failed.is_empty() => {
                    warn!(
                        failed = outcome.failed.len(),
                        "Some files could not be restored after failure"
                    );
                }
                Ok(_) => {}
                Err(err) => warn!("Restore after failure errored: {}", err),
            }
        }

        if let Err(err) = self.enable_watchers(dir) {
            warn!(dir = %dir.display(), "Failed to re-enable watchers: {}", err);
        }

        result
    }

    /// Discard all snapshots.
    pub fn cleanup(&self) {
        self.snapshots
            .lock()
            .expect("snapshot registry poisoned")
            .clear();
    }
}

/// Cheap structural check used to separate corruption from legitimate
/// edits. Counts brace/paren/bracket pairs outside strings and comments;
/// markup files compare open/close tag counts instead.
pub fn is_structurally_balanced(content: &str, path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if MARKUP_EXTENSIONS.contains(&ext.as_str()) {
        return markup_tags_balanced(content);
    }
    delimiters_balanced(content)
}

fn delimiters_balanced(content: &str) -> bool {
    let mut braces: i64 = 0;
    let mut parens: i64 = 0;
    let mut brackets: i64 = 0;

    let mut in_string: Option<char> = None;
    let mut in_line_comment = false;
    let mut in_block_comment = false;
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_line_comment {
            if ch == '\n' {
                in_line_comment = false;
            }
            continue;
        }
        if in_block_comment {
            if ch == '*' && chars.peek() == Some(&'/') {
                chars.next();
                in_block_comment = false;
            }
            continue;
        }
        if let Some(quote) = in_string {
            if ch == '\\' {
                chars.next();
            } else if ch == quote {
                in_string = None;
            } else if ch == '\n' && quote != '`' {
                // Unterminated single-line string; stop treating the rest
                // of the file as string content.
                in_string = None;
            }
            continue;
        }

        match ch {
            '"' | '\'' | '`' => in_string = Some(ch),
            '/' if chars.peek() == Some(&'/') => {
                chars.next();
                in_line_comment = true;
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                in_block_comment = true;
            }
            '{' => braces += 1,
            '}' => braces -= 1,
            '(' => parens += 1,
            ')' => parens -= 1,
            '[' => brackets += 1,
            ']' => brackets -= 1,
            _ => {}
        }

        if braces < 0 || parens < 0 || brackets < 0 {
            return false;
        }
    }

    braces == 0 && parens == 0 && brackets == 0
}

fn markup_tags_balanced(content: &str) -> bool {
    let mut opens: i64 = 0;
    let mut closes: i64 = 0;

    let bytes = content.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }
        let rest = &content[i + 1..];
        if rest.starts_with('/') {
            closes += 1;
        } else if rest.starts_with(|c: char| c.is_ascii_alphabetic()) {
            // Self-closing tags neither open nor close.
            let tag_end = rest.find('>').map(|pos| i + 1 + pos);
            let self_closing = tag_end
                .map(|end| content[..end].ends_with('/'))
                .unwrap_or(false);
            if !self_closing {
                opens += 1;
            }
        }
        i += 1;
    }

    opens == closes
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn manager() -> SnapshotManager {
        SnapshotManager::new(WatcherRegistry::new())
    }

    fn roots() -> Vec<String> {
        vec!["app".to_string()]
    }

    fn write_app_file(dir: &Path, name: &str, content: &str) {
        let app = dir.join("app");
        fs::create_dir_all(&app).unwrap();
        fs::write(app.join(name), content).unwrap();
    }

    #[test]
    fn test_unmatched_brace_is_unbalanced() {
        let path = Path::new("page.tsx");
        assert!(!is_structurally_balanced("function f() { const x = 1;", path));
        assert!(is_structurally_balanced("function f() { const x = 1; }", path));
    }

    #[test]
    fn test_braces_in_strings_and_comments_ignored() {
        let path = Path::new("page.ts");
        assert!(is_structurally_balanced(r#"const s = "{{{";"#, path));
        assert!(is_structurally_balanced("// {{{\nconst x = 1;", path));
        assert!(is_structurally_balanced("/* ( [ { */ const x = 1;", path));
        assert!(is_structurally_balanced("const t = `{ unclosed in template`;", path));
    }

    #[test]
    fn test_early_close_is_unbalanced() {
        let path = Path::new("page.ts");
        assert!(!is_structurally_balanced("} function f() {}", path));
    }

    #[test]
    fn test_markup_tag_counting() {
        let path = Path::new("index.html");
        assert!(is_structurally_balanced("<div><p>hi</p></div>", path));
        assert!(!is_structurally_balanced("<div><p>hi</p>", path));
        assert!(is_structurally_balanced("<div><img src=\"x\"/></div>", path));
    }

    #[test]
    fn test_restore_skips_unchanged_and_balanced_files() {
        let dir = tempdir().unwrap();
        let snapshots = manager();

        write_app_file(dir.path(), "same.tsx", "export default function A() { return 1 }\n");
        write_app_file(dir.path(), "edited.tsx", "export default function B() { return 1 }\n");
        snapshots.create_snapshot(dir.path(), &roots()).unwrap();

        // Legitimate, structurally balanced edit.
        write_app_file(dir.path(), "edited.tsx", "export default function B() { return 2 }\n");

        let outcome = snapshots.restore_from_snapshot(dir.path()).unwrap();
        assert!(outcome.restored.is_empty());
        assert!(outcome.failed.is_empty());
        assert!(
            fs::read_to_string(dir.path().join("app/edited.tsx"))
                .unwrap()
                .contains("return 2")
        );
    }

    #[test]
    fn test_restore_rewrites_corrupted_file() {
        let dir = tempdir().unwrap();
        let snapshots = manager();

        let original = "export default function C() { return 1 }\n";
        write_app_file(dir.path(), "broken.tsx", original);
        snapshots.create_snapshot(dir.path(), &roots()).unwrap();

        write_app_file(dir.path(), "broken.tsx", "export default function C() { return 1\n");

        let outcome = snapshots.restore_from_snapshot(dir.path()).unwrap();
        assert_eq!(outcome.restored, vec!["app/broken.tsx".to_string()]);
        assert_eq!(
            fs::read_to_string(dir.path().join("app/broken.tsx")).unwrap(),
            original
        );
    }

    #[test]
    fn test_restore_recreates_deleted_file() {
        let dir = tempdir().unwrap();
        let snapshots = manager();

        let original = "export const x = 1;\n";
        write_app_file(dir.path(), "gone.ts", original);
        snapshots.create_snapshot(dir.path(), &roots()).unwrap();
        fs::remove_file(dir.path().join("app/gone.ts")).unwrap();

        let outcome = snapshots.restore_from_snapshot(dir.path()).unwrap();
        assert_eq!(outcome.restored, vec!["app/gone.ts".to_string()]);
        assert_eq!(
            fs::read_to_string(dir.path().join("app/gone.ts")).unwrap(),
            original
        );
    }

    #[test]
    fn test_new_snapshot_replaces_previous() {
        let dir = tempdir().unwrap();
        let snapshots = manager();

        write_app_file(dir.path(), "one.ts", "const a = 1;\n");
        snapshots.create_snapshot(dir.path(), &roots()).unwrap();

        write_app_file(dir.path(), "one.ts", "const a = 2;\n");
        snapshots.create_snapshot(dir.path(), &roots()).unwrap();

        // Corrupt the file; restore must bring back the *second* capture.
        write_app_file(dir.path(), "one.ts", "const a = 2; {\n");
        let outcome = snapshots.restore_from_snapshot(dir.path()).unwrap();
        assert_eq!(outcome.restored.len(), 1);
        assert!(
            fs::read_to_string(dir.path().join("app/one.ts"))
                .unwrap()
                .contains("const a = 2;")
        );
    }

    #[tokio::test]
    async fn test_isolation_restores_on_error_and_resumes_watchers() {
        let dir = tempdir().unwrap();
        let watchers = WatcherRegistry::new();
        let snapshots = SnapshotManager::new(Arc::clone(&watchers));

        watchers.watch(dir.path(), Arc::new(|_: &Path| {})).unwrap();
        let original = "export const ok = true;\n";
        write_app_file(dir.path(), "guard.ts", original);

        let dir_path = dir.path().to_path_buf();
        let result: Result<()> = snapshots
            .with_template_isolation(dir.path(), &roots(), IsolationOptions::default(), async {
                write_app_file(&dir_path, "guard.ts", "export const ok = true; {{\n");
                anyhow::bail!("operation exploded")
            })
            .await;

        assert!(result.is_err());
        assert_eq!(
            fs::read_to_string(dir.path().join("app/guard.ts")).unwrap(),
            original
        );
        assert!(watchers.is_watching(dir.path()));
    }

    #[tokio::test]
    async fn test_isolation_keeps_changes_on_success() {
        let dir = tempdir().unwrap();
        let snapshots = manager();

        write_app_file(dir.path(), "keep.ts", "export const v = 1;\n");
        let dir_path = dir.path().to_path_buf();
        let result: Result<u32> = snapshots
            .with_template_isolation(dir.path(), &roots(), IsolationOptions::default(), async {
                write_app_file(&dir_path, "keep.ts", "export const v = 2;\n");
                Ok(42)
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert!(
            fs::read_to_string(dir.path().join("app/keep.ts"))
                .unwrap()
                .contains("v = 2")
        );
    }
}
