//! Node toolchain discovery: package manager, project binaries, manifest.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Package manager in use, detected from lockfiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Npm,
    Pnpm,
    Yarn,
    Bun,
}

impl PackageManager {
    pub fn detect(project_dir: &Path) -> Self {
        if project_dir.join("pnpm-lock.yaml").exists() {
            PackageManager::Pnpm
        } else if project_dir.join("yarn.lock").exists() {
            PackageManager::Yarn
        } else if project_dir.join("bun.lockb").exists() || project_dir.join("bun.lock").exists() {
            PackageManager::Bun
        } else {
            PackageManager::Npm
        }
    }

    pub fn program(&self) -> &'static str {
        match self {
            PackageManager::Npm => "npm",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Yarn => "yarn",
            PackageManager::Bun => "bun",
        }
    }

    /// Arguments to run a `package.json` script.
    pub fn run_script_args(&self, script: &str) -> Vec<String> {
        match self {
            PackageManager::Npm => vec![
                "run".to_string(),
                script.to_string(),
                "--silent".to_string(),
            ],
            PackageManager::Pnpm | PackageManager::Yarn => vec![script.to_string()],
            PackageManager::Bun => vec!["run".to_string(), script.to_string()],
        }
    }

    pub fn install_args(&self) -> Vec<String> {
        vec!["install".to_string()]
    }
}

/// Resolve a project-local tool binary under `node_modules/.bin`.
///
/// Falls back to `npx --no-install <name>` when the binary is absent, so
/// a missing install surfaces as the tool's own error output instead of a
/// spawn failure.
pub fn resolve_bin(project_dir: &Path, name: &str) -> (PathBuf, Vec<String>) {
    let candidates = [
        project_dir.join("node_modules").join(".bin").join(name),
        project_dir
            .join("node_modules")
            .join(".bin")
            .join(format!("{}.cmd", name)),
    ];
    if let Some(found) = candidates.into_iter().find(|path| path.exists()) {
        return (found, Vec::new());
    }
    (
        PathBuf::from("npx"),
        vec!["--no-install".to_string(), name.to_string()],
    )
}

/// Parsed `package.json`, limited to the fields the pipeline reads.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    json: serde_json::Value,
}

impl Manifest {
    pub fn read(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join("package.json");
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let json = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Self { json })
    }

    pub fn script(&self, name: &str) -> Option<&str> {
        self.json
            .get("scripts")
            .and_then(|v| v.as_object())
            .and_then(|scripts| scripts.get(name))
            .and_then(|v| v.as_str())
    }

    /// True when `name` appears in dependencies or devDependencies.
    pub fn has_dependency(&self, name: &str) -> bool {
        ["dependencies", "devDependencies"].iter().any(|section| {
            self.json
                .get(*section)
                .and_then(|v| v.as_object())
                .map(|deps| deps.contains_key(name))
                .unwrap_or(false)
        })
    }
}
