//! One-level workspace scan. Only the direct children of the root are looked
//! at; nothing below them is traversed.

pub mod classify;

use crate::logging::append_run_log;
use crate::runtime::{FileSystem, ProcessRunner};
use classify::{classify, is_candidate_name};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const MAX_DISPLAY_ITEMS: usize = 30;

/// Immutable once scanned; a new scan produces new items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceItem {
    pub name: String,
    pub path: PathBuf,
    pub is_version_controlled: bool,
    pub is_package_project: bool,
    pub is_script_project: bool,
    pub is_notes_vault: bool,
    pub branch: String,
    pub last_commit_age: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanCounts {
    pub dirs: usize,
    pub git: usize,
    pub script: usize,
    pub package: usize,
    pub vault: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    items: Vec<WorkspaceItem>,
}

impl ScanResult {
    pub fn new(mut items: Vec<WorkspaceItem>) -> Self {
        items.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        });
        Self { items }
    }

    pub fn items(&self) -> &[WorkspaceItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&WorkspaceItem> {
        self.items.get(index)
    }

    /// The rendered window. The scan itself is never capped.
    pub fn visible(&self, max_items: usize) -> &[WorkspaceItem] {
        &self.items[..self.items.len().min(max_items)]
    }

    pub fn counts(&self) -> ScanCounts {
        ScanCounts {
            dirs: self.items.len(),
            git: self.items.iter().filter(|it| it.is_version_controlled).count(),
            script: self.items.iter().filter(|it| it.is_script_project).count(),
            package: self.items.iter().filter(|it| it.is_package_project).count(),
            vault: self.items.iter().filter(|it| it.is_notes_vault).count(),
        }
    }
}

/// A missing or unreadable root is a normal "nothing yet" state: empty result.
pub fn scan_workspace(
    root: &Path,
    fs: &dyn FileSystem,
    runner: &dyn ProcessRunner,
) -> ScanResult {
    let started = Instant::now();
    let entries = match fs.list_dir(root) {
        Ok(entries) => entries,
        Err(err) => {
            append_run_log(
                "warn",
                "scan.root_missing",
                json!({
                    "root": root.display().to_string(),
                    "error": err.to_string()
                }),
            );
            return ScanResult::default();
        }
    };

    let items = entries
        .into_iter()
        .filter(|path| fs.is_dir(path))
        .filter_map(|path| {
            let name = path.file_name()?.to_string_lossy().to_string();
            is_candidate_name(&name).then_some((name, path))
        })
        .map(|(name, path)| {
            let class = classify(&path, fs, runner);
            WorkspaceItem {
                name,
                path,
                is_version_controlled: class.is_version_controlled,
                is_package_project: class.is_package_project,
                is_script_project: class.is_script_project,
                is_notes_vault: class.is_notes_vault,
                branch: class.branch,
                last_commit_age: class.last_commit_age,
            }
        })
        .collect::<Vec<_>>();

    let result = ScanResult::new(items);
    append_run_log(
        "debug",
        "scan.completed",
        json!({
            "root": root.display().to_string(),
            "items": result.len(),
            "elapsed_ms": started.elapsed().as_millis() as u64
        }),
    );
    result
}
