//! Marker-file classification of a single workspace directory.

use crate::git::{GitClient, SENTINEL};
use crate::runtime::{FileSystem, ProcessRunner};
use std::path::Path;

pub const VCS_MARKER: &str = ".git";
pub const PACKAGE_MARKERS: [&str; 1] = ["package.json"];
pub const SCRIPT_MARKERS: [&str; 4] = ["pyproject.toml", "requirements.txt", "setup.py", "Pipfile"];
/// The one hidden name that survives scanning; it is also what makes a vault.
pub const VAULT_MARKER: &str = ".obsidian";
pub const NOISE_DIRS: [&str; 6] = [
    "node_modules",
    "__pycache__",
    ".venv",
    "dist",
    "build",
    ".cache",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub is_version_controlled: bool,
    pub is_package_project: bool,
    pub is_script_project: bool,
    pub is_notes_vault: bool,
    pub branch: String,
    pub last_commit_age: String,
}

/// Name-level filter applied before any classification work.
pub fn is_candidate_name(name: &str) -> bool {
    if name.starts_with('.') && name != VAULT_MARKER {
        return false;
    }
    !NOISE_DIRS.contains(&name)
}

fn has_any(fs: &dyn FileSystem, dir: &Path, markers: &[&str]) -> bool {
    markers.iter().any(|marker| fs.exists(&dir.join(marker)))
}

pub fn classify(dir: &Path, fs: &dyn FileSystem, runner: &dyn ProcessRunner) -> Classification {
    let is_version_controlled = fs.exists(&dir.join(VCS_MARKER));
    let (branch, last_commit_age) = if is_version_controlled {
        let git = GitClient::new(runner, dir);
        (
            git.current_branch().into_display(),
            git.last_commit_relative().into_display(),
        )
    } else {
        (SENTINEL.to_string(), SENTINEL.to_string())
    };
    let named_vault = dir
        .file_name()
        .is_some_and(|name| name == VAULT_MARKER);

    Classification {
        is_version_controlled,
        is_package_project: has_any(fs, dir, &PACKAGE_MARKERS),
        is_script_project: has_any(fs, dir, &SCRIPT_MARKERS),
        is_notes_vault: named_vault || fs.exists(&dir.join(VAULT_MARKER)),
        branch,
        last_commit_age,
    }
}

#[cfg(test)]
mod tests {
    use super::{classify, is_candidate_name, NOISE_DIRS, SCRIPT_MARKERS};
    use crate::runtime::{FakeFileSystem, FakeProcessRunner, ProcessOutput, ProductionFileSystem};
    use std::fs;
    use std::path::Path;

    #[test]
    fn hidden_names_rejected_except_vault_marker() {
        assert!(!is_candidate_name(".git"));
        assert!(!is_candidate_name(".obsidian-vault"));
        assert!(is_candidate_name(".obsidian"));
        assert!(is_candidate_name("proj-a"));
        for noise in NOISE_DIRS {
            assert!(!is_candidate_name(noise), "{noise} should be noise");
        }
    }

    #[test]
    fn markers_are_non_exclusive() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("package.json"), "{}").expect("package.json");
        fs::write(dir.path().join("requirements.txt"), "").expect("requirements");
        fs::create_dir(dir.path().join(".obsidian")).expect("vault");

        let runner = FakeProcessRunner::default();
        let class = classify(dir.path(), &ProductionFileSystem, &runner);
        assert!(class.is_package_project);
        assert!(class.is_script_project);
        assert!(class.is_notes_vault);
        assert!(!class.is_version_controlled);
        assert_eq!(class.branch, "-");
        assert_eq!(class.last_commit_age, "-");
        assert!(runner.spawned().is_empty(), "no git lookups off-repo");
    }

    #[test]
    fn every_script_marker_counts() {
        for marker in SCRIPT_MARKERS {
            let dir = tempfile::tempdir().expect("tempdir");
            fs::write(dir.path().join(marker), "").expect("marker");
            let class = classify(dir.path(), &ProductionFileSystem, &FakeProcessRunner::default());
            assert!(class.is_script_project, "{marker} should mark a script project");
            assert!(!class.is_package_project);
        }
    }

    #[test]
    fn version_controlled_dir_gets_branch_and_age() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join(".git")).expect("git dir");
        let runner = FakeProcessRunner::default();
        runner.push_response(Ok(ProcessOutput::success("main\n")));
        runner.push_response(Ok(ProcessOutput::success("2 days ago\n")));

        let class = classify(dir.path(), &ProductionFileSystem, &runner);
        assert!(class.is_version_controlled);
        assert_eq!(class.branch, "main");
        assert_eq!(class.last_commit_age, "2 days ago");
    }

    #[test]
    fn failing_lookups_never_escape_classification() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join(".git")).expect("git dir");
        let runner = FakeProcessRunner::default();
        let class = classify(dir.path(), &ProductionFileSystem, &runner);
        assert!(class.is_version_controlled);
        assert_eq!(class.branch, "-");
        assert_eq!(class.last_commit_age, "-");
    }

    #[test]
    fn markers_are_read_through_the_file_system_seam() {
        let fs = FakeFileSystem::default();
        fs.add_dir("/ws/site");
        fs.add_dir("/ws/site/.git");
        fs.add_file("/ws/site/package.json", "{}");
        let runner = FakeProcessRunner::default();
        runner.push_response(Ok(ProcessOutput::success("trunk\n")));
        runner.push_response(Ok(ProcessOutput::success("5 days ago\n")));

        let class = classify(Path::new("/ws/site"), &fs, &runner);
        assert!(class.is_version_controlled);
        assert!(class.is_package_project);
        assert!(!class.is_script_project);
        assert!(!class.is_notes_vault);
        assert_eq!(class.branch, "trunk");
    }
}
