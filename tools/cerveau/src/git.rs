use crate::logging::append_run_log;
use crate::runtime::{ProcessRequest, ProcessRunner};
use serde_json::json;
use std::path::{Path, PathBuf};

pub const SENTINEL: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradeReason {
    SpawnFailed(String),
    NonZeroExit(i32),
    EmptyOutput,
}

/// Outcome of a best-effort git lookup. Failures degrade, they never propagate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(String),
    Degraded(DegradeReason),
}

impl Lookup {
    pub fn display(&self) -> &str {
        match self {
            Self::Found(value) => value,
            Self::Degraded(_) => SENTINEL,
        }
    }

    pub fn into_display(self) -> String {
        match self {
            Self::Found(value) => value,
            Self::Degraded(_) => SENTINEL.to_string(),
        }
    }
}

pub struct GitClient<'a> {
    runner: &'a dyn ProcessRunner,
    cwd: PathBuf,
}

impl<'a> GitClient<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, cwd: impl AsRef<Path>) -> Self {
        Self {
            runner,
            cwd: cwd.as_ref().to_path_buf(),
        }
    }

    /// `HEAD` on a detached checkout; degraded when the repo has no commits.
    pub fn current_branch(&self) -> Lookup {
        self.lookup("branch", &["rev-parse", "--abbrev-ref", "HEAD"])
    }

    /// Committer date relative to now, e.g. "2 days ago".
    pub fn last_commit_relative(&self) -> Lookup {
        self.lookup("last_commit", &["log", "-1", "--pretty=%cr"])
    }

    fn lookup(&self, field: &str, args: &[&str]) -> Lookup {
        let result = match self
            .runner
            .run(ProcessRequest::captured("git", args, &self.cwd))
        {
            Err(err) => Lookup::Degraded(DegradeReason::SpawnFailed(err.to_string())),
            Ok(out) if out.exit_code != 0 => {
                Lookup::Degraded(DegradeReason::NonZeroExit(out.exit_code))
            }
            Ok(out) => match out.stdout.trim() {
                "" => Lookup::Degraded(DegradeReason::EmptyOutput),
                value => Lookup::Found(value.to_string()),
            },
        };
        if let Lookup::Degraded(reason) = &result {
            append_run_log(
                "debug",
                "classify.lookup_degraded",
                json!({
                    "cwd": self.cwd.display().to_string(),
                    "field": field,
                    "reason": format!("{reason:?}")
                }),
            );
        }
        result
    }
}
