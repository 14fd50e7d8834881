//! Key → intent resolution and intent execution.
//!
//! Effects are pure: resolving a key yields an [`Intent`] built from the
//! cycle's scan and selection. Only [`execute_plan`] touches processes.

use crate::errors::CerveauError;
use crate::hotkeys::{action_for_key, ActionKind, HotkeyBinding};
use crate::logging::append_run_log;
use crate::runtime::{FileSystem, ProcessRequest, ProcessRunner, StdioMode, Terminal};
use crate::selection::SelectionState;
use crate::workspace::{ScanResult, WorkspaceItem};
use serde_json::json;
use std::path::{Path, PathBuf};

pub const ENV_DIR: &str = ".venv";
pub const DEPENDENCY_MANIFEST: &str = "requirements.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionStep {
    pub request: ProcessRequest,
    /// The step is skipped when this path already exists.
    pub unless_exists: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionPlan {
    pub action: ActionKind,
    pub target: PathBuf,
    pub steps: Vec<ActionStep>,
    /// Wait for a key afterwards so the command's output stays readable.
    pub pause_after: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    MoveSelection(isize),
    Run(ActionPlan),
    Refresh,
    Quit,
    /// Bound key whose precondition does not hold for the selection.
    Skip(ActionKind),
}

/// Bindings closed over one cycle's scan and selection.
pub struct ActionRegistry<'a> {
    bindings: &'static [HotkeyBinding],
    scan: &'a ScanResult,
    selection: SelectionState,
}

impl<'a> ActionRegistry<'a> {
    pub fn new(
        bindings: &'static [HotkeyBinding],
        scan: &'a ScanResult,
        selection: SelectionState,
    ) -> Self {
        Self {
            bindings,
            scan,
            selection,
        }
    }

    pub fn bindings(&self) -> &'static [HotkeyBinding] {
        self.bindings
    }

    pub fn selected(&self) -> Option<&'a WorkspaceItem> {
        self.selection.selected(self.scan)
    }

    /// `None` for keys that are not bound at all.
    pub fn resolve(&self, key: char) -> Option<Intent> {
        action_for_key(self.bindings, key).map(|action| self.effect(action))
    }

    pub fn effect(&self, action: ActionKind) -> Intent {
        match action {
            ActionKind::SelectNext => Intent::MoveSelection(1),
            ActionKind::SelectPrevious => Intent::MoveSelection(-1),
            ActionKind::Refresh => Intent::Refresh,
            ActionKind::Quit => Intent::Quit,
            ActionKind::Open => match self.selected() {
                Some(item) => Intent::Run(open_plan(item)),
                None => Intent::Skip(action),
            },
            ActionKind::VersionControlStatus => match self.selected() {
                Some(item) if item.is_version_controlled => Intent::Run(vcs_status_plan(item)),
                _ => Intent::Skip(action),
            },
            ActionKind::RunDevServer => match self.selected() {
                Some(item) if item.is_package_project => Intent::Run(dev_server_plan(item)),
                _ => Intent::Skip(action),
            },
            ActionKind::BootstrapScriptProject => match self.selected() {
                Some(item) if item.is_script_project => Intent::Run(bootstrap_plan(item)),
                _ => Intent::Skip(action),
            },
        }
    }
}

fn opener_program() -> &'static str {
    if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}

fn open_plan(item: &WorkspaceItem) -> ActionPlan {
    ActionPlan {
        action: ActionKind::Open,
        target: item.path.clone(),
        steps: vec![ActionStep {
            request: ProcessRequest {
                program: opener_program().to_string(),
                args: vec![item.path.display().to_string()],
                cwd: None,
                stdio: StdioMode::Inherited,
            },
            unless_exists: None,
        }],
        pause_after: false,
    }
}

fn vcs_status_plan(item: &WorkspaceItem) -> ActionPlan {
    ActionPlan {
        action: ActionKind::VersionControlStatus,
        target: item.path.clone(),
        steps: vec![ActionStep {
            request: ProcessRequest::shell(
                "git status --porcelain=v1 && echo '---' && git status",
                &item.path,
            ),
            unless_exists: None,
        }],
        pause_after: true,
    }
}

fn dev_server_plan(item: &WorkspaceItem) -> ActionPlan {
    ActionPlan {
        action: ActionKind::RunDevServer,
        target: item.path.clone(),
        steps: vec![ActionStep {
            request: ProcessRequest::shell("npm install && npm run dev", &item.path),
            unless_exists: None,
        }],
        pause_after: false,
    }
}

fn bootstrap_plan(item: &WorkspaceItem) -> ActionPlan {
    let install = format!(
        ". {ENV_DIR}/bin/activate && python -m pip install -U pip \
         && if [ -f {DEPENDENCY_MANIFEST} ]; then pip install -r {DEPENDENCY_MANIFEST}; fi \
         && if [ -f pyproject.toml ]; then echo 'pyproject.toml detected (poetry/pip-tools possible)'; fi"
    );
    ActionPlan {
        action: ActionKind::BootstrapScriptProject,
        target: item.path.clone(),
        steps: vec![
            ActionStep {
                request: ProcessRequest {
                    program: "python3".to_string(),
                    args: vec!["-m".to_string(), "venv".to_string(), ENV_DIR.to_string()],
                    cwd: Some(item.path.clone()),
                    stdio: StdioMode::Inherited,
                },
                unless_exists: Some(item.path.join(ENV_DIR)),
            },
            ActionStep {
                request: ProcessRequest::shell(&install, &item.path),
                unless_exists: None,
            },
        ],
        pause_after: true,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Skipped,
    Exited(i32),
    SpawnFailed(String),
}

/// Runs each step to completion, in order. The first failing step ends the
/// plan; failures are shown on the terminal and logged, never returned.
pub fn execute_plan(
    plan: &ActionPlan,
    runner: &dyn ProcessRunner,
    fs: &dyn FileSystem,
    terminal: &dyn Terminal,
) -> Result<Vec<StepOutcome>, CerveauError> {
    append_run_log(
        "info",
        "action.dispatched",
        json!({
            "action": plan.action.as_str(),
            "target": plan.target.display().to_string(),
            "steps": plan.steps.len()
        }),
    );

    let mut outcomes = Vec::with_capacity(plan.steps.len());
    for step in &plan.steps {
        if step.unless_exists.as_deref().is_some_and(|path| fs.exists(path)) {
            outcomes.push(StepOutcome::Skipped);
            continue;
        }
        let outcome = run_step(&step.request, runner);
        let failed = !matches!(outcome, StepOutcome::Exited(0));
        if let StepOutcome::SpawnFailed(reason) = &outcome {
            terminal.write_line(&format!("cerveau: {reason}"))?;
        }
        outcomes.push(outcome);
        if failed {
            break;
        }
    }

    let failed = outcomes
        .iter()
        .any(|outcome| !matches!(outcome, StepOutcome::Skipped | StepOutcome::Exited(0)));
    if plan.pause_after || failed {
        terminal.write_line("-- press any key to return to the dashboard --")?;
        let _ = terminal.read_key()?;
    }
    Ok(outcomes)
}

fn run_step(request: &ProcessRequest, runner: &dyn ProcessRunner) -> StepOutcome {
    let command = request.display_command();
    let cwd = request
        .cwd
        .as_deref()
        .map(Path::display)
        .map(|d| d.to_string());
    append_run_log(
        "info",
        "action.step.started",
        json!({ "command": command, "cwd": cwd }),
    );
    match runner.run(request.clone()) {
        Ok(out) => {
            append_run_log(
                if out.exit_code == 0 { "info" } else { "warn" },
                "action.step.finished",
                json!({ "command": command, "exit_code": out.exit_code }),
            );
            StepOutcome::Exited(out.exit_code)
        }
        Err(err) => {
            append_run_log(
                "error",
                "action.step.failed",
                json!({ "command": command, "error": err.to_string() }),
            );
            StepOutcome::SpawnFailed(err.to_string())
        }
    }
}
