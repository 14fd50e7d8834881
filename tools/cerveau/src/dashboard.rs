//! The scan → render → key → dispatch cycle.

use crate::actions::{execute_plan, ActionRegistry, Intent};
use crate::errors::CerveauError;
use crate::hotkeys::HotkeyBinding;
use crate::logging::append_run_log;
use crate::runtime::Runtime;
use crate::selection::SelectionState;
use crate::tui::{render_dashboard, RenderModel};
use crate::workspace::scan_workspace;
use serde_json::json;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Terminated,
}

pub struct Dashboard<'a> {
    runtime: &'a Runtime,
    root: PathBuf,
    bindings: &'static [HotkeyBinding],
    max_display: usize,
    selection: SelectionState,
}

impl<'a> Dashboard<'a> {
    pub fn new(
        runtime: &'a Runtime,
        root: PathBuf,
        bindings: &'static [HotkeyBinding],
        max_display: usize,
    ) -> Self {
        Self {
            runtime,
            root,
            bindings,
            max_display,
            selection: SelectionState::default(),
        }
    }

    pub fn selection(&self) -> SelectionState {
        self.selection
    }

    /// Runs until the quit key. Only terminal I/O failures end it early.
    pub fn run(&mut self) -> Result<usize, CerveauError> {
        append_run_log(
            "info",
            "dashboard.started",
            json!({
                "root": self.root.display().to_string(),
                "bindings": self.bindings.len()
            }),
        );
        let mut cycles = 0usize;
        loop {
            cycles += 1;
            if self.step()? == LoopState::Terminated {
                append_run_log("info", "dashboard.terminated", json!({ "cycles": cycles }));
                return Ok(cycles);
            }
        }
    }

    /// One full iteration: always rescans, so refresh needs no work of its own.
    pub fn step(&mut self) -> Result<LoopState, CerveauError> {
        let runtime = self.runtime;
        let scan = scan_workspace(
            &self.root,
            runtime.file_system.as_ref(),
            runtime.process_runner.as_ref(),
        );
        self.selection.clamp_to(scan.len());

        let registry = ActionRegistry::new(self.bindings, &scan, self.selection);
        let model = RenderModel {
            root: &self.root,
            bindings: registry.bindings(),
            metrics: runtime.metrics.snapshot(),
            scan: &scan,
            selected_index: (!scan.is_empty()).then_some(self.selection.index()),
            max_display: self.max_display,
        };
        let (width, height) = runtime.terminal.size();
        runtime
            .terminal
            .draw(&render_dashboard(&model, width, height)?)?;

        let Some(key) = runtime.terminal.read_key()? else {
            return Ok(LoopState::Running);
        };
        let Some(intent) = registry.resolve(key) else {
            return Ok(LoopState::Running);
        };

        match intent {
            Intent::Quit => return Ok(LoopState::Terminated),
            Intent::MoveSelection(delta) => self.selection.shift(delta, scan.len()),
            Intent::Run(plan) => {
                execute_plan(
                    &plan,
                    runtime.process_runner.as_ref(),
                    runtime.file_system.as_ref(),
                    runtime.terminal.as_ref(),
                )?;
            }
            Intent::Skip(action) => append_run_log(
                "debug",
                "action.skipped",
                json!({
                    "action": action.as_str(),
                    "selected": registry.selected().map(|item| item.name.clone())
                }),
            ),
            Intent::Refresh => {}
        }
        Ok(LoopState::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::{Dashboard, LoopState};
    use crate::github::FakeTransport;
    use crate::hotkeys::FULL_BINDINGS;
    use crate::metrics::FixedMetrics;
    use crate::runtime::{FakeClock, FakeProcessRunner, FakeTerminal, ProductionFileSystem, Runtime};
    use std::fs;
    use std::sync::Arc;

    fn runtime(terminal: &FakeTerminal, runner: &FakeProcessRunner) -> Runtime {
        Runtime {
            clock: Arc::new(FakeClock::default()),
            file_system: Arc::new(ProductionFileSystem),
            process_runner: Arc::new(runner.clone()),
            terminal: Arc::new(terminal.clone()),
            metrics: Arc::new(FixedMetrics::default()),
            http: Arc::new(FakeTransport::default()),
        }
    }

    #[test]
    fn unknown_keys_and_enter_keep_running() {
        let dir = tempfile::tempdir().expect("tempdir");
        let terminal = FakeTerminal::with_keys(&['z']);
        terminal.push_key(None);
        let runner = FakeProcessRunner::default();
        let rt = runtime(&terminal, &runner);
        let mut dash = Dashboard::new(&rt, dir.path().to_path_buf(), &FULL_BINDINGS, 30);

        assert_eq!(dash.step().expect("step"), LoopState::Running);
        assert_eq!(dash.step().expect("step"), LoopState::Running);
        assert_eq!(dash.step().expect("step"), LoopState::Terminated);
        assert_eq!(terminal.drawn_frames().len(), 3);
        assert!(runner.spawned().is_empty());
    }

    #[test]
    fn selection_is_clamped_after_the_workspace_shrinks() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["a", "b", "c"] {
            fs::create_dir(dir.path().join(name)).expect("mkdir");
        }
        let terminal = FakeTerminal::with_keys(&['k', 'r']);
        let runner = FakeProcessRunner::default();
        let rt = runtime(&terminal, &runner);
        let mut dash = Dashboard::new(&rt, dir.path().to_path_buf(), &FULL_BINDINGS, 30);

        dash.step().expect("wrap to last");
        assert_eq!(dash.selection().index(), 2);

        fs::remove_dir(dir.path().join("c")).expect("rm c");
        fs::remove_dir(dir.path().join("b")).expect("rm b");
        dash.step().expect("refresh");
        assert_eq!(dash.selection().index(), 0);
        let frames = terminal.drawn_frames();
        assert!(frames[1].contains("Selected: a"));
    }

    #[test]
    fn run_counts_cycles_until_quit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let terminal = FakeTerminal::with_keys(&['j', 'r', 'x']);
        let runner = FakeProcessRunner::default();
        let rt = runtime(&terminal, &runner);
        let mut dash = Dashboard::new(&rt, dir.path().join("missing"), &FULL_BINDINGS, 30);
        assert_eq!(dash.run().expect("run"), 4);
    }
}
