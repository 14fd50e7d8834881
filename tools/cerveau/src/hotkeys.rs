use serde::{Deserialize, Serialize};

pub const QUIT_KEY: char = 'q';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    SelectNext,
    SelectPrevious,
    Open,
    VersionControlStatus,
    RunDevServer,
    BootstrapScriptProject,
    Refresh,
    Quit,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelectNext => "select_next",
            Self::SelectPrevious => "select_previous",
            Self::Open => "open",
            Self::VersionControlStatus => "vcs_status",
            Self::RunDevServer => "run_dev_server",
            Self::BootstrapScriptProject => "bootstrap_script_project",
            Self::Refresh => "refresh",
            Self::Quit => "quit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyBinding {
    pub key: char,
    pub label: &'static str,
    pub action: ActionKind,
}

const fn bind(key: char, label: &'static str, action: ActionKind) -> HotkeyBinding {
    HotkeyBinding { key, label, action }
}

pub const FULL_BINDINGS: [HotkeyBinding; 8] = [
    bind('j', "↓ Select next", ActionKind::SelectNext),
    bind('k', "↑ Select prev", ActionKind::SelectPrevious),
    bind('o', "Open folder", ActionKind::Open),
    bind('g', "Git status (quick)", ActionKind::VersionControlStatus),
    bind('n', "npm dev (if Node)", ActionKind::RunDevServer),
    bind('p', "python setup (if Python)", ActionKind::BootstrapScriptProject),
    bind('r', "Refresh", ActionKind::Refresh),
    bind(QUIT_KEY, "Quit", ActionKind::Quit),
];

pub const BROWSE_BINDINGS: [HotkeyBinding; 5] = [
    bind('j', "↓ Select next", ActionKind::SelectNext),
    bind('k', "↑ Select prev", ActionKind::SelectPrevious),
    bind('o', "Open folder", ActionKind::Open),
    bind('r', "Refresh", ActionKind::Refresh),
    bind(QUIT_KEY, "Quit", ActionKind::Quit),
];

/// Which action table the dashboard runs with. Both share one engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DashboardVariant {
    #[default]
    Full,
    Browse,
}

impl DashboardVariant {
    pub fn bindings(self) -> &'static [HotkeyBinding] {
        match self {
            Self::Full => &FULL_BINDINGS,
            Self::Browse => &BROWSE_BINDINGS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Browse => "browse",
        }
    }
}

pub fn action_for_key(bindings: &[HotkeyBinding], key: char) -> Option<ActionKind> {
    bindings
        .iter()
        .find(|binding| binding.key == key)
        .map(|binding| binding.action)
}

pub fn controls_legend(bindings: &[HotkeyBinding]) -> String {
    let parts = bindings
        .iter()
        .map(|binding| format!("{} {}", binding.key, short_name(binding.action)))
        .collect::<Vec<_>>();
    format!("Keys: {}", parts.join("  "))
}

fn short_name(action: ActionKind) -> &'static str {
    match action {
        ActionKind::SelectNext => "next",
        ActionKind::SelectPrevious => "prev",
        ActionKind::Open => "open",
        ActionKind::VersionControlStatus => "git",
        ActionKind::RunDevServer => "dev",
        ActionKind::BootstrapScriptProject => "setup",
        ActionKind::Refresh => "refresh",
        ActionKind::Quit => "quit",
    }
}
