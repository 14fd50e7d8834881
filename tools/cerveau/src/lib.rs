pub mod actions;
pub mod config;
pub mod dashboard;
pub mod errors;
pub mod git;
pub mod github;
pub mod hotkeys;
pub mod log_retention;
pub mod logging;
pub mod metrics;
pub mod runtime;
pub mod selection;
pub mod tui;
pub mod workspace;

use clap::{error::ErrorKind, Parser, Subcommand, ValueEnum};
use config::{load_config, AppConfig, CliOverrides, EnvMap};
use dashboard::Dashboard;
use errors::CerveauError;
use github::{render_repo_table, GitHubClient, ResponseCache};
use hotkeys::DashboardVariant;
use logging::{append_run_log, init_run_logger, JsonlLogger, LogLevel};
use metrics::{ReportThresholds, SystemReport};
use runtime::Runtime;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "cerveau")]
#[command(version)]
#[command(about = "Terminal dashboard for a local workspace of projects")]
pub struct Cli {
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,
    #[arg(long, value_enum, global = true)]
    pub variant: Option<CliVariant>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Launch the interactive dashboard (the default).
    Dash,
    /// Host health.
    Sys {
        #[command(subcommand)]
        command: SysCommand,
    },
    /// Remote repository metadata.
    Gh {
        #[command(subcommand)]
        command: GhCommand,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum SysCommand {
    /// Print a one-shot health report as JSON.
    Report,
}

#[derive(Debug, Clone, Subcommand)]
pub enum GhCommand {
    /// List repositories for an owner.
    Repos {
        #[arg(long)]
        owner: Option<String>,
        #[arg(long, default_value_t = 30)]
        limit: usize,
    },
    /// Show one repository as JSON.
    Repo { full_name: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliVariant {
    Full,
    Browse,
}

impl From<CliVariant> for DashboardVariant {
    fn from(value: CliVariant) -> Self {
        match value {
            CliVariant::Full => DashboardVariant::Full,
            CliVariant::Browse => DashboardVariant::Browse,
        }
    }
}

pub fn run() -> Result<i32, CerveauError> {
    let args = std::env::args_os().collect::<Vec<_>>();
    let env = std::env::vars_os().collect::<Vec<_>>();
    let cwd = std::env::current_dir().map_err(|e| CerveauError::Io(e.to_string()))?;
    let runtime = Runtime::production();
    run_with_runtime(&args, &env, &cwd, &runtime)
}

pub fn run_with_runtime(
    args: &[std::ffi::OsString],
    env: &[(std::ffi::OsString, std::ffi::OsString)],
    cwd: &Path,
    runtime: &Runtime,
) -> Result<i32, CerveauError> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{error}");
                return Ok(0);
            }
            _ => return Err(CerveauError::Cli(error.to_string())),
        },
    };

    let env_map = env_to_map(env);
    let home = resolve_home(&env_map)?;

    let overrides = CliOverrides {
        config_path: cli.config.clone(),
        root: cli.root.clone(),
        variant: cli.variant.map(Into::into),
    };
    let cfg = load_config(&overrides, cwd, &home, runtime.file_system.as_ref())?;

    let mut logger = JsonlLogger::new(&cfg.logging.path);
    logger.budget_bytes = cfg.logging.budget_bytes;
    logger.min_level = LogLevel::parse(&cfg.logging.level).unwrap_or(LogLevel::Info);
    init_run_logger(logger);
    append_run_log(
        "info",
        "run.started",
        json!({
            "command": command_name(cli.command.as_ref()),
            "root": cfg.workspace.root.display().to_string(),
            "variant": cfg.dashboard.variant.as_str(),
        }),
    );

    match cli.command.unwrap_or(Command::Dash) {
        Command::Dash => run_dashboard(&cfg, runtime),
        Command::Sys {
            command: SysCommand::Report,
        } => run_sys_report(&cfg, runtime),
        Command::Gh { command } => run_gh(command, &cfg, &env_map, runtime),
    }
}

fn run_dashboard(cfg: &AppConfig, runtime: &Runtime) -> Result<i32, CerveauError> {
    let mut dashboard = Dashboard::new(
        runtime,
        cfg.workspace.root.clone(),
        cfg.dashboard.variant.bindings(),
        cfg.workspace.max_display_items,
    );
    dashboard.run()?;
    Ok(0)
}

fn run_sys_report(cfg: &AppConfig, runtime: &Runtime) -> Result<i32, CerveauError> {
    let report = SystemReport::build(
        &runtime.metrics.host_readings(),
        ReportThresholds {
            warn_load_1m: cfg.system.warn_load_1m,
            min_disk_free_gb: cfg.system.min_disk_free_gb,
        },
    );
    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|e| CerveauError::Io(format!("serialize report: {e}")))?;
    runtime.terminal.write_line(&rendered)?;
    Ok(0)
}

fn run_gh(
    command: GhCommand,
    cfg: &AppConfig,
    env: &EnvMap,
    runtime: &Runtime,
) -> Result<i32, CerveauError> {
    let token = env
        .get(&cfg.github.token_env)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| CerveauError::MissingToken(cfg.github.token_env.clone()))?;
    let cache = ResponseCache::new(
        &cfg.cache.dir,
        Duration::from_secs(cfg.cache.ttl_seconds),
        runtime.file_system.as_ref(),
        runtime.clock.as_ref(),
    );
    let client = GitHubClient::new(
        runtime.http.as_ref(),
        cache,
        token.clone(),
        cfg.github.api_base.clone(),
        cfg.github.default_owner.clone(),
    );

    match command {
        GhCommand::Repos { owner, limit } => {
            let repos = client.list_repos(owner.as_deref(), limit)?;
            runtime.terminal.write_line(&render_repo_table(&repos))?;
        }
        GhCommand::Repo { full_name } => {
            let repo = client.get_repo(&full_name)?;
            let rendered = serde_json::to_string_pretty(&repo)
                .map_err(|e| CerveauError::Http(format!("render repo: {e}")))?;
            runtime.terminal.write_line(&rendered)?;
        }
    }
    Ok(0)
}

fn command_name(command: Option<&Command>) -> &'static str {
    match command {
        None | Some(Command::Dash) => "dash",
        Some(Command::Sys { .. }) => "sys.report",
        Some(Command::Gh {
            command: GhCommand::Repos { .. },
        }) => "gh.repos",
        Some(Command::Gh {
            command: GhCommand::Repo { .. },
        }) => "gh.repo",
    }
}

fn resolve_home(env: &EnvMap) -> Result<PathBuf, CerveauError> {
    env.get("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .ok_or_else(|| CerveauError::InvalidConfig("cannot determine home directory".to_string()))
}

fn env_to_map(env: &[(std::ffi::OsString, std::ffi::OsString)]) -> EnvMap {
    let mut map = EnvMap::new();
    for (key, value) in env {
        if let (Some(key), Some(value)) = (key.to_str(), value.to_str()) {
            map.insert(key.to_string(), value.to_string());
        }
    }
    map
}
