use crate::errors::CerveauError;
use crate::hotkeys::DashboardVariant;
use crate::logging::{LogLevel, DEFAULT_DISK_BUDGET_BYTES};
use crate::runtime::FileSystem;
use crate::workspace::MAX_DISPLAY_ITEMS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub type EnvMap = BTreeMap<String, String>;

/// Looked up under the home directory when `--config` is not given.
pub const USER_CONFIG_RELATIVE: &str = ".config/cerveau/config.toml";

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub root: Option<PathBuf>,
    pub variant: Option<DashboardVariant>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub workspace: WorkspaceConfig,
    pub dashboard: DashboardConfig,
    pub system: SystemConfig,
    pub github: GithubConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkspaceConfig {
    pub root: PathBuf,
    pub max_display_items: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardConfig {
    pub variant: DashboardVariant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemConfig {
    pub min_disk_free_gb: f64,
    pub warn_load_1m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GithubConfig {
    pub token_env: String,
    pub default_owner: Option<String>,
    pub api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    pub path: PathBuf,
    pub budget_bytes: u64,
    pub level: String,
}

impl AppConfig {
    pub fn defaults_for_home(home: &Path) -> Self {
        let cache_dir = home.join(".cache").join("cerveau");
        Self {
            workspace: WorkspaceConfig {
                root: home.join("workspace"),
                max_display_items: MAX_DISPLAY_ITEMS,
            },
            dashboard: DashboardConfig {
                variant: DashboardVariant::Full,
            },
            system: SystemConfig {
                min_disk_free_gb: 10.0,
                warn_load_1m: 4.0,
            },
            github: GithubConfig {
                token_env: "GITHUB_TOKEN".to_string(),
                default_owner: None,
                api_base: "https://api.github.com".to_string(),
            },
            cache: CacheConfig {
                dir: cache_dir.clone(),
                ttl_seconds: 600,
            },
            logging: LoggingConfig {
                path: cache_dir.join("logs").join("run.jsonl"),
                budget_bytes: DEFAULT_DISK_BUDGET_BYTES,
                level: "info".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialAppConfig {
    workspace: Option<PartialWorkspaceConfig>,
    dashboard: Option<PartialDashboardConfig>,
    system: Option<PartialSystemConfig>,
    github: Option<PartialGithubConfig>,
    cache: Option<PartialCacheConfig>,
    logging: Option<PartialLoggingConfig>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialWorkspaceConfig {
    root: Option<String>,
    max_display_items: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialDashboardConfig {
    variant: Option<DashboardVariant>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialSystemConfig {
    min_disk_free_gb: Option<f64>,
    warn_load_1m: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialGithubConfig {
    token_env: Option<String>,
    default_owner: Option<String>,
    api_base: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialCacheConfig {
    dir: Option<String>,
    ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialLoggingConfig {
    path: Option<String>,
    budget_bytes: Option<u64>,
    level: Option<String>,
}

pub fn load_config(
    overrides: &CliOverrides,
    process_cwd: &Path,
    home: &Path,
    fs: &dyn FileSystem,
) -> Result<AppConfig, CerveauError> {
    let mut cfg = AppConfig::defaults_for_home(home);

    let config_path = match &overrides.config_path {
        Some(path) => Some(absolutize_path(process_cwd, path)),
        None => {
            let user_config = home.join(USER_CONFIG_RELATIVE);
            fs.exists(&user_config).then_some(user_config)
        }
    };

    if let Some(path) = config_path {
        let file_contents = fs.read_to_string(&path)?;
        let partial: PartialAppConfig = toml::from_str(&file_contents)
            .map_err(|e| CerveauError::ConfigParse(format!("{}: {e}", path.display())))?;
        merge_partial_config(&mut cfg, partial, process_cwd, home);
    }

    apply_cli_overrides(&mut cfg, overrides, process_cwd, home);
    validate_config(&cfg)?;
    Ok(cfg)
}

fn merge_partial_config(cfg: &mut AppConfig, partial: PartialAppConfig, cwd: &Path, home: &Path) {
    if let Some(workspace) = partial.workspace {
        if let Some(root) = workspace.root {
            cfg.workspace.root = expand_path(&root, cwd, home);
        }
        if let Some(value) = workspace.max_display_items {
            cfg.workspace.max_display_items = value;
        }
    }

    if let Some(dashboard) = partial.dashboard {
        if let Some(variant) = dashboard.variant {
            cfg.dashboard.variant = variant;
        }
    }

    if let Some(system) = partial.system {
        if let Some(value) = system.min_disk_free_gb {
            cfg.system.min_disk_free_gb = value;
        }
        if let Some(value) = system.warn_load_1m {
            cfg.system.warn_load_1m = value;
        }
    }

    if let Some(github) = partial.github {
        if let Some(value) = github.token_env {
            cfg.github.token_env = value;
        }
        if let Some(value) = github.default_owner {
            cfg.github.default_owner = Some(value);
        }
        if let Some(value) = github.api_base {
            cfg.github.api_base = value;
        }
    }

    if let Some(cache) = partial.cache {
        if let Some(dir) = cache.dir {
            cfg.cache.dir = expand_path(&dir, cwd, home);
        }
        if let Some(value) = cache.ttl_seconds {
            cfg.cache.ttl_seconds = value;
        }
    }

    if let Some(logging) = partial.logging {
        if let Some(path) = logging.path {
            cfg.logging.path = expand_path(&path, cwd, home);
        }
        if let Some(value) = logging.budget_bytes {
            cfg.logging.budget_bytes = value;
        }
        if let Some(value) = logging.level {
            cfg.logging.level = value;
        }
    }
}

fn apply_cli_overrides(cfg: &mut AppConfig, overrides: &CliOverrides, cwd: &Path, home: &Path) {
    if let Some(root) = &overrides.root {
        cfg.workspace.root = expand_path(&root.to_string_lossy(), cwd, home);
    }
    if let Some(variant) = overrides.variant {
        cfg.dashboard.variant = variant;
    }
}

/// `~` and `~/...` expand to `home`; anything else relative is joined onto `cwd`.
pub fn expand_path(raw: &str, cwd: &Path, home: &Path) -> PathBuf {
    if raw == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        return home.join(rest);
    }
    absolutize_path(cwd, Path::new(raw))
}

fn absolutize_path(base: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        base.join(value)
    }
}

pub fn validate_config(cfg: &AppConfig) -> Result<(), CerveauError> {
    if cfg.workspace.max_display_items == 0 {
        return Err(CerveauError::InvalidConfig(
            "workspace.max_display_items must be greater than zero".to_string(),
        ));
    }

    if cfg.cache.ttl_seconds == 0 {
        return Err(CerveauError::InvalidConfig(
            "cache.ttl_seconds must be greater than zero".to_string(),
        ));
    }

    if cfg.system.warn_load_1m.is_nan() || cfg.system.warn_load_1m < 0.0 {
        return Err(CerveauError::InvalidConfig(
            "system.warn_load_1m must not be negative".to_string(),
        ));
    }

    if cfg.system.min_disk_free_gb.is_nan() || cfg.system.min_disk_free_gb < 0.0 {
        return Err(CerveauError::InvalidConfig(
            "system.min_disk_free_gb must not be negative".to_string(),
        ));
    }

    if cfg.github.token_env.trim().is_empty() {
        return Err(CerveauError::InvalidConfig(
            "github.token_env must name an environment variable".to_string(),
        ));
    }

    if LogLevel::parse(&cfg.logging.level).is_none() {
        return Err(CerveauError::InvalidConfig(format!(
            "logging.level must be one of debug, info, warn, error (got {:?})",
            cfg.logging.level
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{expand_path, load_config, AppConfig, CliOverrides, USER_CONFIG_RELATIVE};
    use crate::errors::CerveauError;
    use crate::hotkeys::DashboardVariant;
    use crate::runtime::FakeFileSystem;
    use std::path::{Path, PathBuf};

    const HOME: &str = "/home/dev";
    const CWD: &str = "/tmp/here";

    fn load(overrides: &CliOverrides, fs: &FakeFileSystem) -> Result<AppConfig, CerveauError> {
        load_config(overrides, Path::new(CWD), Path::new(HOME), fs)
    }

    #[test]
    fn defaults_hang_off_home() {
        let cfg = load(&CliOverrides::default(), &FakeFileSystem::default()).expect("cfg");
        assert_eq!(cfg.workspace.root, PathBuf::from("/home/dev/workspace"));
        assert_eq!(cfg.workspace.max_display_items, 30);
        assert_eq!(cfg.dashboard.variant, DashboardVariant::Full);
        assert_eq!(cfg.cache.dir, PathBuf::from("/home/dev/.cache/cerveau"));
        assert_eq!(
            cfg.logging.path,
            PathBuf::from("/home/dev/.cache/cerveau/logs/run.jsonl")
        );
        assert_eq!(cfg.github.token_env, "GITHUB_TOKEN");
    }

    #[test]
    fn partial_file_merges_field_by_field() {
        let fs = FakeFileSystem::with_file(
            "/tmp/here/cerveau.toml",
            r#"
[workspace]
root = "~/code"

[system]
warn_load_1m = 8.0

[cache]
dir = "cache"
"#,
        );
        let overrides = CliOverrides {
            config_path: Some(PathBuf::from("cerveau.toml")),
            ..CliOverrides::default()
        };
        let cfg = load(&overrides, &fs).expect("cfg");
        assert_eq!(cfg.workspace.root, PathBuf::from("/home/dev/code"));
        assert_eq!(cfg.workspace.max_display_items, 30);
        assert_eq!(cfg.system.warn_load_1m, 8.0);
        assert_eq!(cfg.system.min_disk_free_gb, 10.0);
        assert_eq!(cfg.cache.dir, PathBuf::from("/tmp/here/cache"));
        assert_eq!(cfg.cache.ttl_seconds, 600);
    }

    #[test]
    fn user_config_is_picked_up_when_present() {
        let fs = FakeFileSystem::with_file(
            Path::new(HOME).join(USER_CONFIG_RELATIVE),
            "[dashboard]\nvariant = \"browse\"\n",
        );
        let cfg = load(&CliOverrides::default(), &fs).expect("cfg");
        assert_eq!(cfg.dashboard.variant, DashboardVariant::Browse);
    }

    #[test]
    fn cli_overrides_win_over_file() {
        let fs = FakeFileSystem::with_file(
            Path::new(HOME).join(USER_CONFIG_RELATIVE),
            "[workspace]\nroot = \"/srv/a\"\n[dashboard]\nvariant = \"browse\"\n",
        );
        let overrides = CliOverrides {
            root: Some(PathBuf::from("proj")),
            variant: Some(DashboardVariant::Full),
            ..CliOverrides::default()
        };
        let cfg = load(&overrides, &fs).expect("cfg");
        assert_eq!(cfg.workspace.root, PathBuf::from("/tmp/here/proj"));
        assert_eq!(cfg.dashboard.variant, DashboardVariant::Full);
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let overrides = CliOverrides {
            config_path: Some(PathBuf::from("/nope.toml")),
            ..CliOverrides::default()
        };
        assert!(matches!(
            load(&overrides, &FakeFileSystem::default()),
            Err(CerveauError::Io(_))
        ));
    }

    #[test]
    fn malformed_and_unknown_keys_are_parse_errors() {
        for body in ["[workspace\nroot=1", "[workspace]\nbogus = 1\n"] {
            let fs = FakeFileSystem::with_file("/c.toml", body);
            let overrides = CliOverrides {
                config_path: Some(PathBuf::from("/c.toml")),
                ..CliOverrides::default()
            };
            assert!(matches!(
                load(&overrides, &fs),
                Err(CerveauError::ConfigParse(_))
            ));
        }
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let cases = [
            "[workspace]\nmax_display_items = 0\n",
            "[cache]\nttl_seconds = 0\n",
            "[system]\nwarn_load_1m = -1.0\n",
            "[system]\nmin_disk_free_gb = -0.5\n",
            "[github]\ntoken_env = \"  \"\n",
            "[logging]\nlevel = \"loud\"\n",
        ];
        for body in cases {
            let fs = FakeFileSystem::with_file("/c.toml", body);
            let overrides = CliOverrides {
                config_path: Some(PathBuf::from("/c.toml")),
                ..CliOverrides::default()
            };
            assert!(
                matches!(load(&overrides, &fs), Err(CerveauError::InvalidConfig(_))),
                "{body}"
            );
        }
    }

    #[test]
    fn expand_path_handles_tilde_absolute_and_relative() {
        let cwd = Path::new(CWD);
        let home = Path::new(HOME);
        assert_eq!(expand_path("~", cwd, home), PathBuf::from(HOME));
        assert_eq!(expand_path("~/x", cwd, home), PathBuf::from("/home/dev/x"));
        assert_eq!(expand_path("/abs", cwd, home), PathBuf::from("/abs"));
        assert_eq!(expand_path("rel", cwd, home), PathBuf::from("/tmp/here/rel"));
    }
}
