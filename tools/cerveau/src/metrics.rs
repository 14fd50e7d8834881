//! Host metrics: the per-cycle dashboard snapshot and the one-shot
//! `sys report`.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use sysinfo::{Disks, System, MINIMUM_CPU_UPDATE_INTERVAL};

const GIB: u64 = 1024 * 1024 * 1024;
const GB: f64 = 1e9;

/// Read fresh every cycle, dropped after render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub host: String,
    pub taken_at: String,
    pub cpu_percent: f32,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    pub memory_percent: f32,
    pub disk_used_percent: f32,
    pub venv: String,
}

impl MetricsSnapshot {
    pub fn memory_line(&self) -> String {
        format!(
            "{:.0}%  ({}G / {}G)",
            self.memory_percent,
            self.memory_used_bytes / GIB,
            self.memory_total_bytes / GIB
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostReadings {
    pub os: String,
    pub host: String,
    pub time: String,
    pub logical_cores: usize,
    pub load: [f64; 3],
    pub ram_total_bytes: u64,
    pub ram_used_bytes: u64,
    pub disk_total_bytes: u64,
    pub disk_free_bytes: u64,
}

pub trait MetricsProvider: Send + Sync {
    fn snapshot(&self) -> MetricsSnapshot;
    fn host_readings(&self) -> HostReadings;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Ok,
    Warn,
}

pub fn health_status(value: f64, threshold: f64, higher_is_worse: bool) -> HealthStatus {
    let breached = if higher_is_worse {
        value > threshold
    } else {
        value < threshold
    };
    if breached {
        HealthStatus::Warn
    } else {
        HealthStatus::Ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportThresholds {
    pub warn_load_1m: f64,
    pub min_disk_free_gb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemReport {
    pub os: String,
    pub host: String,
    pub time: String,
    pub cpu: CpuReport,
    pub ram: RamReport,
    pub disk_root: DiskReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuReport {
    pub cores_logical: usize,
    pub load: LoadReport,
    pub warn_load_1m: f64,
    pub status: HealthStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    #[serde(rename = "1m")]
    pub one: f64,
    #[serde(rename = "5m")]
    pub five: f64,
    #[serde(rename = "15m")]
    pub fifteen: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RamReport {
    pub total_gb: f64,
    pub used_gb: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskReport {
    pub total_gb: f64,
    pub free_gb: f64,
    pub min_free_gb: f64,
    pub status: HealthStatus,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

impl SystemReport {
    pub fn build(readings: &HostReadings, thresholds: ReportThresholds) -> Self {
        let free_gb = readings.disk_free_bytes as f64 / GB;
        Self {
            os: readings.os.clone(),
            host: readings.host.clone(),
            time: readings.time.clone(),
            cpu: CpuReport {
                cores_logical: readings.logical_cores,
                load: LoadReport {
                    one: readings.load[0],
                    five: readings.load[1],
                    fifteen: readings.load[2],
                },
                warn_load_1m: thresholds.warn_load_1m,
                status: health_status(readings.load[0], thresholds.warn_load_1m, true),
            },
            ram: RamReport {
                total_gb: round2(readings.ram_total_bytes as f64 / GB),
                used_gb: round2(readings.ram_used_bytes as f64 / GB),
                percent: round2(percent(readings.ram_used_bytes, readings.ram_total_bytes)),
            },
            disk_root: DiskReport {
                total_gb: round2(readings.disk_total_bytes as f64 / GB),
                free_gb: round2(free_gb),
                min_free_gb: thresholds.min_disk_free_gb,
                status: health_status(free_gb, thresholds.min_disk_free_gb, false),
            },
        }
    }
}

fn local_time() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// (total, available) bytes of the disk whose mount point best covers `path`.
fn disk_space_for(disks: &Disks, path: &Path) -> (u64, u64) {
    disks
        .list()
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| (disk.total_space(), disk.available_space()))
        .unwrap_or((0, 0))
}

pub struct SysinfoMetrics {
    system: Mutex<System>,
    home: PathBuf,
}

impl SysinfoMetrics {
    pub fn new() -> Self {
        let mut system = System::new_all();
        // CPU usage is a delta between two refreshes.
        std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
        system.refresh_cpu_usage();
        Self {
            system: Mutex::new(system),
            home: dirs::home_dir().unwrap_or_else(|| PathBuf::from("/")),
        }
    }
}

impl Default for SysinfoMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsProvider for SysinfoMetrics {
    fn snapshot(&self) -> MetricsSnapshot {
        let mut system = self
            .system
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        system.refresh_cpu_usage();
        system.refresh_memory();
        let (disk_total, disk_free) = disk_space_for(&Disks::new_with_refreshed_list(), &self.home);
        let venv = std::env::var("VIRTUAL_ENV")
            .ok()
            .and_then(|path| {
                Path::new(&path)
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
            })
            .unwrap_or_else(|| "-".to_string());

        MetricsSnapshot {
            host: System::host_name().unwrap_or_else(|| "-".to_string()),
            taken_at: local_time(),
            cpu_percent: system.global_cpu_usage(),
            memory_used_bytes: system.used_memory(),
            memory_total_bytes: system.total_memory(),
            memory_percent: percent(system.used_memory(), system.total_memory()) as f32,
            disk_used_percent: percent(disk_total.saturating_sub(disk_free), disk_total) as f32,
            venv,
        }
    }

    fn host_readings(&self) -> HostReadings {
        let mut system = self
            .system
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        system.refresh_memory();
        let load = System::load_average();
        let (disk_total, disk_free) =
            disk_space_for(&Disks::new_with_refreshed_list(), Path::new("/"));
        let os = format!(
            "{} {}",
            System::name().unwrap_or_else(|| "unknown".to_string()),
            System::kernel_version().unwrap_or_default()
        );

        HostReadings {
            os: os.trim().to_string(),
            host: System::host_name().unwrap_or_else(|| "-".to_string()),
            time: local_time(),
            logical_cores: system.cpus().len(),
            load: [load.one, load.five, load.fifteen],
            ram_total_bytes: system.total_memory(),
            ram_used_bytes: system.used_memory(),
            disk_total_bytes: disk_total,
            disk_free_bytes: disk_free,
        }
    }
}

/// Canned metrics for tests and non-interactive harnesses.
#[derive(Debug, Clone)]
pub struct FixedMetrics {
    pub snapshot: MetricsSnapshot,
    pub readings: HostReadings,
}

impl Default for FixedMetrics {
    fn default() -> Self {
        Self {
            snapshot: MetricsSnapshot {
                host: "devbox".to_string(),
                taken_at: "2026-01-01 09:30:00".to_string(),
                cpu_percent: 12.0,
                memory_used_bytes: 6 * GIB,
                memory_total_bytes: 16 * GIB,
                memory_percent: 37.5,
                disk_used_percent: 61.0,
                venv: "-".to_string(),
            },
            readings: HostReadings {
                os: "Linux 6.8.0".to_string(),
                host: "devbox".to_string(),
                time: "2026-01-01 09:30:00".to_string(),
                logical_cores: 8,
                load: [0.5, 0.4, 0.3],
                ram_total_bytes: 16_000_000_000,
                ram_used_bytes: 6_000_000_000,
                disk_total_bytes: 500_000_000_000,
                disk_free_bytes: 200_000_000_000,
            },
        }
    }
}

impl MetricsProvider for FixedMetrics {
    fn snapshot(&self) -> MetricsSnapshot {
        self.snapshot.clone()
    }

    fn host_readings(&self) -> HostReadings {
        self.readings.clone()
    }
}
