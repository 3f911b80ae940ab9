//! Process-wide request and session counters with periodic host sampling
//!
//! The run loop samples CPU and memory through `sysinfo`, keeps peaks, and
//! logs threshold alerts. Critical alerts repeat at most every five minutes
//! and warnings at most every minute.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use sysinfo::System;
use tokio_util::sync::CancellationToken;

/// Load (`max(cpu, memory) / 100`) at which the service reports itself busy
pub const BUSY_LOAD: f64 = 0.90;

const CRITICAL_COOLDOWN: Duration = Duration::from_secs(300);
const WARNING_COOLDOWN: Duration = Duration::from_secs(60);

/// Overall health derived from the latest host sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sampled host resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Cpu,
    Memory,
}

/// Percent thresholds for warning and critical alerts
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonitorThresholds {
    pub cpu_warning: f64,
    pub cpu_critical: f64,
    pub memory_warning: f64,
    pub memory_critical: f64,
}

impl Default for MonitorThresholds {
    fn default() -> Self {
        Self {
            cpu_warning: 70.0,
            cpu_critical: 85.0,
            memory_warning: 75.0,
            memory_critical: 90.0,
        }
    }
}

/// A resource over one of its thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alert {
    pub resource: Resource,
    pub level: HealthStatus,
    pub percent: f64,
}

impl MonitorThresholds {
    fn classify(percent: f64, warning: f64, critical: f64) -> HealthStatus {
        if percent >= critical {
            HealthStatus::Critical
        } else if percent >= warning {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        }
    }

    /// Worst of the CPU and memory levels
    #[must_use]
    pub fn status(&self, sample: &SystemSample) -> HealthStatus {
        self.alerts(sample)
            .iter()
            .map(|a| a.level)
            .max()
            .unwrap_or_default()
    }

    /// Every resource at or over its warning threshold
    #[must_use]
    pub fn alerts(&self, sample: &SystemSample) -> Vec<Alert> {
        [
            (Resource::Cpu, sample.cpu_percent, self.cpu_warning, self.cpu_critical),
            (
                Resource::Memory,
                sample.memory_percent,
                self.memory_warning,
                self.memory_critical,
            ),
        ]
        .into_iter()
        .filter_map(|(resource, percent, warning, critical)| {
            match Self::classify(percent, warning, critical) {
                HealthStatus::Healthy => None,
                level => Some(Alert {
                    resource,
                    level,
                    percent,
                }),
            }
        })
        .collect()
    }
}

/// One reading of host CPU and memory
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SystemSample {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_available_mb: u64,
}

impl SystemSample {
    /// `max(cpu, memory)` as a fraction
    #[must_use]
    pub fn load(&self) -> f64 {
        self.cpu_percent.max(self.memory_percent) / 100.0
    }
}

/// Latest sample plus peaks since start
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SystemStats {
    #[serde(flatten)]
    pub current: SystemSample,
    pub peak_cpu_percent: f64,
    pub peak_memory_percent: f64,
    pub samples: u64,
}

/// Reads host usage through `sysinfo`
///
/// CPU usage is a delta between refreshes, so the first sample after
/// construction reads as zero.
pub struct SystemSampler {
    system: System,
}

impl fmt::Debug for SystemSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemSampler").finish_non_exhaustive()
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSampler {
    #[must_use]
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self { system }
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn sample(&mut self) -> SystemSample {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        let total = self.system.total_memory();
        let available = self.system.available_memory();
        let memory_percent = if total == 0 {
            0.0
        } else {
            total.saturating_sub(available) as f64 / total as f64 * 100.0
        };

        SystemSample {
            cpu_percent: f64::from(self.system.global_cpu_usage()),
            memory_percent,
            memory_available_mb: available / (1024 * 1024),
        }
    }
}

/// Suppresses repeats of the same alert within its cooldown
#[derive(Debug, Default)]
pub struct AlertThrottle {
    last_fired: HashMap<(Resource, HealthStatus), Instant>,
}

impl AlertThrottle {
    /// Whether `alert` should be logged at `now`; records it when so
    pub fn should_fire(&mut self, alert: &Alert, now: Instant) -> bool {
        let cooldown = if alert.level == HealthStatus::Critical {
            CRITICAL_COOLDOWN
        } else {
            WARNING_COOLDOWN
        };
        let key = (alert.resource, alert.level);
        if let Some(last) = self.last_fired.get(&key)
            && now.saturating_duration_since(*last) < cooldown
        {
            return false;
        }
        self.last_fired.insert(key, now);
        true
    }
}

/// Point-in-time view of the monitor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorHealth {
    pub status: HealthStatus,
    pub uptime_seconds: u64,
    pub total_requests: u64,
    pub rejected_requests: u64,
    pub active_sessions: u64,
    /// Percentage of requests that were rejected
    pub rejection_rate: f64,
    pub system: SystemStats,
    pub thresholds: MonitorThresholds,
}

/// Counts requests, rejections and live sessions, and holds host samples
#[derive(Debug)]
pub struct SessionMonitor {
    started: Instant,
    thresholds: MonitorThresholds,
    total_requests: AtomicU64,
    rejected_requests: AtomicU64,
    active_sessions: AtomicU64,
    system: Mutex<SystemStats>,
}

impl Default for SessionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::with_thresholds(MonitorThresholds::default())
    }

    #[must_use]
    pub fn with_thresholds(thresholds: MonitorThresholds) -> Self {
        Self {
            started: Instant::now(),
            thresholds,
            total_requests: AtomicU64::new(0),
            rejected_requests: AtomicU64::new(0),
            active_sessions: AtomicU64::new(0),
            system: Mutex::new(SystemStats::default()),
        }
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// A rejected request also counts towards the total
    pub fn record_rejection(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.rejected_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_started(&self) {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// Saturates at zero
    pub fn session_ended(&self) {
        let _ = self
            .active_sessions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Store a host sample and raise the peaks
    pub fn record_sample(&self, sample: SystemSample) {
        let mut stats = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        stats.current = sample;
        stats.peak_cpu_percent = stats.peak_cpu_percent.max(sample.cpu_percent);
        stats.peak_memory_percent = stats.peak_memory_percent.max(sample.memory_percent);
        stats.samples += 1;
    }

    #[must_use]
    pub fn system_stats(&self) -> SystemStats {
        *self.system.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub const fn thresholds(&self) -> &MonitorThresholds {
        &self.thresholds
    }

    /// Load from the latest sample, `0.0` before any
    #[must_use]
    pub fn load(&self) -> f64 {
        self.system_stats().current.load()
    }

    /// Whether new sessions should be turned away
    #[must_use]
    pub fn is_overloaded(&self) -> bool {
        self.load() >= BUSY_LOAD
    }

    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn health(&self) -> MonitorHealth {
        let total = self.total_requests.load(Ordering::Relaxed);
        let rejected = self.rejected_requests.load(Ordering::Relaxed);
        let system = self.system_stats();
        MonitorHealth {
            status: self.thresholds.status(&system.current),
            uptime_seconds: self.uptime().as_secs(),
            total_requests: total,
            rejected_requests: rejected,
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            rejection_rate: rejected as f64 / total.max(1) as f64 * 100.0,
            system,
            thresholds: self.thresholds,
        }
    }

    /// One-line human summary for logs and the CLI
    #[must_use]
    pub fn performance_summary(&self) -> String {
        let h = self.health();
        format!(
            "health: {} | uptime: {}s | cpu: {:.1}% (peak {:.1}%) | memory: {:.1}% (peak {:.1}%) | sessions: {} | requests: {} (rejected: {:.1}%)",
            h.status,
            h.uptime_seconds,
            h.system.current.cpu_percent,
            h.system.peak_cpu_percent,
            h.system.current.memory_percent,
            h.system.peak_memory_percent,
            h.active_sessions,
            h.total_requests,
            h.rejection_rate
        )
    }

    fn log_alert(&self, alert: &Alert) {
        let threshold = match (alert.resource, alert.level) {
            (Resource::Cpu, HealthStatus::Critical) => self.thresholds.cpu_critical,
            (Resource::Cpu, _) => self.thresholds.cpu_warning,
            (Resource::Memory, HealthStatus::Critical) => self.thresholds.memory_critical,
            (Resource::Memory, _) => self.thresholds.memory_warning,
        };
        if alert.level == HealthStatus::Critical {
            tracing::error!(resource = ?alert.resource, percent = alert.percent, threshold, "resource usage critical");
        } else {
            tracing::warn!(resource = ?alert.resource, percent = alert.percent, threshold, "resource usage high");
        }
    }

    /// Sample the host and log stats every `interval` until `shutdown` fires
    pub async fn run(&self, interval: Duration, shutdown: CancellationToken) {
        let mut sampler = SystemSampler::new();
        let mut throttle = AlertThrottle::default();
        let mut ticker = tokio::time::interval(interval);
        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::debug!("monitor stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let sample = sampler.sample();
                    self.record_sample(sample);

                    let now = Instant::now();
                    for alert in self.thresholds.alerts(&sample) {
                        if throttle.should_fire(&alert, now) {
                            self.log_alert(&alert);
                        }
                    }

                    let h = self.health();
                    tracing::info!(
                        status = %h.status,
                        cpu = sample.cpu_percent,
                        memory = sample.memory_percent,
                        memory_available_mb = sample.memory_available_mb,
                        uptime_secs = h.uptime_seconds,
                        sessions = h.active_sessions,
                        requests = h.total_requests,
                        rejected = h.rejected_requests,
                        "monitor stats"
                    );
                }
            }
        }
    }
}
