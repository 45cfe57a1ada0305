//! Configuration types for kea-fleet.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::model::DaemonName;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The fleet of monitored Kea apps.
    pub fleet: FleetConfig,

    /// Lease search tuning.
    #[serde(default)]
    pub search: SearchConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Static description of the monitored fleet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Monitored Kea apps.
    #[serde(default)]
    pub apps: Vec<AppEntry>,

    /// Known host reservations.
    #[serde(default)]
    pub hosts: Vec<HostEntry>,
}

/// One monitored Kea app.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppEntry {
    /// Inventory identifier, unique within the fleet.
    pub id: i64,

    /// Human-readable name.
    pub name: String,

    /// Control channel URL (e.g., "http://host1:8000/").
    pub control_url: String,

    /// DHCP daemons running within the app.
    #[serde(default)]
    pub daemons: Vec<DaemonEntry>,
}

/// One DHCP daemon of an app.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonEntry {
    /// Daemon name: `dhcp4` or `dhcp6`.
    pub name: DaemonName,

    /// Hook library paths from the daemon's parsed configuration.
    #[serde(default)]
    pub hook_libraries: Vec<String>,
}

/// One host reservation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostEntry {
    /// Host identifier.
    pub id: i64,

    /// Reserved hostname.
    #[serde(default)]
    pub hostname: String,

    /// Reserved addresses and delegated prefixes (CIDR form).
    #[serde(default)]
    pub ip_reservations: Vec<String>,
}

/// Lease search tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Timeout for one app's dispatch, in seconds. A timed-out app is
    /// recorded as erred and the query continues.
    #[serde(default = "default_app_timeout_secs")]
    pub app_timeout_secs: u64,

    /// How many apps are queried concurrently.
    #[serde(default = "default_fanout")]
    pub fanout: usize,
}

impl SearchConfig {
    /// Per-app dispatch timeout.
    pub fn app_timeout(&self) -> Duration {
        Duration::from_secs(self.app_timeout_secs)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            app_timeout_secs: default_app_timeout_secs(),
            fanout: default_fanout(),
        }
    }
}

fn default_app_timeout_secs() -> u64 {
    10
}

fn default_fanout() -> usize {
    4
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "kea_fleet=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
