//! fleet.toml configuration parser.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ServerKind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub startup: StartupConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    /// Per-kind policy overrides. Kinds not listed use built-in defaults.
    #[serde(default)]
    pub kinds: HashMap<ServerKind, KindPolicy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Total RAM (MB) the whole fleet may reserve.
    pub ram_budget_mb: u64,
    /// Free lobby slots to keep ahead of the network player count.
    pub lobby_player_threshold: u32,
    /// Lobbies are never scaled below this count.
    pub min_lobbies: usize,
    /// Minigame servers waiting in lobby phase to keep per kind.
    pub min_pool: usize,
    /// Address game servers bind to.
    pub host: String,
    /// First port handed out; each server takes the lowest free port above it.
    pub base_port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ram_budget_mb: 32 * 1024,
            lobby_player_threshold: 10,
            min_lobbies: 2,
            min_pool: 2,
            host: "127.0.0.1".to_string(),
            base_port: 30000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    /// How long a launched server may take to register before it is
    /// written off as a failed launch.
    pub registration_timeout: String,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            registration_timeout: "120s".to_string(),
        }
    }
}

impl StartupConfig {
    pub fn registration(&self) -> Duration {
        parse_duration(&self.registration_timeout, Duration::from_secs(120))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Tick period (e.g. "10s").
    pub interval: String,
    /// Silent ticks before the first liveness probe.
    pub threshold: u32,
    /// Periods to wait after start before the first tick.
    pub warmup_periods: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: "10s".to_string(),
            threshold: 30,
            warmup_periods: 2,
        }
    }
}

impl HeartbeatConfig {
    /// Tick period. A zero interval falls back to the default.
    pub fn period(&self) -> Duration {
        let default = Duration::from_secs(10);
        let period = parse_duration(&self.interval, default);
        if period.is_zero() { default } else { period }
    }

    pub fn warmup(&self) -> Duration {
        self.period() * self.warmup_periods.max(2)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long to wait for the proxy layer to confirm removal.
    pub proxy_ack_timeout: String,
    /// How long to wait for the server to disconnect on its own.
    pub disconnect_timeout: String,
    /// Where working directories of persistent kinds are moved on reclaim.
    pub backup_dir: PathBuf,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            proxy_ack_timeout: "2s".to_string(),
            disconnect_timeout: "15s".to_string(),
            backup_dir: PathBuf::from("/var/lib/fleetgrid/backups"),
        }
    }
}

impl ShutdownConfig {
    pub fn proxy_ack(&self) -> Duration {
        parse_duration(&self.proxy_ack_timeout, Duration::from_secs(2))
    }

    pub fn disconnect(&self) -> Duration {
        parse_duration(&self.disconnect_timeout, Duration::from_secs(15))
    }
}

/// Scheduling policy for one server kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindPolicy {
    /// Higher priority kinds start first in the default set.
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub min: u32,
    #[serde(default = "default_max")]
    pub max: u32,
    /// Instances to create when the default set starts.
    #[serde(default)]
    pub startup: u32,
    pub ram_mb: u64,
    pub max_players: u32,
    #[serde(default)]
    pub prefix: Option<String>,
    /// Keep the working directory as a backup when the server is removed.
    #[serde(default)]
    pub persistent: bool,
    /// Start in expire mode: creation is rejected until cleared.
    #[serde(default)]
    pub expired: bool,
}

fn default_max() -> u32 {
    16
}

impl KindPolicy {
    /// Built-in policy for a kind with no entry in the config file.
    pub fn builtin(kind: ServerKind) -> Self {
        let (priority, min, max, startup, ram_mb, max_players) = match kind {
            ServerKind::Proxy => (100, 1, 2, 1, 512, 500),
            ServerKind::Lobby => (90, 2, 10, 2, 1024, 100),
            ServerKind::Attack => (50, 0, 4, 1, 2048, 40),
            ServerKind::Build => (10, 0, 1, 0, 2048, 20),
            ServerKind::SkyWars => (40, 0, 8, 2, 768, 12),
            ServerKind::BedWars => (40, 0, 8, 2, 1024, 16),
        };
        Self {
            priority,
            min,
            max,
            startup,
            ram_mb,
            max_players,
            prefix: None,
            persistent: kind == ServerKind::Build,
            expired: false,
        }
    }

    pub fn prefix_for(&self, kind: ServerKind) -> &str {
        self.prefix.as_deref().unwrap_or(kind.default_prefix())
    }
}

impl FleetConfig {
    /// Read the raw file so callers can parse their own sections from the
    /// same text.
    pub fn read_source(path: &Path) -> Result<String, ConfigError> {
        std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Effective policy for a kind: the configured entry or the built-in one.
    pub fn policy(&self, kind: ServerKind) -> KindPolicy {
        self.kinds
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| KindPolicy::builtin(kind))
    }

    /// Kinds configured to start in expire mode.
    pub fn expired_kinds(&self) -> Vec<ServerKind> {
        ServerKind::ALL
            .into_iter()
            .filter(|k| self.policy(*k).expired)
            .collect()
    }

    /// All kinds ordered by descending priority, ties broken by kind order.
    pub fn kinds_by_priority(&self) -> Vec<(ServerKind, KindPolicy)> {
        let mut kinds: Vec<_> = ServerKind::ALL
            .into_iter()
            .map(|k| (k, self.policy(k)))
            .collect();
        kinds.sort_by(|a, b| b.1.priority.cmp(&a.1.priority).then(a.0.cmp(&b.0)));
        kinds
    }
}

/// Parse a duration string like "10s", "500ms", or "2m".
///
/// Malformed input yields `default`.
pub fn parse_duration(s: &str, default: Duration) -> Duration {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().map(Duration::from_millis).unwrap_or(default)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().map(Duration::from_secs).unwrap_or(default)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .map(|m| Duration::from_secs(m * 60))
            .unwrap_or(default)
    } else {
        default
    }
}
