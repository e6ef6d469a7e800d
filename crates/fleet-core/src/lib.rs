pub mod config;
pub mod types;

pub use config::{
    ConfigError, FleetConfig, HeartbeatConfig, KindPolicy, NetworkConfig, ShutdownConfig,
    StartupConfig, parse_duration,
};
pub use types::*;
