//! Shared types used across fleetgrid crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The category of a managed game server.
///
/// The kind governs naming, resource cost, and which policy hooks apply
/// when an instance starts or is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerKind {
    Proxy,
    Lobby,
    Attack,
    Build,
    SkyWars,
    BedWars,
}

impl ServerKind {
    pub const ALL: [ServerKind; 6] = [
        ServerKind::Proxy,
        ServerKind::Lobby,
        ServerKind::Attack,
        ServerKind::Build,
        ServerKind::SkyWars,
        ServerKind::BedWars,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ServerKind::Proxy => "proxy",
            ServerKind::Lobby => "lobby",
            ServerKind::Attack => "attack",
            ServerKind::Build => "build",
            ServerKind::SkyWars => "skywars",
            ServerKind::BedWars => "bedwars",
        }
    }

    /// Minigame kinds alternate between a lobby phase and a running match.
    pub fn is_minigame(&self) -> bool {
        matches!(self, ServerKind::SkyWars | ServerKind::BedWars)
    }

    /// Default id prefix when the policy table does not override it.
    pub fn default_prefix(&self) -> &'static str {
        match self {
            ServerKind::Proxy => "Proxy-",
            ServerKind::Lobby => "Lobby-",
            ServerKind::Attack => "Attack-",
            ServerKind::Build => "Build-",
            ServerKind::SkyWars => "SW-",
            ServerKind::BedWars => "BW-",
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a string names no known server kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown server kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for ServerKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        ServerKind::ALL
            .into_iter()
            .find(|k| k.label() == lowered)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// Sub-state reported by minigame servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchState {
    /// Accepting players, waiting for a match to begin.
    Lobby,
    /// A match is in progress.
    Ingame,
    /// Match finished, server about to restart or stop.
    Ending,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_kind_case_insensitive() {
        assert_eq!("Lobby".parse::<ServerKind>().unwrap(), ServerKind::Lobby);
        assert_eq!("skywars".parse::<ServerKind>().unwrap(), ServerKind::SkyWars);
        assert!("survival".parse::<ServerKind>().is_err());
    }

    #[test]
    fn kind_serializes_as_label() {
        #[derive(Serialize)]
        struct Wrapper {
            kind: ServerKind,
        }
        let rendered = toml::to_string(&Wrapper { kind: ServerKind::BedWars }).unwrap();
        assert_eq!(rendered.trim(), r#"kind = "bedwars""#);
        assert_eq!(ServerKind::BedWars.to_string(), "bedwars");
    }

    #[test]
    fn only_pool_kinds_are_minigames() {
        let minigames: Vec<_> = ServerKind::ALL
            .into_iter()
            .filter(ServerKind::is_minigame)
            .collect();
        assert_eq!(minigames, vec![ServerKind::SkyWars, ServerKind::BedWars]);
    }
}
