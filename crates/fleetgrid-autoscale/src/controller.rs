//! Capacity controller: reacts to player counts and minigame status.
//!
//! Each signal is evaluated into a single `ScaleDecision`. The controller
//! never touches the registry; callers pass in the lobby load they observe
//! and apply the decision themselves.

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use fleet_core::{MatchState, NetworkConfig, ServerKind};
use fleetgrid_state::InstanceId;

/// A scaling decision for the fleet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Create one more instance of the kind.
    Create(ServerKind),
    /// Gracefully stop the instance.
    Stop(InstanceId),
    /// No change needed.
    NoChange,
}

/// Load of one running lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyLoad {
    pub id: InstanceId,
    pub max_players: u32,
    /// Registration order; lower is older.
    pub seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacitySettings {
    /// Free lobby slots to keep ahead of the player count.
    pub threshold: u32,
    /// Never scale lobbies below this count.
    pub min_lobbies: usize,
    /// Lobby-phase minigame servers to keep per kind.
    pub min_pool: usize,
}

impl From<&NetworkConfig> for CapacitySettings {
    fn from(config: &NetworkConfig) -> Self {
        Self {
            threshold: config.lobby_player_threshold,
            min_lobbies: config.min_lobbies,
            min_pool: config.min_pool,
        }
    }
}

impl Default for CapacitySettings {
    fn default() -> Self {
        Self::from(&NetworkConfig::default())
    }
}

pub struct CapacityController {
    settings: CapacitySettings,
    /// Lobby-phase minigame servers per kind.
    pools: DashMap<ServerKind, usize>,
    /// Lobby capacity at the last scale-up request.
    scaled_up_at: Mutex<Option<u64>>,
}

impl CapacityController {
    pub fn new(settings: CapacitySettings) -> Self {
        Self {
            settings,
            pools: DashMap::new(),
            scaled_up_at: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> CapacitySettings {
        self.settings
    }

    /// Evaluate a network-wide player count against running lobbies.
    pub fn on_network_players(&self, players: u32, lobbies: &[LobbyLoad]) -> ScaleDecision {
        let capacity: u64 = lobbies.iter().map(|l| u64::from(l.max_players)).sum();
        let demand = u64::from(players) + u64::from(self.settings.threshold);

        if demand > capacity {
            let mut scaled_up_at = self.scaled_up_at.lock();
            if *scaled_up_at == Some(capacity) {
                debug!(players, capacity, "lobby already requested at this capacity");
                return ScaleDecision::NoChange;
            }
            *scaled_up_at = Some(capacity);
            info!(players, capacity, threshold = self.settings.threshold, "requesting another lobby");
            return ScaleDecision::Create(ServerKind::Lobby);
        }
        // Demand fits again; the next shortage is a new one.
        *self.scaled_up_at.lock() = None;

        if lobbies.len() > self.settings.min_lobbies
            && let Some(oldest) = lobbies.iter().min_by_key(|l| l.seq)
            && u64::from(players) < capacity - u64::from(oldest.max_players)
        {
            info!(
                players,
                capacity,
                lobbies = lobbies.len(),
                lobby = %oldest.id,
                "lobby capacity idle, retiring a lobby"
            );
            return ScaleDecision::Stop(oldest.id.clone());
        }

        ScaleDecision::NoChange
    }

    /// Forget the last scale-up so the next shortage requests again.
    ///
    /// Called when a requested lobby never made it to running.
    pub fn reset_scale_up(&self) {
        *self.scaled_up_at.lock() = None;
    }

    /// Evaluate a minigame server's sub-state change.
    pub fn on_match_state(
        &self,
        kind: ServerKind,
        id: &str,
        previous: Option<MatchState>,
        next: MatchState,
    ) -> ScaleDecision {
        let was_lobby = previous == Some(MatchState::Lobby);
        let is_lobby = next == MatchState::Lobby;

        match (was_lobby, is_lobby) {
            (false, true) => {
                let size = self.adjust_pool(kind, 1);
                debug!(instance = %id, %kind, pool = size, "server joined lobby pool");
                ScaleDecision::NoChange
            }
            (true, false) => {
                let size = self.adjust_pool(kind, -1);
                debug!(instance = %id, %kind, pool = size, "server left lobby pool");
                self.replenish(kind, size)
            }
            _ => ScaleDecision::NoChange,
        }
    }

    /// A minigame server was removed from the fleet.
    ///
    /// If it was still counted in the pool, the pool shrinks and may need a
    /// replacement.
    pub fn on_pool_member_removed(&self, kind: ServerKind, was_lobby: bool) -> ScaleDecision {
        if !was_lobby {
            return ScaleDecision::NoChange;
        }
        let size = self.adjust_pool(kind, -1);
        self.replenish(kind, size)
    }

    pub fn pool_size(&self, kind: ServerKind) -> usize {
        self.pools.get(&kind).map(|e| *e).unwrap_or(0)
    }

    fn adjust_pool(&self, kind: ServerKind, delta: isize) -> usize {
        let mut size = self.pools.entry(kind).or_insert(0);
        *size = size.saturating_add_signed(delta);
        *size
    }

    fn replenish(&self, kind: ServerKind, size: usize) -> ScaleDecision {
        if size < self.settings.min_pool {
            info!(%kind, pool = size, min = self.settings.min_pool, "minigame pool low, requesting replacement");
            ScaleDecision::Create(kind)
        } else {
            ScaleDecision::NoChange
        }
    }
}
