//! fleetgrid-autoscale: load-driven fleet sizing.
//!
//! The capacity controller turns load signals into scaling decisions; the
//! coordinator carries them out. It holds no instance state of its own
//! beyond per-kind pool counters and the last capacity it scaled up at.
//!
//! # Lobby scaling
//!
//! ```text
//! capacity = Σ max_players over running lobbies
//!
//! if players + threshold > capacity:
//!     Create(Lobby)                       // once per capacity value
//!
//! if players < capacity - max_players(oldest lobby) and lobbies > min_lobbies:
//!     Stop(oldest lobby)
//! ```
//!
//! # Minigame pools
//!
//! Minigame servers report whether they are in their lobby phase. The
//! controller counts lobby-phase servers per kind; when a server leaves the
//! lobby phase and the pool falls below `min_pool`, it asks for another.

pub mod controller;

pub use controller::{CapacityController, CapacitySettings, LobbyLoad, ScaleDecision};
