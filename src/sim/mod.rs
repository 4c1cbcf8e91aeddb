//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must stay host-agnostic:
//! - Clamped timestep supplied by the host
//! - Seeded RNG only
//! - Stable iteration order (insertion order, entity IDs for attribution)
//! - No rendering, audio or platform dependencies; feedback leaves as events

pub mod combat;
pub mod entities;
pub mod progression;
pub mod state;
pub mod stats;
pub mod tick;
pub mod waves;
pub mod weapons;
pub mod world;

pub use combat::{bounce_or_destroy, damage_enemy, reap_dead};
pub use entities::{
    AttackPhase, BossType, Buffs, Bullet, BulletKind, Enemy, EnemyBullet, EnemyKind, EnemyTag,
    Pickup, PickupKind, Player, Turret, WeaponId, WeaponSlot,
};
pub use progression::{UpgradeChoice, UpgradeKind, choose_upgrade, gain_xp, xp_to_next};
pub use state::{GameEvent, GamePhase, GameState, RunSummary, WaveEventKind};
pub use stats::{LifetimeStats, RunStats};
pub use tick::{TickInput, tick};
pub use waves::{is_boss_wave, wave_index_at};
pub use world::{Biome, Tile, WorldField};
