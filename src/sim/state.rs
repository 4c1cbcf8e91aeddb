//! Game state and core simulation types
//!
//! Everything the tick mutates lives here. The renderer reads a snapshot of it;
//! the audio host drains `events` after each frame.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::entities::{
    BossType, Bullet, Enemy, EnemyBullet, EnemyTag, FloatText, Pickup, PickupKind, Player,
    Turret, WeaponId,
};
use super::progression::UpgradeChoice;
use super::stats::{self, LifetimeStats, RunStats};
use super::world::WorldField;
use crate::tuning::{Difficulty, GameConfig, HeroDef, MapDef, RunSetup};

/// Default logical viewport (pixels)
pub const DEFAULT_VIEWPORT: Vec2 = Vec2::new(960.0, 540.0);

/// Current phase of gameplay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Run built, waiting for the start intent
    Ready,
    /// Active gameplay
    Playing,
    /// Game is paused
    Paused,
    /// Gameplay frozen while an upgrade menu is open
    Upgrade,
    /// Run ended
    GameOver,
}

/// Scripted wave events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveEventKind {
    /// Sustained spawn-rate boost
    Rush,
    /// Immediate burst of heavy enemies
    Elites,
    /// Spawns almost suppressed
    Calm,
}

/// Final numbers of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub kills: u32,
    pub wave: u32,
    pub time: f32,
    pub level: u32,
}

/// Fire-and-forget notifications for the host (audio, HUD)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    Shoot(WeaponId),
    Hit { player: bool },
    Explode { boss: bool },
    Pickup(PickupKind),
    LevelUp,
    UpgradeMenu,
    WaveStarted(u32),
    WaveEvent(WaveEventKind),
    BossIncoming,
    BossSpawned(BossType),
    Achievement(String),
    Death,
    RunEnded(RunSummary),
}

/// Wave director state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveState {
    /// Current wave, derived from elapsed time
    pub wave: u32,
    pub wave_just_started: bool,
    /// Enemy speed/damage scalar, `1 + 0.16 * wave`
    pub difficulty: f32,
    /// Fractional enemies owed to the spawner
    pub spawn_acc: f32,
    pub boss_alive: bool,
    /// Wave whose boss has already spawned (0 = none)
    pub boss_wave: u32,
    /// Wave the boss warning was shown on (0 = none)
    pub boss_warn_wave: u32,
    pub next_boss_in: f32,
    /// Remaining calm-window time
    pub calm_t: f32,
    /// Active timed event
    pub event: Option<WaveEventKind>,
    pub event_t: f32,
    /// Bosses spawned this run
    pub bosses_spawned: u32,
}

impl Default for WaveState {
    fn default() -> Self {
        Self {
            wave: 1,
            wave_just_started: false,
            difficulty: 1.0,
            spawn_acc: 0.0,
            boss_alive: false,
            boss_wave: 0,
            boss_warn_wave: 0,
            next_boss_in: 0.0,
            calm_t: 0.0,
            event: None,
            event_t: 0.0,
            bosses_spawned: 0,
        }
    }
}

/// Player dash timers
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DashState {
    pub cd: f32,
    pub t: f32,
    pub dir: Vec2,
    pub requested: bool,
}

/// Upgrade menu state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpgradeMenu {
    /// Picks still owed to the player
    pub remaining: u32,
    pub choices: Vec<UpgradeChoice>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectiveKind {
    Kills,
    Time,
    Pickups,
}

/// Per-run side goal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub kind: ObjectiveKind,
    pub target: u32,
    pub progress: u32,
    pub done: bool,
}

impl Objective {
    pub fn roll<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let roll: f32 = rng.random();
        let (kind, target) = if roll < 0.34 {
            (ObjectiveKind::Kills, 50)
        } else if roll < 0.67 {
            (ObjectiveKind::Time, 60)
        } else {
            (ObjectiveKind::Pickups, 8)
        };
        Self {
            kind,
            target,
            progress: 0,
            done: false,
        }
    }

    pub fn label(&self) -> &'static str {
        match self.kind {
            ObjectiveKind::Kills => "KILL",
            ObjectiveKind::Time => "SURVIVE",
            ObjectiveKind::Pickups => "PICK",
        }
    }
}

/// Screen feedback timers (render-only)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Feedback {
    pub hit_flash: f32,
    pub damage_t: f32,
    /// Direction the last hit came from (radians)
    pub damage_angle: f32,
    pub wall_bump_t: f32,
    pub wall_bump_pos: Vec2,
}

fn fresh_rng() -> Pcg32 {
    Pcg32::seed_from_u64(0)
}

/// Complete game state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    /// Run seed for reproducibility
    pub seed: u64,
    #[serde(skip, default = "fresh_rng")]
    pub rng: Pcg32,
    pub config: GameConfig,
    pub setup: RunSetup,
    /// Difficulty in effect (hell forces hard)
    pub diff: Difficulty,
    pub world: WorldField,
    pub phase: GamePhase,
    /// Elapsed run time (seconds)
    pub time: f32,
    pub kills: u32,
    pub waves: WaveState,
    pub player: Player,
    pub enemies: Vec<Enemy>,
    pub bullets: Vec<Bullet>,
    pub enemy_bullets: Vec<EnemyBullet>,
    pub pickups: Vec<Pickup>,
    pub turrets: Vec<Turret>,
    pub floats: Vec<FloatText>,
    /// Camera top-left in world space
    pub camera: Vec2,
    pub viewport: Vec2,
    pub dash: DashState,
    pub upgrade: UpgradeMenu,
    pub objective: Objective,
    /// Pickup kinds already seen this run
    pub discovered: Vec<PickupKind>,
    pub run_stats: RunStats,
    pub lifetime: LifetimeStats,
    pub fx: Feedback,
    /// Host wall clock (ms), used for achievement timestamps
    pub now_ms: f64,
    #[serde(skip)]
    pub events: Vec<GameEvent>,
    next_id: u32,
}

impl GameState {
    /// Build a fresh run with default tuning
    pub fn new(seed: u64, setup: RunSetup) -> Self {
        Self::with_config(seed, setup, GameConfig::default())
    }

    pub fn with_config(seed: u64, setup: RunSetup, config: GameConfig) -> Self {
        let config = config.validated();
        let mut rng = Pcg32::seed_from_u64(seed);
        let diff = Difficulty::get(setup.effective_difficulty());
        let world = WorldField::new(setup.map, config.cell_px);
        let player = Player::from_hero(&HeroDef::get(setup.hero), &mut rng);
        let objective = Objective::roll(&mut rng);

        Self {
            seed,
            rng,
            config,
            setup,
            diff,
            world,
            phase: GamePhase::Ready,
            time: 0.0,
            kills: 0,
            waves: WaveState::default(),
            player,
            enemies: Vec::new(),
            bullets: Vec::new(),
            enemy_bullets: Vec::new(),
            pickups: Vec::new(),
            turrets: Vec::new(),
            floats: Vec::new(),
            camera: -DEFAULT_VIEWPORT * 0.5,
            viewport: DEFAULT_VIEWPORT,
            dash: DashState::default(),
            upgrade: UpgradeMenu::default(),
            objective,
            discovered: Vec::new(),
            run_stats: RunStats::default(),
            lifetime: LifetimeStats::default(),
            fx: Feedback::default(),
            now_ms: 0.0,
            events: Vec::new(),
            next_id: 1,
        }
    }

    /// Begin play from the ready screen
    pub fn start(&mut self) {
        if self.phase != GamePhase::Ready {
            return;
        }
        self.phase = GamePhase::Playing;
        log::info!(
            "run start: seed={} map={:?} difficulty={:?} hero={:?}",
            self.seed,
            self.setup.map,
            self.diff.id,
            self.setup.hero
        );
    }

    pub fn map_def(&self) -> MapDef {
        MapDef::get(self.setup.map)
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    #[inline]
    pub fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Take every event queued since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn push_float(&mut self, pos: Vec2, ttl: f32, text: impl Into<String>) {
        self.floats.push(FloatText {
            pos,
            ttl,
            text: text.into(),
        });
    }

    /// Queue a player bullet; dropped silently at the cap
    pub fn push_bullet(&mut self, bullet: Bullet) -> bool {
        if self.bullets.len() >= self.config.max_bullets {
            return false;
        }
        self.bullets.push(bullet);
        true
    }

    /// Place a pickup; dropped silently at the cap
    pub fn push_pickup(&mut self, pickup: Pickup) -> bool {
        if self.pickups.len() >= self.config.max_pickups {
            return false;
        }
        self.pickups.push(pickup);
        true
    }

    /// Spawn a regular enemy at `pos`, respecting the enemy cap
    pub fn spawn_enemy(&mut self, tag: EnemyTag, pos: Vec2) -> bool {
        if self.enemies.len() >= self.config.max_enemies {
            return false;
        }
        let id = self.next_entity_id();
        let enemy = Enemy::new(id, tag, pos, self.waves.wave, &self.diff, &mut self.rng);
        self.enemies.push(enemy);
        true
    }

    /// Spawn a minion on a ring 24..52 px around `center`
    pub fn spawn_enemy_near(&mut self, center: Vec2, tag: EnemyTag) -> bool {
        let a: f32 = self.rng.random_range(0.0..std::f32::consts::TAU);
        let d: f32 = self.rng.random_range(24.0..52.0);
        self.spawn_enemy(tag, center + Vec2::from_angle(a) * d)
    }

    pub fn boss_alive(&self) -> bool {
        self.enemies.iter().any(Enemy::is_boss)
    }

    /// Live tension estimate in `[0, 1]` for the music
    pub fn music_intensity(&self) -> f32 {
        if self.phase == GamePhase::GameOver {
            return 0.0;
        }
        let pressure = (self.enemies.len() as f32 / 60.0).min(1.0) * 0.45;
        let wave = (self.waves.wave as f32 * 0.03).min(0.3);
        let boss = if self.waves.boss_alive { 0.25 } else { 0.0 };
        let low_hp = if self.player.hp < self.player.hp_max * 0.3 { 0.1 } else { 0.0 };
        (0.1 + pressure + wave + boss + low_hp).clamp(0.0, 1.0)
    }

    /// Toggle pause; only valid between Playing and Paused
    pub fn toggle_pause(&mut self) {
        self.phase = match self.phase {
            GamePhase::Playing => GamePhase::Paused,
            GamePhase::Paused => GamePhase::Playing,
            other => other,
        };
    }

    /// Ask for a dash on the next tick
    pub fn request_dash(&mut self) {
        if self.phase == GamePhase::Playing {
            self.dash.requested = true;
        }
    }

    /// Terminal transition; later calls are no-ops
    pub fn end_game(&mut self) {
        if self.phase == GamePhase::GameOver {
            return;
        }
        self.phase = GamePhase::GameOver;
        self.player.hp = self.player.hp.clamp(0.0, self.player.hp_max);
        self.upgrade = UpgradeMenu::default();

        stats::record_run_end(&mut self.lifetime, self.time, self.waves.wave, self.kills);
        self.check_achievements();

        let summary = RunSummary {
            kills: self.kills,
            wave: self.waves.wave,
            time: self.time,
            level: self.player.level,
        };
        log::info!(
            "run end: kills={} wave={} time={} level={}",
            summary.kills,
            summary.wave,
            stats::format_time_mmss(summary.time),
            summary.level
        );
        self.emit(GameEvent::Death);
        self.emit(GameEvent::RunEnded(summary));
    }

    /// Re-evaluate achievements and announce new unlocks
    pub fn check_achievements(&mut self) {
        let unlocked = stats::update_achievements(&mut self.lifetime, self.now_ms);
        for a in unlocked {
            log::info!("achievement unlocked: {}", a.id);
            let pos = self.player.pos - Vec2::new(0.0, 40.0);
            self.push_float(pos, 1.6, format!("ACHIEVEMENT: {}", a.title));
            self.emit(GameEvent::Achievement(a.id.to_string()));
        }
    }

    /// Damage the player; ends the run when hp reaches zero
    pub fn damage_player(&mut self, amount: f32, from: Vec2, flash: f32) {
        if self.phase == GamePhase::GameOver {
            return;
        }
        let died = self.player.take_damage(amount);
        self.fx.hit_flash = flash;
        self.fx.damage_angle = (from - self.player.pos).to_angle();
        self.fx.damage_t = 0.8;
        self.emit(GameEvent::Hit { player: true });
        if died {
            self.end_game();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::{HeroId, MapId};
    use proptest::prelude::*;

    fn setup() -> RunSetup {
        RunSetup {
            map: MapId::Plains,
            ..RunSetup::default()
        }
    }

    #[test]
    fn test_new_state_is_ready() {
        let mut state = GameState::new(3, setup());
        assert_eq!(state.phase, GamePhase::Ready);
        state.start();
        assert_eq!(state.phase, GamePhase::Playing);
        assert_eq!(state.waves.wave, 1);
        assert_eq!(state.player.hero, HeroId::Runner);
    }

    #[test]
    fn test_entity_ids_are_unique() {
        let mut state = GameState::new(3, setup());
        let a = state.next_entity_id();
        let b = state.next_entity_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_spawn_respects_cap() {
        let cfg = GameConfig {
            max_enemies: 2,
            ..GameConfig::default()
        };
        let mut state = GameState::with_config(1, setup(), cfg);
        assert!(state.spawn_enemy(EnemyTag::Walker, Vec2::ZERO));
        assert!(state.spawn_enemy(EnemyTag::Walker, Vec2::ZERO));
        assert!(!state.spawn_enemy(EnemyTag::Walker, Vec2::ZERO));
        assert_eq!(state.enemies.len(), 2);
    }

    #[test]
    fn test_end_game_transitions_once() {
        let mut state = GameState::new(3, setup());
        state.start();
        state.end_game();
        state.end_game();
        let deaths = state
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::RunEnded(_)))
            .count();
        assert_eq!(deaths, 1);
        assert_eq!(state.lifetime.runs, 1);
    }

    #[test]
    fn test_pause_toggle_only_while_playing() {
        let mut state = GameState::new(3, setup());
        state.toggle_pause();
        assert_eq!(state.phase, GamePhase::Ready);
        state.start();
        state.toggle_pause();
        assert_eq!(state.phase, GamePhase::Paused);
        state.toggle_pause();
        assert_eq!(state.phase, GamePhase::Playing);
    }

    proptest! {
        #[test]
        fn prop_hp_bounds_and_single_end(hits in proptest::collection::vec((0.0f32..60.0, any::<bool>()), 1..40)) {
            let mut state = GameState::new(11, setup());
            state.start();
            for (amount, heal) in hits {
                if heal {
                    state.player.heal(amount);
                } else {
                    state.damage_player(amount, Vec2::X, 0.1);
                }
                prop_assert!(state.player.hp >= 0.0);
                prop_assert!(state.player.hp <= state.player.hp_max);
            }
            let ends = state
                .drain_events()
                .iter()
                .filter(|e| matches!(e, GameEvent::RunEnded(_)))
                .count();
            let expected = if state.phase == GamePhase::GameOver { 1 } else { 0 };
            prop_assert_eq!(ends, expected);
        }
    }
}
