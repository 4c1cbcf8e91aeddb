//! Wave direction: wave index, boss cadence, spawn pacing, calm windows and
//! random events.

use glam::Vec2;
use rand::Rng;

use super::entities::{BossType, Enemy, EnemyTag};
use super::state::{GameEvent, GameState, WaveEventKind};
use crate::pick_weighted;

/// Seconds before a boss wave at which the warning fires
pub const BOSS_WARN_SECS: f32 = 3.2;

/// Off-screen margin for edge spawns
pub const EDGE_PAD: f32 = 60.0;

const BOSS_SLOWDOWN: f32 = 0.55;
const BOSS_SKIP_CHANCE: f32 = 0.35;

const CALM_EVERY: u32 = 4;
const CALM_SECS: f32 = 6.0;
const CALM_FACTOR: f32 = 0.12;

const EVENT_MIN_WAVE: u32 = 4;
const EVENT_CHANCE: f32 = 0.22;
const RUSH_SECS: f32 = 7.0;
const RUSH_FACTOR: f32 = 1.8;

/// `1 + floor(t / wave_seconds)`; a non-positive length stays on wave 1
pub fn wave_index_at(t: f32, wave_seconds: f32) -> u32 {
    if wave_seconds.is_nan() || wave_seconds <= 0.0 {
        return 1;
    }
    ((t.max(0.0) / wave_seconds).floor() as u32).saturating_add(1)
}

/// A `boss_every` of 0 means no boss waves at all
pub fn is_boss_wave(wave: u32, boss_every: u32) -> bool {
    boss_every > 0 && wave > 0 && wave % boss_every == 0
}

/// Base enemies per second before boss/calm/event factors
pub fn spawn_rate(difficulty: f32, spawn_mul: f32) -> f32 {
    (1.4 * difficulty).clamp(1.3, 11.0) * spawn_mul
}

/// Per-wave spawn weights; each kind ramps in linearly past its unlock wave
pub fn spawn_table(wave: u32) -> [(EnemyTag, f32); 8] {
    let ramp = |offset: u32, k: f32| wave.saturating_sub(offset) as f32 * k;
    [
        (EnemyTag::Walker, 10.0),
        (EnemyTag::Fast, ramp(1, 1.4)),
        (EnemyTag::Tank, ramp(2, 0.9)),
        (EnemyTag::Spitter, ramp(3, 1.1)),
        (EnemyTag::Shield, ramp(4, 0.8)),
        (EnemyTag::Charger, ramp(4, 0.9)),
        (EnemyTag::Exploder, ramp(5, 1.0)),
        (EnemyTag::Summoner, ramp(6, 0.8)),
    ]
}

fn forced_boss(wave: u32) -> Option<BossType> {
    match wave {
        5 => Some(BossType::Rager),
        10 => Some(BossType::Artillery),
        15 => Some(BossType::Titan),
        20 => Some(BossType::Summoner),
        _ => None,
    }
}

/// Boss type for a boss wave: fixed milestones first, then a weighted table
/// that grows with the wave number.
pub fn boss_type_for_wave<R: Rng + ?Sized>(wave: u32, rng: &mut R) -> BossType {
    if let Some(b) = forced_boss(wave) {
        return b;
    }
    let mut table = vec![(BossType::Rager, 1.0)];
    if wave >= 10 {
        table.push((BossType::Artillery, 1.0));
    }
    if wave >= 15 {
        table.push((BossType::Titan, 0.8));
    }
    if wave >= 20 {
        table.push((BossType::Summoner, 0.8));
    }
    pick_weighted(rng, &table).unwrap_or(BossType::Rager)
}

/// Random point just outside one of the four viewport edges
pub fn edge_spawn_point<R: Rng + ?Sized>(camera: Vec2, viewport: Vec2, rng: &mut R) -> Vec2 {
    let c = camera + viewport * 0.5;
    let half = viewport * 0.5;
    let along: f32 = rng.random::<f32>() - 0.5;
    match rng.random_range(0..4) {
        0 => Vec2::new(c.x - half.x - EDGE_PAD, c.y + along * viewport.y),
        1 => Vec2::new(c.x + half.x + EDGE_PAD, c.y + along * viewport.y),
        2 => Vec2::new(c.x + along * viewport.x, c.y - half.y - EDGE_PAD),
        _ => Vec2::new(c.x + along * viewport.x, c.y + half.y + EDGE_PAD),
    }
}

/// Spawn a regular enemy on the screen edge (respects the cap)
pub fn spawn_at_edge(state: &mut GameState, tag: EnemyTag) -> bool {
    let pos = edge_spawn_point(state.camera, state.viewport, &mut state.rng);
    state.spawn_enemy(tag, pos)
}

/// Spawn this wave's boss on the screen edge. Bosses ignore the enemy cap.
pub fn spawn_boss(state: &mut GameState) -> BossType {
    let wave = state.waves.wave;
    let boss = boss_type_for_wave(wave, &mut state.rng);
    let pos = edge_spawn_point(state.camera, state.viewport, &mut state.rng);
    let id = state.next_entity_id();
    state
        .enemies
        .push(Enemy::new_boss(id, boss, pos, wave, &state.diff));

    state.waves.boss_alive = true;
    state.waves.boss_wave = wave;
    state.waves.bosses_spawned += 1;

    log::info!("boss spawned: {} (wave {wave})", boss.key());
    let at = state.player.pos - Vec2::new(0.0, 34.0);
    state.push_float(at, 1.6, "BOSS");
    state.emit(GameEvent::BossSpawned(boss));
    boss
}

/// Roll calm windows and events for a freshly started wave
fn on_wave_start(state: &mut GameState) {
    let wave = state.waves.wave;
    log::info!("wave {wave} started");
    state.emit(GameEvent::WaveStarted(wave));

    if is_boss_wave(wave, state.config.boss_every) {
        return;
    }
    let at = state.player.pos - Vec2::new(0.0, 24.0);

    if wave % CALM_EVERY == CALM_EVERY - 1 {
        state.waves.calm_t = CALM_SECS;
        log::info!("calm window (wave {wave})");
        state.push_float(at, 1.4, "CALM");
        state.emit(GameEvent::WaveEvent(WaveEventKind::Calm));
        return;
    }

    if wave >= EVENT_MIN_WAVE && state.rng.random::<f32>() < EVENT_CHANCE {
        if state.rng.random_bool(0.5) {
            state.waves.event = Some(WaveEventKind::Rush);
            state.waves.event_t = RUSH_SECS;
            log::info!("event: rush (wave {wave})");
            state.push_float(at, 1.4, "RUSH!");
            state.emit(GameEvent::WaveEvent(WaveEventKind::Rush));
        } else {
            let n = 3 + (wave / 5).min(3);
            let elites = [EnemyTag::Tank, EnemyTag::Shield, EnemyTag::Charger];
            for _ in 0..n {
                let tag = elites[state.rng.random_range(0..elites.len())];
                spawn_at_edge(state, tag);
            }
            log::info!("event: elites x{n} (wave {wave})");
            state.push_float(at, 1.4, "ELITES!");
            state.emit(GameEvent::WaveEvent(WaveEventKind::Elites));
        }
        return;
    }

    if state.rng.random::<f32>() < 0.25 {
        state.push_float(at, 1.2, format!("WAVE {wave}"));
    }
}

/// Countdown to the next boss wave and its one-shot warning
fn update_boss_telegraph(state: &mut GameState, ws: f32, every: u32) {
    let wave = state.waves.wave;
    let left = (ws - state.time % ws).max(0.0);
    let rem = wave % every;
    let next_boss_wave = if rem == 0 && state.waves.boss_wave != wave {
        wave
    } else {
        wave + every - rem
    };
    // The boss wave starts when the waves in between have run out
    state.waves.next_boss_in = if next_boss_wave > wave {
        (next_boss_wave - wave - 1) as f32 * ws + left
    } else {
        0.0
    };
    if next_boss_wave > wave
        && state.waves.next_boss_in <= BOSS_WARN_SECS
        && !state.waves.boss_alive
        && state.waves.boss_warn_wave != wave
    {
        state.waves.boss_warn_wave = wave;
        let at = state.player.pos - Vec2::new(0.0, 30.0);
        state.push_float(at, 1.4, "BOSS INCOMING");
        state.emit(GameEvent::BossIncoming);
    }
}

/// Advance the wave director by one tick
pub fn update_waves(state: &mut GameState, dt: f32) {
    let ws = state.config.wave_seconds;
    let every = state.config.boss_every;

    let next = wave_index_at(state.time, ws);
    state.waves.wave_just_started = next != state.waves.wave;
    if state.waves.wave_just_started {
        state.waves.wave = next;
        state.waves.boss_alive = false;
        state.waves.boss_wave = 0;
        state.waves.calm_t = 0.0;
        on_wave_start(state);
    }
    let wave = state.waves.wave;

    if every > 0 {
        update_boss_telegraph(state, ws, every);
    } else {
        state.waves.next_boss_in = 0.0;
    }

    state.waves.difficulty = 1.0 + wave as f32 * 0.16;

    if is_boss_wave(wave, every) && !state.waves.boss_alive && state.waves.boss_wave != wave {
        spawn_boss(state);
    }

    // Timers
    state.waves.calm_t = (state.waves.calm_t - dt).max(0.0);
    if state.waves.event.is_some() {
        state.waves.event_t -= dt;
        if state.waves.event_t <= 0.0 {
            state.waves.event = None;
            state.waves.event_t = 0.0;
        }
    }

    // Spawn pacing
    let mut rate = spawn_rate(state.waves.difficulty, state.diff.spawn_mul);
    if state.waves.boss_alive {
        rate *= BOSS_SLOWDOWN;
    }
    if state.waves.calm_t > 0.0 {
        rate *= CALM_FACTOR;
    }
    if state.waves.event == Some(WaveEventKind::Rush) {
        rate *= RUSH_FACTOR;
    }
    state.waves.spawn_acc += dt * rate;

    let table = spawn_table(wave);
    while state.waves.spawn_acc >= 1.0 {
        state.waves.spawn_acc -= 1.0;
        let tag = pick_weighted(&mut state.rng, &table).unwrap_or(EnemyTag::Walker);
        if state.waves.boss_alive && state.rng.random::<f32>() < BOSS_SKIP_CHANCE {
            continue;
        }
        spawn_at_edge(state, tag);
    }

    if state.waves.boss_alive && !state.boss_alive() {
        state.waves.boss_alive = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::{GameConfig, MapId, RunSetup};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn state_with(wave_seconds: f32) -> GameState {
        let config = GameConfig {
            wave_seconds,
            ..GameConfig::default()
        };
        let setup = RunSetup {
            map: MapId::Plains,
            ..RunSetup::default()
        };
        let mut s = GameState::with_config(11, setup, config);
        s.start();
        s
    }

    #[test]
    fn test_wave_index() {
        assert_eq!(wave_index_at(0.0, 22.0), 1);
        assert_eq!(wave_index_at(21.9, 22.0), 1);
        assert_eq!(wave_index_at(22.0, 22.0), 2);
        assert_eq!(wave_index_at(-3.0, 22.0), 1);
        assert!(is_boss_wave(5, 5));
        assert!(!is_boss_wave(4, 5));
        assert!(!is_boss_wave(0, 5));
    }

    #[test]
    fn test_spawn_rate_bounds() {
        assert_eq!(spawn_rate(0.5, 1.0), 1.3);
        assert_eq!(spawn_rate(100.0, 1.0), 11.0);
        assert!((spawn_rate(2.0, 1.25) - 3.5).abs() < 1e-5);
    }

    #[test]
    fn test_spawn_table_unlocks() {
        let w1 = spawn_table(1);
        assert!(w1.iter().skip(1).all(|&(_, w)| w == 0.0));
        let w7 = spawn_table(7);
        assert!(w7.iter().all(|&(_, w)| w > 0.0));
    }

    #[test]
    fn test_forced_boss_milestones() {
        let mut rng = Pcg32::seed_from_u64(1);
        assert_eq!(boss_type_for_wave(5, &mut rng), BossType::Rager);
        assert_eq!(boss_type_for_wave(10, &mut rng), BossType::Artillery);
        assert_eq!(boss_type_for_wave(15, &mut rng), BossType::Titan);
        assert_eq!(boss_type_for_wave(20, &mut rng), BossType::Summoner);
        // Before artillery unlocks only ragers are drawn
        for _ in 0..20 {
            assert_eq!(boss_type_for_wave(7, &mut rng), BossType::Rager);
        }
    }

    /// Waves on which a boss spawned and on which a calm window opened
    fn run_waves(boss_every: u32, waves: u32) -> (Vec<u32>, Vec<u32>) {
        let mut state = state_with(2.0);
        state.config.boss_every = boss_every;
        let dt = 0.05;
        let (mut bosses, mut calms) = (Vec::new(), Vec::new());
        while state.time < 2.0 * waves as f32 - 0.01 {
            state.time += dt;
            update_waves(&mut state, dt);
            for ev in state.drain_events() {
                match ev {
                    GameEvent::BossSpawned(_) => bosses.push(state.waves.wave),
                    GameEvent::WaveEvent(WaveEventKind::Calm) => calms.push(state.waves.wave),
                    _ => {}
                }
            }
            // Kill bosses right away: a dead boss must not respawn this wave
            state.enemies.retain(|e| !e.is_boss());
        }
        (bosses, calms)
    }

    #[test]
    fn test_boss_cadence() {
        let (bosses, calms) = run_waves(5, 21);
        assert_eq!(bosses, vec![5, 10, 15, 20]);
        assert_eq!(calms, vec![3, 7, 11, 19]);
    }

    #[test]
    fn test_boss_cadence_every_three() {
        let (bosses, calms) = run_waves(3, 21);
        assert_eq!(bosses, vec![3, 6, 9, 12, 15, 18, 21]);
        assert_eq!(calms, vec![7, 11, 19]);
    }

    #[test]
    fn test_zero_cadence_disables_bosses() {
        let (bosses, calms) = run_waves(0, 21);
        assert!(bosses.is_empty());
        assert_eq!(calms, vec![3, 7, 11, 15, 19]);
    }

    #[test]
    fn test_zero_wave_length_does_not_overflow() {
        assert_eq!(wave_index_at(5.0, 0.0), 1);
        assert_eq!(wave_index_at(5.0, f32::NAN), 1);
        assert_eq!(wave_index_at(1e30, 1e-30), u32::MAX);

        let mut state = state_with(0.0);
        assert_eq!(state.config.wave_seconds, 1.0);
        state.time = 100.5;
        update_waves(&mut state, 0.016);
        assert_eq!(state.waves.wave, 101);
    }

    #[test]
    fn test_boss_bypasses_cap() {
        let mut state = state_with(22.0);
        state.config.max_enemies = 0;
        state.time = 22.0 * 4.0 + 0.01;
        update_waves(&mut state, 0.016);
        assert_eq!(state.waves.wave, 5);
        assert_eq!(state.enemies.len(), 1);
        assert!(state.enemies[0].is_boss());
        assert!(state.waves.boss_alive);
    }

    #[test]
    fn test_boss_warning_fires_once() {
        let mut state = state_with(22.0);
        state.time = 22.0 * 4.0 - 4.0;
        update_waves(&mut state, 0.016);
        let mut warnings = 0;
        for _ in 0..100 {
            state.time += 0.016;
            update_waves(&mut state, 0.016);
            warnings += state
                .drain_events()
                .iter()
                .filter(|e| matches!(e, GameEvent::BossIncoming))
                .count();
        }
        assert_eq!(warnings, 1);
    }

    #[test]
    fn test_calm_window_on_wave_three() {
        let mut state = state_with(22.0);
        state.time = 44.0 + 0.01;
        update_waves(&mut state, 0.016);
        assert_eq!(state.waves.wave, 3);
        assert!(state.waves.calm_t > 5.9);
        assert!(
            state
                .drain_events()
                .contains(&GameEvent::WaveEvent(WaveEventKind::Calm))
        );
    }

    #[test]
    fn test_edge_spawn_outside_viewport() {
        let mut rng = Pcg32::seed_from_u64(9);
        let cam = Vec2::new(-480.0, -270.0);
        let vp = Vec2::new(960.0, 540.0);
        for _ in 0..200 {
            let p = edge_spawn_point(cam, vp, &mut rng);
            let inside = p.x > cam.x && p.x < cam.x + vp.x && p.y > cam.y && p.y < cam.y + vp.y;
            assert!(!inside);
        }
    }

    proptest! {
        #[test]
        fn prop_wave_index_monotonic(a in 0.0f32..10_000.0, b in 0.0f32..10_000.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(wave_index_at(lo, 22.0) <= wave_index_at(hi, 22.0));
        }

        #[test]
        fn prop_wave_steps_by_one(k in 0u32..300, frac in 0.01f32..0.99) {
            let ws = 22.0;
            let t = (k as f32 + frac) * ws;
            prop_assert_eq!(wave_index_at(t, ws), k + 1);
            prop_assert_eq!(wave_index_at(t + ws, ws), k + 2);
        }
    }
}
