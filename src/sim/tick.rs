//! Per-frame simulation tick
//!
//! Advances the game state by one clamped step. Order matters: waves, player
//! movement, camera, weapons, enemies, bullets, enemy bullets, pickups,
//! objective, floating text.

use glam::Vec2;
use rand::Rng;

use super::combat::{update_bullets, update_enemies, update_enemy_bullets};
use super::entities::EnemyTag;
use super::progression::{update_objective, update_pickups};
use super::state::{GamePhase, GameState};
use super::waves::{spawn_at_edge, update_waves};
use super::weapons::{update_turrets, update_weapons};
use super::world::Biome;
use crate::dir_or_x;

/// Ice: acceleration toward the target velocity (px/s^2)
pub const ICE_ACCEL: f32 = 920.0;
const ICE_SPEED_MUL: f32 = 1.15;
/// Ice: velocity lost per tick
const ICE_FRICTION: f32 = 0.06;

pub const MUD_SPEED_MUL: f32 = 0.62;

pub const DASH_TIME: f32 = 0.12;
pub const DASH_SPEED: f32 = 560.0;
const DASH_ICE_MUL: f32 = 1.08;
pub const DASH_COOLDOWN: f32 = 1.15;

const CAMERA_RATE: f32 = 10.0;
const FLOAT_RISE: f32 = 18.0;
const WALL_BUMP_T: f32 = 0.12;

/// Below this many enemies (and no boss) a walker may trickle in
const KEEP_PRESSURE_MIN: usize = 3;
const KEEP_PRESSURE_CHANCE: f32 = 0.05;

/// Input commands for a single tick
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput {
    /// Movement vector, length at most 1
    pub move_dir: Vec2,
    /// Dash requested this frame
    pub dash: bool,
    /// Pause toggle
    pub pause: bool,
    /// Host wall clock in ms (0 = unchanged)
    pub now_ms: f64,
}

/// Advance the game state by one step of `dt` seconds
pub fn tick(state: &mut GameState, input: &TickInput, dt: f32) {
    if input.pause {
        state.toggle_pause();
    }
    if input.now_ms > 0.0 {
        state.now_ms = input.now_ms;
    }

    // Ready, paused, upgrade menu and game over all freeze the simulation
    if state.phase != GamePhase::Playing {
        return;
    }
    let dt = dt.clamp(0.0, state.config.max_dt);
    if dt <= 0.0 {
        return;
    }
    if input.dash {
        state.request_dash();
    }

    state.time += dt;

    update_waves(state, dt);
    update_player(state, input.move_dir, dt);
    update_camera(state, dt);
    update_weapons(state, dt);
    update_turrets(state, dt);

    update_enemies(state, dt);
    if state.phase == GamePhase::GameOver {
        return;
    }
    update_bullets(state, dt);
    update_enemy_bullets(state, dt);
    if state.phase == GamePhase::GameOver {
        return;
    }

    update_pickups(state, dt);
    update_objective(state);
    update_floats(state, dt);
    keep_pressure(state);
    decay_feedback(state, dt);
}

/// Dash, biome-dependent movement and wall resolution
fn update_player(state: &mut GameState, move_dir: Vec2, dt: f32) {
    let mv = move_dir.clamp_length_max(1.0);
    let moving = mv.length_squared() > 0.02 * 0.02;
    let world = state.world;
    let dash = &mut state.dash;
    let p = &mut state.player;

    if moving {
        p.last_move = mv.normalize();
    }

    dash.cd = (dash.cd - dt).max(0.0);
    dash.t = (dash.t - dt).max(0.0);
    if dash.requested {
        dash.requested = false;
        if dash.cd <= 0.0 {
            dash.dir = if moving { mv.normalize() } else { dir_or_x(p.last_move) };
            dash.t = DASH_TIME;
            dash.cd = DASH_COOLDOWN * p.buffs.dash_cd_mul;
        }
    }

    let biome = world.tile_at(p.pos).biome;
    let speed = p.speed * p.buffs.move_speed_mul;

    if dash.t > 0.0 {
        let ice = if biome == Biome::Ice { DASH_ICE_MUL } else { 1.0 };
        p.vel = dash.dir * DASH_SPEED * p.buffs.dash_pow_mul * ice;
    } else if biome == Biome::Ice {
        let target = mv * speed * ICE_SPEED_MUL;
        let step = Vec2::splat(ICE_ACCEL * dt);
        p.vel += (target - p.vel).clamp(-step, step);
        p.vel *= 1.0 - ICE_FRICTION;
    } else {
        let mud = if biome == Biome::Mud { MUD_SPEED_MUL } else { 1.0 };
        p.vel = mv * speed * mud;
    }
    p.pos += p.vel * dt;

    let before = p.pos;
    p.pos = world.resolve_circle(p.pos, p.radius);
    if before.distance_squared(p.pos) > 0.0004 {
        state.fx.wall_bump_t = WALL_BUMP_T;
        state.fx.wall_bump_pos = p.pos;
    }
}

/// Ease the camera so the player sits at the viewport center
fn update_camera(state: &mut GameState, dt: f32) {
    let target = state.player.pos - state.viewport * 0.5;
    let k = (dt * CAMERA_RATE).clamp(0.0, 1.0);
    state.camera += (target - state.camera) * k;
}

fn update_floats(state: &mut GameState, dt: f32) {
    state.floats.retain_mut(|f| {
        f.ttl -= dt;
        f.pos.y -= FLOAT_RISE * dt;
        f.ttl > 0.0
    });
}

/// Trickle walkers in when the field is nearly empty
fn keep_pressure(state: &mut GameState) {
    if state.enemies.len() < KEEP_PRESSURE_MIN
        && !state.waves.boss_alive
        && state.rng.random::<f32>() < KEEP_PRESSURE_CHANCE
    {
        spawn_at_edge(state, EnemyTag::Walker);
    }
}

fn decay_feedback(state: &mut GameState, dt: f32) {
    let fx = &mut state.fx;
    fx.hit_flash = (fx.hit_flash - dt).max(0.0);
    fx.damage_t = (fx.damage_t - dt).max(0.0);
    fx.wall_bump_t = (fx.wall_bump_t - dt).max(0.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::sim::state::GameEvent;
    use crate::tuning::{MapId, RunSetup, TileDensity};

    fn playing(seed: u64) -> GameState {
        let mut s = GameState::new(
            seed,
            RunSetup {
                map: MapId::Plains,
                ..RunSetup::default()
            },
        );
        s.start();
        s
    }

    /// Uniform terrain away from the safe zone
    fn terrain(state: &mut GameState, ice: f32, mud: f32) {
        state.world.tiles = TileDensity { wall: 0.0, ice, mud };
        state.player.pos = Vec2::new(900.0, 900.0);
    }

    fn walk(state: &mut GameState, dir: Vec2, secs: f32) -> Vec2 {
        let start = state.player.pos;
        let input = TickInput {
            move_dir: dir,
            ..Default::default()
        };
        let mut t = 0.0;
        while t < secs {
            update_player(state, input.move_dir, SIM_DT);
            t += SIM_DT;
        }
        state.player.pos - start
    }

    #[test]
    fn test_ready_phase_is_frozen() {
        let mut state = GameState::new(1, RunSetup::default());
        tick(&mut state, &TickInput::default(), SIM_DT);
        assert_eq!(state.phase, GamePhase::Ready);
        assert_eq!(state.time, 0.0);
    }

    #[test]
    fn test_pause_freezes_time() {
        let mut state = playing(1);
        tick(&mut state, &TickInput::default(), SIM_DT);
        let t = state.time;

        let pause = TickInput {
            pause: true,
            ..Default::default()
        };
        tick(&mut state, &pause, SIM_DT);
        assert_eq!(state.phase, GamePhase::Paused);
        for _ in 0..10 {
            tick(&mut state, &TickInput::default(), SIM_DT);
        }
        assert_eq!(state.time, t);

        tick(&mut state, &pause, SIM_DT);
        assert_eq!(state.phase, GamePhase::Playing);
        assert!(state.time > t);
    }

    #[test]
    fn test_dt_is_clamped() {
        let mut state = playing(1);
        tick(&mut state, &TickInput::default(), 5.0);
        assert!((state.time - state.config.max_dt).abs() < 1e-6);
        tick(&mut state, &TickInput::default(), -1.0);
        assert!((state.time - state.config.max_dt).abs() < 1e-6);
    }

    #[test]
    fn test_mud_slows_movement() {
        let mut normal = playing(2);
        terrain(&mut normal, 0.0, 0.0);
        let d_normal = walk(&mut normal, Vec2::X, 1.0).length();

        let mut mud = playing(2);
        terrain(&mut mud, 0.0, 1.0);
        let d_mud = walk(&mut mud, Vec2::X, 1.0).length();

        assert!((d_mud / d_normal - MUD_SPEED_MUL).abs() < 0.01);
    }

    #[test]
    fn test_ice_is_inertial() {
        let mut state = playing(2);
        terrain(&mut state, 1.0, 0.0);
        update_player(&mut state, Vec2::X, SIM_DT);
        let speed = state.player.speed * state.player.buffs.move_speed_mul;
        assert!(state.player.vel.x < speed * 0.5);

        walk(&mut state, Vec2::X, 1.0);
        let slide = walk(&mut state, Vec2::ZERO, 0.2);
        assert!(slide.x > 1.0);
    }

    #[test]
    fn test_dash_burst_and_cooldown() {
        let mut state = playing(2);
        terrain(&mut state, 0.0, 0.0);
        state.dash.requested = true;
        let d = walk(&mut state, Vec2::ZERO, DASH_TIME);
        assert!(d.x > DASH_SPEED * DASH_TIME * 0.8);
        assert!(state.dash.cd > 0.9);

        state.dash.requested = true;
        update_player(&mut state, Vec2::ZERO, SIM_DT);
        assert_eq!(state.dash.t, 0.0);
    }

    #[test]
    fn test_camera_eases_toward_player() {
        let mut state = playing(2);
        state.player.pos = Vec2::new(400.0, 0.0);
        let target = state.player.pos - state.viewport * 0.5;
        let before = state.camera.distance(target);
        update_camera(&mut state, SIM_DT);
        let after = state.camera.distance(target);
        assert!(after < before);
    }

    #[test]
    fn test_contact_death_ends_run_once() {
        let mut state = playing(4);
        state.player.hp = 0.01;
        state.spawn_enemy(EnemyTag::Walker, state.player.pos + Vec2::new(4.0, 0.0));
        tick(&mut state, &TickInput::default(), SIM_DT);
        assert_eq!(state.phase, GamePhase::GameOver);
        assert_eq!(state.player.hp, 0.0);

        let t = state.time;
        tick(&mut state, &TickInput::default(), SIM_DT);
        assert_eq!(state.time, t);

        let events = state.drain_events();
        let deaths = events.iter().filter(|e| matches!(e, GameEvent::Death)).count();
        let ends = events
            .iter()
            .filter(|e| matches!(e, GameEvent::RunEnded(_)))
            .count();
        assert_eq!((deaths, ends), (1, 1));
    }

    #[test]
    fn test_same_seed_same_run() {
        let run = |seed: u64| {
            let mut state = playing(seed);
            state.player.hp = 1.0e6;
            state.player.hp_max = 1.0e6;
            for i in 0..900 {
                let a = i as f32 * 0.01;
                let input = TickInput {
                    move_dir: Vec2::from_angle(a),
                    dash: i % 120 == 0,
                    ..Default::default()
                };
                tick(&mut state, &input, SIM_DT);
                while state.phase == GamePhase::Upgrade {
                    crate::sim::progression::choose_upgrade(&mut state, 0);
                }
            }
            serde_json::to_string(&state).unwrap()
        };
        assert_eq!(run(77), run(77));
    }
}
