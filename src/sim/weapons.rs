//! Auto-firing weapons and turrets
//!
//! Every owned weapon counts down its cooldown and fires at the nearest enemy.
//! Nothing fires (and no cooldown runs) while the field is empty.

use glam::Vec2;
use rand::Rng;

use super::entities::{
    Ballistic, Beam, Boomerang, Bullet, BulletKind, Chain, DotKind, DotPayload, Enemy, Mine, Turret,
    WeaponId,
};
use super::state::{GameEvent, GameState};
use crate::{dir_or_x, rand_range, rotate};

/// Live turret limit
pub const MAX_TURRETS: usize = 4;

const DEFAULT_TTL: f32 = 1.1;
const DEFAULT_RADIUS: f32 = 3.0;

const TURRET_BULLET_SPEED: f32 = 420.0;
const TURRET_SPREAD: f32 = 0.08;

/// Nearest living enemy to `p`
pub fn nearest_enemy(enemies: &[Enemy], p: Vec2) -> Option<&Enemy> {
    enemies
        .iter()
        .filter(|e| e.alive())
        .min_by(|a, b| a.pos.distance_squared(p).total_cmp(&b.pos.distance_squared(p)))
}

/// A directed projectile launch
struct Shot {
    speed: f32,
    dmg: f32,
    spread: f32,
    ttl: f32,
    radius: f32,
    kind: BulletKind,
}

impl Shot {
    fn new(speed: f32, dmg: f32, spread: f32, kind: BulletKind) -> Self {
        Self {
            speed,
            dmg,
            spread,
            ttl: DEFAULT_TTL,
            radius: DEFAULT_RADIUS,
            kind,
        }
    }
}

/// Launch from `from` along `dir` with a uniform random spread
fn shoot(state: &mut GameState, from: Vec2, dir: Vec2, shot: Shot) {
    let a = if shot.spread > 0.0 {
        (state.rng.random::<f32>() - 0.5) * shot.spread
    } else {
        0.0
    };
    let vel = rotate(dir, a) * shot.speed;
    state.push_bullet(Bullet {
        pos: from,
        vel,
        dmg: shot.dmg,
        ttl: shot.ttl,
        radius: shot.radius,
        kind: shot.kind,
    });
}

fn ballistic(pierce: u32, knock: f32, dot: Option<DotPayload>) -> Ballistic {
    Ballistic {
        pierce,
        knock,
        dot,
        hits: Vec::new(),
    }
}

/// Fire one weapon toward `target`; returns the new cooldown
pub fn fire_weapon(state: &mut GameState, id: WeaponId, level: u8, target: Vec2) -> f32 {
    let l = level as f32;
    let fire_mul = state.player.buffs.fire_rate_mul;
    let dmg_mul = state.player.buffs.dmg_mul;
    let origin = state.player.pos;
    let dir = dir_or_x(target - origin);

    let rate = match id {
        WeaponId::Pistol => {
            let dmg = (18.0 + l * 4.0) * dmg_mul;
            let shots = 1 + u32::from(level >= 3) + u32::from(level >= 4);
            if shots == 1 {
                let kind = BulletKind::Pistol(Ballistic::default());
                shoot(state, origin, dir, Shot::new(430.0, dmg, 0.12, kind));
            } else {
                for _ in 0..shots {
                    let kind = BulletKind::Pistol(Ballistic::default());
                    shoot(state, origin, dir, Shot::new(430.0, dmg * 0.8, 0.18, kind));
                }
            }
            6.2 + l * 0.65
        }
        WeaponId::Shotgun => {
            let pellets = 3 + level / 2 + u8::from(level >= 4);
            let dmg = (10.0 + l * 2.5) * dmg_mul;
            let spread = if level >= 4 { 0.62 } else { 0.75 };
            for _ in 0..pellets {
                let kind = BulletKind::Shotgun(ballistic(0, 22.0 + l * 3.0, None));
                shoot(state, origin, dir, Shot::new(390.0, dmg, spread, kind));
            }
            1.2 + l * 0.12
        }
        WeaponId::Lance => {
            let bleed = DotPayload {
                kind: DotKind::Bleed,
                dps: 6.0 + l * 2.0,
                duration: 1.6,
            };
            let pierce = 2 + (u32::from(level).saturating_sub(1)) / 2;
            let kind = BulletKind::Lance(ballistic(pierce, 0.0, Some(bleed)));
            let shot = Shot {
                ttl: 1.2 + l * 0.03,
                ..Shot::new(520.0, (34.0 + l * 9.0) * dmg_mul, 0.06, kind)
            };
            shoot(state, origin, dir, shot);
            0.55 + l * 0.05
        }
        WeaponId::Flame => {
            let burn = DotPayload {
                kind: DotKind::Burn,
                dps: 5.0 + l * 1.6,
                duration: 1.2 + l * 0.08,
            };
            let puffs = 2 + level / 2;
            let pierce = u32::from(level >= 4);
            let dmg = (4.0 + l * 1.1) * dmg_mul;
            for _ in 0..puffs {
                let kind = BulletKind::Flame(ballistic(pierce, 0.0, Some(burn)));
                let shot = Shot {
                    ttl: 0.26 + l * 0.01,
                    radius: 8.0,
                    ..Shot::new(270.0, dmg, 1.05, kind)
                };
                shoot(state, origin, dir, shot);
            }
            10.0 + l * 1.25
        }
        WeaponId::Laser => {
            let burn = DotPayload {
                kind: DotKind::Burn,
                dps: 8.0 + l * 2.4,
                duration: 1.1 + l * 0.08,
            };
            state.push_bullet(Bullet {
                pos: origin,
                vel: Vec2::ZERO,
                dmg: (22.0 + l * 6.0) * dmg_mul,
                ttl: 0.08,
                radius: 0.0,
                kind: BulletKind::Laser(Beam {
                    dir,
                    len: 520.0 + l * 18.0,
                    width: 10.0,
                    burn: Some(burn),
                    did_hit: false,
                }),
            });
            0.70 + l * 0.06
        }
        WeaponId::Mine => {
            let jitter = Vec2::new(
                rand_range(&mut state.rng, -18.0, 18.0),
                rand_range(&mut state.rng, -18.0, 18.0),
            );
            state.push_bullet(Bullet {
                pos: origin + jitter,
                vel: Vec2::ZERO,
                dmg: (46.0 + l * 12.0) * dmg_mul,
                ttl: 10.5,
                radius: 0.0,
                kind: BulletKind::Mine(Mine {
                    arm_t: 0.35,
                    trigger_r: 22.0,
                    explode_r: 56.0 + l * 5.0,
                }),
            });
            0.32 + l * 0.03
        }
        WeaponId::Boomerang => {
            let speed = 360.0 + l * 14.0;
            state.push_bullet(Bullet {
                pos: origin,
                vel: dir * speed,
                dmg: (18.0 + l * 5.2) * dmg_mul,
                ttl: 2.2 + l * 0.06,
                radius: 4.0,
                kind: BulletKind::Boomerang(Boomerang {
                    speed,
                    turn_t: 0.42 + l * 0.02,
                    returning: false,
                    pierce: 1 + u32::from(level) / 2,
                    hit_cd: 0.0,
                }),
            });
            0.60 + l * 0.05
        }
        WeaponId::Tesla => {
            state.push_bullet(Bullet {
                pos: origin,
                vel: Vec2::ZERO,
                dmg: (16.0 + l * 4.4) * dmg_mul,
                ttl: 0.10,
                radius: 0.0,
                kind: BulletKind::Tesla(Chain {
                    chains: 2 + u32::from(level) / 2,
                    chain_r: 110.0 + l * 6.0,
                    did_hit: false,
                    points: Vec::new(),
                }),
            });
            0.85 + l * 0.05
        }
        WeaponId::Turret => {
            if state.turrets.len() < MAX_TURRETS {
                let offset = Vec2::new(
                    rand_range(&mut state.rng, -26.0, 26.0),
                    rand_range(&mut state.rng, -26.0, 26.0),
                );
                let cd = rand_range(&mut state.rng, 0.0, 0.35);
                let turret = Turret {
                    pos: origin + offset,
                    ttl: 6.8 + l * 0.45,
                    cd,
                    rate: 2.1 + l * 0.22,
                    dmg: (10.0 + l * 2.8) * dmg_mul,
                    range: state.player.range + 40.0,
                };
                state.turrets.push(turret);
                state.push_float(origin - Vec2::new(0.0, 20.0), 1.0, "TURRET");
            }
            0.20 + l * 0.015
        }
    };

    if id != WeaponId::Turret {
        state.emit(GameEvent::Shoot(id));
    }
    1.0 / (rate * fire_mul)
}

/// Count down weapon cooldowns and fire every ready weapon
pub fn update_weapons(state: &mut GameState, dt: f32) {
    let Some(target) = nearest_enemy(&state.enemies, state.player.pos).map(|e| e.pos) else {
        return;
    };
    state.player.aim_angle = (target - state.player.pos).to_angle();

    for i in 0..state.player.weapons.len() {
        let slot = &mut state.player.weapons[i];
        slot.cooldown -= dt;
        if slot.cooldown > 0.0 {
            continue;
        }
        let (id, level) = (slot.id, slot.level);
        let cd = fire_weapon(state, id, level, target);
        state.player.weapons[i].cooldown = cd;
    }
}

/// Age turrets and fire at the nearest enemy in range
pub fn update_turrets(state: &mut GameState, dt: f32) {
    let mut volleys: Vec<(Vec2, Vec2, f32)> = Vec::new();

    state.turrets.retain_mut(|t| {
        t.ttl -= dt;
        if t.ttl <= 0.0 {
            return false;
        }
        t.cd -= dt;
        if t.cd > 0.0 {
            return true;
        }
        if let Some(e) = nearest_enemy(&state.enemies, t.pos) {
            if e.pos.distance_squared(t.pos) <= t.range * t.range {
                volleys.push((t.pos, dir_or_x(e.pos - t.pos), t.dmg));
                t.cd = 1.0 / t.rate;
            }
        }
        true
    });

    for (from, dir, dmg) in volleys {
        let kind = BulletKind::Turret(Ballistic::default());
        shoot(state, from, dir, Shot::new(TURRET_BULLET_SPEED, dmg, TURRET_SPREAD, kind));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::entities::EnemyTag;
    use crate::tuning::{HeroId, MapId, RunSetup};

    fn playing() -> GameState {
        let setup = RunSetup {
            map: MapId::Plains,
            hero: HeroId::Gunner,
            ..RunSetup::default()
        };
        let mut s = GameState::new(3, setup);
        s.start();
        s
    }

    #[test]
    fn test_no_fire_without_enemies() {
        let mut state = playing();
        let before: Vec<f32> = state.player.weapons.iter().map(|w| w.cooldown).collect();
        update_weapons(&mut state, 1.0);
        assert!(state.bullets.is_empty());
        let after: Vec<f32> = state.player.weapons.iter().map(|w| w.cooldown).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_fires_at_nearest_and_aims() {
        let mut state = playing();
        state.spawn_enemy(EnemyTag::Walker, Vec2::new(0.0, 200.0));
        state.spawn_enemy(EnemyTag::Walker, Vec2::new(0.0, -500.0));
        for w in &mut state.player.weapons {
            w.cooldown = 0.0;
        }
        update_weapons(&mut state, 0.016);
        assert!(!state.bullets.is_empty());
        assert!((state.player.aim_angle - std::f32::consts::FRAC_PI_2).abs() < 1e-4);
        assert!(state.events.iter().any(|e| matches!(e, GameEvent::Shoot(_))));
        assert!(state.player.weapons.iter().all(|w| w.cooldown > 0.0));
    }

    #[test]
    fn test_pistol_extra_shots_at_level_three() {
        let mut state = playing();
        fire_weapon(&mut state, WeaponId::Pistol, 1, Vec2::X * 100.0);
        assert_eq!(state.bullets.len(), 1);
        state.bullets.clear();
        fire_weapon(&mut state, WeaponId::Pistol, 3, Vec2::X * 100.0);
        assert_eq!(state.bullets.len(), 2);
        state.bullets.clear();
        fire_weapon(&mut state, WeaponId::Pistol, 4, Vec2::X * 100.0);
        assert_eq!(state.bullets.len(), 3);
    }

    #[test]
    fn test_fire_rate_buff_shortens_cooldown() {
        let mut state = playing();
        state.player.buffs.fire_rate_mul = 1.0;
        let base = fire_weapon(&mut state, WeaponId::Lance, 1, Vec2::X);
        state.player.buffs.fire_rate_mul = 2.0;
        let fast = fire_weapon(&mut state, WeaponId::Lance, 1, Vec2::X);
        assert!((base - 2.0 * fast).abs() < 1e-5);
        assert_eq!(state.bullets[0].kind.pierce(), Some(2));
    }

    #[test]
    fn test_turret_limit_and_fire() {
        let mut state = playing();
        for _ in 0..6 {
            fire_weapon(&mut state, WeaponId::Turret, 2, Vec2::X);
        }
        assert_eq!(state.turrets.len(), MAX_TURRETS);

        state.spawn_enemy(EnemyTag::Walker, Vec2::new(60.0, 0.0));
        for t in &mut state.turrets {
            t.cd = 0.0;
        }
        update_turrets(&mut state, 0.016);
        let shots = state
            .bullets
            .iter()
            .filter(|b| matches!(b.kind, BulletKind::Turret(_)))
            .count();
        assert_eq!(shots, MAX_TURRETS);

        update_turrets(&mut state, 100.0);
        assert!(state.turrets.is_empty());
    }

    #[test]
    fn test_bullet_cap_respected() {
        let mut state = playing();
        state.config.max_bullets = 2;
        fire_weapon(&mut state, WeaponId::Shotgun, 4, Vec2::X);
        assert_eq!(state.bullets.len(), 2);
    }
}
