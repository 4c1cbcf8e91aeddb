//! Combat resolution
//!
//! Per-tick updates of enemies, player bullets and enemy bullets, the shared
//! damage pipeline and the kill path.
//!
//! Enemies that reach zero hp are not removed mid-pass: they stop being valid
//! targets and are reaped at the end of each update, which is where kills are
//! credited and loot is rolled.

use std::f32::consts::TAU;

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

use super::entities::{
    AttackPhase, Beam, BossType, Buffs, Bullet, BulletKind, Chain, Dot, DotKind, DotPayload,
    Enemy, EnemyBullet, EnemyKind, EnemyTag, FloatText, Mine, WeaponId,
};
use super::progression::maybe_drop_pickup;
use super::state::{GameEvent, GameState};
use super::stats;
use super::world::WorldField;
use crate::{dir_or_x, dist2_point_segment, rand_range};

/// Incoming-direction dot product at or below which a shield blocks
pub const SHIELD_FRONT_DOT: f32 = -0.25;

/// Execute bonus applies at or below this hp fraction
pub const EXECUTE_THRESHOLD: f32 = 0.25;

/// Base wall ricochet chance before perks
pub const RICOCHET_BASE: f32 = 0.18;

const BOOMERANG_RICOCHET: f32 = 0.92;
const BOOMERANG_HIT_CD: f32 = 0.12;
const BOOMERANG_CATCH_R: f32 = 14.0;

const BURN_SPREAD_CD: f32 = 0.6;

/// Tesla per-link falloff and its floor
const CHAIN_FALLOFF: f32 = 0.18;
const CHAIN_MIN_MUL: f32 = 0.4;

/// Knockback distance scale (bosses shrug off most of it)
const KNOCK_SCALE: f32 = 0.4;
const BOSS_KNOCK_SCALE: f32 = 0.1;

const MAX_FLOATS: usize = 120;

// Spitter
const SPIT_WIND: f32 = 0.45;
const SPIT_SPEED: f32 = 240.0;

// Artillery boss volley
const VOLLEY_WIND: f32 = 0.7;
const VOLLEY_CD: f32 = 2.8;
const VOLLEY_SPEED: f32 = 170.0;

/// Timings of a telegraphed dash attack
struct DashTuning {
    range: f32,
    wind: f32,
    dash: f32,
    dash_mul: f32,
    recover: f32,
    cd: (f32, f32),
}

const CHARGER_DASH: DashTuning = DashTuning {
    range: 280.0,
    wind: 0.5,
    dash: 0.35,
    dash_mul: 4.2,
    recover: 0.4,
    cd: (1.4, 2.4),
};

const RAGER_DASH: DashTuning = DashTuning {
    range: 420.0,
    wind: 0.6,
    dash: 0.45,
    dash_mul: 3.4,
    recover: 0.6,
    cd: (2.2, 3.4),
};

fn spit_cooldown(wave: u32) -> f32 {
    (1.9 - wave as f32 * 0.08).clamp(0.6, 1.9)
}

/// Result of one damage application
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitOutcome {
    pub dealt: f32,
    pub crit: bool,
}

/// Shared damage pipeline: shield, execute, crit, in that order.
///
/// `dir` is the travel direction of the incoming hit.
pub fn damage_enemy<R: Rng + ?Sized>(
    e: &mut Enemy,
    dmg: f32,
    dir: Vec2,
    source: WeaponId,
    player_pos: Vec2,
    buffs: &Buffs,
    rng: &mut R,
) -> HitOutcome {
    let mut dmg = dmg;

    if let EnemyKind::Shield { front_mul } = e.kind {
        let facing = (player_pos - e.pos).normalize_or_zero();
        if dir.normalize_or_zero().dot(facing) <= SHIELD_FRONT_DOT {
            dmg *= front_mul;
        }
    }

    if e.hp_max > 0.0 && e.hp / e.hp_max <= EXECUTE_THRESHOLD {
        dmg *= buffs.execute_mul;
    }

    let crit = buffs.crit_chance > 0.0 && rng.random::<f32>() < buffs.crit_chance;
    if crit {
        dmg *= buffs.crit_mul;
        if buffs.crit_burn {
            e.dots.apply(
                DotPayload {
                    kind: DotKind::Burn,
                    dps: (dmg * 0.25).max(4.0),
                    duration: 1.6,
                },
                source,
            );
        }
    }

    e.hp -= dmg;
    e.last_hit = Some(source);
    HitOutcome { dealt: dmg, crit }
}

/// Borrowed pieces of the state a hit needs
pub struct HitCtx<'a> {
    pub player_pos: Vec2,
    pub buffs: &'a Buffs,
    pub rng: &'a mut Pcg32,
    pub events: &'a mut Vec<GameEvent>,
    pub floats: &'a mut Vec<FloatText>,
}

impl HitCtx<'_> {
    fn hit(&mut self, e: &mut Enemy, dmg: f32, dir: Vec2, source: WeaponId) -> HitOutcome {
        let out = damage_enemy(e, dmg, dir, source, self.player_pos, self.buffs, self.rng);
        self.events.push(GameEvent::Hit { player: false });
        if self.floats.len() < MAX_FLOATS {
            let n = out.dealt.round() as i32;
            let text = if out.crit { format!("-{n}!") } else { format!("-{n}") };
            self.floats.push(FloatText {
                pos: e.pos - Vec2::new(0.0, 12.0),
                ttl: 0.8,
                text,
            });
        }
        out
    }
}

/// Wall ricochet chance for a bullet kind
pub fn ricochet_chance(kind: &BulletKind, ricochet_add: f32) -> f32 {
    match kind {
        BulletKind::Flame(_) => 0.0,
        BulletKind::Boomerang(_) => BOOMERANG_RICOCHET,
        _ => (RICOCHET_BASE + ricochet_add).clamp(0.0, 1.0),
    }
}

/// Resolve a bullet that moved from `old` into a wall.
///
/// Returns false when the bullet should be destroyed. On a ricochet the bullet
/// goes back to `old`, reflects the axis whose cell changed (dominant velocity
/// axis on a diagonal, random on an exact tie), loses speed and ttl, spends one
/// pierce charge and gains a little damage.
pub fn bounce_or_destroy<R: Rng + ?Sized>(
    b: &mut Bullet,
    old: Vec2,
    world: &WorldField,
    ricochet: bool,
    rng: &mut R,
) -> bool {
    if !ricochet {
        return false;
    }
    let prev = world.world_to_cell(old);
    let next = world.world_to_cell(b.pos);
    b.pos = old;

    let flip_x = match (prev.cx != next.cx, prev.cy != next.cy) {
        (true, false) => true,
        (false, true) => false,
        _ => {
            let (ax, ay) = (b.vel.x.abs(), b.vel.y.abs());
            if ax > ay {
                true
            } else if ay > ax {
                false
            } else {
                rng.random_bool(0.5)
            }
        }
    };
    if flip_x {
        b.vel.x = -b.vel.x;
    } else {
        b.vel.y = -b.vel.y;
    }

    b.vel *= rand_range(rng, 0.72, 0.9);
    b.ttl *= 0.75;
    b.dmg *= 1.06;
    match &mut b.kind {
        BulletKind::Boomerang(bm) => bm.pierce = bm.pierce.saturating_sub(1),
        kind => {
            if let Some(bl) = kind.ballistic_mut() {
                bl.pierce = bl.pierce.saturating_sub(1);
            }
        }
    }
    true
}

/// Advance a DOT slot; returns the damage dealt this step
fn tick_dot(slot: &mut Option<Dot>, dt: f32) -> Option<(f32, WeaponId)> {
    let d = slot.as_mut()?;
    let step = dt.min(d.t.max(0.0));
    d.t -= dt;
    let out = (d.dps * step, d.source);
    if d.t <= 0.0 {
        *slot = None;
    }
    Some(out)
}

/// Apply DOT damage and spread burns to nearby enemies
fn update_dots(state: &mut GameState, dt: f32) {
    let spread_level = state.player.buffs.burn_spread;
    let spread_r = 40.0 + 18.0 * spread_level as f32;
    let enemies = &mut state.enemies;

    for i in 0..enemies.len() {
        let e = &mut enemies[i];
        if !e.alive() {
            continue;
        }
        for slot in [&mut e.dots.bleed, &mut e.dots.burn] {
            if let Some((dmg, source)) = tick_dot(slot, dt) {
                e.hp -= dmg;
                e.last_hit = Some(source);
            }
        }
        e.spread_cd = (e.spread_cd - dt).max(0.0);

        if spread_level == 0 || e.spread_cd > 0.0 {
            continue;
        }
        let Some(burn) = e.dots.burn else {
            continue;
        };
        e.spread_cd = BURN_SPREAD_CD;
        let origin = e.pos;

        let targets: Vec<usize> = enemies
            .iter()
            .enumerate()
            .filter(|&(j, o)| {
                j != i
                    && o.alive()
                    && !o.dots.burning()
                    && o.pos.distance_squared(origin) <= spread_r * spread_r
            })
            .map(|(j, _)| j)
            .take(spread_level as usize)
            .collect();
        let payload = DotPayload {
            kind: DotKind::Burn,
            dps: burn.dps * 0.7,
            duration: burn.t.max(1.0),
        };
        for j in targets {
            let t = &mut enemies[j];
            t.dots.apply(payload, burn.source);
            t.spread_cd = t.spread_cd.max(BURN_SPREAD_CD);
        }
    }
}

/// Telegraphed dash state machine; returns the velocity for this tick
fn dash_attack<R: Rng + ?Sized>(
    attack: &mut AttackPhase,
    dir: Vec2,
    dist: f32,
    spd: f32,
    dt: f32,
    rng: &mut R,
    tune: &DashTuning,
) -> Vec2 {
    match *attack {
        AttackPhase::Passive => dir * spd,
        AttackPhase::Ready { cd } => {
            let cd = cd - dt;
            *attack = if cd <= 0.0 && dist <= tune.range {
                AttackPhase::Winding { t: tune.wind, dir }
            } else {
                AttackPhase::Ready { cd }
            };
            dir * spd
        }
        AttackPhase::Winding { t, dir: aim } => {
            let t = t - dt;
            *attack = if t <= 0.0 {
                AttackPhase::Dashing { t: tune.dash, dir: aim }
            } else {
                AttackPhase::Winding { t, dir: aim }
            };
            Vec2::ZERO
        }
        AttackPhase::Dashing { t, dir: aim } => {
            let t = t - dt;
            *attack = if t <= 0.0 {
                AttackPhase::Recover { t: tune.recover }
            } else {
                AttackPhase::Dashing { t, dir: aim }
            };
            aim * spd * tune.dash_mul
        }
        AttackPhase::Recover { t } => {
            let t = t - dt;
            *attack = if t <= 0.0 {
                AttackPhase::Ready {
                    cd: rand_range(rng, tune.cd.0, tune.cd.1),
                }
            } else {
                AttackPhase::Recover { t }
            };
            dir * spd * 0.35
        }
    }
}

/// Spitter: wind up, then fire once along the aim stored at wind-up start
fn spit_attack(
    attack: &mut AttackPhase,
    pos: Vec2,
    dir: Vec2,
    spd: f32,
    dt: f32,
    wave: u32,
    shots: &mut Vec<EnemyBullet>,
) -> Vec2 {
    match *attack {
        AttackPhase::Passive => dir * spd,
        AttackPhase::Ready { cd } => {
            let cd = cd - dt;
            *attack = if cd <= 0.0 {
                AttackPhase::Winding { t: SPIT_WIND, dir }
            } else {
                AttackPhase::Ready { cd }
            };
            dir * spd
        }
        AttackPhase::Winding { t, dir: aim } => {
            let t = t - dt;
            if t <= 0.0 {
                shots.push(EnemyBullet {
                    pos,
                    vel: aim * SPIT_SPEED,
                    dmg: 9.0 + wave as f32 * 0.6,
                    ttl: 2.1,
                    radius: 3.0,
                });
                *attack = AttackPhase::Ready {
                    cd: spit_cooldown(wave),
                };
            } else {
                *attack = AttackPhase::Winding { t, dir: aim };
            }
            Vec2::ZERO
        }
        AttackPhase::Dashing { .. } | AttackPhase::Recover { .. } => {
            *attack = AttackPhase::Ready {
                cd: spit_cooldown(wave),
            };
            dir * spd
        }
    }
}

/// Artillery boss: wind up, then a radial volley centered on the stored aim
fn volley_attack(
    attack: &mut AttackPhase,
    pos: Vec2,
    dir: Vec2,
    spd: f32,
    dt: f32,
    wave: u32,
    shots: &mut Vec<EnemyBullet>,
) -> Vec2 {
    match *attack {
        AttackPhase::Passive => dir * spd,
        AttackPhase::Ready { cd } => {
            let cd = cd - dt;
            *attack = if cd <= 0.0 {
                AttackPhase::Winding { t: VOLLEY_WIND, dir }
            } else {
                AttackPhase::Ready { cd }
            };
            dir * spd
        }
        AttackPhase::Winding { t, dir: aim } => {
            let t = t - dt;
            if t <= 0.0 {
                let n = (10 + wave / 5).min(18);
                let base = aim.to_angle();
                for k in 0..n {
                    let a = base + k as f32 * TAU / n as f32;
                    shots.push(EnemyBullet {
                        pos,
                        vel: Vec2::from_angle(a) * VOLLEY_SPEED,
                        dmg: 8.0 + wave as f32 * 0.5,
                        ttl: 3.0,
                        radius: 4.0,
                    });
                }
                *attack = AttackPhase::Ready { cd: VOLLEY_CD };
            } else {
                *attack = AttackPhase::Winding { t, dir: aim };
            }
            Vec2::ZERO
        }
        AttackPhase::Dashing { .. } | AttackPhase::Recover { .. } => {
            *attack = AttackPhase::Ready { cd: VOLLEY_CD };
            dir * spd
        }
    }
}

/// Move every enemy, run its behavior and resolve player contact
pub fn update_enemies(state: &mut GameState, dt: f32) {
    update_dots(state, dt);

    let world = state.world;
    let wave = state.waves.wave;
    let sp_mul = state.waves.difficulty;
    let dmg_mul = state.diff.enemy_dmg_mul;
    let contact_base = state.config.contact_dps_base;
    let player_pos = state.player.pos;
    let player_r = state.player.radius;

    let mut summons: Vec<(Vec2, EnemyTag)> = Vec::new();
    let mut shots: Vec<EnemyBullet> = Vec::new();
    let mut contacts: Vec<(f32, Vec2, f32)> = Vec::new();
    let mut detonated: Vec<(u32, Vec2, f32)> = Vec::new();

    {
        let GameState { enemies, rng, .. } = state;
        for e in enemies.iter_mut() {
            if !e.alive() {
                continue;
            }
            let to_p = player_pos - e.pos;
            let dist = to_p.length();
            let dir = dir_or_x(to_p);
            let spd = e.speed * sp_mul;
            let pos = e.pos;

            let vel = match &mut e.kind {
                EnemyKind::Spitter { attack } => {
                    spit_attack(attack, pos, dir, spd, dt, wave, &mut shots)
                }
                EnemyKind::Charger { attack } => {
                    dash_attack(attack, dir, dist, spd, dt, rng, &CHARGER_DASH)
                }
                EnemyKind::Summoner { summon_cd } => {
                    *summon_cd -= dt;
                    if *summon_cd <= 0.0 {
                        *summon_cd = rand_range(rng, 3.2, 4.6);
                        summons.push((pos, EnemyTag::Walker));
                        summons.push((pos, EnemyTag::Fast));
                    }
                    if dist < 180.0 {
                        -dir * spd
                    } else if dist > 240.0 {
                        dir * spd
                    } else {
                        dir.perp() * spd * 0.4
                    }
                }
                EnemyKind::Boss(boss) => {
                    boss.summon_cd -= dt;
                    if boss.summon_cd <= 0.0 {
                        let base = (2.6 - wave as f32 * 0.06).clamp(1.2, 2.6);
                        let (cd, extra) = match boss.boss {
                            BossType::Summoner => (base * 0.6, 2),
                            _ => (base, 0),
                        };
                        boss.summon_cd = cd;
                        let n = 2 + rng.random_range(0..3) + extra;
                        for _ in 0..n {
                            let tag = if rng.random::<f32>() < 0.55 {
                                EnemyTag::Fast
                            } else {
                                EnemyTag::Walker
                            };
                            summons.push((pos, tag));
                        }
                    }
                    match boss.boss {
                        BossType::Rager => {
                            dash_attack(&mut boss.attack, dir, dist, spd, dt, rng, &RAGER_DASH)
                        }
                        BossType::Artillery => {
                            volley_attack(&mut boss.attack, pos, dir, spd, dt, wave, &mut shots)
                        }
                        BossType::Titan | BossType::Summoner => dir * spd,
                    }
                }
                EnemyKind::Walker
                | EnemyKind::Fast
                | EnemyKind::Tank
                | EnemyKind::Shield { .. }
                | EnemyKind::Exploder { .. } => dir * spd,
            };

            e.vel = vel;
            e.pos = world.resolve_circle(e.pos + vel * dt, e.radius);

            if !e.overlaps(player_pos, player_r) {
                continue;
            }
            match e.kind {
                EnemyKind::Exploder { boom_r, boom_dmg } => {
                    contacts.push((boom_dmg * dmg_mul, e.pos, 0.2));
                    detonated.push((e.id, e.pos, boom_r));
                }
                _ => {
                    let dps = contact_base * e.dmg_mul * sp_mul * dmg_mul;
                    contacts.push((dps * dt, e.pos, 0.12));
                }
            }
        }
    }

    // Exploders vanish without credit or loot
    if !detonated.is_empty() {
        state
            .enemies
            .retain(|e| !detonated.iter().any(|&(id, _, _)| id == e.id));
        for &(_, pos, boom_r) in &detonated {
            state.push_bullet(explosion_fx(pos, boom_r));
            state.emit(GameEvent::Explode { boss: false });
        }
    }

    for (amount, from, flash) in contacts {
        state.damage_player(amount, from, flash);
    }

    let cap = state.config.max_bullets;
    for shot in shots {
        if state.enemy_bullets.len() >= cap {
            break;
        }
        state.enemy_bullets.push(shot);
    }

    for (pos, tag) in summons {
        state.spawn_enemy_near(pos, tag);
    }

    reap_dead(state);
}

fn explosion_fx(pos: Vec2, radius: f32) -> Bullet {
    Bullet {
        pos,
        vel: Vec2::ZERO,
        dmg: 0.0,
        ttl: 0.25,
        radius: 0.0,
        kind: BulletKind::ExplosionFx { radius },
    }
}

fn fire_beam(origin: Vec2, beam: &Beam, dmg: f32, enemies: &mut [Enemy], ctx: &mut HitCtx) {
    let end = origin + beam.dir * beam.len;
    for e in enemies.iter_mut().filter(|e| e.alive()) {
        let r = beam.width * 0.5 + e.radius;
        if dist2_point_segment(e.pos, origin, end) <= r * r {
            ctx.hit(e, dmg, beam.dir, WeaponId::Laser);
            if let Some(burn) = beam.burn {
                e.dots.apply(burn, WeaponId::Laser);
            }
        }
    }
}

fn fire_chain(origin: Vec2, chain: &mut Chain, dmg: f32, enemies: &mut [Enemy], ctx: &mut HitCtx) {
    let mut head = origin;
    let mut hit_ids: Vec<u32> = Vec::with_capacity(chain.chains as usize);
    let r2 = chain.chain_r * chain.chain_r;
    chain.points.push(origin);

    for link in 0..chain.chains {
        let mut best: Option<(usize, f32)> = None;
        for (j, e) in enemies.iter().enumerate() {
            if !e.alive() || hit_ids.contains(&e.id) {
                continue;
            }
            let d2 = e.pos.distance_squared(head);
            if link > 0 && d2 > r2 {
                continue;
            }
            if best.is_none_or(|(_, bd)| d2 < bd) {
                best = Some((j, d2));
            }
        }
        let Some((j, _)) = best else {
            break;
        };

        let mul = (1.0 - CHAIN_FALLOFF * link as f32).max(CHAIN_MIN_MUL);
        let e = &mut enemies[j];
        let dir = dir_or_x(e.pos - head);
        ctx.hit(e, dmg * mul, dir, WeaponId::Tesla);
        hit_ids.push(e.id);
        head = e.pos;
        chain.points.push(head);
    }
}

/// Arm, then detonate on the first enemy inside the trigger radius.
///
/// Returns false once the mine has exploded.
fn update_mine(
    pos: Vec2,
    mine: &mut Mine,
    dmg: f32,
    enemies: &mut [Enemy],
    ctx: &mut HitCtx,
    fx: &mut Vec<Bullet>,
    dt: f32,
) -> bool {
    if mine.arm_t > 0.0 {
        mine.arm_t -= dt;
        if mine.arm_t > 0.0 {
            return true;
        }
    }

    let triggered = enemies.iter().any(|e| {
        let r = mine.trigger_r + e.radius;
        e.alive() && e.pos.distance_squared(pos) <= r * r
    });
    if !triggered {
        return true;
    }

    for e in enemies.iter_mut() {
        let r = mine.explode_r + e.radius;
        if e.alive() && e.pos.distance_squared(pos) <= r * r {
            ctx.hit(e, dmg, dir_or_x(e.pos - pos), WeaponId::Mine);
        }
    }
    fx.push(explosion_fx(pos, mine.explode_r));
    false
}

/// Advance one player bullet; returns false when it should be removed
fn step_bullet(
    b: &mut Bullet,
    enemies: &mut [Enemy],
    world: &WorldField,
    ctx: &mut HitCtx,
    fx: &mut Vec<Bullet>,
    dt: f32,
) -> bool {
    b.ttl -= dt;
    if b.ttl <= 0.0 {
        return false;
    }

    // Stationary kinds and boomerang steering
    match &mut b.kind {
        BulletKind::ExplosionFx { .. } => return true,
        BulletKind::Laser(beam) => {
            if !beam.did_hit {
                beam.did_hit = true;
                fire_beam(b.pos, beam, b.dmg, enemies, ctx);
            }
            return true;
        }
        BulletKind::Tesla(chain) => {
            if !chain.did_hit {
                chain.did_hit = true;
                fire_chain(b.pos, chain, b.dmg, enemies, ctx);
            }
            return true;
        }
        BulletKind::Mine(mine) => return update_mine(b.pos, mine, b.dmg, enemies, ctx, fx, dt),
        BulletKind::Boomerang(bm) => {
            bm.hit_cd = (bm.hit_cd - dt).max(0.0);
            if !bm.returning {
                bm.turn_t -= dt;
                bm.returning = bm.turn_t <= 0.0;
            }
            if bm.returning {
                let to_p = ctx.player_pos - b.pos;
                if to_p.length_squared() <= BOOMERANG_CATCH_R * BOOMERANG_CATCH_R {
                    return false;
                }
                b.vel = dir_or_x(to_p) * bm.speed;
            }
        }
        _ => {}
    }

    let old = b.pos;
    b.pos += b.vel * dt;
    if world.is_wall_at(b.pos) {
        let chance = ricochet_chance(&b.kind, ctx.buffs.ricochet_add);
        let ricochet = ctx.rng.random::<f32>() < chance;
        if !bounce_or_destroy(b, old, world, ricochet, ctx.rng) {
            return false;
        }
    }

    let dir = dir_or_x(b.vel);
    match &mut b.kind {
        BulletKind::Boomerang(bm) => {
            if bm.hit_cd > 0.0 {
                return true;
            }
            let target = enemies
                .iter_mut()
                .find(|e| e.alive() && e.overlaps(b.pos, b.radius));
            if let Some(e) = target {
                ctx.hit(e, b.dmg, dir, WeaponId::Boomerang);
                bm.hit_cd = BOOMERANG_HIT_CD;
                if bm.pierce > 0 {
                    bm.pierce -= 1;
                } else {
                    bm.returning = true;
                }
            }
            true
        }
        kind => {
            let Some(source) = kind.source() else {
                return true;
            };
            let Some(bl) = kind.ballistic_mut() else {
                return true;
            };
            // One enemy per bullet per tick
            let target = enemies
                .iter_mut()
                .find(|e| e.alive() && !bl.hits.contains(&e.id) && e.overlaps(b.pos, b.radius));
            let Some(e) = target else {
                return true;
            };

            ctx.hit(e, b.dmg, dir, source);
            if bl.knock > 0.0 {
                let scale = if e.is_boss() { BOSS_KNOCK_SCALE } else { KNOCK_SCALE };
                e.pos += dir * bl.knock * scale;
            }
            if let Some(dot) = bl.dot {
                e.dots.apply(dot, source);
            }
            bl.hits.push(e.id);

            if bl.pierce > 0 {
                bl.pierce -= 1;
                b.vel *= 0.98;
                true
            } else {
                false
            }
        }
    }
}

/// Advance every player bullet
pub fn update_bullets(state: &mut GameState, dt: f32) {
    let world = state.world;
    let player_pos = state.player.pos;
    let mut fx: Vec<Bullet> = Vec::new();

    {
        let GameState {
            bullets,
            enemies,
            player,
            rng,
            events,
            floats,
            ..
        } = state;
        let mut ctx = HitCtx {
            player_pos,
            buffs: &player.buffs,
            rng,
            events,
            floats,
        };
        bullets.retain_mut(|b| step_bullet(b, enemies, &world, &mut ctx, &mut fx, dt));
    }

    for b in fx {
        state.push_bullet(b);
    }
    reap_dead(state);
}

/// Advance enemy bullets; they never ricochet
pub fn update_enemy_bullets(state: &mut GameState, dt: f32) {
    let world = state.world;
    let player_pos = state.player.pos;
    let player_r = state.player.radius;
    let dmg_mul = state.diff.enemy_dmg_mul;
    let mut hits: Vec<(f32, Vec2)> = Vec::new();

    state.enemy_bullets.retain_mut(|b| {
        b.ttl -= dt;
        if b.ttl <= 0.0 {
            return false;
        }
        let prev = world.world_to_cell(b.pos);
        b.pos += b.vel * dt;
        let next = world.world_to_cell(b.pos);
        if next != prev && world.sample(next.cx, next.cy).wall {
            return false;
        }
        let rr = b.radius + player_r;
        if b.pos.distance_squared(player_pos) <= rr * rr {
            hits.push((b.dmg * dmg_mul, b.pos));
            return false;
        }
        true
    });

    for (dmg, from) in hits {
        state.damage_player(dmg, from, 0.18);
        let pos = state.player.pos - Vec2::new(0.0, 18.0);
        state.push_float(pos, 0.8, format!("-{}", dmg.round() as i32));
    }
}

/// Credit, loot and remove every dead enemy
pub fn reap_dead(state: &mut GameState) {
    let mut i = 0;
    while i < state.enemies.len() {
        if state.enemies[i].alive() {
            i += 1;
            continue;
        }
        let e = state.enemies.remove(i);
        kill_enemy(state, e);
    }
}

/// The kill path: stats, achievements, loot, feedback
fn kill_enemy(state: &mut GameState, e: Enemy) {
    let tag = e.tag();
    let boss = e.boss_type();

    state.kills += 1;
    stats::record_kill(&mut state.run_stats, &mut state.lifetime, e.last_hit, tag, boss);
    state.check_achievements();
    maybe_drop_pickup(state, e.pos, tag, e.xp);

    state.emit(GameEvent::Explode { boss: boss.is_some() });
    state.push_float(e.pos - Vec2::new(0.0, 18.0), 0.9, "+1");

    if let Some(b) = boss {
        log::info!("boss down: {} (wave {})", b.key(), state.waves.wave);
        state.waves.boss_alive = state.boss_alive();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::entities::{Ballistic, Boomerang};
    use crate::tuning::{MapId, RunSetup};
    use proptest::prelude::*;
    use rand::SeedableRng;

    fn playing() -> GameState {
        let mut s = GameState::new(
            5,
            RunSetup {
                map: MapId::Plains,
                ..RunSetup::default()
            },
        );
        s.start();
        s
    }

    /// Walker with plenty of hp at `pos`
    fn dummy(state: &mut GameState, pos: Vec2) -> u32 {
        state.spawn_enemy(EnemyTag::Walker, pos);
        let e = state.enemies.last_mut().unwrap();
        e.hp = 10_000.0;
        e.hp_max = 10_000.0;
        e.id
    }

    fn hp_of(state: &GameState, id: u32) -> f32 {
        state.enemies.iter().find(|e| e.id == id).unwrap().hp
    }

    #[test]
    fn test_shield_frontal_mitigation() {
        let mut rng = Pcg32::seed_from_u64(1);
        let diff = crate::tuning::Difficulty::default();
        let buffs = Buffs::default();
        let player = Vec2::ZERO;
        let make = |rng: &mut Pcg32| {
            let mut e = Enemy::new(1, EnemyTag::Shield, Vec2::new(100.0, 0.0), 1, &diff, rng);
            e.hp = 1_000.0;
            e.hp_max = 1_000.0;
            e
        };

        let mut e = make(&mut rng);
        let out = damage_enemy(&mut e, 100.0, Vec2::X, WeaponId::Pistol, player, &buffs, &mut rng);
        assert!((out.dealt - 42.0).abs() < 1e-4);

        let mut e = make(&mut rng);
        let out = damage_enemy(&mut e, 100.0, Vec2::Y, WeaponId::Pistol, player, &buffs, &mut rng);
        assert_eq!(out.dealt, 100.0);

        let mut e = make(&mut rng);
        let out = damage_enemy(&mut e, 100.0, -Vec2::X, WeaponId::Pistol, player, &buffs, &mut rng);
        assert_eq!(out.dealt, 100.0);
        assert_eq!(e.last_hit, Some(WeaponId::Pistol));
    }

    #[test]
    fn test_execute_and_crit_apply_after_shield() {
        let mut rng = Pcg32::seed_from_u64(1);
        let buffs = Buffs {
            execute_mul: 1.5,
            crit_chance: 1.0,
            crit_mul: 2.0,
            crit_burn: true,
            ..Buffs::default()
        };
        let mut e = Enemy::new(1, EnemyTag::Walker, Vec2::X * 50.0, 1, &Default::default(), &mut rng);
        e.hp_max = 100.0;
        e.hp = 20.0;
        let out = damage_enemy(&mut e, 10.0, Vec2::X, WeaponId::Lance, Vec2::ZERO, &buffs, &mut rng);
        assert!(out.crit);
        assert!((out.dealt - 30.0).abs() < 1e-4);
        assert!(e.dots.burning());
    }

    #[test]
    fn test_mine_detonation() {
        let mut state = playing();
        let near = dummy(&mut state, Vec2::new(10.0, 0.0));
        let second = dummy(&mut state, Vec2::new(0.0, 50.0));
        let far = dummy(&mut state, Vec2::new(300.0, 0.0));
        state.bullets.push(Bullet {
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
            dmg: 50.0,
            ttl: 10.0,
            radius: 0.0,
            kind: BulletKind::Mine(Mine {
                arm_t: 0.35,
                trigger_r: 22.0,
                explode_r: 56.0,
            }),
        });

        // Unarmed: nothing happens
        update_bullets(&mut state, 0.1);
        assert_eq!(hp_of(&state, near), 10_000.0);

        for _ in 0..3 {
            update_bullets(&mut state, 0.1);
        }
        assert_eq!(hp_of(&state, near), 9_950.0);
        assert_eq!(hp_of(&state, second), 9_950.0);
        assert_eq!(hp_of(&state, far), 10_000.0);
        assert!(!state.bullets.iter().any(|b| matches!(b.kind, BulletKind::Mine(_))));

        update_bullets(&mut state, 0.1);
        assert_eq!(hp_of(&state, near), 9_950.0);
    }

    #[test]
    fn test_lance_pierce_budget() {
        let mut state = playing();
        let ids: Vec<u32> = (1..=5)
            .map(|k| dummy(&mut state, Vec2::new(60.0 * k as f32, 0.0)))
            .collect();
        state.bullets.push(Bullet {
            pos: Vec2::ZERO,
            vel: Vec2::new(400.0, 0.0),
            dmg: 1.0,
            ttl: 5.0,
            radius: 3.0,
            kind: BulletKind::Lance(Ballistic {
                pierce: 2,
                ..Ballistic::default()
            }),
        });
        for _ in 0..120 {
            update_bullets(&mut state, 1.0 / 60.0);
        }
        let damaged = ids.iter().filter(|&&id| hp_of(&state, id) < 10_000.0).count();
        assert_eq!(damaged, 3);
        assert!(state.bullets.is_empty());
    }

    #[test]
    fn test_tesla_chain_budget() {
        let mut state = playing();
        let ids: Vec<u32> = (0..6)
            .map(|k| dummy(&mut state, Vec2::new(40.0 + 30.0 * k as f32, 0.0)))
            .collect();
        state.bullets.push(Bullet {
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
            dmg: 10.0,
            ttl: 0.1,
            radius: 0.0,
            kind: BulletKind::Tesla(Chain {
                chains: 3,
                chain_r: 110.0,
                did_hit: false,
                points: Vec::new(),
            }),
        });
        update_bullets(&mut state, 0.016);
        update_bullets(&mut state, 0.016);
        let damaged: Vec<f32> = ids
            .iter()
            .map(|&id| 10_000.0 - hp_of(&state, id))
            .filter(|d| *d > 0.0)
            .collect();
        assert_eq!(damaged.len(), 3);
        // Diminishing per link
        assert!(damaged[0] > damaged[1] && damaged[1] > damaged[2]);
    }

    #[test]
    fn test_laser_hits_once() {
        let mut state = playing();
        let a = dummy(&mut state, Vec2::new(100.0, 2.0));
        let off = dummy(&mut state, Vec2::new(100.0, 80.0));
        state.bullets.push(Bullet {
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
            dmg: 25.0,
            ttl: 0.08,
            radius: 0.0,
            kind: BulletKind::Laser(Beam {
                dir: Vec2::X,
                len: 520.0,
                width: 10.0,
                burn: None,
                did_hit: false,
            }),
        });
        update_bullets(&mut state, 0.02);
        update_bullets(&mut state, 0.02);
        assert_eq!(hp_of(&state, a), 9_975.0);
        assert_eq!(hp_of(&state, off), 10_000.0);
    }

    #[test]
    fn test_boomerang_returns_to_player() {
        let mut state = playing();
        state.bullets.push(Bullet {
            pos: Vec2::ZERO,
            vel: Vec2::new(360.0, 0.0),
            dmg: 10.0,
            ttl: 5.0,
            radius: 4.0,
            kind: BulletKind::Boomerang(Boomerang {
                speed: 360.0,
                turn_t: 0.3,
                returning: false,
                pierce: 1,
                hit_cd: 0.0,
            }),
        });
        let mut max_x: f32 = 0.0;
        for _ in 0..120 {
            update_bullets(&mut state, 1.0 / 60.0);
            if let Some(b) = state.bullets.first() {
                max_x = max_x.max(b.pos.x);
            }
        }
        assert!(max_x > 90.0);
        assert!(state.bullets.is_empty());
    }

    #[test]
    fn test_dot_kill_credits_source() {
        let mut state = playing();
        state.spawn_enemy(EnemyTag::Walker, Vec2::new(500.0, 0.0));
        let e = state.enemies.last_mut().unwrap();
        e.hp = 1.0;
        e.dots.apply(
            DotPayload {
                kind: DotKind::Bleed,
                dps: 100.0,
                duration: 1.0,
            },
            WeaponId::Lance,
        );
        update_enemies(&mut state, 0.05);
        assert!(state.enemies.is_empty());
        assert_eq!(state.kills, 1);
        assert_eq!(state.run_stats.kills_by_weapon.get("lance"), Some(&1));
    }

    #[test]
    fn test_burn_spreads_up_to_level_targets() {
        let mut state = playing();
        state.player.buffs.burn_spread = 1;
        let src = dummy(&mut state, Vec2::new(400.0, 0.0));
        dummy(&mut state, Vec2::new(420.0, 0.0));
        dummy(&mut state, Vec2::new(400.0, 20.0));
        state.enemies[0].dots.apply(
            DotPayload {
                kind: DotKind::Burn,
                dps: 10.0,
                duration: 3.0,
            },
            WeaponId::Flame,
        );
        update_dots(&mut state, 0.016);
        let burning = state.enemies.iter().filter(|e| e.dots.burning()).count();
        assert_eq!(burning, 2);
        assert!(state.enemies.iter().find(|e| e.id == src).unwrap().spread_cd > 0.0);
    }

    #[test]
    fn test_exploder_detonates_without_credit() {
        let mut state = playing();
        state.spawn_enemy(EnemyTag::Exploder, state.player.pos + Vec2::new(5.0, 0.0));
        let hp = state.player.hp;
        update_enemies(&mut state, 0.016);
        assert!(state.enemies.is_empty());
        assert!(state.player.hp < hp);
        assert_eq!(state.kills, 0);
        assert!(state.bullets.iter().any(|b| matches!(b.kind, BulletKind::ExplosionFx { .. })));
    }

    #[test]
    fn test_spitter_fires_after_telegraph() {
        let mut state = playing();
        state.spawn_enemy(EnemyTag::Spitter, Vec2::new(400.0, 0.0));
        if let EnemyKind::Spitter { attack } = &mut state.enemies[0].kind {
            *attack = AttackPhase::Ready { cd: 0.0 };
        }
        update_enemies(&mut state, 0.016);
        assert!(matches!(
            state.enemies[0].kind,
            EnemyKind::Spitter { attack: AttackPhase::Winding { .. } }
        ));
        assert!(state.enemy_bullets.is_empty());
        for _ in 0..40 {
            update_enemies(&mut state, 0.016);
        }
        assert_eq!(state.enemy_bullets.len(), 1);
        assert!(state.enemy_bullets[0].vel.x < 0.0);
    }

    #[test]
    fn test_enemy_bullet_hits_player() {
        let mut state = playing();
        state.enemy_bullets.push(EnemyBullet {
            pos: Vec2::new(30.0, 0.0),
            vel: Vec2::new(-240.0, 0.0),
            dmg: 10.0,
            ttl: 2.0,
            radius: 3.0,
        });
        let hp = state.player.hp;
        for _ in 0..10 {
            update_enemy_bullets(&mut state, 1.0 / 60.0);
        }
        assert!(state.enemy_bullets.is_empty());
        assert_eq!(state.player.hp, hp - 10.0);
    }

    fn find_vertical_wall(world: &WorldField) -> (i32, i32) {
        for cy in 5..400 {
            for cx in 5..400 {
                let open = |x, y| !world.sample(x, y).wall;
                if world.sample(cx, cy).wall && open(cx - 1, cy) && open(cx - 2, cy) {
                    return (cx, cy);
                }
            }
        }
        panic!("no wall");
    }

    #[test]
    fn test_ricochet_reflects_entry_axis() {
        let world = WorldField::new(MapId::Hell, 18.0);
        let (cx, cy) = find_vertical_wall(&world);
        let old = Vec2::new(cx as f32 * 18.0 - 2.0, cy as f32 * 18.0 + 9.0);
        let mut b = Bullet {
            pos: old + Vec2::new(5.0, 0.0),
            vel: Vec2::new(300.0, 40.0),
            dmg: 10.0,
            ttl: 1.0,
            radius: 3.0,
            kind: BulletKind::Pistol(Ballistic::default()),
        };
        let mut rng = Pcg32::seed_from_u64(3);
        assert!(bounce_or_destroy(&mut b, old, &world, true, &mut rng));
        assert_eq!(b.pos, old);
        assert!(b.vel.x < 0.0);
        assert!(b.vel.y > 0.0);
        assert!(b.dmg > 10.0);
    }

    #[test]
    fn test_no_ricochet_destroys() {
        let world = WorldField::new(MapId::Hell, 18.0);
        let mut rng = Pcg32::seed_from_u64(3);
        let mut b = Bullet {
            pos: Vec2::ZERO,
            vel: Vec2::X,
            dmg: 1.0,
            ttl: 1.0,
            radius: 1.0,
            kind: BulletKind::Pistol(Ballistic::default()),
        };
        assert!(!bounce_or_destroy(&mut b, Vec2::ZERO, &world, false, &mut rng));
        assert_eq!(ricochet_chance(&BulletKind::Flame(Ballistic::default()), 0.35), 0.0);
    }

    proptest! {
        #[test]
        fn prop_ricochet_damps_speed_and_ttl(
            seed in any::<u64>(),
            vx in -600.0f32..600.0,
            vy in -600.0f32..600.0,
            ttl in 0.05f32..3.0,
        ) {
            prop_assume!(vx.abs() + vy.abs() > 1.0);
            let world = WorldField::new(MapId::Classic, 18.0);
            let mut rng = Pcg32::seed_from_u64(seed);
            let old = Vec2::new(1.0, 1.0);
            let mut b = Bullet {
                pos: old + Vec2::new(vx, vy) / 60.0,
                vel: Vec2::new(vx, vy),
                dmg: 10.0,
                ttl,
                radius: 3.0,
                kind: BulletKind::Lance(Ballistic { pierce: 1, ..Ballistic::default() }),
            };
            let before = b.vel.length();
            prop_assert!(bounce_or_destroy(&mut b, old, &world, true, &mut rng));
            prop_assert!(b.vel.length() < before);
            prop_assert!(b.ttl < ttl);
            prop_assert_eq!(b.kind.pierce(), Some(0));
        }
    }
}
