//! Entity records: player, enemies, projectiles, pickups
//!
//! Constructors encode the per-kind stat tables. Enemy and bullet behavior is
//! selected by closed enums whose variants carry only the fields that kind uses.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::consts::{PICKUP_TTL, PLAYER_RADIUS, WEAPON_MAX_LEVEL};
use crate::rand_range;
use crate::tuning::{Difficulty, HeroDef, HeroId};

/// Weapon identifiers, in unlock-menu order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum WeaponId {
    Pistol,
    Shotgun,
    Lance,
    Flame,
    Laser,
    Mine,
    Boomerang,
    Tesla,
    Turret,
}

impl WeaponId {
    pub const ALL: [WeaponId; 9] = [
        WeaponId::Pistol,
        WeaponId::Shotgun,
        WeaponId::Lance,
        WeaponId::Flame,
        WeaponId::Laser,
        WeaponId::Mine,
        WeaponId::Boomerang,
        WeaponId::Tesla,
        WeaponId::Turret,
    ];

    pub fn key(self) -> &'static str {
        match self {
            WeaponId::Pistol => "pistol",
            WeaponId::Shotgun => "shotgun",
            WeaponId::Lance => "lance",
            WeaponId::Flame => "flame",
            WeaponId::Laser => "laser",
            WeaponId::Mine => "mine",
            WeaponId::Boomerang => "boomerang",
            WeaponId::Tesla => "tesla",
            WeaponId::Turret => "turret",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WeaponId::Pistol => "Pistol",
            WeaponId::Shotgun => "Shotgun",
            WeaponId::Lance => "Lance",
            WeaponId::Flame => "Flamethrower",
            WeaponId::Laser => "Laser",
            WeaponId::Mine => "Mine",
            WeaponId::Boomerang => "Boomerang",
            WeaponId::Tesla => "Tesla",
            WeaponId::Turret => "Turret",
        }
    }
}

/// An owned weapon instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponSlot {
    pub id: WeaponId,
    pub level: u8,
    /// Seconds until the next shot
    pub cooldown: f32,
}

/// Player stat multipliers and perks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Buffs {
    pub fire_rate_mul: f32,
    pub move_speed_mul: f32,
    pub dmg_mul: f32,
    /// Added to the base wall ricochet chance
    pub ricochet_add: f32,
    pub magnet_mul: f32,
    pub dash_cd_mul: f32,
    pub dash_pow_mul: f32,
    pub crit_chance: f32,
    pub crit_mul: f32,
    /// Critical hits also ignite the target
    pub crit_burn: bool,
    /// Damage multiplier against low-hp targets
    pub execute_mul: f32,
    /// Burn spread level (0 = off)
    pub burn_spread: u8,
}

impl Default for Buffs {
    fn default() -> Self {
        Self {
            fire_rate_mul: 1.0,
            move_speed_mul: 1.0,
            dmg_mul: 1.0,
            ricochet_add: 0.0,
            magnet_mul: 1.0,
            dash_cd_mul: 1.0,
            dash_pow_mul: 1.0,
            crit_chance: 0.0,
            crit_mul: 1.6,
            crit_burn: false,
            execute_mul: 1.0,
            burn_spread: 0,
        }
    }
}

/// The player character
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub hero: HeroId,
    pub glyph: char,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub hp: f32,
    pub hp_max: f32,
    pub speed: f32,
    /// Turret targeting range base
    pub range: f32,
    pub level: u32,
    pub xp: u32,
    /// Facing toward the current aim target (radians)
    pub aim_angle: f32,
    /// Last non-zero movement direction, used to dash without input
    pub last_move: Vec2,
    pub weapons: Vec<WeaponSlot>,
    pub buffs: Buffs,
}

impl Player {
    pub fn from_hero<R: Rng + ?Sized>(hero: &HeroDef, rng: &mut R) -> Self {
        let mut player = Self {
            hero: hero.id,
            glyph: hero.glyph,
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
            radius: PLAYER_RADIUS,
            hp: hero.hp_max,
            hp_max: hero.hp_max,
            speed: hero.speed,
            range: hero.range,
            level: 1,
            xp: 0,
            aim_angle: 0.0,
            last_move: Vec2::X,
            weapons: Vec::new(),
            buffs: Buffs {
                fire_rate_mul: hero.fire_rate_mul,
                move_speed_mul: hero.move_speed_mul,
                dmg_mul: hero.dmg_mul,
                ..Buffs::default()
            },
        };
        for &id in &hero.start_weapons {
            player.ensure_weapon(id, rng);
        }
        player
    }

    pub fn has_weapon(&self, id: WeaponId) -> bool {
        self.weapons.iter().any(|w| w.id == id)
    }

    pub fn weapon_level(&self, id: WeaponId) -> Option<u8> {
        self.weapons.iter().find(|w| w.id == id).map(|w| w.level)
    }

    /// Owned weapon ids in acquisition order
    pub fn weapon_ids(&self) -> Vec<WeaponId> {
        self.weapons.iter().map(|w| w.id).collect()
    }

    /// Return the weapon, unlocking it at level 1 if missing
    pub fn ensure_weapon<R: Rng + ?Sized>(&mut self, id: WeaponId, rng: &mut R) -> &mut WeaponSlot {
        let idx = match self.weapons.iter().position(|w| w.id == id) {
            Some(i) => i,
            None => {
                self.weapons.push(WeaponSlot {
                    id,
                    level: 1,
                    cooldown: rand_range(rng, 0.0, 0.4),
                });
                self.weapons.len() - 1
            }
        };
        &mut self.weapons[idx]
    }

    /// Raise a weapon one level (clamped), unlocking it first if needed
    pub fn upgrade_weapon<R: Rng + ?Sized>(&mut self, id: WeaponId, rng: &mut R) -> u8 {
        let w = self.ensure_weapon(id, rng);
        w.level = (w.level + 1).clamp(1, WEAPON_MAX_LEVEL);
        w.level
    }

    /// Subtract hp; returns true when this hit brought hp to zero
    pub fn take_damage(&mut self, amount: f32) -> bool {
        if self.hp <= 0.0 {
            return false;
        }
        self.hp = (self.hp - amount.max(0.0)).clamp(0.0, self.hp_max);
        self.hp <= 0.0
    }

    /// Restore hp up to the max; returns the amount actually healed
    pub fn heal(&mut self, amount: f32) -> f32 {
        let before = self.hp;
        self.hp = (self.hp + amount.max(0.0)).clamp(0.0, self.hp_max);
        self.hp - before
    }
}

/// Fieldless enemy kind, used for tables and stats keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnemyTag {
    Walker,
    Fast,
    Tank,
    Spitter,
    Shield,
    Charger,
    Exploder,
    Summoner,
    Boss,
}

impl EnemyTag {
    pub fn key(self) -> &'static str {
        match self {
            EnemyTag::Walker => "walker",
            EnemyTag::Fast => "fast",
            EnemyTag::Tank => "tank",
            EnemyTag::Spitter => "spitter",
            EnemyTag::Shield => "shield",
            EnemyTag::Charger => "charger",
            EnemyTag::Exploder => "exploder",
            EnemyTag::Summoner => "summoner",
            EnemyTag::Boss => "boss",
        }
    }
}

/// Boss variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BossType {
    /// Telegraphed dashes
    Rager,
    /// Telegraphed radial volleys
    Artillery,
    /// Slow and very tanky
    Titan,
    /// Frequent minion waves
    Summoner,
}

impl BossType {
    pub fn key(self) -> &'static str {
        match self {
            BossType::Rager => "rager",
            BossType::Artillery => "artillery",
            BossType::Titan => "titan",
            BossType::Summoner => "summoner",
        }
    }
}

/// Telegraphed attack state machine shared by spitters, chargers and bosses.
///
/// `Ready` counts down to the next wind-up; `Winding` holds the aim chosen at
/// wind-up start; `Dashing` commits along it; `Recover` is the post-dash lull.
/// `Passive` never attacks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AttackPhase {
    Passive,
    Ready { cd: f32 },
    Winding { t: f32, dir: Vec2 },
    Dashing { t: f32, dir: Vec2 },
    Recover { t: f32 },
}

impl AttackPhase {
    pub fn is_telegraphing(&self) -> bool {
        matches!(self, AttackPhase::Winding { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BossState {
    pub boss: BossType,
    pub summon_cd: f32,
    pub attack: AttackPhase,
}

/// Enemy kind with its behavior state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EnemyKind {
    Walker,
    Fast,
    Tank,
    Spitter { attack: AttackPhase },
    Shield { front_mul: f32 },
    Charger { attack: AttackPhase },
    Exploder { boom_r: f32, boom_dmg: f32 },
    Summoner { summon_cd: f32 },
    Boss(BossState),
}

impl EnemyKind {
    pub fn tag(&self) -> EnemyTag {
        match self {
            EnemyKind::Walker => EnemyTag::Walker,
            EnemyKind::Fast => EnemyTag::Fast,
            EnemyKind::Tank => EnemyTag::Tank,
            EnemyKind::Spitter { .. } => EnemyTag::Spitter,
            EnemyKind::Shield { .. } => EnemyTag::Shield,
            EnemyKind::Charger { .. } => EnemyTag::Charger,
            EnemyKind::Exploder { .. } => EnemyTag::Exploder,
            EnemyKind::Summoner { .. } => EnemyTag::Summoner,
            EnemyKind::Boss(_) => EnemyTag::Boss,
        }
    }
}

/// Damage-over-time flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DotKind {
    Bleed,
    Burn,
}

/// DOT carried by a projectile, applied on hit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DotPayload {
    pub kind: DotKind,
    pub dps: f32,
    pub duration: f32,
}

/// An active DOT on an enemy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dot {
    pub t: f32,
    pub dps: f32,
    pub source: WeaponId,
}

/// One slot per DOT flavor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dots {
    pub bleed: Option<Dot>,
    pub burn: Option<Dot>,
}

impl Dots {
    /// Stack by keeping the larger duration and the larger rate
    pub fn apply(&mut self, payload: DotPayload, source: WeaponId) {
        let slot = match payload.kind {
            DotKind::Bleed => &mut self.bleed,
            DotKind::Burn => &mut self.burn,
        };
        *slot = Some(match *slot {
            Some(d) => Dot {
                t: d.t.max(payload.duration),
                dps: d.dps.max(payload.dps),
                source,
            },
            None => Dot {
                t: payload.duration,
                dps: payload.dps,
                source,
            },
        });
    }

    pub fn burning(&self) -> bool {
        self.burn.is_some()
    }
}

/// An enemy entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enemy {
    pub id: u32,
    pub kind: EnemyKind,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub hp: f32,
    pub hp_max: f32,
    pub speed: f32,
    /// Contact damage multiplier
    pub dmg_mul: f32,
    pub xp: u32,
    pub dots: Dots,
    /// Seconds until burn may spread again from this enemy
    pub spread_cd: f32,
    /// Last damage source, used for kill attribution
    pub last_hit: Option<WeaponId>,
}

impl Enemy {
    /// Build a regular enemy with the per-kind stat table
    pub fn new<R: Rng + ?Sized>(
        id: u32,
        tag: EnemyTag,
        pos: Vec2,
        wave: u32,
        diff: &Difficulty,
        rng: &mut R,
    ) -> Self {
        let w = wave as f32;
        let m_hp = diff.enemy_hp_mul;
        let m_sp = diff.enemy_speed_mul;

        let (kind, hp, radius, speed, dmg_mul, xp) = match tag {
            EnemyTag::Fast => (
                EnemyKind::Fast,
                22.0 + w * 4.0 + rand_range(rng, 0.0, 10.0),
                8.0,
                78.0 + w * 3.4 + rand_range(rng, 0.0, 12.0),
                0.9,
                1,
            ),
            EnemyTag::Tank => (
                EnemyKind::Tank,
                62.0 + w * 10.0 + rand_range(rng, 0.0, 20.0),
                11.0,
                34.0 + w * 1.4 + rand_range(rng, 0.0, 6.0),
                1.25,
                3,
            ),
            EnemyTag::Spitter => (
                EnemyKind::Spitter {
                    attack: AttackPhase::Ready {
                        cd: rand_range(rng, 0.2, 1.0),
                    },
                },
                36.0 + w * 7.0 + rand_range(rng, 0.0, 14.0),
                10.0,
                46.0 + w * 2.0 + rand_range(rng, 0.0, 8.0),
                1.0,
                2,
            ),
            EnemyTag::Shield => (
                EnemyKind::Shield { front_mul: 0.42 },
                56.0 + w * 9.0 + rand_range(rng, 0.0, 18.0),
                12.0,
                34.0 + w * 1.6 + rand_range(rng, 0.0, 6.0),
                1.15,
                3,
            ),
            EnemyTag::Charger => (
                EnemyKind::Charger {
                    attack: AttackPhase::Ready {
                        cd: rand_range(rng, 0.8, 1.8),
                    },
                },
                40.0 + w * 7.0 + rand_range(rng, 0.0, 14.0),
                10.0,
                52.0 + w * 2.2 + rand_range(rng, 0.0, 10.0),
                1.1,
                2,
            ),
            EnemyTag::Exploder => (
                EnemyKind::Exploder {
                    boom_r: 42.0,
                    boom_dmg: 26.0 + w * 1.2,
                },
                26.0 + w * 5.0 + rand_range(rng, 0.0, 10.0),
                10.0,
                66.0 + w * 2.6 + rand_range(rng, 0.0, 12.0),
                1.0,
                2,
            ),
            EnemyTag::Summoner => (
                EnemyKind::Summoner {
                    summon_cd: rand_range(rng, 1.2, 2.6),
                },
                44.0 + w * 8.0 + rand_range(rng, 0.0, 16.0),
                11.0,
                30.0 + w * 1.2 + rand_range(rng, 0.0, 6.0),
                1.0,
                3,
            ),
            EnemyTag::Boss => return Self::new_boss(id, BossType::Titan, pos, wave, diff),
            EnemyTag::Walker => (
                EnemyKind::Walker,
                32.0 + w * 6.0 + rand_range(rng, 0.0, 10.0),
                9.0,
                46.0 + w * 2.2 + rand_range(rng, 0.0, 10.0),
                1.0,
                1,
            ),
        };

        let hp_max = hp * m_hp;
        Self {
            id,
            kind,
            pos,
            vel: Vec2::ZERO,
            radius,
            hp: hp_max,
            hp_max,
            speed: speed * m_sp,
            dmg_mul,
            xp,
            dots: Dots::default(),
            spread_cd: 0.0,
            last_hit: None,
        }
    }

    /// Build a boss; its type scales the base boss stats
    pub fn new_boss(id: u32, boss: BossType, pos: Vec2, wave: u32, diff: &Difficulty) -> Self {
        let w = wave as f32;
        let base_hp = (520.0 + w * 160.0) * diff.enemy_hp_mul;
        let base_speed = (26.0 + w * 0.9) * diff.enemy_speed_mul;

        let (hp_mul, speed_mul, radius, dmg_mul, summon_cd) = match boss {
            BossType::Rager => (0.85, 1.35, 17.0, 2.0, 3.2),
            BossType::Artillery => (0.9, 0.85, 18.0, 1.8, 3.0),
            BossType::Titan => (1.6, 0.7, 24.0, 2.6, 3.4),
            BossType::Summoner => (1.0, 0.95, 18.0, 1.8, 1.6),
        };
        let attack = match boss {
            BossType::Rager => AttackPhase::Ready { cd: 2.4 },
            BossType::Artillery => AttackPhase::Ready { cd: 2.0 },
            BossType::Titan | BossType::Summoner => AttackPhase::Passive,
        };

        let hp_max = base_hp * hp_mul;
        Self {
            id,
            kind: EnemyKind::Boss(BossState {
                boss,
                summon_cd,
                attack,
            }),
            pos,
            vel: Vec2::ZERO,
            radius,
            hp: hp_max,
            hp_max,
            speed: base_speed * speed_mul,
            dmg_mul,
            xp: 20,
            dots: Dots::default(),
            spread_cd: 0.0,
            last_hit: None,
        }
    }

    #[inline]
    pub fn tag(&self) -> EnemyTag {
        self.kind.tag()
    }

    #[inline]
    pub fn is_boss(&self) -> bool {
        matches!(self.kind, EnemyKind::Boss(_))
    }

    pub fn boss_type(&self) -> Option<BossType> {
        match self.kind {
            EnemyKind::Boss(b) => Some(b.boss),
            _ => None,
        }
    }

    #[inline]
    pub fn alive(&self) -> bool {
        self.hp > 0.0
    }

    #[inline]
    pub fn overlaps(&self, p: Vec2, r: f32) -> bool {
        let rr = self.radius + r;
        self.pos.distance_squared(p) <= rr * rr
    }
}

/// Ballistic payload (pistol, shotgun, lance, flame, turret)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ballistic {
    /// Extra enemies this bullet may pass through
    pub pierce: u32,
    /// Knockback distance applied on hit
    pub knock: f32,
    pub dot: Option<DotPayload>,
    /// Enemies already hit, so a piercing bullet never hits one twice
    pub hits: Vec<u32>,
}

/// Instantaneous beam; the bullet lingers only for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beam {
    pub dir: Vec2,
    pub len: f32,
    pub width: f32,
    pub burn: Option<DotPayload>,
    pub did_hit: bool,
}

/// Chain lightning, resolved once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    /// Maximum distinct enemies hit
    pub chains: u32,
    pub chain_r: f32,
    pub did_hit: bool,
    /// Chain head positions, for display
    pub points: Vec<Vec2>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mine {
    /// Seconds until armed
    pub arm_t: f32,
    pub trigger_r: f32,
    pub explode_r: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boomerang {
    pub speed: f32,
    /// Seconds of outbound flight left
    pub turn_t: f32,
    pub returning: bool,
    pub pierce: u32,
    /// Per-bullet hit cooldown
    pub hit_cd: f32,
}

/// Player projectile kind and payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BulletKind {
    Pistol(Ballistic),
    Shotgun(Ballistic),
    Lance(Ballistic),
    Flame(Ballistic),
    Turret(Ballistic),
    Laser(Beam),
    Tesla(Chain),
    Mine(Mine),
    Boomerang(Boomerang),
    /// Visual-only explosion ring
    ExplosionFx { radius: f32 },
}

impl BulletKind {
    /// Weapon credited for damage dealt by this kind
    pub fn source(&self) -> Option<WeaponId> {
        match self {
            BulletKind::Pistol(_) => Some(WeaponId::Pistol),
            BulletKind::Shotgun(_) => Some(WeaponId::Shotgun),
            BulletKind::Lance(_) => Some(WeaponId::Lance),
            BulletKind::Flame(_) => Some(WeaponId::Flame),
            BulletKind::Turret(_) => Some(WeaponId::Turret),
            BulletKind::Laser(_) => Some(WeaponId::Laser),
            BulletKind::Tesla(_) => Some(WeaponId::Tesla),
            BulletKind::Mine(_) => Some(WeaponId::Mine),
            BulletKind::Boomerang(_) => Some(WeaponId::Boomerang),
            BulletKind::ExplosionFx { .. } => None,
        }
    }

    pub fn ballistic(&self) -> Option<&Ballistic> {
        match self {
            BulletKind::Pistol(b)
            | BulletKind::Shotgun(b)
            | BulletKind::Lance(b)
            | BulletKind::Flame(b)
            | BulletKind::Turret(b) => Some(b),
            _ => None,
        }
    }

    pub fn ballistic_mut(&mut self) -> Option<&mut Ballistic> {
        match self {
            BulletKind::Pistol(b)
            | BulletKind::Shotgun(b)
            | BulletKind::Lance(b)
            | BulletKind::Flame(b)
            | BulletKind::Turret(b) => Some(b),
            _ => None,
        }
    }

    /// Remaining pierce budget, if the kind has one
    pub fn pierce(&self) -> Option<u32> {
        match self {
            BulletKind::Boomerang(b) => Some(b.pierce),
            other => other.ballistic().map(|b| b.pierce),
        }
    }
}

/// A player-owned projectile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bullet {
    pub pos: Vec2,
    /// Pixels per second (zero for stationary kinds)
    pub vel: Vec2,
    pub dmg: f32,
    pub ttl: f32,
    pub radius: f32,
    pub kind: BulletKind,
}

/// An enemy-owned projectile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnemyBullet {
    pub pos: Vec2,
    pub vel: Vec2,
    pub dmg: f32,
    pub ttl: f32,
    pub radius: f32,
}

/// Loot types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickupKind {
    Xp,
    Heal,
    Chest,
    Buff,
}

impl PickupKind {
    pub const ALL: [PickupKind; 4] = [PickupKind::Xp, PickupKind::Heal, PickupKind::Chest, PickupKind::Buff];

    pub fn key(self) -> &'static str {
        match self {
            PickupKind::Xp => "xp",
            PickupKind::Heal => "heal",
            PickupKind::Chest => "chest",
            PickupKind::Buff => "buff",
        }
    }
}

/// A pickup lying in the world
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pickup {
    pub pos: Vec2,
    pub kind: PickupKind,
    pub value: u32,
    pub ttl: f32,
}

impl Pickup {
    pub fn new(pos: Vec2, kind: PickupKind, value: u32) -> Self {
        Self {
            pos,
            kind,
            value,
            ttl: PICKUP_TTL,
        }
    }
}

/// A temporary auto-firing turret placed by the turret weapon
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Turret {
    pub pos: Vec2,
    pub ttl: f32,
    pub cd: f32,
    /// Shots per second
    pub rate: f32,
    pub dmg: f32,
    pub range: f32,
}

/// Short-lived floating notification text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatText {
    pub pos: Vec2,
    pub ttl: f32,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_gunner_starts_with_two_weapons() {
        let mut rng = Pcg32::seed_from_u64(1);
        let p = Player::from_hero(&HeroDef::get(HeroId::Gunner), &mut rng);
        assert_eq!(p.weapon_ids(), vec![WeaponId::Pistol, WeaponId::Shotgun]);
        assert_eq!(p.hp, p.hp_max);
    }

    #[test]
    fn test_weapon_level_clamped_and_unique() {
        let mut rng = Pcg32::seed_from_u64(1);
        let mut p = Player::from_hero(&HeroDef::get(HeroId::Runner), &mut rng);
        for _ in 0..10 {
            p.upgrade_weapon(WeaponId::Lance, &mut rng);
        }
        assert_eq!(p.weapon_level(WeaponId::Lance), Some(WEAPON_MAX_LEVEL));
        assert_eq!(p.weapons.iter().filter(|w| w.id == WeaponId::Lance).count(), 1);
    }

    #[test]
    fn test_passive_bosses_survive_json() {
        let diff = Difficulty::default();
        for boss in [BossType::Titan, BossType::Summoner] {
            let e = Enemy::new_boss(1, boss, Vec2::ZERO, 15, &diff);
            // A non-finite timer would serialize as null and fail to load
            let json = serde_json::to_string(&e).unwrap();
            let back: Enemy = serde_json::from_str(&json).unwrap();
            assert_eq!(back.kind, e.kind);
            let EnemyKind::Boss(state) = back.kind else {
                panic!("not a boss");
            };
            assert_eq!(state.attack, AttackPhase::Passive);
        }
    }

    #[test]
    fn test_damage_reports_death_once() {
        let mut rng = Pcg32::seed_from_u64(1);
        let mut p = Player::from_hero(&HeroDef::get(HeroId::Runner), &mut rng);
        assert!(!p.take_damage(10.0));
        assert!(p.take_damage(1_000.0));
        assert_eq!(p.hp, 0.0);
        assert!(!p.take_damage(5.0));
        assert_eq!(p.heal(1_000.0), p.hp_max);
    }

    #[test]
    fn test_dot_stacks_by_max() {
        let mut dots = Dots::default();
        dots.apply(
            DotPayload { kind: DotKind::Burn, dps: 10.0, duration: 1.0 },
            WeaponId::Flame,
        );
        dots.apply(
            DotPayload { kind: DotKind::Burn, dps: 4.0, duration: 3.0 },
            WeaponId::Laser,
        );
        let burn = dots.burn.unwrap();
        assert_eq!(burn.dps, 10.0);
        assert_eq!(burn.t, 3.0);
        assert_eq!(burn.source, WeaponId::Laser);
        assert!(dots.bleed.is_none());
    }

    #[test]
    fn test_difficulty_scales_enemy_hp() {
        let mut a = Pcg32::seed_from_u64(9);
        let mut b = Pcg32::seed_from_u64(9);
        let easy = Enemy::new(1, EnemyTag::Tank, Vec2::ZERO, 3, &Difficulty::get(crate::tuning::DifficultyId::Easy), &mut a);
        let hard = Enemy::new(1, EnemyTag::Tank, Vec2::ZERO, 3, &Difficulty::get(crate::tuning::DifficultyId::Hard), &mut b);
        assert!(hard.hp_max > easy.hp_max);
        assert_eq!(hard.tag(), EnemyTag::Tank);
    }
}
