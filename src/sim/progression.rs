//! Experience, level-ups, upgrade choices and pickups

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::entities::{Buffs, EnemyTag, Pickup, PickupKind, Player, WeaponId};
use super::state::{GameEvent, GamePhase, GameState, ObjectiveKind};
use super::stats;
use crate::consts::{UPGRADE_CHOICES, WEAPON_MAX_LEVEL};

/// Pickup magnet base radius
const MAGNET_RADIUS: f32 = 130.0;
/// Pickup pull speed at the player
const MAGNET_PULL: f32 = 520.0;
/// Base collection radius
const COLLECT_RADIUS: f32 = 16.0;

/// Chance that the weapon slot upgrades an owned weapon instead of unlocking one
const OWNED_WEAPON_BIAS: f32 = 0.65;

/// Highest burn spread level
pub const MAX_BURN_SPREAD: u8 = 3;

/// XP needed to go from `level` to `level + 1`
pub fn xp_to_next(level: u32) -> u32 {
    let l = level as f32;
    (5.0 + l * 2.2 + l * l * 0.16).round() as u32
}

/// What an upgrade choice does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpgradeKind {
    /// Unlock or level up a weapon
    Weapon(WeaponId),
    FireRate,
    Damage,
    MoveSpeed,
    Ricochet,
    MaxHp,
    Magnet,
    Dash,
    Crit,
    CritDamage,
    CritBurn,
    Execute,
    BurnSpread,
}

impl UpgradeKind {
    /// Stable identifier, unique per kind
    pub fn key(self) -> String {
        match self {
            UpgradeKind::Weapon(id) => format!("weapon:{}", id.key()),
            UpgradeKind::FireRate => "buff:fire".into(),
            UpgradeKind::Damage => "buff:dmg".into(),
            UpgradeKind::MoveSpeed => "buff:spd".into(),
            UpgradeKind::Ricochet => "perk:rico".into(),
            UpgradeKind::MaxHp => "perk:hp".into(),
            UpgradeKind::Magnet => "perk:mag".into(),
            UpgradeKind::Dash => "perk:dash".into(),
            UpgradeKind::Crit => "perk:crit".into(),
            UpgradeKind::CritDamage => "perk:critdmg".into(),
            UpgradeKind::CritBurn => "perk:critburn".into(),
            UpgradeKind::Execute => "perk:exec".into(),
            UpgradeKind::BurnSpread => "perk:spread".into(),
        }
    }

    fn label(self) -> (&'static str, &'static str) {
        match self {
            UpgradeKind::Weapon(_) => ("", ""),
            UpgradeKind::FireRate => ("FIRE +", "+ fire rate"),
            UpgradeKind::Damage => ("DMG +", "+ damage"),
            UpgradeKind::MoveSpeed => ("SPD +", "+ move speed"),
            UpgradeKind::Ricochet => ("RICOCHET +", "+ wall ricochet chance"),
            UpgradeKind::MaxHp => ("HP MAX +", "+10 max HP (heals too)"),
            UpgradeKind::Magnet => ("MAGNET +", "Pull pickups from further away"),
            UpgradeKind::Dash => ("DASH +", "Dash more often and further"),
            UpgradeKind::Crit => ("CRIT +", "+ critical hit chance"),
            UpgradeKind::CritDamage => ("CRIT DMG +", "+ critical hit damage"),
            UpgradeKind::CritBurn => ("CRIT BURN", "Critical hits ignite"),
            UpgradeKind::Execute => ("EXECUTE +", "+ damage to targets below 25% HP"),
            UpgradeKind::BurnSpread => ("BURN SPREAD +", "Burning spreads to nearby enemies"),
        }
    }
}

/// One option of the upgrade menu
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeChoice {
    pub kind: UpgradeKind,
    pub title: String,
    pub desc: String,
}

impl UpgradeChoice {
    fn weapon(id: WeaponId, owned: bool) -> Self {
        let (verb, desc) = if owned {
            ("UP", "Upgrade the weapon")
        } else {
            ("UNLOCK", "Unlock the weapon")
        };
        Self {
            kind: UpgradeKind::Weapon(id),
            title: format!("{verb} {}", id.name()),
            desc: desc.to_string(),
        }
    }

    fn perk(kind: UpgradeKind) -> Self {
        let (title, desc) = kind.label();
        Self {
            kind,
            title: title.to_string(),
            desc: desc.to_string(),
        }
    }

    pub fn key(&self) -> String {
        self.kind.key()
    }
}

/// Buff/perk options currently on offer
fn perk_pool(buffs: &Buffs) -> Vec<UpgradeKind> {
    let mut pool = vec![
        UpgradeKind::FireRate,
        UpgradeKind::Damage,
        UpgradeKind::MoveSpeed,
        UpgradeKind::Ricochet,
        UpgradeKind::MaxHp,
        UpgradeKind::Magnet,
        UpgradeKind::Dash,
        UpgradeKind::Crit,
        UpgradeKind::CritDamage,
        UpgradeKind::Execute,
    ];
    if !buffs.crit_burn {
        pool.push(UpgradeKind::CritBurn);
    }
    if buffs.burn_spread < MAX_BURN_SPREAD {
        pool.push(UpgradeKind::BurnSpread);
    }
    pool
}

/// The single weapon option, if any weapon can still change
fn weapon_option<R: Rng + ?Sized>(player: &Player, rng: &mut R) -> Option<UpgradeChoice> {
    let upgradable: Vec<WeaponId> = player
        .weapons
        .iter()
        .filter(|w| w.level < WEAPON_MAX_LEVEL)
        .map(|w| w.id)
        .collect();
    let missing: Vec<WeaponId> = WeaponId::ALL
        .into_iter()
        .filter(|&id| !player.has_weapon(id))
        .collect();

    let prefer_owned = rng.random::<f32>() < OWNED_WEAPON_BIAS;
    let pool = if !upgradable.is_empty() && (prefer_owned || missing.is_empty()) {
        &upgradable
    } else {
        &missing
    };
    if pool.is_empty() {
        return None;
    }
    let id = pool[rng.random_range(0..pool.len())];
    Some(UpgradeChoice::weapon(id, player.has_weapon(id)))
}

/// Build one menu: one weapon option, then unique perks up to the slot count
pub fn generate_upgrade_choices<R: Rng + ?Sized>(player: &Player, rng: &mut R) -> Vec<UpgradeChoice> {
    let mut choices: Vec<UpgradeChoice> = Vec::with_capacity(UPGRADE_CHOICES);
    if let Some(c) = weapon_option(player, rng) {
        choices.push(c);
    }

    let pool = perk_pool(&player.buffs);
    let mut attempts = 0;
    while choices.len() < UPGRADE_CHOICES && attempts < 64 {
        attempts += 1;
        let kind = pool[rng.random_range(0..pool.len())];
        if !choices.iter().any(|c| c.kind == kind) {
            choices.push(UpgradeChoice::perk(kind));
        }
    }
    // Unlucky draws: fill in pool order
    for &kind in &pool {
        if choices.len() >= UPGRADE_CHOICES {
            break;
        }
        if !choices.iter().any(|c| c.kind == kind) {
            choices.push(UpgradeChoice::perk(kind));
        }
    }
    choices
}

/// Apply one choice to the player and announce it
pub fn apply_upgrade_choice(state: &mut GameState, choice: &UpgradeChoice) {
    let p = &mut state.player;
    let text = match choice.kind {
        UpgradeKind::Weapon(id) => {
            let owned = p.has_weapon(id);
            let level = if owned {
                p.upgrade_weapon(id, &mut state.rng)
            } else {
                p.ensure_weapon(id, &mut state.rng).level
            };
            log::debug!("weapon {} -> level {}", id.key(), level);
            format!("{} {}", id.name(), if owned { "UP" } else { "UNLOCK" })
        }
        UpgradeKind::FireRate => {
            p.buffs.fire_rate_mul = (p.buffs.fire_rate_mul + 0.12).clamp(1.0, 2.4);
            choice.title.clone()
        }
        UpgradeKind::Damage => {
            p.buffs.dmg_mul = (p.buffs.dmg_mul + 0.10).clamp(1.0, 2.4);
            choice.title.clone()
        }
        UpgradeKind::MoveSpeed => {
            p.buffs.move_speed_mul = (p.buffs.move_speed_mul + 0.08).clamp(1.0, 1.9);
            choice.title.clone()
        }
        UpgradeKind::Ricochet => {
            p.buffs.ricochet_add = (p.buffs.ricochet_add + 0.05).clamp(0.0, 0.35);
            choice.title.clone()
        }
        UpgradeKind::MaxHp => {
            p.hp_max += 10.0;
            p.heal(10.0);
            choice.title.clone()
        }
        UpgradeKind::Magnet => {
            p.buffs.magnet_mul = (p.buffs.magnet_mul + 0.20).clamp(1.0, 2.4);
            choice.title.clone()
        }
        UpgradeKind::Dash => {
            p.buffs.dash_cd_mul = (p.buffs.dash_cd_mul - 0.10).clamp(0.55, 1.0);
            p.buffs.dash_pow_mul = (p.buffs.dash_pow_mul + 0.08).clamp(1.0, 1.8);
            choice.title.clone()
        }
        UpgradeKind::Crit => {
            p.buffs.crit_chance = (p.buffs.crit_chance + 0.05).clamp(0.0, 0.5);
            choice.title.clone()
        }
        UpgradeKind::CritDamage => {
            p.buffs.crit_mul = (p.buffs.crit_mul + 0.25).clamp(1.6, 3.0);
            choice.title.clone()
        }
        UpgradeKind::CritBurn => {
            p.buffs.crit_burn = true;
            choice.title.clone()
        }
        UpgradeKind::Execute => {
            p.buffs.execute_mul = (p.buffs.execute_mul + 0.15).clamp(1.0, 2.0);
            choice.title.clone()
        }
        UpgradeKind::BurnSpread => {
            p.buffs.burn_spread = (p.buffs.burn_spread + 1).min(MAX_BURN_SPREAD);
            choice.title.clone()
        }
    };
    log::info!("upgrade applied: {}", choice.key());
    let pos = state.player.pos - Vec2::new(0.0, 20.0);
    state.push_float(pos, 1.2, text);
}

/// Owe the player `count` more picks and freeze gameplay on the menu
pub fn open_upgrade_menu(state: &mut GameState, count: u32) {
    if count == 0 || state.phase == GamePhase::GameOver {
        return;
    }
    state.upgrade.remaining = (state.upgrade.remaining + count).max(1);
    state.upgrade.choices = generate_upgrade_choices(&state.player, &mut state.rng);
    state.phase = GamePhase::Upgrade;
    state.emit(GameEvent::UpgradeMenu);
}

/// Pick choice `index`; a no-op unless the menu is open and the index exists
pub fn choose_upgrade(state: &mut GameState, index: usize) {
    if state.phase != GamePhase::Upgrade {
        return;
    }
    let Some(choice) = state.upgrade.choices.get(index).cloned() else {
        return;
    };
    apply_upgrade_choice(state, &choice);

    state.upgrade.remaining = state.upgrade.remaining.saturating_sub(1);
    if state.upgrade.remaining > 0 {
        state.upgrade.choices = generate_upgrade_choices(&state.player, &mut state.rng);
        return;
    }
    state.upgrade.choices.clear();
    state.phase = GamePhase::Playing;
}

/// Add xp, level up as many times as it covers; returns levels gained
pub fn gain_xp(state: &mut GameState, amount: u32) -> u32 {
    let p = &mut state.player;
    p.xp += amount;
    let mut gained = 0;
    while p.xp >= xp_to_next(p.level) {
        p.xp -= xp_to_next(p.level);
        p.level += 1;
        gained += 1;
    }

    if gained > 0 {
        let level = state.player.level;
        log::info!("level up: {} (+{gained})", level);
        for _ in 0..gained {
            state.emit(GameEvent::LevelUp);
        }
        let pos = state.player.pos - Vec2::new(0.0, 26.0);
        state.push_float(pos, 1.2, format!("LVL {level}"));
        open_upgrade_menu(state, gained);
    }
    gained
}

/// Roll loot for a dead enemy
pub fn maybe_drop_pickup(state: &mut GameState, pos: Vec2, tag: EnemyTag, xp: u32) {
    if state.pickups.len() >= state.config.max_pickups {
        return;
    }
    let boss = tag == EnemyTag::Boss;
    let chance = if boss {
        0.95
    } else if tag == EnemyTag::Tank {
        0.22
    } else {
        0.12
    };
    if state.rng.random::<f32>() > chance {
        return;
    }

    let roll: f32 = state.rng.random();
    let (kind, value) = if boss && roll < 0.55 {
        (PickupKind::Chest, 1)
    } else if roll < 0.45 {
        (PickupKind::Xp, if boss { 8 } else { xp })
    } else if roll < 0.7 {
        (PickupKind::Heal, if boss { 35 } else { 18 })
    } else {
        (PickupKind::Buff, 1)
    };
    state.push_pickup(Pickup::new(pos, kind, value));
}

/// Resolve a collected pickup
pub fn apply_pickup(state: &mut GameState, pickup: Pickup) {
    if !state.discovered.contains(&pickup.kind) {
        state.discovered.push(pickup.kind);
        let pos = state.player.pos - Vec2::new(0.0, 30.0);
        state.push_float(pos, 1.4, format!("NEW: {}", pickup.kind.key().to_uppercase()));
    }
    stats::record_pickup(&mut state.run_stats, &mut state.lifetime, pickup.kind, pickup.value);
    state.emit(GameEvent::Pickup(pickup.kind));

    match pickup.kind {
        PickupKind::Xp => {
            gain_xp(state, pickup.value);
        }
        PickupKind::Heal => {
            let healed = state.player.heal(pickup.value as f32);
            let pos = state.player.pos - Vec2::new(0.0, 18.0);
            state.push_float(pos, 0.9, format!("+{}HP", healed.round() as i32));
        }
        PickupKind::Buff => open_upgrade_menu(state, 1),
        PickupKind::Chest => open_upgrade_menu(state, 2),
    }
    state.check_achievements();
}

/// Age, attract and collect pickups
pub fn update_pickups(state: &mut GameState, dt: f32) {
    let mag = state.player.buffs.magnet_mul;
    let mag_r = MAGNET_RADIUS * mag;
    let collect_r = COLLECT_RADIUS + 10.0 * (mag - 1.0);
    let player_pos = state.player.pos;

    let mut collected = Vec::new();
    let mut i = 0;
    while i < state.pickups.len() {
        let p = &mut state.pickups[i];
        p.ttl -= dt;
        if p.ttl <= 0.0 {
            state.pickups.swap_remove(i);
            continue;
        }

        let to_player = player_pos - p.pos;
        let d2 = to_player.length_squared();
        if d2 > 1e-4 && d2 < mag_r * mag_r {
            let d = d2.sqrt();
            let pull = MAGNET_PULL * mag * (1.0 - d / mag_r);
            p.pos += to_player / d * pull * dt;
        }

        if p.pos.distance_squared(player_pos) <= collect_r * collect_r {
            collected.push(state.pickups.swap_remove(i));
            continue;
        }
        i += 1;
    }

    for p in collected {
        apply_pickup(state, p);
        if state.objective.kind == ObjectiveKind::Pickups && !state.objective.done {
            state.objective.progress += 1;
        }
    }
}

/// Track objective progress and pay out the reward chest
pub fn update_objective(state: &mut GameState) {
    let obj = &mut state.objective;
    if obj.done {
        return;
    }
    match obj.kind {
        ObjectiveKind::Kills => obj.progress = state.kills,
        ObjectiveKind::Time => obj.progress = state.time.floor() as u32,
        ObjectiveKind::Pickups => {}
    }
    if obj.progress >= obj.target {
        obj.done = true;
        log::info!("objective complete: {} {}", obj.label(), obj.target);
        let pos = state.player.pos + Vec2::new(18.0, -18.0);
        state.pickups.push(Pickup::new(pos, PickupKind::Chest, 1));
        let pos = state.player.pos - Vec2::new(0.0, 30.0);
        state.push_float(pos, 1.4, "OBJECTIVE +");
    }
}
