//! Run and lifetime statistics, achievements

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::entities::{BossType, EnemyTag, PickupKind, WeaponId};

/// Current lifetime stats schema version
pub const LIFETIME_VERSION: u32 = 1;

fn inc(map: &mut BTreeMap<String, u32>, key: &str, n: u32) {
    *map.entry(key.to_string()).or_insert(0) += n;
}

/// Unlock state of one achievement
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AchievementState {
    pub unlocked: bool,
    /// Host wall-clock time of the unlock (ms since epoch)
    pub unlocked_at: Option<f64>,
}

/// Stats persisted across runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifetimeStats {
    pub v: u32,
    pub runs: u32,
    pub total_time: f32,
    pub best_time: f32,
    pub best_wave: u32,
    pub best_kills: u32,
    pub kills_total: u32,
    pub kills_by_weapon: BTreeMap<String, u32>,
    pub kills_by_enemy: BTreeMap<String, u32>,
    pub pickups_total: u32,
    pub pickups_by_kind: BTreeMap<String, u32>,
    pub coins_picked: u32,
    pub coins_value_total: u32,
    pub achievements: BTreeMap<String, AchievementState>,
}

impl Default for LifetimeStats {
    fn default() -> Self {
        Self {
            v: LIFETIME_VERSION,
            runs: 0,
            total_time: 0.0,
            best_time: 0.0,
            best_wave: 0,
            best_kills: 0,
            kills_total: 0,
            kills_by_weapon: BTreeMap::new(),
            kills_by_enemy: BTreeMap::new(),
            pickups_total: 0,
            pickups_by_kind: BTreeMap::new(),
            coins_picked: 0,
            coins_value_total: 0,
            achievements: BTreeMap::new(),
        }
    }
}

impl LifetimeStats {
    pub fn is_unlocked(&self, id: &str) -> bool {
        self.achievements.get(id).is_some_and(|a| a.unlocked)
    }

    pub fn unlocked_count(&self) -> usize {
        self.achievements.values().filter(|a| a.unlocked).count()
    }
}

/// Stats for the current run only
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub kills: u32,
    pub kills_by_weapon: BTreeMap<String, u32>,
    pub kills_by_enemy: BTreeMap<String, u32>,
    pub pickups_total: u32,
    pub pickups_by_kind: BTreeMap<String, u32>,
    pub coins_picked: u32,
    pub coins_value_total: u32,
}

/// Record one kill in both ledgers.
///
/// Boss kills are additionally counted under `boss:<type>`.
pub fn record_kill(
    run: &mut RunStats,
    lifetime: &mut LifetimeStats,
    weapon: Option<WeaponId>,
    enemy: EnemyTag,
    boss: Option<BossType>,
) {
    let weapon_key = weapon.map_or("unknown", WeaponId::key);
    run.kills += 1;
    lifetime.kills_total += 1;
    inc(&mut run.kills_by_weapon, weapon_key, 1);
    inc(&mut lifetime.kills_by_weapon, weapon_key, 1);
    inc(&mut run.kills_by_enemy, enemy.key(), 1);
    inc(&mut lifetime.kills_by_enemy, enemy.key(), 1);

    if let (EnemyTag::Boss, Some(b)) = (enemy, boss) {
        let k = format!("boss:{}", b.key());
        inc(&mut run.kills_by_enemy, &k, 1);
        inc(&mut lifetime.kills_by_enemy, &k, 1);
    }
}

/// Record a collected pickup; xp pickups also count as coins
pub fn record_pickup(run: &mut RunStats, lifetime: &mut LifetimeStats, kind: PickupKind, value: u32) {
    run.pickups_total += 1;
    lifetime.pickups_total += 1;
    inc(&mut run.pickups_by_kind, kind.key(), 1);
    inc(&mut lifetime.pickups_by_kind, kind.key(), 1);
    if kind == PickupKind::Xp {
        run.coins_picked += 1;
        lifetime.coins_picked += 1;
        run.coins_value_total += value;
        lifetime.coins_value_total += value;
    }
}

pub fn record_run_end(lifetime: &mut LifetimeStats, time: f32, wave: u32, kills: u32) {
    let time = time.max(0.0);
    lifetime.runs += 1;
    lifetime.total_time += time;
    lifetime.best_time = lifetime.best_time.max(time);
    lifetime.best_wave = lifetime.best_wave.max(wave);
    lifetime.best_kills = lifetime.best_kills.max(kills);
}

/// What an achievement measures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goal {
    KillsTotal,
    BestTime,
    BestWave,
    BestKills,
    Runs,
    Weapon(&'static str),
    Enemy(&'static str),
    CoinsPicked,
    Pickup(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AchievementDef {
    pub id: &'static str,
    pub title: &'static str,
    pub desc: &'static str,
    pub goal: Goal,
    pub target: u32,
}

const fn def(id: &'static str, title: &'static str, desc: &'static str, goal: Goal, target: u32) -> AchievementDef {
    AchievementDef {
        id,
        title,
        desc,
        goal,
        target,
    }
}

pub const ACHIEVEMENTS: &[AchievementDef] = &[
    def("first_kill", "First Blood", "Get 1 kill (total)", Goal::KillsTotal, 1),
    def("kills_100", "Centurion", "Get 100 kills (total)", Goal::KillsTotal, 100),
    def("kills_1000", "Grinder", "Get 1000 kills (total)", Goal::KillsTotal, 1000),
    def("boss_slayer", "Boss Slayer", "Kill 1 boss (total)", Goal::Enemy("boss"), 1),
    def("boss_5", "Boss Hunter", "Kill 5 bosses (total)", Goal::Enemy("boss"), 5),
    def("boss_20", "Boss Nemesis", "Kill 20 bosses (total)", Goal::Enemy("boss"), 20),
    def("boss_rager", "Rager Down", "Kill a RAGER boss", Goal::Enemy("boss:rager"), 1),
    def("boss_artillery", "Artillery Down", "Kill an ARTILLERY boss", Goal::Enemy("boss:artillery"), 1),
    def("boss_titan", "Titan Down", "Kill a TITAN boss", Goal::Enemy("boss:titan"), 1),
    def("boss_summoner", "Summoner Down", "Kill a SUMMONER boss", Goal::Enemy("boss:summoner"), 1),
    def("survive_5m", "Survivor", "Survive 5 minutes (best)", Goal::BestTime, 300),
    def("survive_10m", "Hard to Kill", "Survive 10 minutes (best)", Goal::BestTime, 600),
    def("survive_20m", "Unbreakable", "Survive 20 minutes (best)", Goal::BestTime, 1200),
    def("best_wave_10", "Wave 10", "Reach wave 10 (best)", Goal::BestWave, 10),
    def("best_wave_20", "Wave 20", "Reach wave 20 (best)", Goal::BestWave, 20),
    def("best_kills_200", "200 Kills", "Reach 200 kills in one run (best)", Goal::BestKills, 200),
    def("runs_10", "Regular", "Play 10 runs", Goal::Runs, 10),
    def("laser_100", "Laser Enjoyer", "100 kills with the Laser", Goal::Weapon("laser"), 100),
    def("pistol_250", "Pistol Main", "250 kills with the Pistol", Goal::Weapon("pistol"), 250),
    def("shotgun_250", "Shotgun Main", "250 kills with the Shotgun", Goal::Weapon("shotgun"), 250),
    def("lance_250", "Lance Main", "250 kills with the Lance", Goal::Weapon("lance"), 250),
    def("flame_250", "Pyro", "250 kills with the Flamethrower", Goal::Weapon("flame"), 250),
    def("mine_250", "Demolition", "250 kills with Mines", Goal::Weapon("mine"), 250),
    def("boomerang_250", "Return To Sender", "250 kills with the Boomerang", Goal::Weapon("boomerang"), 250),
    def("tesla_250", "Overcharge", "250 kills with Tesla", Goal::Weapon("tesla"), 250),
    def("turret_250", "Engineer", "250 kills via Turrets", Goal::Weapon("turret"), 250),
    def("charger_200", "Anti-Rush", "Kill 200 chargers", Goal::Enemy("charger"), 200),
    def("exploder_200", "Bomb Squad", "Kill 200 exploders", Goal::Enemy("exploder"), 200),
    def("summoner_200", "No Adds", "Kill 200 summoners", Goal::Enemy("summoner"), 200),
    def("shield_200", "Shield Breaker", "Kill 200 shields", Goal::Enemy("shield"), 200),
    def("coins_500", "Coin Collector", "Pick up 500 XP coins", Goal::CoinsPicked, 500),
    def("coins_2000", "Rich", "Pick up 2000 XP coins", Goal::CoinsPicked, 2000),
    def("heals_50", "Medic", "Pick up 50 heals", Goal::Pickup("heal"), 50),
    def("chests_20", "Treasure Hunter", "Open 20 chests", Goal::Pickup("chest"), 20),
    def("buffs_50", "Buff Addict", "Pick up 50 buffs", Goal::Pickup("buff"), 50),
];

fn progress(lifetime: &LifetimeStats, goal: Goal) -> u32 {
    let get = |m: &BTreeMap<String, u32>, k: &str| m.get(k).copied().unwrap_or(0);
    match goal {
        Goal::KillsTotal => lifetime.kills_total,
        Goal::BestTime => lifetime.best_time.floor() as u32,
        Goal::BestWave => lifetime.best_wave,
        Goal::BestKills => lifetime.best_kills,
        Goal::Runs => lifetime.runs,
        Goal::Weapon(k) => get(&lifetime.kills_by_weapon, k),
        Goal::Enemy(k) => get(&lifetime.kills_by_enemy, k),
        Goal::CoinsPicked => lifetime.coins_picked,
        Goal::Pickup(k) => get(&lifetime.pickups_by_kind, k),
    }
}

/// Unlock every achievement whose target is met; returns the newly unlocked ones
pub fn update_achievements(lifetime: &mut LifetimeStats, now_ms: f64) -> Vec<&'static AchievementDef> {
    let mut unlocked = Vec::new();
    for a in ACHIEVEMENTS {
        if lifetime.is_unlocked(a.id) {
            continue;
        }
        if progress(lifetime, a.goal) >= a.target {
            lifetime.achievements.insert(
                a.id.to_string(),
                AchievementState {
                    unlocked: true,
                    unlocked_at: Some(now_ms),
                },
            );
            unlocked.push(a);
        }
    }
    unlocked
}

/// Format seconds as `m:ss`
pub fn format_time_mmss(t: f32) -> String {
    let s = t.max(0.0).floor() as u32;
    format!("{}:{:02}", s / 60, s % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boss_kill_records_subtype() {
        let mut run = RunStats::default();
        let mut life = LifetimeStats::default();
        record_kill(&mut run, &mut life, Some(WeaponId::Tesla), EnemyTag::Boss, Some(BossType::Titan));
        assert_eq!(run.kills, 1);
        assert_eq!(life.kills_by_enemy.get("boss"), Some(&1));
        assert_eq!(life.kills_by_enemy.get("boss:titan"), Some(&1));
        assert_eq!(life.kills_by_weapon.get("tesla"), Some(&1));

        let new = update_achievements(&mut life, 42.0);
        let ids: Vec<_> = new.iter().map(|a| a.id).collect();
        assert!(ids.contains(&"first_kill"));
        assert!(ids.contains(&"boss_slayer"));
        assert!(ids.contains(&"boss_titan"));
        assert_eq!(life.achievements["first_kill"].unlocked_at, Some(42.0));
    }

    #[test]
    fn test_achievements_unlock_once() {
        let mut life = LifetimeStats {
            kills_total: 150,
            ..LifetimeStats::default()
        };
        assert_eq!(update_achievements(&mut life, 1.0).len(), 2);
        assert!(update_achievements(&mut life, 2.0).is_empty());
        assert_eq!(life.achievements["kills_100"].unlocked_at, Some(1.0));
    }

    #[test]
    fn test_run_end_keeps_bests() {
        let mut life = LifetimeStats::default();
        record_run_end(&mut life, 120.0, 6, 80);
        record_run_end(&mut life, 30.0, 2, 10);
        assert_eq!(life.runs, 2);
        assert_eq!(life.best_wave, 6);
        assert_eq!(life.best_kills, 80);
        assert_eq!(life.best_time, 120.0);
        assert_eq!(life.total_time, 150.0);
    }

    #[test]
    fn test_xp_pickup_counts_coins() {
        let mut run = RunStats::default();
        let mut life = LifetimeStats::default();
        record_pickup(&mut run, &mut life, PickupKind::Xp, 3);
        record_pickup(&mut run, &mut life, PickupKind::Heal, 18);
        assert_eq!(run.coins_picked, 1);
        assert_eq!(run.coins_value_total, 3);
        assert_eq!(life.pickups_total, 2);
        assert_eq!(life.pickups_by_kind.get("heal"), Some(&1));
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time_mmss(0.0), "0:00");
        assert_eq!(format_time_mmss(61.9), "1:01");
        assert_eq!(format_time_mmss(-5.0), "0:00");
    }

    #[test]
    fn test_lifetime_defaults_fill_missing_fields() {
        let life: LifetimeStats = serde_json::from_str(r#"{ "runs": 3 }"#).unwrap();
        assert_eq!(life.runs, 3);
        assert_eq!(life.v, LIFETIME_VERSION);
    }
}
