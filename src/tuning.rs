//! Data-driven game balance
//!
//! Every table here has a compiled default and can be overridden from JSON.
//! Missing keys fall back to the defaults, so a partial file only needs the
//! values you want to change.

use serde::{Deserialize, Serialize};

/// Global simulation tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// World size of one grid cell (pixels)
    pub cell_px: f32,
    pub max_enemies: usize,
    pub max_bullets: usize,
    pub max_pickups: usize,
    /// Contact damage per second before enemy/difficulty multipliers
    pub contact_dps_base: f32,
    /// Length of one wave (seconds)
    pub wave_seconds: f32,
    /// A boss spawns on every wave divisible by this; 0 disables bosses
    pub boss_every: u32,
    /// Simulation step clamp (seconds)
    pub max_dt: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            cell_px: 18.0,
            max_enemies: 260,
            max_bullets: 420,
            max_pickups: 80,
            contact_dps_base: 20.0,
            wave_seconds: 22.0,
            boss_every: 5,
            max_dt: crate::consts::MAX_DT,
        }
    }
}

const MIN_CELL_PX: f32 = 4.0;
const MIN_WAVE_SECONDS: f32 = 1.0;
const MIN_MAX_DT: f32 = 0.001;
const MAX_MAX_DT: f32 = 0.25;

/// `v` clamped to `[lo, hi]`, or `fallback` when not finite
fn clamp_or(v: f32, lo: f32, hi: f32, fallback: f32) -> f32 {
    if v.is_finite() { v.clamp(lo, hi) } else { fallback }
}

impl GameConfig {
    /// Parse a (possibly partial) JSON override
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(json).map(Self::validated)
    }

    /// Clamp values the simulation divides by or steps with
    pub fn validated(self) -> Self {
        let d = Self::default();
        let v = Self {
            cell_px: clamp_or(self.cell_px, MIN_CELL_PX, f32::MAX, d.cell_px),
            wave_seconds: clamp_or(self.wave_seconds, MIN_WAVE_SECONDS, f32::MAX, d.wave_seconds),
            max_dt: clamp_or(self.max_dt, MIN_MAX_DT, MAX_MAX_DT, d.max_dt),
            contact_dps_base: clamp_or(self.contact_dps_base, 0.0, f32::MAX, d.contact_dps_base),
            ..self
        };
        if v != self {
            log::warn!("game config out of range, clamped: {v:?}");
        }
        v
    }
}

/// Difficulty presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyId {
    Easy,
    #[default]
    Normal,
    Hard,
}

/// Enemy scaling applied for a difficulty
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Difficulty {
    pub id: DifficultyId,
    pub spawn_mul: f32,
    pub enemy_hp_mul: f32,
    pub enemy_dmg_mul: f32,
    pub enemy_speed_mul: f32,
}

impl Difficulty {
    pub fn get(id: DifficultyId) -> Self {
        match id {
            DifficultyId::Easy => Self {
                id,
                spawn_mul: 0.8,
                enemy_hp_mul: 0.85,
                enemy_dmg_mul: 0.85,
                enemy_speed_mul: 0.95,
            },
            DifficultyId::Normal => Self {
                id,
                spawn_mul: 1.0,
                enemy_hp_mul: 1.0,
                enemy_dmg_mul: 1.0,
                enemy_speed_mul: 1.0,
            },
            DifficultyId::Hard => Self {
                id,
                spawn_mul: 1.25,
                enemy_hp_mul: 1.2,
                enemy_dmg_mul: 1.2,
                enemy_speed_mul: 1.08,
            },
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::get(DifficultyId::Normal)
    }
}

/// Map selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapId {
    #[default]
    Classic,
    Plains,
    Winter,
    Hell,
}

impl MapId {
    pub const ALL: [MapId; 4] = [MapId::Classic, MapId::Plains, MapId::Winter, MapId::Hell];
}

/// Per-map tile densities, each a probability in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileDensity {
    pub wall: f32,
    pub ice: f32,
    pub mud: f32,
}

/// Colors handed to the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub bg: String,
    pub fg: String,
    pub dim: String,
    pub grain: f32,
    pub vignette: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapDef {
    pub id: MapId,
    pub name: String,
    pub tiles: TileDensity,
    pub theme: Theme,
}

impl MapDef {
    /// Tile densities without building the whole definition
    pub fn tiles(id: MapId) -> TileDensity {
        match id {
            // very few walls, mostly open
            MapId::Classic => TileDensity { wall: 0.012, ice: 0.035, mud: 0.02 },
            MapId::Plains => TileDensity { wall: 0.0, ice: 0.015, mud: 0.03 },
            // very slippery
            MapId::Winter => TileDensity { wall: 0.02, ice: 0.19, mud: 0.0 },
            MapId::Hell => TileDensity { wall: 0.045, ice: 0.09, mud: 0.05 },
        }
    }

    pub fn get(id: MapId) -> Self {
        let (name, bg, fg, dim, grain, vignette) = match id {
            MapId::Classic => ("Classic", "#000000", "#f2f2f2", "rgba(242,242,242,0.55)", 0.2, 0.55),
            MapId::Plains => ("Plains", "#0b1a0b", "#eaffea", "rgba(234,255,234,0.55)", 0.14, 0.42),
            MapId::Winter => ("Winter", "#071420", "#eef6ff", "rgba(238,246,255,0.55)", 0.12, 0.58),
            MapId::Hell => ("Hell", "#1a0505", "#ffecec", "rgba(255,236,236,0.55)", 0.14, 0.66),
        };
        Self {
            id,
            name: name.to_string(),
            tiles: Self::tiles(id),
            theme: Theme {
                bg: bg.to_string(),
                fg: fg.to_string(),
                dim: dim.to_string(),
                grain,
                vignette,
            },
        }
    }
}

/// Playable heroes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeroId {
    #[default]
    Runner,
    Tank,
    Gunner,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroDef {
    pub id: HeroId,
    pub glyph: char,
    pub hp_max: f32,
    pub speed: f32,
    /// Turret targeting range base
    pub range: f32,
    pub start_weapons: Vec<crate::sim::WeaponId>,
    pub fire_rate_mul: f32,
    pub move_speed_mul: f32,
    pub dmg_mul: f32,
}

impl HeroDef {
    pub fn get(id: HeroId) -> Self {
        use crate::sim::WeaponId;
        match id {
            HeroId::Runner => Self {
                id,
                glyph: '>',
                hp_max: 85.0,
                speed: 205.0,
                range: 135.0,
                start_weapons: vec![WeaponId::Pistol],
                fire_rate_mul: 1.0,
                move_speed_mul: 1.05,
                dmg_mul: 1.0,
            },
            HeroId::Tank => Self {
                id,
                glyph: '#',
                hp_max: 130.0,
                speed: 160.0,
                range: 110.0,
                start_weapons: vec![WeaponId::Pistol],
                fire_rate_mul: 0.95,
                move_speed_mul: 1.0,
                dmg_mul: 1.0,
            },
            HeroId::Gunner => Self {
                id,
                glyph: '&',
                hp_max: 100.0,
                speed: 175.0,
                range: 125.0,
                start_weapons: vec![WeaponId::Pistol, WeaponId::Shotgun],
                fire_rate_mul: 1.08,
                move_speed_mul: 1.0,
                dmg_mul: 1.05,
            },
        }
    }
}

/// Everything a run is started with
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSetup {
    pub map: MapId,
    pub difficulty: DifficultyId,
    pub hero: HeroId,
}

impl RunSetup {
    /// Hell is always played on hard
    pub fn effective_difficulty(&self) -> DifficultyId {
        if self.map == MapId::Hell {
            DifficultyId::Hard
        } else {
            self.difficulty
        }
    }
}
