//! Procedural world field
//!
//! An infinite grid of tiles derived on demand from an integer hash. Nothing is
//! stored: the same `(map, cx, cy)` always yields the same tile, which is what
//! keeps wall collision stable from one frame to the next.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::tuning::{MapDef, MapId, TileDensity};

/// Half-width (in cells) of the always-open square around the origin
pub const SAFE_ZONE_CELLS: i32 = 2;

/// Push-out passes in [`WorldField::resolve_circle`]
const RESOLVE_PASSES: usize = 2;

/// Extra separation added after a push so the circle ends strictly outside
const RESOLVE_SKIN: f32 = 0.25;

/// Ground type of a non-wall tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Biome {
    #[default]
    Normal,
    Ice,
    Mud,
}

/// One sampled tile (ephemeral, never stored)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub wall: bool,
    pub biome: Biome,
    pub glyph: char,
}

impl Tile {
    const OPEN: Tile = Tile {
        wall: false,
        biome: Biome::Normal,
        glyph: ' ',
    };
}

/// Integer cell coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub cx: i32,
    pub cy: i32,
}

/// Deterministic 2D integer hash
#[inline]
pub fn hash2i(xi: i32, yi: i32) -> u32 {
    let mut x = xi ^ yi.wrapping_mul(374_761_393);
    x = (x ^ (x >> 13)).wrapping_mul(1_274_126_177);
    x ^= x >> 16;
    x as u32
}

/// Hash mapped to `[0, 1)` with a per-purpose salt
#[inline]
fn hash01(cx: i32, cy: i32, salt: i32) -> f32 {
    let h = hash2i(
        cx.wrapping_add(salt.wrapping_mul(1013)),
        cy.wrapping_sub(salt.wrapping_mul(3251)),
    );
    (h % 100_000) as f32 / 100_000.0
}

/// Classify a cell for the given densities
pub fn sample_tile_with(t: &TileDensity, cx: i32, cy: i32) -> Tile {
    if cx.abs() <= SAFE_ZONE_CELLS && cy.abs() <= SAFE_ZONE_CELLS {
        return Tile::OPEN;
    }

    let r_wall = hash01(cx, cy, 1);
    let r_biome = hash01(cx, cy, 2);
    let r_detail = hash01(cx, cy, 3);

    if r_wall < t.wall {
        // Mostly thin wall glyphs so walls don't overwhelm the scene
        let glyph = if r_detail < 0.7 { '#' } else { '+' };
        return Tile {
            wall: true,
            biome: Biome::Normal,
            glyph,
        };
    }

    let biome = if r_biome < t.ice {
        Biome::Ice
    } else if r_biome < t.ice + t.mud {
        Biome::Mud
    } else {
        Biome::Normal
    };

    let glyph = match biome {
        Biome::Ice if r_detail < 0.25 => '~',
        Biome::Mud if r_detail < 0.25 => '_',
        _ => ' ',
    };

    Tile {
        wall: false,
        biome,
        glyph,
    }
}

/// Classify a cell of a built-in map
pub fn sample_tile(map: MapId, cx: i32, cy: i32) -> Tile {
    sample_tile_with(&MapDef::tiles(map), cx, cy)
}

/// Stateless view of one map's tile field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldField {
    pub map: MapId,
    pub tiles: TileDensity,
    pub cell_px: f32,
}

impl WorldField {
    pub fn new(map: MapId, cell_px: f32) -> Self {
        Self {
            map,
            tiles: MapDef::tiles(map),
            cell_px,
        }
    }

    #[inline]
    pub fn sample(&self, cx: i32, cy: i32) -> Tile {
        sample_tile_with(&self.tiles, cx, cy)
    }

    #[inline]
    pub fn world_to_cell(&self, p: Vec2) -> Cell {
        Cell {
            cx: (p.x / self.cell_px).floor() as i32,
            cy: (p.y / self.cell_px).floor() as i32,
        }
    }

    #[inline]
    pub fn cell_center(&self, cell: Cell) -> Vec2 {
        Vec2::new(
            (cell.cx as f32 + 0.5) * self.cell_px,
            (cell.cy as f32 + 0.5) * self.cell_px,
        )
    }

    /// Tile under a world position
    #[inline]
    pub fn tile_at(&self, p: Vec2) -> Tile {
        let c = self.world_to_cell(p);
        self.sample(c.cx, c.cy)
    }

    #[inline]
    pub fn is_wall_at(&self, p: Vec2) -> bool {
        self.tile_at(p).wall
    }

    /// Push a circle out of the 9 wall cells around its starting cell.
    ///
    /// Two passes of closest-point projection against each wall AABB. This is
    /// an approximation: overlapping corners can leave a small residual.
    pub fn resolve_circle(&self, pos: Vec2, r: f32) -> Vec2 {
        let mut p = pos;
        let origin = self.world_to_cell(p);
        let s = self.cell_px;

        for _ in 0..RESOLVE_PASSES {
            for oy in -1..=1 {
                for ox in -1..=1 {
                    let tx = origin.cx + ox;
                    let ty = origin.cy + oy;
                    if !self.sample(tx, ty).wall {
                        continue;
                    }

                    let min = Vec2::new(tx as f32 * s, ty as f32 * s);
                    let max = min + Vec2::splat(s);
                    let q = p.clamp(min, max);
                    let d = p - q;
                    let d2 = d.length_squared();

                    if d2 <= 1e-6 {
                        // Center inside the cell: nudge out diagonally
                        p += Vec2::splat(0.5);
                    } else if d2 <= r * r {
                        let dist = d2.sqrt();
                        let push = (r - dist) + RESOLVE_SKIN;
                        p += d / dist * push;
                    }
                }
            }
        }
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn find_wall(world: &WorldField) -> Cell {
        for cy in 5..400 {
            for cx in 5..400 {
                let isolated = (-1..=1)
                    .flat_map(|oy| (-1..=1).map(move |ox| (ox, oy)))
                    .filter(|&(ox, oy)| ox != 0 || oy != 0)
                    .all(|(ox, oy)| !world.sample(cx + ox, cy + oy).wall);
                if world.sample(cx, cy).wall && isolated {
                    return Cell { cx, cy };
                }
            }
        }
        panic!("no isolated wall found");
    }

    #[test]
    fn test_plains_has_no_walls() {
        for cy in -50..50 {
            for cx in -50..50 {
                assert!(!sample_tile(MapId::Plains, cx, cy).wall);
            }
        }
    }

    #[test]
    fn test_densities_roughly_match() {
        let mut walls = 0;
        let n = 200 * 200;
        for cy in 10..210 {
            for cx in 10..210 {
                if sample_tile(MapId::Hell, cx, cy).wall {
                    walls += 1;
                }
            }
        }
        let ratio = walls as f32 / n as f32;
        assert!((0.015..0.09).contains(&ratio), "wall ratio {ratio}");
    }

    #[test]
    fn test_resolve_pushes_out_of_wall() {
        let world = WorldField::new(MapId::Hell, 18.0);
        let wall = find_wall(&world);
        let center = world.cell_center(wall);
        // Circle touching the left face of the wall cell
        let start = Vec2::new(center.x - 9.0 - 4.0, center.y);
        let r = 8.0;
        let out = world.resolve_circle(start, r);
        let min = Vec2::new(wall.cx as f32 * 18.0, wall.cy as f32 * 18.0);
        let q = out.clamp(min, min + Vec2::splat(18.0));
        assert!(out.distance(q) >= r - 0.01, "still overlapping: {out:?}");
    }

    #[test]
    fn test_resolve_leaves_open_ground_alone() {
        let world = WorldField::new(MapId::Classic, 18.0);
        let p = Vec2::new(3.0, -4.0);
        assert_eq!(world.resolve_circle(p, 8.0), p);
    }

    proptest! {
        #[test]
        fn prop_sampling_is_deterministic(cx in -100_000i32..100_000, cy in -100_000i32..100_000) {
            for map in MapId::ALL {
                prop_assert_eq!(sample_tile(map, cx, cy), sample_tile(map, cx, cy));
            }
        }

        #[test]
        fn prop_safe_zone_is_open(cx in -2i32..=2, cy in -2i32..=2) {
            for map in MapId::ALL {
                let t = sample_tile(map, cx, cy);
                prop_assert!(!t.wall);
                prop_assert_eq!(t.biome, Biome::Normal);
            }
        }
    }
}
