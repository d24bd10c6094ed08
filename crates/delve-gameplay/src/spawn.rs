//! Spawn placement and validation.

use crate::behavior::CharacterKind;
use delve_world::{Dungeon, Environment, SpawnKind, Terrain, TileKind};
use glam::Vec3;
use tracing::{debug, warn};

/// Accepted terrain heights for outdoor spawns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightBand {
    /// Lowest accepted height
    pub min: f32,
    /// Highest accepted height
    pub max: f32,
}

impl HeightBand {
    /// Returns true if `h` lies inside the band.
    #[must_use]
    pub fn contains(&self, h: f32) -> bool {
        h >= self.min && h <= self.max
    }
}

/// Character kind spawned by a level marker. The player marker spawns none.
#[must_use]
pub const fn kind_for_marker(marker: SpawnKind) -> Option<CharacterKind> {
    match marker {
        SpawnKind::Player => None,
        SpawnKind::Pirate => Some(CharacterKind::Pirate),
        SpawnKind::Spider => Some(CharacterKind::Spider),
        SpawnKind::Skeleton => Some(CharacterKind::Skeleton),
        SpawnKind::Ghost => Some(CharacterKind::Ghost),
    }
}

/// Returns true if an agent may be placed at `pos`.
///
/// Dungeon spawns need a walkable tile that is not lava. Outdoor spawns need
/// to be on the map with a terrain height inside `band`.
#[must_use]
pub fn is_valid_spawn(env: &Environment, pos: Vec3, band: HeightBand) -> bool {
    match env {
        Environment::Dungeon(d) => {
            let tile = d.world_to_tile(pos);
            d.grid.is_walkable(tile) && d.kind_at(tile) != TileKind::Lava
        }
        Environment::Outdoor(t) => t.contains(pos) && band.contains(t.height_at(pos)),
        Environment::Empty => false,
    }
}

/// Samples a random valid tile center in a dungeon.
pub fn sample_dungeon_spawn(dungeon: &Dungeon, rng: &mut fastrand::Rng, attempts: u32) -> Option<Vec3> {
    let (w, h) = (dungeon.grid.width(), dungeon.grid.height());
    if w == 0 || h == 0 {
        return None;
    }
    for _ in 0..attempts {
        let tile = delve_common::TileCoord::new(rng.i32(0..w as i32), rng.i32(0..h as i32));
        if dungeon.grid.is_walkable(tile) && dungeon.kind_at(tile) != TileKind::Lava {
            debug!("Spawn tile ({}, {})", tile.x, tile.y);
            return Some(dungeon.tile_center(tile));
        }
    }
    warn!("No walkable spawn tile found after {attempts} attempts");
    None
}

/// Samples a random position within `radius` of `center` on terrain whose
/// height lies inside `band`. The returned position sits on the ground.
pub fn sample_terrain_spawn(
    terrain: &Terrain,
    center: Vec3,
    radius: f32,
    band: HeightBand,
    rng: &mut fastrand::Rng,
    attempts: u32,
) -> Option<Vec3> {
    for _ in 0..attempts {
        let angle = rng.f32() * std::f32::consts::TAU;
        let dist = rng.f32().sqrt() * radius;
        let mut pos = center + Vec3::new(angle.cos() * dist, 0.0, angle.sin() * dist);
        if !terrain.contains(pos) {
            continue;
        }
        let h = terrain.height_at(pos);
        if band.contains(h) {
            pos.y = h;
            return Some(pos);
        }
    }
    warn!("No terrain spawn inside [{}, {}] after {attempts} attempts", band.min, band.max);
    None
}
