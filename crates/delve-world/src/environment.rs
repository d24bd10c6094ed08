//! The world the simulation runs in: a tile dungeon or heightmap terrain.

use crate::geometry::{DungeonGeometry, GeometryParams};
use crate::grid::WalkableGrid;
use crate::heightmap::Heightmap;
use crate::level::LevelImage;
use crate::palette::TileKind;
use delve_common::{TileCoord, TileMapping};
use glam::Vec3;
use tracing::{debug, info};

/// A loaded dungeon level with its derived grid and geometry.
#[derive(Debug, Clone)]
pub struct Dungeon {
    /// Source image
    pub level: LevelImage,
    /// Walkability and sight cache
    pub grid: WalkableGrid,
    /// Static geometry
    pub geometry: DungeonGeometry,
    /// World-to-tile mapping
    pub mapping: TileMapping,
    /// Geometry dimensions
    pub params: GeometryParams,
}

impl Dungeon {
    /// Derives grid and geometry from a level image.
    #[must_use]
    pub fn new(level: LevelImage, params: GeometryParams) -> Self {
        let mapping = TileMapping::new(level.width(), level.height(), params.tile_size);
        let grid = WalkableGrid::build(&level);
        let geometry = DungeonGeometry::from_level(&level, &mapping, &params);
        info!(
            "Dungeon ready: {}x{} tiles, {} walkable",
            level.width(),
            level.height(),
            grid.walkable_count()
        );
        Self {
            level,
            grid,
            geometry,
            mapping,
            params,
        }
    }

    /// Converts a world position to a tile.
    #[must_use]
    pub fn world_to_tile(&self, pos: Vec3) -> TileCoord {
        self.mapping.world_to_tile(pos)
    }

    /// Returns the floor-level center of a tile.
    #[must_use]
    pub fn tile_center(&self, tile: TileCoord) -> Vec3 {
        self.mapping.tile_to_world(tile, 0.0)
    }

    /// Returns the classification of a tile.
    #[must_use]
    pub fn kind_at(&self, tile: TileCoord) -> TileKind {
        self.level.kind_at(tile)
    }

    /// Opens the door on a tile. Returns false if there is no closed door.
    ///
    /// Lock checks are the caller's business; this only flips state and makes
    /// the tile walkable and transparent.
    pub fn open_door(&mut self, tile: TileCoord) -> bool {
        let Some(idx) = self.geometry.door_index(tile) else {
            return false;
        };
        let door = &mut self.geometry.doors[idx];
        if door.open {
            return false;
        }
        door.open = true;
        door.locked = false;
        self.grid.set_walkable(tile, true);
        self.grid.set_opaque(tile, false);
        debug!("Opened door at ({}, {})", tile.x, tile.y);
        true
    }

    /// Marks a barrel destroyed and frees its tile.
    pub fn destroy_barrel(&mut self, index: usize) -> bool {
        let Some(barrel) = self.geometry.barrels.get_mut(index) else {
            return false;
        };
        if barrel.destroyed {
            return false;
        }
        barrel.destroyed = true;
        let tile = barrel.tile;
        self.grid.set_walkable(tile, true);
        true
    }
}

/// Outdoor terrain.
#[derive(Debug, Clone)]
pub struct Terrain {
    /// Height samples
    pub heightmap: Heightmap,
    /// World units per pixel on X/Z, white-pixel height on Y
    pub scale: Vec3,
}

impl Terrain {
    /// Floor height under a world position.
    #[must_use]
    pub fn height_at(&self, pos: Vec3) -> f32 {
        self.heightmap.height_at_world(pos, self.scale)
    }

    /// Returns true if the position lies over the heightmap.
    #[must_use]
    pub fn contains(&self, pos: Vec3) -> bool {
        let (w, d) = self.heightmap.world_extent(self.scale);
        pos.x >= 0.0 && pos.z >= 0.0 && pos.x <= w && pos.z <= d
    }
}

/// The world representation currently loaded.
#[derive(Debug, Clone, Default)]
pub enum Environment {
    /// Nothing loaded
    #[default]
    Empty,
    /// Tile-grid dungeon
    Dungeon(Box<Dungeon>),
    /// Heightmap terrain
    Outdoor(Terrain),
}

impl Environment {
    /// Returns the dungeon if one is loaded.
    #[must_use]
    pub fn dungeon(&self) -> Option<&Dungeon> {
        match self {
            Self::Dungeon(d) => Some(d.as_ref()),
            _ => None,
        }
    }

    /// Returns the dungeon mutably if one is loaded.
    pub fn dungeon_mut(&mut self) -> Option<&mut Dungeon> {
        match self {
            Self::Dungeon(d) => Some(d.as_mut()),
            _ => None,
        }
    }

    /// Floor height under a world position.
    #[must_use]
    pub fn floor_height(&self, pos: Vec3) -> f32 {
        match self {
            Self::Outdoor(t) => t.height_at(pos),
            Self::Dungeon(_) | Self::Empty => 0.0,
        }
    }

    /// Ceiling height, if the environment has one.
    #[must_use]
    pub fn ceiling_height(&self) -> Option<f32> {
        match self {
            Self::Dungeon(d) => Some(d.params.ceiling_height),
            Self::Outdoor(_) | Self::Empty => None,
        }
    }

    /// Returns true if an agent may stand at the position.
    ///
    /// Dungeons consult the tile grid; terrain only requires being on the map.
    #[must_use]
    pub fn is_walkable_at(&self, pos: Vec3) -> bool {
        match self {
            Self::Dungeon(d) => d.grid.is_walkable(d.world_to_tile(pos)),
            Self::Outdoor(t) => t.contains(pos),
            Self::Empty => false,
        }
    }

    /// Returns true if the position is on lava.
    #[must_use]
    pub fn is_lava_at(&self, pos: Vec3) -> bool {
        self.dungeon()
            .is_some_and(|d| d.kind_at(d.world_to_tile(pos)) == TileKind::Lava)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_door_updates_grid() {
        let mut dungeon = Dungeon::new(
            LevelImage::from_rows(&["#.#", "#K#", "#.#"]),
            GeometryParams::default(),
        );
        let tile = TileCoord::new(1, 1);
        assert!(!dungeon.grid.is_walkable(tile));
        assert!(dungeon.grid.blocks_sight(tile));
        assert!(dungeon.open_door(tile));
        assert!(dungeon.grid.is_walkable(tile));
        assert!(!dungeon.grid.blocks_sight(tile));
        assert!(!dungeon.open_door(tile));
        assert!(!dungeon.open_door(TileCoord::new(1, 0)));
    }

    #[test]
    fn test_dungeon_walkable_world() {
        let dungeon = Dungeon::new(LevelImage::from_rows(&["#.", ".~"]), GeometryParams::default());
        let floor = dungeon.tile_center(TileCoord::new(1, 0));
        let lava = dungeon.tile_center(TileCoord::new(1, 1));
        let env = Environment::Dungeon(Box::new(dungeon));
        assert!(env.is_walkable_at(floor));
        assert!(!env.is_walkable_at(lava));
        assert!(env.is_lava_at(lava));
        assert_eq!(env.ceiling_height(), Some(200.0));
    }

    #[test]
    fn test_outdoor_height() {
        let terrain = Terrain {
            heightmap: Heightmap::flat(8, 8, 0.5),
            scale: Vec3::new(10.0, 40.0, 10.0),
        };
        let env = Environment::Outdoor(terrain);
        assert!((env.floor_height(Vec3::new(20.0, 0.0, 20.0)) - 20.0).abs() < 0.001);
        assert!(env.is_walkable_at(Vec3::new(20.0, 0.0, 20.0)));
        assert!(!env.is_walkable_at(Vec3::new(-1.0, 0.0, 20.0)));
        assert!(env.ceiling_height().is_none());
    }
}
