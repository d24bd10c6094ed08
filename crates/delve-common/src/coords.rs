//! Coordinate types for dungeon tiles and the world-to-tile mapping.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Tile coordinate in the dungeon grid.
///
/// `(-1, -1)` is the invalid sentinel returned by exhausted searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    /// X coordinate (image column)
    pub x: i32,
    /// Y coordinate (image row)
    pub y: i32,
}

impl TileCoord {
    /// Sentinel for "no tile".
    pub const INVALID: Self = Self { x: -1, y: -1 };

    /// Neighbor offsets in search order: +x, -x, +y, -y.
    pub const NEIGHBOR_OFFSETS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

    /// Creates a new tile coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns true unless this is the invalid sentinel.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.x >= 0 && self.y >= 0
    }

    /// Returns the coordinate shifted by an offset.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Returns the four 4-connected neighbors in search order.
    #[must_use]
    pub fn neighbors4(self) -> [Self; 4] {
        Self::NEIGHBOR_OFFSETS.map(|(dx, dy)| self.offset(dx, dy))
    }

    /// Returns true if `other` shares an edge with this tile.
    #[must_use]
    pub fn is_adjacent4(self, other: Self) -> bool {
        (self.x - other.x).abs() + (self.y - other.y).abs() == 1
    }

    /// Manhattan distance between two tiles.
    #[must_use]
    pub fn manhattan(self, other: Self) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

impl From<(i32, i32)> for TileCoord {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

/// Affine mapping between world XZ positions and tile coordinates.
///
/// Both axes are flipped relative to the level image:
/// `tile_x = width - 1 - floor(world_x / tile_size)` and
/// `tile_y = height - 1 - floor(world_z / tile_size)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileMapping {
    /// Grid width in tiles
    pub width: u32,
    /// Grid height in tiles
    pub height: u32,
    /// World units per tile
    pub tile_size: f32,
}

impl TileMapping {
    /// Creates a mapping for a grid of the given size.
    #[must_use]
    pub const fn new(width: u32, height: u32, tile_size: f32) -> Self {
        Self {
            width,
            height,
            tile_size,
        }
    }

    /// Converts a world position to the tile it falls in.
    ///
    /// The result may lie outside the grid; callers check with [`Self::contains`].
    #[must_use]
    pub fn world_to_tile(&self, pos: Vec3) -> TileCoord {
        self.xz_to_tile(Vec2::new(pos.x, pos.z))
    }

    /// Converts an XZ pair to the tile it falls in.
    #[must_use]
    pub fn xz_to_tile(&self, xz: Vec2) -> TileCoord {
        let col = (xz.x / self.tile_size).floor() as i32;
        let row = (xz.y / self.tile_size).floor() as i32;
        TileCoord::new(self.width as i32 - 1 - col, self.height as i32 - 1 - row)
    }

    /// Returns the world-space center of a tile at the given floor height.
    #[must_use]
    pub fn tile_to_world(&self, tile: TileCoord, y: f32) -> Vec3 {
        let col = (self.width as i32 - 1 - tile.x) as f32;
        let row = (self.height as i32 - 1 - tile.y) as f32;
        Vec3::new(
            (col + 0.5) * self.tile_size,
            y,
            (row + 0.5) * self.tile_size,
        )
    }

    /// Converts a world position to continuous tile space, where tile
    /// `(x, y)` covers `[x, x + 1) x [y, y + 1)`.
    #[must_use]
    pub fn world_to_tile_space(&self, pos: Vec3) -> Vec2 {
        Vec2::new(
            self.width as f32 - pos.x / self.tile_size,
            self.height as f32 - pos.z / self.tile_size,
        )
    }

    /// Returns true if the tile lies inside the grid.
    #[must_use]
    pub fn contains(&self, tile: TileCoord) -> bool {
        tile.x >= 0 && tile.y >= 0 && (tile.x as u32) < self.width && (tile.y as u32) < self.height
    }
}

impl Default for TileMapping {
    fn default() -> Self {
        Self::new(0, 0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_tile_center_maps_back(w in 1u32..64, h in 1u32..64, fx in 0.0f32..1.0, fy in 0.0f32..1.0, size in 1.0f32..200.0) {
            let mapping = TileMapping::new(w, h, size);
            let tile = TileCoord::new((fx * w as f32) as i32 % w as i32, (fy * h as f32) as i32 % h as i32);
            let center = mapping.tile_to_world(tile, 0.0);
            prop_assert_eq!(mapping.world_to_tile(center), tile);
            prop_assert!(mapping.contains(tile));
        }
    }

    #[test]
    fn test_axis_flip() {
        let mapping = TileMapping::new(10, 10, 4.0);
        assert_eq!(mapping.world_to_tile(Vec3::new(0.5, 0.0, 0.5)), TileCoord::new(9, 9));
        assert_eq!(mapping.world_to_tile(Vec3::new(39.0, 0.0, 39.0)), TileCoord::new(0, 0));
    }

    #[test]
    fn test_negative_world_maps_outside() {
        let mapping = TileMapping::new(4, 4, 1.0);
        let tile = mapping.world_to_tile(Vec3::new(-0.5, 0.0, 1.5));
        assert_eq!(tile.x, 4);
        assert!(!mapping.contains(tile));
    }

    #[test]
    fn test_neighbor_order() {
        let n = TileCoord::new(2, 2).neighbors4();
        assert_eq!(n[0], TileCoord::new(3, 2));
        assert_eq!(n[1], TileCoord::new(1, 2));
        assert_eq!(n[2], TileCoord::new(2, 3));
        assert_eq!(n[3], TileCoord::new(2, 1));
    }

    #[test]
    fn test_invalid_sentinel() {
        assert!(!TileCoord::INVALID.is_valid());
        assert!(TileCoord::new(0, 0).is_valid());
    }
}
