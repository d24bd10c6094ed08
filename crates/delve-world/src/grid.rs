//! Walkability grid derived from a level image.

use crate::level::LevelImage;
use delve_common::TileCoord;

/// Per-tile walkability and sight occlusion for the current level.
///
/// The grid is a cache over the level image. It is rebuilt wholesale when a
/// level loads; only door state changes touch individual tiles afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkableGrid {
    width: u32,
    height: u32,
    walkable: Vec<bool>,
    opaque: Vec<bool>,
}

impl WalkableGrid {
    /// Classifies every pixel of a level image.
    ///
    /// A zero-sized image yields an empty grid where every query is false.
    #[must_use]
    pub fn build(level: &LevelImage) -> Self {
        let count = level.width() as usize * level.height() as usize;
        let mut walkable = Vec::with_capacity(count);
        let mut opaque = Vec::with_capacity(count);
        for (_, kind) in level.tiles() {
            walkable.push(!kind.is_blocking());
            opaque.push(kind.blocks_sight());
        }
        Self {
            width: level.width(),
            height: level.height(),
            walkable,
            opaque,
        }
    }

    /// Creates a grid where every tile is walkable and transparent.
    #[must_use]
    pub fn open(width: u32, height: u32) -> Self {
        let count = width as usize * height as usize;
        Self {
            width,
            height,
            walkable: vec![true; count],
            opaque: vec![false; count],
        }
    }

    /// Returns the grid width.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Returns the grid height.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, tile: TileCoord) -> Option<usize> {
        if tile.x < 0 || tile.y < 0 || tile.x as u32 >= self.width || tile.y as u32 >= self.height {
            return None;
        }
        Some(tile.y as usize * self.width as usize + tile.x as usize)
    }

    /// Returns true if the tile is inside the grid.
    #[must_use]
    pub fn in_bounds(&self, tile: TileCoord) -> bool {
        self.index(tile).is_some()
    }

    /// Returns true if an agent can stand on the tile. Out of bounds is false.
    #[must_use]
    pub fn is_walkable(&self, tile: TileCoord) -> bool {
        self.index(tile)
            .and_then(|i| self.walkable.get(i).copied())
            .unwrap_or(false)
    }

    /// Returns true if the tile stops sight rays. Out of bounds is opaque.
    #[must_use]
    pub fn blocks_sight(&self, tile: TileCoord) -> bool {
        self.index(tile)
            .and_then(|i| self.opaque.get(i).copied())
            .unwrap_or(true)
    }

    /// Overrides walkability of one tile. Ignored out of bounds.
    pub fn set_walkable(&mut self, tile: TileCoord, walkable: bool) {
        if let Some(cell) = self.index(tile).and_then(|i| self.walkable.get_mut(i)) {
            *cell = walkable;
        }
    }

    /// Overrides sight occlusion of one tile. Ignored out of bounds.
    pub fn set_opaque(&mut self, tile: TileCoord, opaque: bool) {
        if let Some(cell) = self.index(tile).and_then(|i| self.opaque.get_mut(i)) {
            *cell = opaque;
        }
    }

    /// Counts walkable tiles.
    #[must_use]
    pub fn walkable_count(&self) -> usize {
        self.walkable.iter().filter(|w| **w).count()
    }

    /// Iterates all walkable tiles, row by row.
    pub fn walkable_tiles(&self) -> impl Iterator<Item = TileCoord> + '_ {
        let width = self.width.max(1) as usize;
        self.walkable
            .iter()
            .enumerate()
            .filter(|(_, w)| **w)
            .map(move |(i, _)| TileCoord::new((i % width) as i32, (i / width) as i32))
    }
}
