//! # Delve World
//!
//! World model for Delve.
//!
//! This crate handles:
//! - Decoding color-coded level images
//! - Tile classification and the walkable grid
//! - Wall runs, doors, props and spawn markers
//! - Heightmap terrain for outdoor levels

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod environment;
pub mod geometry;
pub mod grid;
pub mod heightmap;
pub mod level;
pub mod palette;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::environment::*;
    pub use crate::geometry::*;
    pub use crate::grid::*;
    pub use crate::heightmap::*;
    pub use crate::level::*;
    pub use crate::palette::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use delve_common::TileCoord;
    use proptest::prelude::*;

    #[test]
    fn test_level_to_grid() {
        let level = LevelImage::from_rows(&["#####", "#@.B#", "#####"]);
        let grid = WalkableGrid::build(&level);
        assert!(grid.is_walkable(TileCoord::new(1, 1)));
        assert!(grid.is_walkable(TileCoord::new(2, 1)));
        assert!(!grid.is_walkable(TileCoord::new(3, 1)));
    }

    proptest! {
        #[test]
        fn prop_walkable_matches_classification(r in any::<u8>(), g in any::<u8>(), b in any::<u8>(), a in any::<u8>()) {
            let level = LevelImage::from_rgba(1, 1, &[r, g, b, a]).expect("1x1 level");
            let grid = WalkableGrid::build(&level);
            let kind = TileKind::classify([r, g, b, a]);
            prop_assert_eq!(grid.is_walkable(TileCoord::new(0, 0)), !kind.is_blocking());
            if a == 0 {
                prop_assert!(!grid.is_walkable(TileCoord::new(0, 0)));
            }
        }
    }
}
