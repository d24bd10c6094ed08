//! Level image color legend.
//!
//! Each pixel of a level image is classified into a [`TileKind`]. The legend is
//! the level file format, so the RGB values here must not change.

use serde::{Deserialize, Serialize};

/// An RGBA pixel.
pub type Rgba = [u8; 4];

/// Per-channel tolerance when matching a pixel against the legend.
///
/// Absorbs small shifts introduced by image editors and color management.
pub const COLOR_TOLERANCE: u8 = 8;

/// What a single level pixel represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    /// Fully transparent pixel, no floor
    Void,
    /// Plain walkable floor (any unlisted opaque color)
    Floor,
    /// Solid wall
    Wall,
    /// Destructible barrel
    Barrel,
    /// Light pedestal
    Light,
    /// Treasure chest
    Chest,
    /// Closed door
    Door,
    /// Locked door, needs a key
    LockedDoor,
    /// Lava floor
    Lava,
    /// Player spawn point
    PlayerSpawn,
    /// Pirate spawn point
    PirateSpawn,
    /// Spider spawn point
    SpiderSpawn,
    /// Skeleton spawn point
    SkeletonSpawn,
    /// Ghost spawn point
    GhostSpawn,
    /// Health potion pickup
    HealthPotion,
    /// Key pickup
    Key,
    /// Stone pillar
    Pillar,
    /// Spider web, walkable and destructible
    SpiderWeb,
}

/// Legend entries in match order.
const LEGEND: &[(TileKind, [u8; 3])] = &[
    (TileKind::Wall, [0, 0, 0]),
    (TileKind::Barrel, [0, 0, 255]),
    (TileKind::Light, [255, 255, 0]),
    (TileKind::Chest, [135, 206, 235]),
    (TileKind::Door, [128, 0, 128]),
    (TileKind::LockedDoor, [0, 255, 255]),
    (TileKind::Lava, [255, 0, 0]),
    (TileKind::PlayerSpawn, [0, 255, 0]),
    (TileKind::PirateSpawn, [255, 0, 255]),
    (TileKind::SpiderSpawn, [64, 64, 64]),
    (TileKind::HealthPotion, [255, 105, 180]),
    (TileKind::Key, [255, 215, 0]),
    (TileKind::Pillar, [128, 128, 128]),
    (TileKind::SpiderWeb, [192, 192, 192]),
    (TileKind::SkeletonSpawn, [255, 128, 0]),
    (TileKind::GhostSpawn, [128, 128, 255]),
];

impl TileKind {
    /// Classifies a pixel.
    ///
    /// Alpha 0 is always [`TileKind::Void`] regardless of RGB.
    #[must_use]
    pub fn classify(pixel: Rgba) -> Self {
        if pixel[3] == 0 {
            return Self::Void;
        }
        LEGEND
            .iter()
            .find(|(_, rgb)| {
                rgb.iter()
                    .zip(pixel.iter())
                    .all(|(a, b)| a.abs_diff(*b) <= COLOR_TOLERANCE)
            })
            .map_or(Self::Floor, |(kind, _)| *kind)
    }

    /// Canonical opaque color for this kind.
    #[must_use]
    pub fn color(self) -> Rgba {
        match self {
            Self::Void => [0, 0, 0, 0],
            Self::Floor => [255, 255, 255, 255],
            kind => LEGEND
                .iter()
                .find(|(k, _)| *k == kind)
                .map_or([255, 255, 255, 255], |(_, [r, g, b])| [*r, *g, *b, 255]),
        }
    }

    /// Returns true if agents cannot stand on this tile.
    #[must_use]
    pub const fn is_blocking(self) -> bool {
        matches!(
            self,
            Self::Void
                | Self::Wall
                | Self::Barrel
                | Self::Light
                | Self::Chest
                | Self::Door
                | Self::LockedDoor
                | Self::Lava
                | Self::Pillar
        )
    }

    /// Returns true if this tile stops the pixel-grid sight raycast.
    #[must_use]
    pub const fn blocks_sight(self) -> bool {
        matches!(self, Self::Wall | Self::LockedDoor | Self::Light)
    }

    /// ASCII glyph used by text layouts.
    #[must_use]
    pub const fn glyph(self) -> char {
        match self {
            Self::Void => ' ',
            Self::Floor => '.',
            Self::Wall => '#',
            Self::Barrel => 'B',
            Self::Light => 'L',
            Self::Chest => 'C',
            Self::Door => 'D',
            Self::LockedDoor => 'K',
            Self::Lava => '~',
            Self::PlayerSpawn => '@',
            Self::PirateSpawn => 'p',
            Self::SpiderSpawn => 's',
            Self::SkeletonSpawn => 'k',
            Self::GhostSpawn => 'g',
            Self::HealthPotion => 'h',
            Self::Key => '$',
            Self::Pillar => 'O',
            Self::SpiderWeb => 'w',
        }
    }

    /// Parses a text layout glyph. Unknown glyphs are floor.
    #[must_use]
    pub fn from_glyph(c: char) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.glyph() == c)
            .unwrap_or(Self::Floor)
    }

    /// Every kind, in declaration order.
    pub const ALL: [Self; 18] = [
        Self::Void,
        Self::Floor,
        Self::Wall,
        Self::Barrel,
        Self::Light,
        Self::Chest,
        Self::Door,
        Self::LockedDoor,
        Self::Lava,
        Self::PlayerSpawn,
        Self::PirateSpawn,
        Self::SpiderSpawn,
        Self::SkeletonSpawn,
        Self::GhostSpawn,
        Self::HealthPotion,
        Self::Key,
        Self::Pillar,
        Self::SpiderWeb,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legend_colors() {
        assert_eq!(TileKind::classify([0, 0, 0, 255]), TileKind::Wall);
        assert_eq!(TileKind::classify([0, 0, 255, 255]), TileKind::Barrel);
        assert_eq!(TileKind::classify([255, 255, 0, 255]), TileKind::Light);
        assert_eq!(TileKind::classify([135, 206, 235, 255]), TileKind::Chest);
        assert_eq!(TileKind::classify([128, 0, 128, 255]), TileKind::Door);
        assert_eq!(TileKind::classify([0, 255, 255, 255]), TileKind::LockedDoor);
        assert_eq!(TileKind::classify([255, 0, 0, 255]), TileKind::Lava);
        assert_eq!(TileKind::classify([0, 255, 0, 255]), TileKind::PlayerSpawn);
        assert_eq!(TileKind::classify([255, 0, 255, 255]), TileKind::PirateSpawn);
        assert_eq!(TileKind::classify([64, 64, 64, 255]), TileKind::SpiderSpawn);
        assert_eq!(TileKind::classify([255, 105, 180, 255]), TileKind::HealthPotion);
        assert_eq!(TileKind::classify([255, 215, 0, 255]), TileKind::Key);
    }

    #[test]
    fn test_walkability_per_kind() {
        let walkable = [
            TileKind::Floor,
            TileKind::PlayerSpawn,
            TileKind::PirateSpawn,
            TileKind::SpiderSpawn,
            TileKind::SkeletonSpawn,
            TileKind::GhostSpawn,
            TileKind::HealthPotion,
            TileKind::Key,
            TileKind::SpiderWeb,
        ];
        for kind in TileKind::ALL {
            assert_eq!(!kind.is_blocking(), walkable.contains(&kind), "{kind:?}");
        }
    }

    #[test]
    fn test_transparent_is_void() {
        assert_eq!(TileKind::classify([255, 255, 255, 0]), TileKind::Void);
        assert_eq!(TileKind::classify([0, 255, 0, 0]), TileKind::Void);
    }

    #[test]
    fn test_tolerance_and_fallback() {
        assert_eq!(TileKind::classify([4, 3, 250, 255]), TileKind::Barrel);
        assert_eq!(TileKind::classify([200, 180, 150, 255]), TileKind::Floor);
    }

    #[test]
    fn test_glyph_round_trip() {
        for kind in TileKind::ALL {
            assert_eq!(TileKind::from_glyph(kind.glyph()), kind);
            if kind != TileKind::Floor {
                assert_eq!(TileKind::classify(kind.color()), kind);
            }
        }
    }
}
