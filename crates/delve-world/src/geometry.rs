//! Static dungeon geometry generated from a level image.
//!
//! Every object here is created by [`DungeonGeometry::from_level`] and dropped
//! by [`DungeonGeometry::clear`]. Between the two only state flags change
//! (door open, barrel destroyed, chest open, web destroyed, pickup taken).

use crate::level::LevelImage;
use crate::palette::TileKind;
use delve_common::{Aabb, TileCoord, TileMapping};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// Parameters
// ============================================================================

/// Dimensions used to turn tiles into world-space geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryParams {
    /// World units per tile
    pub tile_size: f32,
    /// Height of wall runs
    pub wall_height: f32,
    /// Thickness of wall runs across their long axis
    pub wall_thickness: f32,
    /// Dungeon ceiling height
    pub ceiling_height: f32,
    /// Width of each door jamb
    pub door_jamb_width: f32,
    /// Thickness of a door panel
    pub door_panel_thickness: f32,
    /// Half extents of a barrel
    pub barrel_half_extents: Vec3,
    /// Half extents of a pillar
    pub pillar_half_extents: Vec3,
    /// Half extents of a chest
    pub chest_half_extents: Vec3,
    /// Half extents of a light pedestal
    pub pedestal_half_extents: Vec3,
    /// Half extents of a spider web
    pub web_half_extents: Vec3,
    /// Height of the flame above the floor
    pub light_height: f32,
}

impl Default for GeometryParams {
    fn default() -> Self {
        Self {
            tile_size: 100.0,
            wall_height: 200.0,
            wall_thickness: 100.0,
            ceiling_height: 200.0,
            door_jamb_width: 15.0,
            door_panel_thickness: 10.0,
            barrel_half_extents: Vec3::new(30.0, 45.0, 30.0),
            pillar_half_extents: Vec3::new(35.0, 100.0, 35.0),
            chest_half_extents: Vec3::new(40.0, 30.0, 30.0),
            pedestal_half_extents: Vec3::new(20.0, 40.0, 20.0),
            web_half_extents: Vec3::new(45.0, 50.0, 45.0),
            light_height: 120.0,
        }
    }
}

// ============================================================================
// Objects
// ============================================================================

/// A straight run of wall tiles collapsed into one box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallRun {
    /// First tile of the run
    pub start: TileCoord,
    /// Last tile of the run
    pub end: TileCoord,
    /// World-space bounds
    pub aabb: Aabb,
}

impl WallRun {
    /// Builds the box spanning two endpoint centers, widened by `thickness`
    /// on both horizontal axes and raised by `height` from the endpoints' floor.
    #[must_use]
    pub fn from_endpoints(
        start: TileCoord,
        end: TileCoord,
        a: Vec3,
        b: Vec3,
        thickness: f32,
        height: f32,
    ) -> Self {
        let half = thickness * 0.5;
        let pad = Vec3::new(half, 0.0, half);
        let floor = a.y.min(b.y);
        let mut min = a.min(b) - pad;
        let mut max = a.max(b) + pad;
        min.y = floor;
        max.y = floor + height;
        Self {
            start,
            end,
            aabb: Aabb { min, max },
        }
    }
}

/// Horizontal axis a door panel spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoorAxis {
    /// Panel spans world X, passage runs along Z
    X,
    /// Panel spans world Z, passage runs along X
    Z,
}

/// A door with its panel and the two jambs framing it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Door {
    /// Tile the door occupies
    pub tile: TileCoord,
    /// Floor-level center
    pub position: Vec3,
    /// Axis the panel spans
    pub axis: DoorAxis,
    /// Whether the door is open
    pub open: bool,
    /// Whether the door needs a key
    pub locked: bool,
    /// Door body collider
    pub panel: Aabb,
    /// Side jamb colliders
    pub jambs: [Aabb; 2],
}

impl Door {
    fn new(tile: TileCoord, position: Vec3, axis: DoorAxis, locked: bool, p: &GeometryParams) -> Self {
        let half_tile = p.tile_size * 0.5;
        let half_h = p.wall_height * 0.5;
        let jamb_half = p.door_jamb_width * 0.5;
        let center = position + Vec3::Y * half_h;

        let (panel_half, jamb_half_ext, along) = match axis {
            DoorAxis::X => (
                Vec3::new(half_tile - p.door_jamb_width, half_h, p.door_panel_thickness * 0.5),
                Vec3::new(jamb_half, half_h, half_tile),
                Vec3::X,
            ),
            DoorAxis::Z => (
                Vec3::new(p.door_panel_thickness * 0.5, half_h, half_tile - p.door_jamb_width),
                Vec3::new(half_tile, half_h, jamb_half),
                Vec3::Z,
            ),
        };
        let offset = along * (half_tile - jamb_half);

        Self {
            tile,
            position,
            axis,
            open: false,
            locked,
            panel: Aabb::from_center(center, panel_half),
            jambs: [
                Aabb::from_center(center - offset, jamb_half_ext),
                Aabb::from_center(center + offset, jamb_half_ext),
            ],
        }
    }

    /// Returns true if the panel currently blocks passage.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        !self.open
    }
}

/// A destructible barrel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Barrel {
    /// Tile the barrel stands on
    pub tile: TileCoord,
    /// Floor-level center
    pub position: Vec3,
    /// Collider
    pub aabb: Aabb,
    /// Whether the barrel was smashed
    pub destroyed: bool,
}

/// A solid pillar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pillar {
    /// Tile the pillar stands on
    pub tile: TileCoord,
    /// Floor-level center
    pub position: Vec3,
    /// Collider
    pub aabb: Aabb,
}

/// A treasure chest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chest {
    /// Tile the chest stands on
    pub tile: TileCoord,
    /// Floor-level center
    pub position: Vec3,
    /// Collider
    pub aabb: Aabb,
    /// Whether the chest was opened
    pub open: bool,
}

/// A spider web. Walkable, stops bullets, cut by melee.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpiderWeb {
    /// Tile the web hangs in
    pub tile: TileCoord,
    /// Floor-level center
    pub position: Vec3,
    /// Collider
    pub aabb: Aabb,
    /// Whether the web was cut
    pub destroyed: bool,
}

/// A light on a pedestal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSource {
    /// Tile of the pedestal
    pub tile: TileCoord,
    /// Flame position
    pub position: Vec3,
    /// Pedestal collider
    pub pedestal: Aabb,
}

/// Kinds of collectible items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PickupKind {
    /// Restores player health
    HealthPotion,
    /// Opens one locked door
    Key,
}

/// A collectible item lying on the floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pickup {
    /// Tile the item lies on
    pub tile: TileCoord,
    /// Floor-level center
    pub position: Vec3,
    /// Item kind
    pub kind: PickupKind,
    /// Whether the item was collected
    pub taken: bool,
}

/// What a spawn marker spawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpawnKind {
    /// The player
    Player,
    /// A pirate
    Pirate,
    /// A spider
    Spider,
    /// A skeleton
    Skeleton,
    /// A ghost
    Ghost,
}

/// A spawn marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPoint {
    /// Marker tile
    pub tile: TileCoord,
    /// Floor-level center
    pub position: Vec3,
    /// What spawns here
    pub kind: SpawnKind,
}

/// Reference to a static collider owned by [`DungeonGeometry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaticRef {
    /// Wall run index
    Wall(usize),
    /// Door panel, by door index
    DoorPanel(usize),
    /// Door jamb, by door index and side
    DoorJamb(usize, usize),
    /// Barrel index
    Barrel(usize),
    /// Pillar index
    Pillar(usize),
    /// Chest index
    Chest(usize),
    /// Light pedestal index
    Light(usize),
    /// Spider web index
    Web(usize),
}

// ============================================================================
// Geometry set
// ============================================================================

/// All static geometry of one dungeon level.
#[derive(Debug, Clone, Default)]
pub struct DungeonGeometry {
    /// Merged wall runs
    pub walls: Vec<WallRun>,
    /// Doors
    pub doors: Vec<Door>,
    /// Barrels
    pub barrels: Vec<Barrel>,
    /// Pillars
    pub pillars: Vec<Pillar>,
    /// Chests
    pub chests: Vec<Chest>,
    /// Spider webs
    pub webs: Vec<SpiderWeb>,
    /// Light sources
    pub lights: Vec<LightSource>,
    /// Pickups
    pub pickups: Vec<Pickup>,
    /// Lava tiles
    pub lava: Vec<TileCoord>,
    /// Spawn markers
    pub spawns: Vec<SpawnPoint>,
}

impl DungeonGeometry {
    /// Generates geometry for every pixel of a level.
    #[must_use]
    pub fn from_level(level: &LevelImage, mapping: &TileMapping, params: &GeometryParams) -> Self {
        let mut geo = Self {
            walls: build_wall_runs(level, mapping, params),
            ..Self::default()
        };

        for (tile, kind) in level.tiles() {
            let position = mapping.tile_to_world(tile, 0.0);
            let raised = |half: Vec3| Aabb::from_center(position + Vec3::Y * half.y, half);
            match kind {
                TileKind::Door | TileKind::LockedDoor => {
                    let axis = door_axis(level, tile);
                    geo.doors.push(Door::new(
                        tile,
                        position,
                        axis,
                        kind == TileKind::LockedDoor,
                        params,
                    ));
                }
                TileKind::Barrel => geo.barrels.push(Barrel {
                    tile,
                    position,
                    aabb: raised(params.barrel_half_extents),
                    destroyed: false,
                }),
                TileKind::Pillar => geo.pillars.push(Pillar {
                    tile,
                    position,
                    aabb: raised(params.pillar_half_extents),
                }),
                TileKind::Chest => geo.chests.push(Chest {
                    tile,
                    position,
                    aabb: raised(params.chest_half_extents),
                    open: false,
                }),
                TileKind::SpiderWeb => geo.webs.push(SpiderWeb {
                    tile,
                    position,
                    aabb: raised(params.web_half_extents),
                    destroyed: false,
                }),
                TileKind::Light => geo.lights.push(LightSource {
                    tile,
                    position: position + Vec3::Y * params.light_height,
                    pedestal: raised(params.pedestal_half_extents),
                }),
                TileKind::HealthPotion => geo.pickups.push(Pickup {
                    tile,
                    position,
                    kind: PickupKind::HealthPotion,
                    taken: false,
                }),
                TileKind::Key => geo.pickups.push(Pickup {
                    tile,
                    position,
                    kind: PickupKind::Key,
                    taken: false,
                }),
                TileKind::Lava => geo.lava.push(tile),
                TileKind::PlayerSpawn => geo.push_spawn(tile, position, SpawnKind::Player),
                TileKind::PirateSpawn => geo.push_spawn(tile, position, SpawnKind::Pirate),
                TileKind::SpiderSpawn => geo.push_spawn(tile, position, SpawnKind::Spider),
                TileKind::SkeletonSpawn => geo.push_spawn(tile, position, SpawnKind::Skeleton),
                TileKind::GhostSpawn => geo.push_spawn(tile, position, SpawnKind::Ghost),
                TileKind::Void | TileKind::Floor | TileKind::Wall => {}
            }
        }

        debug!(
            "Generated geometry: {} wall runs, {} doors, {} barrels, {} lights, {} spawns",
            geo.walls.len(),
            geo.doors.len(),
            geo.barrels.len(),
            geo.lights.len(),
            geo.spawns.len()
        );
        geo
    }

    fn push_spawn(&mut self, tile: TileCoord, position: Vec3, kind: SpawnKind) {
        self.spawns.push(SpawnPoint {
            tile,
            position,
            kind,
        });
    }

    /// Drops every object.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Returns the first player spawn marker.
    #[must_use]
    pub fn player_spawn(&self) -> Option<&SpawnPoint> {
        self.spawns.iter().find(|s| s.kind == SpawnKind::Player)
    }

    /// Returns the index of the door on a tile.
    #[must_use]
    pub fn door_index(&self, tile: TileCoord) -> Option<usize> {
        self.doors.iter().position(|d| d.tile == tile)
    }

    /// Returns the bounds of a static collider.
    #[must_use]
    pub fn aabb(&self, r: StaticRef) -> Option<Aabb> {
        match r {
            StaticRef::Wall(i) => self.walls.get(i).map(|w| w.aabb),
            StaticRef::DoorPanel(i) => self.doors.get(i).map(|d| d.panel),
            StaticRef::DoorJamb(i, side) => self.doors.get(i).and_then(|d| d.jambs.get(side).copied()),
            StaticRef::Barrel(i) => self.barrels.get(i).map(|b| b.aabb),
            StaticRef::Pillar(i) => self.pillars.get(i).map(|p| p.aabb),
            StaticRef::Chest(i) => self.chests.get(i).map(|c| c.aabb),
            StaticRef::Light(i) => self.lights.get(i).map(|l| l.pedestal),
            StaticRef::Web(i) => self.webs.get(i).map(|w| w.aabb),
        }
    }

    /// Colliders that block movement: walls, closed door panels, jambs,
    /// intact barrels, pillars, chests, and light pedestals.
    pub fn solid_colliders(&self) -> impl Iterator<Item = (StaticRef, Aabb)> + '_ {
        let walls = self
            .walls
            .iter()
            .enumerate()
            .map(|(i, w)| (StaticRef::Wall(i), w.aabb));
        let doors = self.doors.iter().enumerate().flat_map(|(i, d)| {
            let panel = d.is_closed().then_some((StaticRef::DoorPanel(i), d.panel));
            panel.into_iter().chain([
                (StaticRef::DoorJamb(i, 0), d.jambs[0]),
                (StaticRef::DoorJamb(i, 1), d.jambs[1]),
            ])
        });
        let barrels = self
            .barrels
            .iter()
            .enumerate()
            .filter(|(_, b)| !b.destroyed)
            .map(|(i, b)| (StaticRef::Barrel(i), b.aabb));
        let pillars = self
            .pillars
            .iter()
            .enumerate()
            .map(|(i, p)| (StaticRef::Pillar(i), p.aabb));
        let chests = self
            .chests
            .iter()
            .enumerate()
            .map(|(i, c)| (StaticRef::Chest(i), c.aabb));
        let lights = self
            .lights
            .iter()
            .enumerate()
            .map(|(i, l)| (StaticRef::Light(i), l.pedestal));

        walls
            .chain(doors)
            .chain(barrels)
            .chain(pillars)
            .chain(chests)
            .chain(lights)
    }

    /// Colliders that stop bullets: every solid collider plus intact webs.
    pub fn bullet_colliders(&self) -> impl Iterator<Item = (StaticRef, Aabb)> + '_ {
        let webs = self
            .webs
            .iter()
            .enumerate()
            .filter(|(_, w)| !w.destroyed)
            .map(|(i, w)| (StaticRef::Web(i), w.aabb));
        self.solid_colliders().chain(webs)
    }
}

/// Doors span toward their wall neighbors; a door with walls at `x +- 1`
/// spans X, anything else spans Z.
fn door_axis(level: &LevelImage, tile: TileCoord) -> DoorAxis {
    let is_wall = |t: TileCoord| level.kind_at(t) == TileKind::Wall;
    if is_wall(tile.offset(1, 0)) || is_wall(tile.offset(-1, 0)) {
        DoorAxis::X
    } else {
        DoorAxis::Z
    }
}

/// Merges wall pixels into runs.
///
/// Each row is scanned for horizontal runs of two or more walls. Walls left
/// over as singles are then merged down their column.
fn build_wall_runs(level: &LevelImage, mapping: &TileMapping, params: &GeometryParams) -> Vec<WallRun> {
    let width = level.width() as i32;
    let height = level.height() as i32;
    let is_wall = |x: i32, y: i32| level.kind_at(TileCoord::new(x, y)) == TileKind::Wall;
    let make = |a: TileCoord, b: TileCoord| {
        WallRun::from_endpoints(
            a,
            b,
            mapping.tile_to_world(a, 0.0),
            mapping.tile_to_world(b, 0.0),
            params.wall_thickness,
            params.wall_height,
        )
    };

    let mut runs = Vec::new();
    let mut single = vec![false; (width.max(0) * height.max(0)) as usize];

    for y in 0..height {
        let mut x = 0;
        while x < width {
            if !is_wall(x, y) {
                x += 1;
                continue;
            }
            let start = x;
            while x + 1 < width && is_wall(x + 1, y) {
                x += 1;
            }
            if x > start {
                runs.push(make(TileCoord::new(start, y), TileCoord::new(x, y)));
            } else {
                single[(y * width + x) as usize] = true;
            }
            x += 1;
        }
    }

    for x in 0..width {
        let mut y = 0;
        while y < height {
            if !single[(y * width + x) as usize] {
                y += 1;
                continue;
            }
            let start = y;
            while y + 1 < height && single[((y + 1) * width + x) as usize] {
                y += 1;
            }
            runs.push(make(TileCoord::new(x, start), TileCoord::new(x, y)));
            y += 1;
        }
    }

    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(rows: &[&str]) -> (LevelImage, TileMapping, DungeonGeometry) {
        let level = LevelImage::from_rows(rows);
        let mapping = TileMapping::new(level.width(), level.height(), 100.0);
        let geo = DungeonGeometry::from_level(&level, &mapping, &GeometryParams::default());
        (level, mapping, geo)
    }

    #[test]
    fn test_wall_runs_merge() {
        let (_, _, geo) = build(&["####", "#..#", "#..#", "####"]);
        // Two horizontal runs for top/bottom, two vertical runs of singles.
        assert_eq!(geo.walls.len(), 4);
        let total_tiles: i32 = geo
            .walls
            .iter()
            .map(|w| w.start.manhattan(w.end) + 1)
            .sum();
        assert_eq!(total_tiles, 12);
    }

    #[test]
    fn test_wall_run_covers_tiles() {
        let (_, mapping, geo) = build(&["###"]);
        assert_eq!(geo.walls.len(), 1);
        let aabb = geo.walls[0].aabb;
        for x in 0..3 {
            let center = mapping.tile_to_world(TileCoord::new(x, 0), 50.0);
            assert!(aabb.contains(center));
        }
        assert!((aabb.max.y - 200.0).abs() < 0.001);
        assert!((aabb.max.x - aabb.min.x - 300.0).abs() < 0.001);
    }

    #[test]
    fn test_door_axis_and_jambs() {
        let (_, _, geo) = build(&["#.#", "#D#", "#.#"]);
        assert_eq!(geo.doors.len(), 1);
        let door = geo.doors[0];
        assert_eq!(door.axis, DoorAxis::X);
        assert!(door.is_closed());
        assert!(!door.locked);
        let center = door.position + Vec3::Y * 100.0;
        assert!(door.panel.contains(center));
        assert!(!door.jambs[0].contains(center));
        assert!(!door.jambs[1].contains(center));
        assert!(!door.panel.intersects(&door.jambs[0].expanded(-0.01)));
    }

    #[test]
    fn test_door_axis_z() {
        let (_, _, geo) = build(&["###", ".K.", "###"]);
        assert_eq!(geo.doors[0].axis, DoorAxis::Z);
        assert!(geo.doors[0].locked);
    }

    #[test]
    fn test_objects_and_spawns() {
        let (_, _, geo) = build(&["@BO", "Cwh", "$~L", "psk", "g.."]);
        assert_eq!(geo.barrels.len(), 1);
        assert_eq!(geo.pillars.len(), 1);
        assert_eq!(geo.chests.len(), 1);
        assert_eq!(geo.webs.len(), 1);
        assert_eq!(geo.pickups.len(), 2);
        assert_eq!(geo.lava.len(), 1);
        assert_eq!(geo.lights.len(), 1);
        assert_eq!(geo.spawns.len(), 5);
        assert_eq!(
            geo.player_spawn().map(|s| s.tile),
            Some(TileCoord::new(0, 0))
        );
    }

    #[test]
    fn test_open_door_drops_panel_collider() {
        let (_, _, mut geo) = build(&["#.#", "#D#", "#.#"]);
        let closed = geo.solid_colliders().count();
        geo.doors[0].open = true;
        assert_eq!(geo.solid_colliders().count(), closed - 1);
    }

    #[test]
    fn test_clear() {
        let (_, _, mut geo) = build(&["#B#"]);
        geo.clear();
        assert!(geo.walls.is_empty());
        assert!(geo.barrels.is_empty());
        assert_eq!(geo.solid_colliders().count(), 0);
    }
}
