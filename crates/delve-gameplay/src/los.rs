//! Line-of-sight oracles.
//!
//! Two independent tests with different policies:
//! - [`fan_line_of_sight`] marches a fan of parallel rays through the tile
//!   grid and tolerates a few grazing hits. Path smoothing and alert
//!   propagation use it.
//! - [`world_line_of_sight`] casts one 3D ray against wall runs and door
//!   colliders. Perception ([`LosMode::Ai`]) and lighting
//!   ([`LosMode::Lighting`]) use it.

use delve_common::TileCoord;
use delve_world::{DungeonGeometry, Environment, WalkableGrid};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

// ============================================================================
// Pixel-grid fan raycast
// ============================================================================

/// Shape of the ray fan used by [`fan_line_of_sight`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanConfig {
    /// Number of parallel rays, clamped to `3..=10`
    pub rays: u32,
    /// Total fan width in tiles
    pub spread: f32,
    /// The fan is blocked when more than this many rays are blocked.
    /// Clamped to `rays - 1` so a fully blocked fan always blocks.
    pub block_threshold: u32,
    /// Tile visits per ray before giving up (counts as blocked)
    pub max_steps: u32,
}

impl Default for FanConfig {
    fn default() -> Self {
        Self {
            rays: 5,
            spread: 0.4,
            block_threshold: 2,
            max_steps: 512,
        }
    }
}

impl FanConfig {
    /// Fan where any blocked ray blocks. Path smoothing uses this so that a
    /// shortcut never clips a wall corner.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            rays: 3,
            spread: 0.4,
            block_threshold: 0,
            max_steps: 512,
        }
    }

    fn ray_count(&self) -> u32 {
        self.rays.clamp(3, 10)
    }

    fn threshold(&self) -> u32 {
        self.block_threshold.min(self.ray_count() - 1)
    }
}

/// Returns true if a single ray from `from` to `to` (tile space) enters an
/// opaque tile.
///
/// Walks every tile the segment touches. When the segment passes exactly
/// through a tile corner both side tiles are checked. Running out of steps
/// counts as blocked.
#[must_use]
pub fn ray_blocked(grid: &WalkableGrid, from: Vec2, to: Vec2, max_steps: u32) -> bool {
    let mut cell = TileCoord::new(from.x.floor() as i32, from.y.floor() as i32);
    let end = TileCoord::new(to.x.floor() as i32, to.y.floor() as i32);
    let d = to - from;

    let step_x = axis_step(d.x);
    let step_y = axis_step(d.y);
    let delta_x = if d.x == 0.0 { f32::INFINITY } else { 1.0 / d.x.abs() };
    let delta_y = if d.y == 0.0 { f32::INFINITY } else { 1.0 / d.y.abs() };
    let mut t_x = first_crossing(from.x, d.x, cell.x);
    let mut t_y = first_crossing(from.y, d.y, cell.y);

    for _ in 0..max_steps {
        if grid.blocks_sight(cell) {
            return true;
        }
        if cell == end || (t_x > 1.0 && t_y > 1.0) {
            return false;
        }
        if t_x < t_y {
            cell.x += step_x;
            t_x += delta_x;
        } else if t_y < t_x {
            cell.y += step_y;
            t_y += delta_y;
        } else {
            if grid.blocks_sight(cell.offset(step_x, 0)) || grid.blocks_sight(cell.offset(0, step_y)) {
                return true;
            }
            cell = cell.offset(step_x, step_y);
            t_x += delta_x;
            t_y += delta_y;
        }
    }
    true
}

fn axis_step(d: f32) -> i32 {
    if d > 0.0 {
        1
    } else if d < 0.0 {
        -1
    } else {
        0
    }
}

/// Parametric distance (in multiples of the segment) to the first grid line.
fn first_crossing(origin: f32, d: f32, cell: i32) -> f32 {
    if d > 0.0 {
        (cell as f32 + 1.0 - origin) / d
    } else if d < 0.0 {
        (origin - cell as f32) / -d
    } else {
        f32::INFINITY
    }
}

/// Fan raycast between two tile-space points.
///
/// Returns true (clear) unless more than the threshold number of rays hit
/// a wall, locked door or light pedestal tile.
#[must_use]
pub fn fan_line_of_sight(grid: &WalkableGrid, from: Vec2, to: Vec2, cfg: &FanConfig) -> bool {
    let rays = cfg.ray_count();
    let dir = (to - from).normalize_or_zero();
    let perp = Vec2::new(-dir.y, dir.x);
    let half = cfg.spread * 0.5;

    let mut blocked = 0;
    for i in 0..rays {
        let offset = -half + cfg.spread * i as f32 / (rays - 1) as f32;
        let shift = perp * offset;
        if ray_blocked(grid, from + shift, to + shift, cfg.max_steps) {
            blocked += 1;
            if blocked > cfg.threshold() {
                return false;
            }
        }
    }
    true
}

/// Fan raycast between two tile centers.
#[must_use]
pub fn tile_line_of_sight(grid: &WalkableGrid, a: TileCoord, b: TileCoord, cfg: &FanConfig) -> bool {
    fan_line_of_sight(grid, tile_center(a), tile_center(b), cfg)
}

/// Tile-space center of a tile.
#[must_use]
pub fn tile_center(tile: TileCoord) -> Vec2 {
    Vec2::new(tile.x as f32 + 0.5, tile.y as f32 + 0.5)
}

// ============================================================================
// World-space raycast
// ============================================================================

/// Which colliders block the world raycast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LosMode {
    /// Closed door panels and jambs are opaque
    Ai,
    /// Door panels are ignored, jambs still block
    Lighting,
}

/// Casts a ray from `a` to `b` against wall runs and door colliders.
///
/// A hit only blocks if it is closer than `len * (1 - epsilon)`, so a
/// collider touching `b` does not block. The test is directional: a collider
/// touching `b` blocks `b -> a` because the reversed ray starts inside it.
#[must_use]
pub fn has_world_line_of_sight(
    geometry: &DungeonGeometry,
    a: Vec3,
    b: Vec3,
    mode: LosMode,
    epsilon: f32,
) -> bool {
    let delta = b - a;
    let len = delta.length();
    if len <= f32::EPSILON {
        return true;
    }
    let dir = delta / len;
    let limit = len - epsilon * len;
    let blocks = |aabb: &delve_common::Aabb| aabb.ray_intersection(a, dir).is_some_and(|t| t < limit);

    if geometry.walls.iter().any(|w| blocks(&w.aabb)) {
        return false;
    }
    for door in &geometry.doors {
        if door.jambs.iter().any(|j| blocks(j)) {
            return false;
        }
        if mode == LosMode::Ai && door.is_closed() && blocks(&door.panel) {
            return false;
        }
    }
    true
}

/// World-space line of sight in whatever environment is loaded.
///
/// Terrain has no static occluders, so outdoors this is always clear.
#[must_use]
pub fn world_line_of_sight(env: &Environment, a: Vec3, b: Vec3, mode: LosMode, epsilon: f32) -> bool {
    match env.dungeon() {
        Some(d) => has_world_line_of_sight(&d.geometry, a, b, mode, epsilon),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_world::{Dungeon, GeometryParams, LevelImage};

    fn grid(rows: &[&str]) -> WalkableGrid {
        WalkableGrid::build(&LevelImage::from_rows(rows))
    }

    #[test]
    fn test_clear_corridor() {
        let g = grid(&["......"]);
        assert!(tile_line_of_sight(&g, TileCoord::new(0, 0), TileCoord::new(5, 0), &FanConfig::default()));
    }

    #[test]
    fn test_wall_blocks() {
        let g = grid(&["..#..", "..#..", "..#.."]);
        assert!(!tile_line_of_sight(&g, TileCoord::new(0, 1), TileCoord::new(4, 1), &FanConfig::default()));
    }

    #[test]
    fn test_closed_door_is_transparent_to_fan_but_locked_is_not() {
        let g = grid(&["..D..", "..K.."]);
        let cfg = FanConfig::default();
        assert!(tile_line_of_sight(&g, TileCoord::new(0, 0), TileCoord::new(4, 0), &cfg));
        assert!(!tile_line_of_sight(&g, TileCoord::new(0, 1), TileCoord::new(4, 1), &cfg));
    }

    #[test]
    fn test_corner_graze_tolerated_by_fan_not_strict() {
        // The outermost ray clips the wall corner below the corridor.
        let g = grid(&[".....", "..#.."]);
        let from = Vec2::new(0.5, 0.85);
        let to = Vec2::new(4.5, 0.85);
        assert!(fan_line_of_sight(&g, from, to, &FanConfig::default()));
        assert!(!fan_line_of_sight(&g, from, to, &FanConfig::strict()));
    }

    #[test]
    fn test_out_of_bounds_blocks() {
        let g = grid(&["..."]);
        assert!(ray_blocked(&g, Vec2::new(0.5, 0.5), Vec2::new(0.5, 3.5), 64));
    }

    #[test]
    fn test_step_ceiling_blocks() {
        let g = grid(&["........"]);
        assert!(ray_blocked(&g, Vec2::new(0.5, 0.5), Vec2::new(7.5, 0.5), 3));
        assert!(!ray_blocked(&g, Vec2::new(0.5, 0.5), Vec2::new(7.5, 0.5), 16));
    }

    #[test]
    fn test_diagonal_corner_pass_checks_both_sides() {
        let g = grid(&["#.", ".."]);
        // Passes exactly through the shared corner of all four tiles.
        assert!(ray_blocked(&g, Vec2::new(1.5, 0.5), Vec2::new(0.5, 1.5), 16));
    }

    fn door_dungeon() -> Dungeon {
        Dungeon::new(
            LevelImage::from_rows(&["#.#", "#D#", "#.#"]),
            GeometryParams::default(),
        )
    }

    #[test]
    fn test_closed_door_ai_vs_lighting() {
        let dungeon = door_dungeon();
        let a = dungeon.tile_center(TileCoord::new(1, 0)) + Vec3::Y * 100.0;
        let b = dungeon.tile_center(TileCoord::new(1, 2)) + Vec3::Y * 100.0;
        let geo = &dungeon.geometry;
        assert!(!has_world_line_of_sight(geo, a, b, LosMode::Ai, 0.01));
        assert!(has_world_line_of_sight(geo, a, b, LosMode::Lighting, 0.01));
    }

    #[test]
    fn test_open_door_jambs_block_lighting() {
        let mut dungeon = door_dungeon();
        assert!(dungeon.open_door(TileCoord::new(1, 1)));
        let side = Vec3::new(40.0, 100.0, 0.0);
        let a = dungeon.tile_center(TileCoord::new(1, 0)) + side;
        let b = dungeon.tile_center(TileCoord::new(1, 2)) + side;
        let geo = &dungeon.geometry;
        assert!(!has_world_line_of_sight(geo, a, b, LosMode::Lighting, 0.01));
        assert!(!has_world_line_of_sight(geo, a, b, LosMode::Ai, 0.01));

        let center = Vec3::Y * 100.0;
        let a = dungeon.tile_center(TileCoord::new(1, 0)) + center;
        let b = dungeon.tile_center(TileCoord::new(1, 2)) + center;
        assert!(has_world_line_of_sight(geo, a, b, LosMode::Ai, 0.01));
    }

    #[test]
    fn test_directional_bias_at_touching_collider() {
        // b sits exactly on the face of the wall run, a is in open floor.
        let dungeon = Dungeon::new(LevelImage::from_rows(&["...#"]), GeometryParams::default());
        let wall = dungeon.geometry.walls[0].aabb;
        let b = Vec3::new(wall.max.x, 100.0, 50.0);
        let a = dungeon.tile_center(TileCoord::new(0, 0)) + Vec3::Y * 100.0;
        let geo = &dungeon.geometry;
        assert!(has_world_line_of_sight(geo, a, b, LosMode::Ai, 0.01));
        assert!(!has_world_line_of_sight(geo, b, a, LosMode::Ai, 0.01));
    }

    #[test]
    fn test_outdoor_always_clear() {
        let env = Environment::Empty;
        assert!(world_line_of_sight(&env, Vec3::ZERO, Vec3::X * 100.0, LosMode::Ai, 0.01));
    }
}
