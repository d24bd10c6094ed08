//! Grid pathfinding and path smoothing.
//!
//! Breadth-first search over 4-connected walkable tiles. Neighbors expand in
//! the fixed order +x, -x, +y, -y and the frontier is FIFO, so the returned
//! path is deterministic. "No route" is an empty path, never an error.

use crate::los::{tile_line_of_sight, FanConfig};
use ahash::AHashMap;
use delve_common::{TileCoord, TileMapping};
use delve_world::WalkableGrid;
use glam::Vec3;
use std::collections::VecDeque;

/// Tiles a single search may expand before giving up.
pub const MAX_SEARCH_EXPANSIONS: usize = 1 << 16;

/// Finds a shortest 4-connected path from `start` to `goal`, both inclusive.
///
/// Returns an empty path when either end is unwalkable or the goal is
/// unreachable, and `[start]` when `start == goal`. The search expands at
/// most [`MAX_SEARCH_EXPANSIONS`] tiles.
#[must_use]
pub fn find_path(grid: &WalkableGrid, start: TileCoord, goal: TileCoord) -> Vec<TileCoord> {
    find_path_bounded(grid, start, goal, MAX_SEARCH_EXPANSIONS)
}

/// [`find_path`] with an explicit expansion ceiling. A search that runs out
/// of expansions reports no route.
#[must_use]
pub fn find_path_bounded(grid: &WalkableGrid, start: TileCoord, goal: TileCoord, max_expansions: usize) -> Vec<TileCoord> {
    if !grid.is_walkable(start) || !grid.is_walkable(goal) {
        return Vec::new();
    }
    if start == goal {
        return vec![start];
    }

    let mut parent: AHashMap<TileCoord, TileCoord> = AHashMap::new();
    let mut frontier = VecDeque::new();
    parent.insert(start, start);
    frontier.push_back(start);

    let mut expanded = 0;
    while let Some(current) = frontier.pop_front() {
        if current == goal {
            return reconstruct(&parent, start, goal);
        }
        if expanded == max_expansions {
            break;
        }
        expanded += 1;
        for next in current.neighbors4() {
            if grid.is_walkable(next) && !parent.contains_key(&next) {
                parent.insert(next, current);
                frontier.push_back(next);
            }
        }
    }

    Vec::new()
}

fn reconstruct(parent: &AHashMap<TileCoord, TileCoord>, start: TileCoord, goal: TileCoord) -> Vec<TileCoord> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        match parent.get(&current) {
            Some(prev) => {
                current = *prev;
                path.push(current);
            }
            None => return Vec::new(),
        }
    }
    path.reverse();
    path
}

/// Greedy farthest-visible shortcutting.
///
/// From each anchor, jumps to the farthest later point `clear` accepts;
/// if none beyond the next one is clear, advances one step. Smoothing an
/// already smoothed path returns it unchanged.
#[must_use]
pub fn smooth_path<F>(path: &[TileCoord], mut clear: F) -> Vec<TileCoord>
where
    F: FnMut(TileCoord, TileCoord) -> bool,
{
    if path.len() <= 2 {
        return path.to_vec();
    }

    let mut smoothed = vec![path[0]];
    let mut anchor = 0;
    while anchor < path.len() - 1 {
        let next = (anchor + 2..path.len())
            .rev()
            .find(|&j| clear(path[anchor], path[j]))
            .unwrap_or(anchor + 1);
        smoothed.push(path[next]);
        anchor = next;
    }
    smoothed
}

/// Smooths a tile path using the strict fan raycast between tile centers.
#[must_use]
pub fn smooth_tile_path(grid: &WalkableGrid, path: &[TileCoord]) -> Vec<TileCoord> {
    let cfg = FanConfig::strict();
    smooth_path(path, |a, b| tile_line_of_sight(grid, a, b, &cfg))
}

/// Searches outward from `target` for a walkable tile reachable from `from`.
///
/// Rings of growing Chebyshev radius are scanned row by row. Each candidate
/// tile costs one attempt; when `max_attempts` run out the invalid tile
/// `(-1, -1)` is returned.
#[must_use]
pub fn reachable_tile_near(
    grid: &WalkableGrid,
    from: TileCoord,
    target: TileCoord,
    max_attempts: u32,
) -> TileCoord {
    let mut attempts = 0;
    let max_radius = grid.width().max(grid.height()) as i32;
    for radius in 0..=max_radius {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx.abs() != radius && dy.abs() != radius {
                    continue;
                }
                if attempts >= max_attempts {
                    return TileCoord::INVALID;
                }
                attempts += 1;
                let tile = target.offset(dx, dy);
                if grid.is_walkable(tile) && !find_path(grid, from, tile).is_empty() {
                    return tile;
                }
            }
        }
    }
    TileCoord::INVALID
}

// ============================================================================
// Agent path following
// ============================================================================

/// World-space waypoints an agent is following.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaypointPath {
    waypoints: VecDeque<Vec3>,
    goal: Option<TileCoord>,
}

impl WaypointPath {
    /// Builds waypoints from a tile path, skipping the first tile (the
    /// agent's own).
    #[must_use]
    pub fn from_tiles(tiles: &[TileCoord], mapping: &TileMapping, y: f32) -> Self {
        Self {
            waypoints: tiles
                .iter()
                .skip(1)
                .map(|t| mapping.tile_to_world(*t, y))
                .collect(),
            goal: tiles.last().copied(),
        }
    }

    /// Returns the next waypoint.
    #[must_use]
    pub fn next(&self) -> Option<Vec3> {
        self.waypoints.front().copied()
    }

    /// Returns the goal tile the path was planned to.
    #[must_use]
    pub const fn goal(&self) -> Option<TileCoord> {
        self.goal
    }

    /// Returns true if no waypoints remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Remaining waypoint count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Pops the next waypoint if `pos` is within `radius` of it on XZ.
    pub fn advance(&mut self, pos: Vec3, radius: f32) -> bool {
        let Some(next) = self.next() else {
            return false;
        };
        let dx = next.x - pos.x;
        let dz = next.z - pos.z;
        if dx * dx + dz * dz <= radius * radius {
            self.waypoints.pop_front();
            true
        } else {
            false
        }
    }

    /// Drops all waypoints.
    pub fn clear(&mut self) {
        self.waypoints.clear();
        self.goal = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_world::LevelImage;
    use proptest::prelude::*;

    fn grid(rows: &[&str]) -> WalkableGrid {
        WalkableGrid::build(&LevelImage::from_rows(rows))
    }

    #[test]
    fn test_open_5x5_path_length() {
        let g = WalkableGrid::open(5, 5);
        let path = find_path(&g, TileCoord::new(0, 0), TileCoord::new(4, 4));
        assert_eq!(path.len(), 9);
        assert_eq!(path[0], TileCoord::new(0, 0));
        assert_eq!(path[8], TileCoord::new(4, 4));
        // +x expands first, so the path runs along x before y.
        assert_eq!(path[1], TileCoord::new(1, 0));
    }

    #[test]
    fn test_search_stops_at_expansion_ceiling() {
        let g = WalkableGrid::open(40, 1);
        let (start, goal) = (TileCoord::new(0, 0), TileCoord::new(39, 0));
        assert!(find_path_bounded(&g, start, goal, 10).is_empty());
        assert_eq!(find_path_bounded(&g, start, goal, 39).len(), 40);
        assert_eq!(find_path(&g, start, goal).len(), 40);
    }

    #[test]
    fn test_start_equals_goal() {
        let g = WalkableGrid::open(3, 3);
        let t = TileCoord::new(1, 1);
        assert_eq!(find_path(&g, t, t), vec![t]);
    }

    #[test]
    fn test_unreachable_is_empty() {
        let g = grid(&["..#..", "..#..", "..#.."]);
        assert!(find_path(&g, TileCoord::new(0, 0), TileCoord::new(4, 2)).is_empty());
        assert!(find_path(&g, TileCoord::new(0, 0), TileCoord::new(2, 0)).is_empty());
        assert!(find_path(&g, TileCoord::new(-1, 0), TileCoord::new(0, 0)).is_empty());
    }

    #[test]
    fn test_path_around_wall() {
        let g = grid(&["...", ".#.", "..."]);
        let path = find_path(&g, TileCoord::new(0, 1), TileCoord::new(2, 1));
        assert_eq!(path.len(), 5);
        assert!(path.windows(2).all(|w| w[0].is_adjacent4(w[1])));
    }

    #[test]
    fn test_smoothing_collapses_open_room() {
        let g = WalkableGrid::open(6, 6);
        let path = find_path(&g, TileCoord::new(0, 0), TileCoord::new(5, 5));
        let smoothed = smooth_tile_path(&g, &path);
        assert_eq!(smoothed, vec![TileCoord::new(0, 0), TileCoord::new(5, 5)]);
    }

    #[test]
    fn test_smoothing_respects_walls() {
        let g = grid(&["....", "###.", "....", ".###", "...."]);
        let path = find_path(&g, TileCoord::new(0, 0), TileCoord::new(0, 4));
        let smoothed = smooth_tile_path(&g, &path);
        assert!(smoothed.len() > 2);
        let cfg = FanConfig::strict();
        assert!(smoothed
            .windows(2)
            .all(|w| tile_line_of_sight(&g, w[0], w[1], &cfg) || w[0].is_adjacent4(w[1])));
    }

    #[test]
    fn test_reachable_tile_near() {
        let g = grid(&["...#.", "...#.", "...#."]);
        let from = TileCoord::new(0, 0);
        assert_eq!(reachable_tile_near(&g, from, TileCoord::new(1, 1), 50), TileCoord::new(1, 1));
        // (4, 1) is walled off; nearest reachable is in column 2.
        let near = reachable_tile_near(&g, from, TileCoord::new(4, 1), 50);
        assert!(near.is_valid());
        assert_eq!(near.x, 2);
        assert_eq!(reachable_tile_near(&g, from, TileCoord::new(4, 1), 2), TileCoord::INVALID);
    }

    #[test]
    fn test_waypoint_path() {
        let mapping = TileMapping::new(4, 1, 10.0);
        let tiles = [TileCoord::new(0, 0), TileCoord::new(1, 0), TileCoord::new(2, 0)];
        let mut path = WaypointPath::from_tiles(&tiles, &mapping, 0.0);
        assert_eq!(path.len(), 2);
        assert_eq!(path.goal(), Some(TileCoord::new(2, 0)));
        let first = path.next().expect("waypoint");
        assert!(!path.advance(first + Vec3::X * 5.0, 1.0));
        assert!(path.advance(first, 1.0));
        assert_eq!(path.len(), 1);
    }

    fn arb_grid() -> impl Strategy<Value = (WalkableGrid, TileCoord, TileCoord)> {
        (3u32..10, 3u32..10).prop_flat_map(|(w, h)| {
            (
                proptest::collection::vec(prop::bool::weighted(0.75), (w * h) as usize),
                0..w as i32,
                0..h as i32,
                0..w as i32,
                0..h as i32,
            )
                .prop_map(move |(cells, sx, sy, gx, gy)| {
                    let rows: Vec<String> = cells
                        .chunks(w as usize)
                        .map(|row| row.iter().map(|&c| if c { '.' } else { '#' }).collect())
                        .collect();
                    let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
                    let grid = WalkableGrid::build(&LevelImage::from_rows(&refs));
                    (grid, TileCoord::new(sx, sy), TileCoord::new(gx, gy))
                })
        })
    }

    proptest! {
        #[test]
        fn prop_path_is_adjacent_and_walkable((g, start, goal) in arb_grid()) {
            let path = find_path(&g, start, goal);
            if let (Some(first), Some(last)) = (path.first(), path.last()) {
                prop_assert_eq!(*first, start);
                prop_assert_eq!(*last, goal);
                prop_assert!(path.iter().all(|t| g.is_walkable(*t)));
                prop_assert!(path.windows(2).all(|w| w[0].is_adjacent4(w[1])));
                prop_assert!(path.len() as i32 - 1 >= start.manhattan(goal));
            } else {
                // Empty means no route: the reverse search agrees.
                prop_assert!(find_path(&g, goal, start).is_empty());
            }
        }

        #[test]
        fn prop_smoothing_is_idempotent((g, start, goal) in arb_grid()) {
            let path = find_path(&g, start, goal);
            let once = smooth_tile_path(&g, &path);
            let twice = smooth_tile_path(&g, &once);
            prop_assert_eq!(once, twice);
        }
    }
}
