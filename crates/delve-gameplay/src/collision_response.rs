//! Static collision response.
//!
//! Bodies are upright cylinders approximated by a circle on XZ plus a
//! vertical span. Overlaps with static boxes are resolved by pushing the
//! circle out along the separation direction.

use delve_common::Aabb;
use glam::{Vec2, Vec3};

/// Push-out passes per resolve before giving up.
pub const MAX_PUSH_ITERATIONS: usize = 5;

/// Result of resolving one body against static colliders.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CollisionMoveResult {
    /// Whether any overlap was resolved
    pub collided: bool,
    /// Total horizontal displacement applied
    pub displacement: Vec3,
    /// Normal of the last surface pushed against
    pub normal: Option<Vec3>,
}

/// Displacement that moves a circle of `radius` at `center` out of a box,
/// on the XZ plane.
///
/// Returns `None` without overlap. A center inside the box is pushed out
/// through the nearest horizontal face.
#[must_use]
pub fn push_out_circle(aabb: &Aabb, center: Vec3, radius: f32) -> Option<Vec3> {
    let c = Vec2::new(center.x, center.z);
    let min = Vec2::new(aabb.min.x, aabb.min.z);
    let max = Vec2::new(aabb.max.x, aabb.max.z);
    let closest = c.clamp(min, max);
    let offset = c - closest;
    let dist_sq = offset.length_squared();

    if dist_sq > 0.0 {
        if dist_sq >= radius * radius {
            return None;
        }
        let dist = dist_sq.sqrt();
        let push = offset / dist * (radius - dist);
        return Some(Vec3::new(push.x, 0.0, push.y));
    }

    // Center inside the box: leave through the closest face.
    let candidates = [
        (c.x - min.x + radius, Vec3::NEG_X),
        (max.x - c.x + radius, Vec3::X),
        (c.y - min.y + radius, Vec3::NEG_Z),
        (max.y - c.y + radius, Vec3::Z),
    ];
    candidates
        .into_iter()
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(depth, dir)| dir * depth)
}

/// Returns true if the body's vertical span overlaps the box.
#[must_use]
pub fn overlaps_vertically(aabb: &Aabb, feet_y: f32, height: f32) -> bool {
    feet_y < aabb.max.y && feet_y + height > aabb.min.y
}

/// Pushes a body out of every overlapping collider.
///
/// Repeats until no collider overlaps or [`MAX_PUSH_ITERATIONS`] passes
/// are spent.
pub fn resolve_static(position: &mut Vec3, radius: f32, height: f32, colliders: &[Aabb]) -> CollisionMoveResult {
    let mut result = CollisionMoveResult::default();
    for _ in 0..MAX_PUSH_ITERATIONS {
        let mut pushed = false;
        for aabb in colliders {
            if !overlaps_vertically(aabb, position.y, height) {
                continue;
            }
            if let Some(push) = push_out_circle(aabb, *position, radius) {
                *position += push;
                result.collided = true;
                result.displacement += push;
                result.normal = push.try_normalize();
                pushed = true;
            }
        }
        if !pushed {
            break;
        }
    }
    result
}
