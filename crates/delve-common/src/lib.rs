//! # Delve Common
//!
//! Common types, utilities, and shared abstractions for Delve.
//!
//! This crate provides foundational types used across all Delve subsystems:
//! - Tile coordinates and the world-to-tile mapping
//! - Generational handles for arena-owned agents
//! - Axis-aligned bounding boxes with ray and sphere queries
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod bounds;
pub mod coords;
pub mod error;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bounds::*;
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::ids::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_tile_round_trip_through_world() {
        let mapping = TileMapping::new(8, 6, 2.0);
        let tile = TileCoord::new(3, 4);
        let world = mapping.tile_to_world(tile, 0.0);
        assert_eq!(mapping.world_to_tile(world), tile);
    }

    #[test]
    fn test_handle_ordering_is_total() {
        let a = AgentHandle::new(1, 0);
        let b = AgentHandle::new(2, 0);
        assert!(a < b);
        assert!(AgentHandle::new(1, 1) > a);
    }

    #[test]
    fn test_aabb_ray_hit() {
        let aabb = Aabb::new(Vec3::new(1.0, -1.0, -1.0), Vec3::new(2.0, 1.0, 1.0));
        let t = aabb.ray_intersection(Vec3::ZERO, Vec3::X);
        assert_eq!(t, Some(1.0));
    }
}
