//! ID types for agents and world objects.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle to an agent slot in the world arena.
///
/// A handle pairs the slot index with the generation the slot had when the
/// agent was inserted. Removing the agent bumps the slot generation, so stale
/// handles stop resolving instead of aliasing a newer occupant.
///
/// Handles are totally ordered (index first, then generation). Tie-breaks that
/// need "an arbitrary but consistent" order between two agents use this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentHandle {
    index: u32,
    generation: u32,
}

impl AgentHandle {
    /// Creates a handle from a slot index and generation.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the slot index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the slot generation.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for AgentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Identifier of a projectile, unique for the lifetime of a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BulletId(u64);

impl BulletId {
    /// Creates a bullet ID from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Index of a static object inside the level geometry (barrel, web, door...).
///
/// Static objects are regenerated wholesale on level load, so a plain index
/// into the owning collection stays valid for the lifetime of the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropIndex(pub u32);

impl PropIndex {
    /// Returns the index as `usize`.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0 as usize
    }
}
