//! # Delve Gameplay
//!
//! Gameplay core for Delve.
//!
//! This crate provides the frame-stepped simulation and its systems:
//! - BFS pathfinding with line-of-sight smoothing
//! - Pixel-grid and world-space line-of-sight oracles
//! - Steering behaviors
//! - Data-driven AI state machine shared by every character kind
//! - Projectiles, explosions, melee and static collision response
//! - Event bus for audio, effects and UI observers

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod ai;
pub mod arena;
pub mod behavior;
pub mod character;
pub mod collision_response;
pub mod combat;
pub mod config;
pub mod events;
pub mod los;
pub mod pathfinding;
pub mod perception;
pub mod player;
pub mod projectile;
pub mod spawn;
pub mod steering;
pub mod world;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::ai::{AgentSnapshot, AiAction, AiContext, PlayerView};
    pub use crate::arena::*;
    pub use crate::behavior::*;
    pub use crate::character::*;
    pub use crate::collision_response::*;
    pub use crate::combat::*;
    pub use crate::config::*;
    pub use crate::events::*;
    pub use crate::los::*;
    pub use crate::pathfinding::*;
    pub use crate::perception::*;
    pub use crate::player::*;
    pub use crate::projectile::*;
    pub use crate::spawn::*;
    pub use crate::world::*;
}

pub use prelude::*;
