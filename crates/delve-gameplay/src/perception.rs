//! Agent perception: sight of the player and short-term memory.

use crate::los::{world_line_of_sight, LosMode};
use delve_world::Environment;
use glam::Vec3;

/// What an agent currently knows about the player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Perception {
    can_see: bool,
    last_known: Option<Vec3>,
    time_since_seen: f32,
    forget_timeout: f32,
}

impl Perception {
    /// Creates a perception with no memory.
    #[must_use]
    pub const fn new(forget_timeout: f32) -> Self {
        Self {
            can_see: false,
            last_known: None,
            time_since_seen: 0.0,
            forget_timeout,
        }
    }

    /// Refreshes sight of the player from `eye`.
    ///
    /// The player is visible when within `sight_range` and the AI-mode
    /// world raycast is clear, so closed doors hide them. While visible the
    /// last known position tracks the player; once out of sight the memory
    /// ages and is dropped after the forget timeout.
    pub fn update_player_visibility(
        &mut self,
        eye: Vec3,
        player_pos: Vec3,
        dt: f32,
        epsilon: f32,
        sight_range: f32,
        env: &Environment,
    ) -> bool {
        self.can_see = eye.distance_squared(player_pos) <= sight_range * sight_range
            && world_line_of_sight(env, eye, player_pos, LosMode::Ai, epsilon);

        if self.can_see {
            self.last_known = Some(player_pos);
            self.time_since_seen = 0.0;
        } else if self.last_known.is_some() {
            self.time_since_seen += dt;
            if self.time_since_seen >= self.forget_timeout {
                self.forget();
            }
        }
        self.can_see
    }

    /// Records a player position learned second-hand (an ally's alert).
    pub fn notify(&mut self, player_pos: Vec3) {
        self.last_known = Some(player_pos);
        self.time_since_seen = 0.0;
    }

    /// Drops all memory of the player.
    pub fn forget(&mut self) {
        self.can_see = false;
        self.last_known = None;
        self.time_since_seen = 0.0;
    }

    /// Returns true if the player was visible on the last update.
    #[must_use]
    pub const fn can_see(&self) -> bool {
        self.can_see
    }

    /// Last position the player was seen or reported at.
    #[must_use]
    pub const fn last_known(&self) -> Option<Vec3> {
        self.last_known
    }

    /// Seconds since the player was last seen.
    #[must_use]
    pub const fn time_since_seen(&self) -> f32 {
        self.time_since_seen
    }

    /// Returns true if the agent still remembers the player.
    #[must_use]
    pub const fn has_memory(&self) -> bool {
        self.last_known.is_some()
    }
}
