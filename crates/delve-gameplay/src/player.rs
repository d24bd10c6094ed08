//! The player as seen by the simulation.
//!
//! Input handling and camera control live outside the core; this is the
//! body enemies chase, shoot and hit.

use delve_common::Aabb;
use glam::Vec3;

/// Default player health.
pub const DEFAULT_PLAYER_HEALTH: f32 = 100.0;

/// The player body.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    /// Feet position
    pub position: Vec3,
    /// Facing around +Y, radians (0 faces +Z)
    pub yaw: f32,
    /// Collision radius
    pub radius: f32,
    /// Body height
    pub height: f32,
    /// Keys held
    pub keys: u32,
    /// Seconds accumulated on lava since the last burn
    pub lava_timer: f32,
    health: f32,
    max_health: f32,
}

impl Default for Player {
    fn default() -> Self {
        Self::new(Vec3::ZERO)
    }
}

impl Player {
    /// Creates a player at full health.
    #[must_use]
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            yaw: 0.0,
            radius: 30.0,
            height: 180.0,
            keys: 0,
            lava_timer: 0.0,
            health: DEFAULT_PLAYER_HEALTH,
            max_health: DEFAULT_PLAYER_HEALTH,
        }
    }

    /// Sets maximum and current health.
    #[must_use]
    pub fn with_health(mut self, max_health: f32) -> Self {
        self.max_health = max_health.max(1.0);
        self.health = self.max_health;
        self
    }

    /// Current health.
    #[must_use]
    pub const fn health(&self) -> f32 {
        self.health
    }

    /// Maximum health.
    #[must_use]
    pub const fn max_health(&self) -> f32 {
        self.max_health
    }

    /// Returns true while health remains.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    /// Removes health, clamped at zero. Returns the damage applied.
    pub fn take_damage(&mut self, amount: f32) -> f32 {
        if amount <= 0.0 || !self.is_alive() {
            return 0.0;
        }
        let before = self.health;
        self.health = (self.health - amount).max(0.0);
        before - self.health
    }

    /// Restores health, clamped to the maximum. Returns the amount healed.
    pub fn heal(&mut self, amount: f32) -> f32 {
        if amount <= 0.0 || !self.is_alive() {
            return 0.0;
        }
        let before = self.health;
        self.health = (self.health + amount).min(self.max_health);
        self.health - before
    }

    /// Unit facing vector on XZ.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        Vec3::new(self.yaw.sin(), 0.0, self.yaw.cos())
    }

    /// Body bounds used for hit tests.
    #[must_use]
    pub fn aabb(&self) -> Aabb {
        let half = Vec3::new(self.radius, self.height * 0.5, self.radius);
        Aabb::from_center(self.position + Vec3::Y * half.y, half)
    }

    /// Chest position, where enemies aim.
    #[must_use]
    pub fn chest(&self) -> Vec3 {
        self.position + Vec3::Y * (self.height * 0.6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_damage_and_heal_clamp() {
        let mut p = Player::new(Vec3::ZERO);
        assert!((p.take_damage(30.0) - 30.0).abs() < 0.001);
        assert!((p.heal(50.0) - 30.0).abs() < 0.001);
        assert!((p.health() - p.max_health()).abs() < 0.001);
        assert!((p.take_damage(500.0) - 100.0).abs() < 0.001);
        assert!(!p.is_alive());
        assert_eq!(p.heal(10.0), 0.0);
    }

    #[test]
    fn test_forward_and_bounds() {
        let mut p = Player::new(Vec3::new(10.0, 0.0, 0.0));
        assert!((p.forward() - Vec3::Z).length() < 0.001);
        p.yaw = std::f32::consts::FRAC_PI_2;
        assert!((p.forward() - Vec3::X).length() < 0.001);
        assert!(p.aabb().contains(p.chest()));
        assert!(!p.aabb().contains(Vec3::new(10.0, 0.0, 100.0)));
    }
}
