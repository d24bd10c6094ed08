//! Projectile flight, explosions and damage falloff.

use crate::behavior::CharacterKind;
use crate::config::CombatConfig;
use delve_common::{AgentHandle, BulletId};
use delve_world::Environment;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Visual spin of magic projectiles (rad/s).
const MAGIC_SPIN_RATE: f32 = 6.0;

/// Projectile kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulletKind {
    /// Plain shot, dies on first contact
    #[default]
    Default,
    /// Explodes for area damage
    Fireball,
    /// Explodes and freezes enemies
    Iceball,
}

impl BulletKind {
    /// Returns true for kinds that explode instead of dying on contact.
    #[must_use]
    pub const fn is_magic(self) -> bool {
        matches!(self, Self::Fireball | Self::Iceball)
    }
}

/// Explosion lifecycle of a magic projectile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExplosionState {
    /// Still flying
    #[default]
    None,
    /// Exploded, lingering for the effect
    Triggered,
    /// Linger finished
    Completed,
}

/// What happened to a bullet during [`Bullet::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulletStep {
    /// Still in flight
    Flying,
    /// Hit floor, ceiling or terrain and died
    HitWorld,
    /// Lifetime ran out and it died
    Expired,
    /// Exploded this frame; apply blast damage once
    Exploded,
    /// Exploded earlier and is lingering
    Lingering,
    /// Already dead
    Dead,
}

/// Parameters of a shot fired by an agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyShot {
    /// Firing agent
    pub owner: AgentHandle,
    /// Kind of the firing agent
    pub owner_kind: CharacterKind,
    /// Projectile kind
    pub kind: BulletKind,
    /// Muzzle position
    pub origin: Vec3,
    /// Aim point
    pub target: Vec3,
    /// Muzzle speed
    pub speed: f32,
    /// Damage on hit
    pub damage: f32,
    /// Homing turn rate (rad/s)
    pub homing: Option<f32>,
}

/// A projectile in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct Bullet {
    /// Identity
    pub id: BulletId,
    /// Kind
    pub kind: BulletKind,
    /// Firing agent; `None` for the player
    pub owner: Option<AgentHandle>,
    /// Kind of the firing agent
    pub owner_kind: Option<CharacterKind>,
    /// Fired by an enemy
    pub enemy_owned: bool,
    /// Muzzle position
    pub origin: Vec3,
    /// Position at the start of the last update
    pub prev_position: Vec3,
    /// Current position
    pub position: Vec3,
    /// Velocity (units/s)
    pub velocity: Vec3,
    /// Damage on direct hit
    pub damage: f32,
    /// Seconds of flight before expiry
    pub lifetime: f32,
    /// Seconds in flight
    pub age: f32,
    /// Seconds since exploding
    pub since_explosion: f32,
    /// Visual spin angle
    pub spin: f32,
    /// Homing turn rate (rad/s)
    pub homing: Option<f32>,
    /// Whether gravity bends the trajectory
    pub gravity: bool,
    /// Explosion lifecycle
    pub explosion: ExplosionState,
    /// Flagged for removal
    pub dead: bool,
}

impl Bullet {
    fn launch(id: BulletId, kind: BulletKind, origin: Vec3, velocity: Vec3, lifetime: f32, damage: f32) -> Self {
        Self {
            id,
            kind,
            owner: None,
            owner_kind: None,
            enemy_owned: false,
            origin,
            prev_position: origin,
            position: origin,
            velocity,
            damage,
            lifetime,
            age: 0.0,
            since_explosion: 0.0,
            spin: 0.0,
            homing: None,
            gravity: true,
            explosion: ExplosionState::None,
            dead: false,
        }
    }

    /// A player shot along `direction`. Every player shot arcs under gravity.
    #[must_use]
    pub fn player_shot(id: BulletId, kind: BulletKind, origin: Vec3, direction: Vec3, cfg: &CombatConfig) -> Self {
        let dir = direction.normalize_or_zero();
        let (speed, lifetime) = if kind.is_magic() {
            (cfg.magic_bullet_speed, cfg.magic_lifetime)
        } else {
            (cfg.player_bullet_speed, cfg.bullet_lifetime)
        };
        Self::launch(id, kind, origin, dir * speed, lifetime, cfg.player_bullet_damage)
    }

    /// An enemy shot. Plain enemy shots fly straight.
    #[must_use]
    pub fn enemy_shot(id: BulletId, shot: &EnemyShot, cfg: &CombatConfig) -> Self {
        let dir = (shot.target - shot.origin).normalize_or_zero();
        let lifetime = if shot.kind.is_magic() {
            cfg.magic_lifetime
        } else {
            cfg.bullet_lifetime
        };
        Self {
            owner: Some(shot.owner),
            owner_kind: Some(shot.owner_kind),
            enemy_owned: true,
            homing: shot.homing,
            gravity: shot.kind.is_magic(),
            ..Self::launch(id, shot.kind, shot.origin, dir * shot.speed, lifetime, shot.damage)
        }
    }

    /// Returns true while the bullet can still hit something.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.dead && self.explosion == ExplosionState::None
    }

    /// Triggers the explosion. Returns false if it already exploded, so blast
    /// damage is applied exactly once.
    pub fn explode(&mut self) -> bool {
        if self.explosion != ExplosionState::None || self.dead {
            return false;
        }
        self.explosion = ExplosionState::Triggered;
        self.since_explosion = 0.0;
        self.velocity = Vec3::ZERO;
        true
    }

    /// Kills the bullet on contact: magic kinds explode, others die.
    pub fn on_contact(&mut self) -> BulletStep {
        if self.kind.is_magic() {
            if self.explode() {
                BulletStep::Exploded
            } else {
                BulletStep::Lingering
            }
        } else {
            self.dead = true;
            BulletStep::HitWorld
        }
    }

    /// Advances flight by `dt`.
    ///
    /// `homing_target` steers homing bullets at most `turn rate * dt` radians
    /// toward it. Exploded bullets only count down their linger window.
    pub fn update(&mut self, dt: f32, env: &Environment, homing_target: Option<Vec3>, cfg: &CombatConfig) -> BulletStep {
        if self.dead {
            return BulletStep::Dead;
        }
        if self.explosion != ExplosionState::None {
            self.since_explosion += dt;
            if self.since_explosion >= cfg.explosion_linger {
                self.explosion = ExplosionState::Completed;
                self.dead = true;
                return BulletStep::Dead;
            }
            return BulletStep::Lingering;
        }

        self.age += dt;
        if self.age >= self.lifetime {
            return if self.kind.is_magic() {
                self.on_contact()
            } else {
                self.dead = true;
                BulletStep::Expired
            };
        }

        if let (Some(rate), Some(target)) = (self.homing, homing_target) {
            self.velocity = steer_toward(self.velocity, target - self.position, rate * dt);
        }
        if self.gravity {
            self.velocity.y -= cfg.gravity * dt;
        }
        if self.kind.is_magic() {
            self.spin = (self.spin + MAGIC_SPIN_RATE * dt).rem_euclid(std::f32::consts::TAU);
        }

        self.prev_position = self.position;
        self.position += self.velocity * dt;

        let floor = env.floor_height(self.position);
        let hit_floor = self.position.y <= floor;
        let hit_ceiling = env.ceiling_height().is_some_and(|c| self.position.y >= c);
        if hit_floor || hit_ceiling {
            if hit_floor {
                self.position.y = floor;
            }
            return self.on_contact();
        }
        BulletStep::Flying
    }
}

/// Rotates `velocity` toward `desired` by at most `max_angle` radians,
/// keeping its speed.
fn steer_toward(velocity: Vec3, desired: Vec3, max_angle: f32) -> Vec3 {
    let speed = velocity.length();
    let (Some(from), Some(to)) = (velocity.try_normalize(), desired.try_normalize()) else {
        return velocity;
    };
    let angle = from.angle_between(to);
    if angle <= max_angle || angle <= f32::EPSILON {
        return to * speed;
    }
    let arc = Quat::from_rotation_arc(from, to);
    let partial = Quat::IDENTITY.slerp(arc, max_angle / angle);
    partial * from * speed
}

/// Blast damage at `distance` from the center.
///
/// Falls off linearly from `max` at the center to `min` at the radius edge;
/// `None` beyond the radius.
#[must_use]
pub fn explosion_damage(distance: f32, radius: f32, min: f32, max: f32) -> Option<f32> {
    if radius <= 0.0 || distance > radius {
        return None;
    }
    let t = (distance / radius).clamp(0.0, 1.0);
    Some(max - (max - min) * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> CombatConfig {
        CombatConfig::default()
    }

    #[test]
    fn test_fireball_falloff() {
        let at = |d| explosion_damage(d, 200.0, 10.0, 200.0).expect("in radius");
        assert!((at(0.0) - 200.0).abs() < 0.001);
        assert!((at(200.0) - 10.0).abs() < 0.001);
        assert!((at(100.0) - 105.0).abs() < 0.001);
        assert!(explosion_damage(200.1, 200.0, 10.0, 200.0).is_none());
    }

    #[test]
    fn test_enemy_default_shot_flies_straight() {
        let env = Environment::Empty;
        let shot = EnemyShot {
            owner: AgentHandle::new(0, 0),
            owner_kind: CharacterKind::Pirate,
            kind: BulletKind::Default,
            origin: Vec3::new(0.0, 100.0, 0.0),
            target: Vec3::new(1000.0, 100.0, 0.0),
            speed: 500.0,
            damage: 10.0,
            homing: None,
        };
        let mut b = Bullet::enemy_shot(BulletId::from_raw(1), &shot, &cfg());
        for _ in 0..10 {
            assert_eq!(b.update(0.05, &env, None, &cfg()), BulletStep::Flying);
        }
        assert!((b.position.y - 100.0).abs() < 0.001);
        assert!((b.position.x - 250.0).abs() < 0.01);
    }

    #[test]
    fn test_player_shot_arcs_and_hits_floor() {
        let env = Environment::Empty;
        let mut b = Bullet::player_shot(BulletId::from_raw(2), BulletKind::Default, Vec3::new(0.0, 50.0, 0.0), Vec3::X, &cfg());
        let mut step = BulletStep::Flying;
        for _ in 0..200 {
            step = b.update(0.01, &env, None, &cfg());
            if step != BulletStep::Flying {
                break;
            }
        }
        assert_eq!(step, BulletStep::HitWorld);
        assert!(b.dead);
        assert!(b.position.y.abs() < 0.001);
    }

    #[test]
    fn test_fireball_explodes_once_then_lingers() {
        let env = Environment::Empty;
        let c = cfg();
        let mut b = Bullet::player_shot(BulletId::from_raw(3), BulletKind::Fireball, Vec3::new(0.0, 1.0, 0.0), -Vec3::Y, &c);
        assert_eq!(b.update(0.1, &env, None, &c), BulletStep::Exploded);
        assert_eq!(b.explosion, ExplosionState::Triggered);
        assert!(!b.dead);
        assert!(!b.explode());
        assert_eq!(b.update(c.explosion_linger * 0.5, &env, None, &c), BulletStep::Lingering);
        assert_eq!(b.update(c.explosion_linger, &env, None, &c), BulletStep::Dead);
        assert_eq!(b.explosion, ExplosionState::Completed);
        assert!(b.dead);
    }

    #[test]
    fn test_timeout_explodes_magic() {
        let env = Environment::Empty;
        let mut c = cfg();
        c.gravity = 0.0;
        let mut b = Bullet::player_shot(BulletId::from_raw(4), BulletKind::Iceball, Vec3::new(0.0, 100.0, 0.0), Vec3::X, &c);
        assert_eq!(b.update(c.magic_lifetime + 0.1, &env, None, &c), BulletStep::Exploded);
    }

    #[test]
    fn test_homing_turn_is_bounded() {
        let v = steer_toward(Vec3::X * 10.0, Vec3::Z, 0.1);
        assert!((v.length() - 10.0).abs() < 0.001);
        assert!((Vec3::X.angle_between(v) - 0.1).abs() < 0.001);
        let snapped = steer_toward(Vec3::X * 10.0, Vec3::new(1.0, 0.0, 0.01), 0.5);
        assert!(snapped.z > 0.0);
    }
}
