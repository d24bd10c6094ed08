//! Character agents and their shared AI state.
//!
//! [`Character::take_damage`] is the only way health goes down. It drives the
//! Stagger and Death transitions; the rest of the state machine lives in
//! [`crate::ai`].

use crate::behavior::{AnimationClip, BehaviorDescriptor, CharacterKind};
use crate::pathfinding::WaypointPath;
use crate::perception::Perception;
use delve_common::{Aabb, TileCoord};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// AI states shared by every character kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AiState {
    /// Standing around
    #[default]
    Idle,
    /// Walking to a random nearby tile
    Patrol,
    /// Pursuing the player
    Chase,
    /// Ranged attack
    Attack,
    /// Close-range attack
    MeleeAttack,
    /// Moving to a free tile next to the player
    Reposition,
    /// Fleeing the player
    RunAway,
    /// Frozen by ice
    Freeze,
    /// Reeling from a hit
    Stagger,
    /// Dead, waiting for removal
    Death,
}

impl AiState {
    /// Returns true for the attack states.
    #[must_use]
    pub const fn is_attacking(self) -> bool {
        matches!(self, Self::Attack | Self::MeleeAttack)
    }

    /// Returns true while the agent is closing in on or attacking the player.
    #[must_use]
    pub const fn is_engaging(self) -> bool {
        matches!(self, Self::Chase | Self::Attack | Self::MeleeAttack)
    }

    /// Returns true if the agent is unable to act.
    #[must_use]
    pub const fn is_incapacitated(self) -> bool {
        matches!(self, Self::Freeze | Self::Stagger | Self::Death)
    }

    /// Returns true if an alert can pull the agent into Chase.
    #[must_use]
    pub const fn is_alertable(self) -> bool {
        matches!(self, Self::Idle | Self::Patrol)
    }
}

/// How a character reacts to a non-lethal hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitReaction {
    /// Reel for the kind's stagger duration
    Stagger,
    /// Freeze for the given seconds
    Freeze(f32),
}

/// Result of [`Character::take_damage`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DamageOutcome {
    /// Health actually removed
    pub applied: f32,
    /// Health left
    pub remaining: f32,
    /// This hit killed the character
    pub killed: bool,
    /// A bleed effect should play
    pub bleed: bool,
}

/// An enemy agent.
#[derive(Debug, Clone)]
pub struct Character {
    /// Kind
    pub kind: CharacterKind,
    /// Tuning after overrides
    pub desc: BehaviorDescriptor,
    /// Feet position
    pub position: Vec3,
    /// Facing around +Y, radians (0 faces +Z)
    pub yaw: f32,
    /// Velocity from the last AI update
    pub velocity: Vec3,
    /// Path being followed
    pub path: WaypointPath,
    /// Seconds until the path is replanned
    pub repath_timer: f32,
    /// Player sight and memory
    pub perception: Perception,
    /// Remaining player-melee immunity
    pub melee_hit_cooldown: f32,
    /// Heading used by outdoor wandering
    pub wander_angle: f32,
    /// Orbit direction while closing in outdoors
    pub orbit_clockwise: bool,
    /// Tile picked by Reposition
    pub reposition_target: Option<TileCoord>,
    /// Seconds accumulated on lava since the last burn
    pub lava_timer: f32,
    /// Whether the agent already ran away once
    pub has_fled: bool,
    health: f32,
    state: AiState,
    state_timer: f32,
    anim_time: f32,
    can_bleed: bool,
    attack_cooldown: f32,
    dealt_loop: Option<u32>,
    freeze_duration: f32,
    transitions: Vec<(AiState, AiState)>,
}

impl Character {
    /// Creates a character at full health in Idle.
    #[must_use]
    pub fn new(desc: BehaviorDescriptor, position: Vec3) -> Self {
        Self {
            kind: desc.kind,
            desc,
            position,
            yaw: 0.0,
            velocity: Vec3::ZERO,
            path: WaypointPath::default(),
            repath_timer: 0.0,
            perception: Perception::new(desc.forget_timeout),
            melee_hit_cooldown: 0.0,
            wander_angle: 0.0,
            orbit_clockwise: false,
            reposition_target: None,
            lava_timer: 0.0,
            has_fled: false,
            health: desc.max_health,
            state: AiState::Idle,
            state_timer: 0.0,
            anim_time: 0.0,
            can_bleed: true,
            attack_cooldown: 0.0,
            dealt_loop: None,
            freeze_duration: 0.0,
            transitions: Vec::new(),
        }
    }

    /// Current health.
    #[must_use]
    pub const fn health(&self) -> f32 {
        self.health
    }

    /// Maximum health.
    #[must_use]
    pub const fn max_health(&self) -> f32 {
        self.desc.max_health
    }

    /// Current AI state.
    #[must_use]
    pub const fn state(&self) -> AiState {
        self.state
    }

    /// Seconds spent in the current state.
    #[must_use]
    pub const fn state_timer(&self) -> f32 {
        self.state_timer
    }

    /// Returns true unless dead.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.state != AiState::Death
    }

    /// Returns true while a hit would play a bleed effect.
    #[must_use]
    pub const fn can_bleed(&self) -> bool {
        self.can_bleed
    }

    /// Seconds a Freeze lasts.
    #[must_use]
    pub const fn freeze_duration(&self) -> f32 {
        self.freeze_duration
    }

    /// Eye position used for sight checks.
    #[must_use]
    pub fn eye(&self) -> Vec3 {
        self.position + Vec3::Y * (self.desc.height * 0.8)
    }

    /// Body bounds used for hit tests.
    #[must_use]
    pub fn aabb(&self) -> Aabb {
        let half = Vec3::new(self.desc.radius, self.desc.height * 0.5, self.desc.radius);
        Aabb::from_center(self.position + Vec3::Y * half.y, half)
    }

    /// Unit facing vector on XZ.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        Vec3::new(self.yaw.sin(), 0.0, self.yaw.cos())
    }

    /// Turns to face a point.
    pub fn face(&mut self, target: Vec3) {
        let d = target - self.position;
        if d.x.abs() > f32::EPSILON || d.z.abs() > f32::EPSILON {
            self.yaw = d.x.atan2(d.z);
        }
    }

    /// Moves to a new state.
    ///
    /// Re-entering the current state is a no-op and Death is final. Leaving
    /// Stagger re-arms the bleed effect. Any path in progress is dropped.
    /// Returns true if the state changed.
    pub fn change_state(&mut self, next: AiState) -> bool {
        if next == self.state || self.state == AiState::Death {
            return false;
        }
        let prev = self.state;
        if prev == AiState::Stagger {
            self.can_bleed = true;
        }
        if prev.is_attacking() {
            self.dealt_loop = None;
        }
        if next != AiState::Reposition {
            self.reposition_target = None;
        }
        self.path.clear();
        self.repath_timer = 0.0;
        self.state = next;
        self.state_timer = 0.0;
        self.anim_time = 0.0;
        self.transitions.push((prev, next));
        trace!("{:?} {:?} -> {:?}", self.kind, prev, next);
        true
    }

    /// Restarts the state timer without changing state.
    pub fn restart_state_timer(&mut self) {
        self.state_timer = 0.0;
    }

    /// Applies damage and the resulting state change.
    ///
    /// Lethal damage clamps health to zero and enters Death. Non-lethal damage
    /// staggers (restarting an ongoing stagger) or freezes, per `reaction`.
    /// A frozen character stays frozen when hit. The bleed flag is reported
    /// at most once per stagger.
    pub fn take_damage(&mut self, amount: f32, reaction: HitReaction) -> DamageOutcome {
        if !self.is_alive() || amount <= 0.0 {
            return DamageOutcome {
                remaining: self.health,
                ..DamageOutcome::default()
            };
        }

        let before = self.health;
        self.health = (self.health - amount).max(0.0);
        let applied = before - self.health;

        if self.health <= 0.0 {
            self.change_state(AiState::Death);
            self.velocity = Vec3::ZERO;
            self.path.clear();
            return DamageOutcome {
                applied,
                remaining: 0.0,
                killed: true,
                bleed: false,
            };
        }

        let bleed = self.can_bleed;
        match reaction {
            HitReaction::Freeze(duration) => {
                self.freeze_duration = duration;
                if !self.change_state(AiState::Freeze) {
                    self.state_timer = 0.0;
                }
            }
            HitReaction::Stagger if self.state == AiState::Freeze => {}
            HitReaction::Stagger => {
                self.can_bleed = false;
                if !self.change_state(AiState::Stagger) {
                    self.state_timer = 0.0;
                }
            }
        }
        self.velocity = Vec3::ZERO;

        DamageOutcome {
            applied,
            remaining: self.health,
            killed: false,
            bleed: bleed && self.state == AiState::Stagger,
        }
    }

    /// Advances state, animation and cooldown timers.
    pub fn tick_timers(&mut self, dt: f32) {
        self.state_timer += dt;
        self.anim_time += dt;
        self.attack_cooldown = (self.attack_cooldown - dt).max(0.0);
        self.melee_hit_cooldown = (self.melee_hit_cooldown - dt).max(0.0);
        self.repath_timer -= dt;
    }

    /// Returns true if this frame of the attack clip should deal damage.
    ///
    /// Damage lands once per clip loop, inside the kind's damage frame window,
    /// and only when the attack cooldown has elapsed.
    pub fn try_attack_frame(&mut self) -> bool {
        if !self.state.is_attacking() || self.attack_cooldown > 0.0 {
            return false;
        }
        let clip = self.desc.animations.attack;
        let frame = clip.frame_at(self.anim_time);
        if !self.desc.in_damage_window(frame) {
            return false;
        }
        let duration = clip.duration();
        let pass = if duration > 0.0 {
            (self.anim_time / duration) as u32
        } else {
            0
        };
        if self.dealt_loop == Some(pass) {
            return false;
        }
        self.dealt_loop = Some(pass);
        self.attack_cooldown = self.desc.attack_cooldown;
        true
    }

    /// Clip and frame the renderer should show.
    #[must_use]
    pub fn animation(&self) -> (AnimationClip, u32) {
        let clip = AnimationClip::for_state(self.state);
        (clip, self.desc.animations.get(clip).frame_at(self.anim_time))
    }

    /// Returns true once the death timer has run out.
    #[must_use]
    pub fn is_removable(&self) -> bool {
        self.state == AiState::Death && self.state_timer >= self.desc.death_duration
    }

    /// Takes the state transitions recorded since the last call.
    pub fn drain_transitions(&mut self) -> Vec<(AiState, AiState)> {
        std::mem::take(&mut self.transitions)
    }
}
