//! Per-kind behavior descriptors.
//!
//! One state machine drives every enemy. What differs between kinds is data:
//! tuning numbers, an animation table, and capability flags selecting the
//! melee, ranged and patrol behaviors.

use crate::character::AiState;
use crate::projectile::BulletKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Enemy kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterKind {
    /// Outdoor pack hunter
    Raptor,
    /// Dungeon melee patroller
    Skeleton,
    /// Dungeon gunner
    Pirate,
    /// Fast dungeon biter
    Spider,
    /// Floating caster with homing shots
    Ghost,
}

impl CharacterKind {
    /// Every kind, in table order.
    pub const ALL: [Self; 5] = [Self::Raptor, Self::Skeleton, Self::Pirate, Self::Spider, Self::Ghost];

    const fn index(self) -> usize {
        match self {
            Self::Raptor => 0,
            Self::Skeleton => 1,
            Self::Pirate => 2,
            Self::Spider => 3,
            Self::Ghost => 4,
        }
    }

    /// Returns true if two kinds answer each other's alerts.
    ///
    /// Raptors only hear raptors; dungeon dwellers all hear each other.
    #[must_use]
    pub const fn is_allied(self, other: Self) -> bool {
        matches!(self, Self::Raptor) == matches!(other, Self::Raptor)
    }
}

/// Behavior mixins enabled for a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Attacks in close range
    pub melee: bool,
    /// Fires projectiles
    pub ranged: bool,
    /// Wanders between tiles when idle
    pub patroller: bool,
    /// Navigates the tile grid (otherwise steers freely)
    pub uses_grid: bool,
}

/// Animation clips a character can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimationClip {
    /// Standing
    Idle,
    /// Walking
    Walk,
    /// Running
    Run,
    /// Attack swing or cast
    Attack,
    /// Hit reaction
    Hurt,
    /// Frozen in place
    Frozen,
    /// Dying
    Die,
}

impl AnimationClip {
    /// Clip played in an AI state.
    #[must_use]
    pub const fn for_state(state: AiState) -> Self {
        match state {
            AiState::Idle => Self::Idle,
            AiState::Patrol | AiState::Reposition => Self::Walk,
            AiState::Chase | AiState::RunAway => Self::Run,
            AiState::Attack | AiState::MeleeAttack => Self::Attack,
            AiState::Stagger => Self::Hurt,
            AiState::Freeze => Self::Frozen,
            AiState::Death => Self::Die,
        }
    }
}

/// Frame count and playback rate of one clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipSpec {
    /// Number of frames
    pub frames: u32,
    /// Frames per second
    pub fps: f32,
    /// Whether playback wraps
    pub looping: bool,
}

impl ClipSpec {
    /// Creates a clip.
    #[must_use]
    pub const fn new(frames: u32, fps: f32, looping: bool) -> Self {
        Self { frames, fps, looping }
    }

    /// Length of one pass through the clip, in seconds.
    #[must_use]
    pub fn duration(&self) -> f32 {
        if self.fps <= 0.0 {
            0.0
        } else {
            self.frames as f32 / self.fps
        }
    }

    /// Frame shown `time` seconds into the clip.
    #[must_use]
    pub fn frame_at(&self, time: f32) -> u32 {
        if self.frames == 0 {
            return 0;
        }
        let raw = (time.max(0.0) * self.fps) as u32;
        if self.looping {
            raw % self.frames
        } else {
            raw.min(self.frames - 1)
        }
    }
}

/// Clip specs for every [`AnimationClip`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnimationTable {
    /// Idle clip
    pub idle: ClipSpec,
    /// Walk clip
    pub walk: ClipSpec,
    /// Run clip
    pub run: ClipSpec,
    /// Attack clip
    pub attack: ClipSpec,
    /// Hurt clip
    pub hurt: ClipSpec,
    /// Die clip
    pub die: ClipSpec,
}

impl AnimationTable {
    /// Looks up a clip. Frozen characters hold the hurt pose.
    #[must_use]
    pub const fn get(&self, clip: AnimationClip) -> ClipSpec {
        match clip {
            AnimationClip::Idle => self.idle,
            AnimationClip::Walk => self.walk,
            AnimationClip::Run => self.run,
            AnimationClip::Attack => self.attack,
            AnimationClip::Hurt => self.hurt,
            AnimationClip::Frozen => ClipSpec::new(1, 0.0, false),
            AnimationClip::Die => self.die,
        }
    }

    const fn standard(attack_frames: u32, attack_fps: f32) -> Self {
        Self {
            idle: ClipSpec::new(4, 4.0, true),
            walk: ClipSpec::new(8, 8.0, true),
            run: ClipSpec::new(8, 12.0, true),
            attack: ClipSpec::new(attack_frames, attack_fps, true),
            hurt: ClipSpec::new(3, 6.0, false),
            die: ClipSpec::new(6, 8.0, false),
        }
    }
}

/// Tuning and capabilities of one character kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BehaviorDescriptor {
    /// Kind described
    pub kind: CharacterKind,
    /// Movement speed (units/s)
    pub speed: f32,
    /// Distance at which attacks start
    pub attack_range: f32,
    /// Radius within which alerts are heard
    pub hearing_radius: f32,
    /// Maximum sight distance
    pub sight_range: f32,
    /// Starting health
    pub max_health: f32,
    /// Collision radius
    pub radius: f32,
    /// Body height
    pub height: f32,
    /// Damage per swing or projectile
    pub attack_damage: f32,
    /// Seconds between damaging swings
    pub attack_cooldown: f32,
    /// Inclusive attack-clip frame window in which damage lands
    pub damage_frames: (u32, u32),
    /// Projectile fired by ranged kinds
    pub projectile: Option<BulletKind>,
    /// Muzzle speed of fired projectiles
    pub projectile_speed: f32,
    /// Homing turn rate (rad/s) of fired projectiles
    pub homing_turn_rate: Option<f32>,
    /// Seconds spent in Stagger before resuming Chase
    pub stagger_duration: f32,
    /// Seconds after death before removal
    pub death_duration: f32,
    /// Seconds without sight before the player is forgotten
    pub forget_timeout: f32,
    /// Seconds idling before a patroller picks a new tile
    pub idle_duration: f32,
    /// Patrol target distance in tiles
    pub patrol_radius: i32,
    /// Health fraction below which the agent runs away
    pub flee_below: Option<f32>,
    /// Seconds spent running away
    pub run_away_duration: f32,
    /// Whether this kind's bullets hurt other agents of the same kind.
    /// Only consulted for bullets the kind fires, so it has no effect unless
    /// `projectile` is set.
    pub bullets_hit_same_kind: bool,
    /// Enabled behaviors
    pub capabilities: Capabilities,
    /// Animation clips
    pub animations: AnimationTable,
}

impl BehaviorDescriptor {
    /// Built-in tuning for a kind.
    #[must_use]
    pub fn builtin(kind: CharacterKind) -> Self {
        let base = Self {
            kind,
            speed: 150.0,
            attack_range: 110.0,
            hearing_radius: 600.0,
            sight_range: 1200.0,
            max_health: 100.0,
            radius: 30.0,
            height: 180.0,
            attack_damage: 10.0,
            attack_cooldown: 0.8,
            damage_frames: (4, 5),
            projectile: None,
            projectile_speed: 0.0,
            homing_turn_rate: None,
            stagger_duration: 0.5,
            death_duration: 3.0,
            forget_timeout: 5.0,
            idle_duration: 2.0,
            patrol_radius: 4,
            flee_below: None,
            run_away_duration: 2.0,
            bullets_hit_same_kind: false,
            capabilities: Capabilities {
                melee: true,
                ranged: false,
                patroller: true,
                uses_grid: true,
            },
            animations: AnimationTable::standard(8, 10.0),
        };

        match kind {
            CharacterKind::Raptor => Self {
                speed: 350.0,
                attack_range: 120.0,
                hearing_radius: 900.0,
                sight_range: 2000.0,
                max_health: 150.0,
                radius: 40.0,
                height: 150.0,
                attack_damage: 15.0,
                attack_cooldown: 0.6,
                damage_frames: (3, 4),
                flee_below: Some(0.3),
                capabilities: Capabilities {
                    melee: true,
                    ranged: false,
                    patroller: false,
                    uses_grid: false,
                },
                animations: AnimationTable::standard(6, 10.0),
                ..base
            },
            CharacterKind::Skeleton => Self {
                max_health: 150.0,
                attack_damage: 20.0,
                bullets_hit_same_kind: true,
                ..base
            },
            CharacterKind::Pirate => Self {
                speed: 130.0,
                attack_range: 700.0,
                max_health: 120.0,
                attack_damage: 12.0,
                attack_cooldown: 1.2,
                damage_frames: (5, 5),
                projectile: Some(BulletKind::Default),
                projectile_speed: 900.0,
                capabilities: Capabilities {
                    melee: false,
                    ranged: true,
                    patroller: true,
                    uses_grid: true,
                },
                ..base
            },
            CharacterKind::Spider => Self {
                speed: 250.0,
                attack_range: 90.0,
                hearing_radius: 400.0,
                max_health: 80.0,
                radius: 25.0,
                height: 60.0,
                attack_damage: 8.0,
                attack_cooldown: 0.5,
                damage_frames: (2, 3),
                patrol_radius: 2,
                animations: AnimationTable::standard(4, 10.0),
                ..base
            },
            CharacterKind::Ghost => Self {
                speed: 110.0,
                attack_range: 600.0,
                max_health: 100.0,
                attack_damage: 15.0,
                attack_cooldown: 2.0,
                damage_frames: (6, 6),
                projectile: Some(BulletKind::Default),
                projectile_speed: 400.0,
                homing_turn_rate: Some(2.5),
                forget_timeout: 8.0,
                capabilities: Capabilities {
                    melee: false,
                    ranged: true,
                    patroller: false,
                    uses_grid: true,
                },
                animations: AnimationTable::standard(10, 8.0),
                ..base
            },
        }
    }

    /// Applies configured overrides.
    #[must_use]
    pub fn with_override(mut self, o: &KindOverride) -> Self {
        if let Some(v) = o.speed {
            self.speed = v;
        }
        if let Some(v) = o.attack_range {
            self.attack_range = v;
        }
        if let Some(v) = o.hearing_radius {
            self.hearing_radius = v;
        }
        if let Some(v) = o.max_health {
            self.max_health = v;
        }
        self
    }

    /// Returns true if `frame` of the attack clip falls in the damage window.
    #[must_use]
    pub const fn in_damage_window(&self, frame: u32) -> bool {
        frame >= self.damage_frames.0 && frame <= self.damage_frames.1
    }

    /// State entered when the agent is in range to attack.
    #[must_use]
    pub const fn attack_state(&self) -> AiState {
        if self.capabilities.ranged {
            AiState::Attack
        } else {
            AiState::MeleeAttack
        }
    }
}

/// Configurable per-kind overrides of the built-in tuning.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KindOverride {
    /// Movement speed
    pub speed: Option<f32>,
    /// Attack range
    pub attack_range: Option<f32>,
    /// Hearing radius
    pub hearing_radius: Option<f32>,
    /// Starting health
    pub max_health: Option<f32>,
}

/// Descriptors for every kind, after overrides.
#[derive(Debug, Clone)]
pub struct DescriptorTable {
    entries: [BehaviorDescriptor; 5],
}

impl Default for DescriptorTable {
    fn default() -> Self {
        Self {
            entries: CharacterKind::ALL.map(BehaviorDescriptor::builtin),
        }
    }
}

impl DescriptorTable {
    /// Built-in table patched by overrides.
    #[must_use]
    pub fn with_overrides(overrides: &BTreeMap<CharacterKind, KindOverride>) -> Self {
        Self {
            entries: CharacterKind::ALL.map(|kind| {
                let base = BehaviorDescriptor::builtin(kind);
                overrides.get(&kind).map_or(base, |o| base.with_override(o))
            }),
        }
    }

    /// Descriptor for a kind.
    #[must_use]
    pub const fn get(&self, kind: CharacterKind) -> &BehaviorDescriptor {
        &self.entries[kind.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_capabilities() {
        let raptor = BehaviorDescriptor::builtin(CharacterKind::Raptor);
        assert!(!raptor.capabilities.uses_grid);
        assert!(!raptor.capabilities.patroller);
        assert_eq!(raptor.attack_state(), AiState::MeleeAttack);

        let pirate = BehaviorDescriptor::builtin(CharacterKind::Pirate);
        assert!(pirate.capabilities.ranged);
        assert_eq!(pirate.attack_state(), AiState::Attack);

        let ghost = BehaviorDescriptor::builtin(CharacterKind::Ghost);
        assert!(ghost.homing_turn_rate.is_some());
    }

    #[test]
    fn test_friendly_fire_asymmetry() {
        // Skeleton bullets hurt skeletons, raptor bullets never hurt raptors.
        assert!(BehaviorDescriptor::builtin(CharacterKind::Skeleton).bullets_hit_same_kind);
        assert!(!BehaviorDescriptor::builtin(CharacterKind::Raptor).bullets_hit_same_kind);
        // No built-in shooter sets the flag, so it stays dormant in play.
        for kind in CharacterKind::ALL {
            let desc = BehaviorDescriptor::builtin(kind);
            assert!(!(desc.bullets_hit_same_kind && desc.projectile.is_some()), "{kind:?}");
        }
    }

    #[test]
    fn test_overrides() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            CharacterKind::Spider,
            KindOverride {
                speed: Some(999.0),
                max_health: Some(5.0),
                ..KindOverride::default()
            },
        );
        let table = DescriptorTable::with_overrides(&overrides);
        let spider = table.get(CharacterKind::Spider);
        assert!((spider.speed - 999.0).abs() < 0.001);
        assert!((spider.max_health - 5.0).abs() < 0.001);
        assert!((spider.attack_range - 90.0).abs() < 0.001);
        assert_eq!(table.get(CharacterKind::Ghost), &BehaviorDescriptor::builtin(CharacterKind::Ghost));
    }

    #[test]
    fn test_clip_frames() {
        let looping = ClipSpec::new(4, 10.0, true);
        assert_eq!(looping.frame_at(0.0), 0);
        assert_eq!(looping.frame_at(0.35), 3);
        assert_eq!(looping.frame_at(0.45), 0);
        let once = ClipSpec::new(4, 10.0, false);
        assert_eq!(once.frame_at(5.0), 3);
        assert!((once.duration() - 0.4).abs() < 0.001);
    }

    #[test]
    fn test_alliances() {
        assert!(CharacterKind::Raptor.is_allied(CharacterKind::Raptor));
        assert!(CharacterKind::Skeleton.is_allied(CharacterKind::Ghost));
        assert!(!CharacterKind::Raptor.is_allied(CharacterKind::Pirate));
    }

    #[test]
    fn test_state_clips() {
        assert_eq!(AnimationClip::for_state(AiState::Chase), AnimationClip::Run);
        assert_eq!(AnimationClip::for_state(AiState::Death), AnimationClip::Die);
        assert_eq!(AnimationClip::for_state(AiState::MeleeAttack), AnimationClip::Attack);
    }
}
