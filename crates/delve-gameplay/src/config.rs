//! Simulation configuration.
//!
//! Loaded from TOML. Every section and field has a default, so a config file
//! only needs the values it changes.

use crate::behavior::{CharacterKind, KindOverride};
use crate::los::FanConfig;
use delve_common::{DelveError, DelveResult};
use delve_world::GeometryParams;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Dungeon geometry dimensions
    pub world: GeometryParams,
    /// Line-of-sight tuning
    pub los: LosConfig,
    /// Projectile, explosion and melee tuning
    pub combat: CombatConfig,
    /// AI tuning and per-kind overrides
    pub ai: AiConfig,
    /// Frame loop and spawning
    pub simulation: SimulationConfig,
}

/// Line-of-sight tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LosConfig {
    /// Pixel-grid fan used for alert propagation
    pub fan: FanConfig,
    /// Fraction of ray length ignored at the far end of world raycasts
    pub world_epsilon: f32,
}

impl Default for LosConfig {
    fn default() -> Self {
        Self {
            fan: FanConfig::default(),
            world_epsilon: 0.01,
        }
    }
}

/// Projectile, explosion and melee tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Muzzle speed of plain player shots
    pub player_bullet_speed: f32,
    /// Muzzle speed of fireballs and iceballs
    pub magic_bullet_speed: f32,
    /// Lifetime of plain shots (s)
    pub bullet_lifetime: f32,
    /// Lifetime of magic shots (s)
    pub magic_lifetime: f32,
    /// Downward acceleration on arcing shots
    pub gravity: f32,
    /// Direct-hit damage of player shots
    pub player_bullet_damage: f32,
    /// Blast radius
    pub explosion_radius: f32,
    /// Blast damage at the radius edge
    pub explosion_min_damage: f32,
    /// Blast damage at the center
    pub explosion_max_damage: f32,
    /// Seconds an explosion lingers before the bullet is removed
    pub explosion_linger: f32,
    /// Seconds enemies stay frozen by an iceball
    pub freeze_duration: f32,
    /// Player melee damage
    pub melee_damage: f32,
    /// Forward reach of the player melee box
    pub melee_reach: f32,
    /// Width of the player melee box
    pub melee_width: f32,
    /// Seconds an enemy is immune after a player melee hit
    pub melee_hit_cooldown: f32,
    /// Chance a smashed barrel drops a health potion
    pub loot_drop_chance: f32,
    /// Health restored by a potion
    pub potion_heal: f32,
    /// Distance at which the player collects pickups
    pub pickup_radius: f32,
    /// Damage per lava burn
    pub lava_damage: f32,
    /// Seconds between lava burns
    pub lava_interval: f32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            player_bullet_speed: 1500.0,
            magic_bullet_speed: 800.0,
            bullet_lifetime: 3.0,
            magic_lifetime: 4.0,
            gravity: 500.0,
            player_bullet_damage: 25.0,
            explosion_radius: 200.0,
            explosion_min_damage: 10.0,
            explosion_max_damage: 200.0,
            explosion_linger: 0.5,
            freeze_duration: 3.0,
            melee_damage: 25.0,
            melee_reach: 120.0,
            melee_width: 100.0,
            melee_hit_cooldown: 0.4,
            loot_drop_chance: 0.3,
            potion_heal: 30.0,
            pickup_radius: 50.0,
            lava_damage: 10.0,
            lava_interval: 0.5,
        }
    }
}

/// AI tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Per-kind overrides of the built-in tuning
    pub kinds: BTreeMap<CharacterKind, KindOverride>,
    /// Seconds between path replans while chasing
    pub repath_interval: f32,
    /// Distance at which a waypoint counts as reached
    pub arrival_radius: f32,
    /// Outdoor push-apart radius between agents
    pub repulsion_radius: f32,
    /// Outdoor push-apart strength
    pub repulsion_strength: f32,
    /// Seconds before an unfinished Reposition gives up
    pub reposition_timeout: f32,
    /// Ring radius outdoor melee agents circle at while closing in
    pub orbit_radius: f32,
    /// Tiles tried when picking a patrol destination
    pub patrol_search_attempts: u32,
    /// Heading change rate of outdoor wandering (rad/s)
    pub wander_turn_rate: f32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            kinds: BTreeMap::new(),
            repath_interval: 0.5,
            arrival_radius: 10.0,
            repulsion_radius: 120.0,
            repulsion_strength: 200.0,
            reposition_timeout: 3.0,
            orbit_radius: 250.0,
            patrol_search_attempts: 24,
            wander_turn_rate: 1.5,
        }
    }
}

/// Frame loop and spawning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Maximum live agents
    pub max_agents: usize,
    /// RNG seed
    pub seed: u64,
    /// Fixed frame step (s)
    pub fixed_dt: f32,
    /// Attempts before a random spawn gives up
    pub spawn_attempts: u32,
    /// Lowest terrain height an outdoor spawn accepts
    pub min_spawn_height: f32,
    /// Highest terrain height an outdoor spawn accepts
    pub max_spawn_height: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_agents: 256,
            seed: 0x0DE1_7E5E,
            fixed_dt: 1.0 / 60.0,
            spawn_attempts: 64,
            min_spawn_height: 0.0,
            max_spawn_height: 400.0,
        }
    }
}

impl SimConfig {
    /// Loads configuration from a TOML file.
    ///
    /// A missing file yields defaults; an unreadable or malformed one is an
    /// error.
    pub fn load(path: impl AsRef<Path>) -> DelveResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(contents: &str) -> DelveResult<Self> {
        toml::from_str(contents).map_err(|e| DelveError::Config(e.to_string()))
    }

    /// Writes configuration to a TOML file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> DelveResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self).map_err(|e| DelveError::Config(e.to_string()))?;
        fs::write(path, contents)?;
        info!("Saved config to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = SimConfig::load(dir.path().join("absent.toml")).expect("defaults");
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let config = SimConfig::from_toml(
            r#"
            [combat]
            explosion_radius = 300.0

            [ai.kinds.spider]
            speed = 400.0
            "#,
        )
        .expect("parse");
        assert!((config.combat.explosion_radius - 300.0).abs() < 0.001);
        assert!((config.combat.explosion_max_damage - 200.0).abs() < 0.001);
        assert_eq!(config.ai.kinds[&CharacterKind::Spider].speed, Some(400.0));
        assert_eq!(config.los.fan, FanConfig::default());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[combat\nexplosion_radius = ").expect("write");
        assert!(matches!(SimConfig::load(&path), Err(DelveError::Config(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("delve.toml");
        let mut config = SimConfig::default();
        config.simulation.seed = 42;
        config.ai.kinds.insert(CharacterKind::Ghost, KindOverride {
            max_health: Some(1.0),
            ..KindOverride::default()
        });
        config.save_to(&path).expect("save");
        let loaded = SimConfig::load(&path).expect("load");
        assert_eq!(loaded.simulation.seed, 42);
        assert_eq!(loaded.ai.kinds[&CharacterKind::Ghost].max_health, Some(1.0));
    }
}
