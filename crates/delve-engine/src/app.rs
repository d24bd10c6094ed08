//! Command line options and the headless frame loop.

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use delve_gameplay::{BulletKind, CharacterKind, CombatEvent, GameWorld, SimConfig};
use delve_world::{Heightmap, LevelImage};
use glam::Vec3;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Frames run when `--frames` is not given.
pub const DEFAULT_FRAMES: u64 = 600;

/// What to load.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// Color-coded dungeon level image
    Level(PathBuf),
    /// Grayscale heightmap
    Terrain {
        /// Image path
        path: PathBuf,
        /// World units per pixel on X/Z, white height on Y
        scale: Vec3,
    },
}

/// Headless driver for the Delve gameplay core
#[derive(Debug, Clone, PartialEq, Parser)]
#[command(name = "delve", version, about, long_about = None)]
#[command(group(ArgGroup::new("source").required(true).args(["level", "terrain"])))]
pub struct RunOptions {
    /// Config file; missing means defaults
    #[arg(long, default_value = "delve.toml")]
    pub config: PathBuf,

    /// Color-coded dungeon level image
    #[arg(long)]
    pub level: Option<PathBuf>,

    /// Grayscale heightmap for an outdoor map
    #[arg(long)]
    pub terrain: Option<PathBuf>,

    /// Heightmap scale as X,Y,Z
    #[arg(long, value_parser = parse_scale, default_value = "10,400,10")]
    pub scale: Vec3,

    /// Frames to simulate
    #[arg(long, default_value_t = DEFAULT_FRAMES)]
    pub frames: u64,

    /// Extra agents spawned at random positions
    #[arg(long = "spawn", default_value_t = 0)]
    pub spawns: u32,

    /// Let the player fight back
    #[arg(long)]
    pub autoplay: bool,
}

impl RunOptions {
    /// Returns what to load, `None` when neither path is set.
    #[must_use]
    pub fn source(&self) -> Option<Source> {
        match (&self.level, &self.terrain) {
            (Some(path), _) => Some(Source::Level(path.clone())),
            (None, Some(path)) => Some(Source::Terrain {
                path: path.clone(),
                scale: self.scale,
            }),
            (None, None) => None,
        }
    }
}

fn parse_scale(s: &str) -> Result<Vec3, String> {
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("bad scale {s}: {e}"))?;
    match parts.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(format!("scale needs three components, got {s}")),
    }
}

// ============================================================================
// Event tally
// ============================================================================

/// Counts of drained events by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventTally {
    counts: BTreeMap<&'static str, u64>,
    /// Frames actually simulated
    pub frames: u64,
}

impl EventTally {
    /// Adds a batch of events.
    pub fn record(&mut self, events: &[CombatEvent]) {
        for event in events {
            *self.counts.entry(event_name(event)).or_default() += 1;
        }
    }

    /// Returns the count for an event name.
    #[must_use]
    pub fn get(&self, name: &str) -> u64 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    /// Logs every count.
    pub fn log(&self) {
        info!("Simulated {} frames", self.frames);
        for (name, count) in &self.counts {
            info!("  {name:<16} {count}");
        }
    }
}

fn event_name(event: &CombatEvent) -> &'static str {
    match event {
        CombatEvent::Damaged { .. } => "damaged",
        CombatEvent::Bleed { .. } => "bleed",
        CombatEvent::StateChanged { .. } => "state_changed",
        CombatEvent::Died { .. } => "died",
        CombatEvent::Removed { .. } => "removed",
        CombatEvent::Spawned { .. } => "spawned",
        CombatEvent::ProjectileFired { .. } => "projectile_fired",
        CombatEvent::Explosion { .. } => "explosion",
        CombatEvent::Alert { .. } => "alert",
        CombatEvent::BarrelDestroyed { .. } => "barrel_destroyed",
        CombatEvent::WebDestroyed { .. } => "web_destroyed",
        CombatEvent::PickupCollected { .. } => "pickup_collected",
        CombatEvent::DoorOpened { .. } => "door_opened",
        CombatEvent::PlayerDied => "player_died",
        CombatEvent::LevelLoaded { .. } => "level_loaded",
    }
}

// ============================================================================
// Autoplay
// ============================================================================

/// Turns the player toward the nearest live agent and attacks it: melee in
/// reach, a shot otherwise.
#[derive(Debug, Default)]
struct Autopilot {
    cooldown: f32,
}

impl Autopilot {
    const INTERVAL: f32 = 0.5;

    fn tick(&mut self, world: &mut GameWorld, dt: f32) {
        self.cooldown -= dt;
        if self.cooldown > 0.0 || !world.player().is_alive() {
            return;
        }
        let me = world.player().position;
        let Some(target) = world
            .agents()
            .iter()
            .filter(|(_, c)| c.is_alive())
            .map(|(_, c)| c.aabb().center())
            .min_by(|a, b| a.distance_squared(me).total_cmp(&b.distance_squared(me)))
        else {
            return;
        };
        self.cooldown = Self::INTERVAL;

        let to = target - me;
        world.player_mut().yaw = to.x.atan2(to.z);
        if Vec3::new(to.x, 0.0, to.z).length() <= world.config().combat.melee_reach {
            world.player_melee();
        } else {
            let aim = target - world.player().chest();
            world.player_fire(BulletKind::Default, aim);
        }
    }
}

// ============================================================================
// Run
// ============================================================================

/// Loads the requested level and runs the frame loop.
pub fn run(options: &RunOptions) -> Result<EventTally> {
    let config = SimConfig::load(&options.config)?;
    let dt = config.simulation.fixed_dt;
    let mut world = GameWorld::new(config);

    match options.source().context("nothing to load")? {
        Source::Level(path) => {
            let level = LevelImage::load(&path).with_context(|| format!("loading level {}", path.display()))?;
            world.load_dungeon(level)?;
        }
        Source::Terrain { path, scale } => {
            let map = Heightmap::load(&path).with_context(|| format!("loading heightmap {}", path.display()))?;
            world.load_outdoor(map, scale);
        }
    }

    for i in 0..options.spawns {
        let kind = CharacterKind::ALL[i as usize % CharacterKind::ALL.len()];
        if world.spawn_random(kind).is_none() {
            warn!("Could not place {kind:?}");
        }
    }

    let mut tally = EventTally::default();
    let mut pilot = Autopilot::default();
    for frame in 0..options.frames {
        if options.autoplay {
            pilot.tick(&mut world, dt);
        }
        world.step(dt);
        tally.record(&world.drain_events());
        tally.frames = frame + 1;
        if !world.player().is_alive() {
            info!("Player died on frame {}", frame + 1);
            break;
        }
    }
    debug!("{} agents left", world.agents().len());
    Ok(tally)
}
