//! The frame-stepped simulation.
//!
//! [`GameWorld`] owns the loaded environment, every agent and bullet, the
//! player and the event bus. One [`GameWorld::step`] runs, in order: AI
//! against a frame-start snapshot, agent actions, static collision, pickups
//! and hazards, bullet hits, projectile flight, and the cleanup sweep.

use crate::ai::{self, AiAction, AiContext, PlayerView};
use crate::arena::Arena;
use crate::behavior::{CharacterKind, DescriptorTable};
use crate::character::{Character, DamageOutcome, HitReaction};
use crate::collision_response::resolve_static;
use crate::combat::{CombatScene, MeleeReport};
use crate::config::SimConfig;
use crate::events::{CombatEvent, EventBus};
use crate::los::{world_line_of_sight, LosMode};
use crate::player::Player;
use crate::projectile::{Bullet, BulletKind};
use crate::spawn::{is_valid_spawn, kind_for_marker, sample_dungeon_spawn, sample_terrain_spawn, HeightBand};
use delve_common::{Aabb, AgentHandle, BulletId, LevelError, TileCoord};
use delve_world::{Dungeon, Environment, Heightmap, LevelImage, Terrain};
use glam::Vec3;
use tracing::{debug, info, trace, warn};

/// Upper bound on fixed steps run by one [`GameWorld::advance`] call.
const MAX_STEPS_PER_ADVANCE: u32 = 8;

/// The whole gameplay simulation.
#[derive(Debug)]
pub struct GameWorld {
    config: SimConfig,
    descriptors: DescriptorTable,
    env: Environment,
    agents: Arena<Character>,
    bullets: Vec<Bullet>,
    player: Player,
    events: EventBus,
    rng: fastrand::Rng,
    next_bullet_id: u64,
    frame: u64,
    elapsed: f64,
    accumulator: f32,
}

impl GameWorld {
    /// Creates an empty world. Nothing is loaded until
    /// [`GameWorld::load_dungeon`] or [`GameWorld::load_outdoor`].
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        let descriptors = DescriptorTable::with_overrides(&config.ai.kinds);
        let rng = fastrand::Rng::with_seed(config.simulation.seed);
        let agents = Arena::with_capacity(config.simulation.max_agents);
        Self {
            config,
            descriptors,
            env: Environment::Empty,
            agents,
            bullets: Vec::new(),
            player: Player::default(),
            events: EventBus::default(),
            rng,
            next_bullet_id: 1,
            frame: 0,
            elapsed: 0.0,
            accumulator: 0.0,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Returns the per-kind descriptors in use.
    #[must_use]
    pub const fn descriptors(&self) -> &DescriptorTable {
        &self.descriptors
    }

    /// Returns the loaded environment.
    #[must_use]
    pub const fn env(&self) -> &Environment {
        &self.env
    }

    /// Returns the loaded dungeon, if any.
    #[must_use]
    pub fn dungeon(&self) -> Option<&Dungeon> {
        self.env.dungeon()
    }

    /// Returns all agents.
    #[must_use]
    pub const fn agents(&self) -> &Arena<Character> {
        &self.agents
    }

    /// Returns one agent.
    #[must_use]
    pub fn agent(&self, handle: AgentHandle) -> Option<&Character> {
        self.agents.get(handle)
    }

    /// Returns live bullets.
    #[must_use]
    pub fn bullets(&self) -> &[Bullet] {
        &self.bullets
    }

    /// Returns the player.
    #[must_use]
    pub const fn player(&self) -> &Player {
        &self.player
    }

    /// Returns the player mutably, for the input layer.
    pub fn player_mut(&mut self) -> &mut Player {
        &mut self.player
    }

    /// Returns the event bus.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Drains pending events.
    pub fn drain_events(&self) -> Vec<CombatEvent> {
        self.events.drain()
    }

    /// Returns the number of steps run.
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Returns simulated seconds.
    #[must_use]
    pub const fn elapsed(&self) -> f64 {
        self.elapsed
    }

    fn height_band(&self) -> HeightBand {
        HeightBand {
            min: self.config.simulation.min_spawn_height,
            max: self.config.simulation.max_spawn_height,
        }
    }

    fn split(&mut self) -> (CombatScene<'_>, &mut Vec<Bullet>, &mut fastrand::Rng) {
        (
            CombatScene {
                agents: &mut self.agents,
                player: &mut self.player,
                env: &mut self.env,
                bus: &self.events,
                config: &self.config,
            },
            &mut self.bullets,
            &mut self.rng,
        )
    }

    fn alloc_bullet_id(&mut self) -> BulletId {
        let id = BulletId::from_raw(self.next_bullet_id);
        self.next_bullet_id += 1;
        id
    }

    // ========================================================================
    // Level transitions
    // ========================================================================

    /// Loads a dungeon level, replacing whatever was loaded.
    ///
    /// The walkable grid and geometry are rebuilt from the image, the player
    /// is moved to the player marker, and one agent is spawned per enemy
    /// marker. Returns the number of agents spawned.
    pub fn load_dungeon(&mut self, level: LevelImage) -> Result<u32, LevelError> {
        let dungeon = Dungeon::new(level, self.config.world);
        let Some(start) = dungeon.geometry.player_spawn().copied() else {
            warn!("Level has no player spawn, keeping current level");
            return Err(LevelError::MissingPlayerSpawn);
        };
        let markers = dungeon.geometry.spawns.clone();

        self.clear_actors();
        self.env = Environment::Dungeon(Box::new(dungeon));
        self.player.position = start.position;
        self.player.keys = 0;

        let mut spawned = 0;
        for marker in markers {
            let Some(kind) = kind_for_marker(marker.kind) else {
                continue;
            };
            if self.spawn_character(kind, marker.position).is_some() {
                spawned += 1;
            }
        }

        info!("Loaded dungeon with {spawned} agents");
        self.events.publish(CombatEvent::LevelLoaded { agents: spawned });
        Ok(spawned)
    }

    /// Loads heightmap terrain. The player is placed at the terrain center.
    pub fn load_outdoor(&mut self, heightmap: Heightmap, scale: Vec3) {
        let terrain = Terrain { heightmap, scale };
        let (w, d) = terrain.heightmap.world_extent(scale);
        let mut center = Vec3::new(w * 0.5, 0.0, d * 0.5);
        center.y = terrain.height_at(center);

        self.clear_actors();
        self.env = Environment::Outdoor(terrain);
        self.player.position = center;
        self.player.keys = 0;

        info!("Loaded outdoor terrain {w}x{d}");
        self.events.publish(CombatEvent::LevelLoaded { agents: 0 });
    }

    /// Drops the loaded level with every agent and bullet.
    pub fn unload(&mut self) {
        self.clear_actors();
        self.env = Environment::Empty;
        info!("Level unloaded");
    }

    fn clear_actors(&mut self) {
        self.agents.clear();
        self.bullets.clear();
        self.accumulator = 0.0;
    }

    // ========================================================================
    // Spawning
    // ========================================================================

    /// Spawns a character at `position`.
    ///
    /// Returns `None` if the agent cap is reached or the position fails spawn
    /// validation. Outdoors the agent is snapped to the ground.
    pub fn spawn_character(&mut self, kind: CharacterKind, position: Vec3) -> Option<AgentHandle> {
        if self.agents.len() >= self.config.simulation.max_agents {
            warn!("Agent cap of {} reached", self.config.simulation.max_agents);
            return None;
        }
        let band = self.height_band();
        if !is_valid_spawn(&self.env, position, band) {
            debug!("Rejected {kind:?} spawn at {position}");
            return None;
        }
        let mut position = position;
        position.y = self.env.floor_height(position);

        let desc = *self.descriptors.get(kind);
        let handle = self.agents.insert(Character::new(desc, position));
        debug!("Spawned {kind:?} {handle} at {position}");
        self.events.publish(CombatEvent::Spawned {
            agent: handle,
            kind,
            position,
        });
        Some(handle)
    }

    /// Spawns a character at a random valid position.
    pub fn spawn_random(&mut self, kind: CharacterKind) -> Option<AgentHandle> {
        let attempts = self.config.simulation.spawn_attempts;
        let band = self.height_band();
        let position = match &self.env {
            Environment::Dungeon(d) => sample_dungeon_spawn(d, &mut self.rng, attempts),
            Environment::Outdoor(t) => {
                let (w, d) = t.heightmap.world_extent(t.scale);
                let center = Vec3::new(w * 0.5, 0.0, d * 0.5);
                sample_terrain_spawn(t, center, w.min(d) * 0.5, band, &mut self.rng, attempts)
            }
            Environment::Empty => None,
        }?;
        self.spawn_character(kind, position)
    }

    // ========================================================================
    // Player actions
    // ========================================================================

    /// Fires a player shot from the chest along `direction`.
    pub fn player_fire(&mut self, kind: BulletKind, direction: Vec3) -> Option<BulletId> {
        if !self.player.is_alive() {
            return None;
        }
        let dir = direction.try_normalize()?;
        let origin = self.player.chest() + dir * self.player.radius;
        let id = self.alloc_bullet_id();
        self.bullets.push(Bullet::player_shot(id, kind, origin, dir, &self.config.combat));
        self.events.publish(CombatEvent::ProjectileFired {
            id,
            kind,
            position: origin,
            enemy_owned: false,
        });
        Some(id)
    }

    /// Swings the player's melee attack.
    pub fn player_melee(&mut self) -> MeleeReport {
        if !self.player.is_alive() {
            return MeleeReport::default();
        }
        let (mut scene, _, rng) = self.split();
        scene.player_melee(rng)
    }

    /// Opens the door on `tile`. A locked door spends one of the player's
    /// keys and stays shut without one.
    pub fn open_door(&mut self, tile: TileCoord) -> bool {
        let Some(d) = self.env.dungeon_mut() else {
            return false;
        };
        let Some(door) = d.geometry.door_index(tile).map(|i| d.geometry.doors[i]) else {
            return false;
        };
        if door.open {
            return false;
        }
        let used_key = door.locked;
        if used_key && self.player.keys == 0 {
            debug!("Door at ({}, {}) is locked", tile.x, tile.y);
            return false;
        }
        if !d.open_door(tile) {
            return false;
        }
        if used_key {
            self.player.keys -= 1;
        }
        self.events.publish(CombatEvent::DoorOpened { tile, used_key });
        true
    }

    /// Damages an agent from outside combat, such as a scripted trap.
    pub fn damage_agent(&mut self, handle: AgentHandle, amount: f32) -> Option<DamageOutcome> {
        let (mut scene, _, _) = self.split();
        scene.damage_agent(handle, amount, HitReaction::Stagger)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Returns true if light `index` illuminates `point`.
    ///
    /// Closed door panels let light through; walls and jambs do not.
    #[must_use]
    pub fn light_reaches(&self, index: usize, point: Vec3) -> bool {
        let Some(light) = self.dungeon().and_then(|d| d.geometry.lights.get(index)) else {
            return false;
        };
        world_line_of_sight(&self.env, light.position, point, LosMode::Lighting, self.config.los.world_epsilon)
    }

    // ========================================================================
    // Stepping
    // ========================================================================

    /// Runs as many fixed steps as `frame_dt` covers. Returns the number run.
    pub fn advance(&mut self, frame_dt: f32) -> u32 {
        let fixed = self.config.simulation.fixed_dt;
        if fixed <= 0.0 {
            return 0;
        }
        self.accumulator += frame_dt.max(0.0);
        let mut steps = 0;
        while self.accumulator >= fixed && steps < MAX_STEPS_PER_ADVANCE {
            self.step(fixed);
            self.accumulator -= fixed;
            steps += 1;
        }
        if steps == MAX_STEPS_PER_ADVANCE {
            self.accumulator = self.accumulator.min(fixed);
        }
        steps
    }

    /// Runs one simulation step of `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        self.frame += 1;
        self.elapsed += f64::from(dt);

        let actions = self.update_ai(dt);
        self.apply_actions(actions);
        self.resolve_collisions();

        let (mut scene, bullets, _) = self.split();
        scene.collect_pickups();
        scene.apply_lava(dt);
        scene.resolve_bullet_hits(bullets);
        scene.update_projectiles(bullets, dt);

        self.cleanup();
        trace!(
            "Frame {}: {} agents, {} bullets",
            self.frame,
            self.agents.len(),
            self.bullets.len()
        );
    }

    fn update_ai(&mut self, dt: f32) -> Vec<AiAction> {
        let snapshot = ai::snapshot(&self.agents, &self.env);
        let ctx = AiContext {
            env: &self.env,
            player: PlayerView::from(&self.player),
            agents: &snapshot,
            config: &self.config.ai,
            los_epsilon: self.config.los.world_epsilon,
        };
        let mut actions = Vec::new();
        for (handle, ch) in self.agents.iter_mut() {
            if let Some(action) = ai::update_agent(handle, ch, &ctx, dt, &mut self.rng) {
                actions.push(action);
            }
        }
        actions
    }

    fn apply_actions(&mut self, actions: Vec<AiAction>) {
        for action in actions {
            match action {
                AiAction::MeleeStrike { agent, damage, reach } => {
                    let (mut scene, _, _) = self.split();
                    scene.enemy_melee(agent, damage, reach);
                }
                AiAction::Fire(shot) => {
                    let id = self.alloc_bullet_id();
                    self.bullets.push(Bullet::enemy_shot(id, &shot, &self.config.combat));
                    self.events.publish(CombatEvent::ProjectileFired {
                        id,
                        kind: shot.kind,
                        position: shot.origin,
                        enemy_owned: true,
                    });
                }
            }
        }
    }

    fn resolve_collisions(&mut self) {
        let colliders: Vec<Aabb> = self
            .env
            .dungeon()
            .map(|d| d.geometry.solid_colliders().map(|(_, aabb)| aabb).collect())
            .unwrap_or_default();
        if colliders.is_empty() {
            return;
        }
        for (_, ch) in self.agents.iter_mut().filter(|(_, c)| c.is_alive()) {
            resolve_static(&mut ch.position, ch.desc.radius, ch.desc.height, &colliders);
        }
        let p = &mut self.player;
        resolve_static(&mut p.position, p.radius, p.height, &colliders);
    }

    fn cleanup(&mut self) {
        self.bullets.retain(|b| !b.dead);

        for (agent, ch) in self.agents.iter_mut() {
            for (from, to) in ch.drain_transitions() {
                self.events.publish(CombatEvent::StateChanged { agent, from, to });
            }
        }

        for agent in self.agents.sweep(Character::is_removable) {
            debug!("Removed {agent}");
            self.events.publish(CombatEvent::Removed { agent });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::AiState;
    use crate::events::DamageTarget;

    const DT: f32 = 1.0 / 60.0;

    fn world(rows: &[&str]) -> GameWorld {
        let mut w = GameWorld::new(SimConfig::default());
        w.load_dungeon(LevelImage::from_rows(rows)).expect("level");
        w
    }

    #[test]
    fn test_load_spawns_markers() {
        let mut w = world(&["#####", "#@.k#", "#p.s#", "#####"]);
        assert_eq!(w.agents().len(), 3);
        let start = w.dungeon().expect("dungeon").tile_center(TileCoord::new(1, 1));
        assert_eq!(w.player().position, start);
        let events = w.drain_events();
        assert!(events.contains(&CombatEvent::LevelLoaded { agents: 3 }));
        let spawned = events
            .iter()
            .filter(|e| matches!(e, CombatEvent::Spawned { .. }))
            .count();
        assert_eq!(spawned, 3);

        // Reloading replaces every agent.
        w.load_dungeon(LevelImage::from_rows(&["@.."])).expect("level");
        assert!(w.agents().is_empty());
    }

    #[test]
    fn test_missing_player_spawn() {
        let mut w = GameWorld::new(SimConfig::default());
        let err = w.load_dungeon(LevelImage::from_rows(&["#.k#"]));
        assert!(matches!(err, Err(LevelError::MissingPlayerSpawn)));
        assert!(matches!(w.env(), Environment::Empty));
    }

    #[test]
    fn test_spawn_validation() {
        let mut config = SimConfig::default();
        config.simulation.max_agents = 1;
        let mut w = GameWorld::new(config);
        w.load_dungeon(LevelImage::from_rows(&["#@..#"])).expect("level");
        let d = w.dungeon().expect("dungeon");
        let (wall, floor) = (d.tile_center(TileCoord::new(0, 0)), d.tile_center(TileCoord::new(2, 0)));
        assert!(w.spawn_character(CharacterKind::Spider, wall).is_none());
        assert!(w.spawn_character(CharacterKind::Spider, floor).is_some());
        assert!(w.spawn_character(CharacterKind::Spider, floor).is_none());
    }

    #[test]
    fn test_locked_door_needs_key() {
        let mut w = world(&["#####", "#@$K.", "#####"]);
        let door = TileCoord::new(3, 1);
        assert!(!w.open_door(door));

        let key = w.dungeon().expect("dungeon").tile_center(TileCoord::new(2, 1));
        w.player_mut().position = key;
        w.step(DT);
        assert_eq!(w.player().keys, 1);

        assert!(w.open_door(door));
        assert_eq!(w.player().keys, 0);
        assert!(w.dungeon().expect("dungeon").grid.is_walkable(door));
        assert!(!w.open_door(door));
        assert!(w
            .drain_events()
            .contains(&CombatEvent::DoorOpened { tile: door, used_key: true }));
    }

    #[test]
    fn test_light_passes_closed_door_not_walls() {
        let w = world(&["#########", "#L.D..#.#", "#@#######"]);
        let d = w.dungeon().expect("dungeon");
        let beyond_door = d.tile_center(TileCoord::new(5, 1)) + Vec3::Y * 100.0;
        let behind_wall = d.tile_center(TileCoord::new(7, 1)) + Vec3::Y * 100.0;
        let light = d.geometry.lights[0].position;

        assert!(w.light_reaches(0, beyond_door));
        assert!(!world_line_of_sight(w.env(), light, beyond_door, LosMode::Ai, 0.01));
        assert!(!w.light_reaches(0, behind_wall));
        assert!(!w.light_reaches(7, beyond_door));
    }

    #[test]
    fn test_skeleton_hunts_player() {
        let mut w = world(&["##########", "#@......k#", "##########"]);
        for _ in 0..480 {
            w.step(DT);
        }
        assert!(w.player().health() < 100.0);
        let events = w.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            CombatEvent::StateChanged { from: AiState::Idle, to: AiState::Chase, .. }
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            CombatEvent::Damaged { target: DamageTarget::Player, .. }
        )));
    }

    #[test]
    fn test_dead_agents_are_removed() {
        let mut w = world(&["#######", "#@...s#", "#######"]);
        let handle = w.agents().handles()[0];
        let out = w.damage_agent(handle, 1000.0).expect("agent");
        assert!(out.killed);

        let death = w.agent(handle).expect("agent").desc.death_duration;
        let frames = (death / DT).ceil() as usize + 2;
        for _ in 0..frames {
            w.step(DT);
        }
        assert!(w.agent(handle).is_none());
        assert!(w.drain_events().contains(&CombatEvent::Removed { agent: handle }));
    }

    #[test]
    fn test_player_shot_lives_until_it_lands() {
        let mut w = world(&["##########", "#@.......#", "##########"]);
        let id = w.player_fire(BulletKind::Default, Vec3::NEG_X).expect("shot");
        assert_eq!(w.bullets().len(), 1);
        assert_eq!(w.bullets()[0].id, id);
        for _ in 0..240 {
            w.step(DT);
        }
        assert!(w.bullets().is_empty());
    }

    #[test]
    fn test_advance_runs_fixed_steps() {
        let mut w = world(&["@.."]);
        assert_eq!(w.advance(DT * 2.5), 2);
        assert_eq!(w.frame(), 2);
        assert_eq!(w.advance(DT * 0.6), 1);
        assert_eq!(w.advance(-1.0), 0);
    }

    #[test]
    fn test_outdoor_spawn() {
        let mut w = GameWorld::new(SimConfig::default());
        w.load_outdoor(Heightmap::flat(64, 64, 0.5), Vec3::new(10.0, 100.0, 10.0));
        assert!((w.player().position.y - 50.0).abs() < 0.001);
        let h = w.spawn_random(CharacterKind::Raptor).expect("spawn");
        assert!((w.agent(h).expect("agent").position.y - 50.0).abs() < 0.001);
        w.step(DT);
        w.unload();
        assert!(w.agents().is_empty());
        assert!(w.spawn_random(CharacterKind::Raptor).is_none());
    }
}
