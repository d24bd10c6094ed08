//! The shared AI state machine.
//!
//! Every kind runs the same transition table. Descriptor data and capability
//! flags decide which branches apply: ranged kinds enter Attack instead of
//! MeleeAttack, patrollers leave Idle on their own, grid kinds navigate by
//! BFS in dungeons while everything else steers.
//!
//! Agents read each other only through a frame-start [`AgentSnapshot`], so the
//! update order within a frame does not change the outcome. Each update makes
//! at most one transition.

use crate::arena::Arena;
use crate::behavior::CharacterKind;
use crate::character::{AiState, Character};
use crate::config::AiConfig;
use crate::pathfinding::{find_path, reachable_tile_near, smooth_tile_path, WaypointPath};
use crate::player::Player;
use crate::projectile::EnemyShot;
use crate::steering::{arrive, compute_repulsion, flee, from_xz, orbit, seek, wander, xz};
use delve_common::{AgentHandle, TileCoord};
use delve_world::{Dungeon, Environment, WalkableGrid};
use glam::Vec3;

/// Attack states are left once the player is this many attack ranges away.
const ATTACK_EXIT_FACTOR: f32 = 1.2;

/// Tiles tried when the player stands on an unwalkable tile.
const TARGET_SEARCH_ATTEMPTS: u32 = 9;

// ============================================================================
// Inputs and outputs
// ============================================================================

/// Frame-start view of one agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentSnapshot {
    /// Agent handle
    pub handle: AgentHandle,
    /// Character kind
    pub kind: CharacterKind,
    /// Feet position
    pub position: Vec3,
    /// Occupied tile (`(-1, -1)` outside dungeons)
    pub tile: TileCoord,
    /// AI state
    pub state: AiState,
    /// Whether the agent is alive
    pub alive: bool,
}

/// Captures every agent at the start of a frame.
#[must_use]
pub fn snapshot(agents: &Arena<Character>, env: &Environment) -> Vec<AgentSnapshot> {
    let dungeon = env.dungeon();
    agents
        .iter()
        .map(|(handle, c)| AgentSnapshot {
            handle,
            kind: c.kind,
            position: c.position,
            tile: dungeon.map_or(TileCoord::INVALID, |d| d.world_to_tile(c.position)),
            state: c.state(),
            alive: c.is_alive(),
        })
        .collect()
}

/// What the AI knows about the player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerView {
    /// Feet position
    pub position: Vec3,
    /// Aim point
    pub chest: Vec3,
    /// Facing on XZ
    pub forward: Vec3,
    /// Whether the player is alive
    pub alive: bool,
}

impl From<&Player> for PlayerView {
    fn from(p: &Player) -> Self {
        Self {
            position: p.position,
            chest: p.chest(),
            forward: p.forward(),
            alive: p.is_alive(),
        }
    }
}

/// Read-only inputs to one AI update.
#[derive(Debug, Clone, Copy)]
pub struct AiContext<'a> {
    /// Loaded world
    pub env: &'a Environment,
    /// Player view
    pub player: PlayerView,
    /// Frame-start snapshot of all agents
    pub agents: &'a [AgentSnapshot],
    /// AI tuning
    pub config: &'a AiConfig,
    /// World raycast epsilon fraction
    pub los_epsilon: f32,
}

/// Side effects an agent asks the world to carry out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AiAction {
    /// A melee swing landed its damage frame
    MeleeStrike {
        /// Attacker
        agent: AgentHandle,
        /// Damage dealt if the player is within reach
        damage: f32,
        /// Maximum distance the swing connects at
        reach: f32,
    },
    /// A ranged attack released a projectile
    Fire(EnemyShot),
}

// ============================================================================
// Update
// ============================================================================

/// Runs one AI update for an agent.
pub fn update_agent(
    handle: AgentHandle,
    ch: &mut Character,
    ctx: &AiContext<'_>,
    dt: f32,
    rng: &mut fastrand::Rng,
) -> Option<AiAction> {
    ch.tick_timers(dt);
    if !ch.is_alive() {
        ch.velocity = Vec3::ZERO;
        return None;
    }

    let sees = if ctx.player.alive {
        ch.perception.update_player_visibility(
            ch.eye(),
            ctx.player.chest,
            dt,
            ctx.los_epsilon,
            ch.desc.sight_range,
            ctx.env,
        )
    } else {
        ch.perception.forget();
        false
    };

    let action = match ch.state() {
        AiState::Idle => {
            idle(ch, ctx, sees, rng);
            None
        }
        AiState::Patrol => {
            patrol(ch, ctx, sees, dt, rng);
            None
        }
        AiState::Chase => {
            chase(handle, ch, ctx, sees);
            None
        }
        AiState::Attack | AiState::MeleeAttack => attack(handle, ch, ctx, sees),
        AiState::Reposition => {
            reposition(ch, ctx);
            None
        }
        AiState::RunAway => {
            run_away(ch, ctx);
            None
        }
        AiState::Stagger => {
            ch.velocity = Vec3::ZERO;
            if ch.state_timer() >= ch.desc.stagger_duration {
                ch.change_state(AiState::Chase);
            }
            None
        }
        AiState::Freeze => {
            ch.velocity = Vec3::ZERO;
            if ch.state_timer() >= ch.freeze_duration() {
                ch.change_state(AiState::Chase);
            }
            None
        }
        AiState::Death => None,
    };

    integrate(ch, ctx.env, dt);
    action
}

fn idle(ch: &mut Character, ctx: &AiContext<'_>, sees: bool, rng: &mut fastrand::Rng) {
    ch.velocity = Vec3::ZERO;
    if sees {
        ch.change_state(AiState::Chase);
        return;
    }
    if !ch.desc.capabilities.patroller || ch.state_timer() < ch.desc.idle_duration {
        return;
    }

    match grid_dungeon(ch, ctx.env) {
        Some(d) => {
            let here = d.world_to_tile(ch.position);
            let r = ch.desc.patrol_radius.max(1);
            let wanted = here.offset(rng.i32(-r..=r), rng.i32(-r..=r));
            let dest = reachable_tile_near(&d.grid, here, wanted, ctx.config.patrol_search_attempts);
            if dest.is_valid() && dest != here {
                ch.change_state(AiState::Patrol);
                plan_path(ch, d, here, dest, ctx.config);
            } else {
                ch.restart_state_timer();
            }
        }
        None => {
            ch.wander_angle = rng.f32() * std::f32::consts::TAU;
            ch.change_state(AiState::Patrol);
        }
    }
}

fn patrol(ch: &mut Character, ctx: &AiContext<'_>, sees: bool, dt: f32, rng: &mut fastrand::Rng) {
    if sees {
        ch.change_state(AiState::Chase);
        return;
    }
    if grid_dungeon(ch, ctx.env).is_some() {
        if !follow_path(ch, ctx.config) {
            ch.change_state(AiState::Idle);
        }
    } else {
        let v = wander(&mut ch.wander_angle, ctx.config.wander_turn_rate, ch.desc.speed * 0.5, dt, rng);
        ch.velocity = from_xz(v);
        if ch.state_timer() >= ch.desc.idle_duration * 2.0 {
            ch.change_state(AiState::Idle);
        }
    }
}

fn chase(handle: AgentHandle, ch: &mut Character, ctx: &AiContext<'_>, sees: bool) {
    let target = if sees {
        Some(ctx.player.position)
    } else {
        ch.perception.last_known()
    };
    let Some(target) = target else {
        ch.velocity = Vec3::ZERO;
        ch.change_state(AiState::Idle);
        return;
    };
    if should_flee(ch) {
        ch.has_fled = true;
        ch.change_state(AiState::RunAway);
        return;
    }

    if sees && xz(ch.position).distance(xz(ctx.player.position)) <= ch.desc.attack_range {
        ch.velocity = Vec3::ZERO;
        ch.face(ctx.player.position);
        if !back_off(handle, ch, ctx) {
            ch.change_state(ch.desc.attack_state());
        }
        return;
    }

    match grid_dungeon(ch, ctx.env) {
        Some(d) => {
            let here = d.world_to_tile(ch.position);
            let mut goal = d.world_to_tile(target);
            if !d.grid.is_walkable(goal) {
                goal = reachable_tile_near(&d.grid, here, goal, TARGET_SEARCH_ATTEMPTS);
            }
            if !goal.is_valid() {
                ch.velocity = Vec3::ZERO;
                return;
            }
            if ch.repath_timer <= 0.0 || (ch.path.is_empty() && ch.path.goal() != Some(goal)) {
                plan_path(ch, d, here, goal, ctx.config);
            }
            if !follow_path(ch, ctx.config) {
                let v = arrive(xz(ch.position), xz(target), ch.desc.speed, d.params.tile_size * 0.5);
                ch.velocity = from_xz(v);
            }
            if !sees && ch.path.is_empty() && xz(ch.position).distance(xz(target)) < ctx.config.arrival_radius {
                // Reached the last known position without finding anyone.
                ch.perception.forget();
            }
        }
        None => steer_chase(handle, ch, ctx, target),
    }
}

fn attack(handle: AgentHandle, ch: &mut Character, ctx: &AiContext<'_>, sees: bool) -> Option<AiAction> {
    ch.velocity = Vec3::ZERO;
    let dist = xz(ch.position).distance(xz(ctx.player.position));
    if !sees || dist > ch.desc.attack_range * ATTACK_EXIT_FACTOR {
        ch.change_state(AiState::Chase);
        return None;
    }
    if should_flee(ch) {
        ch.has_fled = true;
        ch.change_state(AiState::RunAway);
        return None;
    }
    if back_off(handle, ch, ctx) {
        return None;
    }

    ch.face(ctx.player.position);
    if !ch.try_attack_frame() {
        return None;
    }
    match ch.desc.projectile {
        Some(kind) if ch.desc.capabilities.ranged => Some(AiAction::Fire(EnemyShot {
            owner: handle,
            owner_kind: ch.kind,
            kind,
            origin: ch.eye() + ch.forward() * ch.desc.radius,
            target: ctx.player.chest,
            speed: ch.desc.projectile_speed,
            damage: ch.desc.attack_damage,
            homing: ch.desc.homing_turn_rate,
        })),
        _ => Some(AiAction::MeleeStrike {
            agent: handle,
            damage: ch.desc.attack_damage,
            reach: ch.desc.attack_range * ATTACK_EXIT_FACTOR,
        }),
    }
}

fn reposition(ch: &mut Character, ctx: &AiContext<'_>) {
    let (Some(dest), Some(d)) = (ch.reposition_target, grid_dungeon(ch, ctx.env)) else {
        ch.change_state(AiState::Chase);
        return;
    };
    if ch.state_timer() >= ctx.config.reposition_timeout {
        ch.change_state(AiState::Chase);
        return;
    }
    let here = d.world_to_tile(ch.position);
    if ch.path.goal() != Some(dest) {
        plan_path(ch, d, here, dest, ctx.config);
    }
    if follow_path(ch, ctx.config) {
        return;
    }
    let center = d.tile_center(dest);
    if xz(ch.position).distance(xz(center)) <= ctx.config.arrival_radius {
        ch.velocity = Vec3::ZERO;
        ch.face(ctx.player.position);
        ch.change_state(AiState::Chase);
    } else {
        ch.velocity = from_xz(seek(xz(ch.position), xz(center), ch.desc.speed));
    }
}

fn run_away(ch: &mut Character, ctx: &AiContext<'_>) {
    if ch.state_timer() >= ch.desc.run_away_duration {
        ch.change_state(AiState::Chase);
        return;
    }
    ch.velocity = from_xz(flee(xz(ch.position), xz(ctx.player.position), ch.desc.speed));
}

// ============================================================================
// Helpers
// ============================================================================

fn should_flee(ch: &Character) -> bool {
    !ch.has_fled
        && ch
            .desc
            .flee_below
            .is_some_and(|f| ch.health() < f * ch.max_health())
}

/// Dungeon to navigate by grid, if this agent uses the grid here.
fn grid_dungeon<'a>(ch: &Character, env: &'a Environment) -> Option<&'a Dungeon> {
    env.dungeon().filter(|_| ch.desc.capabilities.uses_grid)
}

fn plan_path(ch: &mut Character, d: &Dungeon, from: TileCoord, to: TileCoord, cfg: &AiConfig) {
    let tiles = find_path(&d.grid, from, to);
    let smoothed = smooth_tile_path(&d.grid, &tiles);
    ch.path = WaypointPath::from_tiles(&smoothed, &d.mapping, ch.position.y);
    ch.repath_timer = cfg.repath_interval;
}

/// Seeks the next waypoint. Returns false once the path is exhausted.
fn follow_path(ch: &mut Character, cfg: &AiConfig) -> bool {
    while ch.path.advance(ch.position, cfg.arrival_radius) {}
    match ch.path.next() {
        Some(wp) => {
            ch.velocity = from_xz(seek(xz(ch.position), xz(wp), ch.desc.speed));
            true
        }
        None => {
            ch.velocity = Vec3::ZERO;
            false
        }
    }
}

/// Outdoor pursuit: arrive at the target while pushing away from neighbors.
/// A pack member circles instead while a lower-handled ally of its kind is
/// already attacking.
fn steer_chase(handle: AgentHandle, ch: &mut Character, ctx: &AiContext<'_>, target: Vec3) {
    let pos = xz(ch.position);
    let cfg = ctx.config;
    let others = ctx
        .agents
        .iter()
        .filter(|a| a.alive && a.handle != handle)
        .map(|a| xz(a.position));
    let repel = compute_repulsion(pos, others, cfg.repulsion_radius, cfg.repulsion_strength);

    let pack_engaged = ctx
        .agents
        .iter()
        .any(|a| a.alive && a.handle < handle && a.kind == ch.kind && a.state.is_attacking());
    let base = if pack_engaged && pos.distance(xz(target)) <= cfg.orbit_radius * 1.5 {
        orbit(pos, xz(target), cfg.orbit_radius, ch.orbit_clockwise, 1.0, 1.0, ch.desc.speed)
    } else {
        arrive(pos, xz(target), ch.desc.speed, ch.desc.attack_range * 0.5)
    };
    ch.velocity = from_xz((base + repel).clamp_length_max(ch.desc.speed));
}

/// Occupancy arbitration. When a live agent with a smaller handle stands on
/// this agent's tile and is itself chasing or attacking, this agent moves to
/// a free tile next to the player.
/// Returns true if it entered Reposition.
fn back_off(handle: AgentHandle, ch: &mut Character, ctx: &AiContext<'_>) -> bool {
    let Some(d) = grid_dungeon(ch, ctx.env) else {
        return false;
    };
    let here = d.world_to_tile(ch.position);
    let yields = ctx
        .agents
        .iter()
        .any(|a| a.alive && a.handle < handle && a.tile == here && a.state.is_engaging());
    if !yields {
        return false;
    }
    let player_tile = d.world_to_tile(ctx.player.position);
    let Some(dest) = choose_reposition_tile(&d.grid, handle, here, player_tile, ctx.player.forward, ctx.agents) else {
        return false;
    };
    ch.change_state(AiState::Reposition);
    ch.reposition_target = Some(dest);
    plan_path(ch, d, here, dest, ctx.config);
    true
}

/// Tiles around the player in preference order: front, back, left, right
/// relative to the player's facing.
#[must_use]
pub fn reposition_candidates(player_tile: TileCoord, facing: Vec3) -> [TileCoord; 4] {
    // Tile axes run opposite to world X and Z.
    let (fx, fy) = if facing.x.abs() >= facing.z.abs() {
        (-(facing.x.signum() as i32), 0)
    } else {
        (0, -(facing.z.signum() as i32))
    };
    [
        player_tile.offset(fx, fy),
        player_tile.offset(-fx, -fy),
        player_tile.offset(-fy, fx),
        player_tile.offset(fy, -fx),
    ]
}

/// Picks the first candidate that is walkable, not occupied by another live
/// agent, and reachable from `from`.
#[must_use]
pub fn choose_reposition_tile(
    grid: &WalkableGrid,
    me: AgentHandle,
    from: TileCoord,
    player_tile: TileCoord,
    facing: Vec3,
    agents: &[AgentSnapshot],
) -> Option<TileCoord> {
    reposition_candidates(player_tile, facing).into_iter().find(|&t| {
        grid.is_walkable(t)
            && !agents.iter().any(|a| a.alive && a.handle != me && a.tile == t)
            && !find_path(grid, from, t).is_empty()
    })
}

fn integrate(ch: &mut Character, env: &Environment, dt: f32) {
    if ch.velocity == Vec3::ZERO {
        return;
    }
    ch.position += ch.velocity * dt;
    ch.position.y = env.floor_height(ch.position);
    if !ch.state().is_attacking() {
        let v = ch.velocity;
        ch.face(ch.position + Vec3::new(v.x, 0.0, v.z));
    }
}
