//! Combat resolution.
//!
//! [`CombatScene`] borrows the mutable parts of a world for one phase of a
//! frame and applies hits, explosions, melee and hazards. All health changes
//! go through [`Character::take_damage`] and [`Player::take_damage`], and
//! every outcome is published on the event bus.

use crate::arena::Arena;
use crate::character::{Character, DamageOutcome, HitReaction};
use crate::config::SimConfig;
use crate::events::{CombatEvent, DamageTarget, EventBus};
use crate::los::fan_line_of_sight;
use crate::player::Player;
use crate::projectile::{explosion_damage, Bullet, BulletKind, BulletStep};
use delve_common::{Aabb, AgentHandle};
use delve_world::{Environment, Pickup, PickupKind};
use glam::Vec3;
use tracing::debug;

/// First parameter along the segment `a -> b` at which it enters `aabb`.
#[must_use]
pub fn segment_hit(aabb: &Aabb, a: Vec3, b: Vec3) -> Option<f32> {
    let delta = b - a;
    let len = delta.length();
    if len <= f32::EPSILON {
        return aabb.contains(b).then_some(0.0);
    }
    aabb.ray_intersection(a, delta / len).filter(|t| *t <= len)
}

/// Axis-aligned box in front of a body, used for melee.
#[must_use]
pub fn forward_box(position: Vec3, forward: Vec3, height: f32, reach: f32, width: f32) -> Aabb {
    let fwd = Vec3::new(forward.x, 0.0, forward.z).normalize_or_zero();
    let center = position + fwd * (reach * 0.5) + Vec3::Y * (height * 0.5);
    let half = Vec3::new(
        fwd.x.abs() * reach * 0.5 + fwd.z.abs() * width * 0.5,
        height * 0.5,
        fwd.z.abs() * reach * 0.5 + fwd.x.abs() * width * 0.5,
    );
    Aabb::from_center(center, half)
}

/// What a player melee swing connected with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeleeReport {
    /// Barrels smashed
    pub barrels: u32,
    /// Webs cut
    pub webs: u32,
    /// Agents hit
    pub agents: Vec<AgentHandle>,
}

impl MeleeReport {
    /// Returns true if the swing hit nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.barrels == 0 && self.webs == 0 && self.agents.is_empty()
    }
}

/// Mutable view of a world for combat resolution.
#[derive(Debug)]
pub struct CombatScene<'a> {
    /// Agents
    pub agents: &'a mut Arena<Character>,
    /// Player
    pub player: &'a mut Player,
    /// Loaded world
    pub env: &'a mut Environment,
    /// Event output
    pub bus: &'a EventBus,
    /// Tuning
    pub config: &'a SimConfig,
}

impl CombatScene<'_> {
    // ------------------------------------------------------------------------
    // Damage
    // ------------------------------------------------------------------------

    /// Damages an agent, publishes the outcome, and alerts its allies.
    pub fn damage_agent(&mut self, handle: AgentHandle, amount: f32, reaction: HitReaction) -> Option<DamageOutcome> {
        let agent = self.agents.get_mut(handle)?;
        let out = agent.take_damage(amount, reaction);
        if out.applied <= 0.0 {
            return Some(out);
        }
        let position = agent.position;
        let kind = agent.kind;
        let bleed_at = agent.aabb().center();

        self.bus.publish(CombatEvent::Damaged {
            target: DamageTarget::Agent(handle),
            amount: out.applied,
            remaining: out.remaining,
        });
        if out.bleed {
            self.bus.publish(CombatEvent::Bleed {
                target: DamageTarget::Agent(handle),
                position: bleed_at,
            });
        }
        if out.killed {
            debug!("{kind:?} {handle} died");
            self.bus.publish(CombatEvent::Died {
                agent: handle,
                kind,
                position,
            });
        }
        self.broadcast_alert(handle);
        Some(out)
    }

    /// Damages the player and publishes the outcome.
    pub fn damage_player(&mut self, amount: f32) -> f32 {
        let was_alive = self.player.is_alive();
        let applied = self.player.take_damage(amount);
        if applied > 0.0 {
            self.bus.publish(CombatEvent::Damaged {
                target: DamageTarget::Player,
                amount: applied,
                remaining: self.player.health(),
            });
            if was_alive && !self.player.is_alive() {
                self.bus.publish(CombatEvent::PlayerDied);
            }
        }
        applied
    }

    /// Pulls idle or patrolling allies of `source` into Chase.
    ///
    /// An ally hears the alert within the source's hearing radius; in a
    /// dungeon the pixel-grid fan must also be clear between them. Returns
    /// how many allies were alerted.
    pub fn broadcast_alert(&mut self, source: AgentHandle) -> u32 {
        let Some(src) = self.agents.get(source) else {
            return 0;
        };
        let (origin, kind, hearing) = (src.position, src.kind, src.desc.hearing_radius);
        let player_pos = self.player.position;
        let dungeon = self.env.dungeon();
        let fan = &self.config.los.fan;

        let mut alerted = 0;
        for (handle, ally) in self.agents.iter_mut() {
            if handle == source
                || !ally.is_alive()
                || !ally.state().is_alertable()
                || !ally.kind.is_allied(kind)
                || ally.position.distance(origin) > hearing
            {
                continue;
            }
            if let Some(d) = dungeon {
                let a = d.mapping.world_to_tile_space(origin);
                let b = d.mapping.world_to_tile_space(ally.position);
                if !fan_line_of_sight(&d.grid, a, b, fan) {
                    continue;
                }
            }
            ally.perception.notify(player_pos);
            if ally.change_state(crate::character::AiState::Chase) {
                alerted += 1;
            }
        }
        if alerted > 0 {
            self.bus.publish(CombatEvent::Alert { source, alerted });
        }
        alerted
    }

    /// Resolves an agent's melee swing against the player.
    pub fn enemy_melee(&mut self, agent: AgentHandle, damage: f32, reach: f32) -> bool {
        let Some(a) = self.agents.get(agent) else {
            return false;
        };
        if !a.is_alive() || !self.player.is_alive() {
            return false;
        }
        let dx = a.position.x - self.player.position.x;
        let dz = a.position.z - self.player.position.z;
        if dx * dx + dz * dz > reach * reach {
            return false;
        }
        self.damage_player(damage) > 0.0
    }

    // ------------------------------------------------------------------------
    // Projectiles
    // ------------------------------------------------------------------------

    /// Tests every active bullet against, in order, the player (enemy shots
    /// only), live agents, and static colliders. The first match stops a
    /// plain bullet and detonates a magic one.
    pub fn resolve_bullet_hits(&mut self, bullets: &mut [Bullet]) {
        for bullet in bullets.iter_mut().filter(|b| b.is_active()) {
            let (a, b) = (bullet.prev_position, bullet.position);

            if bullet.enemy_owned
                && self.player.is_alive()
                && segment_hit(&self.player.aabb(), a, b).is_some()
            {
                self.damage_player(bullet.damage);
                self.contact(bullet);
                continue;
            }

            let victim = self
                .agents
                .iter()
                .filter(|(h, c)| c.is_alive() && Some(*h) != bullet.owner && can_hit(bullet, c))
                .filter_map(|(h, c)| segment_hit(&c.aabb(), a, b).map(|t| (t, h)))
                .min_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)));
            if let Some((_, handle)) = victim {
                let reaction = if bullet.kind == BulletKind::Iceball {
                    HitReaction::Freeze(self.config.combat.freeze_duration)
                } else {
                    HitReaction::Stagger
                };
                self.damage_agent(handle, bullet.damage, reaction);
                self.contact(bullet);
                continue;
            }

            let blocked = self
                .env
                .dungeon()
                .is_some_and(|d| d.geometry.bullet_colliders().any(|(_, aabb)| segment_hit(&aabb, a, b).is_some()));
            if blocked {
                self.contact(bullet);
            }
        }
    }

    fn contact(&mut self, bullet: &mut Bullet) {
        if bullet.on_contact() == BulletStep::Exploded {
            self.explode(bullet);
        }
    }

    /// Advances every bullet and detonates those that explode this frame.
    /// Homing enemy shots steer toward the player.
    pub fn update_projectiles(&mut self, bullets: &mut [Bullet], dt: f32) {
        let target = self.player.is_alive().then(|| self.player.chest());
        for bullet in bullets.iter_mut() {
            let homing = if bullet.enemy_owned { target } else { None };
            if bullet.update(dt, self.env, homing, &self.config.combat) == BulletStep::Exploded {
                self.explode(bullet);
            }
        }
    }

    /// Applies blast damage once. Every live agent in the radius is hit, and
    /// the player is hit separately whoever fired the shot. Iceballs freeze
    /// instead of staggering.
    pub fn explode(&mut self, bullet: &Bullet) {
        let cfg = &self.config.combat;
        let (radius, min, max) = (cfg.explosion_radius, cfg.explosion_min_damage, cfg.explosion_max_damage);
        let center = bullet.position;
        let reaction = if bullet.kind == BulletKind::Iceball {
            HitReaction::Freeze(cfg.freeze_duration)
        } else {
            HitReaction::Stagger
        };
        self.bus.publish(CombatEvent::Explosion {
            id: bullet.id,
            kind: bullet.kind,
            position: center,
            radius,
        });

        let hits: Vec<(AgentHandle, f32)> = self
            .agents
            .iter()
            .filter(|(_, c)| c.is_alive())
            .filter_map(|(h, c)| {
                let d = c.aabb().closest_point(center).distance(center);
                explosion_damage(d, radius, min, max).map(|dmg| (h, dmg))
            })
            .collect();
        for (handle, dmg) in hits {
            self.damage_agent(handle, dmg, reaction);
        }

        let d = self.player.aabb().closest_point(center).distance(center);
        if let Some(dmg) = explosion_damage(d, radius, min, max) {
            self.damage_player(dmg);
        }
    }

    // ------------------------------------------------------------------------
    // Player melee
    // ------------------------------------------------------------------------

    /// Swings the player's melee box. Smashes barrels (which may drop a
    /// potion), cuts webs, and hits agents not still immune from the last
    /// swing.
    pub fn player_melee(&mut self, rng: &mut fastrand::Rng) -> MeleeReport {
        let cfg = self.config.combat;
        let hitbox = forward_box(
            self.player.position,
            self.player.forward(),
            self.player.height,
            cfg.melee_reach,
            cfg.melee_width,
        );
        let mut report = MeleeReport::default();

        if let Some(d) = self.env.dungeon_mut() {
            let smashed: Vec<usize> = d
                .geometry
                .barrels
                .iter()
                .enumerate()
                .filter(|(_, b)| !b.destroyed && b.aabb.intersects(&hitbox))
                .map(|(i, _)| i)
                .collect();
            for i in smashed {
                if !d.destroy_barrel(i) {
                    continue;
                }
                let barrel = d.geometry.barrels[i];
                let dropped_loot = rng.f32() < cfg.loot_drop_chance;
                if dropped_loot {
                    d.geometry.pickups.push(Pickup {
                        tile: barrel.tile,
                        position: barrel.position,
                        kind: PickupKind::HealthPotion,
                        taken: false,
                    });
                }
                report.barrels += 1;
                self.bus.publish(CombatEvent::BarrelDestroyed {
                    position: barrel.position,
                    dropped_loot,
                });
            }

            for web in d.geometry.webs.iter_mut().filter(|w| !w.destroyed && w.aabb.intersects(&hitbox)) {
                web.destroyed = true;
                report.webs += 1;
                self.bus.publish(CombatEvent::WebDestroyed { position: web.position });
            }
        }

        let targets: Vec<AgentHandle> = self
            .agents
            .iter()
            .filter(|(_, c)| c.is_alive() && c.melee_hit_cooldown <= 0.0 && c.aabb().intersects(&hitbox))
            .map(|(h, _)| h)
            .collect();
        for handle in targets {
            if let Some(c) = self.agents.get_mut(handle) {
                c.melee_hit_cooldown = cfg.melee_hit_cooldown;
            }
            self.damage_agent(handle, cfg.melee_damage, HitReaction::Stagger);
            report.agents.push(handle);
        }
        report
    }

    // ------------------------------------------------------------------------
    // Hazards and pickups
    // ------------------------------------------------------------------------

    /// Burns the player and agents standing on lava once per lava interval.
    pub fn apply_lava(&mut self, dt: f32) {
        let cfg = self.config.combat;
        if cfg.lava_interval <= 0.0 {
            return;
        }

        let mut burns = 0;
        if self.player.is_alive() && self.env.is_lava_at(self.player.position) {
            self.player.lava_timer += dt;
            while self.player.lava_timer >= cfg.lava_interval {
                self.player.lava_timer -= cfg.lava_interval;
                burns += 1;
            }
        } else {
            self.player.lava_timer = 0.0;
        }
        for _ in 0..burns {
            self.damage_player(cfg.lava_damage);
        }

        let mut burning = Vec::new();
        for (handle, c) in self.agents.iter_mut().filter(|(_, c)| c.is_alive()) {
            if !self.env.is_lava_at(c.position) {
                c.lava_timer = 0.0;
                continue;
            }
            c.lava_timer += dt;
            while c.lava_timer >= cfg.lava_interval {
                c.lava_timer -= cfg.lava_interval;
                burning.push(handle);
            }
        }
        for handle in burning {
            self.damage_agent(handle, cfg.lava_damage, HitReaction::Stagger);
        }
    }

    /// Collects pickups within reach of the player. Potions heal, keys are
    /// added to the key count.
    pub fn collect_pickups(&mut self) -> u32 {
        let radius = self.config.combat.pickup_radius;
        let heal = self.config.combat.potion_heal;
        let Some(d) = self.env.dungeon_mut() else {
            return 0;
        };
        if !self.player.is_alive() {
            return 0;
        }
        let mut collected = 0;
        let p = self.player.position;
        for item in d.geometry.pickups.iter_mut().filter(|i| !i.taken) {
            let dx = item.position.x - p.x;
            let dz = item.position.z - p.z;
            if dx * dx + dz * dz > radius * radius {
                continue;
            }
            match item.kind {
                PickupKind::HealthPotion => {
                    self.player.heal(heal);
                }
                PickupKind::Key => self.player.keys += 1,
            }
            item.taken = true;
            collected += 1;
            self.bus.publish(CombatEvent::PickupCollected {
                kind: item.kind,
                position: item.position,
            });
        }
        collected
    }
}

/// Friendly-fire rule. Player shots hit every agent. Enemy shots only hit
/// agents of the firing kind, and only for kinds whose bullets hurt their own.
fn can_hit(bullet: &Bullet, target: &Character) -> bool {
    if !bullet.enemy_owned {
        return true;
    }
    bullet.owner_kind == Some(target.kind) && target.desc.bullets_hit_same_kind
}
