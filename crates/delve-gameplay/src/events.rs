//! Event bus carrying combat and world events to external observers.
//!
//! The simulation only publishes. Audio, particles and UI drain the bus
//! after each step.

use crate::behavior::CharacterKind;
use crate::character::AiState;
use crate::projectile::BulletKind;
use crossbeam_channel::{bounded, Receiver, Sender};
use delve_common::{AgentHandle, BulletId, TileCoord};
use delve_world::PickupKind;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Who received damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageTarget {
    /// The player
    Player,
    /// An agent
    Agent(AgentHandle),
}

/// Events emitted by the gameplay core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// Something took damage
    Damaged {
        /// Damaged target
        target: DamageTarget,
        /// Damage dealt
        amount: f32,
        /// Health left
        remaining: f32,
    },
    /// Blood effect should play (at most once per stagger)
    Bleed {
        /// Bleeding target
        target: DamageTarget,
        /// Effect position
        position: Vec3,
    },
    /// An agent changed AI state
    StateChanged {
        /// Agent
        agent: AgentHandle,
        /// Previous state
        from: AiState,
        /// New state
        to: AiState,
    },
    /// An agent died
    Died {
        /// Agent
        agent: AgentHandle,
        /// Character kind
        kind: CharacterKind,
        /// Death position
        position: Vec3,
    },
    /// A dead agent was removed from the world
    Removed {
        /// Agent
        agent: AgentHandle,
    },
    /// An agent was spawned
    Spawned {
        /// Agent
        agent: AgentHandle,
        /// Character kind
        kind: CharacterKind,
        /// Spawn position
        position: Vec3,
    },
    /// A projectile was fired
    ProjectileFired {
        /// Projectile
        id: BulletId,
        /// Projectile kind
        kind: BulletKind,
        /// Muzzle position
        position: Vec3,
        /// Fired by an enemy
        enemy_owned: bool,
    },
    /// A magic projectile exploded
    Explosion {
        /// Projectile
        id: BulletId,
        /// Projectile kind
        kind: BulletKind,
        /// Blast center
        position: Vec3,
        /// Blast radius
        radius: f32,
    },
    /// A hurt agent alerted nearby allies
    Alert {
        /// Hurt agent
        source: AgentHandle,
        /// Allies pulled into chase
        alerted: u32,
    },
    /// A barrel was smashed
    BarrelDestroyed {
        /// Barrel position
        position: Vec3,
        /// Whether it dropped loot
        dropped_loot: bool,
    },
    /// A spider web was cut
    WebDestroyed {
        /// Web position
        position: Vec3,
    },
    /// The player collected an item
    PickupCollected {
        /// Item kind
        kind: PickupKind,
        /// Item position
        position: Vec3,
    },
    /// A door opened
    DoorOpened {
        /// Door tile
        tile: TileCoord,
        /// Whether a key was spent
        used_key: bool,
    },
    /// The player died
    PlayerDied,
    /// A level finished loading
    LevelLoaded {
        /// Agents spawned from markers
        agents: u32,
    },
}

/// Bounded event queue between the simulation and its observers.
#[derive(Debug)]
pub struct EventBus {
    sender: Sender<CombatEvent>,
    receiver: Receiver<CombatEvent>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes an event. Dropped silently when the queue is full.
    pub fn publish(&self, event: CombatEvent) {
        let _ = self.sender.try_send(event);
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<CombatEvent> {
        self.receiver.try_iter().collect()
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a receiver handle for an observer on another thread.
    #[must_use]
    pub fn subscriber(&self) -> Receiver<CombatEvent> {
        self.receiver.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_drain() {
        let bus = EventBus::new(8);
        bus.publish(CombatEvent::PlayerDied);
        bus.publish(CombatEvent::LevelLoaded { agents: 3 });
        assert_eq!(bus.pending_count(), 2);
        let events = bus.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], CombatEvent::PlayerDied);
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_full_bus_drops() {
        let bus = EventBus::new(1);
        bus.publish(CombatEvent::PlayerDied);
        bus.publish(CombatEvent::PlayerDied);
        assert_eq!(bus.drain().len(), 1);
        assert_eq!(bus.capacity(), 1);
    }
}
