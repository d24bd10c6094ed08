//! Generational arena owning the agents of a world.

use delve_common::AgentHandle;

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage with free-list reuse and generation-checked handles.
///
/// Removing a value bumps its slot generation, so handles to removed values
/// stop resolving even after the slot is reused.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    /// Creates an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Creates an empty arena with room for `capacity` values.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Returns the number of live values.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the arena holds no values.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a value and returns its handle.
    pub fn insert(&mut self, value: T) -> AgentHandle {
        self.len += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return AgentHandle::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        AgentHandle::new(index, 0)
    }

    /// Removes a value. Stale handles return `None`.
    pub fn remove(&mut self, handle: AgentHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index());
        self.len -= 1;
        Some(value)
    }

    /// Returns true if the handle resolves to a live value.
    #[must_use]
    pub fn contains(&self, handle: AgentHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Gets a value by handle.
    #[must_use]
    pub fn get(&self, handle: AgentHandle) -> Option<&T> {
        self.slots
            .get(handle.index() as usize)
            .filter(|s| s.generation == handle.generation())
            .and_then(|s| s.value.as_ref())
    }

    /// Gets a value mutably by handle.
    pub fn get_mut(&mut self, handle: AgentHandle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|s| s.generation == handle.generation())
            .and_then(|s| s.value.as_mut())
    }

    /// Iterates live values with their handles, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (AgentHandle, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.value
                .as_ref()
                .map(|v| (AgentHandle::new(i as u32, s.generation), v))
        })
    }

    /// Iterates live values mutably with their handles, in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (AgentHandle, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, s)| {
            let generation = s.generation;
            s.value
                .as_mut()
                .map(|v| (AgentHandle::new(i as u32, generation), v))
        })
    }

    /// Returns the handles of all live values.
    #[must_use]
    pub fn handles(&self) -> Vec<AgentHandle> {
        self.iter().map(|(h, _)| h).collect()
    }

    /// Removes every value matching `pred` and returns their handles.
    pub fn sweep(&mut self, mut pred: impl FnMut(&T) -> bool) -> Vec<AgentHandle> {
        let doomed: Vec<AgentHandle> = self
            .iter()
            .filter(|(_, v)| pred(v))
            .map(|(h, _)| h)
            .collect();
        for handle in &doomed {
            self.remove(*handle);
        }
        doomed
    }

    /// Removes every value. Outstanding handles stop resolving.
    pub fn clear(&mut self) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free_list.push(i as u32);
            }
        }
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let mut arena = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.remove(a), Some("a"));
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_stale_handle_after_reuse() {
        let mut arena = Arena::new();
        let a = arena.insert(1);
        arena.remove(a);
        let c = arena.insert(3);
        assert_eq!(c.index(), a.index());
        assert_ne!(c.generation(), a.generation());
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(c), Some(&3));
        assert!(arena.remove(a).is_none());
    }

    #[test]
    fn test_sweep() {
        let mut arena = Arena::new();
        for i in 0..6 {
            arena.insert(i);
        }
        let removed = arena.sweep(|v| v % 2 == 0);
        assert_eq!(removed.len(), 3);
        assert_eq!(arena.len(), 3);
        assert!(arena.iter().all(|(_, v)| v % 2 == 1));
    }

    #[test]
    fn test_clear_invalidates() {
        let mut arena = Arena::new();
        let a = arena.insert(1);
        arena.clear();
        assert!(arena.is_empty());
        assert!(!arena.contains(a));
    }
}
