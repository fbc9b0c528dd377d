//! One-shot wait subscriptions of unresolved placeables.
//!
//! A placeable that cannot resolve its parent registers the event it is
//! waiting for. When the scene emits that event the waiter list is taken
//! (and thereby removed) and each waiter re-resolves. Resolving, and
//! destroying a placeable, cancel all of its remaining subscriptions.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::entity::{ComponentType, EntityId, EntityReference};

/// An event an unresolved placeable can wait for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// An entity matching the reference was created.
    EntityCreated(EntityReference),
    /// A component of the given type was added to the entity.
    ComponentAdded(EntityId, ComponentType),
    /// The entity's mesh (re)loaded its skeleton or was removed.
    MeshChanged(EntityId),
}

#[derive(Debug, Default)]
pub struct Subscriptions {
    by_trigger: FxHashMap<Trigger, SmallVec<[EntityId; 2]>>,
    by_waiter: FxHashMap<EntityId, SmallVec<[Trigger; 2]>>,
}

impl Subscriptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, waiter: EntityId, trigger: Trigger) {
        let waiters = self.by_trigger.entry(trigger.clone()).or_default();
        if waiters.contains(&waiter) {
            return;
        }
        waiters.push(waiter);
        self.by_waiter.entry(waiter).or_default().push(trigger);
    }

    /// Removes every subscription held by `waiter`.
    pub fn cancel_all(&mut self, waiter: EntityId) {
        let Some(triggers) = self.by_waiter.remove(&waiter) else {
            return;
        };
        for trigger in triggers {
            if let Some(waiters) = self.by_trigger.get_mut(&trigger) {
                waiters.retain(|w| *w != waiter);
                if waiters.is_empty() {
                    self.by_trigger.remove(&trigger);
                }
            }
        }
    }

    /// Takes all waiters of `trigger`, consuming their subscription to it.
    pub fn take(&mut self, trigger: &Trigger) -> SmallVec<[EntityId; 2]> {
        let Some(waiters) = self.by_trigger.remove(trigger) else {
            return SmallVec::new();
        };
        for waiter in &waiters {
            if let Some(triggers) = self.by_waiter.get_mut(waiter) {
                triggers.retain(|t| t != trigger);
                if triggers.is_empty() {
                    self.by_waiter.remove(waiter);
                }
            }
        }
        waiters
    }

    /// Events `waiter` currently waits for.
    #[must_use]
    pub fn triggers_of(&self, waiter: EntityId) -> &[Trigger] {
        self.by_waiter.get(&waiter).map(|t| t.as_slice()).unwrap_or(&[])
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_trigger.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u32) -> EntityId {
        EntityId::new(raw).unwrap()
    }

    #[test]
    fn take_is_one_shot() {
        let mut subs = Subscriptions::new();
        let trigger = Trigger::EntityCreated(EntityReference::Id(id(9)));
        subs.subscribe(id(1), trigger.clone());
        subs.subscribe(id(2), trigger.clone());
        subs.subscribe(id(1), trigger.clone());

        assert_eq!(subs.take(&trigger).as_slice(), &[id(1), id(2)]);
        assert!(subs.take(&trigger).is_empty());
        assert!(subs.triggers_of(id(1)).is_empty());
        assert!(subs.is_empty());
    }

    #[test]
    fn cancel_leaves_other_waiters() {
        let mut subs = Subscriptions::new();
        let mesh = Trigger::MeshChanged(id(5));
        let placeable = Trigger::ComponentAdded(id(5), ComponentType::Placeable);
        subs.subscribe(id(1), mesh.clone());
        subs.subscribe(id(1), placeable.clone());
        subs.subscribe(id(2), mesh.clone());

        subs.cancel_all(id(1));
        assert!(subs.triggers_of(id(1)).is_empty());
        assert!(subs.take(&placeable).is_empty());
        assert_eq!(subs.take(&mesh).as_slice(), &[id(2)]);
    }
}
