//! Change-tracked attribute slots.
//!
//! An [`Attribute`] holds one typed value of a component together with a
//! changed flag and static metadata. Components expose setters that call
//! [`Attribute::set`] and then run their `attributes_changed` hook before
//! returning; the hook inspects [`Attribute::value_changed`] and clears the
//! flag once it has consumed the change.

use serde::{Deserialize, Serialize};

/// How a write to an attribute should be propagated to peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReplicationScope {
    /// Use the attribute's normal replication behaviour.
    #[default]
    Default,
    /// Apply locally, never send.
    LocalOnly,
    /// Change originates from the authoritative peer.
    ReplicateAuthoritative,
    /// Change was made while disconnected from any peer.
    Disconnected,
}

/// Static description of an attribute, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeMetadata {
    /// Persisted / replicated name.
    pub name: &'static str,
    /// Peers may interpolate between received values.
    pub interpolated: bool,
    /// Shown in editors.
    pub designable: bool,
}

impl AttributeMetadata {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            interpolated: false,
            designable: true,
        }
    }

    #[must_use]
    pub const fn interpolated(mut self) -> Self {
        self.interpolated = true;
        self
    }

    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.designable = false;
        self
    }
}

/// A typed, change-tracked value slot owned by a component.
#[derive(Debug, Clone)]
pub struct Attribute<T> {
    value: T,
    changed: bool,
    scope: ReplicationScope,
    meta: AttributeMetadata,
}

impl<T: PartialEq> Attribute<T> {
    #[must_use]
    pub fn new(value: T, meta: AttributeMetadata) -> Self {
        Self {
            value,
            changed: false,
            scope: ReplicationScope::Default,
            meta,
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Stores `value` if it differs from the current one.
    ///
    /// Returns `false` (and leaves the flag and scope untouched) when the new
    /// value compares equal to the stored one.
    pub fn set(&mut self, value: T, scope: ReplicationScope) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        self.changed = true;
        self.scope = scope;
        true
    }

    /// Whether the value changed since the owner last cleared the flag.
    #[inline]
    #[must_use]
    pub fn value_changed(&self) -> bool {
        self.changed
    }

    #[inline]
    pub fn clear_changed(&mut self) {
        self.changed = false;
    }

    /// Scope recorded by the last effective `set`.
    #[inline]
    #[must_use]
    pub fn scope(&self) -> ReplicationScope {
        self.scope
    }

    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &AttributeMetadata {
        &self.meta
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.meta.name
    }
}
