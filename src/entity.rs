//! Entity identifiers and references.
//!
//! Entities refer to each other only through [`EntityReference`] values,
//! never through pointers, so a reference to an entity that has not been
//! created yet (or was already destroyed) is always representable.

use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Stable entity identifier. Zero is reserved and never names an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(NonZeroU32);

impl EntityId {
    /// Creates an id, returning `None` for the reserved value 0.
    #[inline]
    #[must_use]
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    #[inline]
    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A by-id or by-name reference to another entity.
///
/// The string form is what gets persisted: an empty string is
/// [`EntityReference::None`], a positive integer is an id and anything else
/// is a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityReference {
    #[default]
    None,
    Id(EntityId),
    Name(String),
}

impl EntityReference {
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, EntityReference::None)
    }

    /// Returns `true` if this reference addresses the given entity.
    #[must_use]
    pub fn refers_to(&self, entity: &Entity) -> bool {
        match self {
            EntityReference::None => false,
            EntityReference::Id(id) => *id == entity.id,
            EntityReference::Name(name) => !entity.name.is_empty() && *name == entity.name,
        }
    }
}

impl From<EntityId> for EntityReference {
    fn from(id: EntityId) -> Self {
        EntityReference::Id(id)
    }
}

impl From<&str> for EntityReference {
    fn from(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return EntityReference::None;
        }
        match s.parse::<u32>() {
            Ok(raw) => EntityId::new(raw).map_or(EntityReference::None, EntityReference::Id),
            Err(_) => EntityReference::Name(s.to_string()),
        }
    }
}

impl From<String> for EntityReference {
    fn from(s: String) -> Self {
        EntityReference::from(s.as_str())
    }
}

impl From<EntityReference> for String {
    fn from(r: EntityReference) -> Self {
        r.to_string()
    }
}

impl fmt::Display for EntityReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityReference::None => Ok(()),
            EntityReference::Id(id) => write!(f, "{id}"),
            EntityReference::Name(name) => f.write_str(name),
        }
    }
}

/// Component kinds the hierarchy cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentType {
    Placeable,
    Mesh,
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentType::Placeable => f.write_str("Placeable"),
            ComponentType::Mesh => f.write_str("Mesh"),
        }
    }
}

/// Registry entry for one entity.
///
/// Component data lives in the scene's component maps; the entity only
/// records which components it carries, in insertion order.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub(crate) components: SmallVec<[ComponentType; 4]>,
}

impl Entity {
    #[must_use]
    pub fn new(id: EntityId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            components: SmallVec::new(),
        }
    }

    /// Component types in the order they were added.
    #[inline]
    #[must_use]
    pub fn components(&self) -> &[ComponentType] {
        &self.components
    }

    #[inline]
    #[must_use]
    pub fn has_component(&self, component: ComponentType) -> bool {
        self.components.contains(&component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_id_is_reserved() {
        assert!(EntityId::new(0).is_none());
        assert_eq!(EntityId::new(7).map(EntityId::get), Some(7));
    }

    #[test]
    fn reference_parses_ids_and_names() {
        assert_eq!(EntityReference::from(""), EntityReference::None);
        assert_eq!(EntityReference::from("0"), EntityReference::None);
        assert_eq!(
            EntityReference::from(" 12 "),
            EntityReference::Id(EntityId::new(12).unwrap())
        );
        assert_eq!(
            EntityReference::from("Avatar"),
            EntityReference::Name("Avatar".to_string())
        );
    }

    #[test]
    fn reference_string_form_survives_json() {
        let r = EntityReference::Id(EntityId::new(5).unwrap());
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, "\"5\"");
        let back: EntityReference = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn name_reference_ignores_unnamed_entities() {
        let e = Entity::new(EntityId::new(3).unwrap(), "");
        assert!(!EntityReference::Name(String::new()).refers_to(&e));
        assert!(EntityReference::Id(e.id).refers_to(&e));
    }
}
