//! Scene configuration.
//!
//! [`SceneSettings`] gathers the few tunables of the hierarchy. It is passed
//! to [`Scene::with_settings`](crate::scene::Scene::with_settings) at
//! construction; nothing reads settings from global state.
//!
//! ```rust,ignore
//! let settings = SceneSettings {
//!     min_scale: 1e-4,
//!     ..Default::default()
//! };
//! let scene = Scene::with_settings(NodeArena::new(), settings);
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    /// Lower bound applied to every scale axis of a placeable transform.
    ///
    /// Keeps composed matrices invertible. Must be positive.
    pub min_scale: f32,

    /// Log a warning when a placeable names a bone its target skeleton lacks.
    ///
    /// The fallback attachment happens regardless; this only controls noise
    /// while assets stream in.
    pub warn_on_missing_bone: bool,

    /// First id handed out by [`Scene::create_entity`](crate::scene::Scene::create_entity).
    pub first_entity_id: u32,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            min_scale: 1e-6,
            warn_on_missing_bone: true,
            first_entity_id: 1,
        }
    }
}

impl SceneSettings {
    /// Parses settings from JSON. Missing fields take their default value.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut settings: SceneSettings = serde_json::from_str(json)?;
        settings.sanitize();
        Ok(settings)
    }

    /// Replaces out-of-range values with their defaults.
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        if !(self.min_scale.is_finite() && self.min_scale > 0.0) {
            log::warn!(
                "Invalid min_scale {}, using {}",
                self.min_scale,
                defaults.min_scale
            );
            self.min_scale = defaults.min_scale;
        }
        if self.first_entity_id == 0 {
            self.first_entity_id = defaults.first_entity_id;
        }
    }
}
