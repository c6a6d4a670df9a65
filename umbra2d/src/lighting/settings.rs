use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::lighting::error::LightingError;

/// Per-scene lighting configuration.
///
/// Missing fields fall back to their defaults when deserializing, so a
/// settings file only needs to mention what it changes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingSettings {
    /// Linear RGB tint of the unlit baseline.
    pub ambient_color: [f32; 3],
    /// Baseline brightness applied everywhere before any light is added.
    pub ambient_intensity: f32,
    /// Global kill switch for shadows, independent of `Light::cast_shadows`.
    pub enable_shadows: bool,
}

impl LightingSettings {
    /// Color the light accumulation buffer starts from each frame.
    pub fn ambient_clear_color(&self) -> [f32; 3] {
        let i = self.ambient_intensity;
        [
            self.ambient_color[0] * i,
            self.ambient_color[1] * i,
            self.ambient_color[2] * i,
        ]
    }

    pub fn from_json(json: &str) -> Result<Self, LightingError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, LightingError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LightingError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LightingError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl Default for LightingSettings {
    fn default() -> Self {
        Self {
            ambient_color: [1.0, 1.0, 1.0],
            ambient_intensity: 0.15,
            enable_shadows: true,
        }
    }
}
