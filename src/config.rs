use serde::{Deserialize, Serialize};

use crate::buffer_pool::DEFAULT_IDLE_MS;

/// Tilemap settings.  Every field has a default, so a partial JSON object
/// (or `{}`) is a valid config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilemapConfig {
    pub tile_width: u32,
    pub tile_height: u32,
    /// Visible area in pixels.
    pub width: u32,
    pub height: u32,
    /// Extra pixels painted around the visible area.
    pub margin: u32,
    /// Draw square records through the instanced path.  Maps with non-square
    /// tiles need the rect path.
    pub square_shader: bool,
    /// Update ticks per animation frame.
    pub animation_interval: u32,
    pub shadow_color: [f32; 4],
    /// Idle time before an unused vertex buffer is reclaimed.
    pub buffer_idle_ms: u64,
}

impl Default for TilemapConfig {
    fn default() -> Self {
        Self {
            tile_width: 48,
            tile_height: 48,
            width: 816,
            height: 624,
            margin: 20,
            square_shader: true,
            animation_interval: 30,
            shadow_color: [0.0, 0.0, 0.0, 0.5],
            buffer_idle_ms: DEFAULT_IDLE_MS,
        }
    }
}

impl TilemapConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
