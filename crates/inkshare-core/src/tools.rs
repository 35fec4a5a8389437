//! Tool selection and brush settings.

use crate::config::CanvasConfig;
use serde::{Deserialize, Serialize};

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolMode {
    #[default]
    Pen,
    /// Wide pen.
    Marker,
    /// Removes whole strokes under the pointer.
    Eraser,
}

impl ToolMode {
    /// True for tools that author new strokes.
    pub fn draws(self) -> bool {
        matches!(self, ToolMode::Pen | ToolMode::Marker)
    }
}

/// Current tool plus brush color/size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSettings {
    pub mode: ToolMode,
    pub color: String,
    pub size: f64,
    /// Supported-pointer filter: stylus and mouse only.
    pub stylus_only: bool,
}

impl ToolSettings {
    pub fn from_config(config: &CanvasConfig) -> Self {
        Self {
            mode: ToolMode::Pen,
            color: config.default_color.clone(),
            size: config.clamp_size(config.default_size),
            stylus_only: config.stylus_only,
        }
    }

    /// Apply a new tool selection, clamping the size.
    pub fn set(&mut self, mode: ToolMode, color: &str, size: f64, config: &CanvasConfig) {
        self.mode = mode;
        if !color.trim().is_empty() {
            self.color = color.trim().to_string();
        }
        self.size = config.clamp_size(size);
    }

    /// Width of a stroke started with the current settings.
    pub fn stroke_width(&self, config: &CanvasConfig) -> f64 {
        match self.mode {
            ToolMode::Marker => self.size.max(config.marker_min_width),
            ToolMode::Pen | ToolMode::Eraser => self.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_config() {
        let config = CanvasConfig::default();
        let tools = ToolSettings::from_config(&config);
        assert_eq!(tools.mode, ToolMode::Pen);
        assert_eq!(tools.color, "#111827");
        assert_eq!(tools.size, 2.2);
    }

    #[test]
    fn test_set_clamps_and_keeps_color() {
        let config = CanvasConfig::default();
        let mut tools = ToolSettings::from_config(&config);
        tools.set(ToolMode::Pen, "#ef4444", 40.0, &config);
        assert_eq!(tools.size, 12.0);
        assert_eq!(tools.color, "#ef4444");

        tools.set(ToolMode::Eraser, "", 3.0, &config);
        assert_eq!(tools.color, "#ef4444");
        assert!(!tools.mode.draws());
    }

    #[test]
    fn test_marker_width() {
        let config = CanvasConfig::default();
        let mut tools = ToolSettings::from_config(&config);
        tools.set(ToolMode::Marker, "#000", 3.0, &config);
        assert_eq!(tools.stroke_width(&config), 12.0);
        tools.set(ToolMode::Pen, "#000", 3.0, &config);
        assert_eq!(tools.stroke_width(&config), 3.0);
    }
}
