//! Canvas configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Tunables for one participant's canvas.
///
/// Every field has a default, so a partial JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Logical canvas width in canvas units.
    pub width: f64,
    /// Logical canvas height in canvas units.
    pub height: f64,
    /// Initial pen color.
    pub default_color: String,
    /// Initial pen size.
    pub default_size: f64,
    pub min_size: f64,
    pub max_size: f64,
    /// Marker strokes are at least this wide.
    pub marker_min_width: f64,
    /// Accept stylus and mouse only (true) or also touch (false).
    pub stylus_only: bool,
    /// Moves closer than this to the previous point are dropped. 0 keeps all.
    pub min_point_distance: f64,
    /// Remote removals only delete strokes owned by the message's owner.
    pub owner_scoped_removal: bool,
    /// Optional cap on the undo stack.
    pub history_limit: Option<usize>,
    /// Prefix for the generated local identity.
    pub role: String,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            default_color: "#111827".to_string(),
            default_size: 2.2,
            min_size: 1.0,
            max_size: 12.0,
            marker_min_width: 12.0,
            stylus_only: true,
            min_point_distance: 0.0,
            owner_scoped_removal: true,
            history_limit: None,
            role: "participant".to_string(),
        }
    }
}

impl CanvasConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Clamp a brush size into `[min_size, max_size]`.
    ///
    /// Non-finite sizes fall back to the default size.
    pub fn clamp_size(&self, size: f64) -> f64 {
        let size = if size.is_finite() && size > 0.0 { size } else { self.default_size };
        size.clamp(self.min_size, self.max_size.max(self.min_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CanvasConfig::default();
        assert_eq!(config.default_color, "#111827");
        assert!(config.stylus_only);
        assert!(config.owner_scoped_removal);
    }

    #[test]
    fn test_partial_json() {
        let config = CanvasConfig::from_json(r#"{"role":"host","max_size":20.0}"#).unwrap();
        assert_eq!(config.role, "host");
        assert_eq!(config.max_size, 20.0);
        assert_eq!(config.min_size, 1.0);
    }

    #[test]
    fn test_invalid_json() {
        assert!(CanvasConfig::from_json("{not json").is_err());
    }

    #[test]
    fn test_clamp_size() {
        let config = CanvasConfig::default();
        assert_eq!(config.clamp_size(0.2), 1.0);
        assert_eq!(config.clamp_size(50.0), 12.0);
        assert_eq!(config.clamp_size(f64::NAN), 2.2);
        assert_eq!(config.clamp_size(4.0), 4.0);
    }
}
