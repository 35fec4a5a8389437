//! Pointer metadata fed into the capture state machine.

use serde::{Deserialize, Serialize};

/// Kind of device behind a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerKind {
    Mouse,
    Pen,
    Touch,
    /// The host could not tell.
    #[default]
    Unknown,
}

impl PointerKind {
    /// Parse a host-provided pointer type string (e.g. `"pen"`).
    pub fn parse(kind: &str) -> Self {
        match kind.trim().to_ascii_lowercase().as_str() {
            "mouse" => PointerKind::Mouse,
            "pen" | "stylus" => PointerKind::Pen,
            "touch" => PointerKind::Touch,
            _ => PointerKind::Unknown,
        }
    }
}

/// Metadata accompanying each pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PointerMeta {
    /// Host pointer id, if the platform provides one.
    pub pointer_id: Option<i64>,
    pub kind: PointerKind,
}

impl PointerMeta {
    pub fn new(pointer_id: Option<i64>, kind: PointerKind) -> Self {
        Self { pointer_id, kind }
    }

    pub fn mouse() -> Self {
        Self::new(Some(1), PointerKind::Mouse)
    }

    pub fn pen(pointer_id: i64) -> Self {
        Self::new(Some(pointer_id), PointerKind::Pen)
    }

    pub fn touch(pointer_id: i64) -> Self {
        Self::new(Some(pointer_id), PointerKind::Touch)
    }

    /// Supported-pointer filter.
    ///
    /// In stylus-only mode touch is rejected so a resting palm does not draw.
    pub fn is_supported(&self, stylus_only: bool) -> bool {
        match self.kind {
            PointerKind::Pen | PointerKind::Mouse | PointerKind::Unknown => true,
            PointerKind::Touch => !stylus_only,
        }
    }

    /// True if this event belongs to the gesture started by `active`.
    ///
    /// Events without an id, or gestures started without one, always match.
    pub fn matches(&self, active: Option<i64>) -> bool {
        match (active, self.pointer_id) {
            (Some(active), Some(id)) => active == id,
            _ => true,
        }
    }
}
