//! Stroke model.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable network-wide stroke identifier.
pub type StrokeId = String;

/// Identity tag of a participant.
pub type ParticipantId = String;

/// Generate a participant identity of the form `<role>-<uuid>`.
pub fn generate_participant_id(role: &str) -> ParticipantId {
    let role = role.trim().to_lowercase();
    let role = if role.is_empty() { "participant" } else { role.as_str() };
    format!("{}-{}", role, Uuid::new_v4())
}

/// Generate a fresh stroke id.
pub fn generate_stroke_id() -> StrokeId {
    Uuid::new_v4().to_string()
}

/// One continuous mark on the canvas.
///
/// Points are appended only while the stroke is being authored; once
/// committed the stroke is never mutated again. A single point renders as a
/// dot, two or more as a polyline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    #[serde(default)]
    pub id: StrokeId,
    #[serde(default)]
    pub owner: ParticipantId,
    pub color: String,
    pub width: f64,
    #[serde(default)]
    pub is_erase_stroke: bool,
    pub points: Vec<Point>,
}

impl Stroke {
    /// Create a stroke with a fresh id, owned by `owner`, starting at `start`.
    pub fn begin(owner: &str, color: impl Into<String>, width: f64, start: Point) -> Self {
        let mut stroke = Self {
            id: StrokeId::new(),
            owner: ParticipantId::new(),
            color: color.into(),
            width,
            is_erase_stroke: false,
            points: vec![start],
        };
        stroke.ensure_identity(owner);
        stroke
    }

    /// Assign `id` and `owner` if they are not set yet.
    ///
    /// Idempotent: a stroke that already has an id and owner is left
    /// untouched, so the identity never changes once observed.
    /// Returns true if anything was assigned.
    pub fn ensure_identity(&mut self, owner: &str) -> bool {
        let mut assigned = false;
        if self.id.is_empty() {
            self.id = generate_stroke_id();
            assigned = true;
        }
        if self.owner.is_empty() {
            self.owner = owner.to_string();
            assigned = true;
        }
        assigned
    }

    /// Append a point while authoring.
    pub fn push_point(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn last_point(&self) -> Option<Point> {
        self.points.last().copied()
    }

    pub fn is_owned_by(&self, participant: &str) -> bool {
        self.owner == participant
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True if this stroke renders as a dot rather than a polyline.
    pub fn is_dot(&self) -> bool {
        self.points.len() == 1
    }

    /// Bounding box of the stroke's points (not inflated by width).
    pub fn bounds(&self) -> Rect {
        let Some(first) = self.points.first() else {
            return Rect::ZERO;
        };
        self.points
            .iter()
            .skip(1)
            .fold(Rect::from_points(*first, *first), |rect, p| rect.union_pt(*p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_assigns_identity() {
        let stroke = Stroke::begin("guest-1", "#000", 2.0, Point::new(1.0, 2.0));
        assert!(!stroke.id.is_empty());
        assert_eq!(stroke.owner, "guest-1");
        assert_eq!(stroke.len(), 1);
        assert!(stroke.is_dot());
    }

    #[test]
    fn test_ensure_identity_is_idempotent() {
        let mut stroke = Stroke::begin("a", "#000", 2.0, Point::ZERO);
        let id = stroke.id.clone();
        assert!(!stroke.ensure_identity("b"));
        assert_eq!(stroke.id, id);
        assert_eq!(stroke.owner, "a");
    }

    #[test]
    fn test_ensure_identity_fills_missing() {
        let mut stroke: Stroke =
            serde_json::from_str(r##"{"color":"#fff","width":1.0,"points":[{"x":0.0,"y":0.0}]}"##).unwrap();
        assert!(stroke.id.is_empty());
        assert!(stroke.ensure_identity("host-9"));
        assert!(!stroke.id.is_empty());
        assert_eq!(stroke.owner, "host-9");
    }

    #[test]
    fn test_wire_field_names() {
        let stroke = Stroke::begin("a", "#000", 2.0, Point::new(3.0, 4.0));
        let value = serde_json::to_value(&stroke).unwrap();
        assert_eq!(value["isEraseStroke"], false);
        assert_eq!(value["points"][0]["x"], 3.0);
        assert_eq!(value["owner"], "a");
    }

    #[test]
    fn test_bounds() {
        let mut stroke = Stroke::begin("a", "#000", 2.0, Point::new(10.0, 5.0));
        stroke.push_point(Point::new(-2.0, 8.0));
        stroke.push_point(Point::new(4.0, 20.0));
        let b = stroke.bounds();
        assert_eq!((b.x0, b.y0, b.x1, b.y1), (-2.0, 5.0, 10.0, 20.0));
    }

    #[test]
    fn test_participant_id_has_role_prefix() {
        let id = generate_participant_id("Host");
        assert!(id.starts_with("host-"));
        assert!(generate_participant_id("").starts_with("participant-"));
    }
}
