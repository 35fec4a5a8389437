//! Resolve a point to the topmost locally owned stroke under it.

use crate::geometry::{distance, distance_to_polyline};
use crate::store::StrokeStore;
use crate::stroke::Stroke;
use kurbo::Point;

/// Minimum hit radius, so very thin strokes stay easy to erase.
pub const MIN_HIT_RADIUS: f64 = 6.0;

/// Extra margin added on top of the stroke's own reach.
pub fn hit_padding(width: f64) -> f64 {
    (0.6 * width).max(MIN_HIT_RADIUS)
}

/// How far from its geometry a stroke still counts as hit.
pub fn hit_tolerance(stroke: &Stroke) -> f64 {
    let reach = if stroke.is_dot() {
        (0.5 * stroke.width).max(MIN_HIT_RADIUS)
    } else {
        (0.6 * stroke.width).max(MIN_HIT_RADIUS)
    };
    reach + hit_padding(stroke.width)
}

/// True if `point` lies within the stroke's hit tolerance.
pub fn stroke_hit(stroke: &Stroke, point: Point) -> bool {
    let tolerance = hit_tolerance(stroke);
    // Coarse reject; `Rect::contains` excludes the far edges, hence the slack.
    let reach = tolerance + 1.0;
    if !stroke.bounds().inflate(reach, reach).contains(point) {
        return false;
    }
    match stroke.points.as_slice() {
        [] => false,
        [only] => distance(point, *only) <= tolerance,
        points => distance_to_polyline(point, points).is_some_and(|d| d <= tolerance),
    }
}

/// Index of the topmost stroke owned by `owner` that `point` hits.
///
/// Strokes owned by anyone else are skipped entirely, so erasure never
/// targets another participant's marks.
pub fn hit_owned_stroke(store: &StrokeStore, point: Point, owner: &str) -> Option<usize> {
    store
        .strokes()
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, stroke)| stroke.is_owned_by(owner))
        .find(|(_, stroke)| stroke_hit(stroke, point))
        .map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(owner: &str, from: Point, to: Point, width: f64) -> Stroke {
        let mut s = Stroke::begin(owner, "#000", width, from);
        s.push_point(to);
        s
    }

    #[test]
    fn test_polyline_tolerance() {
        // width 2 => reach 6 + padding 6 = 12
        let s = line("me", Point::new(0.0, 0.0), Point::new(100.0, 0.0), 2.0);
        assert!(stroke_hit(&s, Point::new(50.0, 12.0)));
        assert!(!stroke_hit(&s, Point::new(50.0, 12.5)));
    }

    #[test]
    fn test_wide_stroke_scales_tolerance() {
        // width 20 => reach 12 + padding 12 = 24
        let s = line("me", Point::new(0.0, 0.0), Point::new(100.0, 0.0), 20.0);
        assert!(stroke_hit(&s, Point::new(50.0, 23.9)));
        assert!(!stroke_hit(&s, Point::new(50.0, 24.5)));
    }

    #[test]
    fn test_dot_tolerance() {
        // width 30 => reach max(15, 6) + padding 18 = 33
        let s = Stroke::begin("me", "#000", 30.0, Point::new(10.0, 10.0));
        assert!(stroke_hit(&s, Point::new(43.0, 10.0)));
        assert!(!stroke_hit(&s, Point::new(44.0, 10.0)));
    }

    #[test]
    fn test_topmost_wins() {
        let mut store = StrokeStore::new();
        store.push(line("me", Point::new(0.0, 0.0), Point::new(100.0, 0.0), 2.0));
        store.push(line("me", Point::new(0.0, 2.0), Point::new(100.0, 2.0), 2.0));
        assert_eq!(hit_owned_stroke(&store, Point::new(50.0, 1.0), "me"), Some(1));
    }

    #[test]
    fn test_skips_foreign_strokes() {
        let mut store = StrokeStore::new();
        store.push(line("me", Point::new(0.0, 0.0), Point::new(100.0, 0.0), 2.0));
        store.push(line("them", Point::new(0.0, 0.0), Point::new(100.0, 0.0), 2.0));
        assert_eq!(hit_owned_stroke(&store, Point::new(50.0, 0.0), "me"), Some(0));
        assert_eq!(hit_owned_stroke(&store, Point::new(50.0, 0.0), "nobody"), None);
    }

    #[test]
    fn test_miss() {
        let mut store = StrokeStore::new();
        store.push(line("me", Point::new(0.0, 0.0), Point::new(10.0, 0.0), 2.0));
        assert_eq!(hit_owned_stroke(&store, Point::new(500.0, 500.0), "me"), None);
    }
}
