//! Distance helpers used by hit-testing.

use kurbo::{Point, Vec2};

/// Euclidean distance between two points.
pub fn distance(a: Point, b: Point) -> f64 {
    (b - a).hypot()
}

/// Distance from `point` to the segment `start..end`.
///
/// The projection parameter is clamped to `[0, 1]`, so points beyond either
/// end measure to that endpoint. A zero-length segment degrades to
/// point-to-point distance.
pub fn distance_to_segment(point: Point, start: Point, end: Point) -> f64 {
    let segment: Vec2 = end - start;
    let len_sq = segment.hypot2();
    if len_sq <= f64::EPSILON {
        return distance(point, start);
    }

    let t = ((point - start).dot(segment) / len_sq).clamp(0.0, 1.0);
    let closest = start + segment * t;
    distance(point, closest)
}

/// Smallest distance from `point` to any segment of the polyline.
///
/// Returns `None` for polylines with fewer than two points.
pub fn distance_to_polyline(point: Point, points: &[Point]) -> Option<f64> {
    points
        .windows(2)
        .map(|pair| distance_to_segment(point, pair[0], pair[1]))
        .reduce(f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        assert!((distance(Point::new(0.0, 0.0), Point::new(3.0, 4.0)) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_segment_projection_inside() {
        let d = distance_to_segment(Point::new(5.0, 3.0), Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        assert!((d - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_segment_projection_clamped() {
        // Beyond the end: distance to the endpoint, not to the infinite line.
        let d = distance_to_segment(Point::new(13.0, 4.0), Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        assert!((d - 5.0).abs() < 1e-9);

        let d = distance_to_segment(Point::new(-3.0, 4.0), Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        assert!((d - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_length_segment() {
        let p = Point::new(2.0, 2.0);
        let d = distance_to_segment(Point::new(5.0, 6.0), p, p);
        assert!((d - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_polyline() {
        let pts = [Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)];
        let d = distance_to_polyline(Point::new(12.0, 5.0), &pts).unwrap();
        assert!((d - 2.0).abs() < 1e-9);
        assert!(distance_to_polyline(Point::ZERO, &pts[..1]).is_none());
    }
}
