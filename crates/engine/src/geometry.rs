use serde::{Deserialize, Serialize};
use thiserror::Error;

const PROJECTION_INSET: f32 = 0.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_sq(self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }

    pub fn distance_to(self, other: Point) -> f32 {
        self.distance_sq(other).sqrt()
    }

    pub fn lerp(self, other: Point, t: f32) -> Point {
        Point {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolygonError {
    #[error("polygon needs at least 3 vertices, got {actual}")]
    TooFewVertices { actual: usize },
}

/// Ordered, non-self-intersecting boundary. Consumers must not assume
/// convexity. Points exactly on the boundary are not guaranteed inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct Polygon {
    vertices: Vec<Point>,
}

impl TryFrom<Vec<Point>> for Polygon {
    type Error = PolygonError;

    fn try_from(vertices: Vec<Point>) -> Result<Self, Self::Error> {
        Polygon::new(vertices)
    }
}

impl From<Polygon> for Vec<Point> {
    fn from(polygon: Polygon) -> Self {
        polygon.vertices
    }
}

impl Polygon {
    pub fn new(vertices: Vec<Point>) -> Result<Self, PolygonError> {
        if vertices.len() < 3 {
            return Err(PolygonError::TooFewVertices {
                actual: vertices.len(),
            });
        }
        Ok(Self { vertices })
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn contains(&self, point: Point) -> bool {
        let mut inside = false;
        let mut j = self.vertices.len() - 1;
        for i in 0..self.vertices.len() {
            let a = self.vertices[i];
            let b = self.vertices[j];
            if (a.y > point.y) != (b.y > point.y) {
                let t = (point.y - a.y) / (b.y - a.y);
                let crossing_x = a.x + t * (b.x - a.x);
                if point.x < crossing_x {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    pub fn centroid(&self) -> Point {
        let mut sum_x = 0.0f32;
        let mut sum_y = 0.0f32;
        for vertex in &self.vertices {
            sum_x += vertex.x;
            sum_y += vertex.y;
        }
        let count = self.vertices.len() as f32;
        Point {
            x: sum_x / count,
            y: sum_y / count,
        }
    }

    /// Projects `point` to the closest boundary position and nudges it
    /// inward toward the centroid. Returns `point` unchanged when already
    /// inside.
    pub fn nearest_interior_point(&self, point: Point) -> Point {
        if self.contains(point) {
            return point;
        }

        let mut best = self.vertices[0];
        let mut best_distance_sq = f32::MAX;
        let mut j = self.vertices.len() - 1;
        for i in 0..self.vertices.len() {
            let candidate = closest_point_on_segment(self.vertices[j], self.vertices[i], point);
            let distance_sq = candidate.distance_sq(point);
            if distance_sq < best_distance_sq {
                best_distance_sq = distance_sq;
                best = candidate;
            }
            j = i;
        }

        let centroid = self.centroid();
        let to_centroid = Point {
            x: centroid.x - best.x,
            y: centroid.y - best.y,
        };
        let length = (to_centroid.x * to_centroid.x + to_centroid.y * to_centroid.y).sqrt();
        if length <= f32::EPSILON {
            return best;
        }
        let nudged = Point {
            x: best.x + to_centroid.x / length * PROJECTION_INSET,
            y: best.y + to_centroid.y / length * PROJECTION_INSET,
        };
        if self.contains(nudged) {
            nudged
        } else {
            best.lerp(centroid, 0.5)
        }
    }
}

pub fn closest_point_on_segment(a: Point, b: Point, point: Point) -> Point {
    let ab_x = b.x - a.x;
    let ab_y = b.y - a.y;
    let length_sq = ab_x * ab_x + ab_y * ab_y;
    if length_sq <= f32::EPSILON {
        return a;
    }
    let t = ((point.x - a.x) * ab_x + (point.y - a.y) * ab_y) / length_sq;
    let t = t.clamp(0.0, 1.0);
    Point {
        x: a.x + ab_x * t,
        y: a.y + ab_y * t,
    }
}

pub fn segments_intersect(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    fn orientation(p: Point, q: Point, r: Point) -> f32 {
        (q.y - p.y) * (r.x - q.x) - (q.x - p.x) * (r.y - q.y)
    }
    fn on_segment(p: Point, q: Point, r: Point) -> bool {
        q.x <= p.x.max(r.x) && q.x >= p.x.min(r.x) && q.y <= p.y.max(r.y) && q.y >= p.y.min(r.y)
    }

    let o1 = orientation(a1, a2, b1);
    let o2 = orientation(a1, a2, b2);
    let o3 = orientation(b1, b2, a1);
    let o4 = orientation(b1, b2, a2);

    if (o1 > 0.0) != (o2 > 0.0) && (o3 > 0.0) != (o4 > 0.0) {
        return true;
    }
    (o1 == 0.0 && on_segment(a1, b1, a2))
        || (o2 == 0.0 && on_segment(a1, b2, a2))
        || (o3 == 0.0 && on_segment(b1, a1, b2))
        || (o4 == 0.0 && on_segment(b1, a2, b2))
}

pub fn path_length(path: &[Point]) -> f32 {
    let mut total = 0.0f32;
    for pair in path.windows(2) {
        total += pair[0].distance_to(pair[1]);
    }
    total
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathPosition {
    pub position: Point,
    pub segment_index: usize,
    pub finished: bool,
}

pub fn interpolate_path(path: &[Point], distance_traveled: f32) -> PathPosition {
    match path {
        [] => PathPosition {
            position: Point::default(),
            segment_index: 0,
            finished: true,
        },
        [only] => PathPosition {
            position: *only,
            segment_index: 0,
            finished: true,
        },
        _ => {
            let mut remaining = distance_traveled.max(0.0);
            for (index, pair) in path.windows(2).enumerate() {
                let segment_length = pair[0].distance_to(pair[1]);
                if remaining < segment_length && segment_length > 0.0 {
                    return PathPosition {
                        position: pair[0].lerp(pair[1], remaining / segment_length),
                        segment_index: index,
                        finished: false,
                    };
                }
                remaining -= segment_length;
            }
            PathPosition {
                position: path[path.len() - 1],
                segment_index: path.len() - 2,
                finished: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f32) -> Polygon {
        Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(size, 0.0),
            Point::new(size, size),
            Point::new(0.0, size),
        ])
        .expect("square")
    }

    #[test]
    fn polygon_rejects_fewer_than_three_vertices() {
        let err = Polygon::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)])
            .expect_err("too few vertices");
        assert_eq!(err, PolygonError::TooFewVertices { actual: 2 });
    }

    #[test]
    fn square_contains_strict_interior_points() {
        let area = square(100.0);
        assert!(area.contains(Point::new(50.0, 50.0)));
        assert!(area.contains(Point::new(1.0, 99.0)));
        assert!(area.contains(Point::new(99.0, 1.0)));
    }

    #[test]
    fn square_excludes_far_outside_points() {
        let area = square(100.0);
        assert!(!area.contains(Point::new(-50.0, 50.0)));
        assert!(!area.contains(Point::new(150.0, 50.0)));
        assert!(!area.contains(Point::new(50.0, 1000.0)));
    }

    #[test]
    fn square_corner_classification_is_deterministic() {
        let area = square(100.0);
        let corners = [
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ];
        let first: Vec<bool> = corners.iter().map(|c| area.contains(*c)).collect();
        let second: Vec<bool> = corners.iter().map(|c| area.contains(*c)).collect();
        assert_eq!(first, second);
        // Boundary points are not guaranteed inside; the top corners fall
        // outside under ray-cast parity.
        assert!(!area.contains(Point::new(100.0, 100.0)));
        assert!(!area.contains(Point::new(0.0, 100.0)));
    }

    #[test]
    fn concave_polygon_containment_respects_notch() {
        let notched = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(50.0, 40.0),
            Point::new(0.0, 100.0),
        ])
        .expect("notched polygon");
        assert!(notched.contains(Point::new(10.0, 20.0)));
        assert!(!notched.contains(Point::new(50.0, 90.0)));
    }

    #[test]
    fn nearest_interior_point_keeps_inside_points_unchanged() {
        let area = square(100.0);
        let inside = Point::new(30.0, 70.0);
        assert_eq!(area.nearest_interior_point(inside), inside);
    }

    #[test]
    fn nearest_interior_point_projects_outside_points_inward() {
        let area = square(100.0);
        let projected = area.nearest_interior_point(Point::new(-20.0, 50.0));
        assert!(area.contains(projected));
        assert!(projected.x < 5.0, "should land near the left edge");
        assert!((projected.y - 50.0).abs() < 5.0);
    }

    #[test]
    fn closest_point_on_segment_clamps_to_endpoints() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert_eq!(closest_point_on_segment(a, b, Point::new(-5.0, 3.0)), a);
        assert_eq!(closest_point_on_segment(a, b, Point::new(15.0, 3.0)), b);
        assert_eq!(
            closest_point_on_segment(a, b, Point::new(4.0, 3.0)),
            Point::new(4.0, 0.0)
        );
    }

    #[test]
    fn segments_intersect_detects_crossing_and_disjoint() {
        assert!(segments_intersect(
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 0.0),
        ));
        assert!(!segments_intersect(
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(5.0, 5.0),
            Point::new(6.0, 5.0),
        ));
    }

    #[test]
    fn path_length_sums_segments() {
        let path = [
            Point::new(0.0, 0.0),
            Point::new(3.0, 0.0),
            Point::new(3.0, 4.0),
        ];
        assert!((path_length(&path) - 7.0).abs() < 0.0001);
    }

    #[test]
    fn interpolate_path_walks_segments_and_finishes() {
        let path = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
        ];

        let start = interpolate_path(&path, 0.0);
        assert_eq!(start.position, Point::new(0.0, 0.0));
        assert!(!start.finished);

        let mid = interpolate_path(&path, 15.0);
        assert_eq!(mid.segment_index, 1);
        assert!((mid.position.x - 10.0).abs() < 0.0001);
        assert!((mid.position.y - 5.0).abs() < 0.0001);
        assert!(!mid.finished);

        let done = interpolate_path(&path, 100.0);
        assert_eq!(done.position, Point::new(10.0, 10.0));
        assert!(done.finished);
    }

    #[test]
    fn interpolate_path_single_point_is_immediately_finished() {
        let result = interpolate_path(&[Point::new(2.0, 3.0)], 0.0);
        assert!(result.finished);
        assert_eq!(result.position, Point::new(2.0, 3.0));
    }
}
