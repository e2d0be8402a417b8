use tracing::debug;

use crate::geometry::{Point, Polygon};

const GOAL_RADIUS: f32 = 5.0;
const MESH_SPACING: f32 = 25.0;
const VERTEX_INSET: f32 = 2.0;
const VISIBILITY_SAMPLES: u32 = 5;
const EDGE_SAMPLE_SPACING: f32 = 4.0;

fn sample_line(from: Point, to: Point, area: &Polygon, samples: u32) -> bool {
    for step in 1..=samples {
        let t = step as f32 / (samples + 1) as f32;
        if !area.contains(from.lerp(to, t)) {
            return false;
        }
    }
    true
}

/// Straight segment stays walkable when the midpoint and 4 additional
/// evenly spaced samples all land inside the area. Endpoints are assumed
/// already inside. O(1) in mesh size; used for the direct-line fast path.
fn line_is_clear(from: Point, to: Point, area: &Polygon) -> bool {
    sample_line(from, to, area, VISIBILITY_SAMPLES)
}

/// Visibility test for mesh edges and smoothing. Sample count scales with
/// segment length so long edges cannot step over thin obstacles.
fn edge_is_clear(from: Point, to: Point, area: &Polygon) -> bool {
    let samples = (from.distance_to(to) / EDGE_SAMPLE_SPACING).ceil() as u32;
    sample_line(from, to, area, samples.max(VISIBILITY_SAMPLES))
}

fn build_mesh_points(start: Point, end: Point, area: &Polygon) -> Vec<Point> {
    let mut points = vec![start, end];

    let vertices = area.vertices();
    let centroid = area.centroid();
    for vertex in vertices {
        let to_centroid_x = centroid.x - vertex.x;
        let to_centroid_y = centroid.y - vertex.y;
        let length = (to_centroid_x * to_centroid_x + to_centroid_y * to_centroid_y).sqrt();
        if length <= f32::EPSILON {
            continue;
        }
        let inset = Point {
            x: vertex.x + to_centroid_x / length * VERTEX_INSET,
            y: vertex.y + to_centroid_y / length * VERTEX_INSET,
        };
        if area.contains(inset) {
            points.push(inset);
        }
    }

    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for vertex in vertices {
        min_x = min_x.min(vertex.x);
        min_y = min_y.min(vertex.y);
        max_x = max_x.max(vertex.x);
        max_y = max_y.max(vertex.y);
    }

    let mut y = min_y + MESH_SPACING;
    while y < max_y {
        let mut x = min_x + MESH_SPACING;
        while x < max_x {
            let candidate = Point { x, y };
            if area.contains(candidate) {
                points.push(candidate);
            }
            x += MESH_SPACING;
        }
        y += MESH_SPACING;
    }

    points
}

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    index: usize,
    h_cost: f32,
    f_cost: f32,
    insertion_order: u64,
}

fn pick_best_open_node_index(open: &[OpenNode]) -> usize {
    let mut best_index = 0usize;
    for index in 1..open.len() {
        let current = open[index];
        let best = open[best_index];
        let current_key = (current.f_cost, current.h_cost, current.insertion_order);
        let best_key = (best.f_cost, best.h_cost, best.insertion_order);
        if current_key < best_key {
            best_index = index;
        }
    }
    best_index
}

fn search_mesh(points: &[Point], area: &Polygon, end: Point) -> Option<Vec<Point>> {
    let node_count = points.len();
    let mut closed = vec![false; node_count];
    let mut best_g = vec![f32::MAX; node_count];
    let mut parent = vec![None::<usize>; node_count];
    let mut open = Vec::new();
    let mut next_insertion = 0u64;

    let start_h = points[0].distance_to(end);
    open.push(OpenNode {
        index: 0,
        h_cost: start_h,
        f_cost: start_h,
        insertion_order: next_insertion,
    });
    next_insertion = next_insertion.saturating_add(1);
    best_g[0] = 0.0;

    while !open.is_empty() {
        let best = pick_best_open_node_index(&open);
        let current = open.swap_remove(best);
        if closed[current.index] {
            continue;
        }
        closed[current.index] = true;

        if points[current.index].distance_to(end) <= GOAL_RADIUS {
            let mut cursor = current.index;
            let mut waypoints = vec![points[cursor]];
            while let Some(previous) = parent[cursor] {
                cursor = previous;
                waypoints.push(points[cursor]);
            }
            waypoints.reverse();
            if waypoints[waypoints.len() - 1] != end {
                waypoints.push(end);
            }
            return Some(waypoints);
        }

        let current_g = best_g[current.index];
        for neighbor in 0..node_count {
            if neighbor == current.index || closed[neighbor] {
                continue;
            }
            if !edge_is_clear(points[current.index], points[neighbor], area) {
                continue;
            }

            let tentative_g = current_g + points[current.index].distance_to(points[neighbor]);
            if tentative_g >= best_g[neighbor] {
                continue;
            }

            best_g[neighbor] = tentative_g;
            parent[neighbor] = Some(current.index);
            let h_cost = points[neighbor].distance_to(end);
            open.push(OpenNode {
                index: neighbor,
                h_cost,
                f_cost: tentative_g + h_cost,
                insertion_order: next_insertion,
            });
            next_insertion = next_insertion.saturating_add(1);
        }
    }

    None
}

fn smooth_path(waypoints: Vec<Point>, area: &Polygon) -> Vec<Point> {
    if waypoints.len() <= 2 {
        return waypoints;
    }
    let mut smoothed = vec![waypoints[0]];
    let mut cursor = 0usize;
    while cursor < waypoints.len() - 1 {
        let mut furthest = cursor + 1;
        for candidate in ((cursor + 2)..waypoints.len()).rev() {
            if edge_is_clear(waypoints[cursor], waypoints[candidate], area) {
                furthest = candidate;
                break;
            }
        }
        smoothed.push(waypoints[furthest]);
        cursor = furthest;
    }
    smoothed
}

/// Walkable path from `start` to `end`, both projected into `area` when
/// outside. Always non-empty. Falls back to the raw direct line when the
/// mesh search exhausts its frontier (degraded mode, movement may clip).
pub fn find_path(start: Point, end: Point, area: &Polygon) -> Vec<Point> {
    let start = area.nearest_interior_point(start);
    let end = area.nearest_interior_point(end);

    if line_is_clear(start, end, area) {
        return vec![start, end];
    }

    let points = build_mesh_points(start, end, area);
    match search_mesh(&points, area, end) {
        Some(waypoints) => smooth_path(waypoints, area),
        None => {
            debug!(?start, ?end, "path search exhausted frontier, using direct line");
            vec![start, end]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{interpolate_path, path_length};

    fn open_square() -> Polygon {
        Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(200.0, 0.0),
            Point::new(200.0, 200.0),
            Point::new(0.0, 200.0),
        ])
        .expect("square")
    }

    // A 200x200 square with a wall jutting up from the bottom at x≈100,
    // leaving a gap only along the top.
    fn walled_area() -> Polygon {
        Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(95.0, 0.0),
            Point::new(95.0, 150.0),
            Point::new(105.0, 150.0),
            Point::new(105.0, 0.0),
            Point::new(200.0, 0.0),
            Point::new(200.0, 200.0),
            Point::new(0.0, 200.0),
        ])
        .expect("walled area")
    }

    #[test]
    fn path_to_self_has_near_zero_length() {
        let area = open_square();
        let point = Point::new(50.0, 50.0);
        let path = find_path(point, point, &area);
        assert!(!path.is_empty());
        assert!(path_length(&path) < 0.001);
    }

    #[test]
    fn clear_line_returns_exactly_two_endpoints() {
        let area = open_square();
        let start = Point::new(20.0, 20.0);
        let end = Point::new(180.0, 170.0);
        let path = find_path(start, end, &area);
        assert_eq!(path, vec![start, end]);
    }

    #[test]
    fn outside_endpoints_are_projected_inside() {
        let area = open_square();
        let path = find_path(Point::new(-50.0, 100.0), Point::new(250.0, 100.0), &area);
        assert!(area.contains(path[0]));
        assert!(area.contains(path[path.len() - 1]));
    }

    #[test]
    fn wall_forces_detour_through_gap() {
        let area = walled_area();
        let start = Point::new(40.0, 40.0);
        let end = Point::new(160.0, 40.0);
        let path = find_path(start, end, &area);

        assert!(path.len() > 2, "direct line is blocked, expected a detour");
        assert_eq!(path[0], start);
        assert_eq!(path[path.len() - 1], end);
        // Every interpolated position along the path stays walkable.
        let total = path_length(&path);
        let mut traveled = 1.0f32;
        while traveled < total {
            let sample = interpolate_path(&path, traveled);
            assert!(
                area.contains(sample.position),
                "path left walkable area at {:?}",
                sample.position
            );
            traveled += 5.0;
        }
    }

    #[test]
    fn long_edges_cannot_step_over_the_wall() {
        let area = walled_area();
        // Five fixed samples on this segment all miss the 10-unit wall;
        // length-scaled sampling must still reject it.
        assert!(!edge_is_clear(
            Point::new(58.0, 45.0),
            Point::new(130.0, 45.0),
            &area
        ));
        assert!(edge_is_clear(
            Point::new(58.0, 180.0),
            Point::new(130.0, 180.0),
            &area
        ));
    }

    #[test]
    fn repeated_searches_are_deterministic() {
        let area = walled_area();
        let start = Point::new(30.0, 30.0);
        let end = Point::new(170.0, 60.0);
        let first = find_path(start, end, &area);
        let second = find_path(start, end, &area);
        assert_eq!(first, second);
    }

    #[test]
    fn smoothing_removes_redundant_waypoints_on_open_ground() {
        let area = open_square();
        let raw = vec![
            Point::new(10.0, 10.0),
            Point::new(50.0, 50.0),
            Point::new(100.0, 100.0),
            Point::new(190.0, 190.0),
        ];
        let smoothed = smooth_path(raw, &area);
        assert_eq!(
            smoothed,
            vec![Point::new(10.0, 10.0), Point::new(190.0, 190.0)]
        );
    }
}
