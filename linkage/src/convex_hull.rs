//! Graham scan over the linked points of one map.

use std::cmp::Ordering;

use glam::DVec2;

fn cross(o: DVec2, a: DVec2, b: DVec2) -> f64 {
    (a - o).perp_dot(b - o)
}

/// Lowest point, ties broken by the smallest x.
fn pivot_cmp(a: &DVec2, b: &DVec2) -> Ordering {
    a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x))
}

/// Convex hull of `points` in counter-clockwise order, starting at the lowest point.
///
/// Collinear boundary points and duplicates are dropped. Fewer than three
/// distinct points yield the distinct points themselves (collinear input
/// yields its two extremes).
pub fn convex_hull(points: &[DVec2]) -> Vec<DVec2> {
    let mut sorted: Vec<DVec2> = points
        .iter()
        .copied()
        .filter(|p| p.is_finite())
        .collect();
    sorted.sort_by(pivot_cmp);
    sorted.dedup();

    if sorted.len() < 3 {
        return collinear_extremes(sorted);
    }

    let pivot = sorted[0];
    let rest = &mut sorted[1..];
    rest.sort_by(|a, b| {
        // every point lies on or above the pivot, so angles are within [0, pi)
        let turn = cross(pivot, *a, *b);
        if turn > 0.0 {
            Ordering::Less
        } else if turn < 0.0 {
            Ordering::Greater
        } else {
            pivot
                .distance_squared(*a)
                .total_cmp(&pivot.distance_squared(*b))
        }
    });

    let mut hull: Vec<DVec2> = Vec::with_capacity(sorted.len());
    for &p in sorted.iter() {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }

    if hull.len() < 3 {
        return collinear_extremes(hull);
    }

    hull
}

fn collinear_extremes(points: Vec<DVec2>) -> Vec<DVec2> {
    if points.len() <= 2 {
        return points;
    }

    let first = points[0];
    let farthest = points
        .iter()
        .copied()
        .max_by(|a, b| {
            first
                .distance_squared(*a)
                .total_cmp(&first.distance_squared(*b))
        })
        .unwrap_or(first);
    vec![first, farthest]
}

/// True if `p` is inside or on the boundary of the counter-clockwise `hull`.
pub fn hull_contains(hull: &[DVec2], p: DVec2, tolerance: f64) -> bool {
    match hull.len() {
        0 => false,
        1 => hull[0].distance(p) <= tolerance,
        2 => {
            let (a, b) = (hull[0], hull[1]);
            let ab = b - a;
            let len = ab.length();
            if len == 0.0 {
                return a.distance(p) <= tolerance;
            }
            let t = (p - a).dot(ab) / (len * len);
            let off_line = ab.perp_dot(p - a).abs() / len;
            off_line <= tolerance && (-tolerance..=1.0 + tolerance).contains(&t)
        }
        n => (0..n).all(|i| {
            let a = hull[i];
            let b = hull[(i + 1) % n];
            let len = a.distance(b);
            len == 0.0 || cross(a, b, p) / len >= -tolerance
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f64, y: f64) -> DVec2 {
        DVec2::new(x, y)
    }

    #[test]
    fn degenerate_inputs() {
        assert!(convex_hull(&[]).is_empty());
        assert_eq!(convex_hull(&[v(1.0, 2.0)]), vec![v(1.0, 2.0)]);
        assert_eq!(
            convex_hull(&[v(3.0, 3.0), v(1.0, 1.0)]),
            vec![v(1.0, 1.0), v(3.0, 3.0)]
        );
        assert_eq!(
            convex_hull(&[v(1.0, 1.0), v(1.0, 1.0), v(1.0, 1.0)]),
            vec![v(1.0, 1.0)]
        );
    }

    #[test]
    fn collinear_points_keep_extremes() {
        let hull = convex_hull(&[v(2.0, 2.0), v(0.0, 0.0), v(3.0, 3.0), v(1.0, 1.0)]);
        assert_eq!(hull, vec![v(0.0, 0.0), v(3.0, 3.0)]);

        let horizontal = convex_hull(&[v(5.0, 0.0), v(-1.0, 0.0), v(2.0, 0.0)]);
        assert_eq!(horizontal, vec![v(-1.0, 0.0), v(5.0, 0.0)]);
    }

    #[test]
    fn square_with_interior_and_edge_points() {
        let points = [
            v(0.0, 0.0),
            v(2.0, 2.0),
            v(1.0, 1.0),
            v(0.0, 2.0),
            v(2.0, 0.0),
            v(1.0, 0.0),
            v(0.5, 1.5),
        ];
        let hull = convex_hull(&points);

        assert_eq!(
            hull,
            vec![v(0.0, 0.0), v(2.0, 0.0), v(2.0, 2.0), v(0.0, 2.0)]
        );
        for p in points {
            assert!(hull_contains(&hull, p, 1e-9));
        }
        assert!(!hull_contains(&hull, v(3.0, 1.0), 1e-9));
    }

    #[test]
    fn hull_is_deterministic_and_independent_of_input_order() {
        let points = [
            v(4.0, 1.0),
            v(-2.0, 3.5),
            v(0.0, -1.0),
            v(1.0, 5.0),
            v(3.0, 3.0),
            v(-1.0, 0.0),
            v(0.5, 2.0),
        ];
        let mut reversed = points;
        reversed.reverse();

        let hull = convex_hull(&points);
        assert_eq!(hull, convex_hull(&points));
        assert_eq!(hull, convex_hull(&reversed));
        assert_eq!(hull[0], v(0.0, -1.0));

        // counter-clockwise: every consecutive triple turns left
        for i in 0..hull.len() {
            let a = hull[i];
            let b = hull[(i + 1) % hull.len()];
            let c = hull[(i + 2) % hull.len()];
            assert!(cross(a, b, c) > 0.0);
        }
        for p in points {
            assert!(hull_contains(&hull, p, 1e-9));
        }
    }

    #[test]
    fn non_finite_points_are_ignored() {
        let hull = convex_hull(&[v(0.0, 0.0), v(f64::NAN, 1.0), v(1.0, 0.0), v(0.0, 1.0)]);
        assert_eq!(hull, vec![v(0.0, 0.0), v(1.0, 0.0), v(0.0, 1.0)]);
    }
}
