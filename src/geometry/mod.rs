use geo_types::{Coord, LineString};

/// Compute bearing between two coordinates (0-360 degrees)
///
/// Bearing is the direction from `from` to `to` in degrees,
/// where 0 = North, 90 = East, 180 = South, 270 = West
pub fn compute_bearing(from: &Coord, to: &Coord) -> f64 {
    let lat1 = from.y.to_radians();
    let lat2 = to.y.to_radians();
    let dlon = (to.x - from.x).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    let bearing = y.atan2(x).to_degrees();
    (bearing + 360.0) % 360.0
}

/// Change in bearing when travelling off the end of `incoming` and onto
/// the start of `outgoing`, in degrees (-180 to 180).
/// Positive = left turn, negative = right turn. Used to decide whether a
/// way should be split at the junction between two segment polylines.
pub fn bearing_change(incoming: &[Coord], outgoing: &[Coord]) -> f64 {
    let n = incoming.len();
    let angle1 = compute_bearing(&incoming[n.saturating_sub(2)], &incoming[n - 1]);
    let angle2 = compute_bearing(&outgoing[0], &outgoing[outgoing.len().min(2) - 1]);

    let mut delta = (angle2 - angle1 + 360.0) % 360.0;
    if delta > 180.0 {
        delta -= 360.0;
    }
    delta
}

/// Distance in meters between two coordinates.
///
/// Uses the same simplified latitude reprojection as line_distance, which
/// is accurate for the short distances the pipeline cares about.
pub fn coord_distance(a: &Coord, b: &Coord) -> f64 {
    let y1 = a.y.to_radians();
    let y2 = b.y.to_radians();
    let x1 = a.x.to_radians() * y1.cos();
    let x2 = b.x.to_radians() * y2.cos();

    let dx = x2 - x1;
    let dy = y2 - y1;
    (dx * dx + dy * dy).sqrt() * 6_371_000.0
}

/// Douglas-Peucker polyline simplification
///
/// Removes points that are within `epsilon` meters of the line
/// connecting their neighbors. Endpoints are never dropped and the
/// result is a subsequence of the input.
pub fn simplify_polyline(coords: &[Coord], epsilon: f64) -> Vec<Coord> {
    if coords.len() <= 2 {
        return coords.to_vec();
    }

    // Find point with maximum distance from line between first and last
    let first = &coords[0];
    let last = &coords[coords.len() - 1];

    let mut max_dist = 0.0;
    let mut max_idx = 0;

    for (i, point) in coords.iter().enumerate().skip(1).take(coords.len() - 2) {
        let dist = line_distance(first, last, point);
        if dist > max_dist {
            max_dist = dist;
            max_idx = i;
        }
    }

    if max_dist >= epsilon {
        let left = simplify_polyline(&coords[..=max_idx], epsilon);
        let right = simplify_polyline(&coords[max_idx..], epsilon);

        let mut result = left;
        result.pop(); // Remove duplicate point
        result.extend(right);
        result
    } else {
        vec![*first, *last]
    }
}

/// Compute distance from point p3 to line segment [s1, s2]
///
/// Uses simplified reprojection for short distances
pub fn line_distance(s1: &Coord, s2: &Coord, p3: &Coord) -> f64 {
    let x1 = s1.x.to_radians();
    let y1 = s1.y.to_radians();
    let x2 = s2.x.to_radians();
    let y2 = s2.y.to_radians();
    let x3 = p3.x.to_radians();
    let y3 = p3.y.to_radians();

    // Simplified reprojection of latitude
    let x1 = x1 * y1.cos();
    let x2 = x2 * y2.cos();
    let x3 = x3 * y3.cos();

    let a = x3 - x1;
    let b = y3 - y1;
    let c = x2 - x1;
    let d = y2 - y1;

    let dot = a * c + b * d;
    let len_sq = c * c + d * d;

    let param = if len_sq != 0.0 { dot / len_sq } else { -1.0 };

    let (xx, yy) = if param < 0.0 {
        (x1, y1)
    } else if param > 1.0 {
        (x2, y2)
    } else {
        (x1 + param * c, y1 + param * d)
    };

    let dx = x3 - xx;
    let dy = y3 - yy;

    (dx * dx + dy * dy).sqrt() * 6_371_000.0 // Earth's radius in meters
}

/// Round float to nearest integer, rounding half to even ("Banker's Rounding")
fn round_ties_even(x: f64) -> f64 {
    let fract = x.fract().abs();
    if (fract - 0.5).abs() < f64::EPSILON {
        // Exact half - round to even
        let floor = x.floor();
        if floor as i64 % 2 == 0 {
            floor
        } else {
            x.ceil()
        }
    } else {
        x.round()
    }
}

/// Round all coordinates to 7 decimal places (about 1 cm)
pub fn round_coords(geometry: &mut LineString<f64>) {
    for coord in geometry.0.iter_mut() {
        coord.x = round_ties_even(coord.x * 10_000_000.0) / 10_000_000.0;
        coord.y = round_ties_even(coord.y * 10_000_000.0) / 10_000_000.0;
    }
}

/// Check that a geometry is usable: at least 2 points, all finite and
/// within geographic range. Segments failing this are dropped.
pub fn validate(geometry: &LineString<f64>) -> bool {
    if geometry.0.len() < 2 {
        return false;
    }
    geometry.0.iter().all(|c| {
        c.x.is_finite() && c.y.is_finite() && c.x.abs() <= 180.0 && c.y.abs() <= 90.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(x: f64, y: f64) -> Coord {
        Coord { x, y }
    }

    #[test]
    fn bearing_cardinal_directions() {
        let origin = c(10.0, 60.0);
        assert!((compute_bearing(&origin, &c(10.0, 60.1)) - 0.0).abs() < 1.0);
        assert!((compute_bearing(&origin, &c(10.1, 60.0)) - 90.0).abs() < 1.0);
        assert!((compute_bearing(&origin, &c(10.0, 59.9)) - 180.0).abs() < 1.0);
    }

    #[test]
    fn bearing_change_straight_line_is_small() {
        let a = [c(10.0, 60.0), c(10.01, 60.0)];
        let b = [c(10.01, 60.0), c(10.02, 60.0)];
        assert!(bearing_change(&a, &b).abs() < 1.0);
    }

    #[test]
    fn bearing_change_right_angle() {
        let a = [c(10.0, 60.0), c(10.01, 60.0)];
        let b = [c(10.01, 60.0), c(10.01, 59.99)];
        let delta = bearing_change(&a, &b);
        assert!((delta.abs() - 90.0).abs() < 2.0, "delta: {}", delta);
    }

    #[test]
    fn simplify_preserves_endpoints_and_subsequence() {
        let coords = vec![
            c(10.0, 60.0),
            c(10.001, 60.0000001), // within tolerance of the chord
            c(10.002, 60.0),
            c(10.003, 60.01), // far off the chord, must be kept
            c(10.004, 60.0),
        ];
        let simplified = simplify_polyline(&coords, 0.2);

        assert_eq!(simplified.first(), coords.first());
        assert_eq!(simplified.last(), coords.last());
        assert!(simplified.len() <= coords.len());

        // Subsequence check
        let mut it = coords.iter();
        for p in &simplified {
            assert!(it.any(|q| q == p), "not a subsequence");
        }

        // Every dropped point lies within tolerance of its neighbors' chord
        for (i, p) in coords.iter().enumerate() {
            if !simplified.contains(p) {
                let d = line_distance(&coords[i - 1], &coords[i + 1], p);
                assert!(d < 0.2, "dropped point {} m off chord", d);
            }
        }
    }

    #[test]
    fn simplify_two_points_unchanged() {
        let coords = vec![c(10.0, 60.0), c(11.0, 61.0)];
        assert_eq!(simplify_polyline(&coords, 10.0), coords);
    }

    #[test]
    fn coord_distance_sanity() {
        // One degree of latitude is about 111 km
        let d = coord_distance(&c(10.0, 60.0), &c(10.0, 61.0));
        assert!((d - 111_000.0).abs() < 2_000.0, "distance: {}", d);
    }

    #[test]
    fn validate_rejects_bad_geometry() {
        assert!(!validate(&LineString::from(vec![c(10.0, 60.0)])));
        assert!(!validate(&LineString::from(vec![c(f64::NAN, 60.0), c(10.0, 60.0)])));
        assert!(!validate(&LineString::from(vec![c(200.0, 60.0), c(10.0, 60.0)])));
        assert!(validate(&LineString::from(vec![c(10.0, 60.0), c(10.1, 60.0)])));
    }
}
