#![allow(dead_code)]

use std::cmp::Ordering;

use rand::prelude::*;

use linkcell::{UnitCell, Vector3D};

/// Boxes used to check the neighbor queries, with a name for error messages
pub fn test_cells() -> Vec<(&'static str, UnitCell)> {
    vec![
        ("periodic cubic", UnitCell::cubic(10.0)),
        ("aperiodic cubic", UnitCell::cubic(10.0).with_periodicity([false, false, false])),
        ("mixed orthorhombic", UnitCell::orthorhombic(8.0, 10.0, 6.0).with_periodicity([true, false, true])),
        ("triclinic", UnitCell::triclinic(9.0, 10.0, 11.0, 80.0, 95.0, 105.0)),
        ("periodic square", UnitCell::square(10.0)),
        ("aperiodic rectangle", UnitCell::rectangle(12.0, 7.0).with_periodicity([false, false, false])),
        ("mixed rectangle", UnitCell::rectangle(12.0, 7.0).with_periodicity([false, true, false])),
    ]
}

/// Generate `n_points` random points inside `unit_cell`
pub fn random_points(unit_cell: &UnitCell, n_points: usize, seed: u64) -> Vec<Vector3D> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n_points)
        .map(|_| {
            let x = rng.gen::<f64>();
            let y = rng.gen::<f64>();
            let z = if unit_cell.is_2d() { 0.0 } else { rng.gen::<f64>() };
            unit_cell.cartesian(Vector3D::new(x, y, z))
        })
        .collect()
}

/// All pairs `(query point, point)` closer than `r_max`, by brute force
pub fn brute_force_ball(
    unit_cell: &UnitCell,
    points: &[Vector3D],
    query_points: &[Vector3D],
    r_max: f64,
    exclude_ii: bool,
) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for (i, &query_point) in query_points.iter().enumerate() {
        for (j, &point) in points.iter().enumerate() {
            if exclude_ii && i == j {
                continue;
            }

            if unit_cell.distance2(query_point, point) < r_max * r_max {
                pairs.push((i, j));
            }
        }
    }
    return pairs;
}

/// Indexes of the `k` nearest points to `query_point` closer than `r_max`,
/// sorted by distance then index, by brute force
pub fn brute_force_nearest(
    unit_cell: &UnitCell,
    points: &[Vector3D],
    query_index: usize,
    query_point: Vector3D,
    k: usize,
    r_max: f64,
    exclude_ii: bool,
) -> Vec<(usize, f64)> {
    let mut candidates = Vec::new();
    for (j, &point) in points.iter().enumerate() {
        if exclude_ii && j == query_index {
            continue;
        }

        let distance2 = unit_cell.distance2(query_point, point);
        if distance2 < r_max * r_max {
            candidates.push((j, distance2.sqrt()));
        }
    }

    candidates.sort_by(|a, b| match a.1.total_cmp(&b.1) {
        Ordering::Equal => a.0.cmp(&b.0),
        ordering => ordering,
    });
    candidates.truncate(k);
    return candidates;
}
