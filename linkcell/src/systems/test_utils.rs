use rand::prelude::*;

use crate::Vector3D;
use super::UnitCell;

/// A point set in a box, owning its points
pub struct TestSystem {
    pub unit_cell: UnitCell,
    pub points: Vec<Vector3D>,
}

pub fn test_system(name: &str) -> TestSystem {
    match name {
        "triangle" => get_triangle(),
        "across-boundary" => get_across_boundary(),
        "cubic-lattice" => get_cubic_lattice(),
        "random" => get_random(200, UnitCell::cubic(8.0), 42),
        _ => panic!("unknown test system {}", name)
    }
}

/// Three points close to the origin and one far away, in an aperiodic 2D box
fn get_triangle() -> TestSystem {
    TestSystem {
        unit_cell: UnitCell::square(10.0).with_periodicity([false, false, false]),
        points: vec![
            Vector3D::new(0.0, 0.0, 0.0),
            Vector3D::new(1.0, 0.0, 0.0),
            Vector3D::new(0.0, 1.0, 0.0),
            Vector3D::new(5.0, 5.0, 0.0),
        ],
    }
}

/// Two points which are only close through the periodic boundaries
fn get_across_boundary() -> TestSystem {
    TestSystem {
        unit_cell: UnitCell::square(10.0),
        points: vec![
            Vector3D::new(0.1, 0.0, 0.0),
            Vector3D::new(9.9, 0.0, 0.0),
        ],
    }
}

/// Simple cubic lattice with 4x4x4 points and a lattice spacing of 1
fn get_cubic_lattice() -> TestSystem {
    let mut points = Vec::new();
    for i in 0..4 {
        for j in 0..4 {
            for k in 0..4 {
                points.push(Vector3D::new(i as f64, j as f64, k as f64));
            }
        }
    }

    TestSystem {
        unit_cell: UnitCell::cubic(4.0),
        points: points,
    }
}

fn get_random(n_points: usize, unit_cell: UnitCell, seed: u64) -> TestSystem {
    let mut rng = StdRng::seed_from_u64(seed);
    let points = (0..n_points)
        .map(|_| {
            let fractional = Vector3D::new(
                rng.gen(),
                rng.gen(),
                if unit_cell.is_2d() { 0.0 } else { rng.gen() },
            );
            unit_cell.cartesian(fractional)
        })
        .collect();

    TestSystem {
        unit_cell: unit_cell,
        points: points,
    }
}
