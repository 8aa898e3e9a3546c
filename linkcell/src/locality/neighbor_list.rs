use std::cmp::Ordering;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::Error;

/// A single pair between a query point and an indexed point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborBond {
    /// index of the query point
    pub query_point_index: usize,
    /// index of the point in the indexed set
    pub point_index: usize,
    /// distance between the two points, using the minimum image convention
    pub distance: f64,
    /// weight associated with this bond
    pub weight: f64,
}

impl NeighborBond {
    /// Order bonds by distance, breaking ties by point index
    pub fn cmp_by_distance(&self, other: &NeighborBond) -> Ordering {
        self.distance.total_cmp(&other.distance)
            .then(self.point_index.cmp(&other.point_index))
    }

    /// Order bonds by query point, then distance, then point index
    pub fn cmp_by_query_point(&self, other: &NeighborBond) -> Ordering {
        self.query_point_index.cmp(&other.query_point_index)
            .then_with(|| self.cmp_by_distance(other))
    }
}

/// A precomputed list of bonds between query points and points.
///
/// Bonds are stored in parallel arrays: `indexes[[i, 0]]` is the query point
/// index of bond `i`, `indexes[[i, 1]]` the point index, and `distances[i]`
/// and `weights[i]` the associated distance and weight.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborList {
    indexes: Array2<usize>,
    distances: Array1<f64>,
    weights: Array1<f64>,
    num_query_points: usize,
    num_points: usize,
}

impl NeighborList {
    /// Create a new neighbor list from arrays of query point indexes, point
    /// indexes, distances and (optionally) weights. Weights default to 1.
    pub fn from_arrays(
        num_query_points: usize,
        num_points: usize,
        query_point_indexes: &[usize],
        point_indexes: &[usize],
        distances: &[f64],
        weights: Option<&[f64]>,
    ) -> Result<NeighborList, Error> {
        let n_bonds = query_point_indexes.len();
        if point_indexes.len() != n_bonds || distances.len() != n_bonds {
            return Err(Error::InvalidParameter(format!(
                "expected the same number of query point indexes ({}), point \
                indexes ({}) and distances ({})",
                n_bonds, point_indexes.len(), distances.len()
            )));
        }

        if let Some(weights) = weights {
            if weights.len() != n_bonds {
                return Err(Error::InvalidParameter(format!(
                    "expected {} weights, got {}", n_bonds, weights.len()
                )));
            }
        }

        if let Some(&index) = query_point_indexes.iter().find(|&&i| i >= num_query_points) {
            return Err(Error::InvalidParameter(format!(
                "query point index {} is out of bounds, there are only {} query points",
                index, num_query_points
            )));
        }

        if let Some(&index) = point_indexes.iter().find(|&&i| i >= num_points) {
            return Err(Error::InvalidParameter(format!(
                "point index {} is out of bounds, there are only {} points",
                index, num_points
            )));
        }

        let mut indexes = Array2::zeros((n_bonds, 2));
        for (bond, (&i, &j)) in query_point_indexes.iter().zip(point_indexes).enumerate() {
            indexes[[bond, 0]] = i;
            indexes[[bond, 1]] = j;
        }

        let weights = match weights {
            Some(weights) => Array1::from(weights.to_vec()),
            None => Array1::from_elem(n_bonds, 1.0),
        };

        return Ok(NeighborList {
            indexes: indexes,
            distances: Array1::from(distances.to_vec()),
            weights: weights,
            num_query_points: num_query_points,
            num_points: num_points,
        });
    }

    /// Create a new neighbor list from a list of bonds, keeping them in the
    /// given order.
    pub fn from_bonds(bonds: Vec<NeighborBond>, num_query_points: usize, num_points: usize) -> NeighborList {
        let n_bonds = bonds.len();
        let mut indexes = Array2::zeros((n_bonds, 2));
        let mut distances = Array1::zeros(n_bonds);
        let mut weights = Array1::zeros(n_bonds);

        for (i, bond) in bonds.into_iter().enumerate() {
            debug_assert!(bond.query_point_index < num_query_points);
            debug_assert!(bond.point_index < num_points);
            indexes[[i, 0]] = bond.query_point_index;
            indexes[[i, 1]] = bond.point_index;
            distances[i] = bond.distance;
            weights[i] = bond.weight;
        }

        return NeighborList {
            indexes: indexes,
            distances: distances,
            weights: weights,
            num_query_points: num_query_points,
            num_points: num_points,
        };
    }

    /// Number of bonds in this list
    pub fn len(&self) -> usize {
        self.distances.len()
    }

    /// Check if this list contains no bonds
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of query points used to create this list
    pub fn num_query_points(&self) -> usize {
        self.num_query_points
    }

    /// Number of points used to create this list
    pub fn num_points(&self) -> usize {
        self.num_points
    }

    /// Get the `(n_bonds, 2)` array of `[query_point, point]` indexes
    pub fn indexes(&self) -> ArrayView2<'_, usize> {
        self.indexes.view()
    }

    /// Get the query point index of every bond
    pub fn query_point_indexes(&self) -> ArrayView1<'_, usize> {
        self.indexes.index_axis(Axis(1), 0)
    }

    /// Get the point index of every bond
    pub fn point_indexes(&self) -> ArrayView1<'_, usize> {
        self.indexes.index_axis(Axis(1), 1)
    }

    /// Get the distance of every bond
    pub fn distances(&self) -> ArrayView1<'_, f64> {
        self.distances.view()
    }

    /// Get the weight of every bond
    pub fn weights(&self) -> ArrayView1<'_, f64> {
        self.weights.view()
    }

    /// Get the bond at index `i`
    pub fn bond(&self, i: usize) -> NeighborBond {
        NeighborBond {
            query_point_index: self.indexes[[i, 0]],
            point_index: self.indexes[[i, 1]],
            distance: self.distances[i],
            weight: self.weights[i],
        }
    }

    /// Iterate over all bonds in this list
    pub fn iter(&self) -> impl ExactSizeIterator<Item = NeighborBond> + '_ {
        (0..self.len()).map(move |i| self.bond(i))
    }

    /// Get the number of bonds for each query point
    pub fn neighbor_counts(&self) -> Array1<usize> {
        let mut counts = Array1::zeros(self.num_query_points);
        for &i in self.query_point_indexes() {
            counts[i] += 1;
        }
        return counts;
    }

    /// Get the index of the first bond of each query point, assuming the
    /// bonds are sorted by query point. For query points without any bond,
    /// this is the index where their bonds would be.
    pub fn segments(&self) -> Array1<usize> {
        let mut segments = Array1::zeros(self.num_query_points);
        let mut offset = 0;
        for (segment, count) in segments.iter_mut().zip(self.neighbor_counts().iter()) {
            *segment = offset;
            offset += count;
        }
        return segments;
    }

    /// Create a new list containing only the bonds for which `mask` is `true`
    pub fn filter(&self, mask: &[bool]) -> Result<NeighborList, Error> {
        if mask.len() != self.len() {
            return Err(Error::InvalidParameter(format!(
                "expected a mask with {} entries, got {}", self.len(), mask.len()
            )));
        }

        let bonds = self.iter()
            .zip(mask)
            .filter(|(_, keep)| **keep)
            .map(|(bond, _)| bond)
            .collect();

        return Ok(NeighborList::from_bonds(bonds, self.num_query_points, self.num_points));
    }

    /// Create a new list containing only the bonds with `r_min <= distance <
    /// r_max`
    pub fn filter_r(&self, r_max: f64, r_min: f64) -> Result<NeighborList, Error> {
        if r_max <= 0.0 || r_max.is_nan() {
            return Err(Error::InvalidParameter(format!(
                "r_max must be positive, got {}", r_max
            )));
        }

        if r_min < 0.0 || r_min >= r_max {
            return Err(Error::InvalidParameter(format!(
                "r_min must be non-negative and smaller than r_max, got {}", r_min
            )));
        }

        let mask = self.distances.iter()
            .map(|&distance| distance >= r_min && distance < r_max)
            .collect::<Vec<_>>();

        return self.filter(&mask);
    }

    /// Sort the bonds by query point index, then distance, then point index
    pub fn sort(&mut self) {
        let mut bonds = self.iter().collect::<Vec<_>>();
        bonds.sort_unstable_by(NeighborBond::cmp_by_query_point);
        *self = NeighborList::from_bonds(bonds, self.num_query_points, self.num_points);
    }
}
