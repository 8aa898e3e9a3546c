use rayon::prelude::*;

use crate::{Error, Vector3D};
use crate::systems::UnitCell;

use super::{LinkCell, NeighborBond, NeighborList};
use super::{BallIterator, NearestIterator, PerPointIterator};

/// Arguments for a neighbor query.
///
/// Setting `num_neighbors` requests the `num_neighbors` nearest neighbors of
/// each query point, with `r_max` (if set) acting as an additional cutoff.
/// Otherwise, `r_max` requests all neighbors closer than `r_max`.
///
/// ```
/// # use linkcell::locality::{QueryArgs, QueryMode};
/// let args = QueryArgs::from_json(r#"{"num_neighbors": 4, "exclude_ii": true}"#).unwrap();
/// assert_eq!(args, QueryArgs::nearest(4).exclude_ii(true));
/// assert_eq!(args.mode().unwrap(), QueryMode::Nearest { num_neighbors: 4, r_max: f64::INFINITY });
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[derive(serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct QueryArgs {
    /// Number of nearest neighbors to find for each query point
    #[serde(default)]
    pub num_neighbors: Option<usize>,
    /// Maximal distance between a query point and its neighbors
    #[serde(default)]
    pub r_max: Option<f64>,
    /// Skip pairs where the query point index is equal to the point index.
    /// This should be set when the query points are the indexed points.
    #[serde(default)]
    pub exclude_ii: bool,
}

/// The kind of query requested by a [`QueryArgs`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryMode {
    /// Find all neighbors closer than `r_max`
    Ball {
        r_max: f64,
    },
    /// Find the `num_neighbors` nearest neighbors closer than `r_max`
    Nearest {
        num_neighbors: usize,
        r_max: f64,
    },
}

impl QueryArgs {
    /// Arguments for a query of all neighbors closer than `r_max`
    pub fn ball(r_max: f64) -> QueryArgs {
        QueryArgs {
            num_neighbors: None,
            r_max: Some(r_max),
            exclude_ii: false,
        }
    }

    /// Arguments for a query of the `num_neighbors` nearest neighbors
    pub fn nearest(num_neighbors: usize) -> QueryArgs {
        QueryArgs {
            num_neighbors: Some(num_neighbors),
            r_max: None,
            exclude_ii: false,
        }
    }

    /// Set the `exclude_ii` flag
    #[must_use]
    pub fn exclude_ii(mut self, exclude_ii: bool) -> QueryArgs {
        self.exclude_ii = exclude_ii;
        return self;
    }

    /// Set the maximal distance
    #[must_use]
    pub fn with_r_max(mut self, r_max: f64) -> QueryArgs {
        self.r_max = Some(r_max);
        return self;
    }

    /// Load query arguments from a JSON string
    pub fn from_json(json: &str) -> Result<QueryArgs, Error> {
        let args = serde_json::from_str::<QueryArgs>(json)?;
        args.mode()?;
        return Ok(args);
    }

    /// Get the kind of query these arguments request, checking that all
    /// values are valid.
    pub fn mode(&self) -> Result<QueryMode, Error> {
        if let Some(r_max) = self.r_max {
            if r_max <= 0.0 || r_max.is_nan() {
                return Err(Error::InvalidParameter(format!(
                    "r_max must be positive, got {}", r_max
                )));
            }
        }

        match (self.num_neighbors, self.r_max) {
            (Some(0), _) => Err(Error::InvalidParameter(
                "num_neighbors must be positive, got 0".into()
            )),
            (Some(num_neighbors), r_max) => Ok(QueryMode::Nearest {
                num_neighbors: num_neighbors,
                r_max: r_max.unwrap_or(f64::INFINITY),
            }),
            (None, Some(r_max)) => Ok(QueryMode::Ball { r_max }),
            (None, None) => Err(Error::InvalidParameter(
                "one of num_neighbors or r_max must be set".into()
            )),
        }
    }

    /// Check these arguments for queries in the given `unit_cell`, and get
    /// the corresponding query mode.
    pub fn validate(&self, unit_cell: &UnitCell) -> Result<QueryMode, Error> {
        let mode = self.mode()?;
        if let QueryMode::Ball { r_max } = mode {
            let max_radius = unit_cell.max_image_radius();
            if r_max > max_radius {
                return Err(Error::InvalidParameter(format!(
                    "r_max ({}) is too large for this box, it must be at most \
                    half of the smallest periodic dimension ({})",
                    r_max, 2.0 * max_radius
                )));
            }
        }
        return Ok(mode);
    }
}

/// A neighbor query for a set of query points against a [`LinkCell`]
#[derive(Debug, Clone)]
pub struct LinkCellQuery<'a> {
    link_cell: &'a LinkCell<'a>,
    query_points: &'a [Vector3D],
    mode: QueryMode,
    exclude_ii: bool,
}

impl<'a> LinkCellQuery<'a> {
    pub(crate) fn new(link_cell: &'a LinkCell<'a>, query_points: &'a [Vector3D], args: &QueryArgs) -> Result<LinkCellQuery<'a>, Error> {
        let mode = args.validate(link_cell.unit_cell())?;
        return Ok(LinkCellQuery {
            link_cell: link_cell,
            query_points: query_points,
            mode: mode,
            exclude_ii: args.exclude_ii,
        });
    }

    /// Get the kind of query
    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    /// Get the number of query points
    pub fn len(&self) -> usize {
        self.query_points.len()
    }

    /// Check if there are no query points
    pub fn is_empty(&self) -> bool {
        self.query_points.is_empty()
    }

    /// Get an iterator over the neighbors of the query point at index `i`
    pub fn query_point(&self, i: usize) -> PerPointIterator<'a> {
        let query_point = self.query_points[i];
        match self.mode {
            QueryMode::Ball { r_max } => PerPointIterator::Ball(BallIterator::new(
                self.link_cell, query_point, i, r_max, self.exclude_ii
            )),
            QueryMode::Nearest { num_neighbors, r_max } => PerPointIterator::Nearest(NearestIterator::new(
                self.link_cell, query_point, i, num_neighbors, r_max, self.exclude_ii
            )),
        }
    }

    /// Run the query for all query points in parallel, and collect the
    /// results in a [`NeighborList`] sorted by query point, then distance,
    /// then point index.
    #[time_graph::instrument(name = "LinkCellQuery::to_neighbor_list")]
    pub fn to_neighbor_list(&self) -> NeighborList {
        let bonds = crate::parallel::install(|| {
            (0..self.query_points.len()).into_par_iter()
                .map(|i| {
                    let mut bonds = self.query_point(i).collect::<Vec<_>>();
                    bonds.sort_unstable_by(NeighborBond::cmp_by_distance);
                    bonds
                })
                .collect::<Vec<_>>()
        });

        return NeighborList::from_bonds(
            bonds.into_iter().flatten().collect(),
            self.query_points.len(),
            self.link_cell.points().len(),
        );
    }
}
