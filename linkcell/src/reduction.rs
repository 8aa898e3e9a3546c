//! Apply a function to all pairs of neighbors, in parallel.

use crate::{Error, Vector3D};
use crate::locality::{LinkCell, NeighborList, QueryArgs, QueryMode};
use crate::parallel::for_loop_wrapper;
use crate::systems::{Points, RawPoints};

/// Call `callback(point_index, query_point_index, distance, weight)` for
/// every bond in `neighbor_list`, in parallel over blocks of bonds.
///
/// Bonds in the same block are processed in order, but there is no ordering
/// between blocks.
#[time_graph::instrument(name = "loop_over_neighbor_list")]
pub fn loop_over_neighbor_list<F>(neighbor_list: &NeighborList, callback: F) where
    F: Fn(usize, usize, f64, f64) + Sync,
{
    let indexes = neighbor_list.indexes();
    let distances = neighbor_list.distances();
    let weights = neighbor_list.weights();

    for_loop_wrapper(true, 0, neighbor_list.len(), |begin, end| {
        for bond in begin..end {
            let query_point = indexes[[bond, 0]];
            let point = indexes[[bond, 1]];
            callback(point, query_point, distances[bond], weights[bond]);
        }
    });
}

/// Call `callback(point_index, query_point_index, distance, weight)` for
/// every pair of neighbors between `query_points` and `points`.
///
/// If `neighbor_list` is given, the pairs are taken from it and `args` is
/// ignored. Otherwise the pairs are found by running the query described by
/// `args` for every query point, in parallel; and the weight is always 1.
/// When `points` are not indexed yet, a [`LinkCell`] is built for them
/// first.
///
/// `callback` is called concurrently from multiple threads, in no particular
/// order. Use [`ThreadLocalArray`](crate::parallel::ThreadLocalArray) to
/// accumulate results.
#[time_graph::instrument(name = "loop_over_neighbors")]
pub fn loop_over_neighbors<F>(
    points: Points<'_>,
    query_points: &[Vector3D],
    args: &QueryArgs,
    neighbor_list: Option<&NeighborList>,
    callback: F,
) -> Result<(), Error> where
    F: Fn(usize, usize, f64, f64) + Sync,
{
    if let Some(neighbor_list) = neighbor_list {
        if neighbor_list.num_query_points() != query_points.len() || neighbor_list.num_points() != points.points().len() {
            return Err(Error::InvalidParameter(format!(
                "the neighbor list was created for {} query points and {} points, \
                but got {} query points and {} points",
                neighbor_list.num_query_points(), neighbor_list.num_points(),
                query_points.len(), points.points().len()
            )));
        }

        loop_over_neighbor_list(neighbor_list, callback);
        return Ok(());
    }

    let mode = args.validate(points.unit_cell())?;

    let owned;
    let link_cell = match points {
        Points::Indexed(link_cell) => link_cell,
        Points::Raw(raw) => {
            owned = raw.index(default_cell_width(&raw, mode))?;
            &owned
        }
    };

    let query = link_cell.query(query_points, args)?;
    for_loop_wrapper(true, 0, query_points.len(), |begin, end| {
        for i in begin..end {
            for bond in query.query_point(i) {
                callback(bond.point_index, bond.query_point_index, bond.distance, bond.weight);
            }
        }
    });

    return Ok(());
}

/// Pick a cell width for a [`LinkCell`] over `raw` points, suitable for the
/// given query.
///
/// Ball queries use `r_max`. Nearest neighbors queries use the size of a
/// region containing `num_neighbors` points on average, limited to `r_max`.
fn default_cell_width(raw: &RawPoints<'_>, mode: QueryMode) -> f64 {
    let unit_cell = &raw.unit_cell;
    let dimensions = if unit_cell.is_2d() { 2.0 } else { 3.0 };

    match mode {
        QueryMode::Ball { r_max } => r_max,
        QueryMode::Nearest { num_neighbors, r_max } => {
            let n_points = usize::max(raw.points.len(), 1) as f64;
            let volume = unit_cell.volume() * num_neighbors as f64 / n_points;
            let width = f64::powf(volume, 1.0 / dimensions);
            f64::min(width, r_max)
        }
    }
}

/// Build a [`LinkCell`] over `raw` points suitable for the given query
/// arguments.
pub fn default_link_cell<'a>(raw: &RawPoints<'a>, args: &QueryArgs) -> Result<LinkCell<'a>, Error> {
    let mode = args.validate(&raw.unit_cell)?;
    return raw.index(default_cell_width(raw, mode));
}
