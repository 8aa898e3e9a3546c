use log::{debug, warn};
use once_cell::sync::OnceCell;
use rayon::prelude::*;

use crate::{Error, Vector3D};
use crate::systems::UnitCell;

use super::{CellShell, Index3D, NeighborBond, NeighborList};
use super::{LinkCellQuery, QueryArgs};

/// Value used to mark the end of a cell chain in the cell list
pub const TERMINATOR: usize = usize::MAX;

/// Maximal number of cells, we need to use this to prevent having too many
/// cells with a large box and a small cell width
const MAX_NUMBER_OF_CELLS: f64 = 1e6;

/// A link-cell spatial index over a set of points.
///
/// The box is split in a grid of cells at least `cell_width` wide along each
/// axis, and every point is assigned to exactly one cell. The points in a cell
/// are stored as an intrusive linked list: `cell_list[n_points + cell]` is the
/// first point in `cell`, and `cell_list[i]` is the point following `i` in the
/// same cell, or [`TERMINATOR`].
///
/// Points outside of the box are wrapped back inside along periodic axes, and
/// assigned to the closest edge cell along aperiodic ones.
///
/// The index borrows the points it was built from; all iterators created from
/// it borrow the index in turn.
#[derive(Debug)]
pub struct LinkCell<'a> {
    /// Bounding box of the points
    unit_cell: UnitCell,
    /// Positions of the indexed points
    points: &'a [Vector3D],
    /// Minimal width of the cells
    cell_width: f64,
    /// Shape of the cell grid
    indexer: Index3D,
    /// Cell chains, see the type documentation
    cell_list: Vec<usize>,
    /// Lazily computed list of neighboring cells for each cell
    neighbors: Vec<OnceCell<Vec<usize>>>,
}

impl<'a> LinkCell<'a> {
    /// Build a new link-cell index for `points` in the given `unit_cell`,
    /// with cells at least `cell_width` wide.
    ///
    /// If the box is smaller than `cell_width` along some axis, a single cell
    /// is used along this axis.
    pub fn new(unit_cell: UnitCell, cell_width: f64, points: &'a [Vector3D]) -> Result<LinkCell<'a>, Error> {
        if cell_width <= 0.0 || !cell_width.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "cell width must be a positive finite number, got {}", cell_width
            )));
        }

        let indexer = grid_shape(&unit_cell, cell_width);
        let mut neighbors = Vec::new();
        neighbors.resize_with(indexer.len(), OnceCell::new);

        let mut link_cell = LinkCell {
            unit_cell: unit_cell,
            points: points,
            cell_width: cell_width,
            indexer: indexer,
            cell_list: Vec::new(),
            neighbors: neighbors,
        };
        link_cell.compute_cell_list();

        return Ok(link_cell);
    }

    /// Rebuild the cell chains for a new set of points in the same box.
    ///
    /// The cached neighboring cells only depend on the shape of the grid, and
    /// are kept as-is.
    pub fn rebuild(&mut self, points: &'a [Vector3D]) {
        self.points = points;
        self.compute_cell_list();
    }

    #[time_graph::instrument(name = "LinkCell::compute_cell_list")]
    fn compute_cell_list(&mut self) {
        let n_points = self.points.len();
        self.cell_list.clear();
        self.cell_list.resize(n_points + self.indexer.len(), TERMINATOR);

        for (i, &point) in self.points.iter().enumerate() {
            let cell = n_points + self.cell_of(point);
            self.cell_list[i] = self.cell_list[cell];
            self.cell_list[cell] = i;
        }

        debug!(
            "built link-cell with {:?} cells of width {} for {} points",
            self.indexer.shape(), self.cell_width, n_points
        );
    }

    /// Get the bounding box of this index
    pub fn unit_cell(&self) -> &UnitCell {
        &self.unit_cell
    }

    /// Get the indexed points
    pub fn points(&self) -> &'a [Vector3D] {
        self.points
    }

    /// Get the minimal cell width used to build this index
    pub fn cell_width(&self) -> f64 {
        self.cell_width
    }

    /// Get the number of cells along each axis
    pub fn dimensions(&self) -> [usize; 3] {
        self.indexer.shape()
    }

    /// Get the total number of cells
    pub fn n_cells(&self) -> usize {
        self.indexer.len()
    }

    /// Get the indexer mapping cell coordinates to cell indexes
    pub fn indexer(&self) -> &Index3D {
        &self.indexer
    }

    /// Check if this index is two-dimensional
    pub fn is_2d(&self) -> bool {
        self.unit_cell.is_2d()
    }

    /// Get the coordinates of the cell containing `point`
    pub fn cell_coordinates(&self, point: Vector3D) -> [usize; 3] {
        let fractional = self.unit_cell.fractional(point);
        let periodic = self.unit_cell.periodic();
        let shape = self.indexer.shape();

        let mut coordinates = [0; 3];
        for axis in 0..3 {
            let n_cells = shape[axis] as i64;
            let cell = f64::floor(fractional[axis] * n_cells as f64) as i64;
            // rem_euclid also takes care of fractional coordinates exactly
            // equal to 1
            coordinates[axis] = if periodic[axis] {
                cell.rem_euclid(n_cells) as usize
            } else {
                cell.clamp(0, n_cells - 1) as usize
            };
        }
        return coordinates;
    }

    /// Get the index of the cell containing `point`
    pub fn cell_of(&self, point: Vector3D) -> usize {
        self.indexer.index(self.cell_coordinates(point))
    }

    /// Get the index of the cell at the given, possibly out of the grid,
    /// `coordinates`. Coordinates are wrapped back inside the grid along
    /// periodic axes; this returns `None` if the coordinates are outside of
    /// the grid along an aperiodic axis.
    pub fn wrapped_cell_index(&self, coordinates: [i64; 3]) -> Option<usize> {
        let periodic = self.unit_cell.periodic();
        let shape = self.indexer.shape();

        let mut wrapped = [0; 3];
        for axis in 0..3 {
            let n_cells = shape[axis] as i64;
            let coordinate = coordinates[axis];
            wrapped[axis] = if periodic[axis] {
                coordinate.rem_euclid(n_cells) as usize
            } else if coordinate < 0 || coordinate >= n_cells {
                return None;
            } else {
                coordinate as usize
            };
        }
        return Some(self.indexer.index(wrapped));
    }

    /// Get the index of the cell at `offset` from the cell at `origin`
    pub(crate) fn neighbor_cell(&self, origin: [usize; 3], offset: [i32; 3]) -> Option<usize> {
        self.wrapped_cell_index([
            origin[0] as i64 + offset[0] as i64,
            origin[1] as i64 + offset[1] as i64,
            origin[2] as i64 + offset[2] as i64,
        ])
    }

    /// Iterate over the indexes of all points in the given `cell`
    pub fn iter_cell(&self, cell: usize) -> CellIter<'_> {
        debug_assert!(cell < self.n_cells());
        CellIter {
            cell_list: &self.cell_list,
            current: self.cell_list[self.points.len() + cell],
        }
    }

    /// Get the sorted list of cells within one cell of `cell` (including
    /// `cell` itself), i.e. the 27 cells (9 in 2D) which must be searched to
    /// find all points closer than `cell_width` to a point inside `cell`.
    ///
    /// There are less cells than that when multiple offsets map to the same
    /// cell through periodic boundaries, or when the cell sits on an aperiodic
    /// edge.
    ///
    /// The list is computed on first access and cached; this can be called
    /// concurrently from multiple threads.
    pub fn cell_neighbors(&self, cell: usize) -> &[usize] {
        debug_assert!(cell < self.n_cells());
        self.neighbors[cell].get_or_init(|| self.compute_cell_neighbors(cell))
    }

    fn compute_cell_neighbors(&self, cell: usize) -> Vec<usize> {
        let origin = self.indexer.coordinates(cell);
        let is_2d = self.is_2d();

        let mut neighbors = Vec::new();
        let mut shell = CellShell::new(0, is_2d);
        let end = CellShell::new(2, is_2d);
        while shell != end {
            if let Some(neighbor) = self.neighbor_cell(origin, shell.offset()) {
                neighbors.push(neighbor);
            }
            shell.advance();
        }

        neighbors.sort_unstable();
        neighbors.dedup();
        return neighbors;
    }

    /// Compute the list of all pairs between `query_points` and the indexed
    /// points closer than `r_max`, using the cached neighboring cells.
    ///
    /// This only looks one cell away, so `r_max` must not be larger than the
    /// cell width. If `exclude_ii` is `true`, pairs where the query point
    /// index and the point index are equal are skipped.
    ///
    /// Bonds are sorted by query point, then distance, then point index.
    #[time_graph::instrument(name = "LinkCell::neighbor_list")]
    pub fn neighbor_list(&self, query_points: &[Vector3D], r_max: f64, exclude_ii: bool) -> Result<NeighborList, Error> {
        if r_max <= 0.0 || !r_max.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "r_max must be positive, got {}", r_max
            )));
        }

        if r_max > self.cell_width {
            return Err(Error::InvalidParameter(format!(
                "r_max ({}) can not be larger than the cell width ({}) when \
                building a neighbor list", r_max, self.cell_width
            )));
        }

        if r_max > self.unit_cell.max_image_radius() {
            return Err(Error::InvalidParameter(format!(
                "r_max ({}) is too large for this box, it must be at most half \
                of the smallest periodic dimension ({})",
                r_max, 2.0 * self.unit_cell.max_image_radius()
            )));
        }

        let r_max2 = r_max * r_max;
        let bonds = crate::parallel::install(|| {
            query_points.par_iter()
                .enumerate()
                .map(|(query_index, &query_point)| {
                    let mut bonds = Vec::new();
                    let cell = self.cell_of(query_point);
                    for &neighbor in self.cell_neighbors(cell) {
                        for point_index in self.iter_cell(neighbor) {
                            if exclude_ii && point_index == query_index {
                                continue;
                            }

                            let distance2 = self.unit_cell.distance2(query_point, self.points[point_index]);
                            if distance2 < r_max2 {
                                if distance2 < 1e-6 && point_index != query_index {
                                    warn!(
                                        "query point {} and point {} are very close to one another ({})",
                                        query_index, point_index, distance2.sqrt()
                                    );
                                }

                                bonds.push(NeighborBond {
                                    query_point_index: query_index,
                                    point_index: point_index,
                                    distance: distance2.sqrt(),
                                    weight: 1.0,
                                });
                            }
                        }
                    }
                    bonds.sort_unstable_by(NeighborBond::cmp_by_distance);
                    bonds
                })
                .collect::<Vec<_>>()
        });

        return Ok(NeighborList::from_bonds(
            bonds.into_iter().flatten().collect(),
            query_points.len(),
            self.points.len(),
        ));
    }

    /// Prepare a neighbor query for `query_points` against this index.
    pub fn query<'q>(&'q self, query_points: &'q [Vector3D], args: &QueryArgs) -> Result<LinkCellQuery<'q>, Error> {
        LinkCellQuery::new(self, query_points, args)
    }
}

/// Compute the shape of the cell grid for the given box and cell width
fn grid_shape(unit_cell: &UnitCell, cell_width: f64) -> Index3D {
    let distances_between_faces = unit_cell.distances_between_faces();
    let dimensions = if unit_cell.is_2d() { 2 } else { 3 };

    let mut n_cells = [1.0; 3];
    for axis in 0..dimensions {
        n_cells[axis] = f64::max(1.0, f64::floor(distances_between_faces[axis] / cell_width));
    }

    // limit memory consumption by ensuring we have less than
    // `MAX_NUMBER_OF_CELLS` cells. Cells only get wider here, so all the
    // search bounds derived from `cell_width` stay valid.
    let n_cells_total = n_cells[0] * n_cells[1] * n_cells[2];
    if n_cells_total > MAX_NUMBER_OF_CELLS {
        let ratio = n_cells_total / MAX_NUMBER_OF_CELLS;
        let factor = if dimensions == 3 { f64::cbrt(ratio) } else { f64::sqrt(ratio) };
        for n in n_cells.iter_mut().take(dimensions) {
            *n = f64::max(1.0, f64::floor(*n / factor));
        }

        warn!(
            "a cell width of {} would create {} cells, using {:?} cells instead",
            cell_width, n_cells_total, n_cells
        );
    }

    return Index3D::new(n_cells[0] as usize, n_cells[1] as usize, n_cells[2] as usize);
}

/// Iterator over the indexes of the points in a single cell of a
/// [`LinkCell`]
#[derive(Debug, Clone)]
pub struct CellIter<'a> {
    cell_list: &'a [usize],
    current: usize,
}

impl<'a> CellIter<'a> {
    /// An iterator over an empty cell
    pub(crate) fn empty() -> CellIter<'a> {
        CellIter {
            cell_list: &[],
            current: TERMINATOR,
        }
    }
}

impl<'a> Iterator for CellIter<'a> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.current == TERMINATOR {
            return None;
        }

        let point = self.current;
        self.current = self.cell_list[point];
        return Some(point);
    }
}

impl<'a> std::iter::FusedIterator for CellIter<'a> {}

#[cfg(test)]
mod tests {
    use approx::assert_ulps_eq;
    use rand::prelude::*;

    use super::*;

    fn random_points(n_points: usize, size: f64, seed: u64) -> Vec<Vector3D> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n_points)
            .map(|_| Vector3D::new(
                rng.gen_range(0.0..size),
                rng.gen_range(0.0..size),
                rng.gen_range(0.0..size),
            ))
            .collect()
    }

    #[test]
    fn invalid_width() {
        let points = [Vector3D::zero()];
        for width in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let error = LinkCell::new(UnitCell::cubic(10.0), width, &points).unwrap_err();
            assert!(error.to_string().starts_with("invalid parameter: cell width must be"));
        }
    }

    #[test]
    fn grid_dimensions() {
        let points: [Vector3D; 0] = [];
        let link_cell = LinkCell::new(UnitCell::orthorhombic(10.0, 7.0, 3.0), 2.0, &points).unwrap();
        assert_eq!(link_cell.dimensions(), [5, 3, 1]);
        assert_eq!(link_cell.n_cells(), 15);

        // box smaller than the cell width
        let link_cell = LinkCell::new(UnitCell::cubic(1.0), 2.0, &points).unwrap();
        assert_eq!(link_cell.dimensions(), [1, 1, 1]);

        let link_cell = LinkCell::new(UnitCell::rectangle(10.0, 4.0), 2.0, &points).unwrap();
        assert_eq!(link_cell.dimensions(), [5, 2, 1]);
        assert!(link_cell.is_2d());
    }

    #[test]
    fn too_many_cells() {
        let points: [Vector3D; 0] = [];
        let link_cell = LinkCell::new(UnitCell::cubic(1000.0), 1.0, &points).unwrap();
        let n_cells = link_cell.n_cells();
        assert!(n_cells as f64 <= MAX_NUMBER_OF_CELLS);
        assert!(link_cell.dimensions().iter().all(|&n| n == 99 || n == 100));

        // the actual cells are at least as wide as requested
        let widths = link_cell.unit_cell().distances_between_faces();
        for axis in 0..3 {
            assert!(widths[axis] / link_cell.dimensions()[axis] as f64 >= 1.0);
        }
    }

    fn check_chains(link_cell: &LinkCell<'_>) {
        let n_points = link_cell.points().len();
        let mut seen = vec![0; n_points];
        for cell in 0..link_cell.n_cells() {
            let mut length = 0;
            for point in link_cell.iter_cell(cell) {
                seen[point] += 1;
                length += 1;
                assert!(length <= n_points, "cell chain does not terminate");
                assert_eq!(link_cell.cell_of(link_cell.points()[point]), cell);
            }
        }
        assert!(seen.iter().all(|&count| count == 1));
    }

    #[test]
    fn every_point_in_one_chain() {
        for (i, n_points) in [0, 1, 100, 10000].into_iter().enumerate() {
            let points = random_points(n_points, 10.0, i as u64);
            let link_cell = LinkCell::new(UnitCell::cubic(10.0), 1.5, &points).unwrap();
            check_chains(&link_cell);

            let cell = UnitCell::cubic(10.0).with_periodicity([false, true, false]);
            let link_cell = LinkCell::new(cell, 0.7, &points).unwrap();
            check_chains(&link_cell);
        }
    }

    #[test]
    fn points_outside_the_box() {
        let points = [
            Vector3D::new(-1.0, 12.0, 5.0),
            Vector3D::new(10.5, 10.5, 10.5),
            Vector3D::new(25.0, -0.5, 3.0),
        ];

        let link_cell = LinkCell::new(UnitCell::cubic(10.0), 2.0, &points).unwrap();
        assert_eq!(link_cell.cell_coordinates(points[0]), [4, 1, 2]);
        assert_eq!(link_cell.cell_coordinates(points[1]), [0, 0, 0]);
        assert_eq!(link_cell.cell_coordinates(points[2]), [2, 4, 1]);
        check_chains(&link_cell);

        let cell = UnitCell::cubic(10.0).with_periodicity([false, false, false]);
        let link_cell = LinkCell::new(cell, 2.0, &points).unwrap();
        assert_eq!(link_cell.cell_coordinates(points[0]), [0, 4, 2]);
        assert_eq!(link_cell.cell_coordinates(points[1]), [4, 4, 4]);
        assert_eq!(link_cell.cell_coordinates(points[2]), [4, 0, 1]);
        check_chains(&link_cell);
    }

    #[test]
    fn rebuild() {
        let first = random_points(50, 10.0, 1);
        let second = random_points(80, 10.0, 2);

        let mut link_cell = LinkCell::new(UnitCell::cubic(10.0), 2.5, &first).unwrap();
        check_chains(&link_cell);
        let neighbors = link_cell.cell_neighbors(3).to_vec();

        link_cell.rebuild(&second);
        assert_eq!(link_cell.points().len(), 80);
        check_chains(&link_cell);
        assert_eq!(link_cell.cell_neighbors(3), neighbors);
    }

    #[test]
    fn cell_neighbors() {
        let points: [Vector3D; 0] = [];
        let link_cell = LinkCell::new(UnitCell::cubic(10.0), 2.0, &points).unwrap();
        for cell in 0..link_cell.n_cells() {
            let neighbors = link_cell.cell_neighbors(cell);
            assert_eq!(neighbors.len(), 27);
            assert!(neighbors.contains(&cell));
            assert!(neighbors.windows(2).all(|w| w[0] < w[1]));
        }

        let link_cell = LinkCell::new(UnitCell::square(10.0), 2.0, &points).unwrap();
        assert!((0..link_cell.n_cells()).all(|cell| link_cell.cell_neighbors(cell).len() == 9));

        // periodic images of the same cell are only included once
        let link_cell = LinkCell::new(UnitCell::orthorhombic(10.0, 4.0, 2.0), 2.0, &points).unwrap();
        assert_eq!(link_cell.dimensions(), [5, 2, 1]);
        assert_eq!(link_cell.cell_neighbors(0).len(), 3 * 2 * 1);

        // aperiodic boundaries
        let cell = UnitCell::cubic(10.0).with_periodicity([false, false, false]);
        let link_cell = LinkCell::new(cell, 2.0, &points).unwrap();
        assert_eq!(link_cell.cell_neighbors(0), [0, 1, 5, 6, 25, 26, 30, 31]);
        let center = link_cell.indexer().index([2, 2, 2]);
        assert_eq!(link_cell.cell_neighbors(center).len(), 27);
    }

    #[test]
    fn concurrent_cell_neighbors() {
        let points: [Vector3D; 0] = [];
        let link_cell = LinkCell::new(UnitCell::cubic(10.0), 1.0, &points).unwrap();
        let n_cells = link_cell.n_cells();

        let counts = (0..4 * n_cells).into_par_iter()
            .map(|i| link_cell.cell_neighbors(i % n_cells).len())
            .collect::<Vec<_>>();
        assert!(counts.iter().all(|&count| count == 27));
    }

    #[test]
    fn wrapped_cell_index() {
        let points: [Vector3D; 0] = [];
        let cell = UnitCell::cubic(10.0).with_periodicity([true, false, true]);
        let link_cell = LinkCell::new(cell, 2.0, &points).unwrap();
        let indexer = link_cell.indexer();

        assert_eq!(link_cell.wrapped_cell_index([-1, 0, 5]), Some(indexer.index([4, 0, 0])));
        assert_eq!(link_cell.wrapped_cell_index([7, 4, -6]), Some(indexer.index([2, 4, 4])));
        assert_eq!(link_cell.wrapped_cell_index([0, -1, 0]), None);
        assert_eq!(link_cell.wrapped_cell_index([0, 5, 0]), None);
    }

    #[test]
    fn neighbor_list() {
        let points = [
            Vector3D::new(0.0, 0.0, 0.0),
            Vector3D::new(1.0, 0.0, 0.0),
            Vector3D::new(0.0, 1.0, 0.0),
            Vector3D::new(5.0, 5.0, 0.0),
        ];
        let cell = UnitCell::square(10.0).with_periodicity([false, false, false]);
        let link_cell = LinkCell::new(cell, 2.0, &points).unwrap();

        let list = link_cell.neighbor_list(&points, 1.5, true).unwrap();
        let pairs = list.iter().map(|b| (b.query_point_index, b.point_index)).collect::<Vec<_>>();
        assert_eq!(pairs, [(0, 1), (0, 2), (1, 0), (1, 2), (2, 0), (2, 1)]);
        assert_ulps_eq!(list.bond(0).distance, 1.0);
        assert_ulps_eq!(list.bond(3).distance, f64::sqrt(2.0));

        let list = link_cell.neighbor_list(&points, 1.5, false).unwrap();
        assert_eq!(list.len(), 10);
        assert_eq!(list.bond(9).query_point_index, 3);
        assert_eq!(list.bond(9).point_index, 3);

        let error = link_cell.neighbor_list(&points, 3.0, true).unwrap_err();
        assert!(error.to_string().contains("can not be larger than the cell width"));
        assert!(link_cell.neighbor_list(&points, -1.0, true).is_err());
    }
}
