use indexmap::IndexSet;

use crate::Vector3D;

use super::link_cell::CellIter;
use super::{CellShell, LinkCell, NeighborBond};

/// Result of a single step of a [`CellSearch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchStep {
    /// Found a point with the given index
    Point(usize),
    /// All the cells in the shell with the given range have been searched
    ShellDone(u32),
    /// All the cells have been searched
    Exhausted,
}

/// Expanding search through the cells of a [`LinkCell`], starting at the cell
/// containing a query point and going through the surrounding shells of
/// cells in increasing range order. Every cell is visited at most once, even
/// when multiple offsets map to the same cell through periodic boundaries.
#[derive(Debug, Clone)]
struct CellSearch<'a> {
    link_cell: &'a LinkCell<'a>,
    /// coordinates of the cell containing the query point
    origin: [usize; 3],
    /// next cell offset to visit
    shell: CellShell,
    /// range of the shell currently being searched
    range: u32,
    /// points in the cell currently being searched
    current: CellIter<'a>,
    /// all the cells already visited
    searched: IndexSet<usize>,
}

impl<'a> CellSearch<'a> {
    fn new(link_cell: &'a LinkCell<'a>, query_point: Vector3D) -> CellSearch<'a> {
        CellSearch {
            link_cell: link_cell,
            origin: link_cell.cell_coordinates(query_point),
            shell: CellShell::new(0, link_cell.is_2d()),
            range: 0,
            current: CellIter::empty(),
            searched: IndexSet::new(),
        }
    }

    fn step(&mut self) -> SearchStep {
        loop {
            if let Some(point) = self.current.next() {
                return SearchStep::Point(point);
            }

            if self.shell.range() != self.range {
                let done = self.range;
                self.range = self.shell.range();
                return SearchStep::ShellDone(done);
            }

            if self.searched.len() >= self.link_cell.n_cells() {
                return SearchStep::Exhausted;
            }

            let offset = self.shell.offset();
            self.shell.advance();
            if let Some(cell) = self.link_cell.neighbor_cell(self.origin, offset) {
                if self.searched.insert(cell) {
                    self.current = self.link_cell.iter_cell(cell);
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Phase {
    Searching,
    Draining(std::vec::IntoIter<NeighborBond>),
}

/// Iterator over the `num_neighbors` nearest neighbors of a single query
/// point, in increasing distance order. Ties are broken by point index.
///
/// The search goes through shells of cells around the query point, keeping
/// the best candidates found so far, until the remaining cells can not
/// contain any closer point.
#[derive(Debug, Clone)]
pub struct NearestIterator<'a> {
    search: CellSearch<'a>,
    query_point: Vector3D,
    query_index: usize,
    num_neighbors: usize,
    r_max: f64,
    exclude_ii: bool,
    candidates: Vec<NeighborBond>,
    phase: Phase,
}

impl<'a> NearestIterator<'a> {
    /// Create a new iterator over the nearest neighbors of `query_point`.
    ///
    /// Only neighbors closer than `r_max` (which can be infinite) are
    /// reported. If `exclude_ii` is `true`, the point with the same index as
    /// the query point is skipped.
    pub fn new(
        link_cell: &'a LinkCell<'a>,
        query_point: Vector3D,
        query_index: usize,
        num_neighbors: usize,
        r_max: f64,
        exclude_ii: bool,
    ) -> NearestIterator<'a> {
        let phase = if link_cell.points().is_empty() || num_neighbors == 0 {
            Phase::Draining(Vec::new().into_iter())
        } else {
            Phase::Searching
        };

        NearestIterator {
            search: CellSearch::new(link_cell, query_point),
            query_point: query_point,
            query_index: query_index,
            num_neighbors: num_neighbors,
            r_max: r_max,
            exclude_ii: exclude_ii,
            candidates: Vec::with_capacity(num_neighbors + 1),
            phase: phase,
        }
    }

    /// Insert a new candidate in the sorted list, keeping only the best
    /// `num_neighbors`
    fn insert(&mut self, bond: NeighborBond) {
        let position = self.candidates.partition_point(|candidate| {
            candidate.cmp_by_distance(&bond).is_lt()
        });

        if position < self.num_neighbors {
            self.candidates.insert(position, bond);
            self.candidates.truncate(self.num_neighbors);
        }
    }

    /// Run the search until no unsearched point can be closer than the
    /// current candidates
    fn search(&mut self) {
        let link_cell = self.search.link_cell;
        let unit_cell = link_cell.unit_cell();
        let points = link_cell.points();
        let cell_width = link_cell.cell_width();
        let r_max2 = self.r_max * self.r_max;

        loop {
            match self.search.step() {
                SearchStep::Point(point_index) => {
                    if self.exclude_ii && point_index == self.query_index {
                        continue;
                    }

                    let distance2 = unit_cell.distance2(self.query_point, points[point_index]);
                    if distance2 < r_max2 {
                        self.insert(NeighborBond {
                            query_point_index: self.query_index,
                            point_index: point_index,
                            distance: distance2.sqrt(),
                            weight: 1.0,
                        });
                    }
                }
                SearchStep::ShellDone(range) => {
                    // all points in cells not yet searched are at least this
                    // far from the query point
                    let safe_radius = range as f64 * cell_width;
                    if safe_radius >= self.r_max {
                        return;
                    }

                    if self.candidates.len() == self.num_neighbors {
                        let worst = self.candidates[self.num_neighbors - 1].distance;
                        if worst < safe_radius {
                            return;
                        }
                    }
                }
                SearchStep::Exhausted => return,
            }
        }
    }
}

impl<'a> Iterator for NearestIterator<'a> {
    type Item = NeighborBond;

    fn next(&mut self) -> Option<NeighborBond> {
        if let Phase::Searching = self.phase {
            self.search();
            let candidates = std::mem::take(&mut self.candidates);
            self.phase = Phase::Draining(candidates.into_iter());
        }

        match &mut self.phase {
            Phase::Draining(bonds) => bonds.next(),
            Phase::Searching => unreachable!("nearest neighbors search did not run"),
        }
    }
}

impl<'a> std::iter::FusedIterator for NearestIterator<'a> {}

/// Iterator over all the neighbors of a single query point closer than
/// `r_max`. Neighbors are produced in no particular order.
#[derive(Debug, Clone)]
pub struct BallIterator<'a> {
    search: CellSearch<'a>,
    query_point: Vector3D,
    query_index: usize,
    r_max: f64,
    exclude_ii: bool,
    /// number of additional shells to search when `r_max` is not a multiple
    /// of the cell width
    extra_shell: u32,
    finished: bool,
}

impl<'a> BallIterator<'a> {
    /// Create a new iterator over the neighbors of `query_point` closer than
    /// `r_max`. If `exclude_ii` is `true`, the point with the same index as
    /// the query point is skipped.
    pub fn new(
        link_cell: &'a LinkCell<'a>,
        query_point: Vector3D,
        query_index: usize,
        r_max: f64,
        exclude_ii: bool,
    ) -> BallIterator<'a> {
        let ratio = r_max / link_cell.cell_width();
        let extra_shell = if ratio.fract() == 0.0 { 0 } else { 1 };

        BallIterator {
            search: CellSearch::new(link_cell, query_point),
            query_point: query_point,
            query_index: query_index,
            r_max: r_max,
            exclude_ii: exclude_ii,
            extra_shell: extra_shell,
            finished: link_cell.points().is_empty(),
        }
    }
}

impl<'a> Iterator for BallIterator<'a> {
    type Item = NeighborBond;

    fn next(&mut self) -> Option<NeighborBond> {
        if self.finished {
            return None;
        }

        let link_cell = self.search.link_cell;
        let cell_width = link_cell.cell_width();
        let r_max2 = self.r_max * self.r_max;

        loop {
            match self.search.step() {
                SearchStep::Point(point_index) => {
                    if self.exclude_ii && point_index == self.query_index {
                        continue;
                    }

                    let point = link_cell.points()[point_index];
                    let distance2 = link_cell.unit_cell().distance2(self.query_point, point);
                    if distance2 < r_max2 {
                        return Some(NeighborBond {
                            query_point_index: self.query_index,
                            point_index: point_index,
                            distance: distance2.sqrt(),
                            weight: 1.0,
                        });
                    }
                }
                SearchStep::ShellDone(range) => {
                    let next_range = range + 1;
                    if next_range >= self.extra_shell {
                        let inner_radius = (next_range - self.extra_shell) as f64 * cell_width;
                        if inner_radius > self.r_max {
                            self.finished = true;
                            return None;
                        }
                    }
                }
                SearchStep::Exhausted => {
                    self.finished = true;
                    return None;
                }
            }
        }
    }
}

impl<'a> std::iter::FusedIterator for BallIterator<'a> {}

/// Iterator over the neighbors of a single query point, for any kind of
/// query
#[derive(Debug, Clone)]
pub enum PerPointIterator<'a> {
    /// k-nearest neighbors query
    Nearest(NearestIterator<'a>),
    /// fixed radius query
    Ball(BallIterator<'a>),
}

impl<'a> Iterator for PerPointIterator<'a> {
    type Item = NeighborBond;

    fn next(&mut self) -> Option<NeighborBond> {
        match self {
            PerPointIterator::Nearest(iterator) => iterator.next(),
            PerPointIterator::Ball(iterator) => iterator.next(),
        }
    }
}

impl<'a> std::iter::FusedIterator for PerPointIterator<'a> {}
