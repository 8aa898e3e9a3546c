//! Point sets and the boxes containing them.

use crate::{Error, Vector3D};
use crate::locality::LinkCell;

mod cell;
pub use self::cell::{UnitCell, CellShape};

#[cfg(test)]
pub(crate) mod test_utils;

/// A set of points in a box, without any spatial index
#[derive(Debug, Clone, Copy)]
pub struct RawPoints<'a> {
    /// Bounding box of the points
    pub unit_cell: UnitCell,
    /// Positions of the points
    pub points: &'a [Vector3D],
}

impl<'a> RawPoints<'a> {
    /// Create a new set of raw points
    pub fn new(unit_cell: UnitCell, points: &'a [Vector3D]) -> RawPoints<'a> {
        RawPoints { unit_cell, points }
    }

    /// Build a [`LinkCell`] index over these points, with the given cell
    /// width
    pub fn index(&self, cell_width: f64) -> Result<LinkCell<'a>, Error> {
        LinkCell::new(self.unit_cell, cell_width, self.points)
    }
}

/// The reference points of a neighbor query, either as a bare point set or
/// already indexed.
///
/// Neighbor queries need an index; when given `Points::Raw`, one is built
/// on the fly with a default cell width.
#[derive(Debug, Clone, Copy)]
pub enum Points<'a> {
    /// Points without any spatial index
    Raw(RawPoints<'a>),
    /// Points already sorted in a link-cell index
    Indexed(&'a LinkCell<'a>),
}

impl<'a> Points<'a> {
    /// Get the bounding box of the points
    pub fn unit_cell(&self) -> &UnitCell {
        match self {
            Points::Raw(raw) => &raw.unit_cell,
            Points::Indexed(link_cell) => link_cell.unit_cell(),
        }
    }

    /// Get the positions of the points
    pub fn points(&self) -> &'a [Vector3D] {
        match self {
            Points::Raw(raw) => raw.points,
            Points::Indexed(link_cell) => link_cell.points(),
        }
    }

    /// Check if these points are already indexed
    pub fn is_indexed(&self) -> bool {
        matches!(self, Points::Indexed(_))
    }
}

impl<'a> From<RawPoints<'a>> for Points<'a> {
    fn from(points: RawPoints<'a>) -> Points<'a> {
        Points::Raw(points)
    }
}

impl<'a> From<&'a LinkCell<'a>> for Points<'a> {
    fn from(link_cell: &'a LinkCell<'a>) -> Points<'a> {
        Points::Indexed(link_cell)
    }
}
