//! Spatial indexing and neighbor queries.
//!
//! A [`LinkCell`] sorts points into a regular grid of cells. Neighbors of a
//! query point are then found by searching the cells around it, shell by
//! shell (see [`CellShell`]), either for all points within a given radius
//! ([`BallIterator`]) or for a given number of nearest points
//! ([`NearestIterator`]).

mod indexer;
pub use self::indexer::Index3D;

mod shell;
pub use self::shell::CellShell;

mod neighbor_list;
pub use self::neighbor_list::{NeighborBond, NeighborList};

mod link_cell;
pub use self::link_cell::{LinkCell, CellIter, TERMINATOR};

mod iterators;
pub use self::iterators::{NearestIterator, BallIterator, PerPointIterator};

mod query;
pub use self::query::{QueryArgs, QueryMode, LinkCellQuery};
