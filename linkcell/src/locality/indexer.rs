/// Flat indexer for a three dimensional grid of `width x height x depth`
/// cells, mapping cell coordinates `(x, y, z)` to a single integer in
/// `[0, width * height * depth)`, with `x` varying fastest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Index3D {
    width: usize,
    height: usize,
    depth: usize,
}

impl Index3D {
    /// Create a new indexer for a grid with the given shape
    pub fn new(width: usize, height: usize, depth: usize) -> Index3D {
        Index3D { width, height, depth }
    }

    /// Get the shape of the grid, as `[width, height, depth]`
    pub fn shape(&self) -> [usize; 3] {
        [self.width, self.height, self.depth]
    }

    /// Total number of cells in the grid
    pub fn len(&self) -> usize {
        self.width * self.height * self.depth
    }

    /// Check if the grid contains no cells
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the flat index of the cell at `coordinates`
    #[inline]
    pub fn index(&self, coordinates: [usize; 3]) -> usize {
        let [x, y, z] = coordinates;
        debug_assert!(x < self.width && y < self.height && z < self.depth);
        (z * self.height + y) * self.width + x
    }

    /// Get the coordinates of the cell at the flat `index`. This is the
    /// inverse of [`Index3D::index`].
    #[inline]
    pub fn coordinates(&self, index: usize) -> [usize; 3] {
        debug_assert!(index < self.len());
        let x = index % self.width;
        let y = (index / self.width) % self.height;
        let z = index / (self.width * self.height);
        [x, y, z]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let indexer = Index3D::new(3, 4, 5);
        assert_eq!(indexer.len(), 60);
        assert_eq!(indexer.shape(), [3, 4, 5]);

        let mut seen = vec![false; indexer.len()];
        for z in 0..5 {
            for y in 0..4 {
                for x in 0..3 {
                    let index = indexer.index([x, y, z]);
                    assert!(!seen[index]);
                    seen[index] = true;
                    assert_eq!(indexer.coordinates(index), [x, y, z]);
                }
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn x_is_fastest() {
        let indexer = Index3D::new(4, 3, 2);
        assert_eq!(indexer.index([0, 0, 0]), 0);
        assert_eq!(indexer.index([1, 0, 0]), 1);
        assert_eq!(indexer.index([0, 1, 0]), 4);
        assert_eq!(indexer.index([0, 0, 1]), 12);
        assert_eq!(indexer.index([3, 2, 1]), 23);
    }
}
