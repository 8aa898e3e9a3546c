//! The `UnitCell` type represents the bounding box of a set of points, with
//! periodic or aperiodic boundaries along each axis.
use crate::{Matrix3, Vector3D};

/// The shape of a cell determine how we compute minimum images.
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(clippy::module_name_repetitions)]
pub enum CellShape {
    /// Orthorhombic unit cell, with cuboid shape
    Orthorhombic,
    /// Triclinic unit cell, with arbitrary parallelepiped shape
    Triclinic,
}

/// An `UnitCell` defines the bounding box of a point set.
///
/// The box is a parallelepiped spanned by the three rows of the cell matrix,
/// with its origin at the lower corner: points inside the box have fractional
/// coordinates in `[0, 1)`. Each axis can independently be periodic or not;
/// distances along periodic axes follow the minimum image convention.
///
/// Two-dimensional boxes (see [`UnitCell::square`] and
/// [`UnitCell::rectangle`]) live in the `xy` plane. They are never periodic
/// along `z`, and all points used with them must have a `z` coordinate of 0.
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(clippy::module_name_repetitions)]
pub struct UnitCell {
    /// Unit cell matrix
    matrix: Matrix3,
    /// Transpose of the unit cell matrix, cached from matrix
    transpose: Matrix3,
    /// Inverse of the transpose of the unit cell matrix, cached from matrix
    inverse: Matrix3,
    /// Unit cell shape
    shape: CellShape,
    /// Periodic boundary conditions along each of the cell vectors
    periodic: [bool; 3],
    /// Is this a 2D cell?
    two_dimensional: bool,
}

impl From<Matrix3> for UnitCell {
    fn from(matrix: Matrix3) -> UnitCell {
        assert!(matrix.determinant() > 1e-6, "matrix is not invertible");

        let is_close_0 = |value| f64::abs(value) < 1e-6;
        let is_diagonal = |matrix: Matrix3| {
            is_close_0(matrix[0][1]) && is_close_0(matrix[0][2]) &&
            is_close_0(matrix[1][0]) && is_close_0(matrix[1][2]) &&
            is_close_0(matrix[2][0]) && is_close_0(matrix[2][1])
        };

        let shape = if is_diagonal(matrix) {
            CellShape::Orthorhombic
        } else {
            CellShape::Triclinic
        };

        return UnitCell {
            matrix: matrix,
            transpose: matrix.transposed(),
            inverse: matrix.transposed().inverse(),
            shape: shape,
            periodic: [true, true, true],
            two_dimensional: false,
        };
    }
}

impl UnitCell {
    /// Create an orthorhombic unit cell, with side lengths `a, b, c`.
    pub fn orthorhombic(a: f64, b: f64, c: f64) -> UnitCell {
        assert!(a > 0.0 && b > 0.0 && c > 0.0, "Cell lengths must be positive");
        let matrix = Matrix3::new([
            [a, 0.0, 0.0],
            [0.0, b, 0.0],
            [0.0, 0.0, c]
        ]);
        UnitCell {
            matrix: matrix,
            transpose: matrix,
            inverse: matrix.inverse(),
            shape: CellShape::Orthorhombic,
            periodic: [true, true, true],
            two_dimensional: false,
        }
    }

    /// Create a cubic unit cell, with side lengths `length, length, length`.
    pub fn cubic(length: f64) -> UnitCell {
        UnitCell::orthorhombic(length, length, length)
    }

    /// Create a triclinic unit cell, with side lengths `a, b, c` and angles
    /// `alpha, beta, gamma`.
    pub fn triclinic(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> UnitCell {
        assert!(a > 0.0 && b > 0.0 && c > 0.0, "Cell lengths must be positive");
        let cos_alpha = alpha.to_radians().cos();
        let cos_beta = beta.to_radians().cos();
        let (sin_gamma, cos_gamma) = gamma.to_radians().sin_cos();

        let b_x = b * cos_gamma;
        let b_y = b * sin_gamma;

        let c_x = c * cos_beta;
        let c_y = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let c_z = f64::sqrt(c * c - c_y * c_y - c_x * c_x);

        return UnitCell::from(Matrix3::new([
            [a,   0.0, 0.0],
            [b_x, b_y, 0.0],
            [c_x, c_y, c_z],
        ]));
    }

    /// Create a two-dimensional rectangular cell in the `xy` plane, with side
    /// lengths `a, b`. The cell is periodic along `x` and `y`.
    pub fn rectangle(a: f64, b: f64) -> UnitCell {
        let mut cell = UnitCell::orthorhombic(a, b, 1.0);
        cell.two_dimensional = true;
        cell.periodic[2] = false;
        return cell;
    }

    /// Create a two-dimensional square cell in the `xy` plane, with side
    /// length `length`. The cell is periodic along `x` and `y`.
    pub fn square(length: f64) -> UnitCell {
        UnitCell::rectangle(length, length)
    }

    /// Set the periodic boundary conditions along each of the three cell
    /// vectors. The third flag is ignored for 2D cells, which are never
    /// periodic along `z`.
    #[must_use]
    pub fn with_periodicity(mut self, periodic: [bool; 3]) -> UnitCell {
        self.periodic = periodic;
        if self.two_dimensional {
            self.periodic[2] = false;
        }
        return self;
    }

    /// Get the cell shape
    pub fn shape(&self) -> CellShape {
        self.shape
    }

    /// Check if this unit cell is two-dimensional
    pub fn is_2d(&self) -> bool {
        self.two_dimensional
    }

    /// Get the periodic boundary conditions along each cell vector
    pub fn periodic(&self) -> [bool; 3] {
        self.periodic
    }

    /// Check if this cell has periodic boundary conditions along any axis
    pub fn is_periodic(&self) -> bool {
        self.periodic.iter().any(|&p| p)
    }

    /// Get the first length of the cell (i.e. the norm of the first vector of
    /// the cell)
    pub fn a(&self) -> f64 {
        match self.shape {
            CellShape::Triclinic => self.a_vector().norm(),
            CellShape::Orthorhombic => self.matrix[0][0],
        }
    }

    /// Get the second length of the cell (i.e. the norm of the second vector of
    /// the cell)
    pub fn b(&self) -> f64 {
        match self.shape {
            CellShape::Triclinic => self.b_vector().norm(),
            CellShape::Orthorhombic => self.matrix[1][1],
        }
    }

    /// Get the third length of the cell (i.e. the norm of the third vector of
    /// the cell)
    pub fn c(&self) -> f64 {
        match self.shape {
            CellShape::Triclinic => self.c_vector().norm(),
            CellShape::Orthorhombic => self.matrix[2][2],
        }
    }

    /// Get the distances between opposite faces of the unit cell
    pub fn distances_between_faces(&self) -> Vector3D {
        if self.shape == CellShape::Orthorhombic {
            return Vector3D::new(self.a(), self.b(), self.c());
        }

        let (a, b, c) = (self.a_vector(), self.b_vector(), self.c_vector());
        // normal vectors to the faces
        let na = (b ^ c).normalized();
        let nb = (c ^ a).normalized();
        let nc = (a ^ b).normalized();

        Vector3D::new(f64::abs(na * a), f64::abs(nb * b), f64::abs(nc * c))
    }

    /// Get the largest search radius usable with the minimum image
    /// convention, i.e. half of the smallest distance between faces along
    /// periodic axes. This is infinite if the cell is not periodic.
    pub fn max_image_radius(&self) -> f64 {
        let distances = self.distances_between_faces();
        let mut radius = f64::INFINITY;
        for axis in 0..3 {
            if self.periodic[axis] {
                radius = f64::min(radius, 0.5 * distances[axis]);
            }
        }
        return radius;
    }

    /// Get the first angle of the cell
    pub fn alpha(&self) -> f64 {
        match self.shape {
            CellShape::Triclinic => angle(self.b_vector(), self.c_vector()).to_degrees(),
            CellShape::Orthorhombic => 90.0,
        }
    }

    /// Get the second angle of the cell
    pub fn beta(&self) -> f64 {
        match self.shape {
            CellShape::Triclinic => angle(self.a_vector(), self.c_vector()).to_degrees(),
            CellShape::Orthorhombic => 90.0,
        }
    }

    /// Get the third angle of the cell
    pub fn gamma(&self) -> f64 {
        match self.shape {
            CellShape::Triclinic => angle(self.a_vector(), self.b_vector()).to_degrees(),
            CellShape::Orthorhombic => 90.0,
        }
    }

    /// Get the volume of the cell, or its area for 2D cells
    pub fn volume(&self) -> f64 {
        if self.two_dimensional {
            return (self.a_vector() ^ self.b_vector()).norm();
        }

        let volume = match self.shape {
            CellShape::Orthorhombic => self.a() * self.b() * self.c(),
            // The volume is the mixed product of the three cell vectors
            CellShape::Triclinic => self.a_vector() * (self.b_vector() ^ self.c_vector()),
        };
        assert!(volume >= 0.0, "Volume is not positive!");
        return volume;
    }

    /// Get the matricial representation of the unit cell
    pub fn matrix(&self) -> Matrix3 {
        self.matrix
    }

    /// Get the first vector of the cell
    fn a_vector(&self) -> Vector3D {
        self.matrix[0].into()
    }

    /// Get the second vector of the cell
    fn b_vector(&self) -> Vector3D {
        self.matrix[1].into()
    }

    /// Get the third vector of the cell
    fn c_vector(&self) -> Vector3D {
        self.matrix[2].into()
    }
}

/// Geometric operations using periodic boundary conditions
impl UnitCell {
    /// Wrap a vector in the unit cell along the periodic axes. For a cubic
    /// cell of side length `L`, this produce a vector with all components in
    /// `[0, L)`.
    pub fn wrap_vector(&self, vector: &mut Vector3D) {
        let mut fractional = self.fractional(*vector);
        for axis in 0..3 {
            if self.periodic[axis] {
                fractional[axis] -= f64::floor(fractional[axis]);
            }
        }
        *vector = self.cartesian(fractional);
    }

    /// Find the minimum image of a vector along the periodic axes. For a
    /// cubic cell of side length `L`, this produce a vector with all
    /// components in `[-L/2, L/2]`.
    pub fn vector_image(&self, vector: &mut Vector3D) {
        match self.shape {
            CellShape::Orthorhombic => {
                let lengths = [self.a(), self.b(), self.c()];
                for axis in 0..3 {
                    if self.periodic[axis] {
                        vector[axis] -= f64::round(vector[axis] / lengths[axis]) * lengths[axis];
                    }
                }
            }
            CellShape::Triclinic => {
                let mut fractional = self.fractional(*vector);
                for axis in 0..3 {
                    if self.periodic[axis] {
                        fractional[axis] -= f64::round(fractional[axis]);
                    }
                }
                *vector = self.cartesian(fractional);
            }
        }
    }

    /// Get the fractional representation of the `vector` in this cell
    pub fn fractional(&self, vector: Vector3D) -> Vector3D {
        // this needs to use the inverse of the transpose of the matrix, since
        // we only have code to multiply a vector by a matrix on the left
        return self.inverse * vector;
    }

    /// Get the Cartesian representation of the `fractional` vector in this
    /// cell
    pub fn cartesian(&self, fractional: Vector3D) -> Vector3D {
        return self.transpose * fractional;
    }

    /// Squared distance between the point `u` and the point `v`, using the
    /// minimum image convention along periodic axes.
    pub fn distance2(&self, u: Vector3D, v: Vector3D) -> f64 {
        let mut d = v - u;
        self.vector_image(&mut d);
        return d.norm2();
    }

    /// Distance between the point `u` and the point `v`, using the minimum
    /// image convention along periodic axes.
    pub fn distance(&self, u: Vector3D, v: Vector3D) -> f64 {
        return f64::sqrt(self.distance2(u, v));
    }
}

/// Get the angles between the vectors `u` and `v`.
fn angle(u: Vector3D, v: Vector3D) -> f64 {
    let un = u.normalized();
    let vn = v.normalized();
    f64::acos(un * vn)
}
