/// Which part of the shell surface is currently being walked.
///
/// In 3D, the four side faces are walked as "wedges": each wedge owns one
/// vertical edge of the cube and the interior of one side face, excluding the
/// top and bottom rows. The two caps then cover the full bottom and top
/// faces. In 2D, the wedges reduce to the four sides of a square ring and
/// there are no caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// `y = +range`, `x` going from `-range` to `range - 1`
    PositiveY,
    /// `x = +range`, `y` going from `range` to `-range + 1`
    PositiveX,
    /// `y = -range`, `x` going from `range` to `-range + 1`
    NegativeY,
    /// `x = -range`, `y` going from `-range` to `range - 1`
    NegativeX,
    /// `z = -range`, the full face
    BottomCap,
    /// `z = +range`, the full face. This is also the only stage used for
    /// `range = 0`.
    TopCap,
}

/// Enumerate integer cell offsets on the surface of concentric cubes (or
/// squares in 2D) around a reference cell.
///
/// Starting from `CellShell::new(range, is_2d)`, calling
/// [`advance`](CellShell::advance) repeatedly visits every offset with
/// Chebyshev norm equal to `range` exactly once, then moves on to `range + 1`,
/// and so on. Offsets are thus produced in non-decreasing `range` order.
///
/// The whole state is a plain value, and two shells compare equal when they
/// point to the same offset in the same stage, so `CellShell::new(n, is_2d)`
/// can be used as the end bound of a loop over all shells below `n`:
///
/// ```
/// # use linkcell::locality::CellShell;
/// let mut shell = CellShell::new(0, false);
/// let mut count = 0;
/// while shell != CellShell::new(2, false) {
///     count += 1;
///     shell.advance();
/// }
/// // all the 3x3x3 cells around the origin
/// assert_eq!(count, 27);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellShell {
    range: i32,
    stage: Stage,
    x: i32,
    y: i32,
    z: i32,
    is_2d: bool,
}

impl CellShell {
    /// Create a new shell iterator, positioned on the first offset of the
    /// shell at `range`.
    pub fn new(range: u32, is_2d: bool) -> CellShell {
        let mut shell = CellShell {
            range: 0,
            stage: Stage::TopCap,
            x: 0,
            y: 0,
            z: 0,
            is_2d: is_2d,
        };
        shell.reset(range as i32);
        return shell;
    }

    /// Get the range (Chebyshev distance to the reference cell) of the current
    /// shell
    pub fn range(&self) -> u32 {
        self.range as u32
    }

    /// Get the current offset
    pub fn offset(&self) -> [i32; 3] {
        [self.x, self.y, self.z]
    }

    /// Is this shell iterating in 2D?
    pub fn is_2d(&self) -> bool {
        self.is_2d
    }

    fn reset(&mut self, range: i32) {
        self.range = range;
        self.stage = Stage::PositiveY;
        self.x = -range;
        self.y = range;
        self.z = if self.is_2d { 0 } else { -range + 1 };

        if range == 0 {
            self.z = 0;
            self.stage = Stage::TopCap;
        }
    }

    /// Move to the next row of a wedge. In 2D wedges only have one row, so
    /// this always means the wedge is done. Returns `true` when the current
    /// wedge is finished.
    fn next_wedge_row(&mut self) -> bool {
        if self.is_2d {
            return true;
        }

        self.z += 1;
        if self.z >= self.range {
            self.z = -self.range + 1;
            return true;
        }
        return false;
    }

    /// Move to the next offset
    pub fn advance(&mut self) {
        let range = self.range;
        match self.stage {
            Stage::PositiveY => {
                self.x += 1;
                if self.x >= range {
                    self.x = -range;
                    if self.next_wedge_row() {
                        self.stage = Stage::PositiveX;
                        self.x = range;
                    }
                }
            }
            Stage::PositiveX => {
                self.y -= 1;
                if self.y <= -range {
                    self.y = range;
                    if self.next_wedge_row() {
                        self.stage = Stage::NegativeY;
                        self.y = -range;
                    }
                }
            }
            Stage::NegativeY => {
                self.x -= 1;
                if self.x <= -range {
                    self.x = range;
                    if self.next_wedge_row() {
                        self.stage = Stage::NegativeX;
                        self.x = -range;
                    }
                }
            }
            Stage::NegativeX => {
                self.y += 1;
                if self.y >= range {
                    self.y = -range;
                    if self.next_wedge_row() {
                        if self.is_2d {
                            self.reset(range + 1);
                        } else {
                            self.stage = Stage::BottomCap;
                            self.x = -range;
                            self.y = -range;
                            self.z = -range;
                        }
                    }
                }
            }
            Stage::BottomCap | Stage::TopCap => {
                self.x += 1;
                if self.x > range {
                    self.x = -range;
                    self.y += 1;
                    if self.y > range {
                        self.y = -range;
                        if self.stage == Stage::BottomCap {
                            self.stage = Stage::TopCap;
                            self.z = range;
                        } else {
                            self.reset(range + 1);
                        }
                    }
                }
            }
        }
    }
}

/// Iterating over a `CellShell` never ends: it yields the current offset and
/// moves on to the next one, growing the shell range as needed.
impl Iterator for CellShell {
    type Item = [i32; 3];

    fn next(&mut self) -> Option<[i32; 3]> {
        let offset = self.offset();
        self.advance();
        return Some(offset);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    /// Number of offsets at exactly Chebyshev distance `range`
    fn surface_count(range: i64, is_2d: bool) -> usize {
        if range == 0 {
            return 1;
        }
        let outer = 2 * range + 1;
        let inner = 2 * range - 1;
        if is_2d {
            (outer * outer - inner * inner) as usize
        } else {
            (outer * outer * outer - inner * inner * inner) as usize
        }
    }

    /// All offsets at exactly Chebyshev distance `range`, by brute force
    fn brute_force(range: i32, is_2d: bool) -> BTreeSet<[i32; 3]> {
        let z_range = if is_2d { 0..=0 } else { -range..=range };
        let mut offsets = BTreeSet::new();
        for x in -range..=range {
            for y in -range..=range {
                for z in z_range.clone() {
                    if x.abs().max(y.abs()).max(z.abs()) == range {
                        offsets.insert([x, y, z]);
                    }
                }
            }
        }
        return offsets;
    }

    fn check_shells(is_2d: bool) {
        let mut shell = CellShell::new(0, is_2d);
        for range in 0..=5 {
            assert_eq!(shell, CellShell::new(range, is_2d));

            let mut visited = BTreeSet::new();
            while shell.range() == range {
                let offset = shell.offset();
                assert!(visited.insert(offset), "offset {:?} visited twice", offset);
                shell.advance();
            }

            assert_eq!(visited.len(), surface_count(range as i64, is_2d));
            assert_eq!(visited, brute_force(range as i32, is_2d));
        }
    }

    #[test]
    fn shells_3d() {
        check_shells(false);
    }

    #[test]
    fn shells_2d() {
        check_shells(true);
    }

    #[test]
    fn origin() {
        let mut shell = CellShell::new(0, false);
        assert_eq!(shell.offset(), [0, 0, 0]);
        shell.advance();
        assert_eq!(shell.range(), 1);
        assert_eq!(shell, CellShell::new(1, false));

        let mut shell = CellShell::new(0, true);
        shell.advance();
        assert_eq!(shell, CellShell::new(1, true));
    }

    #[test]
    fn as_loop_bound() {
        let count = CellShell::new(0, true)
            .take_while(|offset| offset.iter().all(|x| x.abs() <= 2))
            .count();
        assert_eq!(count, 25);

        let mut shell = CellShell::new(1, false);
        let end = CellShell::new(3, false);
        let mut count = 0;
        while shell != end {
            count += 1;
            shell.advance();
        }
        assert_eq!(count, 7 * 7 * 7 - 1);
    }
}
