use std::fmt;

pub const NUCLEOTIDES: [char; 4] = ['A', 'C', 'G', 'T'];

/// Length of a run of identical letters that counts as one found sequence.
pub const RUN_LEN: usize = 4;

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum GridError {
    #[error("grid is not square: row {row} has {len} letters, expected {expected}")]
    Shape {
        row: usize,
        len: usize,
        expected: usize,
    },

    #[error("invalid nucleotide {letter:?} at row {row}, column {col}")]
    InvalidNucleotide { letter: char, row: usize, col: usize },
}

/// Square matrix of nucleotide letters, stored row-major.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Grid {
    size: usize,
    cells: Vec<char>,
}

impl Grid {
    /// Build a grid from its rows. Every row must be as long as the number of rows.
    /// Letters are not checked here; see [`Grid::validate_alphabet`].
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self, GridError> {
        let size = rows.len();
        let mut cells = Vec::with_capacity(size * size);
        for (i, row) in rows.iter().enumerate() {
            let start = cells.len();
            cells.extend(row.as_ref().chars());
            let len = cells.len() - start;
            if len != size {
                return Err(GridError::Shape {
                    row: i,
                    len,
                    expected: size,
                });
            }
        }
        Ok(Self { size, cells })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn at(&self, row: usize, col: usize) -> char {
        self.cells[row * self.size + col]
    }

    pub fn validate_alphabet(&self) -> Result<(), GridError> {
        for (i, &letter) in self.cells.iter().enumerate() {
            if !NUCLEOTIDES.contains(&letter) {
                return Err(GridError::InvalidNucleotide {
                    letter,
                    row: i / self.size,
                    col: i % self.size,
                });
            }
        }
        Ok(())
    }

    /// Rows concatenated in order. Identifies a sequence for de-duplication;
    /// the length is always `size * size`, so grids of different sizes never collide.
    pub fn fingerprint(&self) -> String {
        self.cells.iter().collect()
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Verdict {
    Mutant,
    Human,
}

impl Verdict {
    pub fn is_mutant(self) -> bool {
        self == Verdict::Mutant
    }

    /// Counter key used by the stores.
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Mutant => "mutant",
            Verdict::Human => "human",
        }
    }
}

impl From<bool> for Verdict {
    fn from(mutant: bool) -> Self {
        if mutant { Verdict::Mutant } else { Verdict::Human }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StatsCounters {
    pub mutant_count: u64,
    pub human_count: u64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatsSummary {
    pub mutant_count: u64,
    pub human_count: u64,
    pub ratio: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_square_grid() {
        let grid = Grid::from_rows(&["ACG", "TTA", "GCA"]).unwrap();
        assert_eq!(grid.size(), 3);
        assert_eq!(grid.at(1, 2), 'A');
        assert_eq!(grid.at(2, 0), 'G');
        assert_eq!(grid.fingerprint(), "ACGTTAGCA");
    }

    #[test]
    fn empty_grid_is_square() {
        let rows: [&str; 0] = [];
        let grid = Grid::from_rows(&rows).unwrap();
        assert_eq!(grid.size(), 0);
        assert_eq!(grid.fingerprint(), "");
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = Grid::from_rows(&["ACGT", "ACG", "ACGT", "ACGT"]).unwrap_err();
        assert_eq!(
            err,
            GridError::Shape {
                row: 1,
                len: 3,
                expected: 4
            }
        );
    }

    #[test]
    fn rectangular_grid_is_rejected() {
        let err = Grid::from_rows(&["ACGT", "ACGT"]).unwrap_err();
        assert!(matches!(err, GridError::Shape { row: 0, len: 4, expected: 2 }));
    }

    #[test]
    fn row_length_counts_letters_not_bytes() {
        let grid = Grid::from_rows(&["ÄC", "GT"]).unwrap();
        assert_eq!(grid.at(0, 0), 'Ä');
        assert!(matches!(
            grid.validate_alphabet(),
            Err(GridError::InvalidNucleotide { letter: 'Ä', row: 0, col: 0 })
        ));
    }

    #[test]
    fn alphabet_check_reports_position() {
        let grid = Grid::from_rows(&["ACGT", "ACGT", "ACHT", "ACGT"]).unwrap();
        assert_eq!(
            grid.validate_alphabet(),
            Err(GridError::InvalidNucleotide {
                letter: 'H',
                row: 2,
                col: 2
            })
        );
        let ok = Grid::from_rows(&["ACGT", "ACGT", "ACGT", "ACGT"]).unwrap();
        assert!(ok.validate_alphabet().is_ok());
    }

    #[test]
    fn verdict_keys() {
        assert_eq!(Verdict::from(true), Verdict::Mutant);
        assert_eq!(Verdict::from(false), Verdict::Human);
        assert_eq!(Verdict::Mutant.as_str(), "mutant");
        assert_eq!(Verdict::Human.to_string(), "human");
    }
}
