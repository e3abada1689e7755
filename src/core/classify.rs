use crate::core::model::{Grid, GridError, RUN_LEN, Verdict};

/// Number of found sequences at which a grid is classified mutant.
pub const MUTANT_THRESHOLD: usize = 2;

/// Scan directions. Only the forward half of the compass is scanned, so each
/// physical run is seen once, from its first cell.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    Right,
    Down,
    DownRight,
    DownLeft,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Right,
        Direction::Down,
        Direction::DownRight,
        Direction::DownLeft,
    ];

    /// (row step, column step)
    fn delta(self) -> (usize, isize) {
        match self {
            Direction::Right => (0, 1),
            Direction::Down => (1, 0),
            Direction::DownRight => (1, 1),
            Direction::DownLeft => (1, -1),
        }
    }
}

pub fn classify(grid: &Grid) -> Verdict {
    Verdict::from(count_runs(grid, MUTANT_THRESHOLD) >= MUTANT_THRESHOLD)
}

/// Shape-check raw rows and classify them.
pub fn classify_rows<S: AsRef<str>>(rows: &[S]) -> Result<Verdict, GridError> {
    Grid::from_rows(rows).map(|grid| classify(&grid))
}

/// Count found sequences, stopping as soon as `limit` is reached.
/// Overlapping windows and windows sharing a start cell are counted separately.
pub fn count_runs(grid: &Grid, limit: usize) -> usize {
    let n = grid.size();
    let mut found = 0;
    if n < RUN_LEN || limit == 0 {
        return found;
    }
    for row in 0..n {
        for col in 0..n {
            for dir in Direction::ALL {
                if run_at(grid, row, col, dir) {
                    found += 1;
                    if found >= limit {
                        return found;
                    }
                }
            }
        }
    }
    found
}

fn run_at(grid: &Grid, row: usize, col: usize, dir: Direction) -> bool {
    let n = grid.size();
    let (d_row, d_col) = dir.delta();
    let last = RUN_LEN - 1;
    let end_row = row + d_row * last;
    let end_col = col as isize + d_col * last as isize;
    if end_row >= n || end_col < 0 || end_col as usize >= n {
        return false;
    }
    let first = grid.at(row, col);
    (1..RUN_LEN).all(|k| {
        let c = (col as isize + d_col * k as isize) as usize;
        grid.at(row + d_row * k, c) == first
    })
}
