//! Dense row-major 2-D grid used for every per-cell map.

use std::ops::{Index, IndexMut};

use super::TableError;

/// Row-major grid of cells. Rows follow the load axis, columns the RPM axis.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Clone> Grid<T> {
    /// Create a grid with every cell set to `fill`
    pub fn new(rows: usize, cols: usize, fill: T) -> Self {
        Self {
            rows,
            cols,
            data: vec![fill; rows * cols],
        }
    }

    /// Build a grid from nested rows, rejecting ragged input
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self, TableError> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let n_rows = rows.len();

        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != cols) {
            return Err(TableError::Format(format!(
                "row {} has {} values, expected {}",
                i + 1,
                row.len(),
                cols
            )));
        }

        Ok(Self {
            rows: n_rows,
            cols,
            data: rows.into_iter().flatten().collect(),
        })
    }

    pub fn to_rows(&self) -> Vec<Vec<T>> {
        self.data.chunks(self.cols.max(1)).map(|c| c.to_vec()).collect()
    }

    /// Insert a row before `index`, filling it from a per-column closure
    pub fn insert_row_with(&mut self, index: usize, mut fill: impl FnMut(usize) -> T) {
        let at = index.min(self.rows) * self.cols;
        let new_row: Vec<T> = (0..self.cols).map(&mut fill).collect();
        self.data.splice(at..at, new_row);
        self.rows += 1;
    }

    /// Insert a column before `index`, filling it from a per-row closure
    pub fn insert_col_with(&mut self, index: usize, mut fill: impl FnMut(usize) -> T) {
        let index = index.min(self.cols);
        let mut data = Vec::with_capacity(self.rows * (self.cols + 1));
        for r in 0..self.rows {
            let row = &self.data[r * self.cols..(r + 1) * self.cols];
            data.extend_from_slice(&row[..index]);
            data.push(fill(r));
            data.extend_from_slice(&row[index..]);
        }
        self.data = data;
        self.cols += 1;
    }

    pub fn remove_row(&mut self, index: usize) {
        if index < self.rows {
            let at = index * self.cols;
            self.data.drain(at..at + self.cols);
            self.rows -= 1;
        }
    }

    pub fn remove_col(&mut self, index: usize) {
        if index < self.cols {
            let cols = self.cols;
            let mut i = 0;
            self.data.retain(|_| {
                let keep = i % cols != index;
                i += 1;
                keep
            });
            self.cols -= 1;
        }
    }
}

impl<T> Grid<T> {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row < self.rows && col < self.cols {
            self.data.get(row * self.cols + col)
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut T> {
        if row < self.rows && col < self.cols {
            self.data.get_mut(row * self.cols + col)
        } else {
            None
        }
    }

    pub fn row(&self, row: usize) -> &[T] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Iterate cells as `((row, col), &value)`
    pub fn cells(&self) -> impl Iterator<Item = ((usize, usize), &T)> + '_ {
        let cols = self.cols.max(1);
        self.data
            .iter()
            .enumerate()
            .map(move |(i, v)| ((i / cols, i % cols), v))
    }
}

impl<T> Index<(usize, usize)> for Grid<T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        assert!(row < self.rows && col < self.cols, "grid index out of range");
        &self.data[row * self.cols + col]
    }
}

impl<T> IndexMut<(usize, usize)> for Grid<T> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        assert!(row < self.rows && col < self.cols, "grid index out of range");
        &mut self.data[row * self.cols + col]
    }
}
