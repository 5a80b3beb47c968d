//! Sparse matrix operations.
//!
//! Uses CSR (Compressed Sparse Row) format for the per-axis systems produced
//! by [`FvMatrix::build`](crate::matrix::FvMatrix::build).

use crate::error::{Error, Result};
use nalgebra_sparse::coo::CooMatrix;
use nalgebra_sparse::csr::CsrMatrix as NalgebraCsr;

/// Compressed Sparse Row matrix.
pub type CsrMatrix = NalgebraCsr<f64>;

/// Builder for assembling a sparse matrix from triplets (COO format).
///
/// Accumulates (row, col, value) triplets and converts to CSR when complete.
#[derive(Debug, Clone)]
pub struct TripletMatrix {
    n_rows: usize,
    n_cols: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<f64>,
}

impl TripletMatrix {
    /// Create a new triplet matrix builder.
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self::with_capacity(n_rows, n_cols, 0)
    }

    /// Create with estimated capacity.
    pub fn with_capacity(n_rows: usize, n_cols: usize, nnz_estimate: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            rows: Vec::with_capacity(nnz_estimate),
            cols: Vec::with_capacity(nnz_estimate),
            values: Vec::with_capacity(nnz_estimate),
        }
    }

    /// Add a value at (row, col). Duplicates are summed during conversion;
    /// exact zeros are not stored.
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.n_rows, "Row index out of bounds");
        debug_assert!(col < self.n_cols, "Column index out of bounds");

        if value != 0.0 {
            self.rows.push(row);
            self.cols.push(col);
            self.values.push(value);
        }
    }

    /// Number of stored triplets.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Convert to CSR format, summing duplicate entries.
    pub fn to_csr(self) -> Result<CsrMatrix> {
        let coo = CooMatrix::try_from_triplets(
            self.n_rows,
            self.n_cols,
            self.rows,
            self.cols,
            self.values,
        )
        .map_err(|e| Error::Solver(format!("invalid triplet data: {}", e)))?;

        Ok(CsrMatrix::from(&coo))
    }
}

/// y = A * x
pub fn spmv(matrix: &CsrMatrix, x: &[f64], y: &mut [f64]) {
    debug_assert_eq!(matrix.ncols(), x.len());
    debug_assert_eq!(matrix.nrows(), y.len());

    let offsets = matrix.row_offsets();
    let cols = matrix.col_indices();
    let vals = matrix.values();
    for (row, out) in y.iter_mut().enumerate() {
        *out = (offsets[row]..offsets[row + 1])
            .map(|k| vals[k] * x[cols[k]])
            .sum();
    }
}

/// Diagonal entries (zero where a row stores no diagonal).
pub fn diagonal(matrix: &CsrMatrix) -> Vec<f64> {
    (0..matrix.nrows()).map(|i| entry(matrix, i, i)).collect()
}

/// Stored value at (row, col), zero if absent.
pub fn entry(matrix: &CsrMatrix, row: usize, col: usize) -> f64 {
    row_entries(matrix, row)
        .find(|&(c, _)| c == col)
        .map(|(_, v)| v)
        .unwrap_or(0.0)
}

/// (column, value) pairs stored in one row.
pub fn row_entries(matrix: &CsrMatrix, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
    let offsets = matrix.row_offsets();
    let range = offsets[row]..offsets[row + 1];
    matrix.col_indices()[range.clone()]
        .iter()
        .copied()
        .zip(matrix.values()[range].iter().copied())
}
