//! Conversions between flat sequences and matrix/vector containers.
//!
//! The parameter store only exchanges flat `Vec<f64>` buffers. Matrices are
//! flattened in column-major order (column 0 first, then column 1, ...), and a
//! vector is its own flat sequence.

use crate::error::{AeError, Result};
use ndarray::{Array1, Array2, ShapeBuilder};

/// Flattens a matrix column by column.
pub fn matrix_to_flat(m: &Array2<f64>) -> Vec<f64> {
    m.t().iter().copied().collect()
}

/// Rebuilds a `rows × cols` matrix from a column-major flat sequence.
///
/// # Errors
///
/// Returns `AeError::ShapeMismatch` if `values.len() != rows * cols`.
pub fn flat_to_matrix(values: Vec<f64>, rows: usize, cols: usize) -> Result<Array2<f64>> {
    if values.len() != rows * cols {
        return Err(AeError::shape(
            "flat matrix",
            &[rows * cols],
            &[values.len()],
        ));
    }
    Array2::from_shape_vec((rows, cols).f(), values)
        .map_err(|e| AeError::shape(format!("flat matrix ({e})"), &[rows, cols], &[]))
}

/// Flattens a vector.
pub fn vector_to_flat(v: &Array1<f64>) -> Vec<f64> {
    v.to_vec()
}

/// Rebuilds a vector, checking its length when one is declared.
pub fn flat_to_vector(values: Vec<f64>, expected_len: Option<usize>) -> Result<Array1<f64>> {
    if let Some(len) = expected_len {
        if values.len() != len {
            return Err(AeError::shape("flat vector", &[len], &[values.len()]));
        }
    }
    Ok(Array1::from(values))
}

/// Stacks equally sized rows into a `rows.len() × width` matrix.
///
/// # Errors
///
/// Returns `AeError::ShapeMismatch` on ragged input.
pub fn rows_to_matrix(rows: &[Vec<f64>]) -> Result<Array2<f64>> {
    let width = rows.first().map_or(0, Vec::len);
    let mut flat = Vec::with_capacity(rows.len() * width);
    for (i, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(AeError::shape(format!("sample row {i}"), &[width], &[row.len()]));
        }
        flat.extend_from_slice(row);
    }
    Array2::from_shape_vec((rows.len(), width), flat)
        .map_err(|e| AeError::shape(format!("row matrix ({e})"), &[rows.len(), width], &[]))
}
