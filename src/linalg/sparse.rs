//! Sparse matrix types and operations.
//!
//! Thin wrappers around CSC (Compressed Sparse Column) matrices from `sprs`,
//! which is the storage format consumed by the sparse direct solver.

use sprs::{CsMat, TriMat};

/// Sparse matrix in CSC format.
pub type SparseCsc = CsMat<f64>;

/// Build a sparse CSC matrix from triplets (row, col, value).
///
/// Duplicate entries are summed.
pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> SparseCsc
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut tri = TriMat::new((nrows, ncols));
    for (i, j, v) in triplets {
        tri.add_triplet(i, j, v);
    }
    tri.to_csc()
}

/// Create an empty matrix with the given shape (no stored entries).
pub fn empty(nrows: usize, ncols: usize) -> SparseCsc {
    TriMat::new((nrows, ncols)).to_csc()
}

/// Sparse matrix-vector product: y = alpha * A * x + beta * y
pub fn spmv(a: &SparseCsc, x: &[f64], y: &mut [f64], alpha: f64, beta: f64) {
    assert_eq!(a.cols(), x.len());
    assert_eq!(a.rows(), y.len());

    if beta == 0.0 {
        y.fill(0.0);
    } else if beta != 1.0 {
        for yi in y.iter_mut() {
            *yi *= beta;
        }
    }

    if alpha != 0.0 {
        for (val, (row, col)) in a.iter() {
            y[row] += alpha * (*val) * x[col];
        }
    }
}

/// Transpose-vector product: y = alpha * A^T * x + beta * y
///
/// For CSC storage this iterates the columns of A directly, so A^T is never
/// materialized.
pub fn spmv_transpose(a: &SparseCsc, x: &[f64], y: &mut [f64], alpha: f64, beta: f64) {
    assert_eq!(a.rows(), x.len());
    assert_eq!(a.cols(), y.len());

    if beta == 0.0 {
        y.fill(0.0);
    } else if beta != 1.0 {
        for yi in y.iter_mut() {
            *yi *= beta;
        }
    }

    if alpha != 0.0 {
        for col_idx in 0..a.cols() {
            let col = a.outer_view(col_idx).unwrap();
            for (row_idx, &val) in col.iter() {
                y[col_idx] += alpha * val * x[row_idx];
            }
        }
    }
}

/// Visit every stored entry mutably as (row, col, &mut value).
///
/// The index structure is snapshotted first so the value array can be
/// borrowed mutably; the sparsity pattern itself is never changed.
pub fn for_each_entry_mut<F>(mat: &mut SparseCsc, mut f: F)
where
    F: FnMut(usize, usize, &mut f64),
{
    let indptr: Vec<usize> = mat.indptr().raw_storage().to_vec();
    let indices: Vec<usize> = mat.indices().to_vec();
    let ncols = mat.cols();
    let data = mat.data_mut();

    for col in 0..ncols {
        for k in indptr[col]..indptr[col + 1] {
            f(indices[k], col, &mut data[k]);
        }
    }
}

/// Position of entry (row, col) in the CSC data array.
///
/// The entry must exist in the sparsity pattern.
pub fn entry_index(mat: &SparseCsc, row: usize, col: usize) -> usize {
    let indptr = mat.indptr();
    let ip = indptr.raw_storage();
    let indices = mat.indices();
    for k in ip[col]..ip[col + 1] {
        if indices[k] == row {
            return k;
        }
    }
    panic!("entry ({}, {}) not present in sparsity pattern", row, col);
}
