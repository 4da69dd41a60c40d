//! LDL^T factorization wrapper.
//!
//! Interface to sparse LDL^T factorization of quasi-definite matrices using
//! the `ldl` crate. The factorization computes L and D such that K = L D L^T
//! where L is unit lower triangular and D is diagonal with entries of either
//! sign, which is what the regularized interior-point KKT systems require.
//!
//! The symbolic analysis (elimination tree) runs once per sparsity pattern;
//! numeric refactorization reuses it every iteration.

use super::sparse::SparseCsc;
use thiserror::Error;

/// Errors from the direct solver.
#[derive(Error, Debug)]
pub enum LdlError {
    /// Symbolic analysis failed (pattern is not upper triangular or has an
    /// empty column).
    #[error("symbolic analysis failed")]
    SymbolicFailed,

    /// Numeric factorization failed (zero pivot encountered).
    #[error("numeric factorization failed")]
    FactorizationFailed,

    /// Matrix shape does not match the solver dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },
}

/// Sparse LDL^T factorization with a reusable symbolic analysis.
///
/// All buffers are allocated during `analyze` and reused by every
/// subsequent `factor` / `solve_in_place` call.
pub struct LdlSolver {
    /// System dimension
    n: usize,

    /// Elimination tree from symbolic analysis
    etree: Vec<Option<usize>>,

    /// Nonzero count per column of L
    l_nz: Vec<usize>,

    /// L column pointers
    l_p: Vec<usize>,
    /// L row indices
    l_i: Vec<usize>,
    /// L values
    l_x: Vec<f64>,
    /// D diagonal
    d: Vec<f64>,
    /// D inverse (used by the triangular solve)
    d_inv: Vec<f64>,

    /// Factorization workspaces
    bwork: Vec<ldl::Marker>,
    iwork: Vec<usize>,
    fwork: Vec<f64>,

    analyzed: bool,
    factored: bool,
}

impl LdlSolver {
    /// Create a solver for systems of dimension `n`.
    pub fn new(n: usize) -> Self {
        Self {
            n,
            etree: Vec::new(),
            l_nz: Vec::new(),
            l_p: Vec::new(),
            l_i: Vec::new(),
            l_x: Vec::new(),
            d: Vec::new(),
            d_inv: Vec::new(),
            bwork: vec![ldl::Marker::Unused; n],
            iwork: vec![0; 3 * n],
            fwork: vec![0.0; n],
            analyzed: false,
            factored: false,
        }
    }

    /// Symbolic analysis of the upper-triangular fill pattern.
    ///
    /// Computes the elimination tree and sizes the factor buffers. Must be
    /// called once before `factor`; the pattern of every later `factor`
    /// call has to match.
    pub fn analyze(&mut self, mat: &SparseCsc) -> Result<(), LdlError> {
        if mat.rows() != self.n || mat.cols() != self.n {
            return Err(LdlError::DimensionMismatch {
                expected: self.n,
                actual: mat.rows(),
            });
        }

        let indptr = mat.indptr();
        let a_p = indptr.raw_storage();
        let a_i = mat.indices();

        let mut work = vec![0; self.n];
        let mut l_nz = vec![0; self.n];
        let mut etree = vec![None; self.n];

        ldl::etree(self.n, a_p, a_i, &mut work, &mut l_nz, &mut etree)
            .map_err(|_| LdlError::SymbolicFailed)?;

        let nnz_l: usize = l_nz.iter().sum();

        self.etree = etree;
        self.l_nz = l_nz;
        self.l_p = vec![0; self.n + 1];
        self.l_i = vec![0; nnz_l];
        self.l_x = vec![0.0; nnz_l];
        self.d = vec![0.0; self.n];
        self.d_inv = vec![0.0; self.n];
        self.analyzed = true;
        self.factored = false;

        Ok(())
    }

    /// Numeric factorization of the upper-triangular matrix.
    pub fn factor(&mut self, mat: &SparseCsc) -> Result<(), LdlError> {
        assert!(self.analyzed, "analyze must run before factor");

        let indptr = mat.indptr();
        let a_p = indptr.raw_storage();
        let a_i = mat.indices();
        let a_x = mat.data();

        self.bwork.fill(ldl::Marker::Unused);
        self.iwork.fill(0);
        self.fwork.fill(0.0);

        let result = ldl::factor(
            self.n,
            a_p,
            a_i,
            a_x,
            &mut self.l_p,
            &mut self.l_i,
            &mut self.l_x,
            &mut self.d,
            &mut self.d_inv,
            &self.l_nz,
            &self.etree,
            &mut self.bwork,
            &mut self.iwork,
            &mut self.fwork,
        );

        match result {
            Ok(_) => {
                self.factored = true;
                Ok(())
            }
            Err(_) => {
                self.factored = false;
                Err(LdlError::FactorizationFailed)
            }
        }
    }

    /// Solve L D L^T x = b in place, overwriting `x` (which holds b on
    /// entry and the solution on return).
    pub fn solve_in_place(&self, x: &mut [f64]) {
        assert_eq!(x.len(), self.n);
        assert!(self.factored, "factor must run before solve");

        ldl::solve(self.n, &self.l_p, &self.l_i, &self.l_x, &self.d_inv, x);
    }

    /// Diagonal D values from the most recent factorization.
    #[allow(dead_code)]
    pub fn d_values(&self) -> &[f64] {
        &self.d
    }
}
