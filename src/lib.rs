//! lorix: a second-order cone programming solver.
//!
//! A primal-dual interior-point method for problems of the form
//!
//! ```text
//! minimize    c' x
//! subject to  G x + s = h,   s in K
//!             A x = b
//! ```
//!
//! where K is the product of a nonnegative orthant and second-order
//! (Lorentz) cones. The algorithm is Mehrotra's predictor-corrector scheme
//! in the homogeneous self-dual embedding:
//!
//! - **Nesterov-Todd scaling** for the symmetric cone product, with the
//!   second-order cone scalings kept in a sparse arrow factorization
//! - **Sparse LDL^T** KKT solves with iterative refinement
//! - **Ruiz equilibration** of the problem data
//! - **Infeasibility certificates** through the tau/kappa ratio of the
//!   embedding
//!
//! # Example
//!
//! ```ignore
//! use lorix::{solve, Settings};
//! use lorix::linalg::sparse;
//!
//! // minimize x1 + x2  s.t.  x1 + x2 = 1, x >= 0
//! let g = sparse::from_triplets(2, 2, vec![(0, 0, -1.0), (1, 1, -1.0)]);
//! let a = sparse::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]);
//!
//! let sol = solve(
//!     g,
//!     a,
//!     vec![1.0, 1.0],
//!     vec![0.0, 0.0],
//!     vec![1.0],
//!     vec![],
//!     Settings::default(),
//! )?;
//!
//! println!("status: {}, x = {:?}", sol.status, sol.x);
//! ```
//!
//! The solver is a closed value graph: one instance owns all of its working
//! buffers, runs fully synchronously, and several instances may run
//! concurrently on disjoint data. Numeric trouble never panics or unwinds;
//! the outcome is always reported through the status field.

#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)] // IPM plumbing passes many slices

pub mod cones;
pub mod equilibrate;
pub mod ipm;
pub mod kkt;
pub mod linalg;
pub mod problem;

pub use ipm::Solver;
pub use linalg::sparse::SparseCsc;
pub use problem::{Info, Settings, Solution, SolveStatus, SolverError};

/// One-shot solve entry point.
///
/// Builds a [`Solver`] from the problem data and runs it. `soc_dims` lists
/// the second-order cone dimensions; the first `m - sum(soc_dims)` rows of
/// (G, h) form the nonnegative orthant block.
pub fn solve(
    g: SparseCsc,
    a: SparseCsc,
    c: Vec<f64>,
    h: Vec<f64>,
    b: Vec<f64>,
    soc_dims: Vec<usize>,
    settings: Settings,
) -> Result<Solution, SolverError> {
    let mut solver = Solver::new(g, a, c, h, b, soc_dims, settings)?;
    Ok(solver.solve())
}
