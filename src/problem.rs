//! Problem data, settings, and result types.
//!
//! The solver works with the canonical second-order cone program
//!
//! ```text
//! minimize    c' x
//! subject to  G x + s = h,   s in K
//!             A x = b
//! ```
//!
//! where K = R+^l x SOC(q_1) x ... x SOC(q_ncones); the first
//! l = m - sum(q_i) rows of (G, h, s, z) belong to the nonnegative orthant
//! and the SOC blocks follow in declaration order.

use crate::linalg::sparse::SparseCsc;
use std::fmt;
use thiserror::Error;

/// Construction-time validation errors.
#[derive(Error, Debug)]
pub enum SolverError {
    /// A vector length or matrix shape is inconsistent with the rest of the
    /// problem data.
    #[error("{what} has dimension {got}, expected {expected}")]
    DimensionMismatch {
        /// Which input is inconsistent
        what: &'static str,
        /// Dimension found
        got: usize,
        /// Dimension implied by the other inputs
        expected: usize,
    },

    /// Cone dimensions exceed the rows of G.
    #[error("cone dimensions sum to {total}, exceeding the {rows} rows of G")]
    ConeOverflow {
        /// Sum of the declared SOC dimensions
        total: usize,
        /// Number of rows of G
        rows: usize,
    },

    /// A declared second-order cone has dimension zero.
    #[error("second-order cone {index} has dimension 0")]
    EmptyCone {
        /// Position in the cone list
        index: usize,
    },
}

/// Solver settings.
///
/// All tolerances and algorithmic constants are exposed; the defaults are
/// the tuned values the solver ships with.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Safety scaling of the final step length
    pub gamma: f64,
    /// Static KKT regularization
    pub delta: f64,
    /// Large-value surrogate for inactive line-search bounds
    pub eps: f64,
    /// Primal/dual feasibility tolerance
    pub feastol: f64,
    /// Absolute duality-gap tolerance
    pub abstol: f64,
    /// Relative duality-gap tolerance
    pub reltol: f64,
    /// Relaxed feasibility tolerance
    pub feastol_inacc: f64,
    /// Relaxed absolute gap tolerance
    pub abstol_inacc: f64,
    /// Relaxed relative gap tolerance
    pub reltol_inacc: f64,
    /// Maximum iterative refinement steps per KKT solve
    pub nitref: usize,
    /// Maximum interior-point iterations
    pub maxit: usize,
    /// Print the iteration table
    pub verbose: bool,
    /// Relative accuracy demanded of refined KKT solutions
    pub linsysacc: f64,
    /// Required error reduction factor for refinement to continue
    pub irerrfact: f64,
    /// Smallest step length taken
    pub stepmin: f64,
    /// Largest step length allowed, also for the affine direction
    pub stepmax: f64,
    /// Always center at least this much
    pub sigmamin: f64,
    /// Never center fully
    pub sigmamax: f64,
    /// Number of equilibration passes
    pub equil_iters: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            delta: 2e-7,
            eps: 1e13,
            feastol: 1e-8,
            abstol: 1e-8,
            reltol: 1e-8,
            feastol_inacc: 1e-4,
            abstol_inacc: 5e-5,
            reltol_inacc: 5e-5,
            nitref: 9,
            maxit: 100,
            verbose: true,
            linsysacc: 1e-14,
            irerrfact: 6.0,
            stepmin: 1e-6,
            stepmax: 0.999,
            sigmamin: 1e-4,
            sigmamax: 1.0,
            equil_iters: 3,
        }
    }
}

/// Final solver status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Converged to the requested tolerances
    Optimal,
    /// Converged only to the relaxed tolerances
    OptimalInaccurate,
    /// Certificate of primal infeasibility found
    PrimalInfeasible,
    /// Primal infeasibility certificate at relaxed tolerances
    PrimalInfeasibleInaccurate,
    /// Certificate of dual infeasibility (primal unboundedness) found
    DualInfeasible,
    /// Dual infeasibility certificate at relaxed tolerances
    DualInfeasibleInaccurate,
    /// Iteration limit reached without convergence
    MaxIters,
    /// Iterate left the cone or a factorization failed
    NumericalError,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "Optimal"),
            SolveStatus::OptimalInaccurate => write!(f, "Optimal (inaccurate)"),
            SolveStatus::PrimalInfeasible => write!(f, "Primal infeasible"),
            SolveStatus::PrimalInfeasibleInaccurate => write!(f, "Primal infeasible (inaccurate)"),
            SolveStatus::DualInfeasible => write!(f, "Dual infeasible"),
            SolveStatus::DualInfeasibleInaccurate => write!(f, "Dual infeasible (inaccurate)"),
            SolveStatus::MaxIters => write!(f, "Maximum iterations reached"),
            SolveStatus::NumericalError => write!(f, "Numerical error"),
        }
    }
}

/// Per-iteration statistics and final diagnostics.
#[derive(Debug, Clone)]
pub struct Info {
    /// Primal objective c'x / tau
    pub pcost: f64,
    /// Dual objective -(h'z + b'y) / tau
    pub dcost: f64,
    /// Relative primal residual
    pub pres: f64,
    /// Relative dual residual
    pub dres: f64,
    /// Duality gap s'z
    pub gap: f64,
    /// Relative duality gap; NaN when neither objective sign fixes a scale
    pub relgap: f64,
    /// Primal infeasibility residual, when the certificate test is active
    pub pinfres: Option<f64>,
    /// Dual infeasibility residual, when the certificate test is active
    pub dinfres: Option<f64>,
    /// Barrier parameter
    pub mu: f64,
    /// Centering parameter of the last step
    pub sigma: f64,
    /// Length of the last combined step
    pub step: f64,
    /// Length of the last affine step
    pub step_aff: f64,
    /// kappa / tau
    pub kapovert: f64,
    /// Iterations completed
    pub iter: usize,
    /// Refinement steps in the last rhs1 solve
    pub nitref1: usize,
    /// Refinement steps in the last affine solve
    pub nitref2: usize,
    /// Refinement steps in the last combined solve
    pub nitref3: usize,
}

impl Default for Info {
    fn default() -> Self {
        Self {
            pcost: f64::NAN,
            dcost: f64::NAN,
            pres: f64::INFINITY,
            dres: f64::INFINITY,
            gap: f64::INFINITY,
            relgap: f64::NAN,
            pinfres: None,
            dinfres: None,
            mu: f64::INFINITY,
            sigma: 0.0,
            step: 0.0,
            step_aff: 0.0,
            kapovert: f64::NAN,
            iter: 0,
            nitref1: 0,
            nitref2: 0,
            nitref3: 0,
        }
    }
}

/// Solve result: the back-scaled iterate plus diagnostics.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Final status
    pub status: SolveStatus,
    /// Primal variables, length n
    pub x: Vec<f64>,
    /// Equality multipliers, length p
    pub y: Vec<f64>,
    /// Cone multipliers, length m
    pub z: Vec<f64>,
    /// Cone slacks, length m
    pub s: Vec<f64>,
    /// Homogeneous embedding scalar
    pub tau: f64,
    /// Homogeneous embedding scalar
    pub kappa: f64,
    /// Statistics of the final iterate
    pub info: Info,
}

/// Validate the raw problem inputs.
///
/// Checks the dimension consistency of (G, A, c, h, b) and the cone list:
/// c matches the columns of G, h the rows of G, b the rows of A, A and G
/// agree on the variable count when equality constraints are present, every
/// declared cone is nonempty, and the cones fit in the rows of G.
pub fn validate(
    g: &SparseCsc,
    a: &SparseCsc,
    c: &[f64],
    h: &[f64],
    b: &[f64],
    soc_dims: &[usize],
) -> Result<(), SolverError> {
    let n = g.cols();
    let m = g.rows();
    let p = a.rows();

    if c.len() != n {
        return Err(SolverError::DimensionMismatch {
            what: "c",
            got: c.len(),
            expected: n,
        });
    }
    if h.len() != m {
        return Err(SolverError::DimensionMismatch {
            what: "h",
            got: h.len(),
            expected: m,
        });
    }
    if b.len() != p {
        return Err(SolverError::DimensionMismatch {
            what: "b",
            got: b.len(),
            expected: p,
        });
    }
    if p > 0 && a.cols() != n {
        return Err(SolverError::DimensionMismatch {
            what: "A columns",
            got: a.cols(),
            expected: n,
        });
    }

    for (index, &q) in soc_dims.iter().enumerate() {
        if q == 0 {
            return Err(SolverError::EmptyCone { index });
        }
    }
    let total: usize = soc_dims.iter().sum();
    if total > m {
        return Err(SolverError::ConeOverflow { total, rows: m });
    }

    Ok(())
}
