//! KKT system assembly, factorization, and refined solves.
//!
//! The augmented system has the 3x3 upper-triangular block structure
//!
//! ```text
//!     [ delta*I    A'        G~'  ]
//! K = [          -delta*I    0    ]
//!     [                     -V    ]
//! ```
//!
//! where G~ is G with its columns spread over the expanded cone space: each
//! second-order cone contributes its q data columns followed by two
//! expansion columns (the v and u slots of the arrow factorization of W^2),
//! so the scaling block stays sparse for cones of any size. The LP part of
//! V is diagonal.
//!
//! The sparsity pattern is fixed for the whole solve: symbolic analysis runs
//! once, and every iteration rewrites only the numeric values of -V before
//! refactorizing. The static regularization delta enters each block with the
//! sign that keeps K quasi-definite.

use crate::cones::ConeSet;
use crate::linalg::inf_norm;
use crate::linalg::ldl::{LdlError, LdlSolver};
use crate::linalg::sparse::{self, SparseCsc};
use crate::problem::Settings;
use sprs::TriMat;

/// Data-array positions of the mutable entries of one SOC block of -V.
struct SocSlots {
    /// Diagonal of D, q entries
    d_diag: Vec<usize>,
    /// Off-diagonal of the v column, q - 1 entries
    v_col: Vec<usize>,
    /// Diagonal entry of the v slot
    v_diag: usize,
    /// Off-diagonal of the u column, q entries (head row first)
    u_col: Vec<usize>,
    /// Diagonal entry of the u slot
    u_diag: usize,
}

/// The assembled KKT matrix together with its factorization handle and the
/// scratch buffers for iterative refinement.
pub struct KktSystem {
    n: usize,
    p: usize,
    mtilde: usize,
    dim: usize,
    delta: f64,

    mat: SparseCsc,
    ldl: LdlSolver,

    lp_diag: Vec<usize>,
    soc_slots: Vec<SocSlots>,

    // Refinement scratch, allocated once
    sol: Vec<f64>,
    refine: Vec<f64>,
    err: Vec<f64>,
    gdx: Vec<f64>,
}

impl KktSystem {
    /// Assemble the pattern from the (equilibrated) constraint matrices.
    ///
    /// The -V block starts out as the placeholder -I used by the
    /// initialization solves; the arrow entries are reserved with zero
    /// values so the pattern never changes afterwards.
    pub fn new(g: &SparseCsc, a: &SparseCsc, cones: &ConeSet, delta: f64) -> Self {
        let n = g.cols();
        let p = a.rows();
        let layout = &cones.layout;
        let l = layout.lp_dim();
        let mtilde = layout.expanded();
        let dim = n + p + mtilde;

        let mut nnz = a.nnz() + g.nnz() + n + p + l;
        for &q in layout.soc_dims() {
            nnz += 3 * q + 1;
        }

        let emap = layout.expand_map();
        let mut tri = TriMat::with_capacity((dim, dim), nnz);

        // (1,1): delta * I
        for i in 0..n {
            tri.add_triplet(i, i, delta);
        }

        // (1,2): A'
        for (val, (row, col)) in a.iter() {
            tri.add_triplet(col, n + row, *val);
        }

        // (2,2): -delta * I
        for i in 0..p {
            tri.add_triplet(n + i, n + i, -delta);
        }

        // (1,3): G' over the expanded columns
        for (val, (row, col)) in g.iter() {
            tri.add_triplet(col, n + p + emap[row], *val);
        }

        // (3,3): -V, placeholder identity with the arrow pattern reserved
        for i in 0..l {
            tri.add_triplet(n + p + i, n + p + i, -1.0 - delta);
        }
        for k in 0..layout.ncones() {
            let q = layout.soc_dims()[k];
            let base = n + p + layout.soc_expanded(k);

            for i in 0..q {
                tri.add_triplet(base + i, base + i, -1.0 - delta);
            }
            for i in 1..q {
                tri.add_triplet(base + i, base + q, 0.0);
            }
            tri.add_triplet(base + q, base + q, -1.0 - delta);
            tri.add_triplet(base, base + q + 1, 0.0);
            for i in 1..q {
                tri.add_triplet(base + i, base + q + 1, 0.0);
            }
            tri.add_triplet(base + q + 1, base + q + 1, -1.0 - delta);
        }

        let mat = tri.to_csc();
        assert_eq!(mat.nnz(), nnz);

        // Cache the data positions of every mutable -V entry so the
        // per-iteration update never searches the pattern again.
        let lp_diag = (0..l)
            .map(|i| sparse::entry_index(&mat, n + p + i, n + p + i))
            .collect();

        let mut soc_slots = Vec::with_capacity(layout.ncones());
        for k in 0..layout.ncones() {
            let q = layout.soc_dims()[k];
            let base = n + p + layout.soc_expanded(k);
            soc_slots.push(SocSlots {
                d_diag: (0..q)
                    .map(|i| sparse::entry_index(&mat, base + i, base + i))
                    .collect(),
                v_col: (1..q)
                    .map(|i| sparse::entry_index(&mat, base + i, base + q))
                    .collect(),
                v_diag: sparse::entry_index(&mat, base + q, base + q),
                u_col: (0..q)
                    .map(|i| sparse::entry_index(&mat, base + i, base + q + 1))
                    .collect(),
                u_diag: sparse::entry_index(&mat, base + q + 1, base + q + 1),
            });
        }

        Self {
            n,
            p,
            mtilde,
            dim,
            delta,
            mat,
            ldl: LdlSolver::new(dim),
            lp_diag,
            soc_slots,
            sol: vec![0.0; dim],
            refine: vec![0.0; dim],
            err: vec![0.0; dim],
            gdx: vec![0.0; layout.m()],
        }
    }

    /// KKT dimension n + p + m + 2*ncones.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Symbolic analysis of the fixed pattern. Run once per solve.
    pub fn analyze(&mut self) -> Result<(), LdlError> {
        self.ldl.analyze(&self.mat)
    }

    /// Restore the placeholder -I scaling block used by the initialization
    /// solves.
    pub fn reset_scaling(&mut self) {
        let delta = self.delta;
        let data = self.mat.data_mut();

        for &idx in &self.lp_diag {
            data[idx] = -1.0 - delta;
        }
        for slots in &self.soc_slots {
            for &idx in &slots.d_diag {
                data[idx] = -1.0 - delta;
            }
            for &idx in &slots.v_col {
                data[idx] = 0.0;
            }
            data[slots.v_diag] = -1.0 - delta;
            for &idx in &slots.u_col {
                data[idx] = 0.0;
            }
            data[slots.u_diag] = -1.0 - delta;
        }
    }

    /// Rewrite the numeric values of -V from the current scaling state.
    pub fn update(&mut self, cones: &ConeSet) {
        let delta = self.delta;
        let data = self.mat.data_mut();

        for (i, &idx) in self.lp_diag.iter().enumerate() {
            data[idx] = -cones.lp.v[i] - delta;
        }

        for (soc, slots) in cones.socs.iter().zip(&self.soc_slots) {
            let q = soc.dim();

            data[slots.d_diag[0]] = -soc.eta_sq * soc.d1 - delta;
            for i in 1..q {
                data[slots.d_diag[i]] = -soc.eta_sq - delta;
            }
            for i in 0..q - 1 {
                data[slots.v_col[i]] = -soc.eta_sq * soc.v1 * soc.q[i];
            }
            data[slots.v_diag] = -soc.eta_sq - delta;
            data[slots.u_col[0]] = -soc.eta_sq * soc.u0;
            for i in 1..q {
                data[slots.u_col[i]] = -soc.eta_sq * soc.u1 * soc.q[i - 1];
            }
            data[slots.u_diag] = soc.eta_sq + delta;
        }
    }

    /// Numeric factorization with the current values.
    pub fn factorize(&mut self) -> Result<(), LdlError> {
        self.ldl.factor(&self.mat)
    }

    /// Solve K * [dx; dy; dz~] = rhs with iterative refinement and return
    /// the number of refinement steps taken.
    ///
    /// The native (dx, dy, dz) parts are written to the output slices; dz is
    /// gathered through the expansion schedule. Refinement measures the
    /// residual of the un-expanded system, using the fast arrow multiply for
    /// V (or the identity during the initialization solves), and stops when
    /// the error is below (1 + ||rhs||_inf) * linsysacc, the step budget is
    /// exhausted, or refinement stalls; a step that grows the error is
    /// rolled back.
    #[allow(clippy::too_many_arguments)]
    pub fn solve(
        &mut self,
        rhs: &[f64],
        g: &SparseCsc,
        a: &SparseCsc,
        cones: &ConeSet,
        settings: &Settings,
        initialize: bool,
        dx: &mut [f64],
        dy: &mut [f64],
        dz: &mut [f64],
    ) -> usize {
        let n = self.n;
        let p = self.p;
        debug_assert_eq!(rhs.len(), self.dim);
        debug_assert_eq!(dx.len(), n);
        debug_assert_eq!(dy.len(), p);

        self.sol.copy_from_slice(rhs);
        self.ldl.solve_in_place(&mut self.sol);

        let threshold = (1.0 + inf_norm(rhs)) * settings.linsysacc;
        let mut nerr_prev = f64::INFINITY;
        let mut steps = 0;

        for k in 0..=settings.nitref {
            dx.copy_from_slice(&self.sol[..n]);
            dy.copy_from_slice(&self.sol[n..n + p]);
            cones.layout.contract_into(&self.sol[n + p..], dz);

            // ex = bx - G' dz - A' dy - delta * dx
            for i in 0..n {
                self.err[i] = rhs[i] - self.delta * dx[i];
            }
            sparse::spmv_transpose(g, dz, &mut self.err[..n], -1.0, 1.0);
            if p > 0 {
                sparse::spmv_transpose(a, dy, &mut self.err[..n], -1.0, 1.0);
            }

            // ey = by - A dx + delta * dy
            if p > 0 {
                for i in 0..p {
                    self.err[n + i] = rhs[n + i] + self.delta * dy[i];
                }
                sparse::spmv(a, dx, &mut self.err[n..n + p], -1.0, 1.0);
            }

            // ez = bz - G dx + V * dz~ (identity V while initializing)
            sparse::spmv(g, dx, &mut self.gdx, 1.0, 0.0);
            {
                let layout = &cones.layout;
                let ez = &mut self.err[n + p..];
                ez.copy_from_slice(&rhs[n + p..]);
                for i in 0..layout.lp_dim() {
                    ez[i] -= self.gdx[i];
                }
                for k in 0..layout.ncones() {
                    let q = layout.soc_dims()[k];
                    let no = layout.soc_native(k);
                    let eo = layout.soc_expanded(k);
                    for i in 0..q {
                        ez[eo + i] -= self.gdx[no + i];
                    }
                }
                let ztilde = &self.sol[n + p..];
                if initialize {
                    for i in 0..self.mtilde {
                        ez[i] += ztilde[i];
                    }
                } else {
                    cones.scale2_add_expanded(ztilde, ez);
                }
            }

            let nex = inf_norm(&self.err[..n]);
            let ney = if p > 0 { inf_norm(&self.err[n..n + p]) } else { 0.0 };
            let nez = inf_norm(&self.err[n + p..]);
            let nerr = nex.max(ney).max(nez);

            // A refinement step that grew the error is undone
            if k > 0 && nerr > nerr_prev {
                for i in 0..self.dim {
                    self.sol[i] -= self.refine[i];
                }
                steps = k - 1;
                break;
            }
            steps = k;

            if nerr < threshold
                || k == settings.nitref
                || (k > 0 && nerr_prev < settings.irerrfact * nerr)
            {
                break;
            }
            nerr_prev = nerr;

            self.refine.copy_from_slice(&self.err);
            self.ldl.solve_in_place(&mut self.refine);
            for i in 0..self.dim {
                self.sol[i] += self.refine[i];
            }
        }

        dx.copy_from_slice(&self.sol[..n]);
        dy.copy_from_slice(&self.sol[n..n + p]);
        cones.layout.contract_into(&self.sol[n + p..], dz);

        steps
    }
}
