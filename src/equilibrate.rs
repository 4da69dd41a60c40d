//! Ruiz-style equilibration.
//!
//! Iteratively rescales the rows and columns of the constraint matrices to
//! balance entry magnitudes, which conditions the KKT systems the interior
//! point method factors. Row scales for second-order cone rows are collapsed
//! to one factor per cone so the cone geometry survives the scaling.
//!
//! The accumulated factors are kept so the final iterate can be mapped back
//! to original problem units.

use crate::cones::ConeLayout;
use crate::linalg::sparse::{self, SparseCsc};

/// Scale factors below this magnitude are floored to one, so zero rows and
/// columns pass through untouched.
const EQUIL_FLOOR: f64 = 1e-6;

/// Accumulated equilibration factors.
///
/// All vectors start at one and accumulate the per-pass scale factors. They
/// are only consulted again when the final iterate is unscaled; the inner
/// iterations never touch them.
#[derive(Debug, Clone)]
pub struct Equilibration {
    /// Column scales, length n
    pub x_equil: Vec<f64>,
    /// Row scales of A, length p
    pub a_equil: Vec<f64>,
    /// Row scales of G, length m
    pub g_equil: Vec<f64>,
}

impl Equilibration {
    /// Identity scaling (used when `equil_iters` is zero).
    pub fn identity(n: usize, p: usize, m: usize) -> Self {
        Self {
            x_equil: vec![1.0; n],
            a_equil: vec![1.0; p],
            g_equil: vec![1.0; m],
        }
    }

    /// Equilibrate (A, G, b, h) in place and return the accumulated factors.
    ///
    /// Each pass computes max-norm column scales over the stacked [A; G],
    /// max-norm row scales of A and of G, collapses the G row scales over
    /// each SOC block to the block sum, floors tiny factors to one, takes
    /// square roots, and divides the matrices through. Afterwards b and h
    /// are divided by the accumulated row scales; c is scaled lazily at the
    /// start of the solve.
    pub fn compute(
        a: &mut SparseCsc,
        g: &mut SparseCsc,
        b: &mut [f64],
        h: &mut [f64],
        layout: &ConeLayout,
        iters: usize,
    ) -> Self {
        let n = g.cols();
        let p = a.rows();
        let m = g.rows();
        debug_assert_eq!(b.len(), p);
        debug_assert_eq!(h.len(), m);

        let mut equil = Self::identity(n, p, m);

        let mut x_tmp: Vec<f64> = vec![0.0; n];
        let mut a_tmp: Vec<f64> = vec![0.0; p];
        let mut g_tmp: Vec<f64> = vec![0.0; m];

        for _ in 0..iters {
            x_tmp.fill(0.0);
            a_tmp.fill(0.0);
            g_tmp.fill(0.0);

            // Column norms over the stacked [A; G], row norms per matrix
            for (val, (row, col)) in a.iter() {
                let mag = val.abs();
                x_tmp[col] = x_tmp[col].max(mag);
                a_tmp[row] = a_tmp[row].max(mag);
            }
            for (val, (row, col)) in g.iter() {
                let mag = val.abs();
                x_tmp[col] = x_tmp[col].max(mag);
                g_tmp[row] = g_tmp[row].max(mag);
            }

            // Collapse SOC rows: one factor per cone, the sum over its rows
            for k in 0..layout.ncones() {
                let o = layout.soc_native(k);
                let q = layout.soc_dims()[k];
                let total: f64 = g_tmp[o..o + q].iter().sum();
                g_tmp[o..o + q].fill(total);
            }

            // Floor tiny factors at one, square-root the rest
            for v in x_tmp.iter_mut().chain(&mut a_tmp).chain(&mut g_tmp) {
                *v = if v.abs() < EQUIL_FLOOR { 1.0 } else { v.sqrt() };
            }

            // Divide the matrices through by their row and column scales
            sparse::for_each_entry_mut(a, |row, col, v| {
                *v /= a_tmp[row] * x_tmp[col];
            });
            sparse::for_each_entry_mut(g, |row, col, v| {
                *v /= g_tmp[row] * x_tmp[col];
            });

            for j in 0..n {
                equil.x_equil[j] *= x_tmp[j];
            }
            for i in 0..p {
                equil.a_equil[i] *= a_tmp[i];
            }
            for i in 0..m {
                equil.g_equil[i] *= g_tmp[i];
            }
        }

        for i in 0..p {
            b[i] /= equil.a_equil[i];
        }
        for i in 0..m {
            h[i] /= equil.g_equil[i];
        }

        equil
    }

    /// Undo the equilibration on (A, G, b, h), restoring the original data.
    pub fn undo(&self, a: &mut SparseCsc, g: &mut SparseCsc, b: &mut [f64], h: &mut [f64]) {
        sparse::for_each_entry_mut(a, |row, col, v| {
            *v *= self.a_equil[row] * self.x_equil[col];
        });
        sparse::for_each_entry_mut(g, |row, col, v| {
            *v *= self.g_equil[row] * self.x_equil[col];
        });
        for (bi, &ri) in b.iter_mut().zip(&self.a_equil) {
            *bi *= ri;
        }
        for (hi, &ri) in h.iter_mut().zip(&self.g_equil) {
            *hi *= ri;
        }
    }
}
