//! Predictor-corrector direction machinery.
//!
//! Right-hand-side assembly for the affine and combined KKT solves, and the
//! conic line search. The two-solve Mehrotra scheme itself lives in the
//! driver; the routines here work purely on preallocated buffers.

use crate::cones::{ConeLayout, ConeSet, SocBlock};
use crate::problem::Settings;

/// Assemble the affine right-hand side into `rhs`:
/// top block [rx; -ry], z block s - rz at the native positions, zeros in
/// the expansion slots.
#[allow(clippy::too_many_arguments)]
pub fn rhs_affine(
    rhs: &mut [f64],
    n: usize,
    p: usize,
    layout: &ConeLayout,
    rx: &[f64],
    ry: &[f64],
    s: &[f64],
    rz: &[f64],
) {
    rhs[..n].copy_from_slice(rx);
    for i in 0..p {
        rhs[n + i] = -ry[i];
    }

    let zpart = &mut rhs[n + p..];
    zpart.fill(0.0);
    for i in 0..layout.lp_dim() {
        zpart[i] = s[i] - rz[i];
    }
    for k in 0..layout.ncones() {
        let q = layout.soc_dims()[k];
        let no = layout.soc_native(k);
        let eo = layout.soc_expanded(k);
        for i in 0..q {
            zpart[eo + i] = s[no + i] - rz[no + i];
        }
    }
}

/// Turn the affine right-hand side into the combined one.
///
/// Builds the corrector term
///   ds = lambda o lambda + (W \ ds_aff) o (W dz_aff) - sigma*mu*e
/// with sigma*mu subtracted from every LP entry and only from the head
/// entry of each second-order cone, computes lambda \ ds into `ds_by_w`
/// (which holds W \ ds_aff on entry), scales the top block of `rhs` by
/// (1 - sigma), and writes -(1 - sigma)*rz + W*(lambda \ ds) into the
/// native z positions.
///
/// Returns false when the conic division fails (lambda left the cone).
#[allow(clippy::too_many_arguments)]
pub fn rhs_combined(
    rhs: &mut [f64],
    n: usize,
    p: usize,
    cones: &ConeSet,
    lambda: &[f64],
    ds_by_w: &mut [f64],
    w_times_dz: &[f64],
    rz: &[f64],
    sigma: f64,
    mu: f64,
    ds1: &mut [f64],
    ds2: &mut [f64],
) -> bool {
    let layout = &cones.layout;

    cones.product(lambda, lambda, ds1);
    cones.product(ds_by_w, w_times_dz, ds2);

    let sigmamu = sigma * mu;
    for i in 0..layout.lp_dim() {
        ds1[i] += ds2[i] - sigmamu;
    }
    for k in 0..layout.ncones() {
        let q = layout.soc_dims()[k];
        let o = layout.soc_native(k);
        ds1[o] += ds2[o] - sigmamu;
        for i in 1..q {
            ds1[o + i] += ds2[o + i];
        }
    }

    if !cones.division(lambda, ds1, ds_by_w) {
        return false;
    }
    cones.scale(ds_by_w, ds2);

    let oms = 1.0 - sigma;
    for v in rhs[..n + p].iter_mut() {
        *v *= oms;
    }
    let zpart = &mut rhs[n + p..];
    zpart.fill(0.0);
    for i in 0..layout.lp_dim() {
        zpart[i] = -oms * rz[i] + ds2[i];
    }
    for k in 0..layout.ncones() {
        let q = layout.soc_dims()[k];
        let no = layout.soc_native(k);
        let eo = layout.soc_expanded(k);
        for i in 0..q {
            zpart[eo + i] = -oms * rz[no + i] + ds2[no + i];
        }
    }

    true
}

/// Conic line search on the scaled directions.
///
/// Combines the LP ratio bound, the tau and kappa scalar bounds, and the
/// per-cone SOC bound, then clamps the result to [stepmin, stepmax]. The
/// `eps` setting stands in for an infinite bound when nothing is active.
#[allow(clippy::too_many_arguments)]
pub fn line_search(
    cones: &ConeSet,
    lambda: &[f64],
    ds: &[f64],
    dz: &[f64],
    tau: f64,
    dtau: f64,
    kappa: f64,
    dkappa: f64,
    settings: &Settings,
) -> f64 {
    let layout = &cones.layout;
    let l = layout.lp_dim();
    let mut alpha = settings.eps;

    if l > 0 {
        let mut rho_min = f64::INFINITY;
        let mut sig_min = f64::INFINITY;
        for i in 0..l {
            rho_min = rho_min.min(ds[i] / lambda[i]);
            sig_min = sig_min.min(dz[i] / lambda[i]);
        }
        let worst = rho_min.min(sig_min);
        if worst < 0.0 {
            alpha = alpha.min(1.0 / -worst);
        }
    }

    if dtau < 0.0 {
        alpha = alpha.min(-tau / dtau);
    }
    if dkappa < 0.0 {
        alpha = alpha.min(-kappa / dkappa);
    }

    for (k, soc) in cones.socs.iter().enumerate() {
        let o = layout.soc_native(k);
        let q = soc.dim();
        let lk = &lambda[o..o + q];

        // Cones whose scaled variable sits on the boundary contribute no
        // bound.
        let res = SocBlock::residual(lk);
        if res <= 0.0 {
            continue;
        }
        let inv = 1.0 / res.sqrt();
        let lkbar0 = lk[0] * inv;

        // Lorentz-form products lkbar * d
        let mut lk_ds = lkbar0 * ds[o];
        let mut lk_dz = lkbar0 * dz[o];
        for i in 1..q {
            lk_ds -= lk[i] * inv * ds[o + i];
            lk_dz -= lk[i] * inv * dz[o + i];
        }

        let f_ds = (lk_ds + ds[o]) / (lkbar0 + 1.0);
        let f_dz = (lk_dz + dz[o]) / (lkbar0 + 1.0);

        let mut rho_tail = 0.0;
        let mut sig_tail = 0.0;
        for i in 1..q {
            let lkbar_i = lk[i] * inv;
            let r = inv * (ds[o + i] - f_ds * lkbar_i);
            let t = inv * (dz[o + i] - f_dz * lkbar_i);
            rho_tail += r * r;
            sig_tail += t * t;
        }
        let rho_norm = rho_tail.sqrt() - inv * lk_ds;
        let sig_norm = sig_tail.sqrt() - inv * lk_dz;

        let conic_step = rho_norm.max(sig_norm).max(0.0);
        if conic_step > 0.0 {
            alpha = alpha.min(1.0 / conic_step);
        }
    }

    alpha.clamp(settings.stepmin, settings.stepmax)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cones::ConeSet;

    #[test]
    fn test_line_search_lp_bound() {
        let cones = ConeSet::new(2, vec![]);
        let settings = Settings::default();
        let lambda = [1.0, 2.0];

        // ds[0]/lambda[0] = -2 is the binding ratio: boundary at alpha = 0.5
        let alpha = line_search(
            &cones,
            &lambda,
            &[-2.0, 0.1],
            &[0.2, 0.3],
            1.0,
            0.1,
            1.0,
            0.1,
            &settings,
        );
        assert!((alpha - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_line_search_tau_kappa_bounds() {
        let cones = ConeSet::new(1, vec![]);
        let settings = Settings::default();
        let lambda = [1.0];

        // No negative cone ratios; tau bound -tau/dtau = 0.5 binds
        let alpha = line_search(
            &cones,
            &lambda,
            &[1.0],
            &[1.0],
            1.0,
            -2.0,
            1.0,
            -1.0,
            &settings,
        );
        assert!((alpha - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_line_search_clamps_to_stepmax() {
        let cones = ConeSet::new(1, vec![]);
        let settings = Settings::default();

        // Direction points into the interior everywhere: bound saturates
        let alpha = line_search(
            &cones,
            &[1.0],
            &[1.0],
            &[1.0],
            1.0,
            1.0,
            1.0,
            1.0,
            &settings,
        );
        assert_eq!(alpha, settings.stepmax);
    }

    #[test]
    fn test_line_search_soc_bound() {
        let cones = ConeSet::new(0, vec![3]);
        let settings = Settings::default();

        // lambda on the cone axis; pushing the head down hits the boundary
        // of lambda + alpha*ds at alpha = 0.5
        let lambda = [2.0, 0.0, 0.0];
        let ds = [-4.0, 0.0, 0.0];
        let dz = [0.0, 0.0, 0.0];

        let alpha = line_search(&cones, &lambda, &ds, &dz, 1.0, 0.1, 1.0, 0.1, &settings);
        assert!((alpha - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_rhs_affine_layout() {
        let cones = ConeSet::new(1, vec![2]);
        let n = 2;
        let p = 1;
        // dim = n + p + m + 2 = 2 + 1 + 3 + 2
        let mut rhs = vec![9.0; 8];

        let rx = [1.0, 2.0];
        let ry = [3.0];
        let s = [0.5, 0.6, 0.7];
        let rz = [0.1, 0.2, 0.3];

        rhs_affine(&mut rhs, n, p, &cones.layout, &rx, &ry, &s, &rz);

        assert_eq!(&rhs[..3], &[1.0, 2.0, -3.0]);
        // LP row then SOC rows, expansion slots zeroed
        assert!((rhs[3] - 0.4).abs() < 1e-15);
        assert!((rhs[4] - 0.4).abs() < 1e-15);
        assert!((rhs[5] - 0.4).abs() < 1e-15);
        assert_eq!(rhs[6], 0.0);
        assert_eq!(rhs[7], 0.0);
    }

    #[test]
    fn test_rhs_combined_sigma_heads_only() {
        // With ds_aff = 0 and dz_aff = 0 the corrector reduces to
        // lambda \ (lambda o lambda - sigma*mu*e_heads) and the sigma*mu
        // term must hit every LP entry but only the SOC head.
        let cones = ConeSet::new(1, vec![2]);
        let n = 1;
        let p = 0;
        let mut rhs = vec![1.0; 1 + 5];

        let lambda = [2.0, 3.0, 1.0];
        let mut ds_by_w = [0.0; 3];
        let w_times_dz = [0.0; 3];
        let rz = [0.0; 3];
        let mut ds1 = [0.0; 3];
        let mut ds2 = [0.0; 3];

        let sigma = 0.5;
        let mu = 2.0;
        let ok = rhs_combined(
            &mut rhs,
            n,
            p,
            &cones,
            &lambda,
            &mut ds_by_w,
            &w_times_dz,
            &rz,
            sigma,
            mu,
            &mut ds1,
            &mut ds2,
        );
        assert!(ok);

        // ds1 before division: LP 4 - 1 = 3; SOC (9 + 1 - 1, 2*3*1) = (9, 6)
        assert!((ds1[0] - 3.0).abs() < 1e-12);
        assert!((ds1[1] - 9.0).abs() < 1e-12);
        assert!((ds1[2] - 6.0).abs() < 1e-12);

        // Top block scaled by 1 - sigma
        assert!((rhs[0] - 0.5).abs() < 1e-12);
    }
}
