//! Residuals, iteration statistics, and convergence tests.

use crate::ipm::state::Iterate;
use crate::linalg::sparse::{self, SparseCsc};
use crate::linalg::{dot, norm2};
use crate::problem::Info;

/// Residuals of the homogeneous embedding, rebuilt every iteration.
#[derive(Debug, Clone)]
pub struct Residuals {
    /// rx = -G'z - A'y - tau*c
    pub rx: Vec<f64>,
    /// ry = A x - tau*b
    pub ry: Vec<f64>,
    /// rz = s + G x - tau*h
    pub rz: Vec<f64>,
    /// rt = kappa + c'x + b'y + h'z
    pub rt: f64,

    /// Norm of the homogeneous part -G'z - A'y
    pub hresx: f64,
    /// Norm of the homogeneous part A x (zero when p = 0)
    pub hresy: f64,
    /// Norm of the homogeneous part s + G x
    pub hresz: f64,

    /// Iterate norms
    pub nx: f64,
    /// Norm of y
    pub ny: f64,
    /// Norm of z
    pub nz: f64,
    /// Norm of s
    pub ns: f64,

    /// c'x
    pub cx: f64,
    /// b'y (zero when p = 0)
    pub by: f64,
    /// h'z
    pub hz: f64,
}

impl Residuals {
    /// Allocate residual storage for the given dimensions.
    pub fn new(n: usize, p: usize, m: usize) -> Self {
        Self {
            rx: vec![0.0; n],
            ry: vec![0.0; p],
            rz: vec![0.0; m],
            rt: 0.0,
            hresx: 0.0,
            hresy: 0.0,
            hresz: 0.0,
            nx: 0.0,
            ny: 0.0,
            nz: 0.0,
            ns: 0.0,
            cx: 0.0,
            by: 0.0,
            hz: 0.0,
        }
    }

    /// Recompute all residuals at the current iterate.
    ///
    /// When there are no equality constraints, A and y are never touched.
    #[allow(clippy::too_many_arguments)]
    pub fn compute(
        &mut self,
        g: &SparseCsc,
        a: &SparseCsc,
        c: &[f64],
        h: &[f64],
        b: &[f64],
        it: &Iterate,
    ) {
        let p = b.len();

        // rx = -G'z - A'y - tau*c, with hresx taken before the tau*c term
        sparse::spmv_transpose(g, &it.z, &mut self.rx, -1.0, 0.0);
        if p > 0 {
            sparse::spmv_transpose(a, &it.y, &mut self.rx, -1.0, 1.0);
        }
        self.hresx = norm2(&self.rx);
        for (rxi, &ci) in self.rx.iter_mut().zip(c) {
            *rxi -= it.tau * ci;
        }

        // ry = A x - tau*b
        if p > 0 {
            sparse::spmv(a, &it.x, &mut self.ry, 1.0, 0.0);
            self.hresy = norm2(&self.ry);
            for (ryi, &bi) in self.ry.iter_mut().zip(b) {
                *ryi -= it.tau * bi;
            }
        } else {
            self.hresy = 0.0;
        }

        // rz = s + G x - tau*h
        self.rz.copy_from_slice(&it.s);
        sparse::spmv(g, &it.x, &mut self.rz, 1.0, 1.0);
        self.hresz = norm2(&self.rz);
        for (rzi, &hi) in self.rz.iter_mut().zip(h) {
            *rzi -= it.tau * hi;
        }

        self.cx = dot(c, &it.x);
        self.by = if p > 0 { dot(b, &it.y) } else { 0.0 };
        self.hz = dot(h, &it.z);
        self.rt = it.kappa + self.cx + self.by + self.hz;

        self.nx = norm2(&it.x);
        self.ny = norm2(&it.y);
        self.nz = norm2(&it.z);
        self.ns = norm2(&it.s);
    }
}

/// Update the per-iteration statistics from the current residuals.
///
/// `degree` is the cone degree l + ncones; (resx0, resy0, resz0) are the
/// problem-data normalizers fixed at setup.
#[allow(clippy::too_many_arguments)]
pub fn update_statistics(
    info: &mut Info,
    res: &Residuals,
    it: &Iterate,
    degree: usize,
    resx0: f64,
    resy0: f64,
    resz0: f64,
    reltol: f64,
    iter: usize,
) {
    let p = res.ry.len();

    info.iter = iter;
    info.gap = dot(&it.s, &it.z);
    info.mu = (info.gap + it.kappa * it.tau) / (degree as f64 + 1.0);
    info.kapovert = it.kappa / it.tau;
    info.pcost = res.cx / it.tau;
    info.dcost = -(res.hz + res.by) / it.tau;

    // Relative duality gap; with pcost >= 0 and dcost <= 0 neither objective
    // fixes a scale and the absolute gap test has to carry the check alone.
    info.relgap = if info.pcost < 0.0 {
        info.gap / -info.pcost
    } else if info.dcost > 0.0 {
        info.gap / info.dcost
    } else {
        f64::NAN
    };

    let nry = if p > 0 {
        norm2(&res.ry) / (resy0 + res.nx).max(1.0)
    } else {
        0.0
    };
    let nrz = norm2(&res.rz) / (resz0 + res.nx + res.ns).max(1.0);
    info.pres = nry.max(nrz) / it.tau;
    info.dres = norm2(&res.rx) / (resx0 + res.ny + res.nz).max(1.0) / it.tau;

    info.pinfres = if (res.hz + res.by) / (res.ny + res.nz).max(1.0) < -reltol {
        Some(res.hresx / (res.ny + res.nz).max(1.0))
    } else {
        None
    };
    info.dinfres = if res.cx / res.nx.max(1.0) < -reltol {
        Some(
            (res.hresy / res.nx.max(1.0)).max(res.hresz / (res.nx + res.ns).max(1.0)),
        )
    } else {
        None
    };
}

/// Outcome of a convergence test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// Optimality conditions hold
    Optimal,
    /// Primal infeasibility certificate found
    PrimalInfeasible,
    /// Dual infeasibility certificate found
    DualInfeasible,
}

/// Check the exit conditions at the given tolerances, in order: optimality,
/// dual infeasibility, primal infeasibility.
pub fn check_exit(
    info: &Info,
    res: &Residuals,
    it: &Iterate,
    feastol: f64,
    abstol: f64,
    reltol: f64,
) -> Option<ExitKind> {
    // NaN relgap compares false, so the absolute gap decides alone.
    if (-res.cx > 0.0 || -res.by - res.hz >= -abstol)
        && info.pres < feastol
        && info.dres < feastol
        && (info.gap < abstol || info.relgap < reltol)
    {
        return Some(ExitKind::Optimal);
    }

    if let Some(dinfres) = info.dinfres {
        if dinfres < feastol && it.tau < it.kappa {
            return Some(ExitKind::DualInfeasible);
        }
    }

    if let Some(pinfres) = info.pinfres {
        if (pinfres < feastol && it.tau < it.kappa)
            || (it.tau < feastol && it.kappa < feastol && pinfres < feastol)
        {
            return Some(ExitKind::PrimalInfeasible);
        }
    }

    None
}
