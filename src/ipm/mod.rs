//! Interior-point driver.
//!
//! Mehrotra predictor-corrector iterations in the homogeneous self-dual
//! embedding. Per iteration the driver recomputes residuals and statistics,
//! runs the convergence tests, refreshes the Nesterov-Todd scalings and the
//! KKT factorization, solves two predictor systems and one corrector
//! system, line-searches both directions, and advances the iterate.

pub mod predcorr;
pub mod state;
pub mod termination;

use crate::cones::ConeSet;
use crate::equilibrate::Equilibration;
use crate::kkt::KktSystem;
use crate::linalg::sparse::SparseCsc;
use crate::linalg::{dot, norm2};
use crate::problem::{self, Info, Settings, Solution, SolveStatus, SolverError};
use state::Iterate;
use termination::{check_exit, update_statistics, ExitKind, Residuals};

/// The SOCP solver. Owns the equilibrated problem data, the cone scaling
/// state, the KKT system, the iterate, and every scratch vector; nothing is
/// allocated after construction.
pub struct Solver {
    n: usize,
    p: usize,
    m: usize,

    // Equilibrated problem data; c is scaled at the start of solve and
    // unscaled again by the back-scaling pass.
    g: SparseCsc,
    a: SparseCsc,
    c: Vec<f64>,
    h: Vec<f64>,
    b: Vec<f64>,
    equil: Equilibration,

    cones: ConeSet,
    kkt: KktSystem,
    it: Iterate,
    res: Residuals,
    info: Info,
    settings: Settings,

    // Best iterate seen, returned on numerical failure
    best_it: Iterate,
    best_info: Info,

    // Problem-data normalizers fixed at the start of solve
    resx0: f64,
    resy0: f64,
    resz0: f64,

    // Scratch, sized once
    rhs1: Vec<f64>,
    rhs2: Vec<f64>,
    dx1: Vec<f64>,
    dy1: Vec<f64>,
    dz1: Vec<f64>,
    dx2: Vec<f64>,
    dy2: Vec<f64>,
    dz2: Vec<f64>,
    w_times_dzaff: Vec<f64>,
    dsaff_by_w: Vec<f64>,
    dsaff: Vec<f64>,
    ds1: Vec<f64>,
    ds2: Vec<f64>,
}

impl Solver {
    /// Validate the problem data and set up the solver.
    ///
    /// Equilibrates (A, G, b, h) into shadow copies, builds the cone list,
    /// and assembles the KKT pattern. A may be 0 x n when there are no
    /// equality constraints.
    pub fn new(
        g: SparseCsc,
        a: SparseCsc,
        c: Vec<f64>,
        h: Vec<f64>,
        b: Vec<f64>,
        soc_dims: Vec<usize>,
        settings: Settings,
    ) -> Result<Self, SolverError> {
        problem::validate(&g, &a, &c, &h, &b, &soc_dims)?;

        let n = g.cols();
        let m = g.rows();
        let p = a.rows();
        let l = m - soc_dims.iter().sum::<usize>();

        let cones = ConeSet::new(l, soc_dims);

        let mut g = g;
        let mut a = a;
        let mut b = b;
        let mut h = h;
        let equil = Equilibration::compute(
            &mut a,
            &mut g,
            &mut b,
            &mut h,
            &cones.layout,
            settings.equil_iters,
        );

        let kkt = KktSystem::new(&g, &a, &cones, settings.delta);
        let dim = kkt.dim();

        Ok(Self {
            n,
            p,
            m,
            g,
            a,
            c,
            h,
            b,
            equil,
            cones,
            kkt,
            it: Iterate::new(n, p, m),
            res: Residuals::new(n, p, m),
            info: Info::default(),
            settings,
            best_it: Iterate::new(n, p, m),
            best_info: Info::default(),
            resx0: 1.0,
            resy0: 1.0,
            resz0: 1.0,
            rhs1: vec![0.0; dim],
            rhs2: vec![0.0; dim],
            dx1: vec![0.0; n],
            dy1: vec![0.0; p],
            dz1: vec![0.0; m],
            dx2: vec![0.0; n],
            dy2: vec![0.0; p],
            dz2: vec![0.0; m],
            w_times_dzaff: vec![0.0; m],
            dsaff_by_w: vec![0.0; m],
            dsaff: vec![0.0; m],
            ds1: vec![0.0; m],
            ds2: vec![0.0; m],
        })
    }

    /// Run the interior-point method and return the back-scaled result.
    ///
    /// Never fails; the outcome is carried by the status field.
    pub fn solve(&mut self) -> Solution {
        let stg = self.settings.clone();
        let (n, p, m) = (self.n, self.p, self.m);

        // Deferred part of the equilibration
        for (ci, &ei) in self.c.iter_mut().zip(&self.equil.x_equil) {
            *ci /= ei;
        }

        self.resx0 = norm2(&self.c).max(1.0);
        self.resy0 = norm2(&self.b).max(1.0);
        self.resz0 = norm2(&self.h).max(1.0);

        // rhs1 = [0; b; h~], rhs2 = [-c; 0; 0]
        self.rhs1.fill(0.0);
        self.rhs1[n..n + p].copy_from_slice(&self.b);
        self.cones
            .layout
            .expand_into(&self.h, &mut self.rhs1[n + p..]);
        self.rhs2.fill(0.0);
        for i in 0..n {
            self.rhs2[i] = -self.c[i];
        }

        if stg.verbose {
            self.print_banner();
        }

        // Symbolic analysis once, then the placeholder factorization the
        // initialization solves use.
        self.kkt.reset_scaling();
        if self.kkt.analyze().is_err() || self.kkt.factorize().is_err() {
            return self.finish(SolveStatus::NumericalError);
        }

        // Primal initialization: solve for [0; b; h~], take s from the
        // residual -r = dz and push it into the cone.
        self.kkt.solve(
            &self.rhs1,
            &self.g,
            &self.a,
            &self.cones,
            &stg,
            true,
            &mut self.dx1,
            &mut self.dy1,
            &mut self.dz1,
        );
        self.it.x.copy_from_slice(&self.dx1);
        for i in 0..m {
            self.it.s[i] = -self.dz1[i];
        }
        self.cones.bring_to_cone(&mut self.it.s, stg.gamma);

        // Dual initialization: solve for [-c; 0; 0].
        self.kkt.solve(
            &self.rhs2,
            &self.g,
            &self.a,
            &self.cones,
            &stg,
            true,
            &mut self.dx2,
            &mut self.dy2,
            &mut self.dz2,
        );
        self.it.y.copy_from_slice(&self.dy2);
        self.it.z.copy_from_slice(&self.dz2);
        self.cones.bring_to_cone(&mut self.it.z, stg.gamma);

        self.it.tau = 1.0;
        self.it.kappa = 1.0;

        // rhs1 is reused every iteration with -c in the top block
        for i in 0..n {
            self.rhs1[i] = -self.c[i];
        }

        let degree = self.cones.layout.degree();
        let mut status = SolveStatus::NumericalError;

        for iter in 0..=stg.maxit {
            self.res
                .compute(&self.g, &self.a, &self.c, &self.h, &self.b, &self.it);
            update_statistics(
                &mut self.info,
                &self.res,
                &self.it,
                degree,
                self.resx0,
                self.resy0,
                self.resz0,
                stg.reltol,
                iter,
            );

            if !self.info.mu.is_finite() {
                status = SolveStatus::NumericalError;
                break;
            }

            if self.info.pres.max(self.info.dres) < self.best_info.pres.max(self.best_info.dres) {
                self.best_it.copy_from(&self.it);
                self.best_info = self.info.clone();
            }

            if stg.verbose {
                self.print_row();
            }

            if let Some(kind) = check_exit(
                &self.info,
                &self.res,
                &self.it,
                stg.feastol,
                stg.abstol,
                stg.reltol,
            ) {
                status = match kind {
                    ExitKind::Optimal => SolveStatus::Optimal,
                    ExitKind::PrimalInfeasible => SolveStatus::PrimalInfeasible,
                    ExitKind::DualInfeasible => SolveStatus::DualInfeasible,
                };
                break;
            }

            // At the iteration limit, one pass against the relaxed
            // tolerances decides between the inaccurate statuses and a
            // plain iteration-limit report.
            if iter == stg.maxit {
                status = match check_exit(
                    &self.info,
                    &self.res,
                    &self.it,
                    stg.feastol_inacc,
                    stg.abstol_inacc,
                    stg.reltol_inacc,
                ) {
                    Some(ExitKind::Optimal) => SolveStatus::OptimalInaccurate,
                    Some(ExitKind::PrimalInfeasible) => SolveStatus::PrimalInfeasibleInaccurate,
                    Some(ExitKind::DualInfeasible) => SolveStatus::DualInfeasibleInaccurate,
                    None => SolveStatus::MaxIters,
                };
                break;
            }

            // Scaling refresh; a failure here means the iterate left the
            // cone and the loop cannot continue.
            if !self
                .cones
                .update_scalings(&self.it.s, &self.it.z, &mut self.it.lambda)
            {
                status = SolveStatus::NumericalError;
                break;
            }

            self.kkt.update(&self.cones);
            if self.kkt.factorize().is_err() {
                status = SolveStatus::NumericalError;
                break;
            }

            // First predictor solve, reused by both direction combinations
            self.info.nitref1 = self.kkt.solve(
                &self.rhs1,
                &self.g,
                &self.a,
                &self.cones,
                &stg,
                false,
                &mut self.dx1,
                &mut self.dy1,
                &mut self.dz1,
            );

            // Affine direction
            predcorr::rhs_affine(
                &mut self.rhs2,
                n,
                p,
                &self.cones.layout,
                &self.res.rx,
                &self.res.ry,
                &self.it.s,
                &self.res.rz,
            );
            self.info.nitref2 = self.kkt.solve(
                &self.rhs2,
                &self.g,
                &self.a,
                &self.cones,
                &stg,
                false,
                &mut self.dx2,
                &mut self.dy2,
                &mut self.dz2,
            );

            let dtau_denom = self.it.kappa / self.it.tau
                - dot(&self.c, &self.dx1)
                - dot(&self.b, &self.dy1)
                - dot(&self.h, &self.dz1);
            let dtau_aff = (self.res.rt - self.it.kappa
                + dot(&self.c, &self.dx2)
                + dot(&self.b, &self.dy2)
                + dot(&self.h, &self.dz2))
                / dtau_denom;

            // dz_aff = dz2 + dtau_aff * dz1, scaled into W dz_aff, and
            // W \ ds_aff = -W dz_aff - lambda
            for i in 0..m {
                self.dz2[i] += dtau_aff * self.dz1[i];
            }
            self.cones.scale(&self.dz2, &mut self.w_times_dzaff);
            for i in 0..m {
                self.dsaff_by_w[i] = -self.w_times_dzaff[i] - self.it.lambda[i];
            }
            let dkap_aff = -self.it.kappa - self.it.kappa / self.it.tau * dtau_aff;

            let step_aff = predcorr::line_search(
                &self.cones,
                &self.it.lambda,
                &self.dsaff_by_w,
                &self.w_times_dzaff,
                self.it.tau,
                dtau_aff,
                self.it.kappa,
                dkap_aff,
                &stg,
            );
            self.info.step_aff = step_aff;

            let sigma = (1.0 - step_aff).powi(3).clamp(stg.sigmamin, stg.sigmamax);
            self.info.sigma = sigma;

            // Combined direction
            if !predcorr::rhs_combined(
                &mut self.rhs2,
                n,
                p,
                &self.cones,
                &self.it.lambda,
                &mut self.dsaff_by_w,
                &self.w_times_dzaff,
                &self.res.rz,
                sigma,
                self.info.mu,
                &mut self.ds1,
                &mut self.ds2,
            ) {
                status = SolveStatus::NumericalError;
                break;
            }
            self.info.nitref3 = self.kkt.solve(
                &self.rhs2,
                &self.g,
                &self.a,
                &self.cones,
                &stg,
                false,
                &mut self.dx2,
                &mut self.dy2,
                &mut self.dz2,
            );

            let bkap = self.it.kappa * self.it.tau + dkap_aff * dtau_aff - sigma * self.info.mu;
            let dtau = ((1.0 - sigma) * self.res.rt - bkap / self.it.tau
                + dot(&self.c, &self.dx2)
                + dot(&self.b, &self.dy2)
                + dot(&self.h, &self.dz2))
                / dtau_denom;

            for i in 0..n {
                self.dx2[i] += dtau * self.dx1[i];
            }
            for i in 0..p {
                self.dy2[i] += dtau * self.dy1[i];
            }
            for i in 0..m {
                self.dz2[i] += dtau * self.dz1[i];
            }

            // ds_by_w = -(lambda \ ds + W dz); dsaff_by_w holds lambda \ ds
            self.cones.scale(&self.dz2, &mut self.w_times_dzaff);
            for i in 0..m {
                self.dsaff_by_w[i] = -(self.dsaff_by_w[i] + self.w_times_dzaff[i]);
            }
            let dkap = -(bkap + self.it.kappa * dtau) / self.it.tau;

            let step = stg.gamma
                * predcorr::line_search(
                    &self.cones,
                    &self.it.lambda,
                    &self.dsaff_by_w,
                    &self.w_times_dzaff,
                    self.it.tau,
                    dtau,
                    self.it.kappa,
                    dkap,
                    &stg,
                );
            self.info.step = step;

            // ds back to unscaled form before the update
            self.cones.scale(&self.dsaff_by_w, &mut self.dsaff);

            let (dx2, dy2, dz2, dsaff) = (&self.dx2, &self.dy2, &self.dz2, &self.dsaff);
            self.it.advance(step, dx2, dy2, dz2, dsaff, dtau, dkap);
        }

        self.finish(status)
    }

    /// Restore the best iterate on failure, back-scale, and package the
    /// result.
    fn finish(&mut self, status: SolveStatus) -> Solution {
        if status == SolveStatus::NumericalError
            && self.best_info.pres.max(self.best_info.dres)
                < self.info.pres.max(self.info.dres)
        {
            self.it.copy_from(&self.best_it);
            self.info = self.best_info.clone();
        }

        self.backscale();

        if self.settings.verbose {
            println!("{}", "-".repeat(88));
            println!(
                "Status: {}  ({} iterations, pcost = {:.6e}, dcost = {:.6e})",
                status, self.info.iter, self.info.pcost, self.info.dcost
            );
        }

        Solution {
            status,
            x: self.it.x.clone(),
            y: self.it.y.clone(),
            z: self.it.z.clone(),
            s: self.it.s.clone(),
            tau: self.it.tau,
            kappa: self.it.kappa,
            info: self.info.clone(),
        }
    }

    /// De-equilibrate the iterate and divide by tau; c is restored to its
    /// original units so a later solve can re-scale it.
    fn backscale(&mut self) {
        let tau = self.it.tau;
        for i in 0..self.n {
            self.it.x[i] /= self.equil.x_equil[i] * tau;
        }
        for i in 0..self.p {
            self.it.y[i] /= self.equil.a_equil[i] * tau;
        }
        for i in 0..self.m {
            self.it.z[i] /= self.equil.g_equil[i] * tau;
        }
        for i in 0..self.m {
            self.it.s[i] = self.it.s[i] * self.equil.g_equil[i] / tau;
        }
        for i in 0..self.n {
            self.c[i] *= self.equil.x_equil[i];
        }
    }

    fn print_banner(&self) {
        println!("lorix SOCP solver");
        println!("=================");
        println!(
            "Problem: n = {}, p = {}, m = {} (lp = {}, socs = {})",
            self.n,
            self.p,
            self.m,
            self.cones.layout.lp_dim(),
            self.cones.layout.ncones()
        );
        println!(
            "{:>4} {:>12} {:>12} {:>10} {:>10} {:>10} {:>10} {:>10} {:>7} {:>7} {:>6}",
            "It", "pcost", "dcost", "gap", "pres", "dres", "k/t", "mu", "step", "sigma", "IR"
        );
        println!("{}", "-".repeat(88));
    }

    fn print_row(&self) {
        println!(
            "{:4} {:12.4e} {:12.4e} {:10.2e} {:10.2e} {:10.2e} {:10.2e} {:10.2e} {:7.4} {:7.4} {:>2}{:>2}{:>2}",
            self.info.iter,
            self.info.pcost,
            self.info.dcost,
            self.info.gap,
            self.info.pres,
            self.info.dres,
            self.info.kapovert,
            self.info.mu,
            self.info.step,
            self.info.sigma,
            self.info.nitref1,
            self.info.nitref2,
            self.info.nitref3,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse;

    fn quiet() -> Settings {
        Settings {
            verbose: false,
            ..Settings::default()
        }
    }

    #[test]
    fn test_solver_new_validates() {
        let g = sparse::from_triplets(2, 2, vec![(0, 0, -1.0), (1, 1, -1.0)]);
        let a = sparse::empty(0, 2);
        let bad = Solver::new(
            g,
            a,
            vec![1.0],
            vec![0.0, 0.0],
            vec![],
            vec![],
            quiet(),
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_tiny_lp_solves() {
        // min x1 + x2 s.t. x1 + x2 = 1, x >= 0
        let g = sparse::from_triplets(2, 2, vec![(0, 0, -1.0), (1, 1, -1.0)]);
        let a = sparse::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]);

        let mut solver = Solver::new(
            g,
            a,
            vec![1.0, 1.0],
            vec![0.0, 0.0],
            vec![1.0],
            vec![],
            quiet(),
        )
        .unwrap();
        let sol = solver.solve();

        assert_eq!(sol.status, SolveStatus::Optimal);
        let cost = sol.x[0] + sol.x[1];
        assert!((cost - 1.0).abs() < 1e-7, "cost = {}", cost);
        assert!(sol.x[0] > -1e-8 && sol.x[1] > -1e-8);
    }

    #[test]
    fn test_solution_satisfies_constraints_after_backscale() {
        // Same LP but with badly scaled data to exercise the equilibrator
        let g = sparse::from_triplets(2, 2, vec![(0, 0, -1000.0), (1, 1, -0.001)]);
        let a = sparse::from_triplets(1, 2, vec![(0, 0, 2000.0), (0, 1, 0.002)]);

        let mut solver = Solver::new(
            g,
            a,
            vec![1.0, 1.0],
            vec![0.0, 0.0],
            vec![1.0],
            vec![],
            quiet(),
        )
        .unwrap();
        let sol = solver.solve();

        assert_eq!(sol.status, SolveStatus::Optimal);
        // A x = b in original units
        let ax = 2000.0 * sol.x[0] + 0.002 * sol.x[1];
        assert!((ax - 1.0).abs() < 1e-6, "A x = {}", ax);
        // G x + s = h in original units
        let r0 = -1000.0 * sol.x[0] + sol.s[0];
        let r1 = -0.001 * sol.x[1] + sol.s[1];
        assert!(r0.abs() < 1e-6 && r1.abs() < 1e-6);
    }
}
