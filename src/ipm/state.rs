//! Iterate state of the homogeneous self-dual embedding.
//!
//! The embedding lifts the primal-dual pair into (x, y, z, s, tau, kappa)
//! so that optimality, primal infeasibility, and dual infeasibility are all
//! detected from the same iteration through the tau/kappa ratio. The scaled
//! variable lambda = W * z is kept alongside because the line search and the
//! corrector right-hand side work in scaled coordinates.

/// Mutable iterate of the interior-point method. One copy per solver,
/// allocated at construction and reused every iteration.
#[derive(Debug, Clone)]
pub struct Iterate {
    /// Primal variables, length n
    pub x: Vec<f64>,
    /// Equality multipliers, length p
    pub y: Vec<f64>,
    /// Cone multipliers, length m
    pub z: Vec<f64>,
    /// Cone slacks, length m
    pub s: Vec<f64>,
    /// Scaled variable W * z, length m
    pub lambda: Vec<f64>,
    /// Homogeneous embedding scalar, positive throughout
    pub tau: f64,
    /// Homogeneous embedding scalar, positive throughout
    pub kappa: f64,
}

impl Iterate {
    /// Zero iterate with tau = kappa = 1.
    pub fn new(n: usize, p: usize, m: usize) -> Self {
        Self {
            x: vec![0.0; n],
            y: vec![0.0; p],
            z: vec![0.0; m],
            s: vec![0.0; m],
            lambda: vec![0.0; m],
            tau: 1.0,
            kappa: 1.0,
        }
    }

    /// Copy another iterate of the same dimensions into this one without
    /// reallocating.
    pub fn copy_from(&mut self, other: &Iterate) {
        self.x.copy_from_slice(&other.x);
        self.y.copy_from_slice(&other.y);
        self.z.copy_from_slice(&other.z);
        self.s.copy_from_slice(&other.s);
        self.lambda.copy_from_slice(&other.lambda);
        self.tau = other.tau;
        self.kappa = other.kappa;
    }

    /// Advance along a direction by step length alpha.
    #[allow(clippy::too_many_arguments)]
    pub fn advance(
        &mut self,
        alpha: f64,
        dx: &[f64],
        dy: &[f64],
        dz: &[f64],
        ds: &[f64],
        dtau: f64,
        dkappa: f64,
    ) {
        for (xi, di) in self.x.iter_mut().zip(dx) {
            *xi += alpha * di;
        }
        for (yi, di) in self.y.iter_mut().zip(dy) {
            *yi += alpha * di;
        }
        for (zi, di) in self.z.iter_mut().zip(dz) {
            *zi += alpha * di;
        }
        for (si, di) in self.s.iter_mut().zip(ds) {
            *si += alpha * di;
        }
        self.tau += alpha * dtau;
        self.kappa += alpha * dkappa;
    }
}
