//! Second-order (Lorentz) cone block.
//!
//! SOC(q) = {(u0, u1) in R x R^{q-1} : u0 >= ||u1||_2}. Each block carries
//! the Nesterov-Todd scaling state for its rows of (s, z): the scaled point
//! is derived from the normalized pair (s/sqrt(sres), z/sqrt(zres)) and the
//! scaling matrix is kept in the factored "arrow" form
//!
//!   W^2 = eta^2 * [ D   v   u  ]
//!                 [ v'  1   0  ]
//!                 [ u'  0  -1  ]
//!
//! with D = diag(d1, 1, ..., 1), v = v1 * q (head entry zero) and
//! u = [u0; u1 * q]. The two extra rows/columns are the expansion slots the
//! KKT matrix reserves per cone, so that W^2 stays sparse regardless of q.

/// Scaling state of one second-order cone.
#[derive(Debug, Clone)]
pub struct SocBlock {
    dim: usize,

    /// eta = (sres / zres)^(1/4)
    pub eta: f64,
    /// eta^2 = sqrt(sres) / sqrt(zres)
    pub eta_sq: f64,
    /// Head of the normalized NT point
    pub a: f64,
    /// ||q||^2
    pub w: f64,
    /// First diagonal entry of D
    pub d1: f64,
    /// Head of the u column
    pub u0: f64,
    /// Tail multiplier of the u column
    pub u1: f64,
    /// Tail multiplier of the v column
    pub v1: f64,
    /// Tail of the normalized NT point, length dim - 1
    pub q: Vec<f64>,

    // Normalization scratch, kept allocated across iterations
    skbar: Vec<f64>,
    zkbar: Vec<f64>,
}

impl SocBlock {
    /// Create a cone of dimension `dim` (dim >= 1) with identity scaling.
    pub fn new(dim: usize) -> Self {
        assert!(dim >= 1, "second-order cone must have dimension >= 1");
        Self {
            dim,
            eta: 1.0,
            eta_sq: 1.0,
            a: 1.0,
            w: 0.0,
            d1: 1.0,
            u0: 0.0,
            u1: 0.0,
            v1: 0.0,
            q: vec![0.0; dim - 1],
            skbar: vec![0.0; dim],
            zkbar: vec![0.0; dim],
        }
    }

    /// Cone dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Cone residual u0^2 - ||u1||^2 of a point restricted to this cone.
    #[inline]
    pub fn residual(u: &[f64]) -> f64 {
        let tail: f64 = u[1..].iter().map(|x| x * x).sum();
        u[0] * u[0] - tail
    }

    /// Update the Nesterov-Todd scaling from the (s, z) slices of this cone.
    ///
    /// Returns false when either point has a non-positive cone residual or
    /// when the derived quantity c^2/u0^2 - d is non-positive; the caller
    /// must then abort the iteration.
    pub fn update(&mut self, s: &[f64], z: &[f64]) -> bool {
        debug_assert_eq!(s.len(), self.dim);
        debug_assert_eq!(z.len(), self.dim);

        let sres = Self::residual(s);
        let zres = Self::residual(z);
        if sres <= 0.0 || zres <= 0.0 {
            return false;
        }

        let snorm = sres.sqrt();
        let znorm = zres.sqrt();
        for i in 0..self.dim {
            self.skbar[i] = s[i] / snorm;
            self.zkbar[i] = z[i] / znorm;
        }

        self.eta_sq = snorm / znorm;
        self.eta = self.eta_sq.sqrt();

        // Normalized NT scaling point
        let sz: f64 = self
            .skbar
            .iter()
            .zip(self.zkbar.iter())
            .map(|(a, b)| a * b)
            .sum();
        let gamma = (0.5 * (1.0 + sz)).sqrt();

        let a = (0.5 / gamma) * (self.skbar[0] + self.zkbar[0]);
        for i in 0..self.dim - 1 {
            self.q[i] = (0.5 / gamma) * (self.skbar[i + 1] - self.zkbar[i + 1]);
        }
        let w: f64 = self.q.iter().map(|x| x * x).sum();

        // Arrow factorization of W^2
        let c = (1.0 + a) + w / (1.0 + a);
        let d = 1.0 + 2.0 / (1.0 + a) + w / ((1.0 + a) * (1.0 + a));

        let d1 = (0.5 * (a * a + w * (1.0 - (c * c) / (1.0 + w * d)))).max(0.0);
        let u0_sq = a * a + w - d1;
        let u0 = u0_sq.sqrt();

        let c2byu02 = (c * c) / u0_sq;
        if c2byu02 - d <= 0.0 {
            return false;
        }

        self.a = a;
        self.w = w;
        self.d1 = d1;
        self.u0 = u0;
        self.u1 = c / u0;
        self.v1 = (c2byu02 - d).sqrt();

        true
    }

    /// lambda = W * z restricted to this cone.
    ///
    /// Uses the compact form of W: with zeta = q' * z1 and
    /// f = z0 + zeta / (1 + a),
    ///   lambda0 = eta * (a * z0 + zeta)
    ///   lambda1 = eta * (z1 + f * q)
    pub fn scale(&self, z: &[f64], lambda: &mut [f64]) {
        debug_assert_eq!(z.len(), self.dim);
        debug_assert_eq!(lambda.len(), self.dim);

        let zeta: f64 = self.q.iter().zip(&z[1..]).map(|(qi, zi)| qi * zi).sum();
        let f = z[0] + zeta / (1.0 + self.a);

        lambda[0] = self.eta * (self.a * z[0] + zeta);
        for i in 1..self.dim {
            lambda[i] = self.eta * (z[i] + f * self.q[i - 1]);
        }
    }

    /// y += W^2 * x on the expanded (dim + 2) slice of this cone.
    ///
    /// Fast arrow multiply; x and y cover the cone's native entries followed
    /// by its v and u expansion slots.
    pub fn scale2_add(&self, x: &[f64], y: &mut [f64]) {
        debug_assert_eq!(x.len(), self.dim + 2);
        debug_assert_eq!(y.len(), self.dim + 2);

        let q = self.dim;
        let qtx: f64 = self.q.iter().zip(&x[1..q]).map(|(qi, xi)| qi * xi).sum();

        y[0] += self.eta_sq * (self.d1 * x[0] + self.u0 * x[q + 1]);
        let tail_mult = self.v1 * x[q] + self.u1 * x[q + 1];
        for i in 1..q {
            y[i] += self.eta_sq * (x[i] + tail_mult * self.q[i - 1]);
        }
        y[q] += self.eta_sq * (self.v1 * qtx + x[q]);
        y[q + 1] += self.eta_sq * (self.u0 * x[0] + self.u1 * qtx - x[q + 1]);
    }

    /// Explicit W^2 * x on the native dim-slice, for testing against the
    /// fast arrow form. Applies the scaling twice through `scale`-style
    /// compact multiplication.
    #[cfg(test)]
    pub fn scale_twice(&self, x: &[f64]) -> Vec<f64> {
        let mut once = vec![0.0; self.dim];
        let mut twice = vec![0.0; self.dim];
        self.scale(x, &mut once);
        self.scale(&once, &mut twice);
        twice
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_residual() {
        // (3, 1, 2): 9 - 5 = 4
        assert!((SocBlock::residual(&[3.0, 1.0, 2.0]) - 4.0).abs() < 1e-12);
        // boundary point
        assert!(SocBlock::residual(&[5.0, 3.0, 4.0]).abs() < 1e-12);
    }

    #[test]
    fn test_update_rejects_exterior() {
        let mut soc = SocBlock::new(3);
        assert!(!soc.update(&[1.0, 2.0, 0.0], &[2.0, 0.0, 0.0]));
        assert!(!soc.update(&[2.0, 0.0, 0.0], &[1.0, 2.0, 0.0]));
    }

    #[test]
    fn test_update_identical_points() {
        // With s = z the scaling is the identity on the cone: eta = 1 and
        // lambda = W z = z.
        let mut soc = SocBlock::new(3);
        let s = [2.0, 0.5, 0.5];
        assert!(soc.update(&s, &s));

        assert!((soc.eta - 1.0).abs() < 1e-12);

        let mut lambda = [0.0; 3];
        soc.scale(&s, &mut lambda);
        for i in 0..3 {
            assert!((lambda[i] - s[i]).abs() < 1e-10, "lambda[{}] = {}", i, lambda[i]);
        }
    }

    #[test]
    fn test_scale_preserves_sz_inner_product() {
        // lambda = W z must satisfy lambda' * lambda = s' * z
        let mut soc = SocBlock::new(4);
        let s = [5.0, 1.0, 2.0, 1.0];
        let z = [3.0, -1.0, 0.5, 1.0];
        assert!(soc.update(&s, &z));

        let mut lambda = [0.0; 4];
        soc.scale(&z, &mut lambda);

        let lsq = dot(&lambda, &lambda);
        let sz = dot(&s, &z);
        assert!(
            (lsq - sz).abs() < 1e-10 * sz.abs().max(1.0),
            "lambda'lambda = {}, s'z = {}",
            lsq,
            sz
        );
    }

    #[test]
    fn test_scale_squared_maps_z_to_s() {
        // The defining NT property: W^2 z = s.
        let mut soc = SocBlock::new(3);
        let s = [4.0, 1.0, -0.5];
        let z = [2.0, 0.3, 0.8];
        assert!(soc.update(&s, &z));

        let wsq_z = soc.scale_twice(&z);
        for i in 0..3 {
            assert!(
                (wsq_z[i] - s[i]).abs() < 1e-10 * s[i].abs().max(1.0),
                "W^2 z [{}] = {}, s = {}",
                i,
                wsq_z[i],
                s[i]
            );
        }
    }

    #[test]
    fn test_arrow_multiply_matches_scale_twice() {
        // The fast arrow multiply restricted to the native entries, with
        // zero expansion inputs and the rank-two correction folded back in,
        // must agree with applying W twice.
        let mut soc = SocBlock::new(4);
        let s = [6.0, 1.0, 2.0, -1.0];
        let z = [4.0, -0.5, 1.0, 0.5];
        assert!(soc.update(&s, &z));

        let x = [1.0, 2.0, -1.0, 0.5];
        let direct = soc.scale_twice(&x);

        // Arrow form: the expanded system [D v u; v' 1 0; u' 0 -1] applied to
        // [x; xv; xu] reproduces W^2 x on the native block once the expansion
        // components xv, xu are eliminated:
        //   xv = -v' x1,  xu = u' x  (from rows q and q+1 set to zero output)
        let q = 4;
        let mut ext = vec![0.0; q + 2];
        ext[..q].copy_from_slice(&x);

        // Solve the two expansion rows for xv, xu so their outputs vanish
        let qtx: f64 = soc.q.iter().zip(&x[1..]).map(|(a, b)| a * b).sum();
        ext[q] = -soc.v1 * qtx;
        ext[q + 1] = soc.u0 * x[0] + soc.u1 * qtx;

        let mut out = vec![0.0; q + 2];
        soc.scale2_add(&ext, &mut out);

        for i in 0..q {
            assert!(
                (out[i] - direct[i]).abs() < 1e-10 * direct[i].abs().max(1.0),
                "arrow[{}] = {}, direct = {}",
                i,
                out[i],
                direct[i]
            );
        }
        // Expansion rows were chosen to produce zero output
        assert!(out[q].abs() < 1e-10);
        assert!(out[q + 1].abs() < 1e-10);
    }

    #[test]
    fn test_soc_dim_two() {
        // SOC(2) is the two-variable wedge u0 >= |u1|
        let mut soc = SocBlock::new(2);
        assert!(soc.update(&[2.0, 1.0], &[3.0, -1.0]));

        let mut lambda = [0.0; 2];
        soc.scale(&[3.0, -1.0], &mut lambda);
        let sz = 2.0 * 3.0 + 1.0 * -1.0;
        assert!((dot(&lambda, &lambda) - sz).abs() < 1e-10);
    }
}
