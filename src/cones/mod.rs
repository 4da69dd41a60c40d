//! Cone layout, algebra, and Nesterov-Todd scaling state.
//!
//! The cone K = R+^l x SOC(q_1) x ... x SOC(q_ncones) is represented as one
//! LP block at the head of the cone list followed by the second-order cone
//! blocks in declaration order. Blocks are plain records owned by value and
//! addressed by index; scaling updates take (s, z) slices.

pub mod lp;
pub mod soc;

pub use lp::LpBlock;
pub use soc::SocBlock;

/// Index map between the native m-dimensional cone space and the expanded
/// KKT z-block of size m + 2 * ncones (two expansion slots per SOC).
///
/// Fixed at setup time; every routine that reads or writes the z-block of a
/// KKT-sized vector goes through this schedule.
#[derive(Debug, Clone)]
pub struct ConeLayout {
    /// LP block dimension
    l: usize,
    /// SOC dimensions in declaration order
    soc_dims: Vec<usize>,
    /// Per-SOC offset into the native m-space
    native_off: Vec<usize>,
    /// Per-SOC offset into the expanded space
    expand_off: Vec<usize>,
}

impl ConeLayout {
    /// Build the layout for `l` LP rows followed by the given SOC dims.
    pub fn new(l: usize, soc_dims: Vec<usize>) -> Self {
        let mut native_off = Vec::with_capacity(soc_dims.len());
        let mut expand_off = Vec::with_capacity(soc_dims.len());
        let mut native = l;
        let mut expanded = l;
        for &q in &soc_dims {
            native_off.push(native);
            expand_off.push(expanded);
            native += q;
            expanded += q + 2;
        }
        Self {
            l,
            soc_dims,
            native_off,
            expand_off,
        }
    }

    /// LP block dimension.
    pub fn lp_dim(&self) -> usize {
        self.l
    }

    /// Number of second-order cones.
    pub fn ncones(&self) -> usize {
        self.soc_dims.len()
    }

    /// SOC dimensions.
    pub fn soc_dims(&self) -> &[usize] {
        &self.soc_dims
    }

    /// Native cone-space dimension m.
    pub fn m(&self) -> usize {
        self.l + self.soc_dims.iter().sum::<usize>()
    }

    /// Expanded dimension m + 2 * ncones.
    pub fn expanded(&self) -> usize {
        self.m() + 2 * self.ncones()
    }

    /// Cone degree l + ncones (each SOC counts once).
    pub fn degree(&self) -> usize {
        self.l + self.ncones()
    }

    /// Native offset of SOC `k`.
    pub fn soc_native(&self, k: usize) -> usize {
        self.native_off[k]
    }

    /// Expanded offset of SOC `k`. The v slot of cone k sits at
    /// `soc_expanded(k) + q_k`, the u slot right after it.
    pub fn soc_expanded(&self, k: usize) -> usize {
        self.expand_off[k]
    }

    /// Map every native row index to its position in the expanded space.
    pub fn expand_map(&self) -> Vec<usize> {
        let mut map = vec![0; self.m()];
        for (i, slot) in map.iter_mut().enumerate().take(self.l) {
            *slot = i;
        }
        for k in 0..self.ncones() {
            let q = self.soc_dims[k];
            let no = self.native_off[k];
            let eo = self.expand_off[k];
            for i in 0..q {
                map[no + i] = eo + i;
            }
        }
        map
    }

    /// Scatter a native vector into an expanded one, zeroing the expansion
    /// slots.
    pub fn expand_into(&self, native: &[f64], expanded: &mut [f64]) {
        debug_assert_eq!(native.len(), self.m());
        debug_assert_eq!(expanded.len(), self.expanded());

        expanded.fill(0.0);
        expanded[..self.l].copy_from_slice(&native[..self.l]);
        for k in 0..self.ncones() {
            let q = self.soc_dims[k];
            let no = self.native_off[k];
            let eo = self.expand_off[k];
            expanded[eo..eo + q].copy_from_slice(&native[no..no + q]);
        }
    }

    /// Gather the native entries of an expanded vector, skipping the
    /// expansion slots.
    pub fn contract_into(&self, expanded: &[f64], native: &mut [f64]) {
        debug_assert_eq!(expanded.len(), self.expanded());
        debug_assert_eq!(native.len(), self.m());

        native[..self.l].copy_from_slice(&expanded[..self.l]);
        for k in 0..self.ncones() {
            let q = self.soc_dims[k];
            let no = self.native_off[k];
            let eo = self.expand_off[k];
            native[no..no + q].copy_from_slice(&expanded[eo..eo + q]);
        }
    }
}

/// The cone list: one LP block plus the SOC blocks, with their layout.
#[derive(Debug, Clone)]
pub struct ConeSet {
    /// Index schedule shared with the KKT assembler
    pub layout: ConeLayout,
    /// LP scaling block
    pub lp: LpBlock,
    /// SOC scaling blocks in declaration order
    pub socs: Vec<SocBlock>,
}

impl ConeSet {
    /// Build the cone set for `l` LP rows and the given SOC dimensions.
    pub fn new(l: usize, soc_dims: Vec<usize>) -> Self {
        let socs = soc_dims.iter().map(|&q| SocBlock::new(q)).collect();
        let layout = ConeLayout::new(l, soc_dims);
        Self {
            layout,
            lp: LpBlock::new(l),
            socs,
        }
    }

    /// Update every scaling block from (s, z) and recompute lambda = W * z.
    ///
    /// Returns false as soon as any block reports that its iterate has left
    /// the cone, which the caller must treat as a failed iteration.
    pub fn update_scalings(&mut self, s: &[f64], z: &[f64], lambda: &mut [f64]) -> bool {
        let l = self.layout.lp_dim();
        if !self.lp.update(&s[..l], &z[..l]) {
            return false;
        }
        for (k, soc) in self.socs.iter_mut().enumerate() {
            let o = self.layout.soc_native(k);
            let q = soc.dim();
            if !soc.update(&s[o..o + q], &z[o..o + q]) {
                return false;
            }
        }
        self.scale(z, lambda);
        true
    }

    /// lambda = W * z over the whole native cone space.
    pub fn scale(&self, z: &[f64], lambda: &mut [f64]) {
        let l = self.layout.lp_dim();
        self.lp.scale(&z[..l], &mut lambda[..l]);
        for (k, soc) in self.socs.iter().enumerate() {
            let o = self.layout.soc_native(k);
            let q = soc.dim();
            soc.scale(&z[o..o + q], &mut lambda[o..o + q]);
        }
    }

    /// y += V * x over the expanded space, where V is the scaling block of
    /// the KKT matrix (W^2 in arrow form per SOC, diagonal on the LP part).
    pub fn scale2_add_expanded(&self, x: &[f64], y: &mut [f64]) {
        let l = self.layout.lp_dim();
        self.lp.scale2_add(&x[..l], &mut y[..l]);
        for (k, soc) in self.socs.iter().enumerate() {
            let o = self.layout.soc_expanded(k);
            let q = soc.dim();
            soc.scale2_add(&x[o..o + q + 2], &mut y[o..o + q + 2]);
        }
    }

    /// Conic product out = u o v.
    pub fn product(&self, u: &[f64], v: &[f64], out: &mut [f64]) {
        let l = self.layout.lp_dim();
        for i in 0..l {
            out[i] = u[i] * v[i];
        }
        for (k, soc) in self.socs.iter().enumerate() {
            let o = self.layout.soc_native(k);
            let q = soc.dim();
            out[o] = u[o..o + q]
                .iter()
                .zip(&v[o..o + q])
                .map(|(a, b)| a * b)
                .sum();
            for i in 1..q {
                out[o + i] = u[o] * v[o + i] + v[o] * u[o + i];
            }
        }
    }

    /// Conic division out = u \ w.
    ///
    /// Returns false when a SOC factor u is not in the cone interior
    /// (u0^2 - ||u1||^2 <= 0).
    pub fn division(&self, u: &[f64], w: &[f64], out: &mut [f64]) -> bool {
        let l = self.layout.lp_dim();
        for i in 0..l {
            out[i] = w[i] / u[i];
        }
        for (k, soc) in self.socs.iter().enumerate() {
            let o = self.layout.soc_native(k);
            let q = soc.dim();

            let rho = SocBlock::residual(&u[o..o + q]);
            if rho <= 0.0 {
                return false;
            }
            let zeta: f64 = u[o + 1..o + q]
                .iter()
                .zip(&w[o + 1..o + q])
                .map(|(a, b)| a * b)
                .sum();
            out[o] = (u[o] * w[o] - zeta) / rho;
            let factor = (zeta / u[o] - w[o]) / rho;
            for i in 1..q {
                out[o + i] = factor * u[o + i] + w[o + i] / u[o];
            }
        }
        true
    }

    /// Shift a point into the cone interior.
    ///
    /// Computes alpha = max(-gamma, worst LP violation, worst SOC residual
    /// violation); a strictly interior point (alpha < 0) is left untouched,
    /// otherwise (1 + alpha) is added along the cone identity e (one per LP
    /// coordinate, the head of each SOC). Boundary points thereby get a
    /// unit push into the interior.
    pub fn bring_to_cone(&self, r: &mut [f64], gamma: f64) {
        let l = self.layout.lp_dim();
        let mut alpha = -gamma;

        for &ri in &r[..l] {
            if ri <= 0.0 && -ri > alpha {
                alpha = -ri;
            }
        }
        for (k, soc) in self.socs.iter().enumerate() {
            let o = self.layout.soc_native(k);
            let q = soc.dim();
            let tail: f64 = r[o + 1..o + q].iter().map(|x| x * x).sum::<f64>().sqrt();
            let cres = r[o] - tail;
            if cres <= 0.0 && -cres > alpha {
                alpha = -cres;
            }
        }

        if alpha >= 0.0 {
            let shift = 1.0 + alpha;
            for ri in &mut r[..l] {
                *ri += shift;
            }
            for k in 0..self.socs.len() {
                r[self.layout.soc_native(k)] += shift;
            }
        }
    }
}
