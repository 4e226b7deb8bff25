//! # Bounds: Hunter and Lagrange Limits per Level
//!
//! Maintains lower and upper bounds on the coefficient a_d and the power sum
//! s_d for every level that is not yet fixed. Bounds are recomputed each time
//! a level's value is set; they are always overwritten, never intersected
//! with the result from an earlier branch, since backtracking may require
//! them to widen again.
//!
//! ## Hunter's Bound
//!
//! With T_2 = sum |alpha_i|^2 over the roots,
//! `T_2 <= t_2 = a_1^2 / n + C_n(D)` where C_n is the degree-specific
//! bound constant (see [`Degree::bound_constant`]).
//!
//! ## Lagrange Bounds
//!
//! Fixing a_1 and a_n, the extremal values of the power sums under the T_2
//! constraint are attained where `m` roots share one modulus z and `n - m`
//! share another. For each m = 1..n-1 the modulus solves
//!
//! ```text
//! m z^(m-n) + (n-m) z^m = r,    r = t_2 / |a_n|^(2/n)
//! ```
//!
//! (Newton iteration from z_0 = (m/r)^(1/(n-m)) down to |delta| <= 1e-5).
//! From the roots:
//!
//! - `|s_k| <= max_m (m z^(k(m-n)/2) + (n-m) z^(km/2)) * |a_n|^(k/n)`, k = 3..n-1
//! - the same with k = -1, -2 bounds `|a_n s_-1| = |a_{n-1}|` and `|a_n^2 s_-2|`.
//!
//! The Lagrange vector is cached on (a_1, a_n).
//!
//! ## Evaluation Envelopes
//!
//! `|f(k)| <= ((n k^2 - 2 k s_1 + t_2) / n)^(n/2)` for k in {-1, 0, 1} bounds
//! a_n (k = 0) and the coefficient sum and alternating sum that close over
//! a_{n-1} (k = 1, -1).

use crate::arith::{div_ceil, div_floor};
use crate::degree::{degree_of, level_of, Degree};
use crate::stats::PhaseStat;
use std::marker::PhantomData;
use std::time::Instant;
use tracing::warn;

const NEWTON_EPS: f64 = 1e-5;
const NEWTON_MAX_ITER: usize = 100;

/// Saturating conversion of a float bound to an integer bound.
#[inline]
fn floor_i64(x: f64) -> i64 {
    x.floor() as i64
}

#[inline]
fn ceil_i64(x: f64) -> i64 {
    x.ceil() as i64
}

#[inline]
fn clamp_i128(x: i128) -> i64 {
    x.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

pub struct BoundGenerator<D: Degree> {
    discriminant: i64,
    t2: f64,
    t2_a1: Option<i64>,
    lagrange_key: Option<(i64, i64)>,
    /// L_k bounds |s_k| for k = 0..n-1.
    lagrange: Vec<i64>,
    /// Index 1 bounds |a_n s_-1|, index 2 bounds |a_n^2 s_-2|.
    lagrange_neg: [i64; 3],
    /// `eval_bounds[k + 1]` bounds |f(k)|.
    eval_bounds: [i64; 3],
    bound_last: i64,
    avalues: Vec<i64>,
    svalues: Vec<i64>,
    alower: Vec<i64>,
    aupper: Vec<i64>,
    slower: Vec<i64>,
    supper: Vec<i64>,
    coeff_sums: Vec<i64>,
    alt_coeff_sums: Vec<i64>,
    timed: bool,
    lagrange_stat: PhaseStat,
    _degree: PhantomData<D>,
}

impl<D: Degree> BoundGenerator<D> {
    pub fn new(discriminant: i64) -> Self {
        let n = D::N;
        let half = (n / 2) as i64;
        let mut b = BoundGenerator {
            discriminant,
            t2: D::bound_constant(discriminant as f64),
            t2_a1: None,
            lagrange_key: None,
            lagrange: vec![0; n],
            lagrange_neg: [n as i64, 0, 0],
            eval_bounds: [0; 3],
            bound_last: 0,
            avalues: vec![0; n + 1],
            svalues: vec![0; n + 1],
            alower: vec![i64::MIN; n + 1],
            aupper: vec![i64::MAX; n + 1],
            slower: vec![i64::MIN; n + 1],
            supper: vec![i64::MAX; n + 1],
            coeff_sums: vec![0; n + 1],
            alt_coeff_sums: vec![0; n + 1],
            timed: false,
            lagrange_stat: PhaseStat::default(),
            _degree: PhantomData,
        };
        b.avalues[0] = 1;
        b.svalues[0] = n as i64;
        b.alower[1] = 0;
        b.aupper[1] = half;
        b.slower[1] = -half;
        b.supper[1] = 0;
        b.coeff_sums[0] = 1;
        b.alt_coeff_sums[0] = if n % 2 == 0 { 1 } else { -1 };
        b
    }

    /// Record Lagrange recomputation times into [`Self::lagrange_stat`].
    pub fn with_timing(mut self, timed: bool) -> Self {
        self.timed = timed;
        self
    }

    pub fn discriminant(&self) -> i64 {
        self.discriminant
    }

    pub fn a_lower(&self, level: usize) -> i64 {
        self.alower[level]
    }

    pub fn a_upper(&self, level: usize) -> i64 {
        self.aupper[level]
    }

    pub fn s_lower(&self, level: usize) -> i64 {
        self.slower[level]
    }

    pub fn s_upper(&self, level: usize) -> i64 {
        self.supper[level]
    }

    /// Current Hunter bound on T_2.
    pub fn t2(&self) -> f64 {
        self.t2
    }

    pub fn lagrange_bound(&self, k: usize) -> i64 {
        self.lagrange[k]
    }

    pub fn lagrange_neg_bound(&self, k: usize) -> i64 {
        self.lagrange_neg[k]
    }

    /// Bound on |f(k)| for k in {-1, 0, 1}.
    pub fn eval_bound(&self, k: i64) -> i64 {
        self.eval_bounds[(k + 1) as usize]
    }

    pub fn lagrange_stat(&mut self) -> &mut PhaseStat {
        &mut self.lagrange_stat
    }

    /// Record the values of a level and recompute every bound that depends
    /// on them.
    pub fn set_values(&mut self, level: usize, a: i64, s: i64) {
        let n = D::N;
        let deg = degree_of(n, level);

        self.coeff_sums[level] = self.coeff_sums[level - 1] + a;
        let sign = if (n - deg) % 2 == 0 { 1 } else { -1 };
        self.alt_coeff_sums[level] = self.alt_coeff_sums[level - 1] + sign * a;

        self.avalues[level] = a;
        self.svalues[level] = s;

        if deg == 1 && self.t2_a1 != Some(a) {
            self.t2_a1 = Some(a);
            self.t2 = (a as f64) * (a as f64) / n as f64 + D::bound_constant(self.discriminant as f64);
        }

        if deg == n {
            let started = self.timed.then(Instant::now);
            self.compute_lagrange_bounds();
            if let Some(started) = started {
                self.lagrange_stat.record_since(started);
            }
        }

        self.update_bounds(level);
    }

    /// Solve `m z^(m-n) + (n-m) z^m = r` for z by Newton iteration.
    ///
    /// Returns the interval `(lo, hi)` holding the root: a single point on
    /// convergence. If an iterate leaves (0, inf) or the iteration does not
    /// settle, falls back to the bracket implied by each term being at most
    /// r, `z^(m-n) <= r/m` and `z^m <= r/(n-m)`.
    fn lagrange_root(n: usize, m: usize, r: f64) -> (f64, f64) {
        let (nf, mf) = (n as f64, m as f64);
        let start = (mf / r).powf(1.0 / (nf - mf));
        let mut z = start;
        for _ in 0..NEWTON_MAX_ITER {
            let rz = mf * z.powf(mf - nf) + (nf - mf) * z.powf(mf);
            let drz = (mf - nf) * mf * (z.powf(mf - nf - 1.0) - z.powf(mf - 1.0));
            let delta = (rz - r) / drz;
            z -= delta;
            if !(z.is_finite() && z > 0.0) {
                break;
            }
            if delta.abs() <= NEWTON_EPS {
                return (z, z);
            }
        }
        let other = (r / (nf - mf)).powf(1.0 / mf);
        warn!(n, m, r, z, "Lagrange root did not converge, using its bracket");
        (start.min(other), start.max(other))
    }

    /// Max over the Lagrange roots of `m z^(k(m-n)/2) + (n-m) z^(km/2)`,
    /// each power taken at whichever end of the root interval is larger.
    fn lagrange_extremum(n: usize, roots: &[(f64, f64)], k: f64) -> f64 {
        let nf = n as f64;
        roots
            .iter()
            .enumerate()
            .map(|(i, &(lo, hi))| {
                let mf = (i + 1) as f64;
                let (e1, e2) = (k * (mf - nf) / 2.0, k * mf / 2.0);
                mf * lo.powf(e1).max(hi.powf(e1)) + (nf - mf) * lo.powf(e2).max(hi.powf(e2))
            })
            .fold(0.0, f64::max)
    }

    fn compute_lagrange_bounds(&mut self) {
        let n = D::N;
        let key = (self.avalues[1], self.avalues[2]);
        if self.lagrange_key == Some(key) {
            return;
        }
        self.lagrange_key = Some(key);

        let an = (key.1 as f64).abs();
        self.lagrange[0] = n as i64;
        self.lagrange[1] = self.svalues[1].abs();
        self.lagrange[2] = floor_i64(self.t2);
        if an == 0.0 {
            for k in 3..n {
                self.lagrange[k] = 0;
            }
            self.lagrange_neg[1] = 0;
            self.lagrange_neg[2] = 0;
            return;
        }

        let r = self.t2 / an.powf(2.0 / n as f64);
        let roots: Vec<(f64, f64)> = (1..n).map(|m| Self::lagrange_root(n, m, r)).collect();

        for k in 3..n {
            let t = Self::lagrange_extremum(n, &roots, k as f64) * an.powf(k as f64 / n as f64);
            self.lagrange[k] = floor_i64(t);
        }
        for k in 1..=2usize {
            let kf = -(k as f64);
            let t = Self::lagrange_extremum(n, &roots, kf) * an.powf(k as f64) * an.powf(kf / n as f64);
            self.lagrange_neg[k] = floor_i64(t);
        }
    }

    fn update_bounds(&mut self, level: usize) {
        let n = D::N;
        let nl = n as i64;
        let deg = degree_of(n, level);
        let idx = |d: usize| level_of(n, d);

        if deg == 1 {
            let s1 = self.svalues[1] as f64;
            for k in -1i64..=1 {
                let kf = k as f64;
                let base = (nl as f64 * kf * kf - 2.0 * kf * s1 + self.t2) / nl as f64;
                self.eval_bounds[(k + 1) as usize] = floor_i64(base.max(0.0).powf(nl as f64 / 2.0));
            }
            // |a_n| <= (t_2 / n)^(n/2)
            self.alower[idx(n)] = -self.eval_bounds[1];
            self.aupper[idx(n)] = self.eval_bounds[1];
            return;
        }

        if deg == n {
            for d in 2..n {
                let upp = self.lagrange[d];
                self.slower[idx(d)] = -upp;
                self.supper[idx(d)] = upp;
                self.alower[idx(d)] = i64::MIN;
                self.aupper[idx(d)] = i64::MAX;
            }

            // (2/n) s_1^2 - t_2 <= s_2
            let s1 = self.svalues[1] as f64;
            self.slower[idx(2)] = ceil_i64(2.0 / nl as f64 * s1 * s1 - self.t2).max(self.slower[idx(2)]);

            // s_1 = 0: by symmetry x -> -x take s_3 >= 0
            if self.svalues[1] == 0 {
                self.slower[idx(3)] = 0;
            }

            // 2 a_{n-2} a_n >= -a_n^2 s_-2
            let an = self.avalues[idx(n)];
            let b = self.lagrange_neg[2] as f64;
            if an > 0 {
                self.alower[idx(n - 2)] = ceil_i64(-b / (2.0 * an as f64));
            } else if an < 0 {
                self.aupper[idx(n - 2)] = floor_i64(-b / (2.0 * an as f64));
            }

            // |a_{n-1}| <= n (t_2/(n-1))^((n-1)/2) and |a_{n-1}| = |a_n s_-1|
            let hunter = floor_i64(nl as f64 * (self.t2 / (nl - 1) as f64).powf((nl - 1) as f64 / 2.0));
            self.bound_last = self.lagrange_neg[1].min(hunter);
            return;
        }

        if deg == 3 {
            // s_4 >= 2 s_3^2 / (t_2 + s_2) - (t_2 - s_2)^2
            let base = -self.lagrange[4];
            let s2 = self.svalues[idx(2)] as f64;
            let s3 = self.svalues[idx(3)] as f64;
            let denom = self.t2 + s2;
            self.slower[idx(4)] = if denom > 0.0 {
                let diff = self.t2 - s2;
                base.max(ceil_i64(2.0 * s3 * s3 / denom - diff * diff))
            } else {
                base
            };
        }

        if deg == n - 2 {
            self.update_last_bounds(level);
        }
    }

    /// Bounds for a_{n-1}, once a_1, a_n, a_2, ..., a_{n-2} are known.
    fn update_last_bounds(&mut self, level: usize) {
        let n = D::N;
        let idx = |d: usize| level_of(n, d);
        let last = idx(n - 1);

        // (n-1) a_{n-1} = -(s_{n-1} + sum_{i=1}^{n-2} a_i s_{n-1-i})
        let mut newton: i128 = 0;
        for i in 1..n - 1 {
            newton += self.avalues[idx(i)] as i128 * self.svalues[idx(n - 1 - i)] as i128;
        }
        let div = (n - 1) as i64;
        let hi_num = clamp_i128(-newton - self.slower[last] as i128);
        let lo_num = clamp_i128(-newton - self.supper[last] as i128);
        let mut alow = div_ceil(lo_num, div);
        let mut aupp = div_floor(hi_num, div);

        alow = alow.max(-self.bound_last);
        aupp = aupp.min(self.bound_last);

        // a_{n-1}^2 = 2 a_{n-2} a_n + a_n^2 s_-2
        let radicand = 2i128 * self.avalues[idx(n - 2)] as i128 * self.avalues[idx(n)] as i128
            + self.lagrange_neg[2] as i128;
        let b = floor_i64((radicand.max(0) as f64).sqrt());
        alow = alow.max(-b);
        aupp = aupp.min(b);

        // |f(1)| = |sum + a_{n-1}| <= E_1
        let sum = self.coeff_sums[level];
        let e1 = self.eval_bounds[2];
        alow = alow.max(-sum.saturating_add(e1));
        aupp = aupp.min(e1.saturating_sub(sum));

        // |f(-1)| = |alt - a_{n-1}| <= E_-1
        let alt = self.alt_coeff_sums[level];
        let em1 = self.eval_bounds[0];
        alow = alow.max(alt.saturating_sub(em1));
        aupp = aupp.min(alt.saturating_add(em1));

        self.alower[last] = alow;
        self.aupper[last] = aupp;
    }
}
