//! # Levels: Coefficient and Power-Sum State with Divisor Stepping
//!
//! Shared by the full and the simple generator. Owns the coefficient vector
//! `a`, the power-sum vector `s` (both in level order) and the bound
//! generator, and implements the three value transitions of a level:
//!
//! - `set_value`: place the smallest admissible native value >= the input.
//! - `init_value`: place the lowest admissible value under the current bounds.
//! - `increase_value`: step to the next admissible value.
//!
//! The native value of level 2 is a_n itself, stepped in multiples of its
//! divisor (0 skipped). Every other level enumerates its power sum s_d, and
//! a_d follows from Newton's identity
//!
//! ```text
//! d a_d = -(s_d + sum_{i<d} a_i s_{d-i})
//! ```
//!
//! so a step of `-divisor` on a_d is a step of `+d * divisor` on s_d.

use crate::arith::modulo;
use crate::bounds::BoundGenerator;
use crate::degree::{degree_of, level_of, Degree};

pub struct LevelState<D: Degree> {
    avalues: Vec<i64>,
    svalues: Vec<i64>,
    divisors: Vec<i64>,
    bounds: BoundGenerator<D>,
}

impl<D: Degree> LevelState<D> {
    /// `divisors` is in level order with `divisors[0] = 1`.
    pub fn new(divisors: Vec<i64>, discriminant: i64, timed: bool) -> Self {
        let n = D::N;
        let mut avalues = vec![0; n + 1];
        let mut svalues = vec![0; n + 1];
        avalues[0] = 1;
        svalues[0] = n as i64;
        LevelState {
            avalues,
            svalues,
            divisors,
            bounds: BoundGenerator::new(discriminant).with_timing(timed),
        }
    }

    pub fn a(&self, level: usize) -> i64 {
        self.avalues[level]
    }

    pub fn s(&self, level: usize) -> i64 {
        self.svalues[level]
    }

    pub fn divisor(&self, level: usize) -> i64 {
        self.divisors[level]
    }

    pub fn divisors(&self) -> &[i64] {
        &self.divisors
    }

    pub fn bounds(&self) -> &BoundGenerator<D> {
        &self.bounds
    }

    pub fn bounds_mut(&mut self) -> &mut BoundGenerator<D> {
        &mut self.bounds
    }

    /// The enumerated quantity of a level: a_n at level 2, s_d elsewhere.
    pub fn native(&self, level: usize) -> i64 {
        if degree_of(D::N, level) == D::N {
            self.avalues[level]
        } else {
            self.svalues[level]
        }
    }

    /// `-sum_{i<d} a_i s_{d-i}` for the degree `d` of `level`.
    fn newton_sum(&self, deg: usize) -> i128 {
        let n = D::N;
        let mut sum: i128 = 0;
        for i in 1..deg {
            sum -= self.avalues[level_of(n, i)] as i128 * self.svalues[level_of(n, deg - i)] as i128;
        }
        sum
    }

    /// Set a level to the smallest admissible native value >= `value`.
    /// Returns true iff that is `value` itself, the divisor divides a and
    /// the placed values lie within the level's current bounds.
    pub fn set_value(&mut self, level: usize, value: i64) -> bool {
        let deg = degree_of(D::N, level);
        let div = self.divisors[level];
        let exact = if deg == D::N {
            let mut a = value + modulo(-value, div);
            if a == 0 {
                a += div;
            }
            self.avalues[level] = a;
            a == value
        } else {
            let sum = self.newton_sum(deg);
            let step = deg as i128 * div as i128;
            let s = value as i128 + (sum - value as i128).rem_euclid(step);
            self.svalues[level] = s as i64;
            self.avalues[level] = ((sum - s) / deg as i128) as i64;
            s == value as i128
        };
        let feasible = self.within_bounds(level);
        self.bounds
            .set_values(level, self.avalues[level], self.svalues[level]);
        exact && feasible && self.avalues[level] % div == 0
    }

    /// Whether the values placed on `level` satisfy the bounds derived
    /// from the levels above it.
    pub fn within_bounds(&self, level: usize) -> bool {
        let a = self.avalues[level];
        let a_ok = (self.bounds.a_lower(level)..=self.bounds.a_upper(level)).contains(&a);
        if degree_of(D::N, level) == D::N {
            return a_ok;
        }
        let s = self.svalues[level];
        a_ok && (self.bounds.s_lower(level)..=self.bounds.s_upper(level)).contains(&s)
    }

    /// Set a level to its lowest admissible value. Returns false if no
    /// admissible value satisfies the upper bound.
    pub fn init_value(&mut self, level: usize) -> bool {
        let deg = degree_of(D::N, level);
        if deg == D::N {
            let lower = self.bounds.a_lower(level);
            self.set_value(level, lower);
            return self.avalues[level] <= self.bounds.a_upper(level);
        }

        let lower = self.bounds.s_lower(level);
        self.set_value(level, lower);
        let aupper = self.bounds.a_upper(level);
        if self.avalues[level] > aupper {
            // a_d too large: move down whole divisor steps, s_d moves up
            let div = self.divisors[level];
            let diff = self.avalues[level] as i128 - aupper as i128;
            let steps = (diff + div as i128 - 1) / div as i128;
            self.avalues[level] = (self.avalues[level] as i128 - steps * div as i128) as i64;
            self.svalues[level] =
                (self.svalues[level] as i128 + steps * div as i128 * deg as i128) as i64;
            self.bounds
                .set_values(level, self.avalues[level], self.svalues[level]);
        }
        self.svalues[level] <= self.bounds.s_upper(level)
            && self.avalues[level] >= self.bounds.a_lower(level)
    }

    /// Step a level to its next admissible value. Returns false once the
    /// level leaves its bounds; bounds are only updated on success.
    pub fn increase_value(&mut self, level: usize) -> bool {
        let deg = degree_of(D::N, level);
        let div = self.divisors[level];
        if deg == D::N {
            self.avalues[level] += div;
            if self.avalues[level] == 0 {
                self.avalues[level] += div;
            }
            if self.avalues[level] > self.bounds.a_upper(level) {
                return false;
            }
        } else {
            self.svalues[level] += deg as i64 * div;
            self.avalues[level] -= div;
            if self.svalues[level] > self.bounds.s_upper(level)
                || self.avalues[level] < self.bounds.a_lower(level)
            {
                return false;
            }
        }
        self.bounds
            .set_values(level, self.avalues[level], self.svalues[level]);
        true
    }

    /// Set a coefficient without touching power sums or bounds.
    pub fn put_coefficient(&mut self, level: usize, a: i64) {
        self.avalues[level] = a;
    }

    /// Load a complete polynomial given in descending-degree order
    /// `[1, a_1, ..., a_n]` and recompute its power sums. Bounds are
    /// left untouched.
    pub fn load_coefficients(&mut self, coeffs: &[i64]) {
        let n = D::N;
        for (d, &c) in coeffs.iter().enumerate().take(n + 1) {
            self.avalues[level_of(n, d)] = c;
        }
        for d in 1..n {
            let sum = self.newton_sum(d);
            let s = sum - d as i128 * self.avalues[level_of(n, d)] as i128;
            self.svalues[level_of(n, d)] = s as i64;
        }
    }

    /// Coefficients in descending-degree order `[1, a_1, ..., a_n]`.
    pub fn coefficients(&self) -> Vec<i64> {
        (0..=D::N)
            .map(|d| self.avalues[level_of(D::N, d)])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::degree::{to_level_order, Quintic, Sextic};

    fn ones<D: Degree>(d: i64) -> LevelState<D> {
        LevelState::new(vec![1; D::N + 1], d, false)
    }

    /// Newton's identity holds for every power-sum level that was set.
    fn assert_newton<D: Degree>(st: &LevelState<D>, upto: usize) {
        let n = D::N;
        for level in 1..=upto {
            let d = degree_of(n, level);
            if d == n {
                continue;
            }
            let mut rhs: i128 = st.s(level) as i128;
            for i in 1..d {
                rhs += st.a(level_of(n, i)) as i128 * st.s(level_of(n, d - i)) as i128;
            }
            assert_eq!(d as i128 * st.a(level) as i128, -rhs, "level {}", level);
        }
    }

    #[test]
    fn set_value_rounds_power_sum_to_newton_class() {
        let mut st = ones::<Quintic>(1609);
        assert!(st.set_value(1, -1));
        assert_eq!(st.a(1), 1);
        assert!(st.set_value(2, 1));
        // s_2 must be ≡ -a_1 s_1 = 1 (mod 2)
        assert!(!st.set_value(3, 0));
        assert_eq!(st.s(3), 1);
        assert_eq!(st.a(3), 0);
        assert_newton(&st, 3);
    }

    #[test]
    fn set_value_skips_zero_an() {
        let mut st = ones::<Quintic>(1609);
        st.set_value(1, 0);
        assert!(!st.set_value(2, 0));
        assert_eq!(st.a(2), 1);
    }

    #[test]
    fn divisor_constrains_steps() {
        // a_2 divisible by 3
        let divisors = to_level_order(5, &[1, 3, 1, 1, 1], 1);
        let mut st = LevelState::<Quintic>::new(divisors, 100_000, false);
        st.set_value(1, 0);
        st.set_value(2, 5);
        assert!(st.init_value(3));
        assert_eq!(st.a(3) % 3, 0);
        let before = (st.a(3), st.s(3));
        if st.increase_value(3) {
            assert_eq!(st.a(3), before.0 - 3);
            assert_eq!(st.s(3), before.1 + 6);
        }
        assert_newton(&st, 3);
    }

    #[test]
    fn an_divisor_rounds_up_and_skips_zero() {
        let divisors = to_level_order(5, &[1, 1, 1, 1, 4], 1);
        let mut st = LevelState::<Quintic>::new(divisors, 100_000, false);
        st.set_value(1, 0);
        assert!(!st.set_value(2, -3));
        assert_eq!(st.a(2), 4);
        assert!(st.set_value(2, -4));
        st.increase_value(2);
        assert_eq!(st.a(2), 4);
    }

    #[test]
    fn init_respects_bounds() {
        let mut st = ones::<Sextic>(-9_747);
        st.set_value(1, 0);
        assert!(st.init_value(2));
        assert!(st.a(2) >= st.bounds().a_lower(2));
        for level in 3..6 {
            if st.init_value(level) {
                assert!(st.s(level) >= st.bounds().s_lower(level));
                assert!(st.s(level) <= st.bounds().s_upper(level));
                assert!(st.a(level) <= st.bounds().a_upper(level));
            }
        }
        assert_newton(&st, 5);
    }

    /// a_5 is confined to [-1, 1] for D = 1609, a_1 = 0.
    #[test]
    fn set_value_rejects_an_outside_bounds() {
        let mut st = ones::<Quintic>(1609);
        assert!(st.set_value(1, 0));
        assert_eq!(st.bounds().a_upper(2), 1);
        assert!(!st.set_value(2, 1000));
        assert_eq!(st.a(2), 1000);
        assert!(!st.set_value(2, -2));
        assert!(st.set_value(2, -1));
    }

    #[test]
    fn set_value_rejects_power_sum_outside_bounds() {
        let mut st = ones::<Quintic>(1609);
        st.set_value(1, 0);
        st.set_value(2, 1);
        let upper = st.bounds().s_upper(3);
        // s_2 steps by 2 from an even class when a_1 = 0
        let beyond = upper + 1 + (upper + 1).rem_euclid(2);
        assert!(!st.set_value(3, beyond));
        assert!(st.set_value(3, 0));
        assert!(st.within_bounds(3));
    }

    #[test]
    fn coefficients_in_descending_order() {
        let mut st = ones::<Quintic>(1);
        st.load_coefficients(&[1, -1, 2, -3, 4, -5]);
        assert_eq!(st.coefficients(), vec![1, -1, 2, -3, 4, -5]);
        assert_eq!(st.a(2), -5);
        assert_eq!(st.native(2), -5);
        // s_1 = -a_1
        assert_eq!(st.s(1), 1);
        assert_newton(&st, 5);
    }
}
