//! # Degree: Compile-Time Polynomial Degree and Level Order
//!
//! Every engine type is generic over a [`Degree`], a zero-sized marker that
//! carries the polynomial degree `N` and the degree-specific part of Hunter's
//! bound. Degrees without a known bound constant (9, and anything outside
//! 5..=11) have no marker type, so they cannot be instantiated.
//!
//! ## Level Order
//!
//! The search assigns coefficients in the order a_1, a_n, a_2, a_3, ..., a_{n-1}
//! because a_1 and a_n fix the Lagrange bounds for everything after them.
//! A *level* is a position in that order:
//!
//! | level | 0   | 1   | 2   | 3   | ... | n       |
//! |-------|-----|-----|-----|-----|-----|---------|
//! | coeff | a_0 | a_1 | a_n | a_2 | ... | a_{n-1} |
//!
//! All per-level vectors (coefficients, power sums, bounds, divisors) are
//! indexed by level. [`level_of`] and [`degree_of`] convert between the two.

use std::f64::consts::PI;

/// A supported polynomial degree.
pub trait Degree: Send + Sync + 'static {
    /// The degree n of the searched polynomials.
    const N: usize;

    /// The part of Hunter's bound on t_2 that does not depend on a_1.
    fn bound_constant(discriminant: f64) -> f64;
}

macro_rules! degree {
    ($(#[$meta:meta])* $name:ident, $n:expr, |$d:ident| $bc:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl Degree for $name {
            const N: usize = $n;

            fn bound_constant(discriminant: f64) -> f64 {
                let $d = discriminant.abs();
                $bc
            }
        }
    };
}

degree!(
    /// Degree 5.
    Quintic, 5, |d| (4.0 * d / 5.0).powf(1.0 / 4.0)
);
degree!(
    /// Degree 6.
    Sextic, 6, |d| (8.0 * d / 6.0).powf(1.0 / 5.0)
);
degree!(
    /// Degree 7.
    Septic, 7, |d| (64.0 / 3.0 * d / 7.0).powf(1.0 / 6.0)
);
degree!(
    /// Degree 8.
    Octic, 8, |d| (64.0 * d / 8.0).powf(1.0 / 7.0)
);
degree!(
    /// Degree 10.
    Decic, 10, |d| (108_056_025.0 / 8.0 * d / 10.0).powf(1.0 / 9.0) / PI
);
degree!(
    /// Degree 11.
    Undecic, 11, |d| (530_841_600.0 * d / 11.0).powf(1.0 / 10.0) / PI
);

/// Degrees accepted on the command line.
pub const SUPPORTED_DEGREES: [usize; 6] = [5, 6, 7, 8, 10, 11];

/// Level at which the coefficient a_`degree` is enumerated.
#[inline]
pub fn level_of(n: usize, degree: usize) -> usize {
    if degree <= 1 {
        degree
    } else if degree == n {
        2
    } else {
        degree + 1
    }
}

/// Coefficient degree enumerated at `level`.
#[inline]
pub fn degree_of(n: usize, level: usize) -> usize {
    if level <= 1 {
        level
    } else if level == 2 {
        n
    } else {
        level - 1
    }
}

/// Reorder a degree-ordered vector `v[d-1] = x_d` (d = 1..=n) into level
/// order with `out[0] = fill`.
pub fn to_level_order(n: usize, by_degree: &[i64], fill: i64) -> Vec<i64> {
    let mut out = vec![fill; n + 1];
    for (level, slot) in out.iter_mut().enumerate().skip(1) {
        *slot = by_degree[degree_of(n, level) - 1];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_degree_bijection() {
        for &n in &SUPPORTED_DEGREES {
            for level in 0..=n {
                assert_eq!(level_of(n, degree_of(n, level)), level, "n={} level={}", n, level);
            }
        }
    }

    #[test]
    fn quintic_order() {
        let degrees: Vec<usize> = (1..=5).map(|l| degree_of(5, l)).collect();
        assert_eq!(degrees, vec![1, 5, 2, 3, 4]);
    }

    #[test]
    fn to_level_order_places_leading_divisor() {
        let by_degree = [10, 20, 30, 40, 50];
        assert_eq!(to_level_order(5, &by_degree, 1), vec![1, 10, 50, 20, 30, 40]);
    }

    #[test]
    fn bound_constants_are_positive_and_monotone() {
        let small = Quintic::bound_constant(1609.0);
        let large = Quintic::bound_constant(1_000_000.0);
        assert!(small > 0.0 && large > small);
        assert!((Quintic::bound_constant(-1609.0) - small).abs() < 1e-12);
        assert!(Undecic::bound_constant(1e10) > 0.0);
    }

    #[test]
    fn quintic_bound_constant_value() {
        // (4 * 5 / 5)^(1/4) = sqrt(2)
        assert!((Quintic::bound_constant(5.0) - 2f64.sqrt()).abs() < 1e-12);
    }
}
