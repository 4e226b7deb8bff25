//! # Arith: Modular Arithmetic and CRT
//!
//! Small integer helpers shared by the bound generator, the level state and
//! the CRT stage of the polynomial generator:
//!
//! - `modulo`: canonical residue in `[0, m)` for any sign of `a`.
//! - `gcd` / `lcm` on signed 64-bit integers.
//! - `inverse_mod`: extended Euclid, `None` when no inverse exists.
//! - `div_floor` / `div_ceil`: exact rounding of integer quotients.
//! - [`Crt`]: precomputed basis for combining residues modulo pairwise
//!   coprime moduli into one residue modulo their product.

use anyhow::{bail, Result};

/// Canonical residue of `a` modulo `m` (m > 0), in `[0, m)`.
#[inline]
pub fn modulo(a: i64, m: i64) -> i64 {
    a.rem_euclid(m)
}

/// Greatest common divisor, always non-negative.
pub fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a.abs()
}

/// Least common multiple of two positive integers.
pub fn lcm(a: i64, b: i64) -> i64 {
    if a == 0 || b == 0 {
        return 0;
    }
    (a / gcd(a, b) * b).abs()
}

/// Multiplicative inverse of `a` modulo `m` via the extended Euclidean
/// algorithm. Returns None if gcd(a, m) != 1.
pub fn inverse_mod(a: i64, m: i64) -> Option<i64> {
    if m == 1 {
        return Some(0);
    }
    let (mut old_r, mut r) = (modulo(a, m) as i128, m as i128);
    let (mut old_s, mut s) = (1i128, 0i128);
    while r != 0 {
        let q = old_r / r;
        (old_r, r) = (r, old_r - q * r);
        (old_s, s) = (s, old_s - q * s);
    }
    if old_r != 1 {
        return None;
    }
    Some((old_s.rem_euclid(m as i128)) as i64)
}

/// floor(a / b) for b != 0.
#[inline]
pub fn div_floor(a: i64, b: i64) -> i64 {
    let q = a / b;
    if (a % b != 0) && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

/// ceil(a / b) for b != 0.
#[inline]
pub fn div_ceil(a: i64, b: i64) -> i64 {
    let q = a / b;
    if (a % b != 0) && ((a < 0) == (b < 0)) {
        q + 1
    } else {
        q
    }
}

/// One CRT component: residues are given modulo `modulus / scale` and are
/// multiplied by `scale` before combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrtComponent {
    pub modulus: i64,
    pub scale: i64,
}

/// Chinese remainder basis for pairwise coprime moduli.
///
/// For components (M_i, g_i), a residue r_i (mod M_i / g_i) contributes
/// `c_i * r_i` to the combined value, where
/// `c_i = g_i * prod_{j != i} M_j * (M_j^{-1} mod M_i)` reduced mod the product.
#[derive(Debug, Clone)]
pub struct Crt {
    product: i64,
    coefficients: Vec<i64>,
}

impl Crt {
    pub fn new(components: &[CrtComponent]) -> Result<Self> {
        let mut product: i128 = 1;
        for c in components {
            if c.modulus <= 0 || c.scale <= 0 || c.modulus % c.scale != 0 {
                bail!(
                    "invalid CRT component: modulus {} scale {}",
                    c.modulus,
                    c.scale
                );
            }
            product *= c.modulus as i128;
            if product > i64::MAX as i128 {
                bail!("product of CRT moduli overflows 64 bits");
            }
        }
        let product = product as i64;

        let mut coefficients = Vec::with_capacity(components.len());
        for (i, ci) in components.iter().enumerate() {
            let mut c = ci.scale as i128;
            for (j, cj) in components.iter().enumerate() {
                if i == j {
                    continue;
                }
                let Some(inv) = inverse_mod(cj.modulus, ci.modulus) else {
                    bail!(
                        "CRT moduli {} and {} are not coprime",
                        ci.modulus,
                        cj.modulus
                    );
                };
                c = c * (cj.modulus as i128 % product as i128) % product as i128;
                c = c * inv as i128 % product as i128;
            }
            coefficients.push(c.rem_euclid(product as i128) as i64);
        }

        Ok(Crt {
            product,
            coefficients,
        })
    }

    /// Product of all component moduli.
    pub fn product(&self) -> i64 {
        self.product
    }

    pub fn coefficients(&self) -> &[i64] {
        &self.coefficients
    }

    /// Combine one residue per component into a residue modulo the product.
    pub fn combine(&self, residues: &[i64]) -> i64 {
        let p = self.product as i128;
        let mut acc: i128 = 0;
        for (&c, &r) in self.coefficients.iter().zip(residues) {
            acc = (acc + c as i128 * (r as i128).rem_euclid(p)) % p;
        }
        acc as i64
    }

    /// Combine every choice of one residue from each set. The result has
    /// `prod |sets[i]|` entries, in lexicographic order of the choice.
    pub fn combine_all(&self, sets: &[&[i64]]) -> Vec<i64> {
        let p = self.product as i128;
        let mut acc: Vec<i128> = vec![0];
        for (&c, set) in self.coefficients.iter().zip(sets) {
            let mut next = Vec::with_capacity(acc.len() * set.len());
            for &t in &acc {
                for &r in set.iter() {
                    next.push((t + c as i128 * (r as i128).rem_euclid(p)) % p);
                }
            }
            acc = next;
        }
        acc.into_iter().map(|v| v as i64).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modulo_is_canonical() {
        assert_eq!(modulo(-1, 5), 4);
        assert_eq!(modulo(5, 5), 0);
        assert_eq!(modulo(-10, 5), 0);
        assert_eq!(modulo(7, 3), 1);
    }

    #[test]
    fn gcd_and_lcm() {
        assert_eq!(gcd(12, 18), 6);
        assert_eq!(gcd(-12, 18), 6);
        assert_eq!(gcd(0, 7), 7);
        assert_eq!(lcm(4, 6), 12);
        assert_eq!(lcm(1, 9), 9);
    }

    #[test]
    fn inverse_mod_known_values() {
        assert_eq!(inverse_mod(3, 7), Some(5));
        assert_eq!(inverse_mod(-3, 7), Some(2));
        assert_eq!(inverse_mod(2, 4), None);
        assert_eq!(inverse_mod(5, 1), Some(0));
    }

    #[test]
    fn floor_and_ceil_division() {
        assert_eq!(div_floor(7, 2), 3);
        assert_eq!(div_floor(-7, 2), -4);
        assert_eq!(div_floor(7, -2), -4);
        assert_eq!(div_floor(-8, 2), -4);
        assert_eq!(div_ceil(7, 2), 4);
        assert_eq!(div_ceil(-7, 2), -3);
        assert_eq!(div_ceil(-7, -2), 4);
        assert_eq!(div_ceil(8, 4), 2);
    }

    #[test]
    fn crt_three_and_five() {
        let crt = Crt::new(&[
            CrtComponent { modulus: 3, scale: 1 },
            CrtComponent { modulus: 5, scale: 1 },
        ])
        .unwrap();
        assert_eq!(crt.product(), 15);
        let mut all = crt.combine_all(&[&[1, 2], &[0, 3]]);
        all.sort();
        assert_eq!(all, vec![5, 8, 10, 13]);
        for v in all {
            assert!(v % 3 == 1 || v % 3 == 2);
            assert!(v % 5 == 0 || v % 5 == 3);
        }
    }

    #[test]
    fn crt_scaled_component() {
        // Residue r mod 3 scaled by 2: value ≡ 2r (mod 6), ≡ 0 (mod 5)
        let crt = Crt::new(&[
            CrtComponent { modulus: 6, scale: 2 },
            CrtComponent { modulus: 5, scale: 5 },
        ])
        .unwrap();
        let v = crt.combine(&[1, 0]);
        assert_eq!(v % 6, 2);
        assert_eq!(v % 5, 0);
    }

    #[test]
    fn crt_rejects_common_factor() {
        let err = Crt::new(&[
            CrtComponent { modulus: 6, scale: 1 },
            CrtComponent { modulus: 4, scale: 1 },
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn crt_empty_is_trivial() {
        let crt = Crt::new(&[]).unwrap();
        assert_eq!(crt.product(), 1);
        assert_eq!(crt.combine_all(&[]), vec![0]);
    }
}
