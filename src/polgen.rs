//! # PolGen: Hunter Enumeration with Congruence Filtering
//!
//! The search engine proper. A [`PolGenerator`] owns one level state, one
//! exact discriminant tree and one congruence lookup per modulus set, and
//! enumerates every monic polynomial of a work unit whose coefficients
//! satisfy Hunter's bounds and every congruence condition.
//!
//! ## Enumeration
//!
//! Levels `1..=len` are fixed by the work unit. The free levels
//! `len+1..=n-1` are enumerated odometer-style by [`PolGenerator::next`]:
//! increase the deepest level, and on overflow carry into the level above
//! and re-initialise. Lookups step back and forward in lock-step, and the
//! discriminant tree is re-evaluated at each changed level.
//!
//! The last level (a_{n-1}) is not enumerated. For each configuration of
//! the others, the lookup leaves give the admissible residues of a_{n-1}
//! modulo each modulus, and the CRT turns them into an arithmetic
//! progression intersected with the a_{n-1} bounds. The resulting values
//! are queued and handed out one at a time.
//!
//! ## Divisors
//!
//! A coefficient forced divisible by `g` is looked up as `a / g_m`, where
//! `g_m` is the part of `g` built from primes of modulus set `m`. The part
//! of the last divisor not covered by any modulus becomes an extra CRT
//! component with residue set `{0}`.

use anyhow::{bail, Context, Result};
use rug::{Assign, Integer};
use std::collections::VecDeque;
use tracing::{trace, warn};

use crate::arith::{gcd, lcm, Crt, CrtComponent};
use crate::congruence::{CongruenceGenerator, CongruenceLookup, CongruenceSet};
use crate::degree::{to_level_order, Degree};
use crate::horner::{Exact, HornerTree};
use crate::levels::LevelState;
use crate::stats::{Phase, Statistics};

/// Everything needed to build an engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Divisors in level order, `divisors[0] = 1`.
    pub divisors: Vec<i64>,
    pub discriminant: i64,
    /// Discriminant tree description.
    pub tree: String,
    pub congruences: Vec<CongruenceSet>,
    pub filter_primes: Vec<i64>,
    pub detailed_stats: bool,
}

impl EngineConfig {
    /// Config with divisors given by degree (`divisors[d-1]` for a_d).
    pub fn new(n: usize, divisors_by_degree: &[i64], discriminant: i64, tree: &str) -> Self {
        EngineConfig {
            divisors: to_level_order(n, divisors_by_degree, 1),
            discriminant,
            tree: tree.to_string(),
            congruences: Vec::new(),
            filter_primes: Vec::new(),
            detailed_stats: false,
        }
    }
}

/// Largest divisor of `div` whose prime factors all divide `modulus`.
fn prime_part(div: i64, modulus: i64) -> i64 {
    let mut gd = 1;
    loop {
        let g = gcd(div / gd, modulus);
        if g == 1 {
            return gd;
        }
        gd *= g;
    }
}

pub struct PolGenerator<D: Degree> {
    levels: LevelState<D>,
    tree: HornerTree<Exact>,
    fixed: usize,
    locked: usize,
    lookups: Vec<CongruenceLookup>,
    /// Filter-prime generators; their lookups follow the static ones.
    generators: Vec<CongruenceGenerator>,
    static_lookups: usize,
    /// `divisors_gcd[i][j]` divides the coefficient of level `fixed + j`
    /// before it is looked up in lookup `i`.
    divisors_gcd: Vec<Vec<i64>>,
    crt: Crt,
    /// Whether the CRT carries the leftover divisor component.
    divisor_component: bool,
    queue: VecDeque<i64>,
    pending: bool,
    scratch: Integer,
    stats: Statistics,
}

impl<D: Degree> PolGenerator<D> {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let n = D::N;
        if config.divisors.len() != n + 1 {
            bail!(
                "expected {} divisors for degree {}, got {}",
                n,
                n,
                config.divisors.len().saturating_sub(1)
            );
        }
        if let Some(d) = config.divisors[1..].iter().find(|&&d| d < 1) {
            bail!("divisors must be positive, got {}", d);
        }

        let tree =
            HornerTree::parse(Exact, &config.tree).context("parsing discriminant tree")?;
        let depth = tree.depth();
        if depth == 0 || depth > n {
            bail!(
                "discriminant tree has depth {}, expected between 1 and {}",
                depth,
                n
            );
        }
        let fixed = n - depth + 1;

        let mut lookups = Vec::new();
        let mut moduli: Vec<Vec<i64>> = Vec::new();
        for (i, set) in config.congruences.iter().enumerate() {
            if set.len() != depth {
                bail!(
                    "congruence set {} covers {} levels but the tree has depth {}",
                    i + 1,
                    set.len(),
                    depth
                );
            }
            lookups.push(
                CongruenceLookup::new(&set.tuples, &set.moduli)
                    .with_context(|| format!("building lookup for congruence set {}", i + 1))?,
            );
            moduli.push(set.moduli.clone());
        }
        let static_lookups = lookups.len();

        let mut generators = Vec::new();
        for &p in &config.filter_primes {
            if p < 2 {
                bail!("invalid filter prime {}", p);
            }
            if let Some(level) = (fixed..=n).find(|&l| config.divisors[l] % p == 0) {
                bail!(
                    "filter prime {} divides the divisor {} of level {}",
                    p,
                    config.divisors[level],
                    level
                );
            }
            let gen = CongruenceGenerator::new(&config.tree, p)?;
            let gen_moduli = gen.moduli();
            lookups.push(CongruenceLookup::new(&[], &gen_moduli)?);
            moduli.push(gen_moduli);
            generators.push(gen);
        }

        let divisors_gcd: Vec<Vec<i64>> = moduli
            .iter()
            .map(|ms| {
                let mod_lcm = ms.iter().fold(1, |acc, &m| lcm(acc, m));
                (0..ms.len())
                    .map(|j| prime_part(config.divisors[fixed + j], mod_lcm))
                    .collect()
            })
            .collect();

        let mut components = Vec::with_capacity(moduli.len() + 1);
        let mut covered: i64 = 1;
        for (ms, gds) in moduli.iter().zip(&divisors_gcd) {
            let (m, gd) = (ms[depth - 1], gds[depth - 1]);
            components.push(CrtComponent {
                modulus: m * gd,
                scale: gd,
            });
            covered = covered.saturating_mul(gd);
        }
        let last = config.divisors[n];
        if last % covered != 0 {
            bail!(
                "divisor {} of the last coefficient is not compatible with the congruence moduli",
                last
            );
        }
        let rest = last / covered;
        let divisor_component = rest > 1;
        if divisor_component {
            components.push(CrtComponent {
                modulus: rest,
                scale: rest,
            });
        }
        let crt = Crt::new(&components).context("congruence moduli are not pairwise coprime")?;

        Ok(PolGenerator {
            levels: LevelState::new(
                config.divisors.clone(),
                config.discriminant,
                config.detailed_stats,
            ),
            tree,
            fixed,
            locked: fixed,
            lookups,
            generators,
            static_lookups,
            divisors_gcd,
            crt,
            divisor_component,
            queue: VecDeque::new(),
            pending: false,
            scratch: Integer::new(),
            stats: Statistics::new(config.detailed_stats),
        })
    }

    /// First level the discriminant tree treats as a variable.
    pub fn fixed(&self) -> usize {
        self.fixed
    }

    /// First level not fixed by the current work unit.
    pub fn locked(&self) -> usize {
        self.locked
    }

    pub fn depth(&self) -> usize {
        self.tree.depth()
    }

    pub fn levels(&self) -> &LevelState<D> {
        &self.levels
    }

    fn eval_disc(&mut self, level: usize) {
        self.stats.start(Phase::Eval);
        self.scratch.assign(self.levels.a(level));
        self.tree.eval(D::N - level, &self.scratch);
        self.stats.stop(Phase::Eval);
    }

    fn lookup_key(&self, lookup: usize, level: usize) -> i64 {
        self.levels.a(level) / self.divisors_gcd[lookup][level - self.fixed]
    }

    /// Load a work unit (native values of levels `1..=unit.len()`) and move
    /// to its first polynomial. Returns false if the unit holds none.
    pub fn init(&mut self, unit: &[i64]) -> bool {
        self.stats.start(Phase::Init);
        let ok = self.init_unit(unit);
        self.stats.stop(Phase::Init);
        ok && self.configure_next()
    }

    fn init_unit(&mut self, unit: &[i64]) -> bool {
        let n = D::N;
        let len = unit.len();
        if len + 1 < self.fixed || len > n - 1 {
            warn!(
                len,
                fixed = self.fixed,
                "work unit length outside the range the tree allows"
            );
            return false;
        }
        self.locked = len + 1;
        self.queue.clear();
        self.pending = false;

        for (i, &value) in unit.iter().enumerate() {
            if !self.levels.set_value(i + 1, value) {
                trace!(level = i + 1, value, "work unit not admissible");
                return false;
            }
        }

        let mut all_init = true;
        for level in self.locked..n {
            all_init &= self.levels.init_value(level);
        }

        let prefix: Vec<i64> = (self.fixed..self.locked)
            .map(|l| self.levels.a(l))
            .collect();
        for (k, gen) in self.generators.iter_mut().enumerate() {
            let rebuilt = gen
                .generate(&prefix)
                .and_then(|tuples| CongruenceLookup::new(&tuples, &gen.moduli()));
            match rebuilt {
                Ok(lookup) => self.lookups[self.static_lookups + k] = lookup,
                Err(e) => {
                    warn!(prime = gen.modulus(), error = %e, "failed to rebuild filter lookup");
                    return false;
                }
            }
        }

        for i in 0..self.lookups.len() {
            self.lookups[i].reset();
            for level in self.fixed..self.locked {
                let key = self.lookup_key(i, level);
                if !self.lookups[i].walk(key) {
                    trace!(lookup = i, level, "locked prefix fails congruence");
                    return false;
                }
            }
            for level in self.locked..n {
                let key = self.lookup_key(i, level);
                self.lookups[i].walk(key);
            }
        }

        for level in self.fixed..=n.saturating_sub(2) {
            self.eval_disc(level);
        }

        self.pending = all_init && self.lookups.iter().all(|l| !l.overflowed());
        true
    }

    /// Advance levels `locked..=level` to the next configuration whose
    /// prefix passes every lookup. Returns false when exhausted.
    pub fn next(&mut self, level: usize) -> bool {
        loop {
            for lookup in &mut self.lookups {
                lookup.back();
            }

            if !self.levels.increase_value(level) {
                if level <= self.locked {
                    return false;
                }
                loop {
                    if !self.next(level - 1) {
                        return false;
                    }
                    if self.levels.init_value(level) {
                        break;
                    }
                }
            }

            if level + 2 <= D::N {
                self.eval_disc(level);
            }

            let mut cancelled = false;
            for i in 0..self.lookups.len() {
                if cancelled {
                    self.lookups[i].walk_dummy();
                } else {
                    let key = self.lookup_key(i, level);
                    cancelled = !self.lookups[i].walk(key);
                }
            }
            if !cancelled {
                return true;
            }
        }
    }

    /// Move to the next polynomial. Returns false when the unit is
    /// exhausted.
    pub fn configure_next(&mut self) -> bool {
        let n = D::N;
        while self.queue.is_empty() {
            if self.pending {
                self.pending = false;
            } else if self.locked > n - 1 || !self.next(n - 1) {
                return false;
            }
            self.stats.start(Phase::Crt);
            self.fill_queue();
            self.stats.stop(Phase::Crt);
        }

        match self.queue.pop_front() {
            Some(v) => {
                self.levels.put_coefficient(n, v);
                self.eval_disc(n);
                true
            }
            None => false,
        }
    }

    /// Queue every admissible a_{n-1} for the current configuration.
    fn fill_queue(&mut self) {
        let n = D::N;
        let low = self.levels.bounds().a_lower(n);
        let upp = self.levels.bounds().a_upper(n);
        if low > upp {
            return;
        }

        let mut sets: Vec<&[i64]> = self
            .lookups
            .iter()
            .map(|l| l.values().unwrap_or(&[]))
            .collect();
        if self.divisor_component {
            sets.push(&[0]);
        }
        let residues = self.crt.combine_all(&sets);

        let prod = self.crt.product() as i128;
        let (low, upp) = (low as i128, upp as i128);
        for c in residues {
            let mut v = low + (c as i128 - low).rem_euclid(prod);
            while v <= upp {
                self.queue.push_back(v as i64);
                v += prod;
            }
        }

        if !self.queue.is_empty() {
            self.eval_disc(n - 1);
        }
    }

    /// Whether the current tree value is a non-zero perfect square.
    pub fn disc_is_square(&mut self) -> bool {
        self.stats.start(Phase::SquareTest);
        let value = self.tree.value();
        let square = *value != 0 && value.is_perfect_square();
        self.stats.stop(Phase::SquareTest);
        square
    }

    /// Current tree value (the discriminant divided by the target).
    pub fn disc_value(&self) -> &Integer {
        self.tree.value()
    }

    /// Coefficients in descending-degree order `[1, a_1, ..., a_n]`.
    pub fn coefficients(&self) -> Vec<i64> {
        self.levels.coefficients()
    }

    /// Load a complete polynomial `[1, a_1, ..., a_n]` and evaluate the
    /// tree for it.
    pub fn assign(&mut self, coeffs: &[i64]) -> Result<()> {
        let n = D::N;
        if coeffs.len() != n + 1 {
            bail!(
                "expected {} coefficients for degree {}, got {}",
                n + 1,
                n,
                coeffs.len()
            );
        }
        if coeffs[0] != 1 {
            bail!("polynomial is not monic (leading coefficient {})", coeffs[0]);
        }
        self.levels.load_coefficients(coeffs);
        for level in self.fixed..=n {
            self.eval_disc(level);
        }
        Ok(())
    }

    pub fn statistics(&mut self) -> &Statistics {
        self.absorb_lagrange();
        &self.stats
    }

    /// Timings recorded since the last call.
    pub fn take_statistics(&mut self) -> Statistics {
        self.absorb_lagrange();
        self.stats.take()
    }

    pub fn stats_mut(&mut self) -> &mut Statistics {
        &mut self.stats
    }

    fn absorb_lagrange(&mut self) {
        let lagrange = std::mem::take(self.levels.bounds_mut().lagrange_stat());
        self.stats.get_mut(Phase::Lagrange).merge(&lagrange);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::degree::Quintic;

    const TREE: &str = "[[1],[],[1,,]]";
    const DISC: i64 = 1609;
    const UNIT: [i64; 3] = [0, 1, 0];

    fn config() -> EngineConfig {
        EngineConfig::new(5, &[1; 5], DISC, TREE)
    }

    fn collect(config: &EngineConfig, unit: &[i64]) -> Vec<Vec<i64>> {
        let mut gen = PolGenerator::<Quintic>::new(config).unwrap();
        let mut out = Vec::new();
        let mut more = gen.init(unit);
        while more {
            out.push(gen.coefficients());
            more = gen.configure_next();
        }
        out.sort();
        out
    }

    fn sum_of_squares(c: &[i64]) -> i64 {
        c[3] * c[3] + c[4] * c[4]
    }

    fn is_square(v: i64) -> bool {
        let r = (v as f64).sqrt().round() as i64;
        r * r == v
    }

    // ── Construction ────────────────────────────────────────────────

    #[test]
    fn fixed_level_follows_tree_depth() {
        let gen = PolGenerator::<Quintic>::new(&config()).unwrap();
        assert_eq!(gen.depth(), 2);
        assert_eq!(gen.fixed(), 4);
    }

    #[test]
    fn rejects_congruence_set_of_wrong_length() {
        let mut cfg = config();
        cfg.congruences.push(CongruenceSet {
            moduli: vec![3, 3, 3],
            tuples: vec![vec![0, 0, 0]],
        });
        assert!(PolGenerator::<Quintic>::new(&cfg).is_err());
    }

    #[test]
    fn rejects_filter_prime_dividing_divisor() {
        let mut cfg = EngineConfig::new(5, &[1, 1, 1, 3, 1], DISC, TREE);
        cfg.filter_primes.push(3);
        assert!(PolGenerator::<Quintic>::new(&cfg).is_err());
    }

    #[test]
    fn rejects_shared_moduli() {
        let mut cfg = config();
        let set = CongruenceSet {
            moduli: vec![3, 3],
            tuples: vec![vec![0, 0]],
        };
        cfg.congruences.push(set.clone());
        cfg.congruences.push(set);
        assert!(PolGenerator::<Quintic>::new(&cfg).is_err());
    }

    #[test]
    fn rejects_bad_divisors_and_tree() {
        let mut cfg = config();
        cfg.divisors[3] = 0;
        assert!(PolGenerator::<Quintic>::new(&cfg).is_err());
        let cfg = EngineConfig::new(5, &[1; 5], DISC, "[1,2");
        assert!(PolGenerator::<Quintic>::new(&cfg).is_err());
    }

    // ── Enumeration ─────────────────────────────────────────────────

    /// Every candidate extends the unit, and the square test agrees with a
    /// direct evaluation of the tree polynomial.
    #[test]
    fn toy_search_square_test_matches_direct_evaluation() {
        let mut gen = PolGenerator::<Quintic>::new(&config()).unwrap();
        let mut seen = Vec::new();
        let mut more = gen.init(&UNIT);
        while more {
            let c = gen.coefficients();
            assert_eq!(&c[..3], &[1, 0, 0]);
            assert_eq!(c[5], 1);
            let v = sum_of_squares(&c);
            assert_eq!(*gen.disc_value(), v);
            assert_eq!(gen.disc_is_square(), v != 0 && is_square(v));
            seen.push(c);
            more = gen.configure_next();
        }
        assert!(seen.contains(&vec![1, 0, 0, 0, 0, 1]));
        let mut dedup = seen.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), seen.len());
    }

    #[test]
    fn congruence_set_filters_exactly() {
        let all = collect(&config(), &UNIT);
        let mut gen = CongruenceGenerator::new(TREE, 5).unwrap();
        let mut cfg = config();
        cfg.congruences.push(CongruenceSet {
            moduli: gen.moduli(),
            tuples: gen.generate(&[]).unwrap(),
        });
        let filtered = collect(&cfg, &UNIT);
        let expected: Vec<Vec<i64>> = all
            .into_iter()
            .filter(|c| gen.is_square(sum_of_squares(c)))
            .collect();
        assert_eq!(filtered, expected);
    }

    #[test]
    fn filter_prime_matches_congruence_set() {
        let mut gen = CongruenceGenerator::new(TREE, 5).unwrap();
        let mut with_set = config();
        with_set.congruences.push(CongruenceSet {
            moduli: gen.moduli(),
            tuples: gen.generate(&[]).unwrap(),
        });
        let mut with_prime = config();
        with_prime.filter_primes.push(5);
        assert_eq!(collect(&with_set, &UNIT), collect(&with_prime, &UNIT));
    }

    #[test]
    fn last_divisor_is_enforced() {
        let all = collect(&config(), &UNIT);
        let cfg = EngineConfig::new(5, &[1, 1, 1, 2, 1], DISC, TREE);
        let even = collect(&cfg, &UNIT);
        let expected: Vec<Vec<i64>> = all.into_iter().filter(|c| c[4] % 2 == 0).collect();
        assert_eq!(even, expected);
    }

    #[test]
    fn short_unit_is_rejected() {
        let mut gen = PolGenerator::<Quintic>::new(&config()).unwrap();
        assert!(!gen.init(&[0, 1]));
    }

    #[test]
    fn inadmissible_unit_yields_nothing() {
        let mut gen = PolGenerator::<Quintic>::new(&config()).unwrap();
        // a_5 = 0 is never admissible
        assert!(!gen.init(&[0, 0, 0]));
    }

    #[test]
    fn unit_outside_bounds_is_rejected() {
        let mut gen = PolGenerator::<Quintic>::new(&config()).unwrap();
        // |a_5| <= 1 for D = 1609, a_1 = 0
        assert!(!gen.init(&[0, 1000, 0]));
        assert!(!gen.init(&[0, -2, 0]));
        assert!(gen.init(&UNIT));
    }

    // ── Assign ──────────────────────────────────────────────────────

    #[test]
    fn assign_evaluates_full_polynomial() {
        let mut gen = PolGenerator::<Quintic>::new(&config()).unwrap();
        gen.assign(&[1, 0, 0, 3, 4, 1]).unwrap();
        assert_eq!(*gen.disc_value(), 25);
        assert!(gen.disc_is_square());

        gen.assign(&[1, 0, 0, 1, 1, 1]).unwrap();
        assert!(!gen.disc_is_square());

        gen.assign(&[1, 0, 0, 0, 0, 1]).unwrap();
        assert!(!gen.disc_is_square());
    }

    #[test]
    fn assign_rejects_malformed_input() {
        let mut gen = PolGenerator::<Quintic>::new(&config()).unwrap();
        assert!(gen.assign(&[1, 0, 0]).is_err());
        assert!(gen.assign(&[2, 0, 0, 0, 0, 1]).is_err());
    }

    #[test]
    fn statistics_record_units() {
        let mut cfg = config();
        cfg.detailed_stats = true;
        let mut gen = PolGenerator::<Quintic>::new(&cfg).unwrap();
        gen.init(&UNIT);
        let stats = gen.take_statistics();
        assert_eq!(stats.get(Phase::Init).count, 1);
        assert!(stats.get(Phase::Eval).count > 0);
        assert_eq!(gen.statistics().get(Phase::Init).count, 0);
    }
}
