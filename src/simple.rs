//! # Simple: Work-Unit Prefix Enumeration
//!
//! Enumerates the admissible native values of the first few levels under
//! Hunter's bounds, without congruences or a discriminant tree. Each prefix
//! becomes one work unit for a [`PolGenerator`](crate::polgen::PolGenerator).
//!
//! The carry is the same as the full generator's: increase the deepest
//! level, and when it leaves its bounds advance the level above and
//! re-initialise. A failed initialisation carries too, so the enumeration
//! only stops once the first free level is exhausted.

use crate::degree::Degree;
use crate::levels::LevelState;

pub struct SimplePolGenerator<D: Degree> {
    levels: LevelState<D>,
    fixed: Vec<i64>,
    width: usize,
}

impl<D: Degree> SimplePolGenerator<D> {
    /// `fixed` holds the native values of levels `1..=fixed.len()`; levels
    /// up to `width` are enumerated. `divisors` is in level order.
    pub fn new(fixed: &[i64], width: usize, divisors: Vec<i64>, discriminant: i64) -> Self {
        SimplePolGenerator {
            levels: LevelState::new(divisors, discriminant, false),
            fixed: fixed.to_vec(),
            width: width.max(fixed.len()).min(D::N - 1),
        }
    }

    fn first_free(&self) -> usize {
        self.fixed.len() + 1
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Move to the first admissible prefix.
    pub fn init(&mut self) -> bool {
        for (i, &v) in self.fixed.iter().enumerate() {
            if !self.levels.set_value(i + 1, v) {
                return false;
            }
        }
        let mut level = self.first_free();
        while level <= self.width {
            if self.levels.init_value(level) {
                level += 1;
            } else if !self.next(level - 1) {
                return false;
            }
        }
        true
    }

    fn next(&mut self, level: usize) -> bool {
        if level < self.first_free() {
            return false;
        }
        if self.levels.increase_value(level) {
            return true;
        }
        loop {
            if !self.next(level - 1) {
                return false;
            }
            if self.levels.init_value(level) {
                return true;
            }
        }
    }

    /// Move to the next prefix.
    pub fn configure_next(&mut self) -> bool {
        if self.first_free() > self.width {
            return false;
        }
        self.next(self.width)
    }

    /// Native values of levels `1..=width`.
    pub fn coefficients(&self) -> Vec<i64> {
        (1..=self.width).map(|l| self.levels.native(l)).collect()
    }

    pub fn into_units(self) -> WorkUnits<D> {
        WorkUnits {
            gen: self,
            started: false,
            done: false,
        }
    }
}

/// Iterator over the work units of a [`SimplePolGenerator`].
pub struct WorkUnits<D: Degree> {
    gen: SimplePolGenerator<D>,
    started: bool,
    done: bool,
}

impl<D: Degree> Iterator for WorkUnits<D> {
    type Item = Vec<i64>;

    fn next(&mut self) -> Option<Vec<i64>> {
        if self.done {
            return None;
        }
        let more = if self.started {
            self.gen.configure_next()
        } else {
            self.started = true;
            self.gen.init()
        };
        if more {
            Some(self.gen.coefficients())
        } else {
            self.done = true;
            None
        }
    }
}
