//! # Config: Search Parameters, Validation and Input Loading
//!
//! A search is described by a [`SearchConfig`], read from a TOML file
//! (`--config`) and/or assembled from command-line flags, which override
//! the file field by field.
//!
//! ```toml
//! degree = 6
//! discriminant = -9747
//! divisors = [1, 1, 1, 1, 1, 1]   # by degree: a_1 .. a_n
//! fixed = [0]                     # native values of the first levels
//! locked = 1                      # further levels enumerated into units
//! filter = [7]
//! tree = "input/tree6.txt"
//! congruences = ["input/c3.txt", "input/c5.txt"]
//! output = "output.txt"
//! ```
//!
//! Validation happens before any engine is built; every problem is reported
//! with the offending field.

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::checkpoint::sha256_hex;
use crate::congruence::CongruenceSet;
use crate::degree::{to_level_order, SUPPORTED_DEGREES};
use crate::polgen::EngineConfig;

fn default_locked() -> usize {
    1
}

fn default_output() -> PathBuf {
    PathBuf::from("output.txt")
}

fn default_tree() -> PathBuf {
    PathBuf::from("input/tree.txt")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    pub degree: usize,
    pub discriminant: i64,
    /// Divisors by degree (`divisors[d-1]` divides a_d); empty means all 1.
    #[serde(default)]
    pub divisors: Vec<i64>,
    /// Native values of levels `1..=fixed.len()`, shared by every unit.
    #[serde(default)]
    pub fixed: Vec<i64>,
    /// Levels after `fixed` enumerated by the coordinator.
    #[serde(default = "default_locked")]
    pub locked: usize,
    #[serde(default)]
    pub filter: Vec<i64>,
    /// Stop handing out units after this many.
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default = "default_tree")]
    pub tree: PathBuf,
    #[serde(default)]
    pub congruences: Vec<PathBuf>,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Worker threads; 0 uses every available core.
    #[serde(default)]
    pub workers: usize,
    #[serde(default)]
    pub checkpoint: Option<PathBuf>,
    #[serde(default)]
    pub detailed_stats: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            degree: 0,
            discriminant: 0,
            divisors: Vec::new(),
            fixed: Vec::new(),
            locked: default_locked(),
            filter: Vec::new(),
            limit: None,
            tree: default_tree(),
            congruences: Vec::new(),
            output: default_output(),
            workers: 0,
            checkpoint: None,
            detailed_stats: false,
        }
    }
}

/// File contents a search needs, read once before the engines are built.
#[derive(Debug, Clone)]
pub struct SearchInputs {
    pub tree: String,
    pub congruences: Vec<CongruenceSet>,
}

impl SearchConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid search configuration")
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        let n = self.degree;
        if !SUPPORTED_DEGREES.contains(&n) {
            bail!(
                "unsupported degree {}; supported degrees are {}",
                n,
                SUPPORTED_DEGREES
                    .iter()
                    .map(|d| d.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        if self.discriminant == 0 {
            bail!("discriminant must be non-zero");
        }
        if !self.divisors.is_empty() && self.divisors.len() != n {
            bail!(
                "number of divisors ({}) must equal the degree ({})",
                self.divisors.len(),
                n
            );
        }
        if let Some(d) = self.divisors.iter().find(|&&d| d < 1) {
            bail!("divisors must be positive, got {}", d);
        }
        if self.unit_width() > n - 1 {
            bail!(
                "fixed ({}) plus locked ({}) levels exceed the {} enumerable levels",
                self.fixed.len(),
                self.locked,
                n - 1
            );
        }
        if let Some(p) = self.filter.iter().find(|&&p| p < 2) {
            bail!("invalid filter prime {}", p);
        }
        if self.limit == Some(0) {
            bail!("limit must be positive");
        }
        Ok(())
    }

    /// Length of a work unit.
    pub fn unit_width(&self) -> usize {
        self.fixed.len() + self.locked
    }

    /// Divisors in level order with `divisors[0] = 1`.
    pub fn level_divisors(&self) -> Vec<i64> {
        if self.divisors.is_empty() {
            vec![1; self.degree + 1]
        } else {
            to_level_order(self.degree, &self.divisors, 1)
        }
    }

    /// Read the tree and every congruence file, the latter in parallel.
    pub fn load_inputs(&self) -> Result<SearchInputs> {
        let tree = std::fs::read_to_string(&self.tree)
            .with_context(|| format!("reading tree file {}", self.tree.display()))?;
        let n = self.degree;
        let congruences = self
            .congruences
            .par_iter()
            .map(|path| CongruenceSet::read(n, path))
            .collect::<Result<Vec<_>>>()?;
        Ok(SearchInputs { tree, congruences })
    }

    /// SHA-256 over everything that determines the unit sequence and the
    /// results of each unit.
    pub fn fingerprint(&self, inputs: &SearchInputs) -> String {
        let mut text = format!(
            "degree={};discriminant={};divisors={:?};fixed={:?};locked={};filter={:?};tree={}",
            self.degree,
            self.discriminant,
            self.level_divisors(),
            self.fixed,
            self.locked,
            self.filter,
            inputs.tree.lines().next().unwrap_or("").trim()
        );
        for set in &inputs.congruences {
            text.push_str(&format!(";moduli={:?};tuples={}", set.moduli, set.tuples.len()));
            text.push_str(&sha256_hex(&format!("{:?}", set.tuples)));
        }
        sha256_hex(&text)
    }

    pub fn engine_config(&self, inputs: &SearchInputs) -> EngineConfig {
        EngineConfig {
            divisors: self.level_divisors(),
            discriminant: self.discriminant,
            tree: inputs.tree.clone(),
            congruences: inputs.congruences.clone(),
            filter_primes: self.filter.clone(),
            detailed_stats: self.detailed_stats,
        }
    }

    /// Worker count with 0 resolved to the available parallelism.
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}
