//! # Congruence: Square-Class Filtering Modulo Small Moduli
//!
//! A polynomial can only have discriminant `D * k^2` if the discriminant tree
//! evaluates to a square modulo every modulus. This module precomputes, per
//! modulus, the residue tuples of the variable coefficients for which that
//! holds, and lets the enumeration follow them level by level.
//!
//! ## Module Structure
//!
//! - [`generator`]: enumerates admissible residue tuples from a tree
//! - [`lookup`]: prefix trie over tuples with a backtracking cursor
//! - [`file`]: reading and writing congruence files

mod file;
mod generator;
mod lookup;

pub use file::*;
pub use generator::*;
pub use lookup::*;
