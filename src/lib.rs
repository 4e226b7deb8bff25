//! # Hunter Search: Number Fields of Prescribed Discriminant
//!
//! Enumerates monic integer polynomials of degree n within Hunter's bounds
//! and keeps those whose discriminant, after division by the target
//! discriminant, is a perfect square.
//!
//! ## Layers
//!
//! - [`arith`], [`degree`]: integer helpers, CRT, level order.
//! - [`bounds`], [`levels`]: Lagrange bounds and Newton's identities.
//! - [`horner`], [`congruence`]: discriminant trees and congruence filters.
//! - [`polgen`], [`simple`]: the search engine and the work-unit enumerator.
//! - [`coordinator`], [`protocol`], [`output`], [`checkpoint`],
//!   [`progress`], [`stats`], [`config`]: the multi-threaded runtime.

pub mod arith;
pub mod bounds;
pub mod checkpoint;
pub mod config;
pub mod congruence;
pub mod coordinator;
pub mod degree;
pub mod horner;
pub mod levels;
pub mod output;
pub mod polgen;
pub mod progress;
pub mod protocol;
pub mod simple;
pub mod stats;

/// Run `$body` with `$d` bound to the [`degree::Degree`] marker for the
/// runtime degree `$n`; unsupported degrees produce an error.
#[macro_export]
macro_rules! with_degree {
    ($n:expr, $d:ident => $body:expr) => {
        match $n {
            5 => {
                type $d = $crate::degree::Quintic;
                $body
            }
            6 => {
                type $d = $crate::degree::Sextic;
                $body
            }
            7 => {
                type $d = $crate::degree::Septic;
                $body
            }
            8 => {
                type $d = $crate::degree::Octic;
                $body
            }
            10 => {
                type $d = $crate::degree::Decic;
                $body
            }
            11 => {
                type $d = $crate::degree::Undecic;
                $body
            }
            other => Err(::anyhow::anyhow!(
                "unsupported degree {}; supported degrees are 5, 6, 7, 8, 10, 11",
                other
            )),
        }
    };
}
