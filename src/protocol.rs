//! # Protocol: Coordinator and Worker Messages
//!
//! Workers talk to the coordinator over one shared channel, each message
//! tagged with the sending worker's id. The coordinator answers over one
//! private channel per worker.
//!
//! ```text
//! worker                         coordinator
//!   WorkRequest        ───────▶
//!                      ◀───────  WorkUnit { index, values } | Terminate
//!   ResultBatch        ───────▶  (only if something was found)
//!   StatsDelta         ───────▶
//!   ...
//!   StatsFinal         ───────▶  (after Terminate)
//!   TerminationAck     ───────▶
//! ```
//!
//! Messages derive serde so a transport other than in-process channels can
//! carry them unchanged.

use serde::{Deserialize, Serialize};

use crate::stats::Statistics;

/// Worker to coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToCoordinator {
    WorkRequest,
    /// Polynomials (descending-degree coefficients) that passed the square
    /// test.
    ResultBatch { polynomials: Vec<Vec<i64>> },
    /// Timings and test count of one finished unit.
    StatsDelta {
        unit: u64,
        tested: u64,
        stats: Statistics,
    },
    StatsFinal { stats: Statistics },
    TerminationAck,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub worker: usize,
    pub message: ToCoordinator,
}

/// Coordinator to worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToWorker {
    WorkUnit { index: u64, values: Vec<i64> },
    Terminate,
}
