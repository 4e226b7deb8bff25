//! # Checkpoint: Resumable Search State Persistence
//!
//! Work units are handed out in a fixed order, so the state of a search is
//! the number of units completed without a gap, plus the running count of
//! polynomials found. A fingerprint of the search parameters guards against
//! resuming with a different configuration.
//!
//! ## Atomic Writes
//!
//! Checkpoint files are written atomically: write to a temp file, then
//! rename.
//!
//! ## Integrity
//!
//! A SHA-256 hash is stored alongside the JSON data. On load the hash is
//! verified; corrupted checkpoints are skipped in favour of the most recent
//! valid generation (up to 3 generations kept).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Number of backup generations to keep.
const GENERATIONS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCheckpoint {
    /// SHA-256 over the parameters that define the unit sequence.
    pub fingerprint: String,
    /// Units `0..completed_units` are done.
    pub completed_units: u64,
    pub found: u64,
}

impl SearchCheckpoint {
    /// Units to skip when resuming a search with `fingerprint`.
    pub fn resume_from(&self, fingerprint: &str) -> Option<u64> {
        (self.fingerprint == fingerprint).then_some(self.completed_units)
    }
}

/// Wrapper that includes a SHA-256 checksum for integrity verification.
#[derive(Serialize, Deserialize)]
struct CheckpointEnvelope {
    checksum: String,
    data: serde_json::Value,
}

/// SHA-256 hex digest of a string.
pub fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Path of generation `gen` (0 = current, 1 = .1, 2 = .2).
fn generation_path(base: &Path, gen: usize) -> PathBuf {
    if gen == 0 {
        base.to_path_buf()
    } else {
        let mut p = base.as_os_str().to_os_string();
        p.push(format!(".{}", gen));
        PathBuf::from(p)
    }
}

/// Save a checkpoint with integrity checksum and rotating generations.
///
/// Rotation: current -> .1 -> .2 (the oldest .2 is discarded).
pub fn save(path: &Path, checkpoint: &SearchCheckpoint) -> Result<()> {
    for gen in (1..GENERATIONS).rev() {
        let src = generation_path(path, gen - 1);
        let dst = generation_path(path, gen);
        if src.exists() {
            if let Err(e) = fs::rename(&src, &dst) {
                warn!(from = %src.display(), error = %e, "checkpoint rotation failed");
            }
        }
    }

    let data = serde_json::to_value(checkpoint)?;
    let data_str = serde_json::to_string_pretty(&data)?;
    let checksum = sha256_hex(&data_str);

    let envelope = CheckpointEnvelope { checksum, data };
    let json = serde_json::to_string_pretty(&envelope)?;

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &json).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;

    Ok(())
}

/// Load the newest valid checkpoint, falling back to older generations on
/// corruption.
pub fn load(path: &Path) -> Option<SearchCheckpoint> {
    for gen in 0..GENERATIONS {
        let p = generation_path(path, gen);
        if let Some(cp) = load_single(&p) {
            if gen > 0 {
                warn!(
                    generation = gen,
                    path = %p.display(),
                    "recovered checkpoint from older generation"
                );
            }
            return Some(cp);
        }
    }
    None
}

fn load_single(path: &Path) -> Option<SearchCheckpoint> {
    let raw = fs::read_to_string(path).ok()?;
    let envelope: CheckpointEnvelope = serde_json::from_str(&raw).ok()?;

    let data_str = serde_json::to_string_pretty(&envelope.data).ok()?;
    let expected = sha256_hex(&data_str);
    if expected != envelope.checksum {
        warn!(
            path = %path.display(),
            expected = &expected[..12],
            got = &envelope.checksum[..12.min(envelope.checksum.len())],
            "checkpoint integrity check failed"
        );
        return None;
    }

    serde_json::from_value(envelope.data).ok()
}

/// Remove all checkpoint files (current, generations and leftover tmp).
pub fn clear(path: &Path) {
    for gen in 0..GENERATIONS {
        let _ = fs::remove_file(generation_path(path, gen));
    }
    let _ = fs::remove_file(path.with_extension("tmp"));
}
