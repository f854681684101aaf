// src/archive/mod.rs

//! Append-only checkpoint archive.
//!
//! An archive file is one full snapshot followed by fixed-size records:
//!
//! ```text
//! +-----------------------------+
//! | Initial snapshot            |  <- snapshot module's format, byte
//! +-----------------------------+     length = first_record_offset
//! | Record 1 (record_size bytes)|
//! +-----------------------------+
//! | Record 2 (record_size bytes)|
//! +-----------------------------+
//! | ...                         |
//! +-----------------------------+
//! ```
//!
//! Every record holds time + walltime header fields followed by the
//! scheme-specific payload, all 8-byte host-endian floats, no padding, no
//! per-record length prefix or checksum. The record size depends on the
//! active scheme and the body count; both are fixed at the first heartbeat
//! and must not change for the lifetime of the file. The file is only ever
//! appended to, never truncated or rewritten.

mod layout;
mod reader;
mod restart;
mod writer;

pub use layout::record_size;
pub use reader::load_record;
pub use restart::{estimate_size, restart};
pub use writer::heartbeat;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;

/// Archive metadata carried by the simulation for the whole run.
///
/// `first_record_offset` and `record_size` are computed once, at the first
/// heartbeat, and never mutated again; later heartbeats only extend the file
/// and update the scheduling and walltime fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveState {
    /// Target archive file.
    pub path: PathBuf,
    /// Simulation-time interval between records.
    pub interval: f64,
    /// Next scheduled output time.
    pub next_output: f64,
    /// Cumulative wall-clock seconds spent by the writer.
    pub walltime: f64,
    /// Reference point for the next walltime delta. Not persisted; the
    /// reader resets it to "now" when restoring.
    #[serde(skip)]
    pub last_write: Option<Instant>,
    /// Byte offset of record 1 (= byte length of the initial snapshot).
    pub first_record_offset: u64,
    /// Fixed byte size of one record.
    pub record_size: u64,
}

impl Default for ArchiveState {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            interval: 0.0,
            next_output: 0.0,
            walltime: 0.0,
            last_write: None,
            first_record_offset: 0,
            record_size: 0,
        }
    }
}

impl ArchiveState {
    /// Byte offset of record `k` (1-based), or `None` if the offset is not
    /// representable in a `u64`. A wrapped offset could land inside the file
    /// and read the wrong record, so the caller must treat `None` as a
    /// seek failure.
    pub fn record_offset(&self, k: u64) -> Option<u64> {
        (k - 1)
            .checked_mul(self.record_size)
            .and_then(|bytes| self.first_record_offset.checked_add(bytes))
    }
}

pub(crate) const UNSUPPORTED_SCHEME_MSG: &str =
    "Simulation archive not implemented for this integration scheme.";
pub(crate) const UNSUPPORTED_GRAVITY_MSG: &str =
    "Simulation archive not implemented for this force model.";
