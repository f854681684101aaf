// src/archive/writer.rs

//! Archive writer: the per-step heartbeat.
//!
//! Called once per simulation step; a cheap no-op on most calls. The first
//! call (at the `t == 0` sentinel) fixes the record size, writes the full
//! initial snapshot and schedules the first output. Later calls append one
//! fixed-size record whenever the configured interval has elapsed, opening
//! and closing the file around a single buffered write so a crash between
//! checkpoints can never corrupt a completed record.

use std::fs::OpenOptions;
use std::io::Write;
use std::time::Instant;

use tracing::debug;

use super::layout;
use super::{UNSUPPORTED_GRAVITY_MSG, UNSUPPORTED_SCHEME_MSG};
use crate::error::{ArchiveError, Result};
use crate::sim::{stepper, Gravity, Scheme, Simulation};
use crate::snapshot;

pub fn heartbeat(sim: &mut Simulation) -> Result<()> {
    if sim.t == 0.0 {
        first_output(sim)
    } else if sim.archive.next_output <= sim.t {
        append_record(sim)
    } else {
        Ok(())
    }
}

/// First heartbeat: fix the record size for the file's lifetime, check the
/// force model, and write the initial snapshot.
fn first_output(sim: &mut Simulation) -> Result<()> {
    sim.archive.record_size = match layout::record_size(sim.scheme, sim.n()) {
        Some(size) => size,
        None => {
            sim.diagnostics.error(UNSUPPORTED_SCHEME_MSG);
            0
        }
    };
    match sim.gravity {
        Gravity::Basic | Gravity::None => {}
        // Advisory only: the snapshot below is still written. Observed
        // behavior of the original system, kept as-is.
        _ => sim.diagnostics.error(UNSUPPORTED_GRAVITY_MSG),
    }
    sim.archive.next_output = sim.t + sim.archive.interval;
    sim.archive.walltime = 0.0;
    sim.archive.last_write = Some(Instant::now());

    let path = sim.archive.path.clone();
    let written = snapshot::write(sim, &path)?;
    debug!(
        target: "nbody_archive",
        path = %path.display(),
        snapshot_bytes = written,
        record_size = sim.archive.record_size,
        "archive initialized"
    );
    Ok(())
}

/// Appends one fixed-size record. The whole record is assembled in memory
/// and written with a single call on an append-mode handle.
fn append_record(sim: &mut Simulation) -> Result<()> {
    // Single-step advance: if more than one interval has elapsed, only one
    // is added. Checkpoint cadence, not a catch-up loop.
    sim.archive.next_output += sim.archive.interval;

    let now = Instant::now();
    if let Some(last) = sim.archive.last_write {
        sim.archive.walltime += now.duration_since(last).as_secs_f64();
    }
    sim.archive.last_write = Some(now);

    if layout::record_size(sim.scheme, sim.n()).is_none() {
        sim.diagnostics.error(UNSUPPORTED_SCHEME_MSG);
        return Ok(());
    }
    // The unsynchronized symplectic record stores the internal coordinate
    // array; make sure it exists even if no step has populated it yet.
    if sim.scheme == Scheme::Symplectic
        && !sim.symplectic.safe_mode
        && sim.symplectic.internal.len() != sim.n()
    {
        stepper::desynchronize(sim);
    }

    let mut record = Vec::with_capacity(sim.archive.record_size as usize);
    record.extend_from_slice(&sim.t.to_ne_bytes());
    record.extend_from_slice(&sim.archive.walltime.to_ne_bytes());
    layout::write_payload(sim, &mut record);
    debug_assert_eq!(record.len() as u64, sim.archive.record_size);

    let path = &sim.archive.path;
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| ArchiveError::io(path, "failed to open archive for append", e))?;
    file.write_all(&record)
        .map_err(|e| ArchiveError::io(path, "failed to append record", e))?;
    drop(file);

    debug!(
        target: "nbody_archive",
        t = sim.t,
        next_output = sim.archive.next_output,
        "record appended"
    );
    Ok(())
}
