// src/archive/restart.rs

//! Restart orchestration and archive size estimation.

use std::path::Path;

use tracing::info;

use super::{layout, load_record, UNSUPPORTED_SCHEME_MSG};
use crate::error::Result;
use crate::sim::Simulation;
use crate::snapshot;

/// Reconstructs a simulator ready to continue stepping from the most recent
/// checkpoint in `path`.
///
/// Returns `Ok(None)` if the file does not exist. If the latest-record
/// overlay fails, the failure is reported on the simulator's diagnostics
/// channel and the partially-reconstructed simulator is still returned;
/// callers must check the channel, not just the return value.
pub fn restart(path: &Path) -> Result<Option<Simulation>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut sim = snapshot::read(path)?;
    match load_record(&mut sim, path, -1) {
        Ok(()) => info!(
            target: "nbody_archive",
            path = %path.display(),
            t = sim.t,
            "restarted from latest record"
        ),
        Err(e) => sim
            .diagnostics
            .error(format!("Cannot read latest archive record. ({e})")),
    }
    Ok(Some(sim))
}

/// Projected total archive size in bytes for a run to `tmax`, excluding the
/// initial snapshot.
///
/// Fails softly: with no interval configured estimation is meaningless and
/// a warning plus zero is returned; an unsupported scheme reports the usual
/// advisory and also yields zero.
pub fn estimate_size(sim: &mut Simulation, tmax: f64) -> u64 {
    if sim.archive.interval == 0.0 {
        sim.diagnostics.warning("Archive interval not set.");
        return 0;
    }
    match layout::record_size(sim.scheme, sim.n()) {
        Some(size) => size * (tmax / sim.archive.interval).ceil() as u64,
        None => {
            sim.diagnostics.error(UNSUPPORTED_SCHEME_MSG);
            0
        }
    }
}
