// src/archive/reader.rs

//! Archive reader: overlay one recorded checkpoint onto a simulation.
//!
//! Index 0 is the initial snapshot (delegated to the snapshot
//! deserializer); positive `k` is the k-th appended record (1-based);
//! any negative index means the most recently appended record.

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;
use std::time::Instant;

use tracing::debug;

use super::{layout, UNSUPPORTED_SCHEME_MSG};
use crate::error::{ArchiveError, Result};
use crate::sim::Simulation;
use crate::snapshot;

/// Loads record `index` from `path` into `sim`.
///
/// Hard failures: the file does not exist (`FileNotFound`), or the record
/// offset cannot be positioned within the file (`SeekFailed`). Advisory
/// conditions (malformed snapshot for index 0, unsupported scheme) are
/// recorded on the simulation's diagnostics channel and the call still
/// returns `Ok`.
pub fn load_record(sim: &mut Simulation, path: &Path, index: i64) -> Result<()> {
    if !path.exists() {
        return Err(ArchiveError::file_not_found(path));
    }

    if index == 0 {
        match snapshot::read(path) {
            Ok(mut loaded) => {
                loaded.diagnostics = std::mem::take(&mut sim.diagnostics);
                *sim = loaded;
            }
            // Advisory: the condition is surfaced on the channel and the
            // call still reports success.
            Err(e) => sim.diagnostics.error(format!(
                "Cannot read archive snapshot. Check filename and file contents. ({e})"
            )),
        }
        return Ok(());
    }

    let record_size = sim.archive.record_size;
    let file_len = std::fs::metadata(path)
        .map_err(|e| ArchiveError::io(path, "failed to read archive metadata", e))?
        .len();

    let offset = if index < 0 {
        // Latest record, regardless of the index's magnitude
        let min_len = sim.archive.first_record_offset.checked_add(record_size);
        if record_size == 0 || min_len.map_or(true, |m| file_len < m) {
            return Err(ArchiveError::seek_failed(path, index, "no records in file"));
        }
        file_len - record_size
    } else {
        sim.archive.record_offset(index as u64).ok_or_else(|| {
            ArchiveError::seek_failed(path, index, "record offset exceeds addressable range")
        })?
    };

    // An OS-level seek past end-of-file succeeds silently; bound-check the
    // whole record instead so an out-of-range index fails here. Checked
    // arithmetic so an extreme offset cannot wrap past the check.
    if record_size == 0 || offset.checked_add(record_size).map_or(true, |end| end > file_len) {
        return Err(ArchiveError::seek_failed(
            path,
            index,
            format!("record at offset {offset} exceeds file length {file_len}"),
        ));
    }

    let mut file =
        File::open(path).map_err(|e| ArchiveError::io(path, "failed to open archive file", e))?;
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| ArchiveError::seek_failed(path, index, e.to_string()))?;

    read_into(sim, &mut file, path)?;
    debug!(
        target: "nbody_archive",
        index,
        offset,
        t = sim.t,
        "record loaded"
    );
    Ok(())
}

fn read_into(sim: &mut Simulation, file: &mut File, path: &Path) -> Result<()> {
    let mut header = [0u8; 16];
    std::io::Read::read_exact(file, &mut header)
        .map_err(|e| ArchiveError::io(path, "failed to read record header", e))?;
    sim.t = f64::from_ne_bytes(header[0..8].try_into().expect("fixed slice"));
    sim.archive.walltime = f64::from_ne_bytes(header[8..16].try_into().expect("fixed slice"));

    // The accumulated walltime comes from the file; the reference point for
    // future deltas is "now".
    sim.archive.last_write = Some(Instant::now());

    // Restore the scheduling cadence relative to the freshly read time.
    if sim.archive.interval > 0.0 {
        while sim.archive.next_output <= sim.t {
            sim.archive.next_output += sim.archive.interval;
        }
    }

    if layout::record_size(sim.scheme, sim.n()).is_none() {
        // Advisory, non-fatal to the call itself
        sim.diagnostics.error(UNSUPPORTED_SCHEME_MSG);
        return Ok(());
    }
    layout::read_payload(sim, file)
        .map_err(|e| ArchiveError::io(path, "failed to read record payload", e))?;
    Ok(())
}
