// src/snapshot.rs

//! Full-state snapshot: the initial, self-describing serialization at the
//! head of every archive file.
//!
//! Unlike the fixed-size records appended after it, the snapshot carries the
//! complete simulator configuration. Its byte length defines the offset of
//! record 1 for the lifetime of the file.
//!
//! Format:
//! ```text
//! +--------------------------+
//! | Magic "NBAR" (4 bytes)   |
//! | Version (u32)            |
//! | Payload length (u64)     |
//! | XXHash64 checksum (u64)  |  <- checksum of the payload
//! +--------------------------+
//! | Payload (bincode)        |  <- full Simulation state
//! +--------------------------+
//! ```

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use twox_hash::XxHash64;

use crate::error::{ArchiveError, Result};
use crate::sim::Simulation;

/// Magic bytes identifying an archive file.
pub const MAGIC: [u8; 4] = *b"NBAR";

/// Current snapshot format version.
pub const VERSION: u32 = 1;

/// Fixed snapshot header size in bytes.
pub const HEADER_LEN: usize = 24;

fn checksum(data: &[u8]) -> u64 {
    use std::hash::Hasher;
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(data);
    hasher.finish()
}

/// Writes the full simulator state to `path`, creating or truncating the
/// file, and returns the number of bytes written.
///
/// `sim.archive.first_record_offset` is fixed to that byte count before the
/// payload is encoded, so the stored metadata already describes the file it
/// lives in. The offset fields are fixed-width under bincode, so the encoded
/// length does not depend on their values.
pub fn write(sim: &mut Simulation, path: &Path) -> Result<u64> {
    let probe = bincode::serialize(sim)
        .map_err(|e| ArchiveError::snapshot_with_source(path, "failed to encode state", e))?;
    let total = (HEADER_LEN + probe.len()) as u64;
    sim.archive.first_record_offset = total;

    let payload = bincode::serialize(sim)
        .map_err(|e| ArchiveError::snapshot_with_source(path, "failed to encode state", e))?;
    debug_assert_eq!(payload.len(), probe.len());

    let mut data = Vec::with_capacity(HEADER_LEN + payload.len());
    data.extend_from_slice(&MAGIC);
    data.extend_from_slice(&VERSION.to_le_bytes());
    data.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    data.extend_from_slice(&checksum(&payload).to_le_bytes());
    data.extend_from_slice(&payload);

    let mut file = File::create(path)
        .map_err(|e| ArchiveError::io(path, "failed to create archive file", e))?;
    file.write_all(&data)
        .map_err(|e| ArchiveError::io(path, "failed to write snapshot", e))?;

    Ok(total)
}

/// Reconstructs a simulator from the snapshot at the head of `path`.
///
/// Only the snapshot region is read; any appended records are ignored here
/// (the archive reader overlays those separately).
pub fn read(path: &Path) -> Result<Simulation> {
    if !path.exists() {
        return Err(ArchiveError::file_not_found(path));
    }
    let mut file =
        File::open(path).map_err(|e| ArchiveError::io(path, "failed to open archive file", e))?;

    let mut header = [0u8; HEADER_LEN];
    file.read_exact(&mut header)
        .map_err(|e| ArchiveError::snapshot_with_source(path, "truncated snapshot header", e))?;

    if header[0..4] != MAGIC {
        return Err(ArchiveError::snapshot(path, "invalid magic bytes"));
    }
    let version = u32::from_le_bytes(header[4..8].try_into().expect("fixed slice"));
    if version != VERSION {
        return Err(ArchiveError::snapshot(
            path,
            format!("unsupported snapshot version {version}"),
        ));
    }
    let payload_len = u64::from_le_bytes(header[8..16].try_into().expect("fixed slice")) as usize;
    let stored_checksum = u64::from_le_bytes(header[16..24].try_into().expect("fixed slice"));

    let mut payload = vec![0u8; payload_len];
    file.read_exact(&mut payload)
        .map_err(|e| ArchiveError::snapshot_with_source(path, "truncated snapshot payload", e))?;

    let computed = checksum(&payload);
    if computed != stored_checksum {
        return Err(ArchiveError::snapshot(
            path,
            format!("checksum mismatch: expected {stored_checksum}, got {computed}"),
        ));
    }

    let sim: Simulation = bincode::deserialize(&payload)
        .map_err(|e| ArchiveError::snapshot_with_source(path, "failed to decode state", e))?;
    Ok(sim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Body, Scheme};
    use std::io::Seek;
    use tempfile::TempDir;

    fn test_sim() -> Simulation {
        let mut sim = Simulation::new();
        sim.t = 3.5;
        sim.dt = 0.002;
        sim.bodies = vec![
            Body::new(1.0, [0.0; 3], [0.0; 3]),
            Body::new(1e-3, [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ];
        sim.archive.interval = 0.5;
        sim
    }

    #[test]
    fn test_write_read_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("run.bin");
        let mut sim = test_sim();

        let written = write(&mut sim, &path).unwrap();
        assert_eq!(written, std::fs::metadata(&path).unwrap().len());
        assert_eq!(sim.archive.first_record_offset, written);

        let loaded = read(&path).unwrap();
        assert_eq!(loaded.t, sim.t);
        assert_eq!(loaded.bodies, sim.bodies);
        assert_eq!(loaded.scheme, Scheme::Symplectic);
        assert_eq!(loaded.archive.first_record_offset, written);
        assert_eq!(loaded.archive.interval, 0.5);
    }

    #[test]
    fn test_offset_field_does_not_change_length() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.bin");
        let mut sim = test_sim();

        // An absurd pre-existing offset must not change the encoded length.
        sim.archive.first_record_offset = u64::MAX;
        let written = write(&mut sim, &path).unwrap();
        assert_eq!(sim.archive.first_record_offset, written);
    }

    #[test]
    fn test_read_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = read(&temp.path().join("absent.bin"));
        assert!(matches!(result, Err(ArchiveError::FileNotFound { .. })));
    }

    #[test]
    fn test_read_rejects_bad_magic() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.bin");
        std::fs::write(&path, b"XXXXjunkjunkjunkjunkjunkjunk").unwrap();
        let result = read(&path);
        assert!(matches!(result, Err(ArchiveError::Snapshot { .. })));
    }

    #[test]
    fn test_read_rejects_corrupted_payload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("corrupt.bin");
        let mut sim = test_sim();
        write(&mut sim, &path).unwrap();

        // Flip a byte in the payload
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .unwrap();
        file.seek(std::io::SeekFrom::Start(HEADER_LEN as u64 + 10))
            .unwrap();
        let mut byte = [0u8; 1];
        file.read_exact(&mut byte).unwrap();
        file.seek(std::io::SeekFrom::Start(HEADER_LEN as u64 + 10))
            .unwrap();
        file.write_all(&[byte[0] ^ 0xFF]).unwrap();

        let result = read(&path);
        assert!(matches!(result, Err(ArchiveError::Snapshot { .. })));
        assert!(result.unwrap_err().to_string().contains("checksum"));
    }

    #[test]
    fn test_snapshot_ignores_appended_bytes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("grown.bin");
        let mut sim = test_sim();
        write(&mut sim, &path).unwrap();

        // Appended record bytes must not disturb the snapshot
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0u8; 128]).unwrap();
        drop(file);

        let loaded = read(&path).unwrap();
        assert_eq!(loaded.bodies, sim.bodies);
    }
}
