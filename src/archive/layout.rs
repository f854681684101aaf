// src/archive/layout.rs

//! Per-scheme record layout: size computation and payload codec.
//!
//! The layout is dispatched over the closed scheme set; schemes without a
//! layout yield `None` from [`record_size`] and the caller raises the
//! advisory. Field order is fixed and identical on the write and read path:
//!
//! - Symplectic: per body `m, x, y, z, vx, vy, vz`, positions/velocities
//!   taken from the auxiliary coordinate array when running unsynchronized.
//! - Extrapolation: `dt, dt_last_done`, per-body state, the five
//!   coefficient tables (7 rows of 3N each, row-major), then the two
//!   compensated-summation buffers.

use std::io::{self, Read};

use crate::sim::{Scheme, Simulation};

const F64: u64 = std::mem::size_of::<f64>() as u64;

/// Fixed byte size of one checkpoint record for `scheme` with `n` bodies,
/// or `None` if the scheme has no archive layout.
pub fn record_size(scheme: Scheme, n: usize) -> Option<u64> {
    let n = n as u64;
    match scheme {
        // time, walltime + 7 doubles per body
        Scheme::Symplectic => Some(F64 * 2 + F64 * 7 * n),
        // time, walltime, dt, dt_last_done
        // + per-body m, pos, vel
        // + five 7-row tables of 3N
        // + two compensated-summation buffers of 3N
        Scheme::Extrapolation => {
            Some(F64 * 4 + F64 * 7 * n + F64 * 3 * n * 5 * 7 + F64 * 3 * n * 2)
        }
        Scheme::Leapfrog => None,
    }
}

fn put_f64(buf: &mut Vec<u8>, v: f64) {
    buf.extend_from_slice(&v.to_ne_bytes());
}

fn get_f64(r: &mut impl Read) -> io::Result<f64> {
    let mut raw = [0u8; 8];
    r.read_exact(&mut raw)?;
    Ok(f64::from_ne_bytes(raw))
}

/// Appends the scheme-specific payload (everything after the time/walltime
/// header fields) to `buf`. The caller has already verified the scheme is
/// supported and, for the unsynchronized symplectic mode, that the internal
/// array is populated.
pub(crate) fn write_payload(sim: &Simulation, buf: &mut Vec<u8>) {
    match sim.scheme {
        Scheme::Symplectic => {
            let ps = if sim.symplectic.safe_mode {
                &sim.bodies
            } else {
                &sim.symplectic.internal
            };
            for (b, p) in sim.bodies.iter().zip(ps.iter()) {
                put_f64(buf, b.m);
                for c in 0..3 {
                    put_f64(buf, p.pos[c]);
                }
                for c in 0..3 {
                    put_f64(buf, p.vel[c]);
                }
            }
        }
        Scheme::Extrapolation => {
            put_f64(buf, sim.dt);
            put_f64(buf, sim.dt_last_done);
            for b in &sim.bodies {
                put_f64(buf, b.m);
                for c in 0..3 {
                    put_f64(buf, b.pos[c]);
                }
                for c in 0..3 {
                    put_f64(buf, b.vel[c]);
                }
            }
            let ext = &sim.extrapolation;
            for table in [
                &ext.corr,
                &ext.corr_comp,
                &ext.est,
                &ext.corr_last,
                &ext.est_last,
            ] {
                for row in &table.rows {
                    for &v in row {
                        put_f64(buf, v);
                    }
                }
            }
            for &v in &ext.cs_pos {
                put_f64(buf, v);
            }
            for &v in &ext.cs_vel {
                put_f64(buf, v);
            }
        }
        // Callers gate on record_size(); a scheme without a layout writes
        // nothing.
        Scheme::Leapfrog => debug_assert!(false, "no record layout for this scheme"),
    }
}

/// Reads the scheme-specific payload into `sim`, in the exact order
/// [`write_payload`] produced it, reallocating scheme-private buffers sized
/// to the body count where needed.
pub(crate) fn read_payload(sim: &mut Simulation, r: &mut impl Read) -> io::Result<()> {
    let n = sim.bodies.len();
    match sim.scheme {
        Scheme::Symplectic => {
            let unsynchronized = !sim.symplectic.safe_mode;
            if unsynchronized {
                sim.symplectic.ensure_allocated(n);
            }
            for i in 0..n {
                sim.bodies[i].m = get_f64(r)?;
                let mut pos = [0.0; 3];
                let mut vel = [0.0; 3];
                for c in 0..3 {
                    pos[c] = get_f64(r)?;
                }
                for c in 0..3 {
                    vel[c] = get_f64(r)?;
                }
                let target = if unsynchronized {
                    &mut sim.symplectic.internal[i]
                } else {
                    &mut sim.bodies[i]
                };
                target.pos = pos;
                target.vel = vel;
            }
            if unsynchronized {
                // The internal array is authoritative again; cumulative
                // masses are rederived, never read from the file.
                sim.symplectic.synchronized = false;
                sim.symplectic.rebuild_masses(&sim.bodies);
            }
        }
        Scheme::Extrapolation => {
            sim.dt = get_f64(r)?;
            sim.dt_last_done = get_f64(r)?;
            for b in sim.bodies.iter_mut() {
                b.m = get_f64(r)?;
                for c in 0..3 {
                    b.pos[c] = get_f64(r)?;
                }
                for c in 0..3 {
                    b.vel[c] = get_f64(r)?;
                }
            }
            sim.extrapolation.ensure_allocated(n);
            let ext = &mut sim.extrapolation;
            for table in [
                &mut ext.corr,
                &mut ext.corr_comp,
                &mut ext.est,
                &mut ext.corr_last,
                &mut ext.est_last,
            ] {
                for row in &mut table.rows {
                    for v in row.iter_mut() {
                        *v = get_f64(r)?;
                    }
                }
            }
            for v in ext.cs_pos.iter_mut() {
                *v = get_f64(r)?;
            }
            for v in ext.cs_vel.iter_mut() {
                *v = get_f64(r)?;
            }
        }
        Scheme::Leapfrog => debug_assert!(false, "no record layout for this scheme"),
    }
    Ok(())
}
