// src/sim/gravity.rs

//! Pairwise Newtonian gravity.

use super::{Body, Gravity};

/// Accumulates accelerations for every body into `accel` (overwritten).
///
/// `Gravity::Basic` and `Gravity::Tree` both evaluate the direct O(N²)
/// pairwise sum here; the tree code only changes how the archive treats the
/// simulation, not how this reference force evaluation behaves.
/// `Gravity::None` leaves all accelerations at zero.
pub fn accelerations(gravity: Gravity, g: f64, softening: f64, bodies: &[Body], accel: &mut [[f64; 3]]) {
    debug_assert_eq!(bodies.len(), accel.len());
    for a in accel.iter_mut() {
        *a = [0.0; 3];
    }
    if gravity == Gravity::None {
        return;
    }

    let soft2 = softening * softening;
    for i in 0..bodies.len() {
        for j in 0..bodies.len() {
            if i == j {
                continue;
            }
            let dx = bodies[j].pos[0] - bodies[i].pos[0];
            let dy = bodies[j].pos[1] - bodies[i].pos[1];
            let dz = bodies[j].pos[2] - bodies[i].pos[2];
            let r2 = dx * dx + dy * dy + dz * dz + soft2;
            let inv_r3 = 1.0 / (r2 * r2.sqrt());
            let f = g * bodies[j].m * inv_r3;
            accel[i][0] += f * dx;
            accel[i][1] += f * dy;
            accel[i][2] += f * dz;
        }
    }
}
