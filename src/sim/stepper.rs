// src/sim/stepper.rs

//! Stepping collaborators for the supported integration schemes.
//!
//! The archive core only requires that stepping is deterministic: restoring
//! a checkpoint and continuing must reproduce the uninterrupted trajectory
//! bit-for-bit. The symplectic scheme is velocity-Verlet, either directly on
//! the public body array (`safe_mode`) or on an internal Jacobi-coordinate
//! array that is only mapped back on demand. The extrapolation scheme is a
//! compensated-summation integrator that maintains the full set of
//! coefficient tables the archive persists, with a simple adaptive step-size
//! controller.

use super::gravity::accelerations;
use super::{Body, Scheme, Simulation};

/// Advances `sim` by one step of its active scheme.
pub fn step(sim: &mut Simulation) {
    if sim.bodies.is_empty() {
        sim.t += sim.dt;
        return;
    }
    match sim.scheme {
        Scheme::Symplectic => {
            if sim.symplectic.safe_mode {
                step_verlet_public(sim);
            } else {
                step_verlet_jacobi(sim);
            }
        }
        Scheme::Extrapolation => step_extrapolation(sim),
        Scheme::Leapfrog => step_leapfrog(sim),
    }
}

/// Maps the internal Jacobi coordinates back to the public body array.
/// Only meaningful for the symplectic scheme running unsynchronized.
pub fn synchronize(sim: &mut Simulation) {
    if sim.scheme != Scheme::Symplectic
        || sim.symplectic.safe_mode
        || sim.symplectic.synchronized
        || sim.bodies.is_empty()
    {
        return;
    }
    let n = sim.bodies.len();
    let mut scratch = sim.bodies.clone();
    from_jacobi(
        &sim.symplectic.internal,
        &sim.symplectic.eta,
        &sim.bodies,
        &mut scratch,
    );
    for i in 0..n {
        sim.bodies[i].pos = scratch[i].pos;
        sim.bodies[i].vel = scratch[i].vel;
    }
    sim.symplectic.synchronized = true;
}

/// Switches the symplectic scheme onto its internal coordinate array,
/// building it from the current public state.
pub(crate) fn desynchronize(sim: &mut Simulation) {
    sim.symplectic.rebuild_masses(&sim.bodies);
    let bodies = sim.bodies.clone();
    to_jacobi(&bodies, &sim.symplectic.eta, &mut sim.symplectic.internal);
    sim.symplectic.synchronized = false;
}

/// Velocity-Verlet on the public body array (two force evaluations).
fn step_verlet_public(sim: &mut Simulation) {
    let n = sim.bodies.len();
    let dt = sim.dt;
    let half_dt = 0.5 * dt;

    let mut a_old = vec![[0.0; 3]; n];
    accelerations(sim.gravity, sim.g, sim.softening, &sim.bodies, &mut a_old);

    for (b, a) in sim.bodies.iter_mut().zip(a_old.iter()) {
        for c in 0..3 {
            b.vel[c] += half_dt * a[c];
        }
    }
    for b in sim.bodies.iter_mut() {
        for c in 0..3 {
            b.pos[c] += dt * b.vel[c];
        }
    }
    sim.t += dt;

    let mut a_new = vec![[0.0; 3]; n];
    accelerations(sim.gravity, sim.g, sim.softening, &sim.bodies, &mut a_new);
    for (b, a) in sim.bodies.iter_mut().zip(a_new.iter()) {
        for c in 0..3 {
            b.vel[c] += half_dt * a[c];
        }
    }
}

/// Kick-drift-kick on the internal Jacobi array. The public body array goes
/// stale and is only refreshed by [`synchronize`]; the step itself depends
/// solely on the internal array, the public masses and `eta`, which is
/// exactly the state a checkpoint record restores.
fn step_verlet_jacobi(sim: &mut Simulation) {
    let n = sim.bodies.len();
    if sim.symplectic.synchronized || sim.symplectic.internal.len() != n {
        desynchronize(sim);
    }
    let dt = sim.dt;
    let half_dt = 0.5 * dt;

    // Drift
    for p in sim.symplectic.internal.iter_mut() {
        for c in 0..3 {
            p.pos[c] += half_dt * p.vel[c];
        }
    }

    // Inertial positions for the force evaluation
    let mut scratch = sim.bodies.clone();
    from_jacobi(
        &sim.symplectic.internal,
        &sim.symplectic.eta,
        &sim.bodies,
        &mut scratch,
    );
    let mut accel = vec![[0.0; 3]; n];
    accelerations(sim.gravity, sim.g, sim.softening, &scratch, &mut accel);

    // Kick, in Jacobi components
    let jaccel = accel_to_jacobi(&accel, &sim.bodies, &sim.symplectic.eta);
    for (p, a) in sim.symplectic.internal.iter_mut().zip(jaccel.iter()) {
        for c in 0..3 {
            p.vel[c] += dt * a[c];
        }
    }

    // Drift
    for p in sim.symplectic.internal.iter_mut() {
        for c in 0..3 {
            p.pos[c] += half_dt * p.vel[c];
        }
    }
    sim.t += dt;
}

/// Single-force-eval kick-drift leapfrog on the public array. Steppable but
/// not archivable; exists so the archive's unsupported-scheme path has a
/// live scheme to refuse.
fn step_leapfrog(sim: &mut Simulation) {
    let n = sim.bodies.len();
    let dt = sim.dt;
    let mut accel = vec![[0.0; 3]; n];
    accelerations(sim.gravity, sim.g, sim.softening, &sim.bodies, &mut accel);
    for (b, a) in sim.bodies.iter_mut().zip(accel.iter()) {
        for c in 0..3 {
            b.vel[c] += dt * a[c];
            b.pos[c] += dt * b.vel[c];
        }
    }
    sim.t += dt;
}

/// One compensated add: `sum += inc` with the round-off remainder kept in
/// `comp` (Kahan summation).
fn comp_add(sum: &mut f64, comp: &mut f64, inc: f64) {
    let y = inc - *comp;
    let t = *sum + y;
    *comp = (t - *sum) - y;
    *sum = t;
}

/// Compensated velocity-Verlet with a seven-row correction history and an
/// adaptive step-size controller.
fn step_extrapolation(sim: &mut Simulation) {
    let n = sim.bodies.len();
    sim.extrapolation.ensure_allocated(n);
    let dt = sim.dt;
    let half_dt = 0.5 * dt;

    let mut a_old = vec![[0.0; 3]; n];
    accelerations(sim.gravity, sim.g, sim.softening, &sim.bodies, &mut a_old);

    let ext = &mut sim.extrapolation;
    for (i, b) in sim.bodies.iter_mut().enumerate() {
        for c in 0..3 {
            comp_add(&mut b.vel[c], &mut ext.cs_vel[3 * i + c], half_dt * a_old[i][c]);
        }
    }
    for (i, b) in sim.bodies.iter_mut().enumerate() {
        for c in 0..3 {
            comp_add(&mut b.pos[c], &mut ext.cs_pos[3 * i + c], dt * b.vel[c]);
        }
    }

    let mut a_new = vec![[0.0; 3]; n];
    accelerations(sim.gravity, sim.g, sim.softening, &sim.bodies, &mut a_new);
    let ext = &mut sim.extrapolation;
    for (i, b) in sim.bodies.iter_mut().enumerate() {
        for c in 0..3 {
            comp_add(&mut b.vel[c], &mut ext.cs_vel[3 * i + c], half_dt * a_new[i][c]);
        }
    }

    // Correction history: keep the last seven per-component acceleration
    // increments, plus the per-step snapshots the estimator works from.
    ext.corr_last.copy_from(&ext.corr);
    ext.est_last.copy_from(&ext.est);

    ext.corr.rows.rotate_right(1);
    for i in 0..n {
        for c in 0..3 {
            ext.corr.rows[0][3 * i + c] = (a_new[i][c] - a_old[i][c]) * dt;
        }
    }
    ext.corr_comp.rows.rotate_right(1);
    ext.corr_comp.rows[0].copy_from_slice(&ext.cs_vel);

    for k in 0..7 {
        let scale = 1.0 / (k + 1) as f64;
        for j in 0..ext.corr.rows[k].len() {
            ext.est.rows[k][j] = ext.corr.rows[k][j] * scale;
        }
    }

    // Controller: the oldest correction row bounds the truncation error of
    // the history; shrink aggressively, grow cautiously.
    let mut err: f64 = 0.0;
    for v in &ext.corr.rows[6] {
        err = err.max(v.abs());
    }
    sim.dt_last_done = dt;
    sim.t += dt;
    if err > 1e-2 {
        sim.dt = 0.5 * dt;
    } else if err > 0.0 && err < 1e-10 {
        sim.dt = 2.0 * dt;
    }
}

/// Jacobi coordinates: entry 0 is the centre of mass, entry `i` the offset
/// of body `i` from the centre of mass of bodies `0..i`.
fn to_jacobi(bodies: &[Body], eta: &[f64], out: &mut [Body]) {
    let n = bodies.len();
    let mut s_pos = [0.0; 3];
    let mut s_vel = [0.0; 3];
    for i in 0..n {
        if i > 0 {
            for c in 0..3 {
                out[i].pos[c] = bodies[i].pos[c] - s_pos[c] / eta[i - 1];
                out[i].vel[c] = bodies[i].vel[c] - s_vel[c] / eta[i - 1];
            }
        }
        out[i].m = bodies[i].m;
        for c in 0..3 {
            s_pos[c] += bodies[i].m * bodies[i].pos[c];
            s_vel[c] += bodies[i].m * bodies[i].vel[c];
        }
    }
    for c in 0..3 {
        out[0].pos[c] = s_pos[c] / eta[n - 1];
        out[0].vel[c] = s_vel[c] / eta[n - 1];
    }
}

/// Inverse Jacobi transform. Masses come from the public array (the
/// internal copies are only refreshed opportunistically).
fn from_jacobi(internal: &[Body], eta: &[f64], bodies: &[Body], out: &mut [Body]) {
    let n = internal.len();
    // r_com starts as the total centre of mass and is peeled back one body
    // at a time.
    let mut r_pos = internal[0].pos;
    let mut r_vel = internal[0].vel;
    for i in (1..n).rev() {
        let m_i = bodies[i].m;
        for c in 0..3 {
            let pos = internal[i].pos[c] * (eta[i - 1] / eta[i]) + r_pos[c];
            let vel = internal[i].vel[c] * (eta[i - 1] / eta[i]) + r_vel[c];
            out[i].pos[c] = pos;
            out[i].vel[c] = vel;
            r_pos[c] = (eta[i] * r_pos[c] - m_i * pos) / eta[i - 1];
            r_vel[c] = (eta[i] * r_vel[c] - m_i * vel) / eta[i - 1];
        }
    }
    out[0].pos = r_pos;
    out[0].vel = r_vel;
}

/// Applies the (linear) Jacobi map to acceleration vectors.
fn accel_to_jacobi(accel: &[[f64; 3]], bodies: &[Body], eta: &[f64]) -> Vec<[f64; 3]> {
    let n = accel.len();
    let mut out = vec![[0.0; 3]; n];
    let mut s = [0.0; 3];
    for i in 0..n {
        if i > 0 {
            for c in 0..3 {
                out[i][c] = accel[i][c] - s[c] / eta[i - 1];
            }
        }
        for c in 0..3 {
            s[c] += bodies[i].m * accel[i][c];
        }
    }
    for c in 0..3 {
        out[0][c] = s[c] / eta[n - 1];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Gravity, SymplecticState};

    fn two_body_sim() -> Simulation {
        let mut sim = Simulation::new();
        sim.dt = 0.001;
        sim.bodies = vec![
            Body::new(1.0, [0.0; 3], [0.0; 3]),
            Body::new(1e-3, [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ];
        sim
    }

    #[test]
    fn test_jacobi_roundtrip() {
        let bodies = vec![
            Body::new(1.0, [0.1, -0.2, 0.3], [0.0, 0.5, 0.0]),
            Body::new(0.5, [1.0, 0.0, 0.0], [0.0, 1.0, 0.1]),
            Body::new(0.25, [-2.0, 1.0, 0.5], [0.3, -0.4, 0.0]),
        ];
        let mut state = SymplecticState::default();
        state.rebuild_masses(&bodies);

        let mut jac = vec![Body::default(); 3];
        to_jacobi(&bodies, &state.eta, &mut jac);
        let mut back = vec![Body::default(); 3];
        from_jacobi(&jac, &state.eta, &bodies, &mut back);

        for (orig, rec) in bodies.iter().zip(back.iter()) {
            for c in 0..3 {
                assert!((orig.pos[c] - rec.pos[c]).abs() < 1e-12);
                assert!((orig.vel[c] - rec.vel[c]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_step_advances_time() {
        let mut sim = two_body_sim();
        sim.step();
        assert_eq!(sim.t, 0.001);
    }

    #[test]
    fn test_stepping_is_deterministic() {
        let mut a = two_body_sim();
        let mut b = two_body_sim();
        for _ in 0..100 {
            a.step();
            b.step();
        }
        for (x, y) in a.bodies.iter().zip(b.bodies.iter()) {
            for c in 0..3 {
                assert_eq!(x.pos[c].to_bits(), y.pos[c].to_bits());
                assert_eq!(x.vel[c].to_bits(), y.vel[c].to_bits());
            }
        }
    }

    #[test]
    fn test_unsynchronized_step_desynchronizes() {
        let mut sim = two_body_sim();
        sim.symplectic.safe_mode = false;
        sim.step();
        assert!(!sim.symplectic.synchronized);
        assert_eq!(sim.symplectic.internal.len(), 2);
        assert_eq!(sim.symplectic.eta, vec![1.0, 1.001]);

        sim.synchronize();
        assert!(sim.symplectic.synchronized);
    }

    #[test]
    fn test_synchronized_matches_safe_mode_first_step() {
        // One step from the same start: the Jacobi path, once synchronized,
        // should land close to the plain Verlet path (different operation
        // order, so not bit-identical; physically equivalent).
        let mut safe = two_body_sim();
        let mut fast = two_body_sim();
        fast.symplectic.safe_mode = false;

        safe.step();
        fast.step();
        fast.synchronize();

        for (a, b) in safe.bodies.iter().zip(fast.bodies.iter()) {
            for c in 0..3 {
                assert!((a.pos[c] - b.pos[c]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_extrapolation_fills_buffers() {
        let mut sim = two_body_sim();
        sim.scheme = Scheme::Extrapolation;
        sim.step();

        assert_eq!(sim.dt_last_done, 0.001);
        let ext = &sim.extrapolation;
        assert_eq!(ext.cs_pos.len(), 6);
        assert!(ext.corr.rows[0].iter().any(|&v| v != 0.0));
        // est is a scaled copy of corr
        assert_eq!(ext.est.rows[0][0], ext.corr.rows[0][0]);
        assert_eq!(ext.est.rows[1][1], ext.corr.rows[1][1] * 0.5);
    }

    #[test]
    fn test_leapfrog_steps_without_gravity() {
        let mut sim = two_body_sim();
        sim.scheme = Scheme::Leapfrog;
        sim.gravity = Gravity::None;
        sim.step();
        // Pure drift
        assert_eq!(sim.bodies[1].pos[1], 0.001);
    }
}
