// src/sim/mod.rs

//! Simulation state: bodies, integration schemes, and scheme-private buffers.
//!
//! The archive core never owns a simulation; it receives a mutable reference,
//! reads configuration fields from it, and writes results back into the same
//! structure. Everything the archive persists lives here (plus the archive
//! metadata in [`crate::archive::ArchiveState`]).

pub mod gravity;
pub mod stepper;

use serde::{Deserialize, Serialize};

use crate::archive::ArchiveState;
use crate::config::SimulationConfig;
use crate::diagnostics::Diagnostics;
use crate::error::Result;

/// One point mass: mass, position, velocity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub m: f64,
    pub pos: [f64; 3],
    pub vel: [f64; 3],
}

impl Body {
    pub fn new(m: f64, pos: [f64; 3], vel: [f64; 3]) -> Self {
        Self { m, pos, vel }
    }
}

/// Integration scheme. Closed set: the archive supports exactly
/// `Symplectic` and `Extrapolation`; `Leapfrog` can be stepped but has no
/// archive record layout and triggers the unsupported-scheme advisory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Symplectic,
    Extrapolation,
    Leapfrog,
}

/// Force-computation method. The archive accepts `Basic` and `None`;
/// anything else raises the unsupported-force-model advisory at the first
/// heartbeat (the initial snapshot is still written).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gravity {
    None,
    #[default]
    Basic,
    Tree,
}

/// Private state of the symplectic scheme.
///
/// With `safe_mode` on, the public body array is both source and destination
/// of every step. With `safe_mode` off the scheme keeps Jacobi coordinates
/// in `internal` and only maps back to the public array on
/// [`Simulation::synchronize`]; `eta` holds the cumulative masses the
/// transform needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SymplecticState {
    pub safe_mode: bool,
    pub synchronized: bool,
    pub internal: Vec<Body>,
    pub eta: Vec<f64>,
}

impl Default for SymplecticState {
    fn default() -> Self {
        Self {
            safe_mode: true,
            synchronized: true,
            internal: Vec::new(),
            eta: Vec::new(),
        }
    }
}

impl SymplecticState {
    /// Reallocates the auxiliary arrays for `n` bodies if they are not
    /// already at that size. Contents are zeroed on reallocation.
    pub fn ensure_allocated(&mut self, n: usize) {
        if self.internal.len() != n {
            self.internal = vec![Body::default(); n];
        }
        if self.eta.len() != n {
            self.eta = vec![0.0; n];
        }
    }

    /// Rebuilds the cumulative-mass array (and the internal copies of the
    /// per-body masses) from the public masses. The cumulative array is
    /// always rederived, never persisted on its own.
    pub fn rebuild_masses(&mut self, bodies: &[Body]) {
        self.ensure_allocated(bodies.len());
        let mut acc = 0.0;
        for (i, b) in bodies.iter().enumerate() {
            acc += b.m;
            self.eta[i] = acc;
            self.internal[i].m = b.m;
        }
    }
}

/// One extrapolation-coefficient table: 7 sub-arrays, each holding one
/// double per spatial component per body per correction order (`3N` each).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoeffTable {
    pub rows: [Vec<f64>; 7],
}

impl CoeffTable {
    fn ensure_allocated(&mut self, n3: usize) {
        for row in &mut self.rows {
            if row.len() != n3 {
                *row = vec![0.0; n3];
            }
        }
    }

    fn copy_from(&mut self, other: &CoeffTable) {
        for (dst, src) in self.rows.iter_mut().zip(other.rows.iter()) {
            dst.copy_from_slice(src);
        }
    }
}

/// Private state of the high-order adaptive extrapolation scheme: five
/// coefficient tables plus the two compensated-summation buffers for
/// position and velocity. The current and last-completed step sizes live on
/// [`Simulation`] itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtrapolationState {
    pub corr: CoeffTable,
    pub corr_comp: CoeffTable,
    pub est: CoeffTable,
    pub corr_last: CoeffTable,
    pub est_last: CoeffTable,
    pub cs_pos: Vec<f64>,
    pub cs_vel: Vec<f64>,
}

impl ExtrapolationState {
    /// Reallocates all scratch storage for `n` bodies if not already sized
    /// to `3n`. Contents are zeroed on reallocation.
    pub fn ensure_allocated(&mut self, n: usize) {
        let n3 = 3 * n;
        self.corr.ensure_allocated(n3);
        self.corr_comp.ensure_allocated(n3);
        self.est.ensure_allocated(n3);
        self.corr_last.ensure_allocated(n3);
        self.est_last.ensure_allocated(n3);
        if self.cs_pos.len() != n3 {
            self.cs_pos = vec![0.0; n3];
        }
        if self.cs_vel.len() != n3 {
            self.cs_vel = vec![0.0; n3];
        }
    }
}

/// Complete simulator state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Simulation {
    /// Current simulation time.
    pub t: f64,
    /// Current step size.
    pub dt: f64,
    /// Step size of the last completed extrapolation step.
    pub dt_last_done: f64,
    pub bodies: Vec<Body>,
    pub scheme: Scheme,
    pub gravity: Gravity,
    /// Gravitational constant.
    pub g: f64,
    /// Plummer softening length.
    pub softening: f64,
    pub symplectic: SymplecticState,
    pub extrapolation: ExtrapolationState,
    pub archive: ArchiveState,
    #[serde(skip)]
    pub diagnostics: Diagnostics,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            t: 0.0,
            dt: 0.01,
            dt_last_done: 0.0,
            bodies: Vec::new(),
            scheme: Scheme::default(),
            gravity: Gravity::default(),
            g: 1.0,
            softening: 0.0,
            symplectic: SymplecticState::default(),
            extrapolation: ExtrapolationState::default(),
            archive: ArchiveState::default(),
            diagnostics: Diagnostics::default(),
        }
    }
}

impl Simulation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a simulation from a validated configuration and an initial
    /// set of bodies.
    pub fn from_config(config: &SimulationConfig, bodies: Vec<Body>) -> Self {
        Self {
            dt: config.integration.dt,
            scheme: config.integration.scheme,
            gravity: config.integration.gravity,
            g: config.integration.g,
            softening: config.integration.softening,
            symplectic: SymplecticState {
                safe_mode: config.integration.safe_mode,
                ..SymplecticState::default()
            },
            archive: ArchiveState {
                path: config.archive.path.clone(),
                interval: config.archive.interval,
                ..ArchiveState::default()
            },
            bodies,
            ..Self::default()
        }
    }

    pub fn n(&self) -> usize {
        self.bodies.len()
    }

    /// Advances the simulation by one step of the active scheme.
    pub fn step(&mut self) {
        stepper::step(self);
    }

    /// Maps unsynchronized internal coordinates back into the public body
    /// array. No-op for schemes and modes that keep the public array
    /// current.
    pub fn synchronize(&mut self) {
        stepper::synchronize(self);
    }

    /// Drives the stepping loop, invoking the archive heartbeat once per
    /// step (including once before the first step, which is where the
    /// archive initializes itself at `t == 0`).
    pub fn integrate(&mut self, tmax: f64) -> Result<()> {
        while self.t < tmax {
            crate::archive::heartbeat(self)?;
            self.step();
        }
        crate::archive::heartbeat(self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symplectic_ensure_allocated() {
        let mut state = SymplecticState::default();
        state.ensure_allocated(3);
        assert_eq!(state.internal.len(), 3);
        assert_eq!(state.eta.len(), 3);

        // Same size: existing storage kept
        state.internal[1].m = 5.0;
        state.ensure_allocated(3);
        assert_eq!(state.internal[1].m, 5.0);

        // Different size: reallocated and zeroed
        state.ensure_allocated(4);
        assert_eq!(state.internal.len(), 4);
        assert_eq!(state.internal[1].m, 0.0);
    }

    #[test]
    fn test_rebuild_masses_is_cumulative() {
        let bodies = vec![
            Body::new(1.0, [0.0; 3], [0.0; 3]),
            Body::new(0.5, [1.0, 0.0, 0.0], [0.0; 3]),
            Body::new(0.25, [2.0, 0.0, 0.0], [0.0; 3]),
        ];
        let mut state = SymplecticState::default();
        state.rebuild_masses(&bodies);

        assert_eq!(state.eta, vec![1.0, 1.5, 1.75]);
        assert_eq!(state.internal[2].m, 0.25);
    }

    #[test]
    fn test_extrapolation_ensure_allocated() {
        let mut state = ExtrapolationState::default();
        state.ensure_allocated(2);
        for row in &state.corr.rows {
            assert_eq!(row.len(), 6);
        }
        assert_eq!(state.cs_pos.len(), 6);
        assert_eq!(state.cs_vel.len(), 6);
    }
}
