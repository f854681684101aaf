// src/lib.rs

//! N-body Simulation Archive - Core Library
//!
//! This crate provides checkpoint/restart support for a stepping N-body
//! simulator: periodic appends of the simulator's complete internal state
//! (including integrator-private buffers) to an append-only binary archive,
//! and exact reconstruction of a continuation state from any recorded
//! checkpoint.

pub mod config;
pub mod diagnostics;
pub mod error;

// Re-export commonly used types for convenience
pub use config::SimulationConfig;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{ArchiveError, Result};

pub mod sim;
pub use sim::{Body, Gravity, Scheme, Simulation};

pub mod snapshot;

pub mod archive;
pub use archive::{estimate_size, heartbeat, load_record, restart, ArchiveState};
