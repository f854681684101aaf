// src/diagnostics.rs

//! Advisory error/warning channel carried by the simulation.
//!
//! The archive core distinguishes hard failures (returned as
//! [`crate::error::ArchiveError`]) from advisory conditions that signal
//! degraded correctness without aborting the requested operation: an
//! unsupported integration scheme, an unsupported force model, a malformed
//! initial snapshot. Advisory conditions are recorded here, on the
//! simulation itself, and the call still returns success. Callers are
//! expected to inspect this channel after any checkpoint/restore operation.

use tracing::{error, warn};

/// Severity of a recorded diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One advisory message recorded on the simulation.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

/// Ordered list of advisory messages for one simulation. In-memory only:
/// the snapshot codec skips this field, so messages never persist across a
/// restart.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    messages: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an advisory error and mirrors it to the log.
    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!(target: "nbody_archive", "{message}");
        self.messages.push(Diagnostic {
            severity: Severity::Error,
            message,
        });
    }

    /// Records an advisory warning and mirrors it to the log.
    pub fn warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(target: "nbody_archive", "{message}");
        self.messages.push(Diagnostic {
            severity: Severity::Warning,
            message,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.messages.iter()
    }

    /// Returns true if any recorded message has `Error` severity.
    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|d| d.severity == Severity::Error)
    }

    /// Drains all recorded messages, leaving the channel empty.
    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.messages)
    }
}
