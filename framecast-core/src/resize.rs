//! Resolution-change state machine.
//!
//! A resize cannot happen in place: the transport may still be reading
//! a pool buffer and the device may still be copying into a staging
//! surface. The phases order the work so nothing is freed while
//! referenced, with validated transitions that return `Result` instead
//! of panicking.

use crate::error::RelayError;

// ── ResizePhase ──────────────────────────────────────────────────

/// Where a reconfiguration currently stands.
///
/// ```text
///  Stable ──► Teardown ──► Reallocate ──► Reconnect ──► Stable
///    │                                        ▲
///    └────────────────────────────────────────┘  (rename only)
/// ```
///
/// The pipeline walks an entire cycle within one tick, so the phase is
/// `Stable` whenever control returns to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizePhase {
    /// Pools and sender match the current source dimensions.
    #[default]
    Stable,

    /// Flushing the sender and releasing old pools.
    Teardown,

    /// Building pools at the new dimensions.
    Reallocate,

    /// Recreating the sender (also entered directly on a bare rename).
    Reconnect,
}

impl std::fmt::Display for ResizePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stable => write!(f, "Stable"),
            Self::Teardown => write!(f, "Teardown"),
            Self::Reallocate => write!(f, "Reallocate"),
            Self::Reconnect => write!(f, "Reconnect"),
        }
    }
}

impl ResizePhase {
    pub fn is_stable(&self) -> bool {
        matches!(self, Self::Stable)
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Teardown`.
    ///
    /// Valid from: `Stable`.
    pub fn begin_teardown(&mut self) -> Result<(), RelayError> {
        match self {
            Self::Stable => {
                *self = Self::Teardown;
                Ok(())
            }
            _ => Err(RelayError::ResizeTransition(
                "cannot tear down: not in Stable phase",
            )),
        }
    }

    /// Transition to `Reallocate`.
    ///
    /// Valid from: `Teardown`.
    pub fn begin_reallocate(&mut self) -> Result<(), RelayError> {
        match self {
            Self::Teardown => {
                *self = Self::Reallocate;
                Ok(())
            }
            _ => Err(RelayError::ResizeTransition(
                "cannot reallocate: not in Teardown phase",
            )),
        }
    }

    /// Transition to `Reconnect`.
    ///
    /// Valid from: `Reallocate`, or `Stable` for a rename that leaves
    /// the pools untouched.
    pub fn begin_reconnect(&mut self) -> Result<(), RelayError> {
        match self {
            Self::Reallocate | Self::Stable => {
                *self = Self::Reconnect;
                Ok(())
            }
            _ => Err(RelayError::ResizeTransition(
                "cannot reconnect: not in Reallocate or Stable phase",
            )),
        }
    }

    /// Transition back to `Stable`.
    ///
    /// Valid from: `Reconnect`.
    pub fn settle(&mut self) -> Result<(), RelayError> {
        match self {
            Self::Reconnect => {
                *self = Self::Stable;
                Ok(())
            }
            _ => Err(RelayError::ResizeTransition(
                "cannot settle: not in Reconnect phase",
            )),
        }
    }

    /// Force-reset to `Stable` regardless of current phase.
    ///
    /// Use this when a reconfiguration aborts partway (e.g. pool
    /// allocation failed) and the pipeline falls back to unallocated.
    pub fn force_stable(&mut self) {
        *self = Self::Stable;
    }
}

// ── Tests ────────────────────────────────────────────────────────
