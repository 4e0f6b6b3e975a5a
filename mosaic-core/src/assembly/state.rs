//! Reconstruction state machine.
//!
//! ```text
//!  AwaitingFirstFrame ──► Accumulating ──► Complete
//!          │                   │
//!          └───────► Aborted ◄─┘
//! ```

use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssemblyState {
    /// Handshake done, no frame seen yet.
    #[default]
    AwaitingFirstFrame,

    /// `expected_total_frames` is recorded; chunks are arriving.
    Accumulating,

    /// Every expected grid position has been filled.
    Complete,

    /// The stream ended or failed before completion.
    Aborted,
}

impl std::fmt::Display for AssemblyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingFirstFrame => write!(f, "AwaitingFirstFrame"),
            Self::Accumulating => write!(f, "Accumulating"),
            Self::Complete => write!(f, "Complete"),
            Self::Aborted => write!(f, "Aborted"),
        }
    }
}

impl AssemblyState {
    /// Whether frames are still accepted.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::AwaitingFirstFrame | Self::Accumulating)
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Valid from: `AwaitingFirstFrame`.
    pub fn begin_accumulating(&mut self) -> Result<(), ProtocolError> {
        match self {
            Self::AwaitingFirstFrame => {
                *self = Self::Accumulating;
                Ok(())
            }
            _ => Err(ProtocolError::Violation(
                "cannot start accumulating: first frame already seen",
            )),
        }
    }

    /// Valid from: `Accumulating`.
    pub fn complete(&mut self) -> Result<(), ProtocolError> {
        match self {
            Self::Accumulating => {
                *self = Self::Complete;
                Ok(())
            }
            _ => Err(ProtocolError::Violation(
                "cannot complete: not accumulating",
            )),
        }
    }

    /// Valid from any open state. Aborting twice is a no-op.
    pub fn abort(&mut self) -> Result<(), ProtocolError> {
        match self {
            Self::AwaitingFirstFrame | Self::Accumulating | Self::Aborted => {
                *self = Self::Aborted;
                Ok(())
            }
            Self::Complete => Err(ProtocolError::Violation(
                "cannot abort: reconstruction already complete",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let mut state = AssemblyState::default();
        assert!(state.is_open());
        state.begin_accumulating().unwrap();
        state.complete().unwrap();
        assert_eq!(state, AssemblyState::Complete);
        assert!(!state.is_open());
    }

    #[test]
    fn invalid_transitions() {
        let mut state = AssemblyState::default();
        assert!(state.complete().is_err());

        state.begin_accumulating().unwrap();
        assert!(state.begin_accumulating().is_err());

        state.complete().unwrap();
        assert!(state.abort().is_err());
    }

    #[test]
    fn abort_from_open_states() {
        let mut state = AssemblyState::default();
        state.abort().unwrap();
        state.abort().unwrap();
        assert_eq!(state, AssemblyState::Aborted);

        let mut state = AssemblyState::Accumulating;
        state.abort().unwrap();
        assert!(state.begin_accumulating().is_err());
    }
}
