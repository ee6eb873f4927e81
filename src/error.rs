//! Error types for the stream clock (thiserror-based).
//!
//! The clock itself is permissive: no public operation returns an error.
//! These values are produced by the internal validity checks and logged
//! at ERROR level by the code that holds the lock.

use thiserror::Error;

use crate::state::{TransportInput, TransportState};

/// Errors detected by the transport state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClockError {
    /// A state change was requested that the transition table forbids.
    #[error("illegal transport transition {from} -> {to} on input {input}")]
    IllegalTransition {
        from: TransportState,
        to: TransportState,
        input: TransportInput,
    },

    /// `resume()` was called while the clock was not paused.
    #[error("resume() called in state {state}, expected Paused")]
    NotPaused { state: TransportState },
}
