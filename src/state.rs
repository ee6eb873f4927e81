//! Transport state machine for the stream clock.
//!
//! Three states, six inputs. The only legal edges:
//!
//! ```text
//!    STOPPED ---post_buffer--> ROLLING ---pause--> PAUSED
//!       ^                        |  ^                |
//!       |                        |  +--post_buffer---+
//!       |                    stop or
//!       |                   underrun
//!       +------------------------+
//!    PAUSED ---stop/seek--> STOPPED
//!    ROLLING --overrun--> ROLLING   (self-loop, abrupt re-pin)
//! ```
//!
//! Every other (from, to, input) triple is a programmer error. The clock
//! stays permissive: the transition is still applied, the error is logged.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ClockError;

/// The clock's transport mode.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportState {
    /// Media is not moving, the clock is frozen, the FIFOs are flushed.
    /// This is the initial state.
    #[default]
    Stopped,
    /// The pipeline is at steady state and the feedback loop controls how
    /// time progresses.
    Rolling,
    /// Media is not moving, the clock is frozen, the FIFOs keep their
    /// contents. Leaving this state normally goes back to Rolling.
    Paused,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportState::Stopped => "Stopped",
            TransportState::Rolling => "Rolling",
            TransportState::Paused => "Paused",
        };
        write!(f, "{s}")
    }
}

/// The input (reason) for a state change.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportInput {
    Stop,
    Seek,
    Pause,
    PostBuffer,
    ErrUnderrun,
    ErrOverrun,
}

impl fmt::Display for TransportInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportInput::Stop => "Stop",
            TransportInput::Seek => "Seek",
            TransportInput::Pause => "Pause",
            TransportInput::PostBuffer => "PostBuffer",
            TransportInput::ErrUnderrun => "ErrUnderrun",
            TransportInput::ErrOverrun => "ErrOverrun",
        };
        write!(f, "{s}")
    }
}

/// Check a (from, to, input) triple against the transition table.
///
/// Same-state requests are always legal here; the caller filters them out
/// before consulting the table.
pub(crate) fn check_transition(
    from: TransportState,
    to: TransportState,
    input: TransportInput,
) -> Result<(), ClockError> {
    use crate::state::{TransportInput as In, TransportState as St};

    let legal = match (from, to) {
        (St::Stopped, St::Stopped) | (St::Rolling, St::Rolling) | (St::Paused, St::Paused) => true,
        (St::Stopped, St::Rolling) => matches!(input, In::PostBuffer),
        (St::Stopped, St::Paused) => false,
        (St::Rolling, St::Paused) => matches!(input, In::Pause),
        (St::Rolling, St::Stopped) => matches!(input, In::Stop | In::ErrUnderrun),
        (St::Paused, St::Rolling) => matches!(input, In::PostBuffer),
        (St::Paused, St::Stopped) => matches!(input, In::Stop | In::Seek),
    };

    if legal {
        Ok(())
    } else {
        Err(ClockError::IllegalTransition { from, to, input })
    }
}
