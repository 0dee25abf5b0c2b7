//! Sender and receiver session states.
//!
//! A peer can hold both roles at once (it may be streaming a payload out
//! while the remote streams one in), so the two sides are tracked
//! independently.

use fraglink_protocol::SequenceNumber;

/// State of the sending side of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    /// Nothing to send.
    Idle,
    /// START emitted, waiting for the matching ANSWER.
    AwaitingAnswer {
        /// The randomized sequence the START carried.
        start_sequence: SequenceNumber,
    },
    /// Data fragments are flowing, paced by the window.
    Streaming,
    /// All fragments confirmed, FINISH emitted, waiting for its confirmation.
    AwaitingFinishAck {
        /// The sequence the FINISH carried.
        finish_sequence: SequenceNumber,
    },
}

impl SendState {
    /// Whether a new payload may start right away.
    pub fn is_idle(&self) -> bool {
        matches!(self, SendState::Idle)
    }
}

/// State of the receiving side of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvState {
    /// No inbound session.
    Idle,
    /// A START was answered; fragments are being reassembled.
    Receiving,
}

impl RecvState {
    /// Whether an inbound session is in progress.
    pub fn is_receiving(&self) -> bool {
        matches!(self, RecvState::Receiving)
    }
}
