#![warn(missing_docs)]

//! fraglink-peer: the per-peer transport engine.
//!
//! One [`Peer`] value holds everything a session needs: the sender and
//! receiver state machines, the outbound fragmenter, the in-flight table
//! driving retransmission, the RTT-adaptive window controller, the reassembly
//! store, and the keep-alive supervisor. It is a pure state machine over
//! decoded packets and wall-clock instants: the event loop feeds it datagrams,
//! operator commands and time, and flushes the [`Action`]s it returns.

/// Operator commands, user-facing events and the action type returned to the
/// event loop.
pub mod events;
/// Writes a received file as `<name>.tmp` and renames it on completion.
pub mod file_writer;
/// Slices an outbound payload into sequence-numbered fragments.
pub mod fragmenter;
/// Tracks sent-but-unconfirmed packets for RTT sampling and resends.
pub mod inflight;
/// Emits probes on idle links and decides when the connection is dead.
pub mod keepalive;
/// Accumulates received message bytes, spilling to disk past a threshold.
pub mod message_buffer;
/// The session engine tying all components together.
pub mod peer;
/// Sender and receiver state enums.
pub mod peer_state;
/// Buffers out-of-order fragments for contiguous delivery.
pub mod reassembly;
/// Adapts the sliding window to measured round-trip times.
pub mod window;

pub use events::{Action, Command, Event, TransferOptions, TransferStats};
pub use fragmenter::{OutboundTransfer, Payload};
pub use peer::Peer;
