//! Commands into the engine, events out of it, and the action type the event
//! loop flushes.

use std::{path::PathBuf, time::Duration};

/// Instructions the peer engine hands back to the event loop.
#[derive(Debug)]
pub enum Action {
    /// Send the given datagram to the remote peer.
    Send(Vec<u8>),
    /// Emit an event to the user.
    Emit(Event),
}

/// Per-transfer knobs exposed to the operator.
#[derive(Debug, Clone, Default)]
pub struct TransferOptions {
    /// Payload bytes per fragment; `None` uses the configured default. Always
    /// capped at the protocol maximum.
    pub fragment_size: Option<u16>,
    /// Send the first data packet with a zeroed checksum to exercise the
    /// resend path.
    pub corrupt_first_packet: bool,
}

/// Operator commands accepted by the engine.
#[derive(Debug)]
pub enum Command {
    /// Transmit a text message.
    SendMessage {
        /// The message bytes.
        data: Vec<u8>,
        /// Per-transfer options.
        options: TransferOptions,
    },
    /// Transmit a named file.
    SendFile {
        /// File name presented to the remote peer.
        name: String,
        /// File content.
        content: Vec<u8>,
        /// Per-transfer options.
        options: TransferOptions,
    },
    /// Change the folder where received files are written.
    SetDestination(PathBuf),
}

/// Summary of one completed outbound transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferStats {
    /// Payload bytes conveyed (file name included for file transfers).
    pub payload_bytes: u64,
    /// Number of fragments the payload was split into.
    pub fragments: u32,
    /// The nominal fragment size used.
    pub nominal_fragment_size: u16,
    /// Size of the smallest fragment sent (usually the last one).
    pub smallest_fragment: Option<usize>,
    /// Wall time from session acceptance to the finish confirmation.
    pub duration: Duration,
    /// Share of the bytes on the wire spent on packet headers.
    pub header_overhead: f64,
}

/// Events emitted to the user.
#[derive(Debug)]
pub enum Event {
    /// A complete text message arrived.
    MessageReceived(Vec<u8>),
    /// A complete file arrived and was persisted.
    FileReceived {
        /// The file name announced by the sender.
        name: String,
        /// Where the file was written.
        path: PathBuf,
    },
    /// An outbound transfer finished and was confirmed by the peer.
    TransferComplete(TransferStats),
    /// A keep-alive probe went unanswered.
    HeartbeatMissed(u32),
    /// The heartbeat failure threshold was reached; the connection is dead.
    ConnectionLost,
}
