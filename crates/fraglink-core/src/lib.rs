#![warn(missing_docs)]

//! fraglink-core: foundational types and utilities.
//!
//! This crate provides the minimal set of core types shared across all layers:
//! - Configuration
//! - Error handling
//! - Protocol constants
//! - Transport abstraction for pluggable I/O
//!
//! Protocol and engine logic lives in the specialized crates:
//! - `fraglink-protocol`: wire format, codec, checksums
//! - `fraglink-peer`: session state machine, fragmentation, retransmission
//! - `fraglink-host`: event loop over a datagram socket

/// Protocol constants shared across layers.
pub mod constants {
    /// The size of the packet header in bytes.
    ///
    /// sequence (4) + kind (1) + checksum (4) + window (2) + flags (1) + name_length (2).
    pub const HEADER_SIZE: usize = 14;
    /// Maximum number of payload bytes per fragment.
    ///
    /// Chosen to clear a typical Ethernet MTU once IP and UDP headers are
    /// accounted for: 1500 - 20 - 8 - 14 = 1458.
    pub const MAX_FRAGMENT_SIZE: u16 = 1458;
    /// Size of the datagram receive buffer; longer datagrams are truncated.
    pub const MAX_DATAGRAM_SIZE: usize = 1500;
    /// How long a sent packet may stay unacknowledged before it is resent, in milliseconds.
    pub const RESEND_TIMEOUT_MS: u64 = 10_000;
    /// Interval between keep-alive probes while the link is idle, in milliseconds.
    pub const KEEP_ALIVE_INTERVAL_MS: u64 = 5_000;
    /// Age of the newest keep-alive reply beyond which a probe counts as failed, in milliseconds.
    pub const TIMEOUT_THRESHOLD_MS: u64 = 15_000;
    /// Consecutive keep-alive failures tolerated before the connection is torn down.
    pub const HEARTBEAT_FAILURE_THRESHOLD: u32 = 3;
    /// Smoothing factor for the RTT moving average.
    pub const RTT_SMOOTHING_FACTOR: f64 = 0.2;
    /// Smoothed RTT below this grows the window, above shrinks it, in milliseconds.
    pub const RTT_THRESHOLD_MS: u64 = 100;
    /// Smoothed RTT starting value, in milliseconds.
    pub const INITIAL_RTT_MS: u64 = 100;
    /// Window size at session start, in fragments.
    pub const INITIAL_WINDOW_SIZE: u16 = 4;
    /// The window never shrinks below this many fragments.
    pub const MIN_WINDOW_SIZE: u16 = 1;
    /// Received-message bytes kept in memory before spilling to a temp file.
    pub const MESSAGE_SPILL_THRESHOLD: usize = 1024 * 1024;
}

/// Configuration options for the transport and runtime.
pub mod config;
/// Error types and results.
pub mod error;
/// Transport abstraction for pluggable I/O.
pub mod transport;
