#![warn(missing_docs)]

//! Fraglink: a small public API facade for the workspace.
//!
//! This crate provides a clean, stable surface that re-exports the most
//! commonly used types for peer-to-peer reliable datagram transfer:
//!
//! - Endpoint and its channels (`Endpoint`)
//! - Operator commands and user events (`Command`, `Event`, `TransferOptions`)
//! - Core configuration (`Config`)
//!
//! Example
//! ```ignore
//! use fraglink::{Command, Config, Endpoint, Event, TransferOptions};
//!
//! let remote = "192.0.2.7:9000".parse().unwrap();
//! let mut endpoint = Endpoint::bind("0.0.0.0:9000", remote).unwrap();
//!
//! endpoint
//!     .send(Command::SendMessage {
//!         data: b"hello".to_vec(),
//!         options: TransferOptions::default(),
//!     })
//!     .unwrap();
//!
//! // Poll once; in a real peer this runs in a loop.
//! use std::time::Instant;
//! endpoint.manual_poll(Instant::now());
//!
//! if let Some(Event::MessageReceived(data)) = endpoint.recv() {
//!     println!("peer says: {}", String::from_utf8_lossy(&data));
//! }
//! ```

// Core config
pub use fraglink_core::config::Config;
// Host: the endpoint and its polling loop
pub use fraglink_host::{Clock, Endpoint, SystemClock};
// Peer: commands, events, transfer options
pub use fraglink_peer::{Command, Event, TransferOptions, TransferStats};
// Protocol: wire-level types for advanced uses
pub use fraglink_protocol::{Packet, PacketBody, PacketKind};

/// Convenience prelude with the most commonly used items.
pub mod prelude {
    pub use crate::{Command, Config, Endpoint, Event, TransferOptions, TransferStats};
}
