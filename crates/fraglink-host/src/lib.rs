#![warn(missing_docs)]

//! fraglink-host: the event loop.
//!
//! An [`Endpoint`] binds a UDP socket, owns one peer engine, and drives it
//! from a single polling loop: retransmission and heartbeat sweeps, inbound
//! datagrams, operator commands, outbound flush. Collaborator tasks talk to
//! the loop exclusively through crossbeam channels.

/// The UDP endpoint and its polling loop.
pub mod endpoint;

pub use endpoint::{Clock, Endpoint, SystemClock};
