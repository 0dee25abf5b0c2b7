//! Transport abstraction for pluggable I/O.

use std::{io::Result, net::SocketAddr};

/// Low-level datagram socket abstraction.
///
/// Lets different transports (UDP, in-memory test links) be plugged into the
/// event loop without coupling it to a concrete implementation.
pub trait Socket {
    /// Sends a single datagram to the given address.
    fn send_packet(&mut self, addr: &SocketAddr, payload: &[u8]) -> Result<usize>;

    /// Receives a single datagram into `buffer`, returning the filled slice
    /// and the sender address.
    fn receive_packet<'a>(&mut self, buffer: &'a mut [u8]) -> Result<(&'a [u8], SocketAddr)>;

    /// Returns the local address this socket is bound to.
    fn local_addr(&self) -> Result<SocketAddr>;

    /// Returns whether the socket operates in blocking mode.
    fn is_blocking_mode(&self) -> bool;
}
