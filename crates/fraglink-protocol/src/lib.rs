#![warn(missing_docs)]

//! fraglink-protocol: the wire format.
//!
//! Defines the packet model (`Packet`, `PacketKind`, `PacketBody`), the codec
//! that turns packets into datagrams and back (`codec`), and the CRC32
//! helpers used for corruption detection (`checksum`).
//!
//! Every packet starts with a fixed 14-byte header:
//!
//! ```text
//! +----------+------+----------+--------+-------+-------------+- - - - - -+
//! | sequence | kind | checksum | window | flags | name_length |  payload  |
//! |  u32 BE  |  u8  |  u32 BE  | u16 BE |  u8   |   u16 BE    | 0..=1458  |
//! +----------+------+----------+--------+-------+-------------+- - - - - -+
//! ```
//!
//! The checksum covers every header field except itself, plus the payload
//! when the kind carries one.

/// Packet structures and kind/flag encodings.
pub mod packet;
/// Encoding and decoding of packets.
pub mod codec;
/// CRC32 checksum helpers.
pub mod checksum;

pub use codec::{decode, encode, encode_corrupted, Decoded};
pub use packet::{Packet, PacketBody, PacketKind, SequenceNumber};
