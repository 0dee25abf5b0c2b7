//! Packet types and structures for the datagram protocol.
//!
//! This module provides the core wire-level types:
//! - `Packet`: one decoded/encodable protocol packet
//! - `PacketKind`: the ten packet kinds of the protocol
//! - `PacketBody`: tagged payload variant (none, message bytes, file fragment)
//! - `flags`: the flag values carried on START and FINISH packets

use std::convert::TryFrom;

use fraglink_core::error::{DecodingErrorKind, ErrorKind};

/// 32-bit sequence number type used by the protocol.
pub type SequenceNumber = u32;

/// Helper trait to convert enums to u8 values for the wire format.
pub trait EnumConverter {
    /// The enum type this converter works with.
    type Enum;

    /// Converts the enum to a u8 for serialization.
    fn to_u8(&self) -> u8;
}

/// Flag values carried in the 8-bit flags field.
///
/// START marks the payload kind; FINISH distinguishes the closing packet from
/// its confirmation. These four FINISH values are fixed on the wire.
pub mod flags {
    /// START of a text-message transfer (also the FINISH confirmation of one).
    pub const MESSAGE: u8 = 0;
    /// START of a file transfer.
    pub const FILE: u8 = 1;
    /// Outgoing FINISH closing a file transfer.
    pub const FINISH_FILE: u8 = 1;
    /// Outgoing FINISH closing a message transfer.
    pub const FINISH_MESSAGE: u8 = 3;
    /// FINISH confirmation for a file transfer.
    pub const FINISH_FILE_CONFIRM: u8 = 2;
    /// FINISH confirmation for a message transfer.
    pub const FINISH_MESSAGE_CONFIRM: u8 = 0;
}

/// Id to identify a certain packet kind.
#[derive(Copy, Clone, Debug, PartialOrd, PartialEq, Eq, Hash)]
pub enum PacketKind {
    /// Opens a session; flags carry the payload kind
    Start = 0,
    /// Acknowledges a START, echoing its sequence
    Answer = 1,
    /// Closes a session (or confirms the close, per flags)
    Finish = 2,
    /// One fragment of a text message
    SendData = 3,
    /// Acknowledges a SendData fragment
    ConfirmData = 4,
    /// Asks the peer to retransmit its last packet
    Resend = 5,
    /// Liveness probe sent on an idle link
    KeepAlive = 6,
    /// Reply to a liveness probe
    KeepAliveReply = 7,
    /// One fragment of a named file
    SendFile = 8,
    /// Acknowledges a SendFile fragment
    ConfirmFile = 9,
}

impl PacketKind {
    /// Whether packets of this kind carry a payload on the wire.
    pub fn carries_payload(self) -> bool {
        matches!(self, PacketKind::SendData | PacketKind::SendFile)
    }
}

impl EnumConverter for PacketKind {
    type Enum = PacketKind;

    fn to_u8(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for PacketKind {
    type Error = ErrorKind;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PacketKind::Start),
            1 => Ok(PacketKind::Answer),
            2 => Ok(PacketKind::Finish),
            3 => Ok(PacketKind::SendData),
            4 => Ok(PacketKind::ConfirmData),
            5 => Ok(PacketKind::Resend),
            6 => Ok(PacketKind::KeepAlive),
            7 => Ok(PacketKind::KeepAliveReply),
            8 => Ok(PacketKind::SendFile),
            9 => Ok(PacketKind::ConfirmFile),
            _ => Err(ErrorKind::DecodingError(DecodingErrorKind::PacketKind)),
        }
    }
}

/// The payload of a packet as a tagged variant.
///
/// Only `SendData` carries `Message` and only `SendFile` carries `File`;
/// every other kind is `None`. A file fragment holds the slice of the file
/// name present in this packet (possibly empty) followed by content bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PacketBody {
    /// No payload.
    None,
    /// A fragment of a text message.
    Message(Vec<u8>),
    /// A fragment of a file: name bytes carried here, then content bytes.
    File {
        /// The slice of the file name present in this packet.
        name: Vec<u8>,
        /// The file-content bytes in this packet.
        content: Vec<u8>,
    },
}

impl PacketBody {
    /// Number of payload bytes this body contributes to the wire.
    pub fn wire_len(&self) -> usize {
        match self {
            PacketBody::None => 0,
            PacketBody::Message(data) => data.len(),
            PacketBody::File { name, content } => name.len() + content.len(),
        }
    }

    /// The value of the name_length header field for this body.
    pub fn name_length(&self) -> u16 {
        match self {
            PacketBody::File { name, .. } => name.len() as u16,
            _ => 0,
        }
    }
}

/// One protocol packet.
///
/// The checksum is not stored here: it is computed on encode and verified on
/// decode, so a `Packet` value is always internally consistent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    /// Sequence number, unique within a session per originating peer.
    pub sequence: SequenceNumber,
    /// The packet kind.
    pub kind: PacketKind,
    /// The sender's currently advertised window, in fragments.
    pub window: u16,
    /// Contextual flags (0..=3, see [`flags`]).
    pub flags: u8,
    /// The payload.
    pub body: PacketBody,
}

impl Packet {
    /// Creates a payload-free packet of the given kind.
    pub fn control(kind: PacketKind, sequence: SequenceNumber, window: u16, flags: u8) -> Self {
        Packet { sequence, kind, window, flags, body: PacketBody::None }
    }

    /// Creates a message-fragment packet.
    pub fn message_fragment(sequence: SequenceNumber, window: u16, data: Vec<u8>) -> Self {
        Packet {
            sequence,
            kind: PacketKind::SendData,
            window,
            flags: flags::MESSAGE,
            body: PacketBody::Message(data),
        }
    }

    /// Creates a file-fragment packet carrying `name` bytes then `content` bytes.
    pub fn file_fragment(
        sequence: SequenceNumber,
        window: u16,
        name: Vec<u8>,
        content: Vec<u8>,
    ) -> Self {
        Packet {
            sequence,
            kind: PacketKind::SendFile,
            window,
            flags: flags::FILE,
            body: PacketBody::File { name, content },
        }
    }
}
