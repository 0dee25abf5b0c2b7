use std::{fmt, io};

/// Convenience result alias used across the workspace.
pub type Result<T> = std::result::Result<T, ErrorKind>;

/// Errors that can occur in the transport.
#[derive(Debug)]
pub enum ErrorKind {
    /// Wrapped IO error from the socket or the file system.
    IoError(io::Error),
    /// A datagram could not be decoded into a packet.
    DecodingError(DecodingErrorKind),
    /// The command channel to the event loop is gone.
    ChannelClosed,
}

/// The reasons a datagram fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodingErrorKind {
    /// The datagram is shorter than the packet header.
    TruncatedHeader,
    /// The kind byte does not name a known packet kind.
    PacketKind,
    /// The name_length field points past the end of the payload.
    NameLength,
}

impl fmt::Display for DecodingErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodingErrorKind::TruncatedHeader => write!(f, "datagram shorter than the header"),
            DecodingErrorKind::PacketKind => write!(f, "unknown packet kind"),
            DecodingErrorKind::NameLength => write!(f, "name_length exceeds the payload"),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::IoError(e) => write!(f, "io error: {}", e),
            ErrorKind::DecodingError(e) => write!(f, "decoding error: {}", e),
            ErrorKind::ChannelClosed => write!(f, "the event loop channel is closed"),
        }
    }
}

impl std::error::Error for ErrorKind {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ErrorKind::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ErrorKind {
    fn from(inner: io::Error) -> Self {
        ErrorKind::IoError(inner)
    }
}
