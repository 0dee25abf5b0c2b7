//! Outbound payload fragmentation.
//!
//! An [`OutboundTransfer`] walks a payload and produces sequence-numbered
//! fragments of at most `fragment_size` payload bytes each. Message payloads
//! are sliced directly. File payloads are sliced over the logical stream of
//! name bytes followed by content bytes: fragments carry name bytes first, and a
//! fragment that finishes the name may carry the first content bytes in the
//! same packet. Each SEND_FILE packet's `name_length` states how many name
//! bytes travel in that packet.

use fraglink_protocol::{packet::flags, Packet, SequenceNumber};

/// A logical unit handed to the transport by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// An opaque text message.
    Message(Vec<u8>),
    /// A named file.
    File {
        /// File name bytes, transmitted ahead of the content.
        name: Vec<u8>,
        /// File content bytes.
        content: Vec<u8>,
    },
}

impl Payload {
    /// The START/FINISH kind flag for this payload.
    pub fn kind_flag(&self) -> u8 {
        match self {
            Payload::Message(_) => flags::MESSAGE,
            Payload::File { .. } => flags::FILE,
        }
    }

    /// Whether this is a file payload.
    pub fn is_file(&self) -> bool {
        matches!(self, Payload::File { .. })
    }

    /// Total payload bytes to convey (name included for files).
    pub fn total_len(&self) -> usize {
        match self {
            Payload::Message(data) => data.len(),
            Payload::File { name, content } => name.len() + content.len(),
        }
    }
}

/// Cursor over one outbound payload, producing fragments on demand.
#[derive(Debug)]
pub struct OutboundTransfer {
    payload: Payload,
    fragment_size: usize,
    corrupt_next: bool,
    name_pos: usize,
    data_pos: usize,
    next_sequence: SequenceNumber,
    smallest_fragment: Option<usize>,
}

impl OutboundTransfer {
    /// Creates a transfer slicing `payload` into `fragment_size`-byte pieces.
    ///
    /// With `corrupt_first` set, the first fragment is flagged for a zeroed
    /// checksum so the remote exercises its resend path.
    pub fn new(payload: Payload, fragment_size: u16, corrupt_first: bool) -> Self {
        Self {
            payload,
            fragment_size: fragment_size.max(1) as usize,
            corrupt_next: corrupt_first,
            name_pos: 0,
            data_pos: 0,
            next_sequence: 0,
            smallest_fragment: None,
        }
    }

    /// The START/FINISH kind flag for the payload being sent.
    pub fn kind_flag(&self) -> u8 {
        self.payload.kind_flag()
    }

    /// Whether the payload is a file.
    pub fn is_file(&self) -> bool {
        self.payload.is_file()
    }

    /// Whether every payload byte has been handed out.
    pub fn is_exhausted(&self) -> bool {
        match &self.payload {
            Payload::Message(data) => self.data_pos >= data.len(),
            Payload::File { name, content } => {
                // An empty file still takes one (empty) fragment so the
                // receiver observes the transfer.
                self.name_pos >= name.len()
                    && self.data_pos >= content.len()
                    && (self.next_sequence > 0 || !name.is_empty() || !content.is_empty())
            }
        }
    }

    /// The sequence the next fragment would take; after exhaustion this is
    /// one past the last data sequence and doubles as the fragment count.
    pub fn next_sequence(&self) -> SequenceNumber {
        self.next_sequence
    }

    /// Number of fragments produced so far.
    pub fn fragments_produced(&self) -> u32 {
        self.next_sequence
    }

    /// Size of the smallest fragment produced so far.
    pub fn smallest_fragment(&self) -> Option<usize> {
        self.smallest_fragment
    }

    /// The nominal fragment size for this transfer.
    pub fn nominal_fragment_size(&self) -> u16 {
        self.fragment_size as u16
    }

    /// Total payload bytes this transfer conveys.
    pub fn payload_bytes(&self) -> u64 {
        self.payload.total_len() as u64
    }

    /// Produces the next fragment, or `None` once the payload is exhausted.
    ///
    /// Returns the packet and whether it must be encoded with a corrupted
    /// checksum.
    pub fn next_fragment(&mut self, window: u16) -> Option<(Packet, bool)> {
        if self.is_exhausted() {
            return None;
        }

        let packet = match &self.payload {
            Payload::Message(data) => {
                let end = (self.data_pos + self.fragment_size).min(data.len());
                let chunk = data[self.data_pos..end].to_vec();
                self.data_pos = end;
                Packet::message_fragment(self.next_sequence, window, chunk)
            }
            Payload::File { name, content } => {
                let mut remaining = self.fragment_size;

                let name_end = (self.name_pos + remaining).min(name.len());
                let name_part = name[self.name_pos..name_end].to_vec();
                remaining -= name_end - self.name_pos;
                self.name_pos = name_end;

                let content_part = if self.name_pos >= name.len() && remaining > 0 {
                    let end = (self.data_pos + remaining).min(content.len());
                    let part = content[self.data_pos..end].to_vec();
                    self.data_pos = end;
                    part
                } else {
                    Vec::new()
                };

                Packet::file_fragment(self.next_sequence, window, name_part, content_part)
            }
        };

        let wire_len = packet.body.wire_len();
        self.smallest_fragment =
            Some(self.smallest_fragment.map_or(wire_len, |smallest| smallest.min(wire_len)));
        self.next_sequence += 1;

        let corrupt = self.corrupt_next;
        self.corrupt_next = false;
        Some((packet, corrupt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraglink_protocol::PacketBody;

    fn collect(transfer: &mut OutboundTransfer) -> Vec<Packet> {
        let mut fragments = Vec::new();
        while let Some((packet, _)) = transfer.next_fragment(4) {
            fragments.push(packet);
        }
        fragments
    }

    #[test]
    fn message_slices_into_consecutive_chunks() {
        let mut transfer =
            OutboundTransfer::new(Payload::Message(b"ABCDE".to_vec()), 2, false);
        let fragments = collect(&mut transfer);

        assert_eq!(fragments.len(), 3);
        for (index, expected) in [b"AB".as_slice(), b"CD", b"E"].iter().enumerate() {
            assert_eq!(fragments[index].sequence, index as u32);
            assert_eq!(fragments[index].body, PacketBody::Message(expected.to_vec()));
        }
        assert!(transfer.is_exhausted());
        assert_eq!(transfer.next_sequence(), 3);
        assert_eq!(transfer.smallest_fragment(), Some(1));
    }

    #[test]
    fn message_fitting_one_fragment_takes_one_packet() {
        let mut transfer =
            OutboundTransfer::new(Payload::Message(b"hi".to_vec()), 1458, false);
        let fragments = collect(&mut transfer);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].body, PacketBody::Message(b"hi".to_vec()));
    }

    #[test]
    fn empty_message_produces_no_fragments() {
        let mut transfer = OutboundTransfer::new(Payload::Message(Vec::new()), 16, false);
        assert!(transfer.is_exhausted());
        assert!(transfer.next_fragment(4).is_none());
        assert_eq!(transfer.next_sequence(), 0);
    }

    #[test]
    fn file_name_straddles_fragments_then_content_follows() {
        let payload = Payload::File { name: b"abc.txt".to_vec(), content: b"0123456".to_vec() };
        let mut transfer = OutboundTransfer::new(payload, 3, false);
        let fragments = collect(&mut transfer);

        // name: "abc" | ".tx" | "t" + "01", then content alone.
        let expect = [
            (b"abc".to_vec(), Vec::new()),
            (b".tx".to_vec(), Vec::new()),
            (b"t".to_vec(), b"01".to_vec()),
            (Vec::new(), b"234".to_vec()),
            (Vec::new(), b"56".to_vec()),
        ];
        assert_eq!(fragments.len(), expect.len());
        for (index, (name, content)) in expect.iter().enumerate() {
            assert_eq!(fragments[index].sequence, index as u32);
            assert_eq!(
                fragments[index].body,
                PacketBody::File { name: name.clone(), content: content.clone() }
            );
            assert_eq!(fragments[index].body.name_length() as usize, name.len());
        }
    }

    #[test]
    fn empty_file_still_announces_itself_with_one_fragment() {
        let payload = Payload::File { name: Vec::new(), content: Vec::new() };
        let mut transfer = OutboundTransfer::new(payload, 8, false);
        assert!(!transfer.is_exhausted());
        let (packet, _) = transfer.next_fragment(4).unwrap();
        assert_eq!(packet.body, PacketBody::File { name: Vec::new(), content: Vec::new() });
        assert!(transfer.is_exhausted());
    }

    #[test]
    fn corrupt_flag_applies_to_the_first_fragment_only() {
        let mut transfer =
            OutboundTransfer::new(Payload::Message(b"abcd".to_vec()), 2, true);
        let (_, first_corrupt) = transfer.next_fragment(4).unwrap();
        let (_, second_corrupt) = transfer.next_fragment(4).unwrap();
        assert!(first_corrupt);
        assert!(!second_corrupt);
    }
}
