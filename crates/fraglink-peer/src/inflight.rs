//! The in-flight table.
//!
//! Every transmitted packet that expects an acknowledgment is recorded here
//! with its most recent send time. Confirmations remove entries and yield RTT
//! samples; the periodic sweep re-issues entries older than the resend
//! timeout.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use fraglink_protocol::{Packet, SequenceNumber};

/// One sent-but-unconfirmed packet.
#[derive(Debug, Clone)]
pub struct FragmentDescriptor {
    /// The packet, kept for re-encoding on resend.
    pub packet: Packet,
    /// When the packet was last put on the wire.
    pub sent_at: Instant,
    /// How many times it has been retransmitted.
    pub retries: u32,
}

/// Table of in-flight packets keyed by sequence number.
#[derive(Debug, Default)]
pub struct InFlightTable {
    entries: HashMap<SequenceNumber, FragmentDescriptor>,
}

impl InFlightTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Records a freshly sent packet.
    pub fn insert(&mut self, packet: Packet, now: Instant) {
        self.entries
            .insert(packet.sequence, FragmentDescriptor { packet, sent_at: now, retries: 0 });
    }

    /// Confirms a sequence, returning the RTT sample for the entry if it was
    /// still outstanding.
    pub fn acknowledge(&mut self, sequence: SequenceNumber, now: Instant) -> Option<Duration> {
        self.entries.remove(&sequence).map(|entry| now.duration_since(entry.sent_at))
    }

    /// Drops an entry without taking an RTT sample.
    pub fn remove(&mut self, sequence: SequenceNumber) -> Option<FragmentDescriptor> {
        self.entries.remove(&sequence)
    }

    /// Collects the packets whose last send is older than `timeout`, stamping
    /// them as resent.
    pub fn due_for_resend(&mut self, now: Instant, timeout: Duration) -> Vec<Packet> {
        let mut due = Vec::new();
        for entry in self.entries.values_mut() {
            if now.duration_since(entry.sent_at) > timeout {
                entry.sent_at = now;
                entry.retries += 1;
                due.push(entry.packet.clone());
            }
        }
        due
    }

    /// Number of outstanding packets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the sequence is outstanding.
    pub fn contains(&self, sequence: SequenceNumber) -> bool {
        self.entries.contains_key(&sequence)
    }

    /// Looks up an outstanding entry.
    pub fn get(&self, sequence: SequenceNumber) -> Option<&FragmentDescriptor> {
        self.entries.get(&sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraglink_protocol::Packet;

    fn fragment(sequence: SequenceNumber) -> Packet {
        Packet::message_fragment(sequence, 4, vec![0; 8])
    }

    #[test]
    fn acknowledge_removes_and_samples_rtt() {
        let mut table = InFlightTable::new();
        let sent = Instant::now();
        table.insert(fragment(3), sent);
        assert!(table.contains(3));

        let rtt = table.acknowledge(3, sent + Duration::from_millis(40));
        assert_eq!(rtt, Some(Duration::from_millis(40)));
        assert!(table.is_empty());

        // A duplicate confirmation finds nothing.
        assert_eq!(table.acknowledge(3, sent + Duration::from_millis(50)), None);
    }

    #[test]
    fn sweep_returns_only_expired_entries_and_rearms_them() {
        let mut table = InFlightTable::new();
        let start = Instant::now();
        table.insert(fragment(0), start);
        table.insert(fragment(1), start + Duration::from_secs(8));

        let timeout = Duration::from_secs(10);
        let at = start + Duration::from_secs(11);
        let due = table.due_for_resend(at, timeout);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].sequence, 0);

        // The swept entry was restamped, so it is not due again right away.
        assert!(table.due_for_resend(at + Duration::from_secs(1), timeout).is_empty());

        // Much later both are due, and retry counts accumulate.
        let later = at + Duration::from_secs(20);
        let due = table.due_for_resend(later, timeout);
        assert_eq!(due.len(), 2);
    }

    #[test]
    fn remove_discards_without_rtt() {
        let mut table = InFlightTable::new();
        table.insert(fragment(7), Instant::now());
        let entry = table.remove(7).unwrap();
        assert_eq!(entry.packet.sequence, 7);
        assert_eq!(entry.retries, 0);
        assert!(table.remove(7).is_none());
    }
}
