//! Integration tests for the fraglink-peer crate.
//!
//! Two peer engines are wired back to back through in-memory queues so the
//! full protocol conversation (handshake, fragmentation, acknowledgment,
//! recovery, teardown) runs deterministically without sockets.

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use fraglink_core::config::Config;
use fraglink_peer::{Action, Command, Event, Peer, TransferOptions};
use fraglink_protocol::{
    codec::{self, Decoded},
    PacketKind,
};
use tempfile::TempDir;

struct Harness {
    alice: Peer,
    bob: Peer,
    alice_out: VecDeque<Vec<u8>>,
    bob_out: VecDeque<Vec<u8>>,
    alice_events: Vec<Event>,
    bob_events: Vec<Event>,
    /// Packet kinds observed on the wire, for protocol-shape assertions.
    wire_log: Vec<PacketKind>,
    _inbox: TempDir,
}

impl Harness {
    fn new(now: Instant) -> Self {
        let inbox = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.destination_folder = inbox.path().to_path_buf();
        Harness {
            alice: Peer::new(&config, now),
            bob: Peer::new(&config, now),
            alice_out: VecDeque::new(),
            bob_out: VecDeque::new(),
            alice_events: Vec::new(),
            bob_events: Vec::new(),
            wire_log: Vec::new(),
            _inbox: inbox,
        }
    }

    fn command_alice(&mut self, command: Command, now: Instant) {
        let actions = self.alice.process_command(command, now);
        collect(actions, &mut self.alice_out, &mut self.alice_events);
    }

    fn log_kind(&mut self, datagram: &[u8]) {
        match codec::decode(datagram) {
            Decoded::Valid(p) | Decoded::ChecksumMismatch(p) => self.wire_log.push(p.kind),
            Decoded::Malformed(_) => {}
        }
    }

    /// Delivers queued datagrams in both directions until the link is quiet.
    fn settle(&mut self, now: Instant) {
        for _ in 0..10_000 {
            if let Some(datagram) = self.alice_out.pop_front() {
                self.log_kind(&datagram);
                let actions = self.bob.process_datagram(&datagram, now);
                collect(actions, &mut self.bob_out, &mut self.bob_events);
            } else if let Some(datagram) = self.bob_out.pop_front() {
                self.log_kind(&datagram);
                let actions = self.alice.process_datagram(&datagram, now);
                collect(actions, &mut self.alice_out, &mut self.alice_events);
            } else {
                return;
            }
        }
        panic!("link never went quiet");
    }

    fn received_messages(&self) -> Vec<&[u8]> {
        self.bob_events
            .iter()
            .filter_map(|event| match event {
                Event::MessageReceived(data) => Some(data.as_slice()),
                _ => None,
            })
            .collect()
    }
}

fn collect(actions: Vec<Action>, out: &mut VecDeque<Vec<u8>>, events: &mut Vec<Event>) {
    for action in actions {
        match action {
            Action::Send(bytes) => out.push_back(bytes),
            Action::Emit(event) => events.push(event),
        }
    }
}

fn send_message(data: &[u8], options: TransferOptions) -> Command {
    Command::SendMessage { data: data.to_vec(), options }
}

fn options_with_fragment_size(size: u16) -> TransferOptions {
    TransferOptions { fragment_size: Some(size), corrupt_first_packet: false }
}

#[test]
fn tiny_message_clean_channel() {
    let now = Instant::now();
    let mut link = Harness::new(now);

    link.command_alice(send_message(b"hi", TransferOptions::default()), now);
    link.settle(now);

    assert_eq!(link.received_messages(), vec![b"hi".as_slice()]);
    let stats = link
        .alice_events
        .iter()
        .find_map(|event| match event {
            Event::TransferComplete(stats) => Some(stats.clone()),
            _ => None,
        })
        .expect("sender never saw the finish confirmation");
    assert_eq!(stats.fragments, 1);
    assert_eq!(stats.payload_bytes, 2);

    // The conversation has the canonical shape.
    assert_eq!(
        link.wire_log,
        vec![
            PacketKind::Start,
            PacketKind::Answer,
            PacketKind::SendData,
            PacketKind::ConfirmData,
            PacketKind::Finish,
            PacketKind::Finish,
        ]
    );
}

#[test]
fn message_is_fragmented_and_reassembled() {
    let now = Instant::now();
    let mut link = Harness::new(now);

    link.command_alice(send_message(b"ABCDE", options_with_fragment_size(2)), now);
    link.settle(now);

    assert_eq!(link.received_messages(), vec![b"ABCDE".as_slice()]);
    let data_fragments =
        link.wire_log.iter().filter(|kind| **kind == PacketKind::SendData).count();
    assert_eq!(data_fragments, 3); // "AB", "CD", "E"
}

#[test]
fn single_byte_fragments_round_trip() {
    let now = Instant::now();
    let mut link = Harness::new(now);

    let payload = b"reliable datagrams over lossy links".to_vec();
    link.command_alice(send_message(&payload, options_with_fragment_size(1)), now);
    link.settle(now);

    assert_eq!(link.received_messages(), vec![payload.as_slice()]);
}

#[test]
fn large_message_round_trips_across_many_windows() {
    let now = Instant::now();
    let mut link = Harness::new(now);

    // Bigger than the spill threshold is exercised elsewhere; here the point
    // is many window refills: 64 KiB over 1458-byte fragments.
    let payload: Vec<u8> = (0..64 * 1024u32).map(|i| (i % 251) as u8).collect();
    link.command_alice(send_message(&payload, TransferOptions::default()), now);
    link.settle(now);

    assert_eq!(link.received_messages(), vec![payload.as_slice()]);
}

#[test]
fn empty_message_round_trips() {
    let now = Instant::now();
    let mut link = Harness::new(now);

    link.command_alice(send_message(b"", TransferOptions::default()), now);
    link.settle(now);

    assert_eq!(link.received_messages(), vec![b"".as_slice()]);
}

#[test]
fn reordered_fragments_deliver_contiguously() {
    let now = Instant::now();
    let mut link = Harness::new(now);

    link.command_alice(send_message(b"ABCDE", options_with_fragment_size(2)), now);

    // Walk the handshake by hand: START over, ANSWER back.
    let start = link.alice_out.pop_front().unwrap();
    let answer_actions = link.bob.process_datagram(&start, now);
    collect(answer_actions, &mut link.bob_out, &mut link.bob_events);
    let answer = link.bob_out.pop_front().unwrap();
    let fragment_actions = link.alice.process_datagram(&answer, now);
    collect(fragment_actions, &mut link.alice_out, &mut link.alice_events);

    // All three fragments fit the initial window; deliver them as 1, 0, 2.
    let fragments: Vec<Vec<u8>> = link.alice_out.drain(..).collect();
    assert_eq!(fragments.len(), 3);
    for index in [1usize, 0, 2] {
        let actions = link.bob.process_datagram(&fragments[index], now);
        collect(actions, &mut link.bob_out, &mut link.bob_events);
    }

    link.settle(now);
    assert_eq!(link.received_messages(), vec![b"ABCDE".as_slice()]);
}

#[test]
fn duplicated_fragments_deliver_once() {
    let now = Instant::now();
    let mut link = Harness::new(now);

    link.command_alice(send_message(b"ABCDE", options_with_fragment_size(2)), now);

    let start = link.alice_out.pop_front().unwrap();
    let actions = link.bob.process_datagram(&start, now);
    collect(actions, &mut link.bob_out, &mut link.bob_events);
    let answer = link.bob_out.pop_front().unwrap();
    let actions = link.alice.process_datagram(&answer, now);
    collect(actions, &mut link.alice_out, &mut link.alice_events);

    // Deliver every fragment twice, with the duplicates interleaved.
    let fragments: Vec<Vec<u8>> = link.alice_out.drain(..).collect();
    for datagram in fragments.iter().chain(fragments.iter()) {
        let actions = link.bob.process_datagram(datagram, now);
        collect(actions, &mut link.bob_out, &mut link.bob_events);
    }

    link.settle(now);
    assert_eq!(link.received_messages(), vec![b"ABCDE".as_slice()]);
}

#[test]
fn corrupted_first_packet_is_recovered_via_resend() {
    let now = Instant::now();
    let mut link = Harness::new(now);

    let options =
        TransferOptions { fragment_size: Some(1458), corrupt_first_packet: true };
    link.command_alice(send_message(b"checksums matter", options), now);
    link.settle(now);

    assert_eq!(link.received_messages(), vec![b"checksums matter".as_slice()]);
    assert!(
        link.wire_log.contains(&PacketKind::Resend),
        "the corrupted packet must draw a RESEND"
    );
}

#[test]
fn lost_confirm_is_recovered_by_the_timeout_sweep() {
    let now = Instant::now();
    let mut link = Harness::new(now);

    link.command_alice(send_message(b"hello", TransferOptions::default()), now);

    let start = link.alice_out.pop_front().unwrap();
    let actions = link.bob.process_datagram(&start, now);
    collect(actions, &mut link.bob_out, &mut link.bob_events);
    let answer = link.bob_out.pop_front().unwrap();
    let actions = link.alice.process_datagram(&answer, now);
    collect(actions, &mut link.alice_out, &mut link.alice_events);

    // Deliver the fragment but drop Bob's CONFIRM on the floor.
    let fragment = link.alice_out.pop_front().unwrap();
    let actions = link.bob.process_datagram(&fragment, now);
    collect(actions, &mut link.bob_out, &mut link.bob_events);
    link.bob_out.clear();

    // After the resend timeout Alice retransmits; Bob re-confirms the
    // already-delivered sequence and the transfer completes.
    let later = now + Duration::from_secs(11);
    let actions = link.alice.update(later);
    collect(actions, &mut link.alice_out, &mut link.alice_events);
    assert!(!link.alice_out.is_empty(), "sweep must retransmit the fragment");
    link.settle(later);

    assert_eq!(link.received_messages(), vec![b"hello".as_slice()]);
}

#[test]
fn file_round_trips_with_name_straddling_fragments() {
    let now = Instant::now();
    let mut link = Harness::new(now);

    let content: Vec<u8> = (0..257u16).map(|i| (i % 256) as u8).collect();
    link.command_alice(
        Command::SendFile {
            name: "measurements.csv".to_string(),
            content: content.clone(),
            // Fragment size 7 forces the name across three packets.
            options: options_with_fragment_size(7),
        },
        now,
    );
    link.settle(now);

    let (name, path) = link
        .bob_events
        .iter()
        .find_map(|event| match event {
            Event::FileReceived { name, path } => Some((name.clone(), path.clone())),
            _ => None,
        })
        .expect("file never arrived");
    assert_eq!(name, "measurements.csv");
    assert_eq!(std::fs::read(&path).unwrap(), content);
    assert!(path.ends_with("measurements.csv"));
}

#[test]
fn file_with_empty_content_still_arrives() {
    let now = Instant::now();
    let mut link = Harness::new(now);

    link.command_alice(
        Command::SendFile {
            name: "empty.log".to_string(),
            content: Vec::new(),
            options: TransferOptions::default(),
        },
        now,
    );
    link.settle(now);

    let path = link
        .bob_events
        .iter()
        .find_map(|event| match event {
            Event::FileReceived { path, .. } => Some(path.clone()),
            _ => None,
        })
        .expect("empty file never arrived");
    assert_eq!(std::fs::read(&path).unwrap(), Vec::<u8>::new());
}

#[test]
fn queued_payloads_flow_in_submission_order() {
    let now = Instant::now();
    let mut link = Harness::new(now);

    link.command_alice(send_message(b"first", TransferOptions::default()), now);
    link.command_alice(send_message(b"second", TransferOptions::default()), now);
    link.command_alice(send_message(b"third", TransferOptions::default()), now);
    link.settle(now);

    assert_eq!(
        link.received_messages(),
        vec![b"first".as_slice(), b"second".as_slice(), b"third".as_slice()]
    );
    let completions = link
        .alice_events
        .iter()
        .filter(|event| matches!(event, Event::TransferComplete(_)))
        .count();
    assert_eq!(completions, 3);
}

#[test]
fn message_larger_than_the_spill_threshold_round_trips() {
    let now = Instant::now();
    let inbox = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.destination_folder = inbox.path().to_path_buf();
    // Shrink the spill threshold so the on-disk path runs quickly.
    config.message_spill_threshold = 4 * 1024;

    let mut alice = Peer::new(&config, now);
    let mut bob = Peer::new(&config, now);

    let payload: Vec<u8> = (0..32 * 1024u32).map(|i| (i / 7 % 256) as u8).collect();
    let mut alice_out = VecDeque::new();
    let mut bob_out = VecDeque::new();
    let mut alice_events = Vec::new();
    let mut bob_events = Vec::new();

    collect(
        alice.process_command(
            Command::SendMessage { data: payload.clone(), options: TransferOptions::default() },
            now,
        ),
        &mut alice_out,
        &mut alice_events,
    );
    for _ in 0..10_000 {
        if let Some(datagram) = alice_out.pop_front() {
            collect(bob.process_datagram(&datagram, now), &mut bob_out, &mut bob_events);
        } else if let Some(datagram) = bob_out.pop_front() {
            collect(alice.process_datagram(&datagram, now), &mut alice_out, &mut alice_events);
        } else {
            break;
        }
    }

    let received = bob_events
        .iter()
        .find_map(|event| match event {
            Event::MessageReceived(data) => Some(data.clone()),
            _ => None,
        })
        .expect("spilled message never arrived");
    assert_eq!(received, payload);
}

#[test]
fn bidirectional_transfers_share_the_link() {
    let now = Instant::now();
    let mut link = Harness::new(now);

    link.command_alice(send_message(b"from alice", TransferOptions::default()), now);
    let actions = link.bob.process_command(
        Command::SendMessage { data: b"from bob".to_vec(), options: TransferOptions::default() },
        now,
    );
    collect(actions, &mut link.bob_out, &mut link.bob_events);
    link.settle(now);

    assert_eq!(link.received_messages(), vec![b"from alice".as_slice()]);
    let alice_received: Vec<&[u8]> = link
        .alice_events
        .iter()
        .filter_map(|event| match event {
            Event::MessageReceived(data) => Some(data.as_slice()),
            _ => None,
        })
        .collect();
    assert_eq!(alice_received, vec![b"from bob".as_slice()]);
}
