//! The session engine.
//!
//! A [`Peer`] is a pure state machine over decoded packets, operator commands
//! and wall-clock instants. Each entry point returns the [`Action`]s the
//! event loop must carry out: datagrams to put on the wire and events to hand
//! to the user. All mutable session state lives here and is only ever touched
//! from the event loop.

use std::{collections::VecDeque, path::PathBuf, time::Instant};

use fraglink_core::{config::Config, constants::MAX_FRAGMENT_SIZE};
use fraglink_protocol::{
    codec::{self, Decoded},
    packet::flags,
    Packet, PacketBody, PacketKind, SequenceNumber,
};
use tracing::{debug, error, info, warn};

use crate::{
    events::{Action, Command, Event, TransferOptions, TransferStats},
    file_writer::FileWriter,
    fragmenter::{OutboundTransfer, Payload},
    inflight::InFlightTable,
    keepalive::KeepAliveSupervisor,
    message_buffer::MessageBuffer,
    peer_state::{RecvState, SendState},
    reassembly::ReassemblyStore,
    window::WindowController,
};

/// The transport engine for one remote peer.
pub struct Peer {
    config: Config,

    send_state: SendState,
    recv_state: RecvState,
    window: WindowController,
    in_flight: InFlightTable,
    outbound: Option<OutboundTransfer>,
    queued: VecDeque<(Payload, TransferOptions)>,
    transfer_started_at: Option<Instant>,

    reassembly: ReassemblyStore,
    incoming_name: Vec<u8>,
    file_writer: Option<FileWriter>,
    message_buffer: MessageBuffer,
    destination: PathBuf,
    receive_started_at: Option<Instant>,
    received_fragments: u32,

    keepalive: KeepAliveSupervisor,
    last_sent: Option<Packet>,
    last_start_sequence: Option<SequenceNumber>,
    pending_answer: Option<SequenceNumber>,
    remote_sequence: SequenceNumber,
    terminated: bool,
}

impl Peer {
    /// Creates an idle peer.
    pub fn new(config: &Config, now: Instant) -> Self {
        Peer {
            config: config.clone(),
            send_state: SendState::Idle,
            recv_state: RecvState::Idle,
            window: WindowController::new(config),
            in_flight: InFlightTable::new(),
            outbound: None,
            queued: VecDeque::new(),
            transfer_started_at: None,
            reassembly: ReassemblyStore::new(),
            incoming_name: Vec::new(),
            file_writer: None,
            message_buffer: MessageBuffer::new(config.message_spill_threshold),
            destination: config.destination_folder.clone(),
            receive_started_at: None,
            received_fragments: 0,
            keepalive: KeepAliveSupervisor::new(config, now),
            last_sent: None,
            last_start_sequence: None,
            pending_answer: None,
            remote_sequence: 0,
            terminated: false,
        }
    }

    /// Whether the heartbeat supervisor has condemned the connection.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Number of data packets currently in flight.
    pub fn packets_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// The current window size in fragments.
    pub fn window_size(&self) -> u16 {
        self.window.window_size()
    }

    /// Processes one inbound datagram.
    pub fn process_datagram(&mut self, datagram: &[u8], now: Instant) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.terminated {
            return actions;
        }

        match codec::decode(datagram) {
            Decoded::Malformed(reason) => {
                warn!(%reason, len = datagram.len(), "dropping malformed datagram");
            }
            Decoded::ChecksumMismatch(packet) => {
                warn!(
                    sequence = packet.sequence,
                    kind = ?packet.kind,
                    "checksum mismatch, requesting resend"
                );
                let resend = Packet::control(
                    PacketKind::Resend,
                    packet.sequence,
                    packet.window,
                    packet.flags,
                );
                self.transmit(resend, &mut actions, now);
            }
            Decoded::Valid(packet) => {
                self.remote_sequence = packet.sequence;
                self.dispatch(packet, &mut actions, now);
            }
        }
        actions
    }

    /// Processes one operator command.
    pub fn process_command(&mut self, command: Command, now: Instant) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.terminated {
            return actions;
        }

        match command {
            Command::SendMessage { data, options } => {
                self.submit(Payload::Message(data), options, &mut actions, now);
            }
            Command::SendFile { name, content, options } => {
                self.submit(Payload::File { name: name.into_bytes(), content }, options, &mut actions, now);
            }
            Command::SetDestination(path) => {
                info!(path = %path.display(), "destination folder changed");
                self.destination = path;
            }
        }
        actions
    }

    /// Runs the periodic work: retransmission sweep and heartbeat tick.
    pub fn update(&mut self, now: Instant) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.terminated {
            return actions;
        }

        for packet in self.in_flight.due_for_resend(now, self.config.resend_timeout) {
            warn!(sequence = packet.sequence, kind = ?packet.kind, "resend timeout, retransmitting");
            self.retransmit(packet, &mut actions);
        }

        if let Some(tick) = self.keepalive.poll(now) {
            if let Some(failures) = tick.missed {
                actions.push(Action::Emit(Event::HeartbeatMissed(failures)));
            }
            if tick.terminate {
                error!("heartbeat failure threshold reached, terminating connection");
                self.terminated = true;
                actions.push(Action::Emit(Event::ConnectionLost));
                return actions;
            }
            if tick.send_probe {
                let probe = Packet::control(
                    PacketKind::KeepAlive,
                    self.remote_sequence.wrapping_add(1),
                    self.window.advertised(),
                    0,
                );
                debug!(sequence = probe.sequence, "link idle, sending heartbeat");
                self.retransmit(probe, &mut actions);
            }
        }
        actions
    }

    // ===== Inbound dispatch =====

    fn dispatch(&mut self, packet: Packet, actions: &mut Vec<Action>, now: Instant) {
        match packet.kind {
            PacketKind::Start => self.on_start(packet, actions, now),
            PacketKind::Answer => self.on_answer(packet, actions, now),
            PacketKind::SendData | PacketKind::SendFile => self.on_data(packet, actions, now),
            PacketKind::ConfirmData | PacketKind::ConfirmFile => {
                self.on_confirm(packet, actions, now)
            }
            PacketKind::Finish => self.on_finish(packet, actions, now),
            PacketKind::Resend => self.on_resend(packet, actions, now),
            PacketKind::KeepAlive => {
                let reply = Packet::control(
                    PacketKind::KeepAliveReply,
                    packet.sequence.wrapping_add(1),
                    self.window.advertised(),
                    0,
                );
                debug!(sequence = packet.sequence, "heartbeat received, replying");
                self.transmit(reply, actions, now);
            }
            PacketKind::KeepAliveReply => {
                debug!(sequence = packet.sequence, "heartbeat reply received");
                self.keepalive.record_reply(now);
            }
        }
    }

    fn on_start(&mut self, packet: Packet, actions: &mut Vec<Action>, now: Instant) {
        if self.last_start_sequence == Some(packet.sequence) {
            debug!(sequence = packet.sequence, "duplicate START ignored");
            return;
        }

        if self.recv_state.is_receiving() {
            warn!("START while a transfer was incoming, discarding partial state");
        }
        self.reset_receiver();
        self.last_start_sequence = Some(packet.sequence);
        self.recv_state = RecvState::Receiving;
        self.receive_started_at = Some(now);

        let kind = if packet.flags == flags::FILE { "file" } else { "message" };
        info!(sequence = packet.sequence, kind, "inbound session started");

        let answer =
            Packet::control(PacketKind::Answer, packet.sequence, packet.window, packet.flags);
        // Tracked in flight so the sweep re-answers if this ANSWER is lost;
        // cleared when the first data packet proves it arrived.
        if let Some(stale) = self.pending_answer.take() {
            self.in_flight.remove(stale);
        }
        self.in_flight.insert(answer.clone(), now);
        self.pending_answer = Some(packet.sequence);
        self.transmit(answer, actions, now);
    }

    fn on_answer(&mut self, packet: Packet, actions: &mut Vec<Action>, now: Instant) {
        match self.send_state {
            SendState::AwaitingAnswer { start_sequence } if packet.sequence == start_sequence => {
                self.in_flight.remove(start_sequence);
                self.send_state = SendState::Streaming;
                self.transfer_started_at = Some(now);
                info!(sequence = packet.sequence, "session accepted, streaming fragments");
                self.advance_transfer(actions, now);
            }
            SendState::AwaitingAnswer { start_sequence } => {
                warn!(
                    expected = start_sequence,
                    got = packet.sequence,
                    "ANSWER for a different sequence, ignoring"
                );
            }
            _ => debug!(sequence = packet.sequence, "stray ANSWER ignored"),
        }
    }

    fn on_data(&mut self, packet: Packet, actions: &mut Vec<Action>, now: Instant) {
        // The peer only sends data once our ANSWER reached it.
        if let Some(answered) = self.pending_answer.take() {
            self.in_flight.remove(answered);
        }

        let sequence = packet.sequence;
        if self.recv_state.is_receiving() {
            if self.reassembly.insert(sequence, packet.body) {
                self.received_fragments += 1;
                debug!(
                    sequence,
                    buffered = self.reassembly.buffered(),
                    "fragment stored"
                );
                for body in self.reassembly.drain_contiguous() {
                    if let Err(e) = self.deliver_body(body) {
                        error!(error = %e, "local I/O failure, aborting inbound transfer");
                        self.reset_receiver();
                        break;
                    }
                }
            } else {
                debug!(sequence, "duplicate fragment dropped, re-confirming");
            }
        } else {
            debug!(sequence, "fragment outside a session, confirming idempotently");
        }

        let (confirm_kind, confirm_flag) = match packet.kind {
            PacketKind::SendFile => (PacketKind::ConfirmFile, 1),
            _ => (PacketKind::ConfirmData, 0),
        };
        let confirm = Packet::control(confirm_kind, sequence, packet.window, confirm_flag);
        self.transmit(confirm, actions, now);
    }

    fn deliver_body(&mut self, body: PacketBody) -> std::io::Result<()> {
        match body {
            PacketBody::Message(data) => self.message_buffer.append(&data),
            PacketBody::File { name, content } => {
                self.incoming_name.extend_from_slice(&name);
                if !content.is_empty() {
                    if self.file_writer.is_none() {
                        let name = String::from_utf8_lossy(&self.incoming_name).into_owned();
                        self.file_writer = Some(FileWriter::create(&self.destination, &name)?);
                    }
                    if let Some(writer) = self.file_writer.as_mut() {
                        writer.append(&content)?;
                    }
                }
                Ok(())
            }
            PacketBody::None => Ok(()),
        }
    }

    fn on_confirm(&mut self, packet: Packet, actions: &mut Vec<Action>, now: Instant) {
        match self.in_flight.acknowledge(packet.sequence, now) {
            Some(rtt) => {
                debug!(sequence = packet.sequence, rtt_ms = rtt.as_millis() as u64, "fragment confirmed");
                self.window.on_confirm(rtt);
            }
            None => debug!(sequence = packet.sequence, "confirm for a settled sequence"),
        }
        self.advance_transfer(actions, now);
    }

    /// Keeps the window full and closes the session once everything is
    /// fragmented and confirmed.
    fn advance_transfer(&mut self, actions: &mut Vec<Action>, now: Instant) {
        if self.send_state != SendState::Streaming {
            return;
        }

        loop {
            if !self.window.can_send_more(self.in_flight.len()) {
                break;
            }
            let advertised = self.window.advertised();
            let fragment = match self.outbound.as_mut() {
                Some(transfer) => transfer.next_fragment(advertised),
                None => None,
            };
            let Some((packet, corrupt)) = fragment else { break };
            debug!(
                sequence = packet.sequence,
                bytes = packet.body.wire_len(),
                in_flight = self.in_flight.len() + 1,
                "fragment sent"
            );
            self.in_flight.insert(packet.clone(), now);
            if corrupt {
                info!(sequence = packet.sequence, "first packet deliberately corrupted");
                self.transmit_corrupted(packet, actions, now);
            } else {
                self.transmit(packet, actions, now);
            }
        }

        let exhausted = self.outbound.as_ref().is_some_and(|t| t.is_exhausted());
        if exhausted && self.in_flight.is_empty() {
            let (finish_sequence, finish_flag) = match self.outbound.as_ref() {
                Some(transfer) => (
                    transfer.next_sequence(),
                    if transfer.is_file() { flags::FINISH_FILE } else { flags::FINISH_MESSAGE },
                ),
                None => return,
            };
            info!(sequence = finish_sequence, "payload confirmed in full, closing session");
            let finish = Packet::control(
                PacketKind::Finish,
                finish_sequence,
                self.window.advertised(),
                finish_flag,
            );
            self.in_flight.insert(finish.clone(), now);
            self.send_state = SendState::AwaitingFinishAck { finish_sequence };
            self.transmit(finish, actions, now);
        }
    }

    fn on_finish(&mut self, packet: Packet, actions: &mut Vec<Action>, now: Instant) {
        match packet.flags {
            flags::FINISH_FILE | flags::FINISH_MESSAGE => {
                self.close_inbound_session(packet, actions, now)
            }
            flags::FINISH_FILE_CONFIRM | flags::FINISH_MESSAGE_CONFIRM => {
                self.close_outbound_session(packet, actions, now)
            }
            other => warn!(flags = other, "FINISH with unknown flags ignored"),
        }
    }

    fn close_inbound_session(&mut self, packet: Packet, actions: &mut Vec<Action>, now: Instant) {
        let is_file = packet.flags == flags::FINISH_FILE;
        let confirm_flag =
            if is_file { flags::FINISH_FILE_CONFIRM } else { flags::FINISH_MESSAGE_CONFIRM };
        let confirm =
            Packet::control(PacketKind::Finish, packet.sequence, packet.window, confirm_flag);

        if !self.recv_state.is_receiving() {
            // Our earlier confirmation was lost and the peer re-finished.
            debug!(sequence = packet.sequence, "duplicate FINISH, re-confirming");
            self.transmit(confirm, actions, now);
            return;
        }

        if let Some(answered) = self.pending_answer.take() {
            self.in_flight.remove(answered);
        }

        let duration = self.receive_started_at.map(|t| now.duration_since(t)).unwrap_or_default();
        if is_file {
            let name = String::from_utf8_lossy(&self.incoming_name).into_owned();
            let writer = match self.file_writer.take() {
                Some(writer) => Ok(writer),
                // A file with no content never opened the writer.
                None => FileWriter::create(&self.destination, &name),
            };
            match writer.and_then(|w| {
                let bytes = w.bytes_written();
                w.finalize().map(|path| (path, bytes))
            }) {
                Ok((path, bytes)) => {
                    info!(
                        %name,
                        bytes,
                        fragments = self.received_fragments,
                        duration_ms = duration.as_millis() as u64,
                        "file received"
                    );
                    actions.push(Action::Emit(Event::FileReceived { name, path }));
                }
                Err(e) => error!(error = %e, "could not finalize received file"),
            }
        } else {
            match self.message_buffer.take_complete() {
                Ok(data) => {
                    info!(
                        bytes = data.len(),
                        fragments = self.received_fragments,
                        duration_ms = duration.as_millis() as u64,
                        "message received"
                    );
                    actions.push(Action::Emit(Event::MessageReceived(data)));
                }
                Err(e) => error!(error = %e, "could not assemble received message"),
            }
        }

        self.reset_receiver();
        self.transmit(confirm, actions, now);
    }

    fn close_outbound_session(&mut self, packet: Packet, actions: &mut Vec<Action>, now: Instant) {
        let SendState::AwaitingFinishAck { finish_sequence } = self.send_state else {
            debug!(sequence = packet.sequence, "stray FINISH confirmation ignored");
            return;
        };
        self.in_flight.remove(finish_sequence);

        if let Some(transfer) = self.outbound.take() {
            let duration =
                self.transfer_started_at.map(|t| now.duration_since(t)).unwrap_or_default();
            let stats = transfer_stats(&transfer, duration);
            info!(
                bytes = stats.payload_bytes,
                fragments = stats.fragments,
                duration_ms = stats.duration.as_millis() as u64,
                header_overhead = stats.header_overhead,
                "transfer confirmed by the peer"
            );
            actions.push(Action::Emit(Event::TransferComplete(stats)));
        }

        self.send_state = SendState::Idle;
        self.transfer_started_at = None;
        self.window.reset();

        if let Some((payload, options)) = self.queued.pop_front() {
            info!("starting next queued payload");
            self.start_transfer(payload, options, actions, now);
        }
    }

    fn on_resend(&mut self, request: Packet, actions: &mut Vec<Action>, now: Instant) {
        // The echoed sequence names the packet that arrived broken. Packets
        // that are not tracked in flight (confirms, replies) fall back to the
        // last thing we put on the wire.
        let packet = self
            .in_flight
            .get(request.sequence)
            .map(|entry| entry.packet.clone())
            .or_else(|| self.last_sent.clone());
        match packet {
            Some(packet) => {
                info!(sequence = packet.sequence, kind = ?packet.kind, "peer requested resend");
                self.transmit(packet, actions, now);
            }
            None => warn!("RESEND received but nothing was ever sent"),
        }
    }

    // ===== Outbound =====

    fn submit(
        &mut self,
        payload: Payload,
        options: TransferOptions,
        actions: &mut Vec<Action>,
        now: Instant,
    ) {
        if !self.send_state.is_idle() || self.outbound.is_some() {
            info!(queued = self.queued.len() + 1, "payload queued behind the current transfer");
            self.queued.push_back((payload, options));
            return;
        }
        self.start_transfer(payload, options, actions, now);
    }

    fn start_transfer(
        &mut self,
        payload: Payload,
        options: TransferOptions,
        actions: &mut Vec<Action>,
        now: Instant,
    ) {
        use rand::Rng;
        let mut rng = rand::rng();
        let start_sequence: SequenceNumber = rng.random();

        let fragment_size = options
            .fragment_size
            .unwrap_or(self.config.fragment_size)
            .clamp(1, MAX_FRAGMENT_SIZE);
        let kind_flag = payload.kind_flag();
        info!(
            sequence = start_sequence,
            bytes = payload.total_len(),
            fragment_size,
            kind = if payload.is_file() { "file" } else { "message" },
            "opening session"
        );

        self.outbound =
            Some(OutboundTransfer::new(payload, fragment_size, options.corrupt_first_packet));
        self.send_state = SendState::AwaitingAnswer { start_sequence };

        let start = Packet::control(
            PacketKind::Start,
            start_sequence,
            self.window.advertised(),
            kind_flag,
        );
        self.in_flight.insert(start.clone(), now);
        self.transmit(start, actions, now);
    }

    fn reset_receiver(&mut self) {
        self.recv_state = RecvState::Idle;
        self.reassembly.reset();
        self.incoming_name.clear();
        self.file_writer = None;
        self.message_buffer.reset();
        self.receive_started_at = None;
        self.received_fragments = 0;
    }

    // ===== Wire helpers =====

    /// Encodes and queues a packet, remembering it for RESEND requests.
    fn transmit(&mut self, packet: Packet, actions: &mut Vec<Action>, now: Instant) {
        self.keepalive.record_send(now);
        self.push_send(&packet, false, actions);
        self.last_sent = Some(packet);
    }

    /// Like [`Self::transmit`] but with a zeroed checksum on the wire.
    fn transmit_corrupted(&mut self, packet: Packet, actions: &mut Vec<Action>, now: Instant) {
        self.keepalive.record_send(now);
        self.push_send(&packet, true, actions);
        // Remember the intact packet so a RESEND repairs the transmission.
        self.last_sent = Some(packet);
    }

    /// Re-sends a packet without claiming the RESEND slot.
    ///
    /// Sweep resends and probes do not count as outbound activity: a peer
    /// that stopped responding must still draw heartbeats while its fragments
    /// are being retried, or the supervisor could never condemn the link.
    fn retransmit(&mut self, packet: Packet, actions: &mut Vec<Action>) {
        self.push_send(&packet, false, actions);
    }

    fn push_send(&mut self, packet: &Packet, corrupt: bool, actions: &mut Vec<Action>) {
        let encoded =
            if corrupt { codec::encode_corrupted(packet) } else { codec::encode(packet) };
        match encoded {
            Ok(bytes) => actions.push(Action::Send(bytes)),
            Err(e) => error!(error = %e, sequence = packet.sequence, "could not encode packet"),
        }
    }
}

fn transfer_stats(transfer: &OutboundTransfer, duration: std::time::Duration) -> TransferStats {
    use fraglink_core::constants::HEADER_SIZE;
    let payload_bytes = transfer.payload_bytes();
    let fragments = transfer.fragments_produced();
    let header_bytes = fragments as u64 * HEADER_SIZE as u64;
    let total = payload_bytes + header_bytes;
    TransferStats {
        payload_bytes,
        fragments,
        nominal_fragment_size: transfer.nominal_fragment_size(),
        smallest_fragment: transfer.smallest_fragment(),
        duration,
        header_overhead: if total == 0 { 0.0 } else { header_bytes as f64 / total as f64 },
    }
}
