//! The UDP endpoint and its polling loop.
//!
//! `Endpoint` owns the socket and the peer engine. Everything mutable runs on
//! the thread that calls [`Endpoint::manual_poll`]; collaborator tasks (the
//! operator prompt, event consumers) only touch the crossbeam channels.

use std::{
    io,
    net::{SocketAddr, ToSocketAddrs, UdpSocket},
    sync::Arc,
    thread::{sleep, yield_now},
    time::{Duration, Instant},
};

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use fraglink_core::{
    config::Config,
    error::{ErrorKind, Result},
    transport::Socket as TransportSocket,
};
use fraglink_peer::{Action, Command, Event, Peer};
use socket2::Socket as Socket2;
use tracing::{error, info, warn};

/// Where the polling loop gets its notion of "now".
///
/// `start_polling` stamps every iteration through this trait, so tests can
/// drive an endpoint on a scripted clock instead of wall time.
pub trait Clock: Send + Sync + 'static {
    /// The instant to stamp the current iteration with.
    fn now(&self) -> Instant;
}

/// The wall clock; what every non-test endpoint runs on.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Applies socket options from configuration to a UdpSocket.
fn apply_socket_options(socket: &UdpSocket, config: &Config) -> io::Result<()> {
    let socket2 = Socket2::from(socket.try_clone()?);

    if let Some(size) = config.socket_recv_buffer_size {
        socket2.set_recv_buffer_size(size)?;
    }
    if let Some(size) = config.socket_send_buffer_size {
        socket2.set_send_buffer_size(size)?;
    }

    Ok(())
}

/// `UdpSocket` behind the transport abstraction.
#[derive(Debug)]
pub struct UdpTransport {
    is_blocking_mode: bool,
    socket: UdpSocket,
}

impl UdpTransport {
    fn new(socket: UdpSocket, is_blocking_mode: bool) -> Result<Self> {
        socket.set_nonblocking(!is_blocking_mode)?;
        Ok(UdpTransport { is_blocking_mode, socket })
    }
}

impl TransportSocket for UdpTransport {
    fn send_packet(&mut self, addr: &SocketAddr, payload: &[u8]) -> io::Result<usize> {
        self.socket.send_to(payload, addr)
    }

    fn receive_packet<'a>(&mut self, buffer: &'a mut [u8]) -> io::Result<(&'a [u8], SocketAddr)> {
        self.socket.recv_from(buffer).map(move |(recv_len, address)| (&buffer[..recv_len], address))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    fn is_blocking_mode(&self) -> bool {
        self.is_blocking_mode
    }
}

/// A peer process endpoint: one socket, one remote peer, one event loop.
pub struct Endpoint<TSocket: TransportSocket = UdpTransport> {
    socket: TSocket,
    remote: SocketAddr,
    peer: Peer,
    receive_buffer: Vec<u8>,
    command_sender: Sender<Command>,
    command_receiver: Receiver<Command>,
    event_sender: Sender<Event>,
    event_receiver: Receiver<Event>,
    pending_sends: Vec<Vec<u8>>,
    clock: Arc<dyn Clock>,
    polling_timeout: Option<Duration>,
}

impl Endpoint<UdpTransport> {
    /// Binds a UDP socket on `local` talking to `remote`, with defaults.
    pub fn bind<A: ToSocketAddrs>(local: A, remote: SocketAddr) -> Result<Self> {
        Self::bind_with_config(local, remote, Config::default())
    }

    /// Binds a UDP socket on `local` talking to `remote`.
    pub fn bind_with_config<A: ToSocketAddrs>(
        local: A,
        remote: SocketAddr,
        config: Config,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(local)?;
        apply_socket_options(&socket, &config)?;
        let transport = UdpTransport::new(socket, config.blocking_mode)?;
        info!(local = %transport.local_addr()?, %remote, "endpoint bound");
        Ok(Self::with_socket(transport, remote, config, Arc::new(SystemClock)))
    }
}

impl<TSocket: TransportSocket> Endpoint<TSocket> {
    /// Creates an endpoint over an arbitrary transport (testing, emulation).
    pub fn with_socket(
        socket: TSocket,
        remote: SocketAddr,
        config: Config,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (command_sender, command_receiver) = unbounded();
        let (event_sender, event_receiver) = unbounded();
        let now = clock.now();
        Endpoint {
            socket,
            remote,
            peer: Peer::new(&config, now),
            receive_buffer: vec![0; config.receive_buffer_max_size],
            command_sender,
            command_receiver,
            event_sender,
            event_receiver,
            pending_sends: Vec::new(),
            clock,
            polling_timeout: config.socket_polling_timeout,
        }
    }

    /// Returns a sender for operator commands; clone it into the input task.
    pub fn command_sender(&self) -> Sender<Command> {
        self.command_sender.clone()
    }

    /// Returns a receiver for user-facing events; clone it into the consumer.
    pub fn event_receiver(&self) -> Receiver<Event> {
        self.event_receiver.clone()
    }

    /// Enqueues a command; it is handled during the next poll.
    pub fn send(&mut self, command: Command) -> Result<()> {
        self.command_sender.send(command).map_err(|_| ErrorKind::ChannelClosed)
    }

    /// Pops the next available event, if any.
    pub fn recv(&mut self) -> Option<Event> {
        match self.event_receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => None,
        }
    }

    /// The local address of the underlying socket.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Whether the heartbeat supervisor has condemned the connection.
    pub fn is_terminated(&self) -> bool {
        self.peer.is_terminated()
    }

    /// One iteration of the event loop: sweeps, inbound drain, command
    /// drain, outbound flush.
    pub fn manual_poll(&mut self, now: Instant) {
        loop {
            match self.socket.receive_packet(self.receive_buffer.as_mut()) {
                Ok((payload, address)) => {
                    if address != self.remote {
                        warn!(%address, "datagram from an unknown sender dropped");
                        continue;
                    }
                    let actions = self.peer.process_datagram(payload, now);
                    self.handle_actions(actions);
                }
                Err(e) => {
                    if e.kind() != io::ErrorKind::WouldBlock {
                        error!(error = %e, "error receiving a datagram");
                    }
                    break;
                }
            }
            if self.socket.is_blocking_mode() {
                break;
            }
        }

        while let Ok(command) = self.command_receiver.try_recv() {
            let actions = self.peer.process_command(command, now);
            self.handle_actions(actions);
        }

        let actions = self.peer.update(now);
        self.handle_actions(actions);

        self.flush();
    }

    /// Polls in a loop with the configured sleep until the connection dies,
    /// then exits the process with code 1.
    pub fn start_polling(&mut self) -> ! {
        loop {
            self.manual_poll(self.clock.now());
            if self.peer.is_terminated() {
                error!("connection lost, terminating");
                std::process::exit(1);
            }
            match self.polling_timeout {
                None => yield_now(),
                Some(duration) => sleep(duration),
            }
        }
    }

    fn handle_actions(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Send(bytes) => self.pending_sends.push(bytes),
                Action::Emit(event) => {
                    if self.event_sender.send(event).is_err() {
                        warn!("event receiver is gone, event dropped");
                    }
                }
            }
        }
    }

    fn flush(&mut self) {
        for payload in self.pending_sends.drain(..) {
            if let Err(e) = self.socket.send_packet(&self.remote, &payload) {
                error!(error = %e, remote = %self.remote, "error sending a datagram");
            }
        }
    }
}
