//! # Socket stack
//!
//! Implements [Netdev] for [Device]. Up to [MAX_SOCKETS] sockets may be open at the same time.
//!
//! Data received by the modem is pushed by the [Runner](crate::runner::Runner) to a bounded queue
//! per socket. If the queue of a socket is full, the runner waits until the socket is read, which
//! stalls delivery for all other sockets as well.
//!
//! ## Example
//!
//! ````ignore
//! use combo_at_nal::netdev::{Netdev, AF_INET, IPPROTO_TCP, SOCK_STREAM};
//!
//! let socket = device.socket(AF_INET, SOCK_STREAM, IPPROTO_TCP)?;
//! device.connect(socket, "example.com", SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 80)).await?;
//!
//! device.send(socket, b"GET / HTTP/1.0\r\n\r\n", None).await?;
//!
//! let mut buffer = [0x0; 512];
//! let length = device.recv(socket, &mut buffer, Some(Instant::now() + Duration::from_secs(5))).await?;
//!
//! device.close(socket).await?;
//! ````
use crate::commands::{CloseSocketCommand, ConnectCommand, ResolveHostCommand, TransmissionPrepareCommand};
use crate::correlator::CommandError;
use crate::device::Device;
use crate::netdev::{Descriptor, Netdev, AF_INET, IPPROTO_TCP, IPPROTO_TLS, IPPROTO_UDP, SOCK_DGRAM, SOCK_STREAM};
use crate::urc::{parse_socket_id, SocketId};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::future::poll_fn;
use core::task::Poll;
use core::net::{Ipv4Addr, SocketAddrV4};
use core::str::FromStr;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::channel::Channel;
use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Instant, Timer};
use embedded_io::{ErrorKind, Write};
use heapless::String;

/// Maximum number of simultaneously open sockets
pub const MAX_SOCKETS: usize = 8;

/// Capacity of the receive queue of a socket in packets
pub const RX_QUEUE_SIZE: usize = 10;

/// Transport protocol of a socket
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
    Tls,
}

impl Protocol {
    /// Mode parameter of `AT+SOCKET`
    pub(crate) fn connect_mode(self) -> u8 {
        match self {
            Protocol::Udp => 2,
            Protocol::Tcp => 4,
            Protocol::Tls => 7,
        }
    }
}

/// Network related errors
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Only IPv4 is supported
    FamilyNotSupported,

    /// Supported are TCP and TLS stream sockets and UDP datagram sockets
    ProtocolNotSupported,

    /// No socket available, since the maximum number is in use.
    NoMoreSockets,

    /// Descriptor does not reference an open socket
    InvalidDescriptor,

    /// Operation is not supported by this driver, e.g. server sockets
    NotSupported,

    /// Given socket is already connected to another remote. Socket needs to be closed first.
    AlreadyConnected,

    /// Unable to send data if socket is not connected
    SocketUnconnected,

    /// Socket was remotely closed and needs to be fully closed by calling `close()`
    ClosingSocket,

    /// Host name is empty or too long
    InvalidHostName,

    /// DNS lookup command failed
    HostLookupFailed(CommandError),

    /// DNS lookup was responded by OK, but the response did not contain an IPv4 address
    HostNotResolved,

    /// Socket connect command failed
    ConnectError(CommandError),

    /// Socket connect command was responded by OK, but without a connection id
    MissingConnectionId,

    /// Preparing the transmission failed (SOCKETSEND command)
    TransmissionStartFailed(CommandError),

    /// Transmission of data failed
    SendFailed(CommandError),

    /// Socket close command failed
    CloseError(CommandError),

    /// No data received before the deadline
    ReceiveTimeout,

    /// No address assigned yet, network needs to be joined first
    AddressUnavailable,
}

impl embedded_io::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::FamilyNotSupported | Error::ProtocolNotSupported | Error::NotSupported => ErrorKind::Unsupported,
            Error::NoMoreSockets => ErrorKind::OutOfMemory,
            Error::InvalidDescriptor | Error::InvalidHostName => ErrorKind::InvalidInput,
            Error::AlreadyConnected => ErrorKind::AlreadyExists,
            Error::SocketUnconnected => ErrorKind::NotConnected,
            Error::ClosingSocket => ErrorKind::ConnectionReset,
            Error::AddressUnavailable | Error::HostNotResolved => ErrorKind::AddrNotAvailable,
            Error::ReceiveTimeout => ErrorKind::TimedOut,
            Error::HostLookupFailed(error)
            | Error::ConnectError(error)
            | Error::TransmissionStartFailed(error)
            | Error::SendFailed(error)
            | Error::CloseError(error) => command_error_kind(error),
            Error::MissingConnectionId => ErrorKind::InvalidData,
        }
    }
}

fn command_error_kind(error: &CommandError) -> ErrorKind {
    match error {
        CommandError::Timeout => ErrorKind::TimedOut,
        CommandError::Transport(kind) => *kind,
        CommandError::Framing => ErrorKind::InvalidData,
        CommandError::Device(_) => ErrorKind::Other,
    }
}

/// Internal state of a single socket
pub(crate) struct SocketState {
    protocol: Protocol,

    /// Connection id assigned by the modem, None until connected
    id: Option<SocketId>,

    /// Address passed to bind()
    local: Option<SocketAddrV4>,

    /// Data of a packet which did not fit into the buffer of the last recv() call
    remainder: Vec<u8>,

    /// Queue was closed by the modem, no more data gets enqueued
    disconnected: bool,

    /// Closure of the queue was consumed by recv()
    eof: bool,

    /// Distinguishes the occupants of a slot
    generation: u32,
}

impl SocketState {
    fn new(protocol: Protocol, generation: u32) -> Self {
        Self {
            protocol,
            id: None,
            local: None,
            remainder: Vec::new(),
            disconnected: false,
            eof: false,
            generation,
        }
    }

    /// Copies remaining data. Returns Some(0) on end of stream and None if the queue needs to be consulted.
    fn take_buffered(&mut self, buffer: &mut [u8]) -> Option<usize> {
        if !self.remainder.is_empty() {
            let length = buffer.len().min(self.remainder.len());
            buffer[..length].copy_from_slice(&self.remainder[..length]);
            self.remainder.drain(..length);
            return Some(length);
        }

        if self.eof {
            return Some(0);
        }

        None
    }

    /// Copies a received packet, data not fitting is kept for the next call
    fn store(&mut self, data: Vec<u8>, buffer: &mut [u8]) -> usize {
        let length = buffer.len().min(data.len());
        buffer[..length].copy_from_slice(&data[..length]);

        if length < data.len() {
            self.remainder = data[length..].to_vec();
        }

        length
    }
}

/// Entry of a receive queue
pub(crate) enum Packet {
    Data { generation: u32, data: Vec<u8> },
    Closed { generation: u32 },
}

struct Slots {
    sockets: [Option<SocketState>; MAX_SOCKETS],

    /// Generation of the last allocated socket
    generation: u32,

    /// Descriptor and generation of the socket awaiting the response of `AT+SOCKET`
    connecting: Option<(Descriptor, u32)>,
}

/// Fixed arena of sockets and their receive queues
pub(crate) struct SocketTable {
    slots: BlockingMutex<CriticalSectionRawMutex, RefCell<Slots>>,
    queues: [Channel<CriticalSectionRawMutex, Packet, RX_QUEUE_SIZE>; MAX_SOCKETS],
}

impl SocketTable {
    pub(crate) const fn new() -> Self {
        Self {
            slots: BlockingMutex::new(RefCell::new(Slots {
                sockets: [const { None }; MAX_SOCKETS],
                generation: 0,
                connecting: None,
            })),
            queues: [const { Channel::new() }; MAX_SOCKETS],
        }
    }

    /// Occupies the first free slot
    pub(crate) fn allocate(&self, protocol: Protocol) -> Result<Descriptor, Error> {
        let sockfd = self.slots.lock(|slots| {
            let mut slots = slots.borrow_mut();
            let sockfd = slots.sockets.iter().position(Option::is_none).ok_or(Error::NoMoreSockets)?;

            slots.generation = slots.generation.wrapping_add(1);
            let generation = slots.generation;
            slots.sockets[sockfd] = Some(SocketState::new(protocol, generation));
            Ok(sockfd)
        })?;

        self.queues[sockfd].clear();
        Ok(sockfd)
    }

    /// Frees the slot
    ///
    /// A pending receiver is woken by a closure marker of the released generation.
    pub(crate) fn release(&self, sockfd: Descriptor) {
        let generation = self.slots.lock(|slots| {
            let mut slots = slots.borrow_mut();
            slots.sockets.get_mut(sockfd).and_then(Option::take).map(|socket| socket.generation)
        });

        if let Some(queue) = self.queues.get(sockfd) {
            queue.clear();

            if let Some(generation) = generation {
                let _ = queue.try_send(Packet::Closed { generation });
            }
        }
    }

    /// Calls the closure with the socket, fails if the descriptor is not in use
    pub(crate) fn with_socket<T>(&self, sockfd: Descriptor, f: impl FnOnce(&mut SocketState) -> T) -> Result<T, Error> {
        self.slots.lock(|slots| {
            let mut slots = slots.borrow_mut();
            let socket = slots.sockets.get_mut(sockfd).and_then(Option::as_mut).ok_or(Error::InvalidDescriptor)?;
            Ok(f(socket))
        })
    }

    /// Same as [Self::with_socket], but fails if the slot got reused meanwhile
    fn with_generation<T>(
        &self,
        sockfd: Descriptor,
        generation: u32,
        f: impl FnOnce(&mut SocketState) -> T,
    ) -> Result<T, Error> {
        self.with_socket(sockfd, |socket| (socket.generation == generation).then(|| f(socket)))?
            .ok_or(Error::InvalidDescriptor)
    }

    /// Marks the socket as disconnected and returns its connection id
    ///
    /// Pending data is discarded, so the runner does not get stuck on a full queue.
    fn shutdown(&self, sockfd: Descriptor) -> Result<Option<SocketId>, Error> {
        let id = self.with_socket(sockfd, |socket| {
            socket.disconnected = true;
            socket.id.clone()
        })?;

        self.queues[sockfd].clear();
        Ok(id)
    }

    /// Registers the socket the next connection id is assigned to
    fn begin_connect(&self, sockfd: Descriptor, generation: u32) {
        self.slots.lock(|slots| slots.borrow_mut().connecting = Some((sockfd, generation)));
    }

    fn end_connect(&self) {
        self.slots.lock(|slots| slots.borrow_mut().connecting = None);
    }

    /// Assigns the connection id of `connect success ConID=<id>` to the connecting socket
    ///
    /// Called by the runner while processing the OK, so data following it directly is delivered.
    pub(crate) fn connected(&self, line: &[u8]) {
        let Some(id) = connection_id(line) else {
            return;
        };

        self.slots.lock(|slots| {
            let mut slots = slots.borrow_mut();
            let Some((sockfd, generation)) = slots.connecting.take() else {
                return;
            };

            match slots.sockets[sockfd].as_mut() {
                Some(socket) if socket.generation == generation && socket.id.is_none() => socket.id = Some(id),
                _ => debug!("Socket {} was closed while connecting", sockfd),
            }
        });
    }

    /// Finds the connected socket with the given connection id, returns descriptor and generation
    fn find(&self, id: &str) -> Option<(Descriptor, u32)> {
        self.slots.lock(|slots| {
            let slots = slots.borrow();
            slots.sockets.iter().enumerate().find_map(|(sockfd, socket)| match socket {
                Some(socket) if !socket.disconnected && socket.id.as_deref() == Some(id) => {
                    Some((sockfd, socket.generation))
                }
                _ => None,
            })
        })
    }

    /// Enqueues received data, waits if the queue is full
    pub(crate) async fn deliver(&self, id: &str, data: &[u8]) {
        let Some((sockfd, generation)) = self.find(id) else {
            warn!("Dropping {} bytes received for unknown socket {}", data.len(), id);
            return;
        };

        trace!("Received {} bytes for socket {}", data.len(), sockfd);
        self.queues[sockfd]
            .send(Packet::Data {
                generation,
                data: data.to_vec(),
            })
            .await;
    }

    /// Closes the queue of the socket with the given connection id
    pub(crate) async fn disconnect(&self, id: &str) {
        let Some((sockfd, generation)) = self.find(id) else {
            warn!("Disconnect of unknown socket {}", id);
            return;
        };

        if self.with_generation(sockfd, generation, |socket| socket.disconnected = true).is_err() {
            warn!("Disconnect of released socket {}", sockfd);
            return;
        }

        debug!("Socket {} got disconnected by remote", sockfd);
        self.queues[sockfd].send(Packet::Closed { generation }).await;
    }

    /// Reads buffered or queued data
    pub(crate) async fn receive(
        &self,
        sockfd: Descriptor,
        buffer: &mut [u8],
        deadline: Option<Instant>,
    ) -> Result<usize, Error> {
        let generation = self.with_socket(sockfd, |socket| socket.generation)?;

        if buffer.is_empty() {
            return Ok(0);
        }

        if let Some(length) = self.with_socket(sockfd, |socket| socket.take_buffered(buffer))? {
            return Ok(length);
        }

        loop {
            let packet = match deadline {
                Some(deadline) => match select(Timer::at(deadline), self.next_packet(sockfd, generation)).await {
                    Either::First(_) => return Err(Error::ReceiveTimeout),
                    Either::Second(packet) => packet?,
                },
                None => self.next_packet(sockfd, generation).await?,
            };

            match packet {
                Packet::Data { generation: stale, .. } | Packet::Closed { generation: stale } if stale != generation => {
                    debug!("Discarding packet of previous socket {}", sockfd);
                }
                Packet::Data { data, .. } => {
                    return self.with_generation(sockfd, generation, |socket| socket.store(data, buffer));
                }
                Packet::Closed { .. } => {
                    self.with_generation(sockfd, generation, |socket| socket.eof = true)?;
                    return Ok(0);
                }
            }
        }
    }

    /// Waits for the next packet, fails once the socket got released
    ///
    /// The generation is checked before every poll, so packets of a later occupant of the slot are
    /// never consumed.
    async fn next_packet(&self, sockfd: Descriptor, generation: u32) -> Result<Packet, Error> {
        poll_fn(|cx| {
            if let Err(error) = self.with_generation(sockfd, generation, |_| ()) {
                return Poll::Ready(Err(error));
            }

            self.queues[sockfd].poll_receive(cx).map(Ok)
        })
        .await
    }
}

/// Parses the id of `connect success ConID=<id>`
fn connection_id(line: &[u8]) -> Option<SocketId> {
    let (_, id) = core::str::from_utf8(line).ok()?.split_once('=')?;
    parse_socket_id(id.as_bytes())
}

/// Time left until the deadline, zero if already passed
fn remaining(deadline: Instant) -> Duration {
    deadline.checked_duration_since(Instant::now()).unwrap_or(Duration::from_ticks(0))
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| remaining(deadline) == Duration::from_ticks(0))
}

/// Limits the timeout to an optional deadline
fn limit(timeout: Duration, deadline: Option<Instant>) -> Duration {
    match deadline {
        Some(deadline) => timeout.min(remaining(deadline)),
        None => timeout,
    }
}

impl<W: Write> Device<'_, W> {
    /// Address passed to bind(), if any
    pub fn local_addr(&self, sockfd: Descriptor) -> Result<Option<SocketAddrV4>, Error> {
        self.state.sockets.with_socket(sockfd, |socket| socket.local)
    }

    /// Resolves the host name by the modem
    async fn resolve(&self, host: &str) -> Result<Ipv4Addr, Error> {
        if host.is_empty() {
            return Err(Error::InvalidHostName);
        }

        let host = String::from_str(host).map_err(|_| Error::InvalidHostName)?;
        let response = self.send_command(ResolveHostCommand::new(host)).await?;

        let address = response.value(':').map(|value| value.trim().trim_matches('"'));
        address.and_then(|address| Ipv4Addr::from_str(address).ok()).ok_or(Error::HostNotResolved)
    }
}

impl<W: Write> Netdev for Device<'_, W> {
    type Error = Error;

    fn socket(&self, domain: i32, stype: i32, protocol: i32) -> Result<Descriptor, Error> {
        if domain != AF_INET {
            return Err(Error::FamilyNotSupported);
        }

        let protocol = match (stype, protocol) {
            (SOCK_STREAM, IPPROTO_TCP) => Protocol::Tcp,
            (SOCK_STREAM, IPPROTO_TLS) => Protocol::Tls,
            (SOCK_DGRAM, IPPROTO_UDP) => Protocol::Udp,
            _ => return Err(Error::ProtocolNotSupported),
        };

        let sockfd = self.state.sockets.allocate(protocol)?;
        debug!("Opened {:?} socket {}", protocol, sockfd);
        Ok(sockfd)
    }

    fn bind(&self, sockfd: Descriptor, local: SocketAddrV4) -> Result<(), Error> {
        self.state.sockets.with_socket(sockfd, |socket| socket.local = Some(local))
    }

    async fn connect(&self, sockfd: Descriptor, host: &str, remote: SocketAddrV4) -> Result<(), Error> {
        let (protocol, generation) = self.state.sockets.with_socket(sockfd, |socket| match socket.id {
            Some(_) => Err(Error::AlreadyConnected),
            None => Ok((socket.protocol, socket.generation)),
        })??;

        let ip = match host.is_empty() {
            true => *remote.ip(),
            false => self.resolve(host).await?,
        };

        let remote = SocketAddrV4::new(ip, remote.port());

        let mut transaction = self.lock().await;
        self.state.sockets.begin_connect(sockfd, generation);
        let result = transaction.send_command(ConnectCommand::new(protocol, remote)).await;
        self.state.sockets.end_connect();
        drop(transaction);

        let id = connection_id(result?.line()).ok_or(Error::MissingConnectionId)?;

        debug!("Socket {} connected to {} with connection id {}", sockfd, remote, id.as_str());
        self.state.sockets.with_generation(sockfd, generation, |socket| socket.id = Some(id))
    }

    fn listen(&self, _sockfd: Descriptor, _backlog: usize) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    fn accept(&self, _sockfd: Descriptor) -> Result<(Descriptor, SocketAddrV4), Error> {
        Err(Error::NotSupported)
    }

    fn set_sock_opt(&self, _sockfd: Descriptor, _level: i32, _option: i32, _value: &[u8]) -> Result<(), Error> {
        Err(Error::NotSupported)
    }

    async fn send(&self, sockfd: Descriptor, buf: &[u8], deadline: Option<Instant>) -> Result<usize, Error> {
        let id = self.state.sockets.with_socket(sockfd, |socket| match (&socket.id, socket.disconnected) {
            (None, _) => Err(Error::SocketUnconnected),
            (Some(_), true) => Err(Error::ClosingSocket),
            (Some(id), false) => Ok(id.clone()),
        })??;

        if buf.is_empty() {
            return Ok(0);
        }

        // Once announced, the modem consumes the given number of bytes as payload
        if expired(deadline) {
            return Err(Error::TransmissionStartFailed(CommandError::Timeout));
        }

        let mut transaction = self.lock().await;
        if expired(deadline) {
            return Err(Error::TransmissionStartFailed(CommandError::Timeout));
        }

        let command = TransmissionPrepareCommand::new(id, buf.len());
        transaction.stage(command, limit(Duration::MAX, deadline)).await?;

        transaction.write(buf).map_err(Error::SendFailed)?;
        transaction
            .confirm(limit(self.config.send_timeout, deadline))
            .await
            .map_err(Error::SendFailed)?;

        trace!("Sent {} bytes on socket {}", buf.len(), sockfd);
        Ok(buf.len())
    }

    async fn recv(&self, sockfd: Descriptor, buf: &mut [u8], deadline: Option<Instant>) -> Result<usize, Error> {
        self.state.sockets.receive(sockfd, buf, deadline).await
    }

    async fn close(&self, sockfd: Descriptor) -> Result<(), Error> {
        let id = self.state.sockets.shutdown(sockfd)?;

        let result = match id {
            Some(id) => self.send_command(CloseSocketCommand::new(id)).await.map(|_| ()),
            None => Ok(()),
        };

        self.state.sockets.release(sockfd);
        debug!("Closed socket {}", sockfd);
        result
    }

    fn addr(&self) -> Result<Ipv4Addr, Error> {
        self.network.lock(|network| network.borrow().ip).ok_or(Error::AddressUnavailable)
    }

    fn get_hardware_addr(&self) -> Result<[u8; 6], Error> {
        self.network.lock(|network| network.borrow().mac).ok_or(Error::AddressUnavailable)
    }

    async fn get_host_by_name(&self, name: &str) -> Result<Ipv4Addr, Error> {
        match Ipv4Addr::from_str(name) {
            Ok(address) => Ok(address),
            Err(_) => self.resolve(name).await,
        }
    }
}
