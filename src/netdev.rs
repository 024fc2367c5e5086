//! # Socket interface
//!
//! BSD style socket calls, implemented by [Device](crate::device::Device). Sockets are referenced
//! by descriptors in the range `0..MAX_SOCKETS`.
use core::fmt::Debug;
use core::future::Future;
use core::net::{Ipv4Addr, SocketAddrV4};
use embassy_time::Instant;

/// IPv4 address family
pub const AF_INET: i32 = 2;

/// Stream socket (TCP or TLS)
pub const SOCK_STREAM: i32 = 1;

/// Datagram socket (UDP)
pub const SOCK_DGRAM: i32 = 2;

pub const IPPROTO_TCP: i32 = 6;
pub const IPPROTO_UDP: i32 = 17;

/// TLS over TCP, not an IANA protocol number
pub const IPPROTO_TLS: i32 = 0xFE;

/// Socket descriptor
pub type Descriptor = usize;

pub trait Netdev {
    type Error: Debug;

    /// Allocates a socket
    fn socket(&self, domain: i32, stype: i32, protocol: i32) -> Result<Descriptor, Self::Error>;

    /// Stores the local address of the socket
    fn bind(&self, sockfd: Descriptor, local: SocketAddrV4) -> Result<(), Self::Error>;

    /// Connects the socket. The host name is resolved if not empty, otherwise the IP of `remote` is used.
    fn connect(&self, sockfd: Descriptor, host: &str, remote: SocketAddrV4) -> impl Future<Output = Result<(), Self::Error>>;

    fn listen(&self, sockfd: Descriptor, backlog: usize) -> Result<(), Self::Error>;

    fn accept(&self, sockfd: Descriptor) -> Result<(Descriptor, SocketAddrV4), Self::Error>;

    /// Sets a socket option
    fn set_sock_opt(&self, sockfd: Descriptor, level: i32, option: i32, value: &[u8]) -> Result<(), Self::Error>;

    /// Transmits the whole buffer, returns the number of bytes sent
    fn send(
        &self,
        sockfd: Descriptor,
        buf: &[u8],
        deadline: Option<Instant>,
    ) -> impl Future<Output = Result<usize, Self::Error>>;

    /// Receives data, returns 0 once the remote side closed the socket
    fn recv(
        &self,
        sockfd: Descriptor,
        buf: &mut [u8],
        deadline: Option<Instant>,
    ) -> impl Future<Output = Result<usize, Self::Error>>;

    /// Closes the socket and releases the descriptor
    fn close(&self, sockfd: Descriptor) -> impl Future<Output = Result<(), Self::Error>>;

    /// IPv4 address assigned by the access point
    fn addr(&self) -> Result<Ipv4Addr, Self::Error>;

    fn get_hardware_addr(&self) -> Result<[u8; 6], Self::Error>;

    /// Resolves the host name, IPv4 literals are returned without any traffic
    fn get_host_by_name(&self, name: &str) -> impl Future<Output = Result<Ipv4Addr, Self::Error>>;
}
