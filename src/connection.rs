//! # embedded-nal-async adapters
//!
//! [TcpConnect] and [Dns] for [Device], so the driver can be used by any client crate built on
//! `embedded-nal-async`.
use crate::device::Device;
use crate::netdev::{Descriptor, Netdev, AF_INET, IPPROTO_TCP, SOCK_STREAM};
use crate::stack::Error;
use core::net::{IpAddr, SocketAddr};
use embedded_io::Write;
use embedded_nal_async::{AddrType, Dns, TcpConnect};

/// Connected TCP socket
pub struct Connection<'a, 'd, W: Write> {
    device: &'a Device<'d, W>,
    sockfd: Descriptor,
}

impl<W: Write> Connection<'_, '_, W> {
    pub fn descriptor(&self) -> Descriptor {
        self.sockfd
    }

    /// Closes the socket
    pub async fn close(self) -> Result<(), Error> {
        Netdev::close(self.device, self.sockfd).await
    }
}

impl<W: Write> embedded_io::ErrorType for Connection<'_, '_, W> {
    type Error = Error;
}

impl<W: Write> embedded_io_async::Read for Connection<'_, '_, W> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Netdev::recv(self.device, self.sockfd, buf, None).await
    }
}

impl<W: Write> embedded_io_async::Write for Connection<'_, '_, W> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        Netdev::send(self.device, self.sockfd, buf, None).await
    }
}

impl<'d, W: Write> TcpConnect for Device<'d, W> {
    type Error = Error;

    type Connection<'a> = Connection<'a, 'd, W>
        where
            Self: 'a;

    async fn connect<'a>(&'a self, remote: SocketAddr) -> Result<Self::Connection<'a>, Self::Error> {
        let SocketAddr::V4(remote) = remote else {
            return Err(Error::FamilyNotSupported);
        };

        let sockfd = self.socket(AF_INET, SOCK_STREAM, IPPROTO_TCP)?;

        if let Err(error) = Netdev::connect(self, sockfd, "", remote).await {
            // Never connected, so there is nothing to close on the modem
            self.state.sockets.release(sockfd);
            return Err(error);
        }

        Ok(Connection { device: self, sockfd })
    }
}

impl<W: Write> Dns for Device<'_, W> {
    type Error = Error;

    async fn get_host_by_name(&self, host: &str, addr_type: AddrType) -> Result<IpAddr, Self::Error> {
        if matches!(addr_type, AddrType::IPv6) {
            return Err(Error::FamilyNotSupported);
        }

        let address = Netdev::get_host_by_name(self, host).await?;
        Ok(IpAddr::V4(address))
    }

    async fn get_host_by_address(&self, _addr: IpAddr, _result: &mut [u8]) -> Result<usize, Self::Error> {
        Err(Error::NotSupported)
    }
}
