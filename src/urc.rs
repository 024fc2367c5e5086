use atat::AtatUrc;
use core::str::FromStr;
use heapless::String;

/// Connection id assigned by the modem on `AT+SOCKET`
pub type SocketId = String<11>;

/// Asynchronous `+EVENT:` messages besides socket data
///
/// [AtatUrc::parse] expects the event without the `+EVENT:` prefix and without the line terminator,
/// e.g. `SocketDisconnect,2`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Remote side closed the socket with the given connection id
    SocketDisconnect(SocketId),

    /// A client connected to a listening socket of the modem
    SocketSeed {
        /// Connection id of the new client socket
        id: SocketId,

        /// Connection id of the listening socket
        server: SocketId,
    },

    /// Any other event
    Unknown,
}

impl AtatUrc for Event {
    type Response = Self;

    fn parse(resp: &[u8]) -> Option<Self::Response> {
        let mut fields = resp.split(|byte| *byte == b',');

        match fields.next()? {
            b"SocketDisconnect" => Some(Self::SocketDisconnect(parse_socket_id(fields.next()?)?)),
            b"SocketSeed" => Some(Self::SocketSeed {
                id: parse_socket_id(fields.next()?)?,
                server: parse_socket_id(fields.next()?)?,
            }),
            _ => Some(Self::Unknown),
        }
    }
}

/// Parses a connection id, surrounding whitespace is ignored
pub(crate) fn parse_socket_id(raw: &[u8]) -> Option<SocketId> {
    let id = core::str::from_utf8(raw).ok()?.trim();

    if id.is_empty() {
        return None;
    }

    String::from_str(id).ok()
}
