//! # Line and frame parser
//!
//! Reassembles the byte stream of the modem into protocol units. Besides CRLF terminated lines the
//! modem sends
//! * a single `>` (no terminator) once it is ready to receive the payload of `AT+SOCKETSEND`
//! * `+EVENT:SocketDown,<id>,<length>,<data>` where `<data>` are `<length>` raw bytes which may
//!   contain CRLF themselves
use heapless::Vec;

/// Capacity of the parse buffer in bytes
pub const PARSE_BUFFER_SIZE: usize = 1500;

const TERMINATOR: &[u8] = b"\r\n";
const PROMPT: &[u8] = b">";
const EVENT_PREFIX: &[u8] = b"+EVENT:";
const SOCKET_DATA_PREFIX: &[u8] = b"+EVENT:SocketDown";

/// A complete protocol unit. Slices point into the parse buffer and are valid until the next byte is fed.
#[derive(Debug, PartialEq, Eq)]
pub enum Unit<'a> {
    /// Modem is ready to receive the payload of a staged transmission
    Prompt,

    /// Command succeeded
    Ok,

    /// Command failed, contains the full error line, e.g. `ERROR:105`
    Error(&'a [u8]),

    /// Asynchronous event without the `+EVENT:` prefix
    Event(&'a [u8]),

    /// Data received on the socket with the given connection id
    SocketData { id: &'a str, data: &'a [u8] },

    /// Any other response line
    Line(&'a [u8]),
}

/// Fatal errors of the current parse unit. The buffer is discarded in both cases.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FramingError {
    /// Parse buffer is full without containing a complete unit
    Overflow,

    /// Header of a `SocketDown` event is invalid or the payload exceeds the announced length
    MalformedEvent,
}

/// Incremental parser, fed byte by byte
pub struct Parser {
    buffer: Vec<u8, PARSE_BUFFER_SIZE>,

    /// True if the buffer content was consumed and gets discarded on the next byte
    complete: bool,
}

enum SocketData<'a> {
    Incomplete,
    Malformed,
    Complete { id: &'a str, data: &'a [u8] },
}

impl Parser {
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            complete: false,
        }
    }

    /// Appends a byte and returns the unit completed by it
    pub fn feed(&mut self, byte: u8) -> Result<Option<Unit<'_>>, FramingError> {
        if core::mem::take(&mut self.complete) {
            self.buffer.clear();
        }

        if self.buffer.push(byte).is_err() {
            self.buffer.clear();
            return Err(FramingError::Overflow);
        }

        if self.buffer.as_slice() == PROMPT {
            self.complete = true;
            return Ok(Some(Unit::Prompt));
        }

        if !self.buffer.ends_with(TERMINATOR) {
            return Ok(None);
        }

        let line = &self.buffer[..self.buffer.len() - TERMINATOR.len()];

        let unit = if line.starts_with(SOCKET_DATA_PREFIX) {
            match split_socket_data(line) {
                // CRLF was part of the payload
                SocketData::Incomplete => return Ok(None),
                SocketData::Malformed => {
                    self.complete = true;
                    return Err(FramingError::MalformedEvent);
                }
                SocketData::Complete { id, data } => Unit::SocketData { id, data },
            }
        } else if let Some(event) = line.strip_prefix(EVENT_PREFIX) {
            Unit::Event(event)
        } else if line == b"OK" {
            Unit::Ok
        } else if line.starts_with(b"ERROR") {
            Unit::Error(line)
        } else if line.is_empty() {
            self.complete = true;
            return Ok(None);
        } else {
            Unit::Line(line)
        };

        self.complete = true;
        Ok(Some(unit))
    }

    /// Discards any partially received unit
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.complete = false;
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits `+EVENT:SocketDown,<id>,<length>,<data>`
fn split_socket_data(line: &[u8]) -> SocketData<'_> {
    let mut fields = line.splitn(4, |byte| *byte == b',');
    let _ = fields.next();

    let (Some(id), Some(length), Some(data)) = (fields.next(), fields.next(), fields.next()) else {
        return SocketData::Malformed;
    };

    let Ok(id) = core::str::from_utf8(id) else {
        return SocketData::Malformed;
    };

    let length = core::str::from_utf8(length).ok().and_then(|length| length.parse::<usize>().ok());
    let Some(length) = length else {
        return SocketData::Malformed;
    };

    if id.is_empty() || data.len() > length {
        return SocketData::Malformed;
    }

    if data.len() < length {
        return SocketData::Incomplete;
    }

    SocketData::Complete { id, data }
}
