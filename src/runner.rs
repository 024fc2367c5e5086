//! # Background reader task
//!
//! The [Runner] owns the read half of the serial line. It needs to be polled continuously, e.g. in a
//! dedicated embassy task:
//!
//! ````ignore
//! #[embassy_executor::task]
//! async fn modem_task(mut runner: Runner<'static, Uart>) -> ! {
//!     runner.run().await
//! }
//! ````
use crate::correlator::Outcome;
use crate::device::State;
use crate::parser::{FramingError, Parser, Unit};
use crate::urc::Event;
use atat::AtatUrc;
use embassy_time::{Duration, Timer};
use embedded_io::{Error as _, ErrorKind, Read, ReadReady};

/// Reads and dispatches everything the modem sends
pub struct Runner<'a, R: Read + ReadReady> {
    state: &'a State,
    reader: R,
    parser: Parser,

    /// Sleep if no byte is available
    poll_interval: Duration,
}

impl<'a, R: Read + ReadReady> Runner<'a, R> {
    pub(crate) fn new(state: &'a State, reader: R, poll_interval: Duration) -> Self {
        Self {
            state,
            reader,
            parser: Parser::new(),
            poll_interval,
        }
    }

    /// Runs forever
    pub async fn run(&mut self) -> ! {
        loop {
            match self.reader.read_ready() {
                Ok(true) => self.read_byte().await,
                Ok(false) => Timer::after(self.poll_interval).await,
                Err(error) => {
                    self.transport_error(error.kind());
                    Timer::after(self.poll_interval).await;
                }
            }
        }
    }

    async fn read_byte(&mut self) {
        let mut byte = [0x0; 1];

        match self.reader.read(&mut byte) {
            Ok(1) => self.process(byte[0]).await,
            Ok(_) => {}
            Err(error) => {
                self.transport_error(error.kind());
                Timer::after(self.poll_interval).await;
            }
        }
    }

    /// Feeds a single byte to the parser and dispatches the completed unit
    async fn process(&mut self, byte: u8) {
        let state = self.state;

        match self.parser.feed(byte) {
            Ok(None) => {}
            Ok(Some(unit)) => dispatch(state, unit).await,
            Err(FramingError::Overflow) => {
                error!("Parse buffer overflow, discarding received data");
                state.correlation.complete(|_| Outcome::Framing);
            }
            Err(FramingError::MalformedEvent) => {
                error!("Dropping malformed SocketDown event");
            }
        }
    }

    fn transport_error(&mut self, kind: ErrorKind) {
        error!("Reading from serial line failed: {:?}", kind);
        self.parser.reset();
        self.state.correlation.complete(|_| Outcome::Transport(kind));
    }
}

async fn dispatch(state: &State, unit: Unit<'_>) {
    let correlation = &state.correlation;

    match unit {
        Unit::Prompt => {
            if !correlation.complete(|_| Outcome::Prompt) {
                warn!("Dropping unexpected ready-to-send marker");
            }
        }
        Unit::Ok => {
            // Connection id gets assigned before any data of the new socket is dispatched
            if !correlation.complete_ok_with(|line| state.sockets.connected(line)) {
                warn!("Dropping stale OK");
            }
        }
        Unit::Error(line) => {
            if !correlation.complete_error(line) {
                warn!("Dropping stale {}", line.escape_ascii());
            }
        }
        Unit::Line(line) => match correlation.active() {
            Some(_) => {
                trace!("Received line {}", line.escape_ascii());
                correlation.record_line(line);
            }
            None => debug!("Ignoring unsolicited line {}", line.escape_ascii()),
        },
        Unit::SocketData { id, data } => state.sockets.deliver(id, data).await,
        Unit::Event(event) => match Event::parse(event) {
            Some(Event::SocketDisconnect(id)) => state.sockets.disconnect(&id).await,
            Some(Event::SocketSeed { id, server }) => {
                debug!("Ignoring client {} of server socket {}", id.as_str(), server.as_str());
            }
            _ => debug!("Ignoring event {}", event.escape_ascii()),
        },
    }
}
