//! # Device
//!
//! Entry point of the driver. [Device::new] splits the serial line into the [Device], used for
//! issuing commands and socket operations from any task, and the [Runner], which has to be polled
//! continuously by a single background task.
//!
//! ````no_run
//! use combo_at_nal::config::Config;
//! use combo_at_nal::device::{Device, State};
//!
//! static STATE: State = State::new();
//!
//! # fn setup<R, W>(reader: R, writer: W)
//! # where R: embedded_io::Read + embedded_io::ReadReady, W: embedded_io::Write {
//! let (device, mut runner) = Device::new(&STATE, reader, writer, Config::default());
//! # }
//! ````
use crate::commands::CommandErrorHandler;
use crate::config::Config;
use crate::correlator::{CommandError, Correlation, Expect};
use crate::responses::Response;
use crate::runner::Runner;
use crate::stack::SocketTable;
use crate::wifi::NetworkState;
use alloc::vec;
use alloc::vec::Vec;
use atat::AtatCmd;
use core::cell::RefCell;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embassy_time::Duration;
use embedded_io::{Error as _, Read, ReadReady, Write};

/// State shared between [Device] and [Runner]
pub struct State {
    pub(crate) correlation: Correlation,
    pub(crate) sockets: SocketTable,
}

impl State {
    pub const fn new() -> Self {
        Self {
            correlation: Correlation::new(),
            sockets: SocketTable::new(),
        }
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

/// Command and socket interface of the modem
pub struct Device<'a, W: Write> {
    pub(crate) state: &'a State,

    /// Write half of the serial line. Holding the lock serializes commands.
    writer: Mutex<CriticalSectionRawMutex, W>,

    /// Identity and addresses, updated while holding the writer lock
    pub(crate) network: BlockingMutex<CriticalSectionRawMutex, RefCell<NetworkState>>,

    pub(crate) config: Config,
}

impl<'a, W: Write> Device<'a, W> {
    /// Creates the device and the corresponding reader task
    pub fn new<R: Read + ReadReady>(state: &'a State, reader: R, writer: W, config: Config) -> (Self, Runner<'a, R>) {
        let device = Self {
            state,
            writer: Mutex::new(writer),
            network: BlockingMutex::new(RefCell::new(NetworkState::default())),
            config,
        };

        (device, Runner::new(state, reader, config.poll_interval))
    }

    /// Acquires exclusive access to the modem for a sequence of commands
    pub async fn lock(&self) -> Transaction<'_, W> {
        Transaction {
            correlation: &self.state.correlation,
            writer: self.writer.lock().await,
            ticket: None,
        }
    }

    /// Sends a raw command (without line terminator) and waits for OK
    pub async fn execute(&self, command: &str, timeout: Duration) -> Result<Response, CommandError> {
        self.lock().await.execute(command, timeout).await
    }

    /// Sends a typed command and waits for OK
    pub async fn send_command<Cmd: AtatCmd + CommandErrorHandler>(&self, command: Cmd) -> Result<Response, Cmd::Error> {
        self.lock().await.send_command(command).await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Exclusive access to the modem, released on drop
pub struct Transaction<'t, W: Write> {
    correlation: &'t Correlation,
    writer: MutexGuard<'t, CriticalSectionRawMutex, W>,

    /// Ticket of the command awaiting completion
    ticket: Option<u32>,
}

impl<W: Write> Transaction<'_, W> {
    /// Sends a raw command (without line terminator) and waits for OK
    pub async fn execute(&mut self, command: &str, timeout: Duration) -> Result<Response, CommandError> {
        let line = self.request(&terminate(command), Expect::Ok, timeout).await?;
        Ok(Response::new(line))
    }

    /// Sends a raw command (without line terminator) and waits for the ready-to-send marker
    ///
    /// The ticket stays open, so the final response can be awaited by [Transaction::confirm].
    pub async fn send(&mut self, command: &str, timeout: Duration) -> Result<(), CommandError> {
        self.request(&terminate(command), Expect::Prompt, timeout).await?;
        Ok(())
    }

    /// Writes raw payload data
    pub fn write(&mut self, payload: &[u8]) -> Result<usize, CommandError> {
        self.writer.write_all(payload).map_err(|e| CommandError::Transport(e.kind()))?;
        self.writer.flush().map_err(|e| CommandError::Transport(e.kind()))?;
        Ok(payload.len())
    }

    /// Waits for the final OK of a command staged by [Transaction::send]
    pub async fn confirm(&mut self, timeout: Duration) -> Result<Response, CommandError> {
        let ticket = match self.ticket {
            Some(ticket) => ticket,
            None => self.begin(),
        };

        let result = self.correlation.wait(ticket, Expect::Ok, timeout).await;
        self.finish();
        result.map(Response::new)
    }

    /// Sends a typed command and waits for OK
    pub async fn send_command<Cmd: AtatCmd + CommandErrorHandler>(&mut self, command: Cmd) -> Result<Response, Cmd::Error> {
        let timeout = Duration::from_millis(Cmd::MAX_TIMEOUT_MS.into());

        match self.command(&command, Expect::Ok, timeout).await {
            Ok(line) => Ok(Response::new(line)),
            Err(error) => Err(command.command_error(error)),
        }
    }

    /// Sends a typed command and waits for the ready-to-send marker, timeout is limited to the command timeout
    pub(crate) async fn stage<Cmd: AtatCmd + CommandErrorHandler>(
        &mut self,
        command: Cmd,
        timeout: Duration,
    ) -> Result<(), Cmd::Error> {
        let timeout = timeout.min(Duration::from_millis(Cmd::MAX_TIMEOUT_MS.into()));

        match self.command(&command, Expect::Prompt, timeout).await {
            Ok(_) => Ok(()),
            Err(error) => Err(command.command_error(error)),
        }
    }

    async fn command<Cmd: AtatCmd>(&mut self, command: &Cmd, expect: Expect, timeout: Duration) -> Result<Vec<u8>, CommandError> {
        let mut buffer = vec![0x0; Cmd::MAX_LEN];
        let length = command.write(&mut buffer);

        self.request(&buffer[..length], expect, timeout).await
    }

    /// Writes the terminated command and waits for the expected outcome
    async fn request(&mut self, command: &[u8], expect: Expect, timeout: Duration) -> Result<Vec<u8>, CommandError> {
        self.finish();
        let ticket = self.begin();

        debug!("Sending command {}", command.strip_suffix(b"\r\n").unwrap_or(command).escape_ascii());
        let result = match self.write(command) {
            Ok(_) => self.correlation.wait(ticket, expect, timeout).await,
            Err(error) => Err(error),
        };

        if result.is_err() || expect == Expect::Ok {
            self.finish();
        }

        result
    }

    fn begin(&mut self) -> u32 {
        let ticket = self.correlation.begin();
        self.ticket = Some(ticket);
        ticket
    }

    fn finish(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.correlation.finish(ticket);
        }
    }
}

impl<W: Write> Drop for Transaction<'_, W> {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Appends the line terminator
fn terminate(command: &str) -> Vec<u8> {
    let mut line = Vec::with_capacity(command.len() + 2);
    line.extend_from_slice(command.as_bytes());
    line.extend_from_slice(b"\r\n");
    line
}
