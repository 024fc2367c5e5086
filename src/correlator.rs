//! # Command correlation
//!
//! Every command written to the modem opens a ticket. The [Runner](crate::runner::Runner) tags
//! terminal responses with the ticket active at the time they are parsed, the waiting caller
//! discards completions of any other ticket. Responses arriving while no ticket is active (e.g. the
//! late `OK` of a timed out command) are dropped.
use crate::error_codes::{self, DeviceError};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::signal::Signal;
use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Timer};
use embedded_io::ErrorKind;

/// Failure of a single command
#[derive(Clone, Debug, PartialEq)]
pub enum CommandError {
    /// Neither OK nor ERROR was received within the command timeout
    Timeout,

    /// Modem responded by `ERROR:<code>`
    Device(DeviceError),

    /// Parse buffer overflowed while the command was pending
    Framing,

    /// Reading or writing the serial line failed
    Transport(ErrorKind),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Timeout => f.write_str("Timed out"),
            CommandError::Device(error) => write!(f, "{}", error),
            CommandError::Framing => f.write_str("Framing error"),
            CommandError::Transport(kind) => write!(f, "Transport error: {:?}", kind),
        }
    }
}

/// Terminal response of a command
#[derive(Clone, Debug)]
pub(crate) enum Outcome {
    /// OK, carries the last response line
    Ok(Vec<u8>),

    /// Ready-to-send marker `>`
    Prompt,

    /// ERROR
    Failed(DeviceError),

    /// Parse buffer overflow
    Framing,

    /// Reading the serial line failed
    Transport(ErrorKind),
}

/// Outcome a caller is waiting for
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Expect {
    Ok,
    Prompt,
}

struct Completion {
    ticket: u32,
    outcome: Outcome,
}

pub(crate) struct Tickets {
    /// Next ticket number to hand out
    next: u32,

    /// Ticket of the command currently in flight
    active: Option<u32>,

    /// Most recent non-terminal line received for the active ticket
    last_line: Vec<u8>,
}

/// Shared state between command issuer and the reader task
pub(crate) struct Correlation {
    tickets: BlockingMutex<CriticalSectionRawMutex, RefCell<Tickets>>,
    completion: Signal<CriticalSectionRawMutex, Completion>,
}

impl Correlation {
    pub(crate) const fn new() -> Self {
        Self {
            tickets: BlockingMutex::new(RefCell::new(Tickets {
                next: 0,
                active: None,
                last_line: Vec::new(),
            })),
            completion: Signal::new(),
        }
    }

    /// Opens a new ticket for the command about to be written
    pub(crate) fn begin(&self) -> u32 {
        self.completion.reset();

        self.tickets.lock(|tickets| {
            let mut tickets = tickets.borrow_mut();
            let ticket = tickets.next;
            tickets.next = tickets.next.wrapping_add(1);
            tickets.active = Some(ticket);
            tickets.last_line.clear();
            ticket
        })
    }

    /// Closes the given ticket, if still active
    pub(crate) fn finish(&self, ticket: u32) {
        self.tickets.lock(|tickets| {
            let mut tickets = tickets.borrow_mut();
            if tickets.active == Some(ticket) {
                tickets.active = None;
            }
        });
    }

    /// Returns the ticket currently in flight
    pub(crate) fn active(&self) -> Option<u32> {
        self.tickets.lock(|tickets| tickets.borrow().active)
    }

    /// Stores a response line, replacing the previous one
    pub(crate) fn record_line(&self, line: &[u8]) {
        self.tickets.lock(|tickets| {
            let mut tickets = tickets.borrow_mut();
            tickets.last_line.clear();
            tickets.last_line.extend_from_slice(line);
        });
    }

    /// Delivers OK to the active ticket
    pub(crate) fn complete_ok(&self) -> bool {
        self.complete_ok_with(|_| {})
    }

    /// Same as [Self::complete_ok], but hands the last line to the closure before the waiter is signaled
    pub(crate) fn complete_ok_with(&self, on_ok: impl FnOnce(&[u8])) -> bool {
        self.complete(|tickets| {
            on_ok(&tickets.last_line);
            Outcome::Ok(core::mem::take(&mut tickets.last_line))
        })
    }

    /// Delivers a failure to the active ticket. The code is decoded from the error line or the last line.
    pub(crate) fn complete_error(&self, error_line: &[u8]) -> bool {
        self.complete(|tickets| Outcome::Failed(error_codes::decode_response(error_line, &tickets.last_line)))
    }

    /// Delivers an outcome to the active ticket. Returns false if no command is in flight.
    pub(crate) fn complete(&self, outcome: impl FnOnce(&mut Tickets) -> Outcome) -> bool {
        let completion = self.tickets.lock(|tickets| {
            let mut tickets = tickets.borrow_mut();
            let ticket = tickets.active?;

            Some(Completion {
                ticket,
                outcome: outcome(&mut tickets),
            })
        });

        match completion {
            Some(completion) => {
                self.completion.signal(completion);
                true
            }
            None => false,
        }
    }

    /// Waits for the expected outcome of the given ticket
    ///
    /// Returns the last response line on OK and an empty line on the ready-to-send marker.
    pub(crate) async fn wait(&self, ticket: u32, expect: Expect, timeout: Duration) -> Result<Vec<u8>, CommandError> {
        let task = async {
            loop {
                let completion = self.completion.wait().await;

                if completion.ticket != ticket {
                    warn!("Discarding response of ticket {}, waiting for {}", completion.ticket, ticket);
                    continue;
                }

                match (completion.outcome, expect) {
                    (Outcome::Ok(line), Expect::Ok) => return Ok(line),
                    (Outcome::Prompt, Expect::Prompt) => return Ok(Vec::new()),
                    (Outcome::Failed(error), _) => return Err(CommandError::Device(error)),
                    (Outcome::Framing, _) => return Err(CommandError::Framing),
                    (Outcome::Transport(kind), _) => return Err(CommandError::Transport(kind)),
                    (outcome, _) => debug!("Ignoring {:?} while waiting for {:?}", outcome, expect),
                }
            }
        };

        match select(Timer::after(timeout), task).await {
            Either::First(_) => Err(CommandError::Timeout),
            Either::Second(result) => result,
        }
    }
}
