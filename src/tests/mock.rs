use crate::config::Config;
use crate::runner::Runner;
use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::future::Future;
use embassy_futures::block_on;
use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Instant};
use embedded_io::{ErrorKind, ErrorType, Read, ReadReady, Write};
use mockall::mock;

/// Scripted serial line. Replies get available for reading once the expected command was written.
#[derive(Clone, Default)]
pub struct MockSerial {
    state: Rc<RefCell<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// Bytes available for reading
    rx: VecDeque<u8>,

    /// Written data with time stamp
    written: Vec<(Instant, Vec<u8>)>,

    /// Expected writes and the corresponding replies, processed in order
    script: VecDeque<(&'static [u8], &'static [u8])>,
}

impl MockSerial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reader(&self) -> MockReader {
        MockReader {
            state: self.state.clone(),
        }
    }

    pub fn writer(&self) -> MockWriter {
        MockWriter {
            state: self.state.clone(),
        }
    }

    /// Replies by the given bytes once the command was written
    pub fn expect(&self, command: &'static [u8], reply: &'static [u8]) {
        self.state.borrow_mut().script.push_back((command, reply));
    }

    /// Makes the data available for reading
    pub fn inject(&self, data: &[u8]) {
        self.state.borrow_mut().rx.extend(data.iter().copied());
    }

    /// Returns a copy of the written data
    pub fn get_written_as_strings(&self) -> Vec<String> {
        let state = self.state.borrow();
        state
            .written
            .iter()
            .map(|(_, data)| String::from_utf8(data.clone()).unwrap())
            .collect()
    }

    /// Time stamps of all writes
    pub fn get_write_times(&self) -> Vec<Instant> {
        self.state.borrow().written.iter().map(|(time, _)| *time).collect()
    }

    /// Number of scripted replies not consumed yet
    pub fn pending_replies(&self) -> usize {
        self.state.borrow().script.len()
    }
}

pub struct MockReader {
    state: Rc<RefCell<MockState>>,
}

impl ErrorType for MockReader {
    type Error = ErrorKind;
}

impl Read for MockReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut state = self.state.borrow_mut();
        let mut count = 0;

        while count < buf.len() {
            match state.rx.pop_front() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }

        Ok(count)
    }
}

impl ReadReady for MockReader {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.state.borrow().rx.is_empty())
    }
}

pub struct MockWriter {
    state: Rc<RefCell<MockState>>,
}

impl ErrorType for MockWriter {
    type Error = ErrorKind;
}

impl Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut state = self.state.borrow_mut();
        state.written.push((Instant::now(), buf.to_vec()));

        if matches!(state.script.front(), Some((command, _)) if *command == buf) {
            if let Some((_, reply)) = state.script.pop_front() {
                state.rx.extend(reply.iter().copied());
            }
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

mock! {
    pub FailingWriter {}

    impl ErrorType for FailingWriter {
        type Error = ErrorKind;
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> Result<usize, ErrorKind>;
        fn flush(&mut self) -> Result<(), ErrorKind>;
    }
}

mock! {
    pub FailingReader {}

    impl ErrorType for FailingReader {
        type Error = ErrorKind;
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, ErrorKind>;
    }

    impl ReadReady for FailingReader {
        fn read_ready(&mut self) -> Result<bool, ErrorKind>;
    }
}

/// Config with a short poll interval
pub fn test_config() -> Config {
    Config::new().poll_interval(Duration::from_millis(1))
}

/// Drives the future while the runner is processing the received data
pub fn run<R: Read + ReadReady, F: Future>(runner: &mut Runner<'_, R>, future: F) -> F::Output {
    match block_on(select(runner.run(), future)) {
        Either::First(_) => unreachable!("Runner returned"),
        Either::Second(output) => output,
    }
}
