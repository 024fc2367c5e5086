use alloc::vec::Vec;
use atat::atat_derive::AtatResp;

/// Commands which gets just responded by OK
#[derive(Clone, AtatResp)]
pub struct NoResponse;

/// Result of a successful command: the last response line received before `OK`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Response {
    line: Vec<u8>,
}

impl Response {
    pub(crate) fn new(line: Vec<u8>) -> Self {
        Self { line }
    }

    /// Raw last line, empty if the command was just responded by OK
    pub fn line(&self) -> &[u8] {
        &self.line
    }

    /// Last line as string, None if not valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.line).ok()
    }

    /// Returns the field with the given index when splitting the line at the delimiter
    ///
    /// E.g. field 1 of `connect success ConID=1` split at `=` is `1`.
    pub fn field(&self, index: usize, delimiter: char) -> Option<&str> {
        self.as_str()?.split(delimiter).nth(index)
    }

    /// Returns everything after the first occurrence of the delimiter
    pub fn value(&self, delimiter: char) -> Option<&str> {
        self.as_str()?.split_once(delimiter).map(|(_, value)| value)
    }
}
