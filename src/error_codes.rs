//! # Combo-AT error codes
//!
//! Failed commands are terminated by `ERROR:<code>`. The codes are grouped by subsystem:
//! * 0-63: system framework and common errors
//! * 64-95: Wi-Fi related errors
//! * 96-127: socket related errors
use core::fmt;

/// Description of codes missing in the catalog
pub const UNKNOWN_ERROR: &str = "Unknown error code";

/// Description used if the code of an error response is not a number
pub const UNPARSABLE_ERROR: &str = "Can't parse ERROR response";

/// Error reported by the modem
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeviceError {
    /// Numeric error code. None if the error response could not be parsed.
    pub code: Option<u16>,

    /// Human readable description of the code
    pub message: &'static str,
}

impl DeviceError {
    /// Error for the given numeric code
    pub fn from_code(code: u16) -> Self {
        Self {
            code: Some(code),
            message: describe(code),
        }
    }

    pub(crate) fn unparsable() -> Self {
        Self {
            code: None,
            message: UNPARSABLE_ERROR,
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {})", self.message, code),
            None => f.write_str(self.message),
        }
    }
}

/// Returns the description of the given error code
pub fn describe(code: u16) -> &'static str {
    match code {
        // System framework
        0 => "success",
        1 => "The command is not supported",
        2 => "The command parameters contain unsupported operations",
        3 => "The instruction format is incorrect",
        4 => "Parameter error",
        5 => "Parameter length error",
        31 => "The current command has not ended and reports its status asynchronously",
        32 => "Unknown error (or unhandled error type)",

        // Common
        33 => "malloc error",
        34 => "Failed to read buf",
        35 => "Failed to write buf",
        36 => "Configuration error",
        37 => "Failed to create task",
        38 => "Flash read and write failure",
        39 => "Serial port configuration error, unsupported baud rate",
        40 => "Serial port configuration error, unsupported data bits",
        41 => "Serial port configuration error, unsupported stop bit",
        42 => "Serial port configuration error, unsupported parity bit",
        43 => "Serial port configuration error, unsupported flow control",
        44 => "Serial port configuration failed",
        45 => "Wrong username/password",
        46 => "Low power mode error or unsupported low power mode",
        47 => "Uninitialized configuration data error",
        63 => "General error code",

        // Wi-Fi
        64 => "Wi-Fi not initialized or initialization failed",
        65 => "Wi-Fi mode error",
        66 => "Wi-Fi connection failed",
        67 => "Wi-Fi connection successful, error in obtaining IP (DHCP)",
        68 => "Failed to obtain encryption method",
        69 => "The specified AP was not found",
        70 => "Wi-Fi scan start failed",
        71 => "Wi-Fi scan timeout",
        72 => "Failed to enable AP hotspot",
        73 => "Failed to obtain the Wi-Fi information of the router or AP",
        74 => "The network card (STA/AP) is not running",
        75 => "Wi-Fi country code error",
        76 => "The current network configuration mode is wrong",
        95 => "Wi-Fi connection unknown error",

        // Socket
        96 => "Failed to create socket",
        97 => "Socket connection failed",
        98 => "DNS Failure",
        99 => "The socket status is wrong",
        100 => "Socket type error",
        101 => "Socket send failed",
        102 => "Socket receive failed",
        103 => "Socket monitoring thread creation failed",
        104 => "The current connection cannot be transparently linked",
        105 => "Socket bind error",
        106 => "PING test failed (all packets lost)",
        107 => "Wi-Fi country code error",
        108 => "SSL Config Error",
        109 => "SSL verification error",
        127 => "Unknown socket error",

        _ => UNKNOWN_ERROR,
    }
}

/// Decodes an error line like `ERROR:105`
///
/// Returns None if the line carries no code at all (plain `ERROR`).
pub fn decode(line: &[u8]) -> Option<DeviceError> {
    let (_, code) = split_once(line, b':')?;
    let code = core::str::from_utf8(code).ok().map(|code| code.trim().parse::<u16>());

    match code {
        Some(Ok(code)) => Some(DeviceError::from_code(code)),
        _ => Some(DeviceError::unparsable()),
    }
}

/// Decodes the error of a failed command
///
/// The code is taken from the terminating line. If that one is a plain `ERROR`, the last response
/// line is consulted, but only if it is an error line itself.
pub(crate) fn decode_response(error_line: &[u8], last_line: &[u8]) -> DeviceError {
    decode(error_line)
        .or_else(|| last_line.starts_with(b"ERROR").then(|| decode(last_line)).flatten())
        .unwrap_or_else(DeviceError::unparsable)
}

fn split_once(line: &[u8], delimiter: u8) -> Option<(&[u8], &[u8])> {
    let position = line.iter().position(|byte| *byte == delimiter)?;
    Some((&line[..position], &line[position + 1..]))
}
