use crate::correlator::CommandError;
use crate::responses::NoResponse;
use crate::stack::{Error as StackError, Protocol};
use crate::urc::SocketId;
use crate::wifi::{AddressErrors, JoinError};
use atat::atat_derive::AtatCmd;
use atat::heapless::String;
use core::fmt::Write;
use core::net::SocketAddrV4;

/// Trait for mapping command errors
pub trait CommandErrorHandler {
    type Error;

    /// Maps the failure of the command to the domain error
    fn command_error(&self, error: CommandError) -> Self::Error;
}

/// Plain `AT`, checks if the modem is responsive
#[derive(Clone, AtatCmd)]
#[at_cmd("", NoResponse, timeout_ms = 1_000)]
pub struct AliveCommand;

impl CommandErrorHandler for AliveCommand {
    type Error = JoinError;

    fn command_error(&self, error: CommandError) -> Self::Error {
        JoinError::NotResponding(error)
    }
}

/// Disables echoing of commands
#[derive(Clone, AtatCmd)]
#[at_cmd("E0", NoResponse, timeout_ms = 1_000)]
pub struct DisableEchoCommand;

impl CommandErrorHandler for DisableEchoCommand {
    type Error = JoinError;

    fn command_error(&self, error: CommandError) -> Self::Error {
        JoinError::ConfigurationError(error)
    }
}

/// Queries the firmware version, e.g. `+GMR:V4.18_P5.3.1.3`
#[derive(Clone, AtatCmd)]
#[at_cmd("+GMR", NoResponse, timeout_ms = 1_000)]
pub struct FirmwareVersionCommand;

impl CommandErrorHandler for FirmwareVersionCommand {
    type Error = JoinError;

    fn command_error(&self, error: CommandError) -> Self::Error {
        JoinError::QueryError(error)
    }
}

/// Queries the station MAC address, e.g. `+CIPSTAMAC_DEF:9c9c1f4a2b10`
#[derive(Clone, AtatCmd)]
#[at_cmd("+CIPSTAMAC_DEF?", NoResponse, timeout_ms = 1_000)]
pub struct MacAddressCommand;

impl CommandErrorHandler for MacAddressCommand {
    type Error = AddressErrors;

    fn command_error(&self, error: CommandError) -> Self::Error {
        AddressErrors::CommandError(error)
    }
}

/// Sets the WiFi country code
#[derive(Clone, AtatCmd)]
#[at_cmd("+WCOUNTRY", NoResponse, timeout_ms = 1_000)]
pub struct SetCountryCommand {
    /// Code of the country table, e.g. 4 for US
    code: u8,
}

impl SetCountryCommand {
    pub fn new(code: u8) -> Self {
        Self { code }
    }
}

impl CommandErrorHandler for SetCountryCommand {
    type Error = JoinError;

    fn command_error(&self, error: CommandError) -> Self::Error {
        JoinError::ConfigurationError(error)
    }
}

/// Queries the WiFi country code, e.g. `+WCOUNTRY:4`
#[derive(Clone, AtatCmd)]
#[at_cmd("+WCOUNTRY?", NoResponse, timeout_ms = 1_000)]
pub struct CountryQueryCommand;

impl CommandErrorHandler for CountryQueryCommand {
    type Error = JoinError;

    fn command_error(&self, error: CommandError) -> Self::Error {
        JoinError::QueryError(error)
    }
}

/// Sets the WIFI mode
#[derive(Clone, AtatCmd)]
#[at_cmd("+WMODE", NoResponse, timeout_ms = 1_000)]
pub struct WifiModeCommand {
    /// WIFI mode:
    ///     0: Null mode. Wi-Fi RF will be disabled.
    ///     1: Station mode.
    ///     2: SoftAP mode.
    ///     3: SoftAP+Station mode.
    #[at_arg(position = 0)]
    mode: u8,

    /// 1: Mode is persisted to flash
    #[at_arg(position = 1)]
    save: u8,
}

impl WifiModeCommand {
    /// Persisted station mode
    pub fn station_mode() -> Self {
        Self { mode: 1, save: 1 }
    }
}

impl CommandErrorHandler for WifiModeCommand {
    type Error = JoinError;

    fn command_error(&self, error: CommandError) -> Self::Error {
        JoinError::ModeError(error)
    }
}

/// Command for connecting to the target WIFI access point
#[derive(Clone, AtatCmd)]
#[at_cmd("+WJAP", NoResponse, timeout_ms = 20_000, quote_escape_strings = false)]
pub struct AccessPointConnectCommand {
    /// The SSID of the target access point
    #[at_arg(position = 0)]
    ssid: String<32>,

    /// The password/key of the target access point
    #[at_arg(position = 1)]
    password: String<64>,
}

impl AccessPointConnectCommand {
    pub fn new(ssid: String<32>, password: String<64>) -> Self {
        Self { ssid, password }
    }
}

impl CommandErrorHandler for AccessPointConnectCommand {
    type Error = JoinError;

    fn command_error(&self, error: CommandError) -> Self::Error {
        JoinError::ConnectError(error)
    }
}

/// Enables/Disables reconnecting to the last access point after power up
#[derive(Clone, AtatCmd)]
#[at_cmd("+WAUTOCONN", NoResponse, timeout_ms = 1_000)]
pub struct AutoConnectCommand {
    /// 0: disabled, 1: enabled
    enabled: u8,
}

impl AutoConnectCommand {
    pub fn new(enabled: bool) -> Self {
        Self { enabled: enabled as u8 }
    }
}

impl CommandErrorHandler for AutoConnectCommand {
    type Error = JoinError;

    fn command_error(&self, error: CommandError) -> Self::Error {
        JoinError::ConfigurationError(error)
    }
}

/// Queries the access point connection, IP and gateway are the comma separated fields 7 and 8
#[derive(Clone, AtatCmd)]
#[at_cmd("+WJAP?", NoResponse, timeout_ms = 1_000)]
pub struct JoinStatusCommand;

impl CommandErrorHandler for JoinStatusCommand {
    type Error = AddressErrors;

    fn command_error(&self, error: CommandError) -> Self::Error {
        AddressErrors::CommandError(error)
    }
}

/// Sets the socket receiving mode
#[derive(Clone, AtatCmd)]
#[at_cmd("+SOCKETRECVCFG", NoResponse, timeout_ms = 1_000)]
pub struct ReceiveModeCommand {
    /// 0: passive mode => modem keeps received data in an internal buffer
    /// 1: active mode => modem sends received data instantly as `SocketDown` event
    mode: u8,
}

impl ReceiveModeCommand {
    /// Enables the active receiving mode
    pub fn active_mode() -> Self {
        Self { mode: 1 }
    }
}

impl CommandErrorHandler for ReceiveModeCommand {
    type Error = JoinError;

    fn command_error(&self, error: CommandError) -> Self::Error {
        JoinError::ConfigurationError(error)
    }
}

/// Disconnects from the current access point
#[derive(Clone, AtatCmd)]
#[at_cmd("+WDISCONNECT", NoResponse, timeout_ms = 1_000)]
pub struct DisconnectCommand;

impl CommandErrorHandler for DisconnectCommand {
    type Error = CommandError;

    fn command_error(&self, error: CommandError) -> Self::Error {
        error
    }
}

/// Resolves a host name, e.g. `+WDOMAIN:93.184.216.34`
#[derive(Clone, AtatCmd)]
#[at_cmd("+WDOMAIN", NoResponse, timeout_ms = 10_000, quote_escape_strings = false)]
pub struct ResolveHostCommand {
    host: String<128>,
}

impl ResolveHostCommand {
    pub fn new(host: String<128>) -> Self {
        Self { host }
    }
}

impl CommandErrorHandler for ResolveHostCommand {
    type Error = StackError;

    fn command_error(&self, error: CommandError) -> Self::Error {
        StackError::HostLookupFailed(error)
    }
}

/// Establish TCP Connection, UDP Transmission, or SSL Connection. Responds by e.g. `connect success ConID=1`.
#[derive(Clone, AtatCmd)]
#[at_cmd("+SOCKET", NoResponse, timeout_ms = 20_000, quote_escape_strings = false)]
pub struct ConnectCommand {
    /// 2: UDP, 4: TCP, 7: SSL
    #[at_arg(position = 0)]
    mode: u8,

    /// Remote IPv4 address
    #[at_arg(position = 1)]
    remote_host: String<15>,

    /// Remote port
    #[at_arg(position = 2)]
    port: u16,
}

impl ConnectCommand {
    pub fn new(protocol: Protocol, remote: SocketAddrV4) -> Self {
        let mut remote_host = String::new();
        // Dotted IPv4 addresses have at most 15 characters
        let _ = write!(remote_host, "{}", remote.ip());

        Self {
            mode: protocol.connect_mode(),
            remote_host,
            port: remote.port(),
        }
    }
}

impl CommandErrorHandler for ConnectCommand {
    type Error = StackError;

    fn command_error(&self, error: CommandError) -> Self::Error {
        StackError::ConnectError(error)
    }
}

/// Announces the transmission of the given number of bytes. Modem responds by `>` when ready.
#[derive(Clone, AtatCmd)]
#[at_cmd("+SOCKETSEND", NoResponse, timeout_ms = 1_000, quote_escape_strings = false)]
pub struct TransmissionPrepareCommand {
    #[at_arg(position = 0)]
    id: SocketId,

    #[at_arg(position = 1)]
    length: usize,
}

impl TransmissionPrepareCommand {
    pub fn new(id: SocketId, length: usize) -> Self {
        Self { id, length }
    }
}

impl CommandErrorHandler for TransmissionPrepareCommand {
    type Error = StackError;

    fn command_error(&self, error: CommandError) -> Self::Error {
        StackError::TransmissionStartFailed(error)
    }
}

/// Closes the socket with the given connection id
#[derive(Clone, AtatCmd)]
#[at_cmd("+SOCKETDEL", NoResponse, timeout_ms = 1_000, quote_escape_strings = false)]
pub struct CloseSocketCommand {
    id: SocketId,
}

impl CloseSocketCommand {
    pub fn new(id: SocketId) -> Self {
        Self { id }
    }
}

impl CommandErrorHandler for CloseSocketCommand {
    type Error = StackError;

    fn command_error(&self, error: CommandError) -> Self::Error {
        StackError::CloseError(error)
    }
}
