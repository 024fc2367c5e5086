//! # WIFI access point client
//!
//! Joining a network and obtaining address information is supported.
//!
//! Joining runs the complete modem setup: echo is disabled, the country code and station mode are
//! configured and the socket receiving mode is switched to active, so received data is pushed by
//! `+EVENT:SocketDown` messages.
//!
//! ## Example
//!
//! ````ignore
//! use combo_at_nal::wifi::WifiAdapter;
//!
//! device.join("test_wifi", "secret").await?;
//!
//! let address = device.get_address().await?;
//! info!("IP: {:?}", address.ipv4);
//! ````
use crate::commands::{
    AccessPointConnectCommand, AliveCommand, AutoConnectCommand, CountryQueryCommand, DisableEchoCommand,
    DisconnectCommand, FirmwareVersionCommand, JoinStatusCommand, MacAddressCommand, ReceiveModeCommand,
    SetCountryCommand, WifiModeCommand,
};
use crate::correlator::CommandError;
use crate::device::{Device, Transaction};
use crate::responses::Response;
use alloc::string::{String as AllocString, ToString};
use core::fmt::Debug;
use core::future::Future;
use core::net::Ipv4Addr;
use core::str::FromStr;
use embedded_io::Write;
use heapless::{String, Vec};

/// Wifi network adapter trait
pub trait WifiAdapter {
    /// Error when joining a WIFI network
    type JoinError: Debug;

    /// Error when receiving local address information
    type AddressError: Debug;

    /// Error when leaving the WIFI network
    type DisconnectError: Debug;

    /// Connects to an WIFI access point and returns the connection state
    fn join(&self, ssid: &str, key: &str) -> impl Future<Output = Result<JoinState, Self::JoinError>>;

    /// Disconnects from the access point
    fn disconnect(&self) -> impl Future<Output = Result<(), Self::DisconnectError>>;

    /// Returns the current WIFI connection status
    fn get_join_status(&self) -> JoinState;

    /// Queries and returns local address information
    fn get_address(&self) -> impl Future<Output = Result<LocalAddress, Self::AddressError>>;
}

/// Possible errors when joining an access point
#[derive(Clone, Debug, PartialEq)]
pub enum JoinError {
    /// No SSID given
    MissingSsid,

    /// Given SSD is longer then the max. size of 32 chars
    InvalidSSDLength,

    /// Given password is longer then the max. size of 63 chars
    InvalidPasswordLength,

    /// Modem did not respond to `AT`
    NotResponding(CommandError),

    /// Error while configuring echo, country code, auto connect or receiving mode
    ConfigurationError(CommandError),

    /// Error while querying firmware version or country code
    QueryError(CommandError),

    /// Error wile setting WIFI mode to station
    ModeError(CommandError),

    /// Error while connecting to the access point, returned once all attempts failed
    ConnectError(CommandError),

    /// Error while obtaining the local addresses
    AddressError(AddressErrors),
}

impl From<AddressErrors> for JoinError {
    fn from(error: AddressErrors) -> Self {
        JoinError::AddressError(error)
    }
}

/// Errors when receiving local address information
#[derive(Clone, Debug, PartialEq)]
pub enum AddressErrors {
    /// CIPSTAMAC_DEF or WJAP query command failed
    CommandError(CommandError),

    /// Error while parsing addresses
    AddressParseError,
}

/// Current WIFI connection state
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct JoinState {
    /// True if connected to an WIFI access point
    pub connected: bool,

    /// True if an IP was assigned
    pub ip_assigned: bool,
}

/// Local IP and MAC address
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocalAddress {
    /// Local IPv4 address if assigned
    pub ipv4: Option<Ipv4Addr>,

    /// Gateway of the network if assigned
    pub gateway: Option<Ipv4Addr>,

    /// Station MAC address
    pub mac: Option<[u8; 6]>,
}

/// Identity and addresses of the modem
#[derive(Clone, Debug, Default)]
pub(crate) struct NetworkState {
    pub(crate) joined: bool,
    pub(crate) mac: Option<[u8; 6]>,
    pub(crate) ip: Option<Ipv4Addr>,
    pub(crate) gateway: Option<Ipv4Addr>,
    pub(crate) firmware: Option<AllocString>,
    pub(crate) country: Option<u8>,
}

/// Returns the name of the WiFi country code
pub fn country_name(code: u8) -> Option<&'static str> {
    let name = match code {
        1 => "JP Japan",
        2 => "American Samoa",
        3 => "CA Canada",
        4 => "US",
        5 => "CN China",
        6 => "Hong Kong, China",
        7 => "Taiwan, China",
        8 => "MO Macau, China",
        9 => "IL Israel",
        10 => "Singapore",
        11 => "KR South Korea",
        12 => "TR Türkiye",
        13 => "AU Australia",
        14 => "ZA South Africa",
        15 => "BR Brazil",
        _ => return None,
    };

    Some(name)
}

/// Formats the MAC address like `9c:9c:1f:4a:2b:10`
pub fn format_mac(mac: &[u8; 6]) -> String<17> {
    let mut formatted = String::new();

    for (i, byte) in mac.iter().enumerate() {
        if i > 0 {
            let _ = formatted.push(':');
        }

        let mut hex = [0x0; 2];
        base16::encode_config_slice(&[*byte], base16::EncodeLower, &mut hex);
        for digit in hex {
            let _ = formatted.push(digit as char);
        }
    }

    formatted
}

impl<W: Write> WifiAdapter for Device<'_, W> {
    type JoinError = JoinError;
    type AddressError = AddressErrors;
    type DisconnectError = CommandError;

    /// Runs the modem setup and connects to an WIFI access point
    ///
    /// The modem is locked for the whole sequence.
    async fn join(&self, ssid: &str, key: &str) -> Result<JoinState, JoinError> {
        if ssid.is_empty() {
            return Err(JoinError::MissingSsid);
        }

        let ssid = String::from_str(ssid).map_err(|_| JoinError::InvalidSSDLength)?;
        if key.len() > 63 {
            return Err(JoinError::InvalidPasswordLength);
        }
        let key = String::from_str(key).map_err(|_| JoinError::InvalidPasswordLength)?;

        let mut transaction = self.lock().await;

        transaction.send_command(AliveCommand).await?;
        transaction.send_command(DisableEchoCommand).await?;

        let firmware = transaction.send_command(FirmwareVersionCommand).await?;
        let firmware = firmware.value(':').map(|version| version.trim().to_string());
        debug!("Firmware version: {:?}", firmware);

        transaction.send_command(SetCountryCommand::new(self.config.country_code)).await?;
        let country = transaction.send_command(CountryQueryCommand).await?;
        let country = country.value(':').and_then(|code| code.trim().parse::<u8>().ok());
        debug!("WiFi country code: {:?}", country.and_then(country_name));

        transaction.send_command(WifiModeCommand::station_mode()).await?;

        let mut attempt = 1;
        loop {
            let command = AccessPointConnectCommand::new(ssid.clone(), key.clone());

            match transaction.send_command(command).await {
                Ok(_) => break,
                Err(error) if attempt < self.config.join_attempts => {
                    warn!("Joining access point failed (attempt {}): {:?}", attempt, error);
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }

        transaction.send_command(AutoConnectCommand::new(true)).await?;
        let address = self.query_address(&mut transaction).await?;
        transaction.send_command(ReceiveModeCommand::active_mode()).await?;

        self.network.lock(|network| {
            let mut network = network.borrow_mut();
            network.joined = true;
            network.firmware = firmware;
            network.country = country;
        });

        Ok(JoinState {
            connected: true,
            ip_assigned: address.ipv4.is_some(),
        })
    }

    async fn disconnect(&self) -> Result<(), CommandError> {
        let mut transaction = self.lock().await;
        transaction.send_command(DisconnectCommand).await?;

        self.network.lock(|network| {
            let mut network = network.borrow_mut();
            network.joined = false;
            network.ip = None;
            network.gateway = None;
        });

        Ok(())
    }

    fn get_join_status(&self) -> JoinState {
        self.network.lock(|network| {
            let network = network.borrow();
            JoinState {
                connected: network.joined,
                ip_assigned: network.ip.is_some(),
            }
        })
    }

    async fn get_address(&self) -> Result<LocalAddress, AddressErrors> {
        let mut transaction = self.lock().await;
        self.query_address(&mut transaction).await
    }
}

impl<W: Write> Device<'_, W> {
    /// Firmware version reported while joining
    pub fn firmware_version(&self) -> Option<AllocString> {
        self.network.lock(|network| network.borrow().firmware.clone())
    }

    /// WiFi country code reported while joining
    pub fn country(&self) -> Option<u8> {
        self.network.lock(|network| network.borrow().country)
    }

    /// Queries MAC, IP and gateway and stores them
    async fn query_address(&self, transaction: &mut Transaction<'_, W>) -> Result<LocalAddress, AddressErrors> {
        let mac = transaction.send_command(MacAddressCommand).await?;
        let mac = parse_mac(&mac)?;

        let status = transaction.send_command(JoinStatusCommand).await?;
        let ipv4 = parse_ipv4(&status, 7)?;
        let gateway = parse_ipv4(&status, 8)?;

        self.network.lock(|network| {
            let mut network = network.borrow_mut();
            network.mac = Some(mac);
            network.ip = ipv4;
            network.gateway = gateway;
        });

        Ok(LocalAddress {
            ipv4,
            gateway,
            mac: Some(mac),
        })
    }
}

/// Parses the 12 hex digits following the colon, separators are ignored
pub(crate) fn parse_mac(response: &Response) -> Result<[u8; 6], AddressErrors> {
    let raw = response.value(':').ok_or(AddressErrors::AddressParseError)?;

    let mut digits: Vec<u8, 12> = Vec::new();
    for digit in raw.bytes().filter(u8::is_ascii_hexdigit) {
        digits.push(digit).map_err(|_| AddressErrors::AddressParseError)?;
    }

    let mut mac = [0x0; 6];
    match base16::decode_slice(&digits, &mut mac) {
        Ok(6) => Ok(mac),
        _ => Err(AddressErrors::AddressParseError),
    }
}

/// Parses the IPv4 address in the comma separated field. A missing or empty field means not assigned.
pub(crate) fn parse_ipv4(response: &Response, index: usize) -> Result<Option<Ipv4Addr>, AddressErrors> {
    let field = response.field(index, ',').map(|field| field.trim().trim_matches('"'));

    match field {
        None | Some("") => Ok(None),
        Some(address) => Ipv4Addr::from_str(address)
            .map(Some)
            .map_err(|_| AddressErrors::AddressParseError),
    }
}
