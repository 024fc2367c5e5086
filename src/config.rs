use embassy_time::Duration;

/// Driver configuration
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Sleep of the [Runner](crate::runner::Runner) if no byte is available
    pub poll_interval: Duration,

    /// Timeout of the final confirmation after writing socket data
    pub send_timeout: Duration,

    /// Maximum number of `AT+WJAP` attempts while joining
    pub join_attempts: u32,

    /// WiFi country code, see [country_name](crate::wifi::country_name)
    pub country_code: u8,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            send_timeout: Duration::from_millis(1_000),
            join_attempts: 5,
            country_code: 4,
        }
    }

    /// Sets the poll interval of the reader task
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the timeout for confirming transmitted socket data
    pub const fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Sets the maximum number of attempts for connecting to the access point
    pub const fn join_attempts(mut self, attempts: u32) -> Self {
        self.join_attempts = attempts;
        self
    }

    /// Sets the WiFi country code
    pub const fn country_code(mut self, code: u8) -> Self {
        self.country_code = code;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
