//! Connection configuration.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::MAX_PACKET_SIZE;

/// Default MQTT port without TLS.
pub const DEFAULT_PORT: u16 = 1883;
/// Default MQTT port with TLS.
pub const DEFAULT_TLS_PORT: u16 = 8883;
/// Default time allowed for socket setup plus CONNACK.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection configuration. Owned by a [`Session`](crate::Session) and
/// never changed after the session is created.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Broker host name or IP address.
    pub host: String,
    /// Broker port (1-65535).
    pub port: u16,
    /// Wrap the socket in TLS with certificate validation.
    pub use_tls: bool,
    /// Client ID, unique per session.
    pub client_id: String,
    /// Keep alive interval in seconds; 0 disables pings.
    pub keep_alive: u16,
    /// Upper bound for opening the socket and receiving CONNACK.
    pub connect_timeout: Duration,
    /// Maximum packet size accepted or produced.
    pub max_packet_size: usize,
    /// Clean session flag.
    pub clean_session: bool,
}

impl ConnectionConfig {
    /// Create a config for `host:port` with the given client id.
    pub fn new(host: impl Into<String>, port: u16, client_id: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            use_tls: false,
            client_id: client_id.into(),
            keep_alive: 60,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_packet_size: MAX_PACKET_SIZE,
            clean_session: true,
        }
    }

    /// Create a config with a generated client id (`<prefix>-<uuid>`).
    pub fn with_generated_id(host: impl Into<String>, port: u16, prefix: &str) -> Self {
        Self::new(host, port, generate_client_id(prefix))
    }

    /// Enable or disable TLS.
    pub fn with_tls(mut self, enabled: bool) -> Self {
        self.use_tls = enabled;
        self
    }

    /// Set keep alive interval.
    pub fn with_keep_alive(mut self, seconds: u16) -> Self {
        self.keep_alive = seconds;
        self
    }

    /// Set connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set maximum packet size.
    pub fn with_max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = size;
        self
    }

    /// Set clean session flag.
    pub fn with_clean_session(mut self, clean: bool) -> Self {
        self.clean_session = clean;
        self
    }

    /// `host:port` for logging.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check the fields that can be checked without touching the network.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::InvalidConfig("host is empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::InvalidConfig("port must be in 1-65535".to_string()));
        }
        if self.client_id.is_empty() {
            return Err(Error::InvalidConfig("client id is empty".to_string()));
        }
        if self.client_id.len() > u16::MAX as usize {
            return Err(Error::InvalidConfig("client id too long".to_string()));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::InvalidConfig("connect timeout is zero".to_string()));
        }
        if self.use_tls && !cfg!(feature = "tls") {
            return Err(Error::InvalidConfig(
                "tls requested but the tls feature is disabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// Generate a client id that is unique per call.
pub fn generate_client_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}
