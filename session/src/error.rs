//! Error types for mqttchat-session.

use std::io;
use std::time::Duration;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for session operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Opening the connection or the MQTT handshake failed.
    #[error("connect failed: {0}")]
    Connect(#[from] ConnectError),

    /// Operation requires a connected session.
    #[error("not connected")]
    NotConnected,

    /// `connect` called while a connection exists or is being established.
    #[error("already connected or connecting")]
    AlreadyConnected,

    /// Subscribe was not accepted.
    #[error("subscribe failed: {0}")]
    Subscribe(#[from] SubscribeError),

    /// Publish was not accepted.
    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),

    /// Transport I/O failure on a live connection.
    #[error("io error: {0}")]
    Io(#[from] IoError),

    /// Topic or filter failed validation.
    #[error("invalid topic {topic:?}: {reason}")]
    InvalidTopic { topic: String, reason: &'static str },

    /// Invalid configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Connection closed by peer or by `disconnect`.
    #[error("connection closed")]
    ConnectionClosed,

    /// Protocol error (malformed or oversized frame).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Unexpected packet received.
    #[error("unexpected packet: expected {expected}, got {got}")]
    UnexpectedPacket { expected: String, got: String },
}

/// Failures while establishing a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// TCP connection refused, or CONNACK carried a refusal code.
    #[error("connection refused: {0}")]
    Refused(String),

    /// No socket or no CONNACK within the connect timeout.
    #[error("timed out")]
    Timeout,

    /// TLS handshake or certificate validation failed.
    #[error("tls validation failed: {0}")]
    TlsValidationFailed(String),

    /// Host name did not resolve.
    #[error("dns lookup failed for {0}")]
    DnsFailure(String),

    /// Any other socket error while connecting.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Subscribe failures.
#[derive(Debug, thiserror::Error)]
pub enum SubscribeError {
    /// Broker answered SUBACK with the failure return code.
    #[error("subscription to {0:?} rejected by broker")]
    Rejected(String),
}

/// Publish failures.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The frame could not be encoded.
    #[error("publish rejected: {0}")]
    Rejected(String),

    /// The encoded PUBLISH frame exceeds the configured maximum packet size.
    #[error("publish of {size} bytes exceeds maximum packet size of {max}")]
    PayloadTooLarge { size: usize, max: usize },
}

/// I/O failures on an established connection.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Peer reset the connection.
    #[error("connection reset: {0}")]
    ConnectionReset(io::Error),

    /// Writing a frame failed.
    #[error("write failed: {0}")]
    WriteFailed(io::Error),

    /// A PINGREQ went unanswered for a whole keepalive interval.
    #[error("no PINGRESP within {0:?}")]
    KeepAliveTimeout(Duration),
}

impl From<rumqttc::mqttbytes::Error> for Error {
    fn from(e: rumqttc::mqttbytes::Error) -> Self {
        Error::Protocol(e.to_string())
    }
}

impl Error {
    /// Whether this error came from the broker refusing the connection.
    pub fn is_refused(&self) -> bool {
        matches!(self, Error::Connect(ConnectError::Refused(_)))
    }
}
