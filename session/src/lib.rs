//! MQTT 3.1.1 session layer for mqttchat.
//!
//! The crate owns two layers:
//!
//! - **Transport** ([`transport`]): resolves the broker, opens TCP (and TLS
//!   when asked) and frames the byte stream into MQTT packets.
//! - **Session** ([`Session`]): CONNECT handshake, subscribe/unsubscribe,
//!   publish at QoS 0/1/2, inbound dispatch to an [`Observer`], keepalive
//!   and graceful disconnect.
//!
//! Packet encoding is delegated to `rumqttc::mqttbytes::v4` via [`protocol`].
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mqttchat_session::{ChannelObserver, ConnectionConfig, Event, QoS, Session};
//!
//! #[tokio::main]
//! async fn main() -> mqttchat_session::Result<()> {
//!     let config = ConnectionConfig::with_generated_id("broker.hivemq.com", 1883, "mqttchat");
//!     let (observer, mut events) = ChannelObserver::new();
//!     let session = Session::new(config, Arc::new(observer));
//!
//!     session.connect().await?;
//!     session.subscribe("messagesFromCroatia/#", QoS::AtMostOnce).await?;
//!     session.publish("messagesFromCroatia", "hello", QoS::AtMostOnce, false).await?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let Event::Message(msg) = event {
//!             println!("{}: {:?}", msg.topic, msg.payload_str());
//!             break;
//!         }
//!     }
//!
//!     session.disconnect().await
//! }
//! ```

mod config;
mod error;
mod observer;
pub mod protocol;
mod session;
pub mod topic;
pub mod transport;
mod types;

pub use config::{
    ConnectionConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, DEFAULT_TLS_PORT, generate_client_id,
};
pub use error::{ConnectError, Error, IoError, PublishError, Result, SubscribeError};
pub use observer::{ChannelObserver, Event, NoopObserver, Observer};
pub use session::Session;
pub use types::{Message, QoS, SessionEvent, SessionState, Subscription};

#[cfg(feature = "tls")]
pub use transport::tls::TlsConfig;
