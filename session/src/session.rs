//! Session controller.
//!
//! A [`Session`] owns one [`ConnectionConfig`] and at most one live broker
//! connection. It drives the CONNECT handshake, tracks packet identifiers
//! for acknowledged operations and runs two background tasks per
//! connection: a read loop that dispatches inbound packets in wire order
//! and a keepalive task that sends PINGREQ.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::ConnectionConfig;
use crate::error::{ConnectError, Error, IoError, PublishError, Result, SubscribeError};
use crate::observer::Observer;
use crate::protocol::{self, ConnectReturnCode, Packet, Publish, SubscribeReasonCode};
use crate::topic;
use crate::transport::{Connection, FrameReader, FrameWriter};
use crate::types::{Message, QoS, SessionEvent, SessionState, Subscription};

/// Acknowledgement a waiter is completed with.
#[derive(Debug)]
enum Ack {
    /// SUBACK; `None` means the broker rejected the filter.
    Granted(Option<QoS>),
    Done,
}

/// What a pending packet identifier is waiting for.
#[derive(Debug)]
enum Expect {
    SubAck(String),
    UnsubAck(String),
    PubAck,
    PubComp,
}

struct Waiter {
    expect: Expect,
    tx: oneshot::Sender<Result<Ack>>,
}

#[derive(Default)]
struct PendingTable {
    closed: bool,
    waiters: HashMap<u16, Waiter>,
}

/// One live broker connection.
struct Link {
    writer: tokio::sync::Mutex<FrameWriter>,
    cancel: CancellationToken,
    pending: Mutex<PendingTable>,
    /// Inbound QoS 2 identifiers that have been PUBRECed but not yet released.
    inbound_qos2: Mutex<HashSet<u16>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Set when a PINGREQ is sent, cleared by PINGRESP.
    ping_outstanding: AtomicBool,
    max_packet_size: usize,
}

impl Link {
    fn new(writer: FrameWriter, max_packet_size: usize) -> Self {
        Self {
            writer: tokio::sync::Mutex::new(writer),
            cancel: CancellationToken::new(),
            pending: Mutex::new(PendingTable::default()),
            inbound_qos2: Mutex::new(HashSet::new()),
            tasks: Mutex::new(Vec::new()),
            ping_outstanding: AtomicBool::new(false),
            max_packet_size,
        }
    }

    async fn send(&self, packet: &Packet) -> Result<()> {
        let frame = protocol::encode(packet, self.max_packet_size)?;
        self.send_frame(&frame).await
    }

    async fn send_frame(&self, frame: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.send(frame).await
    }

    fn register(&self, pkid: u16, expect: Expect) -> Result<oneshot::Receiver<Result<Ack>>> {
        let mut pending = self.pending.lock();
        if pending.closed {
            return Err(Error::ConnectionClosed);
        }
        let (tx, rx) = oneshot::channel();
        if pending.waiters.insert(pkid, Waiter { expect, tx }).is_some() {
            warn!("Packet id {} reused while still pending", pkid);
        }
        Ok(rx)
    }

    fn take_waiter(&self, pkid: u16) -> Option<Waiter> {
        self.pending.lock().waiters.remove(&pkid)
    }

    fn complete(&self, pkid: u16, ack: Ack) {
        match self.take_waiter(pkid) {
            Some(waiter) => {
                let _ = waiter.tx.send(Ok(ack));
            }
            None => debug!("No pending operation for {:?} pkid={}", ack, pkid),
        }
    }

    /// Fail every pending wait and refuse new ones.
    fn fail_pending(&self) {
        let waiters = {
            let mut pending = self.pending.lock();
            pending.closed = true;
            std::mem::take(&mut pending.waiters)
        };
        for (pkid, waiter) in waiters {
            trace!("Failing pending {:?} pkid={}", waiter.expect, pkid);
            let _ = waiter.tx.send(Err(Error::ConnectionClosed));
        }
    }

    fn take_tasks(&self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut *self.tasks.lock())
    }
}

struct Inner {
    config: ConnectionConfig,
    observer: Arc<dyn Observer>,
    state: Mutex<SessionState>,
    link: Mutex<Option<Arc<Link>>>,
    connecting: Mutex<Option<CancellationToken>>,
    next_pkid: Mutex<u16>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl Inner {
    fn notify(&self, state: SessionState, event: SessionEvent, error: Option<&str>) {
        debug!("Session {} -> {} ({:?})", self.config.client_id, state, event);
        self.observer.on_state_change(state, event, error);
    }

    fn next_pkid(&self) -> u16 {
        let mut next = self.next_pkid.lock();
        let pkid = *next;
        *next = if pkid == u16::MAX { 1 } else { pkid + 1 };
        pkid
    }

    fn live_link(&self) -> Result<Arc<Link>> {
        let state = self.state.lock();
        if *state != SessionState::Connected {
            return Err(Error::NotConnected);
        }
        self.link.lock().clone().ok_or(Error::NotConnected)
    }

    fn record_subscription(&self, filter: &str, granted: QoS) {
        let mut subs = self.subscriptions.lock();
        match subs.iter_mut().find(|s| s.filter == filter) {
            Some(existing) => existing.granted = granted,
            None => subs.push(Subscription {
                filter: filter.to_string(),
                granted,
            }),
        }
    }

    fn drop_subscription(&self, filter: &str) {
        self.subscriptions.lock().retain(|s| s.filter != filter);
    }

    async fn read_loop(self: Arc<Self>, link: Arc<Link>, reader: FrameReader) {
        let frames = reader.into_frames();
        tokio::pin!(frames);

        let err = loop {
            let next = tokio::select! {
                _ = link.cancel.cancelled() => {
                    trace!("Read loop cancelled");
                    return;
                }
                next = frames.next() => next,
            };

            match next {
                Some(Ok(frame)) => {
                    if let Err(e) = self.handle_frame(&link, &frame).await {
                        break e;
                    }
                }
                Some(Err(e)) => break e,
                None => break Error::ConnectionClosed,
            }
        };

        self.connection_lost(&link, err);
    }

    async fn handle_frame(&self, link: &Link, frame: &[u8]) -> Result<()> {
        let packet = protocol::decode(frame, link.max_packet_size)?;
        trace!("Received {}", protocol::packet_name(&packet));

        match packet {
            Packet::Publish(publish) => self.handle_publish(link, publish).await?,
            Packet::PubRel(pubrel) => {
                link.inbound_qos2.lock().remove(&pubrel.pkid);
                link.send(&protocol::create_pubcomp(pubrel.pkid)).await?;
            }
            Packet::SubAck(suback) => {
                let granted = match suback.return_codes.first() {
                    Some(SubscribeReasonCode::Success(qos)) => Some(QoS::from(*qos)),
                    _ => None,
                };
                match link.take_waiter(suback.pkid) {
                    Some(Waiter {
                        expect: Expect::SubAck(filter),
                        tx,
                    }) => {
                        if let Some(qos) = granted {
                            self.record_subscription(&filter, qos);
                        }
                        self.observer.on_subscribe_ack(&filter, granted);
                        let _ = tx.send(Ok(Ack::Granted(granted)));
                    }
                    Some(waiter) => {
                        let _ = waiter.tx.send(Err(Error::UnexpectedPacket {
                            expected: format!("{:?}", waiter.expect),
                            got: "SubAck".to_string(),
                        }));
                    }
                    None => debug!("Unsolicited SubAck pkid={}", suback.pkid),
                }
            }
            Packet::UnsubAck(unsuback) => match link.take_waiter(unsuback.pkid) {
                Some(Waiter {
                    expect: Expect::UnsubAck(filter),
                    tx,
                }) => {
                    self.drop_subscription(&filter);
                    let _ = tx.send(Ok(Ack::Done));
                }
                Some(waiter) => {
                    let _ = waiter.tx.send(Err(Error::UnexpectedPacket {
                        expected: format!("{:?}", waiter.expect),
                        got: "UnsubAck".to_string(),
                    }));
                }
                None => debug!("Unsolicited UnsubAck pkid={}", unsuback.pkid),
            },
            Packet::PubAck(puback) => link.complete(puback.pkid, Ack::Done),
            Packet::PubRec(pubrec) => {
                link.send(&protocol::create_pubrel(pubrec.pkid)).await?;
            }
            Packet::PubComp(pubcomp) => link.complete(pubcomp.pkid, Ack::Done),
            Packet::PingResp => {
                trace!("Received PingResp");
                link.ping_outstanding.store(false, Ordering::Release);
            }
            Packet::Disconnect => return Err(Error::ConnectionClosed),
            other => {
                return Err(Error::UnexpectedPacket {
                    expected: "server packet".to_string(),
                    got: protocol::packet_name(&other).to_string(),
                });
            }
        }
        Ok(())
    }

    async fn handle_publish(&self, link: &Link, publish: Publish) -> Result<()> {
        let message = protocol::to_message(&publish);

        match message.qos {
            QoS::AtMostOnce => self.dispatch(&message),
            QoS::AtLeastOnce => {
                self.dispatch(&message);
                link.send(&protocol::create_puback(publish.pkid)).await?;
            }
            QoS::ExactlyOnce => {
                let fresh = link.inbound_qos2.lock().insert(publish.pkid);
                if fresh {
                    self.dispatch(&message);
                } else {
                    debug!(
                        "Skipping redelivered QoS2 publish pkid={} dup={}",
                        publish.pkid, publish.dup
                    );
                }
                link.send(&protocol::create_pubrec(publish.pkid)).await?;
            }
        }
        Ok(())
    }

    fn dispatch(&self, message: &Message) {
        let matched = self
            .subscriptions
            .lock()
            .iter()
            .any(|s| topic::matches(&s.filter, &message.topic));
        if !matched {
            debug!("Message on {} matches no active subscription", message.topic);
        }
        trace!("Dispatching {} bytes on {}", message.payload.len(), message.topic);
        self.observer.on_message(message);
    }

    fn connection_lost(&self, link: &Arc<Link>, err: Error) {
        link.cancel.cancel();
        link.fail_pending();

        {
            let mut state = self.state.lock();
            let mut current = self.link.lock();
            let ours = current.as_ref().is_some_and(|l| Arc::ptr_eq(l, link));
            if *state != SessionState::Connected || !ours {
                trace!("Read loop ended during shutdown: {}", err);
                return;
            }
            *state = SessionState::Disconnected;
            *current = None;
        }
        self.subscriptions.lock().clear();

        let event = match &err {
            Error::ConnectionClosed => SessionEvent::ConnectionClosedByBroker,
            Error::Protocol(_) | Error::UnexpectedPacket { .. } => SessionEvent::ProtocolError,
            _ => SessionEvent::ConnectionError,
        };
        warn!("Connection to {} lost: {}", self.config.addr(), err);
        self.notify(SessionState::Disconnected, event, Some(&err.to_string()));
    }

    /// Send PINGREQ every `interval`; a ping still unanswered at the next
    /// tick fails the link.
    async fn keepalive_loop(self: Arc<Self>, link: Arc<Link>, interval: Duration) {
        let ping = match protocol::encode(&protocol::create_pingreq(), link.max_packet_size) {
            Ok(frame) => frame.freeze(),
            Err(e) => {
                warn!("Could not encode PingReq: {}", e);
                return;
            }
        };

        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        loop {
            tokio::select! {
                _ = link.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if link.ping_outstanding.swap(true, Ordering::AcqRel) {
                self.connection_lost(&link, IoError::KeepAliveTimeout(interval).into());
                break;
            }
            if let Err(e) = link.send_frame(&ping).await {
                warn!("Keepalive ping failed: {}", e);
                break;
            }
            trace!("Keepalive ping sent");
        }
        trace!("Keepalive task stopping");
    }
}

/// Resets a connect attempt whose future is dropped before it finishes.
struct ConnectGuard<'a> {
    inner: &'a Inner,
    token: CancellationToken,
    armed: bool,
}

impl ConnectGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ConnectGuard<'_> {
    fn drop(&mut self) {
        // A cancelled token means disconnect already reset the state.
        if !self.armed || self.token.is_cancelled() {
            return;
        }
        {
            let mut state = self.inner.state.lock();
            if *state != SessionState::Connecting {
                return;
            }
            *state = SessionState::Disconnected;
            self.inner.connecting.lock().take();
        }
        debug!("Connect to {} abandoned", self.inner.config.addr());
        self.inner.notify(
            SessionState::Disconnected,
            SessionEvent::ConnectionClosed,
            None,
        );
    }
}

/// MQTT 3.1.1 client session.
///
/// All operations take `&self`; share a session between tasks with `Arc`.
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Create a disconnected session.
    pub fn new(config: ConnectionConfig, observer: Arc<dyn Observer>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                observer,
                state: Mutex::new(SessionState::Disconnected),
                link: Mutex::new(None),
                connecting: Mutex::new(None),
                next_pkid: Mutex::new(1),
                subscriptions: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }

    /// Whether the session is connected.
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Client id sent in CONNECT.
    pub fn client_id(&self) -> &str {
        &self.inner.config.client_id
    }

    /// The configuration this session was created with.
    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Subscriptions the broker has accepted on the current connection.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.inner.subscriptions.lock().clone()
    }

    /// Connect to the broker.
    ///
    /// Socket setup plus CONNACK must complete within the configured connect
    /// timeout. A concurrent [`disconnect`](Self::disconnect) aborts the
    /// attempt with [`Error::ConnectionClosed`].
    pub async fn connect(&self) -> Result<()> {
        let token = CancellationToken::new();
        {
            let mut state = self.inner.state.lock();
            if *state != SessionState::Disconnected {
                return Err(Error::AlreadyConnected);
            }
            *state = SessionState::Connecting;
            *self.inner.connecting.lock() = Some(token.clone());
        }
        let guard = ConnectGuard {
            inner: &self.inner,
            token: token.clone(),
            armed: true,
        };
        self.inner
            .notify(SessionState::Connecting, SessionEvent::Connecting, None);

        let config = &self.inner.config;
        debug!("Connecting to {} as {}", config.addr(), config.client_id);

        let result = tokio::select! {
            _ = token.cancelled() => Err(Error::ConnectionClosed),
            r = tokio::time::timeout(config.connect_timeout, self.handshake()) => match r {
                Ok(r) => r,
                Err(_) => Err(ConnectError::Timeout.into()),
            },
        };

        guard.disarm();
        let conn = match result {
            Ok(conn) => conn,
            Err(e) => return Err(self.connect_failed(&token, e)),
        };

        let (reader, writer) = conn.split();
        let link = Arc::new(Link::new(writer, config.max_packet_size));
        {
            let mut state = self.inner.state.lock();
            if token.is_cancelled() {
                return Err(Error::ConnectionClosed);
            }
            self.inner.connecting.lock().take();
            *state = SessionState::Connected;
            *self.inner.link.lock() = Some(Arc::clone(&link));
        }

        let mut tasks = vec![tokio::spawn(Arc::clone(&self.inner).read_loop(
            Arc::clone(&link),
            reader,
        ))];
        if config.keep_alive > 0 {
            let interval = Duration::from_secs((config.keep_alive / 2).max(1) as u64);
            tasks.push(tokio::spawn(
                Arc::clone(&self.inner).keepalive_loop(Arc::clone(&link), interval),
            ));
            debug!("Started keepalive task (interval={:?})", interval);
        }
        link.tasks.lock().extend(tasks);

        self.inner
            .notify(SessionState::Connected, SessionEvent::Connected, None);
        Ok(())
    }

    async fn handshake(&self) -> Result<Connection> {
        let config = &self.inner.config;
        let mut conn = Connection::open(config).await?;

        let connect = protocol::create_connect(
            &config.client_id,
            config.keep_alive,
            config.clean_session,
        );
        conn.send(&protocol::encode(&connect, config.max_packet_size)?)
            .await?;

        let frame = conn.next_frame().await?;
        match protocol::decode(&frame, config.max_packet_size)? {
            Packet::ConnAck(connack) => {
                if connack.code != ConnectReturnCode::Success {
                    return Err(ConnectError::Refused(format!("{:?}", connack.code)).into());
                }
                debug!(
                    "Connected to {}, session_present={}",
                    config.addr(),
                    connack.session_present
                );
                Ok(conn)
            }
            other => Err(Error::UnexpectedPacket {
                expected: "ConnAck".to_string(),
                got: protocol::packet_name(&other).to_string(),
            }),
        }
    }

    fn connect_failed(&self, token: &CancellationToken, err: Error) -> Error {
        {
            let mut state = self.inner.state.lock();
            if token.is_cancelled() {
                return Error::ConnectionClosed;
            }
            self.inner.connecting.lock().take();
            *state = SessionState::Disconnected;
        }

        let event = match &err {
            Error::Connect(ConnectError::Refused(_)) => SessionEvent::ConnectionRefused,
            Error::ConnectionClosed => SessionEvent::ConnectionClosed,
            Error::Protocol(_) | Error::UnexpectedPacket { .. } => SessionEvent::ProtocolError,
            _ => SessionEvent::ConnectionError,
        };
        debug!("Connect to {} failed: {}", self.inner.config.addr(), err);
        self.inner
            .notify(SessionState::Disconnected, event, Some(&err.to_string()));
        err
    }

    /// Subscribe to a topic filter and return the QoS the broker granted.
    pub async fn subscribe(&self, filter: &str, qos: QoS) -> Result<QoS> {
        let link = self.inner.live_link()?;
        topic::validate_filter(filter)?;

        let pkid = self.inner.next_pkid();
        debug!("Subscribing to {} ({}) with pkid={}", filter, qos, pkid);

        let ack = self
            .request(
                &link,
                pkid,
                Expect::SubAck(filter.to_string()),
                &protocol::create_subscribe(pkid, filter, qos),
            )
            .await?;

        match ack {
            Ack::Granted(Some(granted)) => Ok(granted),
            _ => Err(SubscribeError::Rejected(filter.to_string()).into()),
        }
    }

    /// Unsubscribe from a topic filter.
    pub async fn unsubscribe(&self, filter: &str) -> Result<()> {
        let link = self.inner.live_link()?;
        topic::validate_filter(filter)?;

        let pkid = self.inner.next_pkid();
        debug!("Unsubscribing from {} with pkid={}", filter, pkid);

        self.request(
            &link,
            pkid,
            Expect::UnsubAck(filter.to_string()),
            &protocol::create_unsubscribe(pkid, filter),
        )
        .await?;
        Ok(())
    }

    /// Publish a message.
    ///
    /// QoS 0 returns once the frame is written, QoS 1 once PUBACK arrives
    /// and QoS 2 once PUBCOMP arrives.
    pub async fn publish(
        &self,
        topic: &str,
        payload: impl Into<Bytes>,
        qos: QoS,
        retain: bool,
    ) -> Result<()> {
        let link = self.inner.live_link()?;
        topic::validate_topic(topic)?;

        let payload = payload.into();
        let max = self.inner.config.max_packet_size;
        let pkid = match qos {
            QoS::AtMostOnce => 0,
            _ => self.inner.next_pkid(),
        };
        let packet = protocol::create_publish(topic, &payload, qos, retain, pkid);
        let size = packet.size();
        if size > max {
            return Err(PublishError::PayloadTooLarge { size, max }.into());
        }
        let frame = protocol::encode(&packet, max)
            .map_err(|e| PublishError::Rejected(e.to_string()))?;

        trace!("Publishing to {} ({} bytes, {})", topic, payload.len(), qos);

        let expect = match qos {
            QoS::AtMostOnce => return link.send_frame(&frame).await,
            QoS::AtLeastOnce => Expect::PubAck,
            QoS::ExactlyOnce => Expect::PubComp,
        };

        let rx = link.register(pkid, expect)?;
        if let Err(e) = link.send_frame(&frame).await {
            link.take_waiter(pkid);
            return Err(e);
        }
        Self::wait(rx).await?;
        Ok(())
    }

    /// Publish a prepared [`Message`].
    pub async fn publish_message(&self, message: &Message) -> Result<()> {
        self.publish(
            &message.topic,
            message.payload.clone(),
            message.qos,
            message.retain,
        )
        .await
    }

    async fn request(&self, link: &Link, pkid: u16, expect: Expect, packet: &Packet) -> Result<Ack> {
        let rx = link.register(pkid, expect)?;
        if let Err(e) = link.send(packet).await {
            link.take_waiter(pkid);
            return Err(e);
        }
        Self::wait(rx).await
    }

    async fn wait(rx: oneshot::Receiver<Result<Ack>>) -> Result<Ack> {
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::ConnectionClosed),
        }
    }

    /// Disconnect from the broker. Calling it when already disconnected is
    /// a no-op; calling it while connecting aborts the attempt.
    pub async fn disconnect(&self) -> Result<()> {
        // `None` when a pending connect was cancelled instead.
        let closing = {
            let mut state = self.inner.state.lock();
            match *state {
                SessionState::Disconnected | SessionState::Closing => return Ok(()),
                SessionState::Connecting => {
                    if let Some(token) = self.inner.connecting.lock().take() {
                        debug!("Cancelling pending connect");
                        token.cancel();
                    }
                    *state = SessionState::Disconnected;
                    None
                }
                SessionState::Connected => {
                    *state = SessionState::Closing;
                    Some(self.inner.link.lock().take())
                }
            }
        };

        let Some(link) = closing else {
            self.inner.notify(
                SessionState::Disconnected,
                SessionEvent::ConnectionClosed,
                None,
            );
            return Ok(());
        };

        debug!("Disconnecting from {}", self.inner.config.addr());

        if let Some(link) = link {
            if let Err(e) = link.send(&protocol::create_disconnect()).await {
                debug!("Failed to send Disconnect: {}", e);
            }
            if let Err(e) = link.writer.lock().await.close().await {
                debug!("Failed to close connection: {}", e);
            }
            link.cancel.cancel();
            link.fail_pending();
            for task in link.take_tasks() {
                if let Err(e) = task.await {
                    warn!("Session task failed: {}", e);
                }
            }
        }

        self.inner.subscriptions.lock().clear();
        *self.inner.state.lock() = SessionState::Disconnected;
        self.inner.notify(
            SessionState::Disconnected,
            SessionEvent::ConnectionClosed,
            None,
        );
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(token) = self.inner.connecting.lock().take() {
            token.cancel();
        }
        if let Some(link) = self.inner.link.lock().take() {
            link.cancel.cancel();
            link.fail_pending();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("client_id", &self.inner.config.client_id)
            .field("addr", &self.inner.config.addr())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;

    fn session() -> Session {
        Session::new(
            ConnectionConfig::new("127.0.0.1", 1883, "unit"),
            Arc::new(NoopObserver),
        )
    }

    #[test]
    fn test_pkid_wraps_and_skips_zero() {
        let session = session();
        *session.inner.next_pkid.lock() = u16::MAX - 1;
        assert_eq!(session.inner.next_pkid(), u16::MAX - 1);
        assert_eq!(session.inner.next_pkid(), u16::MAX);
        assert_eq!(session.inner.next_pkid(), 1);
        assert_eq!(session.inner.next_pkid(), 2);
    }

    #[test]
    fn test_new_session_is_disconnected() {
        let session = session();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_connected());
        assert_eq!(session.client_id(), "unit");
        assert_eq!(session.config().port, 1883);
        assert!(session.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn test_operations_require_connection() {
        let session = session();
        assert!(matches!(
            session.publish("t", "x", QoS::AtMostOnce, false).await,
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            session.subscribe("t", QoS::AtMostOnce).await,
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            session.unsubscribe("t").await,
            Err(Error::NotConnected)
        ));
        assert!(session.disconnect().await.is_ok());
    }

    #[tokio::test]
    async fn test_pending_waits_fail_once_closed() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap() });
        let conn = Connection::open(&ConnectionConfig::new("127.0.0.1", port, "pending"))
            .await
            .unwrap();
        let _peer = accept.await.unwrap();
        let (_reader, writer) = conn.split();

        let link = Link::new(writer, protocol::MAX_PACKET_SIZE);
        let mut rx = link.register(1, Expect::PubAck).unwrap();
        link.fail_pending();
        assert!(matches!(rx.try_recv(), Ok(Err(Error::ConnectionClosed))));
        assert!(matches!(
            link.register(2, Expect::PubAck),
            Err(Error::ConnectionClosed)
        ));
    }
}
