//! Transport binding: socket setup and MQTT frame delimiting.
//!
//! [`Connection::open`] resolves the broker host, connects TCP and, when the
//! config asks for it, completes a TLS handshake with certificate
//! validation. The resulting byte stream is split into a [`FrameReader`]
//! that yields whole MQTT frames and a [`FrameWriter`] that writes them.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::Stream;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, trace};

#[cfg(feature = "tls")]
use tokio_rustls::client::TlsStream;

use crate::config::ConnectionConfig;
use crate::error::{ConnectError, Error, IoError, Result};
use crate::protocol;

/// A unified transport that wraps different connection types.
pub enum Transport {
    /// Plain TCP stream.
    Tcp(TcpStream),
    /// TLS stream.
    #[cfg(feature = "tls")]
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for Transport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            #[cfg(feature = "tls")]
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Transport::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            #[cfg(feature = "tls")]
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            #[cfg(feature = "tls")]
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            #[cfg(feature = "tls")]
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

/// An open byte connection to the broker.
pub struct Connection {
    reader: FrameReader,
    writer: FrameWriter,
    tls: bool,
}

impl Connection {
    /// Open a connection, bounded by `config.connect_timeout`.
    pub async fn open(config: &ConnectionConfig) -> Result<Self> {
        config.validate()?;

        match tokio::time::timeout(config.connect_timeout, Self::establish(config)).await {
            Ok(result) => result,
            Err(_) => {
                debug!("Opening {} timed out after {:?}", config.addr(), config.connect_timeout);
                Err(ConnectError::Timeout.into())
            }
        }
    }

    async fn establish(config: &ConnectionConfig) -> Result<Self> {
        let stream = connect_tcp(&config.host, config.port).await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay failed: {}", e);
        }

        let transport = if config.use_tls {
            open_tls(stream, &config.host).await?
        } else {
            Transport::Tcp(stream)
        };

        Ok(Self::from_transport(
            transport,
            config.use_tls,
            config.max_packet_size,
        ))
    }

    /// Wrap an already established transport.
    pub fn from_transport(transport: Transport, tls: bool, max_packet_size: usize) -> Self {
        let (read_half, write_half) = tokio::io::split(transport);
        Self {
            reader: FrameReader::new(read_half, max_packet_size),
            writer: FrameWriter { inner: write_half },
            tls,
        }
    }

    /// Whether the connection runs over TLS.
    pub fn is_tls(&self) -> bool {
        self.tls
    }

    /// Write one frame.
    pub async fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.writer.send(frame).await
    }

    /// Read the next frame.
    pub async fn next_frame(&mut self) -> Result<Bytes> {
        self.reader.next_frame().await
    }

    /// Shut down the write side, which closes the socket for the peer.
    pub async fn close(mut self) -> Result<()> {
        self.writer.close().await
    }

    /// Split into independently owned read and write halves.
    pub fn split(self) -> (FrameReader, FrameWriter) {
        (self.reader, self.writer)
    }
}

async fn connect_tcp(host: &str, port: u16) -> std::result::Result<TcpStream, ConnectError> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| ConnectError::DnsFailure(format!("{}: {}", host, e)))?
        .collect();

    if addrs.is_empty() {
        return Err(ConnectError::DnsFailure(format!("{}: no addresses", host)));
    }

    let mut last_err = None;
    for addr in addrs {
        debug!("Connecting to {} ({}:{})", addr, host, port);
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("Connect to {} failed: {}", addr, e);
                last_err = Some(e);
            }
        }
    }

    Err(match last_err {
        Some(e) => classify_connect_error(e),
        None => ConnectError::DnsFailure(host.to_string()),
    })
}

fn classify_connect_error(e: io::Error) -> ConnectError {
    match e.kind() {
        io::ErrorKind::ConnectionRefused => ConnectError::Refused(e.to_string()),
        io::ErrorKind::TimedOut => ConnectError::Timeout,
        _ => ConnectError::Io(e),
    }
}

#[cfg(feature = "tls")]
async fn open_tls(stream: TcpStream, host: &str) -> std::result::Result<Transport, ConnectError> {
    let tls = tls::TlsConfig::new();
    let stream = tls.connect(stream, host).await?;
    Ok(Transport::Tls(Box::new(stream)))
}

#[cfg(not(feature = "tls"))]
async fn open_tls(_stream: TcpStream, _host: &str) -> std::result::Result<Transport, ConnectError> {
    Err(ConnectError::TlsValidationFailed(
        "built without tls support".to_string(),
    ))
}

fn read_error(e: io::Error) -> Error {
    match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
        _ => Error::Io(IoError::ConnectionReset(e)),
    }
}

/// Read half: yields complete MQTT frames.
pub struct FrameReader {
    inner: ReadHalf<Transport>,
    buf: BytesMut,
    max_packet_size: usize,
}

impl FrameReader {
    fn new(inner: ReadHalf<Transport>, max_packet_size: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(4096),
            max_packet_size,
        }
    }

    /// Read exactly one frame (fixed header plus remaining length bytes).
    ///
    /// EOF yields [`Error::ConnectionClosed`].
    pub async fn next_frame(&mut self) -> Result<Bytes> {
        loop {
            if let Some(len) = protocol::frame_len(&self.buf, self.max_packet_size)? {
                if self.buf.len() >= len {
                    trace!("Read frame of {} bytes", len);
                    return Ok(self.buf.split_to(len).freeze());
                }
                self.buf.reserve(len - self.buf.len());
            }

            let n = self.inner.read_buf(&mut self.buf).await.map_err(read_error)?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }

    /// Lazy stream of frames. Ends after yielding the first error.
    pub fn into_frames(self) -> impl Stream<Item = Result<Bytes>> + Send {
        futures::stream::unfold(Some(self), |state| async move {
            let mut reader = state?;
            match reader.next_frame().await {
                Ok(frame) => Some((Ok(frame), Some(reader))),
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

/// Write half: writes whole frames.
pub struct FrameWriter {
    inner: WriteHalf<Transport>,
}

impl FrameWriter {
    /// Write one frame and flush it.
    pub async fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.inner
            .write_all(frame)
            .await
            .map_err(|e| Error::Io(IoError::WriteFailed(e)))?;
        self.inner
            .flush()
            .await
            .map_err(|e| Error::Io(IoError::WriteFailed(e)))?;
        Ok(())
    }

    /// Shut down the write side.
    pub async fn close(&mut self) -> Result<()> {
        self.inner
            .shutdown()
            .await
            .map_err(|e| Error::Io(IoError::WriteFailed(e)))
    }
}

#[cfg(feature = "tls")]
pub mod tls {
    //! TLS configuration. Certificates are always validated against the
    //! webpki root store.

    use std::sync::Arc;
    use tokio::net::TcpStream;
    use tokio_rustls::TlsConnector;
    use tokio_rustls::rustls::{ClientConfig, RootCertStore};

    use crate::error::ConnectError;

    /// TLS configuration for client connections.
    #[derive(Clone)]
    pub struct TlsConfig {
        /// The TLS connector.
        pub connector: TlsConnector,
    }

    impl TlsConfig {
        /// Create a TLS config trusting the webpki root certificates.
        pub fn new() -> Self {
            let root_store = RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            };
            Self::with_roots(root_store)
        }

        /// Create a TLS config trusting only `roots`.
        pub fn with_roots(roots: RootCertStore) -> Self {
            let config = ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth();

            Self {
                connector: TlsConnector::from(Arc::new(config)),
            }
        }

        /// Run the TLS handshake over `stream`, validating `domain`.
        pub async fn connect(
            &self,
            stream: TcpStream,
            domain: &str,
        ) -> Result<tokio_rustls::client::TlsStream<TcpStream>, ConnectError> {
            use tokio_rustls::rustls::pki_types::ServerName;

            let domain = ServerName::try_from(domain.to_string()).map_err(|e| {
                ConnectError::TlsValidationFailed(format!("invalid server name: {}", e))
            })?;

            self.connector
                .connect(domain, stream)
                .await
                .map_err(classify_handshake_error)
        }
    }

    impl Default for TlsConfig {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Errors raised by rustls during the handshake are validation failures;
    /// anything else is a plain socket error.
    fn classify_handshake_error(e: std::io::Error) -> ConnectError {
        let rustls_err = e
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<tokio_rustls::rustls::Error>());
        match rustls_err {
            Some(err) => ConnectError::TlsValidationFailed(err.to_string()),
            None => ConnectError::Io(e),
        }
    }

}
