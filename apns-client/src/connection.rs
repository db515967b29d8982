//! Connection management.

use crate::error::ClientError;
use crate::tls::create_tls_connector;
use apns_protocol::{
    FEEDBACK_PORT, FEEDBACK_PRODUCTION, FEEDBACK_SANDBOX, GATEWAY_PORT, GATEWAY_PRODUCTION,
    GATEWAY_SANDBOX,
};
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default number of connect attempts.
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 3;

/// Transport security negotiated with the gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProtocolScheme {
    /// Pinned to TLS 1.2, the oldest version rustls speaks.
    Ssl,
    #[default]
    Tls,
}

impl fmt::Display for ProtocolScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolScheme::Ssl => f.write_str("ssl"),
            ProtocolScheme::Tls => f.write_str("tls"),
        }
    }
}

impl FromStr for ProtocolScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ssl" => Ok(ProtocolScheme::Ssl),
            "tls" => Ok(ProtocolScheme::Tls),
            other => Err(format!("unknown protocol scheme: {}", other)),
        }
    }
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Service host name.
    pub host: String,
    /// Service port.
    pub port: u16,
    /// PEM file holding the client certificate and its private key.
    pub certificate_file: PathBuf,
    /// Passphrase for an encrypted private key.
    pub passphrase: Option<String>,
    /// PEM file with the CA certificates to trust. If None, webpki roots are used.
    pub ca_file: Option<PathBuf>,
    /// Skip server certificate verification (INSECURE - development only).
    pub insecure: bool,
    /// Server name for SNI (defaults to host).
    pub server_name: Option<String>,
    pub scheme: ProtocolScheme,
    /// Timeout for a single connect attempt, TLS handshake included.
    pub connect_timeout: Duration,
    /// Pause between failed connect attempts.
    pub attempt_delay: Duration,
    /// Connect attempts before giving up. Never below 1.
    pub connect_attempts: u32,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            certificate_file: PathBuf::new(),
            passphrase: None,
            ca_file: None,
            insecure: false,
            server_name: None,
            scheme: ProtocolScheme::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            attempt_delay: Duration::ZERO,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
        }
    }

    /// Push gateway endpoint.
    pub fn gateway(sandbox: bool) -> Self {
        let host = if sandbox {
            GATEWAY_SANDBOX
        } else {
            GATEWAY_PRODUCTION
        };
        Self::new(host, GATEWAY_PORT)
    }

    /// Feedback service endpoint.
    pub fn feedback(sandbox: bool) -> Self {
        let host = if sandbox {
            FEEDBACK_SANDBOX
        } else {
            FEEDBACK_PRODUCTION
        };
        Self::new(host, FEEDBACK_PORT)
    }

    pub fn with_certificate_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.certificate_file = path.into();
        self
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn with_ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    pub fn with_scheme(mut self, scheme: ProtocolScheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_attempt_delay(mut self, delay: Duration) -> Self {
        self.attempt_delay = delay;
        self
    }

    pub fn with_connect_attempts(mut self, attempts: u32) -> Self {
        self.connect_attempts = attempts.max(1);
        self
    }

    /// `host:port`, as used in log lines and errors.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Opens a single connection to the configured endpoint.
pub trait Dial {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    fn dial(
        &self,
        config: &ConnectionConfig,
    ) -> impl Future<Output = Result<Self::Stream, ClientError>> + Send;
}

/// Dials over TCP and performs the TLS handshake with the client identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct TlsDialer;

impl Dial for TlsDialer {
    type Stream = TlsStream<TcpStream>;

    async fn dial(&self, config: &ConnectionConfig) -> Result<Self::Stream, ClientError> {
        let (connector, server_name) = create_tls_connector(config)?;
        let endpoint = config.endpoint();

        let handshake = async {
            let tcp_stream = TcpStream::connect((config.host.as_str(), config.port))
                .await
                .map_err(|e| ClientError::Connect {
                    endpoint: endpoint.clone(),
                    timeout: config.connect_timeout,
                    source: e,
                })?;
            tcp_stream.set_nodelay(true).ok();

            tracing::debug!("Performing TLS handshake...");
            connector
                .connect(server_name, tcp_stream)
                .await
                .map_err(|e| ClientError::TlsHandshake(e.to_string()))
        };

        tokio::time::timeout(config.connect_timeout, handshake)
            .await
            .map_err(|_| {
                tracing::debug!("Connection timeout");
                ClientError::Connect {
                    endpoint: endpoint.clone(),
                    timeout: config.connect_timeout,
                    source: std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out"),
                }
            })?
    }
}

/// A lazily opened connection with connect retries.
pub struct Connector<D: Dial = TlsDialer> {
    config: ConnectionConfig,
    dialer: D,
    stream: Option<D::Stream>,
}

impl Connector<TlsDialer> {
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_dialer(config, TlsDialer)
    }
}

impl<D: Dial> Connector<D> {
    pub fn with_dialer(config: ConnectionConfig, dialer: D) -> Self {
        Self {
            config,
            dialer,
            stream: None,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn dialer(&self) -> &D {
        &self.dialer
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Makes a single connection attempt, replacing any open stream.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        tracing::debug!("Connecting to {}...", self.config.endpoint());
        self.disconnect().await;

        let stream = self.dialer.dial(&self.config).await.map_err(|e| {
            tracing::debug!("Connection failed: {}", e);
            e
        })?;

        tracing::debug!("Connected to {}", self.config.endpoint());
        self.stream = Some(stream);
        Ok(())
    }

    /// Returns the open stream, connecting first if needed.
    ///
    /// Failed attempts are retried `connect_attempts` times with
    /// `attempt_delay` between them. TLS configuration errors are not
    /// retried.
    pub async fn connection(&mut self) -> Result<&mut D::Stream, ClientError> {
        if self.stream.is_none() {
            self.connect_with_retry().await?;
        }
        self.stream.as_mut().ok_or(ClientError::NotConnected)
    }

    async fn connect_with_retry(&mut self) -> Result<(), ClientError> {
        let attempts = self.config.connect_attempts.max(1);
        let mut last = ClientError::NotConnected;

        for attempt in 1..=attempts {
            match self.connect().await {
                Ok(()) => return Ok(()),
                Err(e @ ClientError::TlsConfig(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        "Connect attempt {}/{} to {} failed: {}",
                        attempt,
                        attempts,
                        self.config.endpoint(),
                        e
                    );
                    last = e;
                }
            }
            if attempt < attempts && !self.config.attempt_delay.is_zero() {
                tokio::time::sleep(self.config.attempt_delay).await;
            }
        }

        Err(ClientError::ConnectExhausted {
            attempts,
            last: Box::new(last),
        })
    }

    /// Closes the stream if one is open.
    pub async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            tracing::debug!("Disconnecting from {}", self.config.endpoint());
            if let Err(e) = stream.shutdown().await {
                tracing::debug!("Shutdown failed: {}", e);
            }
        }
    }
}
