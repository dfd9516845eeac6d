//! TCP transport for frame channels, optionally wrapped in mutual TLS.

use std::{
    env, fmt, fs,
    io::{self, BufRead},
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
};

use log::{debug, info};
use rustls::{
    ClientConfig, RootCertStore, ServerConfig,
    pki_types::{CertificateDer, PrivateKeyDer, ServerName},
    server::WebPkiClientVerifier,
};
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
};
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::{FrameReceiver, FrameSender};

pub type BoxedReader = Box<dyn AsyncRead + Unpin + Send>;
pub type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// Receiving end of a network channel, regardless of the transport mode.
pub type NetRx = FrameReceiver<BoxedReader>;

/// Sending end of a network channel, regardless of the transport mode.
pub type NetTx = FrameSender<BoxedWriter>;

/// Whether a peer is reached over plain TCP or TLS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    #[default]
    Plain,
    Tls,
}

/// One connectable peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEndpoint {
    host: String,
    port: u16,
    mode: TransportMode,
}

impl NetworkEndpoint {
    /// Creates a new `NetworkEndpoint`.
    ///
    /// # Arguments
    /// * `host` - A host name or ip address.
    /// * `port` - The peer's listening port.
    /// * `mode` - The transport used to reach the peer.
    pub fn new(host: impl Into<String>, port: u16, mode: TransportMode) -> Self {
        Self {
            host: host.into(),
            port,
            mode,
        }
    }

    /// Parses a `host:port` string.
    ///
    /// # Returns
    /// The endpoint or an `InvalidInput` error if `addr` is malformed.
    pub fn parse(addr: &str, mode: TransportMode) -> io::Result<Self> {
        let invalid = || {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid endpoint {addr:?}, expected host:port"),
            )
        };

        let (host, port) = addr.trim().rsplit_once(':').ok_or_else(invalid)?;
        let port = port.parse().map_err(|_| invalid())?;
        let host = host.trim_start_matches('[').trim_end_matches(']');

        if host.is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(host, port, mode))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }
}

impl fmt::Display for NetworkEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Paths to the PEM material used for mutual TLS.
///
/// The certificate chain and key act as the node's keystore, the trust roots
/// as its truststore, they validate peers in both directions.
#[derive(Debug, Clone)]
pub struct TlsMaterial {
    pub cert_chain: PathBuf,
    pub private_key: PathBuf,
    pub trust_roots: PathBuf,
}

impl TlsMaterial {
    /// Reads `TLS_CERT`, `TLS_KEY` and `TLS_CA` from the environment.
    ///
    /// # Returns
    /// `Some` only if all three variables are set.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            cert_chain: env::var_os("TLS_CERT")?.into(),
            private_key: env::var_os("TLS_KEY")?.into(),
            trust_roots: env::var_os("TLS_CA")?.into(),
        })
    }
}

#[derive(Clone)]
struct TlsContext {
    connector: TlsConnector,
    acceptor: TlsAcceptor,
}

/// Opens and accepts frame channels.
#[derive(Clone, Default)]
pub struct Transport {
    tls: Option<TlsContext>,
}

impl Transport {
    /// A transport that only speaks plain TCP.
    pub fn plain() -> Self {
        Self { tls: None }
    }

    /// A transport that can also speak mutual TLS.
    ///
    /// # Arguments
    /// * `material` - Paths to the PEM files.
    ///
    /// # Returns
    /// The transport or an io error if any of the files can't be read or parsed.
    pub fn tls(material: &TlsMaterial) -> io::Result<Self> {
        let cert_chain = fs::read(&material.cert_chain)?;
        let private_key = fs::read(&material.private_key)?;
        let trust_roots = fs::read(&material.trust_roots)?;
        Self::from_pem(&cert_chain, &private_key, &trust_roots)
    }

    /// A TLS capable transport built from in memory PEM contents.
    pub fn from_pem(cert_chain: &[u8], private_key: &[u8], trust_roots: &[u8]) -> io::Result<Self> {
        let certs = load_certs(&mut &cert_chain[..])?;
        let key = rustls_pemfile::private_key(&mut &private_key[..])?
            .ok_or_else(|| invalid("no private key found in the key file"))?;

        let mut roots = RootCertStore::empty();
        for cert in load_certs(&mut &trust_roots[..])? {
            roots.add(cert).map_err(invalid)?;
        }

        let tls = build_tls_context(certs, key, Arc::new(roots))?;
        Ok(Self { tls: Some(tls) })
    }

    /// Builds the transport from the environment, TLS is used when
    /// `TlsMaterial::from_env` finds all its variables.
    pub fn from_env() -> io::Result<Self> {
        match TlsMaterial::from_env() {
            Some(material) => {
                info!("tls material found, enabling encrypted transport");
                Self::tls(&material)
            }
            None => Ok(Self::plain()),
        }
    }

    /// The mode this transport accepts connections with.
    pub fn mode(&self) -> TransportMode {
        match self.tls {
            Some(_) => TransportMode::Tls,
            None => TransportMode::Plain,
        }
    }

    /// Connects to `endpoint` using the endpoint's transport mode.
    ///
    /// # Returns
    /// Both ends of the channel or an io error if the connection or the
    /// handshake failed.
    pub async fn open(&self, endpoint: &NetworkEndpoint) -> io::Result<(NetRx, NetTx)> {
        let stream = TcpStream::connect((endpoint.host(), endpoint.port())).await?;
        stream.set_nodelay(true)?;
        debug!(endpoint:% = endpoint; "connected");

        match endpoint.mode() {
            TransportMode::Plain => Ok(boxed_channel(stream)),
            TransportMode::Tls => {
                let tls = self.tls.as_ref().ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("{endpoint} requires tls but no tls material is configured"),
                    )
                })?;

                let name = ServerName::try_from(endpoint.host().to_string()).map_err(invalid)?;
                let stream = tls.connector.connect(name, stream).await?;
                Ok(boxed_channel(stream))
            }
        }
    }

    /// Binds a listener at `host:port`.
    ///
    /// Every accepted connection uses this transport's mode.
    pub async fn bind(&self, host: &str, port: u16) -> io::Result<Listener> {
        let inner = TcpListener::bind((host, port)).await?;
        let acceptor = self.tls.as_ref().map(|tls| tls.acceptor.clone());

        Ok(Listener { inner, acceptor })
    }
}

/// Accepts incoming frame channels.
pub struct Listener {
    inner: TcpListener,
    acceptor: Option<TlsAcceptor>,
}

impl Listener {
    /// Waits for the next peer, completing the TLS handshake if needed.
    ///
    /// # Returns
    /// Both ends of the channel and the peer address.
    pub async fn accept(&self) -> io::Result<(NetRx, NetTx, SocketAddr)> {
        let (stream, addr) = self.inner.accept().await?;
        stream.set_nodelay(true)?;

        let (rx, tx) = match &self.acceptor {
            Some(acceptor) => boxed_channel(acceptor.accept(stream).await?),
            None => boxed_channel(stream),
        };

        Ok((rx, tx, addr))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

fn boxed_channel<S>(stream: S) -> (NetRx, NetTx)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (rx, tx) = tokio::io::split(stream);
    crate::channel(Box::new(rx) as BoxedReader, Box::new(tx) as BoxedWriter)
}

fn load_certs(pem: &mut dyn BufRead) -> io::Result<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(pem).collect::<io::Result<Vec<_>>>()?;

    if certs.is_empty() {
        return Err(invalid("no certificates found in the pem file"));
    }

    Ok(certs)
}

fn build_tls_context(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    roots: Arc<RootCertStore>,
) -> io::Result<TlsContext> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let verifier = WebPkiClientVerifier::builder_with_provider(roots.clone(), provider.clone())
        .build()
        .map_err(invalid)?;

    let server = ServerConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(invalid)?
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs.clone(), key.clone_key())
        .map_err(invalid)?;

    let client = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(invalid)?
        .with_root_certificates(roots)
        .with_client_auth_cert(certs, key)
        .map_err(invalid)?;

    Ok(TlsContext {
        connector: TlsConnector::from(Arc::new(client)),
        acceptor: TlsAcceptor::from(Arc::new(server)),
    })
}

fn invalid<E>(e: E) -> io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    io::Error::new(io::ErrorKind::InvalidData, e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_endpoints() {
        let ep = NetworkEndpoint::parse("worker-0:50000", TransportMode::Plain).unwrap();
        assert_eq!(ep.host(), "worker-0");
        assert_eq!(ep.port(), 50000);
        assert_eq!(ep.to_string(), "worker-0:50000");

        let ep = NetworkEndpoint::parse("[::1]:7", TransportMode::Tls).unwrap();
        assert_eq!(ep.host(), "::1");
        assert_eq!(ep.mode(), TransportMode::Tls);

        assert!(NetworkEndpoint::parse("no-port", TransportMode::Plain).is_err());
        assert!(NetworkEndpoint::parse(":80", TransportMode::Plain).is_err());
        assert!(NetworkEndpoint::parse("host:http", TransportMode::Plain).is_err());
    }

    #[test]
    fn garbage_pem_is_rejected() {
        assert!(Transport::from_pem(b"nope", b"nope", b"nope").is_err());
    }
}
