use crate::channel::codec::WireFormat;
use crate::channel::error::{ChannelError, ChannelResult};
use crate::channel::{install_crypto_provider, FrameSink, OpenChannel, Transport};
use bytes::Bytes;
use quinn::{Connection, Endpoint};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Datagram-framed channel over QUIC carrying the fixed binary tag frame
#[derive(Debug, Clone)]
pub struct DatagramTransport {
    /// Whether TLS certificate verification is skipped (INSECURE)
    insecure_mode: bool,
    server_name: Option<String>,
}

impl DatagramTransport {
    pub fn new(insecure_skip_verify: bool) -> Self {
        if insecure_skip_verify {
            tracing::warn!(
                "SECURITY WARNING: TLS certificate verification is DISABLED. \
                 Only use this against test endpoints with self-signed certificates."
            );
        }
        Self {
            insecure_mode: insecure_skip_verify,
            server_name: None,
        }
    }

    /// Override the TLS server name (defaults to the host part of the address)
    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// One client endpoint per channel, so every connection has its own UDP socket
    fn client_endpoint(&self) -> ChannelResult<Endpoint> {
        install_crypto_provider();
        let crypto = if self.insecure_mode {
            rustls::ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate::new()))
                .with_no_client_auth()
        } else {
            rustls::ClientConfig::builder()
                .with_root_certificates(trusted_roots())
                .with_no_client_auth()
        };
        let crypto = quinn::crypto::rustls::QuicClientConfig::try_from(crypto)
            .map_err(|e| ChannelError::CertificateError(e.to_string()))?;

        // Datagrams only: the peer may not open streams towards us
        let mut transport_config = quinn::TransportConfig::default();
        transport_config
            .max_concurrent_bidi_streams(0u32.into())
            .max_concurrent_uni_streams(0u32.into())
            .max_idle_timeout(Duration::from_secs(60).try_into().ok())
            .keep_alive_interval(Some(Duration::from_secs(5)));

        let mut client_config = quinn::ClientConfig::new(Arc::new(crypto));
        client_config.transport_config(Arc::new(transport_config));

        let mut endpoint = Endpoint::client(SocketAddr::from(([0, 0, 0, 0], 0)))?;
        endpoint.set_default_client_config(client_config);
        Ok(endpoint)
    }

    async fn resolve(address: &str) -> ChannelResult<SocketAddr> {
        tokio::net::lookup_host(address)
            .await
            .map_err(|e| ChannelError::InvalidAddress(format!("{address}: {e}")))?
            .next()
            .ok_or_else(|| ChannelError::InvalidAddress(address.to_string()))
    }

    fn server_name_for(&self, address: &str) -> String {
        if let Some(name) = &self.server_name {
            return name.clone();
        }
        let host = address
            .rsplit_once(':')
            .map(|(host, _)| host.trim_matches(|c| c == '[' || c == ']'));
        match host {
            Some(host) if host.parse::<std::net::IpAddr>().is_err() => host.to_string(),
            _ => "localhost".to_string(),
        }
    }
}

pub struct DatagramSink {
    conn: Connection,
    endpoint: Endpoint,
}

impl Transport for DatagramTransport {
    type Sink = DatagramSink;

    fn wire_format(&self) -> WireFormat {
        WireFormat::Binary
    }

    async fn open(&self, address: &str) -> ChannelResult<OpenChannel<DatagramSink>> {
        let remote_addr = Self::resolve(address).await?;
        let endpoint = self.client_endpoint()?;

        let conn = endpoint
            .connect(remote_addr, &self.server_name_for(address))
            .map_err(|e| ChannelError::ConnectFailed(e.to_string()))?
            .await?;

        if conn.max_datagram_size().is_none() {
            conn.close(0u32.into(), b"datagrams unsupported");
            return Err(ChannelError::ConnectFailed(format!(
                "{address}: peer does not accept datagrams"
            )));
        }

        let (tx, inbound) = mpsc::unbounded_channel();
        let reader = conn.clone();
        tokio::spawn(async move {
            loop {
                match reader.read_datagram().await {
                    Ok(frame) => {
                        if tx.send(frame).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!("Datagram read ended: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(OpenChannel {
            sink: DatagramSink { conn, endpoint },
            inbound,
        })
    }
}

impl FrameSink for DatagramSink {
    async fn send(&mut self, frame: Bytes) -> ChannelResult<()> {
        self.conn.send_datagram(frame)?;
        Ok(())
    }

    async fn close(&mut self) {
        self.conn.close(0u32.into(), b"closing");
        self.endpoint.close(0u32.into(), b"closing");
    }
}

/// Native roots, or the bundled webpki roots when none can be loaded
fn trusted_roots() -> rustls::RootCertStore {
    let native = rustls_native_certs::load_native_certs().unwrap_or_else(|e| {
        tracing::warn!("Failed to load native certificates: {}", e);
        Vec::new()
    });

    let mut roots = rustls::RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(native);
    if ignored > 0 {
        tracing::debug!("Ignored {} unparsable native certificates", ignored);
    }
    if added == 0 {
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }
    roots
}

/// Accepts any server certificate (INSECURE, test endpoints only)
///
/// Handshake signatures are still checked against the presented certificate.
#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<rustls::crypto::CryptoProvider>,
}

impl AcceptAnyCertificate {
    fn new() -> Self {
        Self {
            provider: Arc::new(rustls::crypto::ring::default_provider()),
        }
    }
}

impl rustls::client::danger::ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
