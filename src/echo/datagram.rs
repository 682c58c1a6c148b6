use crate::channel::{install_crypto_provider, ChannelError, ChannelResult};
use crate::echo::EchoServer;
use quinn::crypto::rustls::QuicServerConfig;
use quinn::{Endpoint, ServerConfig, TransportConfig};
use rustls::pki_types::{CertificateDer, PrivatePkcs8KeyDer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const DATAGRAM_BUFFER_BYTES: usize = 1024 * 1024;

/// Datagram-only server endpoint with a fresh self-signed `localhost` certificate
///
/// Returns the endpoint and the DER-encoded certificate so a client can pin it.
pub fn make_server_endpoint(bind_addr: SocketAddr) -> ChannelResult<(Endpoint, Vec<u8>)> {
    install_crypto_provider();

    let certified = rcgen::generate_simple_self_signed(vec!["localhost".into()])
        .map_err(|e| ChannelError::CertificateError(e.to_string()))?;
    let cert: CertificateDer<'static> = certified.cert.der().clone();
    let key = PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der());

    let tls = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert.clone()], key.into())
        .map_err(|e| ChannelError::CertificateError(e.to_string()))?;
    let crypto = QuicServerConfig::try_from(tls)
        .map_err(|e| ChannelError::CertificateError(e.to_string()))?;

    let mut transport_config = TransportConfig::default();
    transport_config
        .max_concurrent_bidi_streams(0u32.into())
        .max_concurrent_uni_streams(0u32.into())
        .datagram_receive_buffer_size(Some(DATAGRAM_BUFFER_BYTES))
        .max_idle_timeout(Duration::from_secs(60).try_into().ok());

    let mut server_config = ServerConfig::with_crypto(Arc::new(crypto));
    server_config.transport_config(Arc::new(transport_config));

    let endpoint = Endpoint::server(server_config, bind_addr)?;
    Ok((endpoint, cert.to_vec()))
}

/// Bind and serve the datagram echo in a background task
pub fn spawn_datagram_echo(bind_addr: SocketAddr) -> ChannelResult<EchoServer> {
    install_crypto_provider();
    let (endpoint, _cert) = make_server_endpoint(bind_addr)?;
    let local_addr = endpoint.local_addr()?;

    let task = tokio::spawn(async move {
        while let Some(incoming) = endpoint.accept().await {
            tokio::spawn(async move {
                match incoming.await {
                    Ok(conn) => echo_datagrams(conn).await,
                    Err(e) => tracing::debug!("Datagram echo handshake failed: {}", e),
                }
            });
        }
    });

    tracing::info!("Datagram echo listening on {}", local_addr);
    Ok(EchoServer::new(local_addr, task))
}

async fn echo_datagrams(conn: quinn::Connection) {
    let remote = conn.remote_address();
    loop {
        let datagram = match conn.read_datagram().await {
            Ok(datagram) => datagram,
            Err(e) => {
                tracing::debug!(%remote, "Datagram session ended: {}", e);
                return;
            }
        };
        if let Err(e) = conn.send_datagram(datagram) {
            tracing::debug!(%remote, "Datagram echo send failed: {}", e);
            return;
        }
    }
}
