//! Internal module for opening the encrypted transport to the mail server.
//!
//! The IMAP port is implicit TLS; the TCP leg goes direct or through SOCKS5.

use crate::config::MailConfig;
use crate::error::{Error, Result};
use crate::proxy::Socks5Proxy;
use rustls::ClientConfig;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_socks::tcp::Socks5Stream;
use tracing::{debug, instrument};
use webpki_roots::TLS_SERVER_ROOTS;

/// A TLS stream over TCP, used for IMAP communication.
pub(crate) type TlsStream = tokio_rustls::client::TlsStream<TcpStream>;

/// Builds a connector trusting the bundled web PKI roots.
///
/// Built once per connector and reused for every reconnect.
pub(crate) fn tls_connector() -> TlsConnector {
    let mut roots = rustls::RootCertStore::empty();
    roots.add_trust_anchors(TLS_SERVER_ROOTS.iter().map(|ta| {
        rustls::OwnedTrustAnchor::from_subject_spki_name_constraints(
            ta.subject,
            ta.spki,
            ta.name_constraints,
        )
    }));

    let tls_config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(tls_config))
}

/// Opens TCP (direct or proxied) to the configured server and completes the TLS handshake.
#[instrument(
    name = "connection::open",
    skip_all,
    fields(
        imap_host = %config.host,
        port = config.port,
        proxy_enabled = config.proxy.is_some()
    )
)]
pub(crate) async fn open(connector: &TlsConnector, config: &MailConfig) -> Result<TlsStream> {
    let target = config.server_address();
    let server_name = server_name(&config.host)?;

    let tcp = match &config.proxy {
        Some(proxy) => via_socks5(&target, proxy).await?,
        None => TcpStream::connect(&target)
            .await
            .map_err(|source| Error::TcpConnect {
                target: target.clone(),
                source,
            })?,
    };

    debug!("TCP connected, starting TLS handshake");

    connector
        .connect(server_name, tcp)
        .await
        .map_err(|source| Error::TlsConnect { target, source })
}

/// Parses the host for SNI and certificate verification.
fn server_name(host: &str) -> Result<rustls::ServerName> {
    rustls::ServerName::try_from(host).map_err(|source| Error::InvalidDnsName {
        host: host.to_string(),
        source,
    })
}

#[instrument(
    name = "connection::socks5",
    skip_all,
    fields(proxy = %proxy, has_auth = proxy.requires_auth())
)]
async fn via_socks5(target: &str, proxy: &Socks5Proxy) -> Result<TcpStream> {
    let proxy_addr = (proxy.host.as_str(), proxy.port);

    let stream = match &proxy.auth {
        Some(auth) => {
            Socks5Stream::connect_with_password(proxy_addr, target, &auth.username, &auth.password)
                .await
        }
        None => Socks5Stream::connect(proxy_addr, target).await,
    };

    stream
        .map(Socks5Stream::into_inner)
        .map_err(|source| Error::Socks5Connect {
            proxy_host: proxy.host.clone(),
            target: target.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_name_accepts_hostnames_and_ips() {
        assert!(server_name("imap.example.com").is_ok());
        assert!(server_name("127.0.0.1").is_ok());
    }

    #[test]
    fn test_server_name_rejects_empty() {
        let err = server_name("").unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::Configuration);
    }

    #[tokio::test]
    async fn test_open_reports_refused_connection() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = MailConfig::builder()
            .host("127.0.0.1")
            .port(port)
            .username("u")
            .password("p")
            .build()
            .unwrap();

        let err = open(&tls_connector(), &config).await.unwrap_err();
        assert!(matches!(err, Error::TcpConnect { .. }));
        assert!(err.is_retryable());
    }
}
