use axum::{Extension, routing::get};
use hub_auth::TokenIssuer;
use hub_server::{
    CertificateAuthority, HubRouter, PeerIdentity, TlsSettings, client_config, server_config,
    serve_tls, tls::server_name,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;

struct Harness {
    addr: SocketAddr,
    ca: CertificateAuthority,
    shutdown: CancellationToken,
}

async fn start(require_client_cert: bool) -> Harness {
    let ca = CertificateAuthority::generate("hub-test-ca").expect("ca");
    let server = ca.issue_server(&["localhost", "127.0.0.1"]).expect("server cert");
    let settings = TlsSettings::new(server.chain(), server.private_key())
        .with_client_ca(vec![ca.cert_der()], require_client_cert);
    let config = server_config(&settings).expect("server config");

    let issuer = TokenIssuer::generate(60, 120).expect("issuer");
    let router = HubRouter::new(issuer.verifier())
        .public("/health", get(|| async { "ok" }))
        .cert(
            "/whoami",
            get(|Extension(peer): Extension<PeerIdentity>| async move {
                format!("{}|{}", peer.common_name, peer.organizational_unit.unwrap_or_default())
            }),
        )
        .build(());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let shutdown = CancellationToken::new();
    tokio::spawn(serve_tls(listener, config, router, shutdown.clone()));
    Harness { addr, ca, shutdown }
}

async fn get_over_tls(
    harness: &Harness,
    identity: Option<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)>,
    path: &str,
) -> std::io::Result<String> {
    let config = client_config(&[harness.ca.cert_der()], identity).expect("client config");
    let connector = TlsConnector::from(config);
    let stream = TcpStream::connect(harness.addr).await?;
    let mut tls = connector
        .connect(server_name("localhost").expect("name"), stream)
        .await?;
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    tls.write_all(request.as_bytes()).await?;
    let mut buf = Vec::new();
    let _ = tls.read_to_end(&mut buf).await;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[tokio::test]
async fn client_certificate_identity_reaches_handler() {
    let harness = start(false).await;
    let client = harness
        .ca
        .issue_client("pubA", Some("iot-device"))
        .expect("client cert");
    let response = get_over_tls(
        &harness,
        Some((client.chain(), client.private_key())),
        "/whoami",
    )
    .await
    .expect("request");
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains("pubA|iot-device"), "{response}");
    harness.shutdown.cancel();
}

#[tokio::test]
async fn optional_client_cert_allows_public_but_not_cert_routes() {
    let harness = start(false).await;
    let health = get_over_tls(&harness, None, "/health").await.expect("health");
    assert!(health.starts_with("HTTP/1.1 200"), "{health}");

    let whoami = get_over_tls(&harness, None, "/whoami").await.expect("whoami");
    assert!(whoami.starts_with("HTTP/1.1 401"), "{whoami}");
    harness.shutdown.cancel();
}

#[tokio::test]
async fn required_client_cert_rejects_anonymous_handshake() {
    let harness = start(true).await;
    let result = get_over_tls(&harness, None, "/health").await;
    let rejected = match result {
        Err(_) => true,
        Ok(response) => !response.starts_with("HTTP/1.1 200"),
    };
    assert!(rejected);
    harness.shutdown.cancel();
}
