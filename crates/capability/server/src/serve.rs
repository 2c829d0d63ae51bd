//! 监听循环：明文（开发模式）或 TLS。
//!
//! TLS 模式下每个连接完成握手后，把对端证书身份写入请求扩展，
//! 再交给 hyper-util 驱动（支持 WebSocket 升级）。

use crate::{PeerIdentity, ServerError};
use axum::Router;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use rustls::ServerConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::{debug, info, warn};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// 传输方式。
#[derive(Clone)]
pub enum Transport {
    Plain,
    Tls(Arc<ServerConfig>),
}

pub async fn serve(
    listener: TcpListener,
    transport: Transport,
    router: Router,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    match transport {
        Transport::Plain => serve_plain(listener, router, shutdown).await,
        Transport::Tls(config) => serve_tls(listener, config, router, shutdown).await,
    }
}

/// 明文 HTTP；收到取消后优雅停机。
pub async fn serve_plain(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let addr = listener.local_addr()?;
    info!(target: "hub.api", addr = %addr, tls = false, "http_listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

/// TLS 监听；收到取消后停止接受连接，并通知在途连接优雅关闭。
pub async fn serve_tls(
    listener: TcpListener,
    config: Arc<ServerConfig>,
    router: Router,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let addr = listener.local_addr()?;
    info!(target: "hub.api", addr = %addr, tls = true, "http_listening");
    let acceptor = TlsAcceptor::from(config);
    loop {
        let (stream, remote) = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!(target: "hub.api", error = %err, "accept_failed");
                    continue;
                }
            },
        };
        let acceptor = acceptor.clone();
        let router = router.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(err) = serve_connection(stream, acceptor, router, shutdown).await {
                info!(target: "hub.api", remote = %remote, error = %err, "connection_failed");
            }
        });
    }
    info!(target: "hub.api", addr = %addr, "http_stopped");
    Ok(())
}

async fn serve_connection(
    stream: TcpStream,
    acceptor: TlsAcceptor,
    router: Router,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let tls = tokio::time::timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream))
        .await
        .map_err(|_| ServerError::Tls("handshake timed out".to_string()))??;
    let peer = tls
        .get_ref()
        .1
        .peer_certificates()
        .and_then(|certs| certs.first())
        .and_then(|cert| PeerIdentity::from_der(cert.as_ref()));
    if let Some(peer) = &peer {
        debug!(target: "hub.api", cn = %peer.common_name, ou = ?peer.organizational_unit, "peer_identified");
    }

    let service = hyper::service::service_fn(move |mut request: hyper::Request<Incoming>| {
        if let Some(peer) = &peer {
            request.extensions_mut().insert(peer.clone());
        }
        router.clone().call(request)
    });

    let builder = Builder::new(TokioExecutor::new());
    let connection = builder.serve_connection_with_upgrades(TokioIo::new(tls), service);
    tokio::pin!(connection);
    tokio::select! {
        result = connection.as_mut() => {
            if let Err(err) = result {
                debug!(target: "hub.api", error = %err, "connection_closed_with_error");
            }
        }
        _ = shutdown.cancelled() => {
            connection.as_mut().graceful_shutdown();
            let _ = connection.await;
        }
    }
    Ok(())
}
