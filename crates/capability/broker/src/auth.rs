//! 升级前的连接认证。
//!
//! TLS 模式下以客户端证书 CN 作为 clientID；明文模式（仅测试）校验
//! `Authorization: Basic base64(clientID:token)` 与静态表，
//! 若带有 `Client` 头则必须与 clientID 一致。失败时在升级前返回 401。

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hub_server::{PeerIdentity, unauthorized};
use hub_telemetry::record_authn_failure;
use std::collections::HashMap;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::info;

/// 已认证的通道客户端。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(pub String);

pub(crate) struct BrokerAuth {
    pub(crate) tls: bool,
    pub(crate) clients: HashMap<String, String>,
}

impl BrokerAuth {
    fn identify(&self, headers: &HeaderMap, peer: Option<&PeerIdentity>) -> Option<String> {
        if self.tls {
            return peer.map(|peer| peer.common_name.clone());
        }
        let (client_id, token) = basic_credentials(headers)?;
        let expected = self.clients.get(&client_id)?;
        if !bool::from(expected.as_bytes().ct_eq(token.as_bytes())) {
            return None;
        }
        if let Some(declared) = headers.get("client") {
            if declared.to_str().ok()? != client_id {
                return None;
            }
        }
        Some(client_id)
    }
}

pub(crate) async fn authenticate(
    State(auth): State<Arc<BrokerAuth>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let peer = req.extensions().get::<PeerIdentity>();
    match auth.identify(req.headers(), peer) {
        Some(client_id) => {
            req.extensions_mut().insert(ClientId(client_id));
            next.run(req).await
        }
        None => {
            record_authn_failure();
            info!(target: "hub.broker", path = %req.uri().path(), "client_rejected");
            unauthorized("client authentication required")
        }
    }
}

/// 解析 Basic 认证头为 (clientID, token)。
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (client_id, token) = decoded.split_once(':')?;
    if client_id.is_empty() {
        return None;
    }
    Some((client_id.to_string(), token.to_string()))
}

/// 构造 Basic 认证头的值。
pub fn basic_header(client_id: &str, token: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{client_id}:{token}")))
}
