//! 路由守卫与请求上下文中间件
//!
//! - request_context：注入 request_id / trace_id 并回写响应头
//! - bearer_token：从 Authorization 头提取 Bearer token
//! - require_jwt：校验 access token，写入 [`AuthenticatedUser`]
//! - require_cert：要求 TLS 客户端证书（[`PeerIdentity`]）
//!
//! refresh token 只能通过请求体提交，`require_jwt` 只接受 access token。

use crate::PeerIdentity;
use crate::response::{error_response, unauthorized};
use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::Response,
};
use hub_auth::TokenVerifier;
use hub_telemetry::{new_request_ids, record_authn_failure};
use std::sync::Arc;
use tracing::{Instrument, debug, info_span};

/// JWT 路由上已认证的调用方。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub login_id: String,
}

/// 请求上下文中间件：注入 request_id/trace_id
pub async fn request_context(mut req: Request<Body>, next: Next) -> Response {
    let ids = new_request_ids();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(ids.clone());

    let span = info_span!(
        "request",
        request_id = %ids.request_id,
        trace_id = %ids.trace_id,
        method = %method,
        path = %path
    );

    let mut response = next.run(req).instrument(span).await;
    response.headers_mut().insert(
        "x-request-id",
        HeaderValue::from_str(&ids.request_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response.headers_mut().insert(
        "x-trace-id",
        HeaderValue::from_str(&ids.trace_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response
}

/// 从请求头中提取 Bearer token
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header_value = headers.get(header::AUTHORIZATION)?;
    let auth_str = header_value.to_str().ok()?;
    auth_str.strip_prefix("Bearer ")
}

/// JWT 守卫
pub async fn require_jwt(
    State(verifier): State<Arc<TokenVerifier>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(req.headers()) else {
        record_authn_failure();
        return unauthorized("missing bearer token");
    };
    match verifier.verify_access(token) {
        Ok(claims) => {
            req.extensions_mut().insert(AuthenticatedUser {
                login_id: claims.login_id,
            });
            next.run(req).await
        }
        Err(err) => {
            record_authn_failure();
            debug!(target: "hub.api", error = %err, "jwt_rejected");
            error_response(err.kind(), err.to_string())
        }
    }
}

/// 证书守卫
pub async fn require_cert(req: Request<Body>, next: Next) -> Response {
    if req.extensions().get::<PeerIdentity>().is_none() {
        record_authn_failure();
        return unauthorized("client certificate required");
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::bearer_token;
    use axum::http::{HeaderMap, HeaderValue, header};

    #[test]
    fn bearer_token_extracts() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer token-1"),
        );
        assert_eq!(bearer_token(&headers), Some("token-1"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
    }
}
