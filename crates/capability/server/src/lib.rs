//! TLS 服务能力：证书认证的 HTTP 路由，叠加 JWT 认证路由。
//!
//! - [`serve`]：明文 / TLS 监听循环（TLS 下写入 [`PeerIdentity`]）
//! - [`HubRouter`]：public / JWT / cert 三类守卫的路由注册
//! - [`response`]：统一错误响应
//! - [`certs`]：开发与测试用证书生成
//! - [`tls`]：rustls 服务端 / 客户端配置

pub mod certs;
mod error;
pub mod guard;
mod peer;
pub mod response;
mod router;
pub mod serve;
pub mod tls;

pub use certs::{CertificateAuthority, IssuedCert};
pub use error::ServerError;
pub use guard::{AuthenticatedUser, bearer_token, request_context};
pub use peer::PeerIdentity;
pub use response::{
    bad_request, conflict, error_response, forbidden, internal_error, not_found, ok, status_for,
    timeout, unauthorized,
};
pub use router::HubRouter;
pub use serve::{Transport, serve, serve_plain, serve_tls};
pub use tls::{TlsSettings, client_config, server_config};
