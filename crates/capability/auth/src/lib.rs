//! 认证授权能力：口令库、ACL、口令哈希、授权判断与 JWT 签发。

mod acl;
mod authorizer;
mod credentials;
mod error;
mod fsutil;
mod jwt;
mod password;

use std::sync::Arc;

pub use acl::{AclSnapshot, AclStore};
pub use authorizer::{Authenticator, permits};
pub use credentials::CredentialStore;
pub use error::{AuthError, AuthzError, StoreError};
pub use jwt::{
    DEFAULT_ACCESS_TTL_SECONDS, DEFAULT_REFRESH_TTL_SECONDS, TokenClaims, TokenIssuer, TokenKind,
    TokenPair, TokenVerifier,
};
pub use password::{DEFAULT_ARGON2_ITERATIONS, HashAlgorithm, create_hash, verify_hash};

/// 登录口令校验回调。
pub type CredentialCheck = Arc<dyn Fn(&str, &str) -> Result<(), AuthError> + Send + Sync>;

/// 登录 / 刷新服务（口令校验回调 + token 签发）。
pub struct AuthService {
    check: CredentialCheck,
    issuer: Arc<TokenIssuer>,
}

impl AuthService {
    /// 创建认证服务实例。
    pub fn new(check: CredentialCheck, issuer: Arc<TokenIssuer>) -> Self {
        Self { check, issuer }
    }

    /// 基于认证器的口令校验创建。
    pub fn with_authenticator(authenticator: Arc<Authenticator>, issuer: Arc<TokenIssuer>) -> Self {
        let check: CredentialCheck = Arc::new(move |login_id: &str, password: &str| {
            authenticator.verify_login(login_id, password)
        });
        Self::new(check, issuer)
    }

    /// 登录校验并签发 token。
    pub fn login(&self, login_id: &str, password: &str) -> Result<TokenPair, AuthError> {
        (self.check)(login_id, password)?;
        self.issuer.issue(login_id)
    }

    /// 校验 access token。
    pub fn verify_access_token(&self, token: &str) -> Result<TokenClaims, AuthError> {
        self.issuer.verifier().verify_access(token)
    }

    /// 使用 refresh token 换取新 token 对。
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        self.issuer.refresh(refresh_token)
    }

    pub fn issuer(&self) -> &Arc<TokenIssuer> {
        &self.issuer
    }
}
