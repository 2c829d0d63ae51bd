use crate::AuthError;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// access token 默认有效期（秒）。
pub const DEFAULT_ACCESS_TTL_SECONDS: u64 = 3600;
/// refresh token 默认有效期（秒）。
pub const DEFAULT_REFRESH_TTL_SECONDS: u64 = 14 * 24 * 3600;

/// token 类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
/// JWT 内部 claims。
struct Claims {
    sub: String,
    iat: u64,
    exp: u64,
    jti: String,
    kind: TokenKind,
}

/// 校验通过后的 token 内容。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub login_id: String,
    pub issued_at: u64,
    pub expires_at: u64,
    /// 每个 token 唯一的标识。
    pub token_id: String,
    pub kind: TokenKind,
}

/// 成对签发的 access/refresh token。
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// access token 过期时间（Unix 秒）。
    pub expires_at: u64,
}

/// 仅持有公钥的 token 校验器。
pub struct TokenVerifier {
    decoding: DecodingKey,
}

impl TokenVerifier {
    /// 从 SPKI PEM 公钥创建。
    pub fn from_public_pem(pem: &[u8]) -> Result<Self, AuthError> {
        let decoding =
            DecodingKey::from_ec_pem(pem).map_err(|err| AuthError::Internal(err.to_string()))?;
        Ok(Self { decoding })
    }

    /// 校验签名与过期时间，不限制 token 类型。
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::ES256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        let decoded = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map_err(map_jwt_error)?;
        let claims = decoded.claims;
        if claims.sub.is_empty() {
            return Err(AuthError::TokenInvalid);
        }
        Ok(TokenClaims {
            login_id: claims.sub,
            issued_at: claims.iat,
            expires_at: claims.exp,
            token_id: claims.jti,
            kind: claims.kind,
        })
    }

    /// 校验 access token。
    pub fn verify_access(&self, token: &str) -> Result<TokenClaims, AuthError> {
        self.verify_kind(token, TokenKind::Access)
    }

    /// 校验 refresh token。
    pub fn verify_refresh(&self, token: &str) -> Result<TokenClaims, AuthError> {
        self.verify_kind(token, TokenKind::Refresh)
    }

    fn verify_kind(&self, token: &str, expected: TokenKind) -> Result<TokenClaims, AuthError> {
        let claims = self.verify(token)?;
        if claims.kind != expected {
            return Err(AuthError::TokenInvalid);
        }
        Ok(claims)
    }
}

/// ES256 token 签发器。
pub struct TokenIssuer {
    encoding: EncodingKey,
    verifier: Arc<TokenVerifier>,
    public_key_pem: String,
    access_ttl_seconds: u64,
    refresh_ttl_seconds: u64,
}

impl TokenIssuer {
    /// 从 PKCS#8 私钥与 SPKI 公钥 PEM 创建。
    pub fn from_pem(
        private_key_pem: &[u8],
        public_key_pem: &[u8],
        access_ttl_seconds: u64,
        refresh_ttl_seconds: u64,
    ) -> Result<Self, AuthError> {
        let encoding = EncodingKey::from_ec_pem(private_key_pem)
            .map_err(|err| AuthError::Internal(err.to_string()))?;
        let verifier = TokenVerifier::from_public_pem(public_key_pem)?;
        Ok(Self {
            encoding,
            verifier: Arc::new(verifier),
            public_key_pem: String::from_utf8_lossy(public_key_pem).into_owned(),
            access_ttl_seconds,
            refresh_ttl_seconds,
        })
    }

    /// 生成临时 P-256 密钥对并创建签发器。
    pub fn generate(access_ttl_seconds: u64, refresh_ttl_seconds: u64) -> Result<Self, AuthError> {
        let key_pair =
            rcgen::KeyPair::generate().map_err(|err| AuthError::Internal(err.to_string()))?;
        Self::from_pem(
            key_pair.serialize_pem().as_bytes(),
            key_pair.public_key_pem().as_bytes(),
            access_ttl_seconds,
            refresh_ttl_seconds,
        )
    }

    /// 共享的公钥校验器。
    pub fn verifier(&self) -> Arc<TokenVerifier> {
        self.verifier.clone()
    }

    /// 公钥 PEM（分发给只做校验的服务）。
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    /// 签发 access/refresh token 对。
    pub fn issue(&self, login_id: &str) -> Result<TokenPair, AuthError> {
        self.issue_at(login_id, now_epoch_seconds())
    }

    /// 校验任意类型 token。
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        self.verifier.verify(token)
    }

    /// 用未过期的 refresh token 换取新的 token 对。
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.verifier.verify_refresh(refresh_token)?;
        self.issue(&claims.login_id)
    }

    fn issue_at(&self, login_id: &str, issued_at: u64) -> Result<TokenPair, AuthError> {
        if login_id.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        let access_token =
            self.encode(login_id, issued_at, self.access_ttl_seconds, TokenKind::Access)?;
        let refresh_token =
            self.encode(login_id, issued_at, self.refresh_ttl_seconds, TokenKind::Refresh)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_at: issued_at + self.access_ttl_seconds,
        })
    }

    /// 内部编码逻辑。
    fn encode(
        &self,
        login_id: &str,
        issued_at: u64,
        ttl_seconds: u64,
        kind: TokenKind,
    ) -> Result<String, AuthError> {
        let claims = Claims {
            sub: login_id.to_string(),
            iat: issued_at,
            exp: issued_at + ttl_seconds,
            jti: Uuid::new_v4().to_string(),
            kind,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::ES256), &claims, &self.encoding)
            .map_err(|err| AuthError::Internal(err.to_string()))
    }
}

/// 当前时间戳（秒）。
fn now_epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// 将 jwt 库错误映射为业务错误。
fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenInvalid,
    }
}

#[cfg(test)]
mod tests {
    use super::{TokenIssuer, now_epoch_seconds};
    use crate::AuthError;

    #[test]
    fn expired_access_token_is_rejected() {
        let issuer = TokenIssuer::generate(60, 120).expect("issuer");
        let stale = issuer
            .issue_at("alice", now_epoch_seconds() - 3600)
            .expect("tokens");
        assert!(matches!(
            issuer.verify(&stale.access_token),
            Err(AuthError::TokenExpired)
        ));
        assert!(matches!(
            issuer.refresh(&stale.refresh_token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn tokens_issued_in_the_same_second_differ() {
        let issuer = TokenIssuer::generate(60, 120).expect("issuer");
        let issued_at = now_epoch_seconds();
        let first = issuer.issue_at("alice", issued_at).expect("first");
        let second = issuer.issue_at("alice", issued_at).expect("second");
        assert_ne!(first.access_token, second.access_token);
        assert_ne!(first.refresh_token, second.refresh_token);

        let first_claims = issuer.verify(&first.refresh_token).expect("first claims");
        let second_claims = issuer.verify(&second.refresh_token).expect("second claims");
        assert_eq!(first_claims.issued_at, second_claims.issued_at);
        assert_ne!(first_claims.token_id, second_claims.token_id);
    }

    #[test]
    fn empty_login_is_not_issued() {
        let issuer = TokenIssuer::generate(60, 120).expect("issuer");
        assert!(issuer.issue("").is_err());
    }
}
