use crate::AuthError;
use argon2::{
    Algorithm,
    Argon2,
    Params,
    PasswordHash,
    PasswordHasher,
    PasswordVerifier,
    Version,
    password_hash::SaltString,
};
use rand_core::OsRng;

/// Argon2id 默认迭代次数（memory / parallelism 使用 argon2 crate 默认值）。
pub const DEFAULT_ARGON2_ITERATIONS: u32 = Params::DEFAULT_T_COST;

/// 口令哈希算法。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    #[default]
    Argon2id,
    Bcrypt,
}

/// 生成口令哈希；算法与参数编码在哈希字符串内。
///
/// `iterations` 对 Argon2id 为迭代次数，对 bcrypt 为 cost（限制在 4..=31）；
/// 传 0 使用默认值。
pub fn create_hash(
    password: &str,
    algorithm: HashAlgorithm,
    iterations: u32,
) -> Result<String, AuthError> {
    match algorithm {
        HashAlgorithm::Argon2id => {
            let iterations = if iterations == 0 {
                DEFAULT_ARGON2_ITERATIONS
            } else {
                iterations
            };
            let params = Params::new(
                Params::DEFAULT_M_COST,
                iterations,
                Params::DEFAULT_P_COST,
                None,
            )
            .map_err(|err| AuthError::Internal(err.to_string()))?;
            let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
            let salt = SaltString::generate(&mut OsRng);
            let hash = argon2
                .hash_password(password.as_bytes(), &salt)
                .map_err(|err| AuthError::Internal(err.to_string()))?;
            Ok(hash.to_string())
        }
        HashAlgorithm::Bcrypt => {
            let cost = if iterations == 0 {
                bcrypt::DEFAULT_COST
            } else {
                iterations.clamp(4, 31)
            };
            bcrypt::hash(password, cost).map_err(|err| AuthError::Internal(err.to_string()))
        }
    }
}

/// 校验口令；按哈希前缀识别算法，未知或损坏的哈希一律返回 false。
pub fn verify_hash(stored_hash: &str, password: &str) -> bool {
    if stored_hash.starts_with("$argon2") {
        let Ok(parsed) = PasswordHash::new(stored_hash) else {
            return false;
        };
        return Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok();
    }
    if stored_hash.starts_with("$2") {
        return bcrypt::verify(password, stored_hash).unwrap_or(false);
    }
    false
}
