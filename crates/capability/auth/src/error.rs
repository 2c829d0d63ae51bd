use domain::{ErrorKind, Role};
use hub_watcher::WatchError;

/// 认证相关错误。
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("token expired")]
    TokenExpired,
    #[error("token invalid")]
    TokenInvalid,
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidCredentials | AuthError::TokenExpired | AuthError::TokenInvalid => {
                ErrorKind::Authn
            }
            AuthError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// 授权拒绝原因。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    #[error("publisher {login_id} may not publish thing {thing_id}")]
    CrossPublisher { login_id: String, thing_id: String },
    #[error("thing {thing_id} is not in any group")]
    NotInGroup { thing_id: String },
    #[error("role {role} of {login_id} is too low for {operation} on {thing_id}")]
    RoleTooLow {
        login_id: String,
        thing_id: String,
        role: Role,
        operation: String,
    },
}

impl AuthzError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Authz
    }
}

/// 口令库 / ACL 存储错误。
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error(transparent)]
    Watch(#[from] WatchError),
    #[error("lock failed")]
    Lock,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Open { .. } | StoreError::Io(_) => ErrorKind::Io,
            StoreError::Invalid(_) => ErrorKind::Validation,
            StoreError::Watch(err) => err.kind(),
            StoreError::Lock => ErrorKind::Internal,
        }
    }
}
