//! 存储层错误类型
//!
//! 统一封装底层错误并携带 [`ErrorKind`] 分类：
//! - 输入校验失败（缺字段、时间戳非法、TD 非法 JSON）
//! - 键不存在
//! - 文件或 SQL 执行错误
//! - 重复启动

use domain::ErrorKind;

#[derive(Debug, Clone)]
pub struct StorageError {
    kind: ErrorKind,
    message: String,
}

impl StorageError {
    /// 内部错误（不变量被破坏、锁中毒）。
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Internal, message)
    }

    pub fn with_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::NotFound, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Io, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Conflict, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StorageError {}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::not_found(err.to_string()),
            sqlx::Error::PoolTimedOut => Self::with_kind(ErrorKind::Timeout, err.to_string()),
            sqlx::Error::Io(_) | sqlx::Error::PoolClosed => Self::io(err.to_string()),
            _ => Self::new(err.to_string()),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::validation(err.to_string())
    }
}
