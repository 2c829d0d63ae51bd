//! 存储 / 认证错误到 HTTP 响应的转换。

use axum::response::Response;
use hub_auth::AuthError;
use hub_server::{error_response, internal_error};
use hub_storage::StorageError;
use serde_json::value::RawValue;

/// 存储错误响应（按错误分类映射状态码）。
pub fn storage_error(err: StorageError) -> Response {
    error_response(err.kind(), err.message())
}

/// 认证错误响应
pub fn auth_error(err: AuthError) -> Response {
    error_response(err.kind(), err.to_string())
}

/// 把已校验的 TD 文本包装为原样输出的 JSON。
pub fn raw_documents(docs: Vec<String>) -> Result<Vec<Box<RawValue>>, Response> {
    docs.into_iter()
        .map(|doc| RawValue::from_string(doc).map_err(|err| internal_error(err.to_string())))
        .collect()
}
